//! Per-report accumulation of data-source readings.
//!
//! A [`GatewayData`] collects one [`DataSourceData`] per data-source id.
//! Each source carries either one scalar reading or a histogram of sampled
//! values with per-value counts, plus free-form dimensions. Converting to
//! the wire form enforces the report-wide cap on data sources.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};

use gl_protocol::{Dimension, MetricData};

use crate::error::{ReportError, ReportResult};

/// The ingestion service rejects reports with more data sources than this.
pub const MAX_DATA_SOURCES: usize = 20;

// ── DataSourceData ────────────────────────────────────────────

/// Readings for one data source within a report.
#[derive(Debug, Clone)]
pub struct DataSourceData {
    value: Option<f64>,
    values: Vec<f64>,
    counts: Vec<f64>,
    dimensions: Vec<Dimension>,
    timestamp: Option<DateTime<Utc>>,
}

impl DataSourceData {
    fn new(data_source_id: &str) -> ReportResult<Self> {
        let mut data = Self {
            value: None,
            values: Vec::new(),
            counts: Vec::new(),
            dimensions: Vec::new(),
            timestamp: None,
        };
        data.set_property("DataSourceId", data_source_id)?;
        Ok(data)
    }

    /// Record a single scalar reading. Clears any sampled values recorded
    /// earlier; a source reports either a scalar or samples, not both.
    pub fn set_value(&mut self, value: f64) {
        self.values.clear();
        self.counts.clear();
        self.value = Some(value);
    }

    /// Record one sampled value and how often it was observed. A source
    /// with samples reports them instead of any scalar value.
    pub fn add_sample(&mut self, value: f64, count: f64) {
        self.values.push(value);
        self.counts.push(count);
    }

    /// Attach a dimension. Both name and value must be non-empty.
    pub fn set_property(&mut self, name: &str, value: &str) -> ReportResult<()> {
        if name.is_empty() || value.is_empty() {
            return Err(ReportError::EmptyDimension);
        }
        self.dimensions.push(Dimension {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    /// Timestamp for this source's readings. Defaults to the conversion
    /// time when unset.
    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = Some(timestamp);
    }

    fn to_metric_data(&self) -> MetricData {
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let dimensions = Some(self.dimensions.clone());
        if self.values.is_empty() {
            MetricData {
                value: self.value,
                timestamp,
                dimensions,
                ..Default::default()
            }
        } else {
            MetricData {
                values: Some(self.values.clone()),
                counts: Some(self.counts.clone()),
                timestamp,
                dimensions,
                ..Default::default()
            }
        }
    }
}

// ── GatewayData ───────────────────────────────────────────────

/// All readings a gateway reports in one envelope.
#[derive(Debug, Clone)]
pub struct GatewayData {
    gateway_physical_id: String,
    sources: BTreeMap<String, DataSourceData>,
}

impl GatewayData {
    pub fn new(gateway_physical_id: &str) -> Self {
        Self {
            gateway_physical_id: gateway_physical_id.to_string(),
            sources: BTreeMap::new(),
        }
    }

    /// Start (or restart) the readings for a data source. A second call
    /// with the same id discards the earlier readings.
    pub fn data_source(&mut self, data_source_id: &str) -> ReportResult<&mut DataSourceData> {
        let data = DataSourceData::new(data_source_id)?;
        match self.sources.entry(data_source_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(data);
                Ok(occupied.into_mut())
            }
            Entry::Vacant(vacant) => Ok(vacant.insert(data)),
        }
    }

    pub fn gateway_physical_id(&self) -> &str {
        &self.gateway_physical_id
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Convert every source to its wire form, enforcing the per-report cap.
    pub fn to_metric_data(&self) -> ReportResult<Vec<MetricData>> {
        if self.sources.len() > MAX_DATA_SOURCES {
            return Err(ReportError::TooManyDataSources {
                max: MAX_DATA_SOURCES,
                count: self.sources.len(),
            });
        }
        Ok(self.sources.values().map(DataSourceData::to_metric_data).collect())
    }
}
