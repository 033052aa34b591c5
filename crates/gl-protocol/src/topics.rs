//! MQTT topic builders for the fleet provisioning exchanges.
//!
//! The provisioning service fixes the topic hierarchy:
//! ```text
//! $aws/certificates/create/json
//! $aws/certificates/create/json/accepted
//! $aws/certificates/create/json/rejected
//! $aws/provisioning-templates/{template}/provision/json
//! $aws/provisioning-templates/{template}/provision/json/accepted
//! $aws/provisioning-templates/{template}/provision/json/rejected
//! ```

const CREATE_KEYS: &str = "$aws/certificates/create/json";
const TEMPLATES_PREFIX: &str = "$aws/provisioning-templates";

// ─── Certificate creation topics ───

pub fn create_keys_request() -> String {
    CREATE_KEYS.to_string()
}

pub fn create_keys_accepted() -> String {
    format!("{CREATE_KEYS}/accepted")
}

pub fn create_keys_rejected() -> String {
    format!("{CREATE_KEYS}/rejected")
}

// ─── Thing registration topics ───

pub fn register_thing_request(template_name: &str) -> String {
    format!("{TEMPLATES_PREFIX}/{template_name}/provision/json")
}

pub fn register_thing_accepted(template_name: &str) -> String {
    format!("{TEMPLATES_PREFIX}/{template_name}/provision/json/accepted")
}

pub fn register_thing_rejected(template_name: &str) -> String {
    format!("{TEMPLATES_PREFIX}/{template_name}/provision/json/rejected")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_keys_topics() {
        assert_eq!(create_keys_request(), "$aws/certificates/create/json");
        assert_eq!(
            create_keys_accepted(),
            "$aws/certificates/create/json/accepted"
        );
        assert_eq!(
            create_keys_rejected(),
            "$aws/certificates/create/json/rejected"
        );
    }

    #[test]
    fn register_thing_topics() {
        assert_eq!(
            register_thing_request("T1"),
            "$aws/provisioning-templates/T1/provision/json"
        );
        assert_eq!(
            register_thing_accepted("T1"),
            "$aws/provisioning-templates/T1/provision/json/accepted"
        );
        assert_eq!(
            register_thing_rejected("T1"),
            "$aws/provisioning-templates/T1/provision/json/rejected"
        );
    }

    #[test]
    fn accepted_and_rejected_suffix_the_request_topic() {
        let request = register_thing_request("gridlink-gateway-provision");
        assert_eq!(
            register_thing_accepted("gridlink-gateway-provision"),
            format!("{request}/accepted")
        );
        assert_eq!(
            register_thing_rejected("gridlink-gateway-provision"),
            format!("{request}/rejected")
        );
    }
}
