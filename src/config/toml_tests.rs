//! Tests for TOML configuration parsing.

use super::toml::{TomlConfig, default_config_template};

mod parsing {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = TomlConfig::parse("").unwrap();

        assert!(config.metadata.path.is_none());
        assert!(config.webhook.header_prefix.is_none());
        assert!(!config.webhook.disable_signature_header);
        assert!(config.http.timeout.is_none());
        assert!(config.publish.timeout.is_none());
    }

    #[test]
    fn parse_full_webhook_section() {
        let toml = r#"
            [webhook]
            header_prefix = "x-acme-"
            disable_event_id_header = true
            disable_topic_header = true
            signature_content_template = "{{body}}"
            signature_header_template = "v1={{join signatures \",\"}}"
            signature_encoding = "base64"
            signature_algorithm = "hmac-sha1"
        "#;

        let config = TomlConfig::parse(toml).unwrap();
        let webhook = &config.webhook;

        assert_eq!(webhook.header_prefix.as_deref(), Some("x-acme-"));
        assert!(webhook.disable_event_id_header);
        assert!(!webhook.disable_timestamp_header);
        assert!(webhook.disable_topic_header);
        assert_eq!(webhook.signature_content_template.as_deref(), Some("{{body}}"));
        assert_eq!(
            webhook.signature_header_template.as_deref(),
            Some(r#"v1={{join signatures ","}}"#)
        );
        assert_eq!(webhook.signature_encoding.as_deref(), Some("base64"));
        assert_eq!(webhook.signature_algorithm.as_deref(), Some("hmac-sha1"));
    }

    #[test]
    fn parse_metadata_http_and_publish_sections() {
        let toml = r#"
            [metadata]
            path = "~/overrides"

            [http]
            timeout = 10
            user_agent = "acme-relay"

            [publish]
            timeout = 5
        "#;

        let config = TomlConfig::parse(toml).unwrap();

        assert_eq!(config.metadata.path.as_deref(), Some("~/overrides"));
        assert_eq!(config.http.timeout, Some(10));
        assert_eq!(config.http.user_agent.as_deref(), Some("acme-relay"));
        assert_eq!(config.publish.timeout, Some(5));
    }
}

mod rejection {
    use super::*;

    #[test]
    fn unknown_section_is_rejected() {
        let result = TomlConfig::parse("[retry]\nmax_attempts = 3\n");

        assert!(result.is_err());
    }

    #[test]
    fn unknown_webhook_key_is_rejected() {
        let result = TomlConfig::parse("[webhook]\nurl = \"https://example.com\"\n");

        assert!(result.is_err());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let result = TomlConfig::parse("[http]\ntimeout = \"thirty\"\n");

        assert!(result.is_err());
    }
}

mod template {
    use super::*;

    #[test]
    fn default_template_parses() {
        let template = default_config_template();

        let config = TomlConfig::parse(&template).unwrap();

        assert!(config.webhook.header_prefix.is_none());
        assert!(template.contains("[metadata]"));
        assert!(template.contains("[webhook]"));
        assert!(template.contains("[http]"));
        assert!(template.contains("[publish]"));
    }
}
