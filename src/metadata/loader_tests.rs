//! Tests for metadata loading and override merging.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use super::*;

fn write_override(dir: &Path, provider: &str, name: &str, content: &str) {
    let provider_dir = dir.join(provider);
    fs::create_dir_all(&provider_dir).unwrap();
    fs::write(provider_dir.join(name), content).unwrap();
}

mod bundled {
    use super::*;

    #[test]
    fn every_bundled_provider_loads() {
        let loader = MetadataLoader::new();

        for provider in PROVIDER_TYPES {
            let metadata = loader.load(provider).unwrap();
            assert_eq!(metadata.provider_type, *provider);
            assert!(!metadata.label.is_empty(), "{provider} has no label");
            assert!(!metadata.instructions.is_empty(), "{provider} has no instructions");
        }
    }

    #[test]
    fn webhook_fields_are_ordered_and_flagged() {
        let metadata = MetadataLoader::new().load("webhook").unwrap();

        let keys: Vec<_> = metadata
            .credential_fields
            .iter()
            .map(|f| f.key.as_str())
            .collect();
        assert_eq!(
            keys,
            [
                "secret",
                "previous_secret",
                "previous_secret_invalid_at",
                "secrets",
                "rotate_secret"
            ]
        );
        assert!(metadata.is_sensitive_credential("secret"));
        assert!(metadata.is_sensitive_credential("secrets"));
        assert!(!metadata.is_sensitive_credential("rotate_secret"));
        assert!(!metadata.is_sensitive_credential("previous_secret_invalid_at"));
        assert!(!metadata.is_sensitive_config("url"));
    }

    #[test]
    fn unknown_type_is_not_found() {
        let result = MetadataLoader::new().load("carrier_pigeon");

        assert!(matches!(
            result,
            Err(MetadataError::NotFound { file: "core.json", .. })
        ));
    }

    #[test]
    fn path_like_type_is_rejected() {
        let result = MetadataLoader::new().load("../webhook");
        assert!(matches!(result, Err(MetadataError::InvalidType(_))));
    }

    #[test]
    fn serialized_form_skips_schema() {
        let metadata = MetadataLoader::new().load("hookdeck").unwrap();
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["type"], "hookdeck");
        assert!(json.get("validation").is_none());
        assert_eq!(json["remote_setup_url"], "https://dashboard.hookdeck.com/sources");
    }
}

mod overrides {
    use super::*;

    #[test]
    fn ui_override_replaces_only_non_empty_fields() {
        let dir = TempDir::new().unwrap();
        write_override(
            dir.path(),
            "webhook",
            "ui.json",
            r#"{"label": "Custom Hook", "description": "", "icon": "bolt"}"#,
        );

        let metadata = MetadataLoader::with_override_dir(dir.path())
            .load("webhook")
            .unwrap();

        assert_eq!(metadata.label, "Custom Hook");
        assert_eq!(metadata.icon, "bolt");
        assert_eq!(
            metadata.description,
            "Send events to an HTTP endpoint as signed POST requests."
        );
    }

    #[test]
    fn core_fields_in_override_are_ignored() {
        let dir = TempDir::new().unwrap();
        write_override(
            dir.path(),
            "webhook",
            "ui.json",
            r#"{"type": "evil", "config_fields": [], "label": "Hook"}"#,
        );
        write_override(
            dir.path(),
            "webhook",
            "core.json",
            r#"{"type": "evil", "config_fields": [], "credential_fields": []}"#,
        );

        let metadata = MetadataLoader::with_override_dir(dir.path())
            .load("webhook")
            .unwrap();

        assert_eq!(metadata.provider_type, "webhook");
        assert_eq!(metadata.config_fields.len(), 1);
        assert_eq!(metadata.label, "Hook");
    }

    #[test]
    fn instructions_override_wins() {
        let dir = TempDir::new().unwrap();
        write_override(dir.path(), "rabbitmq", "instructions.md", "Ask ops for a vhost.");

        let metadata = MetadataLoader::with_override_dir(dir.path())
            .load("rabbitmq")
            .unwrap();

        assert_eq!(metadata.instructions, "Ask ops for a vhost.");
    }

    #[test]
    fn missing_override_falls_back_to_bundled() {
        let dir = TempDir::new().unwrap();

        let overridden = MetadataLoader::with_override_dir(dir.path())
            .load("aws_s3")
            .unwrap();
        let bundled = MetadataLoader::new().load("aws_s3").unwrap();

        assert_eq!(overridden.label, bundled.label);
        assert_eq!(overridden.instructions, bundled.instructions);
    }

    #[test]
    fn malformed_ui_override_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        write_override(dir.path(), "webhook", "ui.json", "{not json");

        let result = MetadataLoader::with_override_dir(dir.path()).load("webhook");

        assert!(matches!(
            result,
            Err(MetadataError::Parse { file: "ui.json", .. })
        ));
    }
}
