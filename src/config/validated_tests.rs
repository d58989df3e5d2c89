//! Tests for validated configuration.

use std::time::Duration;

use super::ConfigError;
use super::cli::Cli;
use super::toml::TomlConfig;
use super::validated::{ValidatedConfig, write_default_config};
use crate::providers::webhook::{SignatureAlgorithm, SignatureEncoding};

/// Helper to create CLI args for the `providers` command
fn cli(args: &[&str]) -> Cli {
    let mut full_args = vec!["dest-registry"];
    full_args.extend(args);
    full_args.push("providers");
    Cli::parse_from_iter(full_args)
}

/// Helper to parse TOML config
fn toml(content: &str) -> TomlConfig {
    TomlConfig::parse(content).unwrap()
}

mod defaults {
    use super::*;

    #[test]
    fn empty_sources_use_defaults() {
        let config = ValidatedConfig::from_raw(&cli(&[]), None).unwrap();

        assert!(config.metadata_path.is_none());
        assert_eq!(config.webhook.header_prefix, "x-outpost-");
        assert_eq!(config.webhook.signature_algorithm, SignatureAlgorithm::HmacSha256);
        assert_eq!(config.webhook.signature_encoding, SignatureEncoding::Hex);
        assert!(config.webhook.signature_content_template.is_none());
        assert_eq!(config.http.timeout, Duration::from_secs(30));
        assert!(config.http.user_agent.starts_with("dest-registry/"));
        assert_eq!(config.publish_timeout, Duration::from_secs(30));
        assert!(!config.verbose);
    }

    #[test]
    fn display_summarizes_config() {
        let config = ValidatedConfig::from_raw(&cli(&[]), None).unwrap();

        let text = config.to_string();

        assert!(text.contains("metadata: bundled"), "{text}");
        assert!(text.contains("signature: hmac-sha256/hex"), "{text}");
    }
}

mod precedence {
    use super::*;

    #[test]
    fn toml_values_apply() {
        let toml = toml(
            r#"
            [webhook]
            header_prefix = "X-Acme-"
            disable_timestamp_header = true
            signature_encoding = "base64"
            signature_algorithm = "hmac-md5"

            [http]
            timeout = 7

            [publish]
            timeout = 3
        "#,
        );

        let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml)).unwrap();

        assert_eq!(config.webhook.header_prefix, "x-acme-");
        assert!(config.webhook.disable_timestamp_header);
        assert!(!config.webhook.disable_event_id_header);
        assert_eq!(config.webhook.signature_encoding, SignatureEncoding::Base64);
        assert_eq!(config.webhook.signature_algorithm, SignatureAlgorithm::HmacMd5);
        assert_eq!(config.http.timeout, Duration::from_secs(7));
        assert_eq!(config.publish_timeout, Duration::from_secs(3));
    }

    #[test]
    fn cli_overrides_toml() {
        let toml = toml(
            r#"
            [webhook]
            header_prefix = "x-acme-"

            [http]
            timeout = 7
        "#,
        );
        let cli = cli(&["--header-prefix", "x-cli-", "--http-timeout", "9"]);

        let config = ValidatedConfig::from_raw(&cli, Some(&toml)).unwrap();

        assert_eq!(config.webhook.header_prefix, "x-cli-");
        assert_eq!(config.http.timeout, Duration::from_secs(9));
    }

    #[test]
    fn publish_timeout_from_command() {
        let toml = toml("[publish]\ntimeout = 3\n");
        let cli = Cli::parse_from_iter([
            "dest-registry",
            "publish",
            "-d",
            "dest.json",
            "-e",
            "event.json",
            "--timeout",
            "12",
        ]);

        let config = ValidatedConfig::from_raw(&cli, Some(&toml)).unwrap();

        assert_eq!(config.publish_timeout, Duration::from_secs(12));
    }

    #[test]
    fn empty_templates_fall_back_to_defaults() {
        let toml = toml(
            r#"
            [webhook]
            signature_content_template = ""
            signature_header_template = "v1={{join signatures \" \"}}"
        "#,
        );

        let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml)).unwrap();

        assert!(config.webhook.signature_content_template.is_none());
        assert_eq!(
            config.webhook.signature_header_template.as_deref(),
            Some(r#"v1={{join signatures " "}}"#)
        );
    }
}

mod validation {
    use super::*;

    #[test]
    fn invalid_header_prefix_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&["--header-prefix", "x outpost "]), None);

        assert!(matches!(result, Err(ConfigError::InvalidHeaderPrefix { .. })));
    }

    #[test]
    fn broken_template_is_rejected() {
        let toml = toml("[webhook]\nsignature_content_template = \"{{#if}}\"\n");

        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));

        assert!(matches!(
            result,
            Err(ConfigError::InvalidTemplate {
                field: "webhook.signature_content_template",
                ..
            })
        ));
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let toml = toml("[webhook]\nsignature_encoding = \"base32\"\n");

        let error = ValidatedConfig::from_raw(&cli(&[]), Some(&toml)).unwrap_err();

        assert!(matches!(error, ConfigError::InvalidChoice { .. }));
        assert!(error.to_string().contains("hex, base64"), "{error}");
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let toml = toml("[webhook]\nsignature_algorithm = \"hmac-sha512\"\n");

        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));

        assert!(matches!(
            result,
            Err(ConfigError::InvalidChoice {
                field: "webhook.signature_algorithm",
                ..
            })
        ));
    }

    #[test]
    fn zero_durations_are_rejected() {
        let http = ValidatedConfig::from_raw(&cli(&["--http-timeout", "0"]), None);
        assert!(matches!(
            http,
            Err(ConfigError::InvalidDuration {
                field: "http.timeout",
                ..
            })
        ));

        let toml = toml("[publish]\ntimeout = 0\n");
        let publish = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));
        assert!(matches!(
            publish,
            Err(ConfigError::InvalidDuration {
                field: "publish.timeout",
                ..
            })
        ));
    }

    #[test]
    fn control_characters_in_user_agent_are_rejected() {
        let toml = toml("[http]\nuser_agent = \"bad\\nagent\"\n");

        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));

        assert!(matches!(result, Err(ConfigError::InvalidUserAgent { .. })));
    }
}

mod metadata_path {
    use super::*;

    #[test]
    fn tilde_is_expanded() {
        let Some(home) = dirs::home_dir() else {
            return;
        };

        let config =
            ValidatedConfig::from_raw(&cli(&["--metadata-path", "~/dest-meta"]), None).unwrap();

        assert_eq!(config.metadata_path, Some(home.join("dest-meta")));
    }

    #[test]
    fn missing_directory_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");

        let config =
            ValidatedConfig::from_raw(&cli(&["--metadata-path", missing.to_str().unwrap()]), None)
                .unwrap();

        assert_eq!(config.metadata_path, Some(missing));
    }

    #[test]
    fn file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let result = ValidatedConfig::from_raw(
            &cli(&["--metadata-path", file.path().to_str().unwrap()]),
            None,
        );

        assert!(matches!(result, Err(ConfigError::InvalidMetadataPath { .. })));
    }

    #[test]
    fn loader_reads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("webhook")).unwrap();
        std::fs::write(
            dir.path().join("webhook").join("instructions.md"),
            "Ask the platform team for a URL.",
        )
        .unwrap();
        let toml = toml(&format!(
            "[metadata]\npath = '{}'\n",
            dir.path().display()
        ));

        let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml)).unwrap();
        let metadata = config.metadata_loader().load("webhook").unwrap();

        assert_eq!(metadata.instructions, "Ask the platform team for a URL.");
    }
}

mod loading {
    use super::*;

    #[test]
    fn load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest-registry.toml");
        std::fs::write(&path, "[publish]\ntimeout = 4\n").unwrap();

        let cli = cli(&["--config", path.to_str().unwrap()]);
        let config = ValidatedConfig::load(&cli).unwrap();

        assert_eq!(config.publish_timeout, Duration::from_secs(4));
    }

    #[test]
    fn load_reports_missing_file() {
        let cli = cli(&["--config", "/nonexistent/dest-registry.toml"]);

        let result = ValidatedConfig::load(&cli);

        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn written_template_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest-registry.toml");

        write_default_config(&path).unwrap();
        let config = ValidatedConfig::load(&cli(&["--config", path.to_str().unwrap()])).unwrap();

        assert_eq!(config.webhook.header_prefix, "x-outpost-");
    }
}
