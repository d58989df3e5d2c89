//! Tests for CLI argument parsing.

use std::path::PathBuf;

use super::cli::{Cli, Command};

mod parsing {
    use super::*;

    #[test]
    fn parse_init_default_output() {
        let cli = Cli::parse_from_iter(["dest-registry", "init"]);

        assert!(cli.is_init());
        match cli.command {
            Command::Init { output } => assert_eq!(output, PathBuf::from("dest-registry.toml")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_global_options_after_subcommand() {
        let cli = Cli::parse_from_iter([
            "dest-registry",
            "providers",
            "--metadata-path",
            "~/meta",
            "--header-prefix",
            "x-acme-",
            "--http-timeout",
            "5",
            "-v",
        ]);

        assert_eq!(cli.metadata_path.as_deref(), Some("~/meta"));
        assert_eq!(cli.header_prefix.as_deref(), Some("x-acme-"));
        assert_eq!(cli.http_timeout, Some(5));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Providers { provider_type: None }));
    }

    #[test]
    fn parse_providers_with_type() {
        let cli = Cli::parse_from_iter(["dest-registry", "providers", "--type", "webhook"]);

        assert!(matches!(
            cli.command,
            Command::Providers { provider_type: Some(ref t) } if t == "webhook"
        ));
    }

    #[test]
    fn parse_validate_and_target() {
        let validate = Cli::parse_from_iter(["dest-registry", "validate", "-d", "dest.json"]);
        assert!(matches!(
            validate.command,
            Command::Validate { ref destination } if destination == &PathBuf::from("dest.json")
        ));

        let target =
            Cli::parse_from_iter(["dest-registry", "target", "--destination", "dest.json"]);
        assert!(matches!(target.command, Command::Target { .. }));
    }

    #[test]
    fn parse_publish_with_timeout() {
        let cli = Cli::parse_from_iter([
            "dest-registry",
            "--config",
            "custom.toml",
            "publish",
            "--destination",
            "dest.json",
            "--event",
            "event.json",
            "--timeout",
            "10",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert_eq!(cli.publish_timeout(), Some(10));
        match cli.command {
            Command::Publish {
                destination, event, ..
            } => {
                assert_eq!(destination, PathBuf::from("dest.json"));
                assert_eq!(event, PathBuf::from("event.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn publish_timeout_absent_for_other_commands() {
        let cli = Cli::parse_from_iter(["dest-registry", "providers"]);

        assert_eq!(cli.publish_timeout(), None);
    }
}

mod rejection {
    use super::*;

    #[test]
    fn subcommand_is_required() {
        let result = <Cli as clap::Parser>::try_parse_from(["dest-registry"]);

        assert!(result.is_err());
    }

    #[test]
    fn publish_requires_event() {
        let result = <Cli as clap::Parser>::try_parse_from([
            "dest-registry",
            "publish",
            "--destination",
            "dest.json",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        let result =
            <Cli as clap::Parser>::try_parse_from(["dest-registry", "--http-timeout", "soon", "providers"]);

        assert!(result.is_err());
    }
}
