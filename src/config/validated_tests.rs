//! Tests for configuration validation and source selection.

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;

use super::cli::{Cli, LogLevel};
use super::toml::TomlConfig;
use super::validated::{ConfigSource, ValidatedConfig, write_default_config};
use super::{ConfigError, field};

const MINIMAL: &str = r#"
    [router]
    url = "https://fw.lan"
    key = "key"
    secret = "router-secret"

    [router.interfaces]
    wan1 = "wan"
    wan2 = "opt1"

    [dns]
    token = "dns-token"
    zone = "example.com"

    [[records]]
    hostname = "server"
    interfaces = ["wan1", "wan2"]

    [[records]]
    hostname = "@"
    interfaces = ["wan1"]
"#;

fn cli(args: &[&str]) -> Cli {
    Cli::parse_from(std::iter::once("wan-dyndns").chain(args.iter().copied()))
}

fn validate(toml: &str) -> Result<ValidatedConfig, ConfigError> {
    validate_with(toml, &[])
}

fn validate_with(toml: &str, args: &[&str]) -> Result<ValidatedConfig, ConfigError> {
    let raw = TomlConfig::parse(toml)?;
    ValidatedConfig::from_raw(&cli(args), &raw, ConfigSource::Environment)
}

/// `MINIMAL` with `extra` appended.
fn with(extra: &str) -> String {
    format!("{MINIMAL}\n{extra}")
}

fn no_vars(_: &str) -> Option<String> {
    None
}

mod defaults {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = validate(MINIMAL).unwrap();

        assert_eq!(config.router.url.as_str(), "https://fw.lan/");
        assert!(config.router.verify_ssl);
        assert_eq!(config.router.interfaces.len(), 2);
        assert_eq!(config.dns.ttl, 300);
        assert!(config.dns.retire.is_empty());
        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(!config.dry_run);
        assert!(!config.once);
        assert!(config.health_port.is_none());
        assert_eq!(config.rate_limit.max_requests, 30);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.retry_policy.max_attempts, 3);
        assert_eq!(config.retry_policy.initial_delay, Duration::from_secs(1));
        assert_eq!(config.retry_policy.max_delay, Duration::from_secs(60));
        assert!(config.retry_policy.jitter);
        assert!(config.notify.is_none());
        assert_eq!(config.log_level, LogLevel::Info);

        let verify = config.verify.unwrap();
        assert_eq!(verify.nameservers.len(), 3);
        assert_eq!(verify.timeout, Duration::from_secs(5));
        assert_eq!(verify.delay, Duration::from_secs(2));
    }

    #[test]
    fn records_keep_declaration_order() {
        let config = validate(MINIMAL).unwrap();

        let hostnames: Vec<&str> = config.records.iter().map(|r| r.hostname.as_str()).collect();
        assert_eq!(hostnames, vec!["server", "@"]);
        assert_eq!(config.records[0].interface_refs, vec!["wan1", "wan2"]);
    }

    #[test]
    fn zone_trailing_dot_is_dropped() {
        let toml = MINIMAL.replace("zone = \"example.com\"", "zone = \"example.com.\"");
        assert_eq!(validate(&toml).unwrap().dns.zone, "example.com");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = validate(&with(
            r#"
            [settings]
            interval = 60
            health_port = 9000
            verify_delay = 0.25

            [rate_limit]
            max_requests = 5
            window = 10

            [retry]
            max_attempts = 4
            initial_delay_ms = 250
            max_delay_ms = 2000
            multiplier = 1.5
            jitter = false

            [verify]
            nameservers = ["ns.example.net"]
            timeout = 1.0
            "#,
        ))
        .unwrap();

        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.health_port, Some(9000));
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.retry_policy.max_attempts, 4);
        assert_eq!(
            config.retry_policy.initial_delay,
            Duration::from_millis(250)
        );
        assert!(!config.retry_policy.jitter);
        let verify = config.verify.unwrap();
        assert_eq!(verify.nameservers, vec!["ns.example.net"]);
        assert_eq!(verify.delay, Duration::from_millis(250));
    }

    #[test]
    fn verification_can_be_disabled() {
        let config = validate(&with("[verify]\nenabled = false")).unwrap();
        assert!(config.verify.is_none());
    }
}

mod cli_layering {
    use super::*;

    #[test]
    fn cli_dry_run_enables() {
        let config = validate_with(MINIMAL, &["--dry-run"]).unwrap();
        assert!(config.dry_run);
    }

    #[test]
    fn file_dry_run_cannot_be_disabled_by_cli() {
        let config = validate(&with("[settings]\ndry_run = true")).unwrap();
        assert!(config.dry_run);
    }

    #[test]
    fn once_and_log_level_come_from_cli() {
        let config = validate_with(MINIMAL, &["--once", "--log-level", "warning"]).unwrap();
        assert!(config.once);
        assert_eq!(config.log_level, LogLevel::Warning);
    }
}

mod required_fields {
    use super::*;

    fn missing_field(toml: &str) -> &'static str {
        match validate(toml) {
            Err(ConfigError::MissingRequired { field, .. }) => field,
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn router_url() {
        let toml = MINIMAL.replace("url = \"https://fw.lan\"", "");
        assert_eq!(missing_field(&toml), field::ROUTER_URL);
    }

    #[test]
    fn router_secret_blank() {
        let toml = MINIMAL.replace("\"router-secret\"", "\"  \"");
        assert_eq!(missing_field(&toml), field::ROUTER_SECRET);
    }

    #[test]
    fn dns_token() {
        let toml = MINIMAL.replace("token = \"dns-token\"", "");
        assert_eq!(missing_field(&toml), field::DNS_TOKEN);
    }

    #[test]
    fn dns_zone() {
        let toml = MINIMAL.replace("zone = \"example.com\"", "");
        assert_eq!(missing_field(&toml), field::DNS_ZONE);
    }

    #[test]
    fn interfaces() {
        let toml = MINIMAL
            .replace("wan1 = \"wan\"", "")
            .replace("wan2 = \"opt1\"", "");
        assert_eq!(missing_field(&toml), field::ROUTER_INTERFACES);
    }

    #[test]
    fn records() {
        let toml = MINIMAL.split("[[records]]").next().unwrap().to_string();
        assert_eq!(missing_field(&toml), field::RECORDS);
    }
}

mod invalid_values {
    use super::*;

    #[test]
    fn unparsable_router_url() {
        let toml = MINIMAL.replace("https://fw.lan", "not a url");
        assert!(matches!(validate(&toml), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn non_http_router_url() {
        let toml = MINIMAL.replace("https://fw.lan", "ftp://fw.lan");
        assert!(matches!(validate(&toml), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn zero_interval() {
        assert!(matches!(
            validate(&with("[settings]\ninterval = 0")),
            Err(ConfigError::InvalidValue {
                field: "settings.interval",
                ..
            })
        ));
    }

    #[test]
    fn ttl_below_minimum() {
        let toml = MINIMAL.replace("zone = \"example.com\"", "zone = \"example.com\"\nttl = 30");
        assert!(matches!(
            validate(&toml),
            Err(ConfigError::InvalidValue { field: "dns.ttl", .. })
        ));
    }

    #[test]
    fn ttl_at_minimum_is_accepted() {
        let toml = MINIMAL.replace("zone = \"example.com\"", "zone = \"example.com\"\nttl = 60");
        assert_eq!(validate(&toml).unwrap().dns.ttl, 60);
    }

    #[test]
    fn negative_verify_delay() {
        assert!(matches!(
            validate(&with("[settings]\nverify_delay = -1.0")),
            Err(ConfigError::InvalidValue {
                field: "settings.verify_delay",
                ..
            })
        ));
    }

    #[test]
    fn zero_health_port() {
        assert!(matches!(
            validate(&with("[settings]\nhealth_port = 0")),
            Err(ConfigError::InvalidValue {
                field: "settings.health_port",
                ..
            })
        ));
    }

    #[test]
    fn empty_nameserver_list() {
        assert!(matches!(
            validate(&with("[verify]\nnameservers = []")),
            Err(ConfigError::InvalidValue {
                field: "verify.nameservers",
                ..
            })
        ));
    }

    #[test]
    fn zero_rate_limit() {
        assert!(matches!(
            validate(&with("[rate_limit]\nmax_requests = 0")),
            Err(ConfigError::InvalidRateLimit(_))
        ));
        assert!(matches!(
            validate(&with("[rate_limit]\nwindow = 0")),
            Err(ConfigError::InvalidRateLimit(_))
        ));
    }

    #[test]
    fn retry_values() {
        for retry in [
            "max_attempts = 0",
            "initial_delay_ms = 0",
            "multiplier = 0.5",
            "multiplier = nan",
            "initial_delay_ms = 5000\nmax_delay_ms = 1000",
        ] {
            let result = validate(&with(&format!("[retry]\n{retry}")));
            assert!(
                matches!(result, Err(ConfigError::InvalidRetry(_))),
                "{retry} should be rejected"
            );
        }
    }
}

mod records {
    use super::*;

    fn record_error(extra: &str) -> String {
        match validate(&with(extra)) {
            Err(ConfigError::InvalidRecords(reason)) => reason,
            other => panic!("expected InvalidRecords, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_hostname() {
        let reason = record_error("[[records]]\nhostname = \"server\"\ninterfaces = [\"wan1\"]");
        assert!(reason.contains("duplicate hostname 'server'"));
    }

    #[test]
    fn unknown_interface_reference() {
        let reason = record_error("[[records]]\nhostname = \"www\"\ninterfaces = [\"wan9\"]");
        assert!(reason.contains("unknown interface 'wan9'"));
    }

    #[test]
    fn repeated_interface_reference() {
        let reason =
            record_error("[[records]]\nhostname = \"www\"\ninterfaces = [\"wan1\", \"wan1\"]");
        assert!(reason.contains("twice"));
    }

    #[test]
    fn record_without_interfaces() {
        let reason = record_error("[[records]]\nhostname = \"www\"\ninterfaces = []");
        assert!(reason.contains("no interfaces"));
    }

    #[test]
    fn interface_references_are_trimmed() {
        let config =
            validate(&with("[[records]]\nhostname = \"www\"\ninterfaces = [\" wan1\", \"wan2 \"]"))
                .unwrap();

        assert_eq!(config.records[2].interface_refs, vec!["wan1", "wan2"]);
    }

    #[test]
    fn padded_repeat_is_still_a_repeat() {
        let reason =
            record_error("[[records]]\nhostname = \"www\"\ninterfaces = [\"wan1\", \" wan1\"]");
        assert!(reason.contains("twice"));
    }

    #[test]
    fn retired_hostname_that_is_live() {
        let toml = MINIMAL.replace(
            "zone = \"example.com\"",
            "zone = \"example.com\"\nretire = [\"server\"]",
        );
        assert!(matches!(
            validate(&toml),
            Err(ConfigError::InvalidRecords(reason)) if reason.contains("both a record and retired")
        ));
    }

    #[test]
    fn retired_hostnames_are_kept() {
        let toml = MINIMAL.replace(
            "zone = \"example.com\"",
            "zone = \"example.com\"\nretire = [\"old\", \"legacy\"]",
        );
        assert_eq!(validate(&toml).unwrap().dns.retire, vec!["old", "legacy"]);
    }
}

mod notification {
    use super::*;

    #[test]
    fn enabled_with_defaults() {
        let config = validate(&with("[notify]\nenabled = true")).unwrap();

        let notify = config.notify.unwrap();
        assert_eq!(notify.trigger_hostname, "@");
        assert_eq!(notify.label_selector, "ginsys.net/apex-dns=true");
    }

    #[test]
    fn trigger_must_be_a_record() {
        assert!(matches!(
            validate(&with("[notify]\nenabled = true\ntrigger_hostname = \"www\"")),
            Err(ConfigError::InvalidValue {
                field: "notify.trigger_hostname",
                ..
            })
        ));
    }

    #[test]
    fn disabled_ignores_trigger() {
        let config = validate(&with("[notify]\ntrigger_hostname = \"www\"")).unwrap();
        assert!(config.notify.is_none());
    }
}

mod secrets {
    use super::*;

    #[test]
    fn debug_and_display_hide_secrets() {
        let config = validate(MINIMAL).unwrap();

        let debug = format!("{config:?}");
        let display = config.to_string();
        for output in [&debug, &display] {
            assert!(!output.contains("router-secret"));
            assert!(!output.contains("dns-token"));
        }
        assert!(debug.contains("[redacted]"));
    }
}

mod sources {
    use super::*;
    use std::io::Write;

    fn env_vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn explicit_file_is_used() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{MINIMAL}").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = ValidatedConfig::load_from(
            &cli(&["--config", &path]),
            std::path::Path::new("/nonexistent/config.toml"),
            no_vars,
        )
        .unwrap();

        assert_eq!(config.source, ConfigSource::File(file.path().to_path_buf()));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let path = path.to_string_lossy().into_owned();

        let result = ValidatedConfig::load_from(
            &cli(&["--config", &path]),
            std::path::Path::new("/nonexistent/config.toml"),
            no_vars,
        );

        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn default_path_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let default_path = dir.path().join("config.toml");
        std::fs::write(&default_path, MINIMAL).unwrap();

        let config = ValidatedConfig::load_from(&cli(&[]), &default_path, no_vars).unwrap();

        assert_eq!(config.source, ConfigSource::File(default_path));
    }

    #[test]
    fn environment_is_used_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = env_vars(&[
            ("ROUTER_URL", "https://fw.lan"),
            ("ROUTER_KEY", "k"),
            ("ROUTER_SECRET", "s"),
            ("ROUTER_INTERFACES", "wan1=wan,wan2=opt1"),
            ("DNS_TOKEN", "t"),
            ("DNS_ZONE", "example.com"),
            ("DYNDNS_RECORDS", "server=wan1+wan2,www=wan1"),
            ("DYNDNS_DRY_RUN", "true"),
        ]);

        let config =
            ValidatedConfig::load_from(&cli(&[]), &dir.path().join("config.toml"), lookup)
                .unwrap();

        assert_eq!(config.source, ConfigSource::Environment);
        assert_eq!(config.records.len(), 2);
        assert!(config.dry_run);
    }

    #[test]
    fn environment_without_settings_reports_missing_url() {
        let dir = tempfile::tempdir().unwrap();

        let result =
            ValidatedConfig::load_from(&cli(&[]), &dir.path().join("config.toml"), no_vars);

        assert!(matches!(
            result,
            Err(ConfigError::MissingRequired {
                field: field::ROUTER_URL,
                ..
            })
        ));
    }

    #[test]
    fn file_substitutes_from_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            MINIMAL.replace("\"dns-token\"", "\"${HETZNER_TOKEN}\""),
        )
        .unwrap();

        let config =
            ValidatedConfig::load_from(&cli(&[]), &path, env_vars(&[("HETZNER_TOKEN", "abc")]))
                .unwrap();

        assert_eq!(config.dns.token, "abc");
    }
}

mod init {
    use super::*;

    #[test]
    fn writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");

        write_default_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[router]"));
        assert!(content.contains("[[records]]"));
    }

    #[test]
    fn unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.toml");

        assert!(matches!(
            write_default_config(&path),
            Err(ConfigError::FileWrite { .. })
        ));
    }
}
