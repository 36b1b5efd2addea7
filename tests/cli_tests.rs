use clap::Parser;
use looker_rtl::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn test_defaults() {
    let cli = Cli::parse_from(["lkr", "versions"]);

    assert_eq!(cli.config, PathBuf::from("looker.ini"));
    assert_eq!(cli.section, None);
    assert_eq!(cli.env_prefix, "LOOKERSDK");
    assert_eq!(cli.verbose, 0);
    assert!(matches!(cli.command, Commands::Versions));
}

#[test]
fn test_global_options() {
    let cli = Cli::parse_from([
        "lkr",
        "-vv",
        "--config",
        "other.ini",
        "--section",
        "Staging",
        "--env-prefix",
        "",
        "me",
    ]);

    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.config, PathBuf::from("other.ini"));
    assert_eq!(cli.section.as_deref(), Some("Staging"));
    assert_eq!(cli.env_prefix, "");
    assert_eq!(cli.get_log_level(), tracing::Level::INFO);
}

#[test]
fn test_config_command() {
    let cli = Cli::parse_from(["lkr", "config", "--show-secrets"]);

    match cli.command {
        Commands::Config { show_secrets } => assert!(show_secrets),
        _ => panic!("Expected Config command"),
    }
}

#[test]
fn test_login_command() {
    let cli = Cli::parse_from(["lkr", "login"]);
    assert!(matches!(cli.command, Commands::Login { revoke: false }));

    let cli = Cli::parse_from(["lkr", "login", "--revoke"]);
    assert!(matches!(cli.command, Commands::Login { revoke: true }));
}

#[test]
fn test_me_command_with_fields() {
    let cli = Cli::parse_from(["lkr", "me", "--fields", "id,email"]);

    match cli.command {
        Commands::Me { fields, as_user } => {
            assert_eq!(fields.as_deref(), Some("id,email"));
            assert_eq!(as_user, None);
        }
        _ => panic!("Expected Me command"),
    }
}

#[test]
fn test_me_command_as_other_user() {
    let cli = Cli::parse_from(["lkr", "me", "--as", "42"]);

    match cli.command {
        Commands::Me { as_user, .. } => assert_eq!(as_user.as_deref(), Some("42")),
        _ => panic!("Expected Me command"),
    }
}

#[test]
fn test_get_command_with_query() {
    let cli = Cli::parse_from(["lkr", "get", "/dashboards", "-q", "fields=id", "--query", "limit=5"]);

    match cli.command {
        Commands::Get { path, query } => {
            assert_eq!(path, "/dashboards");
            assert_eq!(query, vec!["fields=id", "limit=5"]);
        }
        _ => panic!("Expected Get command"),
    }
}

#[test]
fn test_get_requires_path() {
    assert!(Cli::try_parse_from(["lkr", "get"]).is_err());
}

#[test]
fn test_log_levels() {
    let levels = [
        (0, tracing::Level::ERROR),
        (1, tracing::Level::WARN),
        (3, tracing::Level::DEBUG),
        (5, tracing::Level::TRACE),
    ];
    for (count, expected) in levels {
        let mut args = vec!["lkr".to_string()];
        if count > 0 {
            args.push(format!("-{}", "v".repeat(count)));
        }
        args.push("versions".to_string());
        assert_eq!(Cli::parse_from(args).get_log_level(), expected);
    }
}
