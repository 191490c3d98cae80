//! Boolean switches read from the environment.
//!
//! Kept in its own test binary: it mutates the process environment, so no
//! other test may parse options concurrently.

use clap::Parser;

use icongen::cli::CliOptions;
use icongen::config::AppConfig;

fn set_flags(debug: &str, shared: &str, db_logging: &str) {
    // SAFETY: the only test in this binary, nothing else touches the environment
    unsafe {
        std::env::set_var("ICONGEN_DEBUG", debug);
        std::env::set_var("USE_SHARED_API_KEY", shared);
        std::env::set_var("ENABLE_DB_LOGGING", db_logging);
        std::env::set_var("ENABLE_PROMPT_ENHANCEMENT", "yes");
        std::env::remove_var("TEXT_API_KEY");
        std::env::remove_var("LOG_TRANSACTIONS");
        std::env::remove_var("LOG_API_REQUESTS");
        std::env::remove_var("LOG_SYSTEM_EVENTS");
    }
}

#[test]
fn boolean_env_switches_accept_boolish_values() {
    set_flags("1", "yes", "on");
    let cli = CliOptions::try_parse_from(["icongen", "--image-api-key", "img"])
        .expect("boolish truthy values parse");
    assert!(cli.debug);
    assert!(cli.use_shared_api_key);
    assert!(cli.enable_db_logging);
    let config = AppConfig::from_cli(cli).expect("config");
    assert!(config.server.debug);
    assert_eq!(config.enhancement.api_key.as_deref(), Some("img"));
    assert!(config.logging.enabled);
    assert!(config.logging.transactions);

    set_flags("0", "no", "off");
    let cli = CliOptions::try_parse_from([
        "icongen",
        "--image-api-key",
        "img",
        "--text-api-key",
        "txt",
    ])
    .expect("boolish falsy values parse");
    assert!(!cli.debug);
    assert!(!cli.use_shared_api_key);
    assert!(!cli.enable_db_logging);
    let config = AppConfig::from_cli(cli).expect("config");
    assert_eq!(config.enhancement.api_key.as_deref(), Some("txt"));
    assert!(!config.logging.any());

    set_flags("banana", "no", "off");
    assert!(CliOptions::try_parse_from(["icongen", "--image-api-key", "img"]).is_err());
}
