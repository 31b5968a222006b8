//! Config file loading against real files.

use pulse::{PulseConfig, PulseError};
use pulse_search::config::Depth;

#[test]
fn explicit_file_is_loaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[search]\ndepth = \"quick\"\nlookback_days = 10\n\n[social]\nhelper = \"bird-dev\"\n",
    )
    .expect("write");

    let config = PulseConfig::load(Some(&path)).expect("load");
    let search = config.search_config();
    assert_eq!(search.depth, Depth::Quick);
    assert_eq!(search.lookback_days, 10);
    assert_eq!(search.social.cli_program, "bird-dev");
    assert!(search.validate().is_ok());
}

#[test]
fn missing_explicit_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = PulseConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, PulseError::Config(_)));
    assert!(err.is_usage());
}

#[test]
fn invalid_toml_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[search\ndepth = ").expect("write");
    let err = PulseConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, PulseError::Config(_)));
}

#[test]
fn empty_file_gives_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").expect("write");
    let config = PulseConfig::from_file(&path).expect("load");
    assert_eq!(config, PulseConfig::default());
}

#[cfg(unix)]
#[test]
fn world_readable_file_still_loads() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[credentials]\nopenai_api_key = \"sk-test\"\n").expect("write");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).expect("chmod");

    let config = PulseConfig::from_file(&path).expect("load");
    assert_eq!(config.credentials.openai_api_key.as_deref(), Some("sk-test"));
    assert!(!format!("{:?}", config.credentials()).contains("sk-test"));
}
