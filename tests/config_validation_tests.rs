//! Config Validation Tests
//!
//! Typo detection (unknown keys with suggestions) and fatal range /
//! consistency checks, exercised through the public config API.

use aerotwin::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use aerotwin::config::{ConfigError, MonitorConfig};
use aerotwin::types::Channel;
use std::io::Write;

const FULL_CONFIG: &str = r#"
[monitor]
cadence_secs = 2
window_size = 30
seed = 7

[detection]
robust_z_threshold = 4.0
min_window_for_scoring = 10
surge_margin_floor_percent = 12.5
flag_precision_decimals = 3

[physics]
surge_pressure_ratio = 9.5

[server]
enabled = false
addr = "127.0.0.1:9090"

[export]
csv_path = "stats.csv"
interval_secs = 60

[machines.bay-1]
T_in = { mean = 25.0, stddev = 5.0 }
T_out = { mean = 400.0, stddev = 30.0 }
RPM = { mean = 20000.0, stddev = 1000.0 }
Vibration = { mean = 0.3, stddev = 0.1 }
PressureRatio = { mean = 12.0, stddev = 1.0 }
"#;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_detection_section_warns_with_suggestion() {
    let toml_str = r#"
[detection]
robust_z_treshold = 3.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("robust_z_treshold"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("detection.robust_z_threshold")
    );
}

#[test]
fn valid_config_produces_zero_warnings() {
    assert!(validate_unknown_keys(FULL_CONFIG).is_empty());
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("[monitor]\ncompletely_unrelated_option = 1\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
}

#[test]
fn known_keys_cover_every_section() {
    let keys = known_config_keys();
    for section in ["monitor", "detection", "physics", "server", "export", "machines"] {
        assert!(keys.contains(section), "missing section {section}");
    }
    assert_eq!(
        suggest_correction("monitor.windw_size", keys.iter().copied()).as_deref(),
        Some("monitor.window_size")
    );
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn full_config_parses_every_field() {
    let config = MonitorConfig::from_toml_str(FULL_CONFIG).unwrap();
    assert_eq!(config.monitor.cadence_secs, 2);
    assert_eq!(config.monitor.window_size, 30);
    assert_eq!(config.monitor.seed, Some(7));
    assert_eq!(config.detection.robust_z_threshold, 4.0);
    assert_eq!(config.detection.min_window_for_scoring, 10);
    assert_eq!(config.detection.surge_margin_floor_percent, 12.5);
    assert_eq!(config.detection.flag_precision_decimals, 3);
    assert_eq!(config.physics.surge_pressure_ratio, 9.5);
    assert!(!config.server.enabled);
    assert_eq!(config.server.addr, "127.0.0.1:9090");
    assert_eq!(config.export.interval_secs, 60);
    assert_eq!(config.machine_ids(), vec!["bay-1".to_string()]);
    assert_eq!(config.machines["bay-1"].measured().len(), Channel::MEASURED.len());
}

#[test]
fn load_from_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();
    let config = MonitorConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.machine_ids(), vec!["bay-1".to_string()]);
}

#[test]
fn explicit_file_that_does_not_exist_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = MonitorConfig::load(Some(path.as_path())).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_, _)));
}

#[test]
fn malformed_toml_is_parse_error() {
    let err = MonitorConfig::from_toml_str("[monitor\ncadence_secs = 5").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_, _)));
}

// ============================================================================
// Fatal validation
// ============================================================================

#[test]
fn zero_cadence_is_fatal() {
    let err = MonitorConfig::from_toml_str("[monitor]\ncadence_secs = 0\n").unwrap_err();
    assert!(err.to_string().contains("cadence_secs must be > 0"));
}

#[test]
fn non_positive_threshold_is_fatal() {
    let err = MonitorConfig::from_toml_str("[detection]\nrobust_z_threshold = 0.0\n").unwrap_err();
    assert!(err.to_string().contains("robust_z_threshold"));
}

#[test]
fn unknown_channel_is_fatal() {
    let toml_str = FULL_CONFIG.replace("Vibration = ", "Vibes = ");
    let err = MonitorConfig::from_toml_str(&toml_str).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("unknown channel 'Vibes'"), "{msg}");
    assert!(msg.contains("missing baseline for channel 'Vibration'"), "{msg}");
}

#[test]
fn negative_stddev_is_fatal() {
    let toml_str = FULL_CONFIG.replace("stddev = 30.0", "stddev = -30.0");
    let err = MonitorConfig::from_toml_str(&toml_str).unwrap_err();
    assert!(err.to_string().contains("cannot be negative"));
}

#[test]
fn empty_machines_table_is_fatal() {
    let err = MonitorConfig::from_toml_str("[machines]\n").unwrap_err();
    assert!(err.to_string().contains("at least one"));
}

#[test]
fn surge_floor_out_of_range_is_error() {
    let mut config = MonitorConfig::default();
    config.detection.surge_margin_floor_percent = 150.0;
    let (errors, _) = validate_physical_ranges(&config);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("surge_margin_floor_percent"));
}

#[test]
fn pressure_ratio_below_surge_line_warns() {
    let mut config = MonitorConfig::default();
    config.physics.surge_pressure_ratio = 12.5;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 3);
    assert!(warnings.iter().all(|w| w.field.ends_with("PressureRatio.mean")));
}
