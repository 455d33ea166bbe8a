//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Unknown keys only warn; range violations are fatal.

use std::collections::HashSet;

use crate::types::Channel;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the set of valid dotted key paths outside the `[machines]` table.
///
/// Maintained manually to match the struct hierarchy in monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [monitor]
        "monitor",
        "monitor.cadence_secs",
        "monitor.window_size",
        "monitor.seed",
        // [detection]
        "detection",
        "detection.robust_z_threshold",
        "detection.min_window_for_scoring",
        "detection.surge_margin_floor_percent",
        "detection.flag_precision_decimals",
        // [physics]
        "physics",
        "physics.surge_pressure_ratio",
        // [server]
        "server",
        "server.enabled",
        "server.addr",
        // [export]
        "export",
        "export.csv_path",
        "export.interval_secs",
        // [machines]
        "machines",
    ];
    keys.iter().copied().collect()
}

/// Field names allowed inside a `machines.<id>.<channel>` table.
const BASELINE_FIELDS: [&str; 2] = ["mean", "stddev"];

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest candidate for an unknown key, if within edit distance 3.
pub fn suggest_correction<'a, I>(unknown: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, usize)> = None;
    for k in candidates {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((k, dist)),
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Machine ids under `[machines]` are free-form; below them only channel
/// names and `mean`/`stddev` are checked. Unknown channel names are also
/// rejected later by validation, the warning here just adds a suggestion.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    if let Some(table) = value.as_table() {
        for (section, section_value) in table {
            if section == "machines" {
                warnings.extend(machine_key_warnings(section_value));
                continue;
            }
            let mut section_root = toml::value::Table::new();
            section_root.insert(section.clone(), section_value.clone());
            for key in walk_toml_keys(&toml::Value::Table(section_root), "") {
                if !known.contains(key.as_str()) {
                    warnings.push(ValidationWarning {
                        suggestion: suggest_correction(&key, known.iter().copied()),
                        message: format!("Unknown config key '{key}'"),
                        field: key,
                    });
                }
            }
        }
    }

    warnings
}

fn machine_key_warnings(machines: &toml::Value) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let Some(machines) = machines.as_table() else {
        return warnings;
    };
    let channel_names: Vec<&str> = Channel::MEASURED.iter().map(Channel::name).collect();

    for (machine_id, channels) in machines {
        let Some(channels) = channels.as_table() else {
            continue;
        };
        for (channel, fields) in channels {
            let path = format!("machines.{machine_id}.{channel}");
            if !channel_names.contains(&channel.as_str()) {
                warnings.push(ValidationWarning {
                    suggestion: suggest_correction(channel, channel_names.iter().copied())
                        .map(|c| format!("machines.{machine_id}.{c}")),
                    message: format!("Unknown channel key '{path}'"),
                    field: path.clone(),
                });
                continue;
            }
            if let Some(fields) = fields.as_table() {
                for field in fields.keys() {
                    if !BASELINE_FIELDS.contains(&field.as_str()) {
                        let full = format!("{path}.{field}");
                        warnings.push(ValidationWarning {
                            suggestion: suggest_correction(field, BASELINE_FIELDS)
                                .map(|f| format!("{path}.{f}")),
                            message: format!("Unknown config key '{full}'"),
                            field: full,
                        });
                    }
                }
            }
        }
    }
    warnings
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed MonitorConfig.
///
/// Returns (errors, warnings): errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::MonitorConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Surge floor: a margin is a percentage of the operating pressure ratio
    let floor = config.detection.surge_margin_floor_percent;
    if floor.is_finite() && !(0.0..100.0).contains(&floor) {
        errors.push(format!(
            "detection.surge_margin_floor_percent = {floor:.1} is outside physical range (0-100%)"
        ));
    }

    for (machine_id, baseline) in &config.machines {
        for (channel, b) in baseline.measured() {
            // A flat channel has MAD 0 and can never flag
            if b.stddev == 0.0 {
                warnings.push(ValidationWarning {
                    field: format!("machines.{machine_id}.{channel}.stddev"),
                    message: format!(
                        "machines.{machine_id}.{channel}.stddev is 0, channel will never flag statistically"
                    ),
                    suggestion: None,
                });
            }

            let non_negative = matches!(
                channel,
                Channel::RotorSpeed | Channel::Vibration | Channel::PressureRatio
            );
            if non_negative && b.mean < 0.0 {
                errors.push(format!(
                    "machines.{machine_id}.{channel}.mean = {:.2} cannot be negative",
                    b.mean
                ));
            }
        }

        // Mean pressure ratio at or below the surge line means permanent alarms
        if let Some(pr) = baseline.get(Channel::PressureRatio) {
            if pr.mean <= config.physics.surge_pressure_ratio {
                warnings.push(ValidationWarning {
                    field: format!("machines.{machine_id}.PressureRatio.mean"),
                    message: format!(
                        "machines.{machine_id}.PressureRatio.mean ({:.2}) is at or below surge_pressure_ratio ({:.2})",
                        pr.mean, config.physics.surge_pressure_ratio
                    ),
                    suggestion: None,
                });
            }
        }
    }

    // Very slow cadence makes the window span hours
    if config.monitor.cadence_secs > 3_600 {
        warnings.push(ValidationWarning {
            field: "monitor.cadence_secs".to_string(),
            message: format!(
                "monitor.cadence_secs = {} is unusually slow (> 1 hour)",
                config.monitor.cadence_secs
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
