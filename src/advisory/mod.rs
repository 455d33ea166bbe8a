//! Template-based operator advisories
//!
//! Maps anomaly flags to a fixed advisory sentence per channel. Sentences are
//! emitted in table order (most safety-critical first), not flag order, and
//! joined with a single space. The mapping is a pure function: the same flags
//! always produce byte-identical text.

use crate::types::{AnomalyFlags, Channel};

/// Text returned when nothing is flagged.
pub const NOMINAL_ADVISORY: &str = "No recommendations; parameters within nominal range.";

/// Advisory sentence per channel, in emission order.
pub const ADVISORY_TABLE: [(Channel, &str); 6] = [
    (
        Channel::OutletTemperature,
        "High outlet temperature detected. Consider enhancing the cooling system \
         (e.g., adjusting cooling fins or increasing coolant flow).",
    ),
    (
        Channel::SurgeMargin,
        "Low surge margin detected. Consider revising compressor design or operating \
         parameters (e.g., reducing RPM or adjusting blade geometry) to improve stability.",
    ),
    (
        Channel::RotorSpeed,
        "High rotor speed detected. Evaluate operating conditions to reduce mechanical stress.",
    ),
    (
        Channel::Vibration,
        "Excessive vibration detected. Inspect for blade imbalances or misalignment.",
    ),
    (
        Channel::PressureRatio,
        "Abnormal pressure ratio detected. Consider modifying design parameters to \
         ensure proper compression efficiency.",
    ),
    (
        Channel::InletTemperature,
        "Inlet temperature deviation detected. Verify ambient conditions are within \
         acceptable limits.",
    ),
];

/// Advisory sentence for a single channel.
pub fn advisory_for(channel: Channel) -> &'static str {
    ADVISORY_TABLE
        .iter()
        .find(|(c, _)| *c == channel)
        .map(|(_, text)| *text)
        .unwrap_or(NOMINAL_ADVISORY)
}

/// Build the operator recommendation for a set of flags.
pub fn recommend(flags: &AnomalyFlags) -> String {
    let sentences: Vec<&str> = ADVISORY_TABLE
        .iter()
        .filter(|(channel, _)| flags.contains(*channel))
        .map(|(_, text)| *text)
        .collect();

    if sentences.is_empty() {
        NOMINAL_ADVISORY.to_string()
    } else {
        sentences.join(" ")
    }
}
