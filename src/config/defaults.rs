//! System-wide default constants.
//!
//! Centralises the numbers that configuration falls back to when a key is
//! absent. Grouped by subsystem for easy discovery.

// ============================================================================
// Monitor
// ============================================================================

/// Seconds between generation cycles on each machine worker.
pub const CADENCE_SECS: u64 = 5;

/// Readings kept in each machine's rolling window.
///
/// 50 readings at a 5 s cadence = a little over 4 minutes of context.
pub const WINDOW_SIZE: usize = 50;

/// Machines started when no `[machines]` table is configured.
pub const DEFAULT_MACHINE_IDS: [&str; 3] = ["compressor-1", "compressor-2", "compressor-3"];

// ============================================================================
// Detection
// ============================================================================

/// |robust z| above which a measured channel is flagged.
pub const ROBUST_Z_THRESHOLD: f64 = 3.5;

/// Minimum window length before statistical scoring is attempted.
pub const MIN_WINDOW_FOR_SCORING: usize = 5;

/// Surge margins below this percentage are always flagged.
pub const SURGE_MARGIN_FLOOR_PERCENT: f64 = 15.0;

/// Decimal places kept for values copied into anomaly flags.
pub const FLAG_PRECISION_DECIMALS: u32 = 2;

// ============================================================================
// Physics
// ============================================================================

/// Pressure ratio at the compressor surge line.
pub const SURGE_PRESSURE_RATIO: f64 = 10.0;

// ============================================================================
// Baseline (TFE731-class compressor)
// ============================================================================

/// Inlet temperature mean / stddev (°C)
pub const INLET_TEMPERATURE: (f64, f64) = (25.0, 5.0);
/// Outlet temperature mean / stddev (°C)
pub const OUTLET_TEMPERATURE: (f64, f64) = (400.0, 30.0);
/// Rotor speed mean / stddev (rpm)
pub const ROTOR_SPEED: (f64, f64) = (20_000.0, 1_000.0);
/// Vibration mean / stddev (mm/s)
pub const VIBRATION: (f64, f64) = (0.3, 0.1);
/// Pressure ratio mean / stddev
pub const PRESSURE_RATIO: (f64, f64) = (12.0, 1.0);

// ============================================================================
// Server / Export
// ============================================================================

/// HTTP bind address for the read-only API.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Seconds between CSV export rows.
pub const EXPORT_INTERVAL_SECS: u64 = 30;
