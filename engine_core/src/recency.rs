// Recency windows and visual decay. Pure functions of (item, now).
// Windowing only affects what is displayed; the differ keeps its own identity sets.

use serde::{Deserialize, Serialize};

use crate::severity::ALERT_SCALE;
use crate::types::*;

const HOUR_MS: u64 = 60 * 60 * 1000;

/// Display window for quakes at or below `ALERT_SCALE`.
pub const WEAK_QUAKE_WINDOW_MS: u64 = 3 * HOUR_MS;
/// Display window for everything stronger.
pub const STRONG_QUAKE_WINDOW_MS: u64 = 6 * HOUR_MS;
/// Time for a marker's render weight to fade to zero.
pub const FADE_MS: u64 = 6 * HOUR_MS;

pub fn quake_window_ms(max_scale: i32) -> u64 {
    if max_scale <= ALERT_SCALE {
        WEAK_QUAKE_WINDOW_MS
    } else {
        STRONG_QUAKE_WINDOW_MS
    }
}

/// Unparseable times are never recent. Times in the future count as just now.
pub fn is_recent_quake(report: &EarthquakeReport, now: Timestamp) -> bool {
    match report.occurred_at() {
        Some(at) => now.millis_since(at) < quake_window_ms(report.max_scale),
        None => false,
    }
}

pub fn filter_recent_quakes(reports: &[EarthquakeReport], now: Timestamp) -> Vec<EarthquakeReport> {
    reports
        .iter()
        .filter(|eq| is_recent_quake(eq, now))
        .cloned()
        .collect()
}

/// Strongest quake still inside its window; the first one wins a tie.
pub fn find_recent_quake(reports: &[EarthquakeReport], now: Timestamp) -> Option<&EarthquakeReport> {
    reports
        .iter()
        .filter(|eq| is_recent_quake(eq, now))
        .reduce(|best, eq| if eq.max_scale > best.max_scale { eq } else { best })
}

/// Linear fade from `baseline` at the event to 0 at `FADE_MS`.
pub fn decay_intensity(event_time: Timestamp, now: Timestamp, baseline: f64) -> f64 {
    let elapsed = now.millis_since(event_time);
    if elapsed >= FADE_MS {
        return 0.0;
    }
    baseline * (1.0 - elapsed as f64 / FADE_MS as f64)
}

/// Past the fade horizon. Markers for old quakes are drawn muted.
pub fn is_faded(event_time: Timestamp, now: Timestamp) -> bool {
    now.millis_since(event_time) > FADE_MS
}

/// Summary flags for the status banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardFlags {
    pub has_tsunami: bool,
    pub has_warning: bool,
    pub has_special_warning: bool,
}

impl HazardFlags {
    pub fn from_snapshot(tsunamis: &[TsunamiAdvisory], warnings: &[WarningSummary]) -> Self {
        HazardFlags {
            has_tsunami: tsunamis.iter().any(|t| !t.cancelled),
            has_warning: warnings.iter().any(|w| w.max_severity >= WarningSeverity::Warning),
            has_special_warning: warnings
                .iter()
                .any(|w| w.max_severity == WarningSeverity::Special),
        }
    }
}
