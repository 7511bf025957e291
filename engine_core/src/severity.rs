// Severity classification: raw domain facts -> effect tier.
// Pure lookups. Unknown values fall to the lowest tier, never an error.

use crate::types::*;

/// Earthquake scale at or above which an update is critical (intensity 5-strong).
pub const CRITICAL_SCALE: i32 = 50;
/// Earthquake scale at or above which an update is an alert (intensity 3).
pub const ALERT_SCALE: i32 = 30;

pub fn classify_news(new_article_count: usize, alert_threshold: usize) -> EffectLevel {
    if new_article_count >= alert_threshold {
        EffectLevel::Alert
    } else {
        EffectLevel::Incoming
    }
}

/// 45 (5-weak) stays an alert; only 50 and above is critical.
pub fn classify_earthquake(max_scale: i32) -> EffectLevel {
    if max_scale >= CRITICAL_SCALE {
        EffectLevel::Critical
    } else if max_scale >= ALERT_SCALE {
        EffectLevel::Alert
    } else {
        EffectLevel::Incoming
    }
}

/// Cancellations report at the lowest tier.
pub fn classify_tsunami(advisory: &TsunamiAdvisory) -> EffectLevel {
    if advisory.cancelled {
        EffectLevel::Incoming
    } else if advisory.areas.iter().any(|a| a.immediate) {
        EffectLevel::Critical
    } else {
        EffectLevel::Alert
    }
}

pub fn classify_warning(max_severity: WarningSeverity) -> EffectLevel {
    match max_severity {
        WarningSeverity::Special => EffectLevel::Critical,
        WarningSeverity::Warning => EffectLevel::Alert,
        WarningSeverity::Advisory | WarningSeverity::None => EffectLevel::Incoming,
    }
}

pub fn severity_rank(severity: WarningSeverity) -> u8 {
    match severity {
        WarningSeverity::Special => 3,
        WarningSeverity::Warning => 2,
        WarningSeverity::Advisory => 1,
        WarningSeverity::None => 0,
    }
}

// =============================================================================
// JMA seismic intensity
// =============================================================================

/// The nine JMA intensity grades as reported by P2P (`maxScale`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeismicIntensity {
    One,
    Two,
    Three,
    Four,
    FiveLower,
    FiveUpper,
    SixLower,
    SixUpper,
    Seven,
}

impl SeismicIntensity {
    pub fn from_scale(scale: i32) -> Option<Self> {
        let intensity = match scale {
            10 => SeismicIntensity::One,
            20 => SeismicIntensity::Two,
            30 => SeismicIntensity::Three,
            40 => SeismicIntensity::Four,
            45 => SeismicIntensity::FiveLower,
            50 => SeismicIntensity::FiveUpper,
            55 => SeismicIntensity::SixLower,
            60 => SeismicIntensity::SixUpper,
            70 => SeismicIntensity::Seven,
            _ => return None,
        };
        Some(intensity)
    }

    pub fn info(self) -> ScaleInfo {
        let (label, label_en, weight) = match self {
            SeismicIntensity::One => ("震度1", "1", 0.1),
            SeismicIntensity::Two => ("震度2", "2", 0.2),
            SeismicIntensity::Three => ("震度3", "3", 0.35),
            SeismicIntensity::Four => ("震度4", "4", 0.5),
            SeismicIntensity::FiveLower => ("震度5弱", "5-", 0.65),
            SeismicIntensity::FiveUpper => ("震度5強", "5+", 0.75),
            SeismicIntensity::SixLower => ("震度6弱", "6-", 0.85),
            SeismicIntensity::SixUpper => ("震度6強", "6+", 0.92),
            SeismicIntensity::Seven => ("震度7", "7", 1.0),
        };
        ScaleInfo {
            label,
            label_en,
            weight,
        }
    }
}

/// Display labels and render weight (0-1) for an intensity grade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleInfo {
    pub label: &'static str,
    pub label_en: &'static str,
    pub weight: f64,
}

const UNKNOWN_SCALE: ScaleInfo = ScaleInfo {
    label: "震度?",
    label_en: "?",
    weight: 0.0,
};

pub fn scale_info(scale: i32) -> ScaleInfo {
    SeismicIntensity::from_scale(scale)
        .map(SeismicIntensity::info)
        .unwrap_or(UNKNOWN_SCALE)
}

/// Headline shared by the effect layer and the breaking ticker.
pub fn earthquake_headline(report: &EarthquakeReport) -> String {
    format!(
        "地震速報: {} M{} 最大{}",
        report.hypocenter.name,
        report.hypocenter.magnitude,
        scale_info(report.max_scale).label
    )
}

// =============================================================================
// JMA weather warning codes
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WarningDefinition {
    pub name: String,
    pub severity: WarningSeverity,
}

/// Look up a JMA bosai warning code. Unknown codes are treated as advisories.
pub fn warning_definition(code: &str) -> WarningDefinition {
    let known = match code {
        "32" => Some(("暴風雪特別警報", WarningSeverity::Special)),
        "33" => Some(("大雨特別警報", WarningSeverity::Special)),
        "35" => Some(("暴風特別警報", WarningSeverity::Special)),
        "36" => Some(("大雪特別警報", WarningSeverity::Special)),
        "37" => Some(("波浪特別警報", WarningSeverity::Special)),
        "38" => Some(("高潮特別警報", WarningSeverity::Special)),
        "02" => Some(("暴風雪警報", WarningSeverity::Warning)),
        "03" => Some(("大雨警報", WarningSeverity::Warning)),
        "04" => Some(("洪水警報", WarningSeverity::Warning)),
        "05" => Some(("暴風警報", WarningSeverity::Warning)),
        "06" => Some(("大雪警報", WarningSeverity::Warning)),
        "07" => Some(("波浪警報", WarningSeverity::Warning)),
        "08" => Some(("高潮警報", WarningSeverity::Warning)),
        "10" => Some(("大雨注意報", WarningSeverity::Advisory)),
        "12" => Some(("大雪注意報", WarningSeverity::Advisory)),
        "13" => Some(("風雪注意報", WarningSeverity::Advisory)),
        "14" => Some(("雷注意報", WarningSeverity::Advisory)),
        "15" => Some(("強風注意報", WarningSeverity::Advisory)),
        "16" => Some(("波浪注意報", WarningSeverity::Advisory)),
        "17" => Some(("融雪注意報", WarningSeverity::Advisory)),
        "18" => Some(("洪水注意報", WarningSeverity::Advisory)),
        "19" => Some(("高潮注意報", WarningSeverity::Advisory)),
        "20" => Some(("濃霧注意報", WarningSeverity::Advisory)),
        "21" => Some(("乾燥注意報", WarningSeverity::Advisory)),
        "22" => Some(("なだれ注意報", WarningSeverity::Advisory)),
        "23" => Some(("低温注意報", WarningSeverity::Advisory)),
        "24" => Some(("霜注意報", WarningSeverity::Advisory)),
        "25" => Some(("着氷注意報", WarningSeverity::Advisory)),
        "26" => Some(("着雪注意報", WarningSeverity::Advisory)),
        "27" => Some(("その他の注意報", WarningSeverity::Advisory)),
        _ => None,
    };

    match known {
        Some((name, severity)) => WarningDefinition {
            name: name.to_string(),
            severity,
        },
        None => WarningDefinition {
            name: format!("気象情報(code:{})", code),
            severity: WarningSeverity::Advisory,
        },
    }
}

/// Fill blanks in a partially-populated warning from the code table, then
/// recompute the area's max severity.
pub fn normalize_warning_summary(summary: &mut WarningSummary) {
    for warning in &mut summary.active_warnings {
        if warning.severity == WarningSeverity::None || warning.name.is_empty() {
            let def = warning_definition(&warning.code);
            if warning.severity == WarningSeverity::None {
                warning.severity = def.severity;
            }
            if warning.name.is_empty() {
                warning.name = def.name;
            }
        }
    }
    summary.normalize();
}

// =============================================================================
// Tsunami summaries
// =============================================================================

/// Highest grade among non-cancelled advisories.
pub fn highest_tsunami_grade(advisories: &[TsunamiAdvisory]) -> Option<TsunamiGrade> {
    advisories
        .iter()
        .filter(|t| !t.cancelled)
        .flat_map(|t| t.areas.iter().map(|a| a.grade))
        .filter(|g| *g != TsunamiGrade::Unknown)
        .max()
}

/// Distinct area names across non-cancelled advisories, in first-seen order.
pub fn active_tsunami_areas(advisories: &[TsunamiAdvisory]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for area in advisories
        .iter()
        .filter(|t| !t.cancelled)
        .flat_map(|t| t.areas.iter())
    {
        if !names.contains(&area.name) {
            names.push(area.name.clone());
        }
    }
    names
}
