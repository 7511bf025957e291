// Strong typing over strings. Newtypes for timestamps, tolerant enums for upstream codes.
// Payload types mirror the upstream API (camelCase); config stays snake_case.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Wall-clock time in milliseconds since the Unix epoch. Newtype for type safety.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn plus_millis(self, ms: u64) -> Self {
        Timestamp(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed since `earlier`; zero if `earlier` is in the future.
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Parse an upstream time string.
    ///
    /// Accepts RFC 3339 (news feeds) and the P2P quake format
    /// `YYYY/MM/DD HH:MM:SS(.fff)`, which is local Japan time.
    /// Returns `None` for anything else, including pre-epoch times.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Self::from_datetime(dt);
        }

        let jst = FixedOffset::east_opt(9 * 3600)?;
        ["%Y/%m/%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| jst.from_local_datetime(&naive).single())
            .and_then(Self::from_datetime)
    }

    fn from_datetime(dt: DateTime<FixedOffset>) -> Option<Self> {
        u64::try_from(dt.timestamp_millis()).ok().map(Timestamp)
    }
}

/// Screen-space point in map pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        ScreenPoint { x, y }
    }
}

// =============================================================================
// Upstream domain items
// =============================================================================

/// Region code used for nationwide news with no single prefecture.
pub const NATIONAL_REGION: &str = "national";

fn national_region() -> String {
    NATIONAL_REGION.to_string()
}

/// JIS prefecture codes, as used for map anchors.
const PREFECTURES: [(&str, &str); 47] = [
    ("01", "北海道"),
    ("02", "青森県"),
    ("03", "岩手県"),
    ("04", "宮城県"),
    ("05", "秋田県"),
    ("06", "山形県"),
    ("07", "福島県"),
    ("08", "茨城県"),
    ("09", "栃木県"),
    ("10", "群馬県"),
    ("11", "埼玉県"),
    ("12", "千葉県"),
    ("13", "東京都"),
    ("14", "神奈川県"),
    ("15", "新潟県"),
    ("16", "富山県"),
    ("17", "石川県"),
    ("18", "福井県"),
    ("19", "山梨県"),
    ("20", "長野県"),
    ("21", "岐阜県"),
    ("22", "静岡県"),
    ("23", "愛知県"),
    ("24", "三重県"),
    ("25", "滋賀県"),
    ("26", "京都府"),
    ("27", "大阪府"),
    ("28", "兵庫県"),
    ("29", "奈良県"),
    ("30", "和歌山県"),
    ("31", "鳥取県"),
    ("32", "島根県"),
    ("33", "岡山県"),
    ("34", "広島県"),
    ("35", "山口県"),
    ("36", "徳島県"),
    ("37", "香川県"),
    ("38", "愛媛県"),
    ("39", "高知県"),
    ("40", "福岡県"),
    ("41", "佐賀県"),
    ("42", "長崎県"),
    ("43", "熊本県"),
    ("44", "大分県"),
    ("45", "宮崎県"),
    ("46", "鹿児島県"),
    ("47", "沖縄県"),
];

/// Region code for a prefecture name such as `石川県`.
pub fn prefecture_code(name: &str) -> Option<&'static str> {
    PREFECTURES
        .iter()
        .find(|(_, pref)| *pref == name)
        .map(|(code, _)| *code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum NewsCategory {
    Disaster,
    Crime,
    Politics,
    Sports,
    #[default]
    Other,
}

impl From<String> for NewsCategory {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "disaster" => NewsCategory::Disaster,
            "crime" => NewsCategory::Crime,
            "politics" => NewsCategory::Politics,
            "sports" => NewsCategory::Sports,
            _ => NewsCategory::Other,
        }
    }
}

/// A classified news headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default = "national_region", alias = "prefectureCode")]
    pub region_code: String,
    #[serde(default, alias = "prefectureName")]
    pub region_name: String,
    #[serde(default)]
    pub is_breaking: bool,
    #[serde(default)]
    pub category: NewsCategory,
    #[serde(default, alias = "ogpImageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewsArticle {
    pub fn published(&self) -> Option<Timestamp> {
        Timestamp::parse(&self.published_at)
    }

    pub fn is_national(&self) -> bool {
        self.region_code == NATIONAL_REGION
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Hypocenter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub depth: f64,
    #[serde(default)]
    pub magnitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionIntensity {
    #[serde(alias = "pref")]
    pub region: String,
    pub max_scale: i32,
}

/// One P2P earthquake report. `max_scale` is the JMA ordinal (10..=70).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarthquakeReport {
    pub id: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub hypocenter: Hypocenter,
    #[serde(default)]
    pub max_scale: i32,
    #[serde(default)]
    pub domestic_tsunami: String,
    #[serde(default, alias = "prefectureIntensities")]
    pub region_intensities: Vec<RegionIntensity>,
}

impl EarthquakeReport {
    /// Intensity 4 and above is breaking.
    pub fn is_breaking(&self) -> bool {
        self.max_scale >= 40
    }

    pub fn occurred_at(&self) -> Option<Timestamp> {
        Timestamp::parse(&self.time)
    }
}

/// Tsunami grade ordered watch < warning < major warning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(from = "String")]
pub enum TsunamiGrade {
    #[default]
    Unknown,
    Watch,
    Warning,
    MajorWarning,
}

impl From<String> for TsunamiGrade {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Watch" => TsunamiGrade::Watch,
            "Warning" => TsunamiGrade::Warning,
            "MajorWarning" => TsunamiGrade::MajorWarning,
            _ => TsunamiGrade::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsunamiArea {
    pub name: String,
    #[serde(default)]
    pub grade: TsunamiGrade,
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsunamiAdvisory {
    pub id: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub areas: Vec<TsunamiArea>,
}

impl TsunamiAdvisory {
    pub fn is_breaking(&self) -> bool {
        !self.cancelled
    }

    /// First `limit` area names joined the way banners print them.
    pub fn area_summary(&self, limit: usize) -> String {
        self.areas
            .iter()
            .take(limit)
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join("、")
    }
}

/// Weather warning severity. Derived `Ord` follows the rank none < advisory < warning < special.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum WarningSeverity {
    #[default]
    None,
    Advisory,
    Warning,
    Special,
}

impl From<String> for WarningSeverity {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "special" => WarningSeverity::Special,
            "warning" => WarningSeverity::Warning,
            "advisory" => WarningSeverity::Advisory,
            _ => WarningSeverity::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWarning {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub severity: WarningSeverity,
    #[serde(default)]
    pub status: String,
}

/// Per-area weather warning roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningSummary {
    pub area_code: String,
    #[serde(default)]
    pub area_name: String,
    #[serde(default)]
    pub prefecture_name: String,
    #[serde(default)]
    pub max_severity: WarningSeverity,
    #[serde(default)]
    pub active_warnings: Vec<ActiveWarning>,
    #[serde(default)]
    pub report_datetime: String,
}

impl WarningSummary {
    pub fn computed_max_severity(&self) -> WarningSeverity {
        self.active_warnings
            .iter()
            .map(|w| w.severity)
            .max()
            .unwrap_or(WarningSeverity::None)
    }

    /// Re-establish `max_severity == max(active_warnings)`.
    pub fn normalize(&mut self) {
        self.max_severity = self.computed_max_severity();
    }
}

// =============================================================================
// Inbound snapshots
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewsSnapshot {
    #[serde(default)]
    pub news: Vec<NewsArticle>,
    #[serde(default)]
    pub fetched_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum UpstreamStatus {
    Ok,
    Error,
}

impl From<String> for UpstreamStatus {
    fn from(raw: String) -> Self {
        if raw == "ok" {
            UpstreamStatus::Ok
        } else {
            UpstreamStatus::Error
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSources {
    pub p2pquake: UpstreamStatus,
    pub jma_warning: UpstreamStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HazardMeta {
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub sources: Option<UpstreamSources>,
}

/// Full-replace snapshot of the seismic and weather feeds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HazardSnapshot {
    #[serde(default)]
    pub earthquakes: Vec<EarthquakeReport>,
    #[serde(default)]
    pub tsunamis: Vec<TsunamiAdvisory>,
    #[serde(default)]
    pub warnings: Vec<WarningSummary>,
    #[serde(default)]
    pub meta: HazardMeta,
}

// =============================================================================
// Effects and breaking items
// =============================================================================

/// Screen effect tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectLevel {
    Incoming,
    Alert,
    Critical,
}

impl EffectLevel {
    pub const ALL: [EffectLevel; 3] = [
        EffectLevel::Incoming,
        EffectLevel::Alert,
        EffectLevel::Critical,
    ];

    pub fn priority(self) -> u8 {
        match self {
            EffectLevel::Incoming => 0,
            EffectLevel::Alert => 1,
            EffectLevel::Critical => 2,
        }
    }

    /// One tier down for reduced motion. `None` means the effect is dropped.
    pub fn downgraded(self) -> Option<EffectLevel> {
        match self {
            EffectLevel::Critical => Some(EffectLevel::Alert),
            EffectLevel::Alert => Some(EffectLevel::Incoming),
            EffectLevel::Incoming => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self.priority() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectSource {
    News,
    Earthquake,
    Tsunami,
    Warning,
}

/// A detected update, candidate for the single effect slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectEvent {
    pub id: String,
    pub level: EffectLevel,
    pub source: EffectSource,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub region_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_article_count: Option<usize>,
}

impl EffectEvent {
    pub fn new(
        id: impl Into<String>,
        level: EffectLevel,
        source: EffectSource,
        timestamp: Timestamp,
    ) -> Self {
        EffectEvent {
            id: id.into(),
            level,
            source,
            timestamp,
            region_codes: Vec::new(),
            headline: None,
            magnitude: None,
            max_scale: None,
            new_article_count: None,
        }
    }

    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = Some(headline.into());
        self
    }
}

/// Ticker banner entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakingItem {
    pub id: String,
    pub title: String,
    pub region_name: String,
}

// =============================================================================
// Configuration
// =============================================================================

/// Engine configuration passed from JS. `{}` is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub effect_settings: EffectSettings,
    #[serde(default)]
    pub detection_settings: DetectionSettings,
    #[serde(default)]
    pub breaking_settings: BreakingSettings,
    #[serde(default)]
    pub card_settings: CardSettings,
    #[serde(default)]
    pub feed_settings: FeedSettings,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let cards = &self.card_settings;
        if !(cards.card_width > 0.0 && cards.card_height > 0.0) {
            return Err(EngineError::InvalidConfig(
                "card_width and card_height must be positive".to_string(),
            ));
        }
        if !(cards.margin >= 0.0) {
            return Err(EngineError::InvalidConfig("margin must not be negative".to_string()));
        }
        let feeds = &self.feed_settings;
        if feeds.news_poll_ms == 0 || feeds.hazard_poll_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "poll intervals must be non-zero".to_string(),
            ));
        }
        if feeds.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Arbiter timing and accessibility settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectSettings {
    /// Host reports `prefers-reduced-motion: reduce`.
    #[serde(default)]
    pub reduced_motion: bool,
    #[serde(default = "default_incoming_cooldown")]
    pub incoming_cooldown_ms: u64,
    #[serde(default = "default_alert_cooldown")]
    pub alert_cooldown_ms: u64,
    #[serde(default)]
    pub critical_cooldown_ms: u64,
    #[serde(default = "default_incoming_duration")]
    pub incoming_duration_ms: u64,
    #[serde(default = "default_alert_duration")]
    pub alert_duration_ms: u64,
    #[serde(default = "default_critical_duration")]
    pub critical_duration_ms: u64,
}

impl EffectSettings {
    pub fn cooldown_ms(&self, level: EffectLevel) -> u64 {
        match level {
            EffectLevel::Incoming => self.incoming_cooldown_ms,
            EffectLevel::Alert => self.alert_cooldown_ms,
            EffectLevel::Critical => self.critical_cooldown_ms,
        }
    }

    pub fn duration_ms(&self, level: EffectLevel) -> u64 {
        match level {
            EffectLevel::Incoming => self.incoming_duration_ms,
            EffectLevel::Alert => self.alert_duration_ms,
            EffectLevel::Critical => self.critical_duration_ms,
        }
    }
}

impl Default for EffectSettings {
    fn default() -> Self {
        EffectSettings {
            reduced_motion: false,
            incoming_cooldown_ms: default_incoming_cooldown(),
            alert_cooldown_ms: default_alert_cooldown(),
            critical_cooldown_ms: 0,
            incoming_duration_ms: default_incoming_duration(),
            alert_duration_ms: default_alert_duration(),
            critical_duration_ms: default_critical_duration(),
        }
    }
}

fn default_incoming_cooldown() -> u64 {
    10_000
}

fn default_alert_cooldown() -> u64 {
    5_000
}

fn default_incoming_duration() -> u64 {
    1_000
}

fn default_alert_duration() -> u64 {
    3_000
}

fn default_critical_duration() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Delay after the first non-empty snapshot before deltas count as new.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// New-article count at which a news batch becomes an alert.
    #[serde(default = "default_news_alert_threshold")]
    pub news_alert_threshold: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        DetectionSettings {
            settle_delay_ms: default_settle_delay(),
            news_alert_threshold: default_news_alert_threshold(),
        }
    }
}

fn default_settle_delay() -> u64 {
    100
}

fn default_news_alert_threshold() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakingSettings {
    #[serde(default = "default_breaking_display")]
    pub display_duration_ms: u64,
}

impl Default for BreakingSettings {
    fn default() -> Self {
        BreakingSettings {
            display_duration_ms: default_breaking_display(),
        }
    }
}

fn default_breaking_display() -> u64 {
    20_000
}

/// Card footprint in map pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSettings {
    #[serde(default = "default_card_width")]
    pub card_width: f64,
    #[serde(default = "default_card_height")]
    pub card_height: f64,
    #[serde(default = "default_card_margin")]
    pub margin: f64,
}

impl Default for CardSettings {
    fn default() -> Self {
        CardSettings {
            card_width: default_card_width(),
            card_height: default_card_height(),
            margin: default_card_margin(),
        }
    }
}

fn default_card_width() -> f64 {
    150.0
}

fn default_card_height() -> f64 {
    95.0
}

fn default_card_margin() -> f64 {
    5.0
}

/// Poll cadence and retry policy consumed by the host's fetch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    #[serde(default = "default_news_poll")]
    pub news_poll_ms: u64,
    #[serde(default = "default_hazard_poll")]
    pub hazard_poll_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_retry_delay")]
    pub base_retry_delay_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            news_poll_ms: default_news_poll(),
            hazard_poll_ms: default_hazard_poll(),
            max_attempts: default_max_attempts(),
            base_retry_delay_ms: default_base_retry_delay(),
        }
    }
}

fn default_news_poll() -> u64 {
    60_000
}

fn default_hazard_poll() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_retry_delay() -> u64 {
    1_000
}
