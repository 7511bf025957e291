// engine_core: AlertMap Rust/WASM engine.
// The host owns fetch, rendering and the wall clock. Detection, arbitration,
// queueing and layout decisions all live here; JS is plumbing.

pub mod arbiter;
pub mod breaking;
pub mod differ;
mod error;
pub mod feed;
pub mod panel;
pub mod placement;
pub mod recency;
pub mod severity;
mod types;
pub mod viewport;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

pub use arbiter::{Decision, EffectArbiter, EffectSlot};
pub use breaking::BreakingQueue;
pub use differ::SnapshotDiffer;
pub use error::EngineError;
pub use feed::{
    FeedHealth, FeedKind, FeedMonitor, FeedStatus, PollKind, PollScheduler, RetryOutcome,
    RetryPolicy,
};
pub use panel::PanelState;
pub use placement::{AnchorLookup, CardLayout, CardPlacement};
pub use recency::HazardFlags;
pub use types::*;
pub use viewport::{RegionMarker, ViewportSize, ZoomState, ZoomTier};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// What happened to one detected candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateOutcome {
    pub event_id: String,
    pub source: EffectSource,
    pub level: EffectLevel,
    pub decision: Decision,
}

/// Result of ingesting one snapshot.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub candidates: Vec<CandidateOutcome>,
    pub breaking_queued: usize,
}

/// A region picked on the map. The panel filters warnings by prefecture name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSelection {
    pub code: String,
    pub name: String,
}

/// Render weight of a quake marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuakeMarker {
    pub id: String,
    pub intensity: f64,
    pub faded: bool,
}

/// Everything the host needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    pub effect: EffectSlot,
    pub breaking: Option<BreakingItem>,
    pub breaking_pending: usize,
    pub cards: Vec<CardPlacement>,
    pub zoom_tier: ZoomTier,
    pub display_quakes: Vec<EarthquakeReport>,
    pub quake_markers: Vec<QuakeMarker>,
    pub recent_quake: Option<EarthquakeReport>,
    #[serde(flatten)]
    pub flags: HazardFlags,
    pub tsunami_grade: Option<TsunamiGrade>,
    pub tsunami_areas: Vec<String>,
    pub panel: PanelState,
    pub panel_warnings: Vec<WarningSummary>,
    pub region_news: Vec<NewsArticle>,
    pub regions: Vec<RegionMarker>,
    pub feeds: Vec<FeedHealth>,
}

/// The engine core. Owns one of every component; many engines can coexist.
pub struct AlertEngine {
    layout: CardLayout,
    differ: SnapshotDiffer,
    arbiter: EffectArbiter,
    breaking: BreakingQueue,
    feeds: FeedMonitor,
    scheduler: PollScheduler,
    news: Vec<NewsArticle>,
    earthquakes: Vec<EarthquakeReport>,
    tsunamis: Vec<TsunamiAdvisory>,
    warnings: Vec<WarningSummary>,
    selection: Option<RegionSelection>,
    zoom: ZoomState,
    panel: PanelState,
}

impl AlertEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(AlertEngine {
            layout: CardLayout::new(&config.card_settings),
            differ: SnapshotDiffer::new(config.detection_settings),
            arbiter: EffectArbiter::new(config.effect_settings),
            breaking: BreakingQueue::new(config.breaking_settings),
            feeds: FeedMonitor::new(),
            scheduler: PollScheduler::new(&config.feed_settings),
            news: Vec::new(),
            earthquakes: Vec::new(),
            tsunamis: Vec::new(),
            warnings: Vec::new(),
            selection: None,
            zoom: ZoomState::default(),
            panel: PanelState::default(),
        })
    }

    pub fn from_config_json(config_json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(config_json)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        Self::new(config)
    }

    /// Arm both pollers for an immediate first fetch.
    pub fn start(&mut self, now: Timestamp) {
        self.scheduler.start(now);
    }

    /// Apply every deadline that has passed.
    pub fn tick(&mut self, now: Timestamp) {
        self.differ.settle(now);
        self.arbiter.expire(now);
        self.breaking.advance(now);
    }

    fn offer(&mut self, candidate: Option<EffectEvent>, now: Timestamp, report: &mut IngestReport) {
        let Some(event) = candidate else {
            return;
        };
        let outcome = CandidateOutcome {
            event_id: event.id.clone(),
            source: event.source,
            level: event.level,
            decision: self.arbiter.fire(event, now),
        };
        report.candidates.push(outcome);
    }

    pub fn ingest_news(&mut self, snapshot: NewsSnapshot, now: Timestamp) -> IngestReport {
        self.tick(now);
        let mut report = IngestReport::default();

        let candidate = self.differ.detect_news(&snapshot.news, now);
        self.offer(candidate, now, &mut report);
        report.breaking_queued = self.breaking.offer_news(&snapshot.news, now);

        self.news = snapshot.news;
        self.fetch_succeeded(PollKind::News, now);
        self.feeds.record_success(FeedKind::News, true, now);
        report
    }

    /// Earthquake, tsunami and warning detectors run in that order; each
    /// candidate reaches the arbiter before the next detector runs.
    pub fn ingest_hazards(&mut self, snapshot: HazardSnapshot, now: Timestamp) -> IngestReport {
        self.tick(now);
        let HazardSnapshot {
            earthquakes,
            tsunamis,
            mut warnings,
            meta,
        } = snapshot;
        warnings.iter_mut().for_each(severity::normalize_warning_summary);

        let mut report = IngestReport::default();
        let candidate = self.differ.detect_earthquakes(&earthquakes, now);
        self.offer(candidate, now, &mut report);
        let candidate = self.differ.detect_tsunamis(&tsunamis, now);
        self.offer(candidate, now, &mut report);
        let candidate = self.differ.detect_warnings(&warnings, now);
        self.offer(candidate, now, &mut report);

        report.breaking_queued = self.breaking.offer_earthquakes(&earthquakes, now)
            + self.breaking.offer_tsunamis(&tsunamis, now)
            + self.breaking.offer_warnings(&warnings, now);

        self.earthquakes = earthquakes;
        self.tsunamis = tsunamis;
        self.warnings = warnings;

        self.fetch_succeeded(PollKind::Hazard, now);
        let (seismic_ok, warning_ok) = match meta.sources {
            Some(sources) => (
                sources.p2pquake == UpstreamStatus::Ok,
                sources.jma_warning == UpstreamStatus::Ok,
            ),
            None => (false, false),
        };
        self.feeds.record_success(FeedKind::Seismic, seismic_ok, now);
        self.feeds.record_success(FeedKind::Warning, warning_ok, now);
        report
    }

    /// Re-arm a poller after a completed fetch.
    pub fn fetch_succeeded(&mut self, poll: PollKind, now: Timestamp) {
        self.scheduler.on_success(poll, now);
    }

    /// A fetch attempt failed. Once retries are spent the affected feeds are
    /// marked as errored; ingested data is kept.
    pub fn report_fetch_failure(
        &mut self,
        poll: PollKind,
        message: &str,
        now: Timestamp,
    ) -> RetryOutcome {
        let outcome = self.scheduler.on_failure(poll, now);
        if outcome == RetryOutcome::GaveUp {
            for feed in poll.feeds() {
                self.feeds.record_failure(*feed, message);
            }
        }
        outcome
    }

    pub fn due_polls(&mut self, now: Timestamp) -> Vec<PollKind> {
        self.scheduler.take_due(now)
    }

    /// Manual trigger. Bypasses detection, not arbitration.
    pub fn trigger_effect(&mut self, event: EffectEvent, now: Timestamp) -> Decision {
        log::info!("manual effect {} ({:?})", event.id, event.level);
        self.arbiter.fire(event, now)
    }

    pub fn clear_effect(&mut self) {
        self.arbiter.clear();
    }

    pub fn dismiss_breaking(&mut self, now: Timestamp) -> Option<BreakingItem> {
        self.breaking.dismiss(now)
    }

    pub fn select_region(&mut self, selection: Option<RegionSelection>) {
        self.selection = selection;
    }

    pub fn set_zoom(&mut self, zoom: ZoomState) {
        self.zoom = ZoomState::new(zoom.k, zoom.x, zoom.y);
    }

    pub fn set_reduced_motion(&mut self, reduced: bool) {
        self.arbiter.set_reduced_motion(reduced);
    }

    pub fn sync_panel_expanded(&mut self, expanded: Option<bool>) {
        self.panel.sync_external(expanded);
    }

    pub fn toggle_panel(&mut self) {
        self.panel.toggle_open();
    }

    pub fn toggle_advisory(&mut self) {
        self.panel.toggle_advisory();
    }

    /// Teardown: no deadline fires after this.
    pub fn shutdown(&mut self) {
        self.arbiter.clear();
        self.breaking.cancel_timer();
        self.scheduler.cancel_all();
        log::info!("engine shut down; timers cancelled");
    }

    pub fn effect(&self) -> &EffectSlot {
        self.arbiter.slot()
    }

    pub fn feed_status(&self, feed: FeedKind) -> FeedStatus {
        self.feeds.status(feed)
    }

    pub fn frame(
        &mut self,
        now: Timestamp,
        anchors: &impl AnchorLookup,
        size: ViewportSize,
    ) -> RenderFrame {
        self.tick(now);
        let tier = self.zoom.tier();

        let display_quakes = recency::filter_recent_quakes(&self.earthquakes, now);
        let quake_markers = display_quakes
            .iter()
            .map(|eq| {
                let weight = severity::scale_info(eq.max_scale).weight;
                let (intensity, faded) = match eq.occurred_at() {
                    Some(at) => (recency::decay_intensity(at, now, weight), recency::is_faded(at, now)),
                    None => (0.0, true),
                };
                QuakeMarker {
                    id: eq.id.clone(),
                    intensity,
                    faded,
                }
            })
            .collect();

        let selected_code = self.selection.as_ref().map(|s| s.code.as_str());
        let selected_name = self.selection.as_ref().map(|s| s.name.as_str());

        RenderFrame {
            effect: self.arbiter.slot().clone(),
            breaking: self.breaking.current().cloned(),
            breaking_pending: self.breaking.pending_count(),
            cards: placement::place_cards(&self.news, anchors, tier.max_cards(), &self.layout),
            zoom_tier: tier,
            quake_markers,
            recent_quake: recency::find_recent_quake(&self.earthquakes, now).cloned(),
            display_quakes,
            flags: HazardFlags::from_snapshot(&self.tsunamis, &self.warnings),
            tsunami_grade: severity::highest_tsunami_grade(&self.tsunamis),
            tsunami_areas: severity::active_tsunami_areas(&self.tsunamis),
            panel: self.panel,
            panel_warnings: panel::panel_warnings(
                &self.warnings,
                selected_name,
                self.panel.show_advisory,
            ),
            region_news: panel::news_for_region(&self.news, selected_code),
            regions: viewport::visible_regions(&self.news, anchors, &self.zoom, size),
            feeds: self.feeds.all(),
        }
    }
}

/// Main engine interface exposed to JavaScript.
/// Batch interface to minimize JS↔WASM crossings. Times are epoch milliseconds.
#[wasm_bindgen]
pub struct WasmAlertEngine {
    inner: AlertEngine,
}

#[wasm_bindgen]
impl WasmAlertEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmAlertEngine, JsValue> {
        let inner = AlertEngine::from_config_json(config_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmAlertEngine { inner })
    }

    pub fn start(&mut self, now_ms: u64) {
        self.inner.start(Timestamp::from_millis(now_ms));
    }

    pub fn tick(&mut self, now_ms: u64) {
        self.inner.tick(Timestamp::from_millis(now_ms));
    }

    /// Ingest a `/api/news` payload. Returns the ingest report as JSON.
    pub fn ingest_news(&mut self, snapshot_json: &str, now_ms: u64) -> Result<String, JsValue> {
        let snapshot: NewsSnapshot = parse_snapshot("news", snapshot_json)?;
        let report = self.inner.ingest_news(snapshot, Timestamp::from_millis(now_ms));
        to_json(&report)
    }

    /// Ingest a `/api/jma` payload. Returns the ingest report as JSON.
    pub fn ingest_hazards(&mut self, snapshot_json: &str, now_ms: u64) -> Result<String, JsValue> {
        let snapshot: HazardSnapshot = parse_snapshot("hazard", snapshot_json)?;
        let report = self.inner.ingest_hazards(snapshot, Timestamp::from_millis(now_ms));
        to_json(&report)
    }

    /// `poll` is `"news"` or `"hazard"`. Returns the retry time in ms, or
    /// `undefined` once the cycle has given up.
    pub fn report_fetch_failure(
        &mut self,
        poll: &str,
        message: &str,
        now_ms: u64,
    ) -> Result<Option<u64>, JsValue> {
        let poll: PollKind = serde_json::from_value(serde_json::Value::String(poll.to_string()))
            .map_err(|e| JsValue::from_str(&format!("Invalid poll kind: {}", e)))?;
        let outcome = self
            .inner
            .report_fetch_failure(poll, message, Timestamp::from_millis(now_ms));
        Ok(match outcome {
            RetryOutcome::RetryAt(at) => Some(at.as_millis()),
            RetryOutcome::GaveUp => None,
        })
    }

    /// JSON array of pollers that should fetch now.
    pub fn due_polls(&mut self, now_ms: u64) -> Result<String, JsValue> {
        to_json(&self.inner.due_polls(Timestamp::from_millis(now_ms)))
    }

    /// Fire a host-built effect event through the arbiter.
    pub fn trigger_effect(&mut self, event_json: &str, now_ms: u64) -> Result<String, JsValue> {
        let event: EffectEvent = serde_json::from_str(event_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid effect event: {}", e)))?;
        to_json(&self.inner.trigger_effect(event, Timestamp::from_millis(now_ms)))
    }

    pub fn clear_effect(&mut self) {
        self.inner.clear_effect();
    }

    /// Returns the dismissed item as JSON (`null` when the queue was empty).
    pub fn dismiss_breaking(&mut self, now_ms: u64) -> Result<String, JsValue> {
        to_json(&self.inner.dismiss_breaking(Timestamp::from_millis(now_ms)))
    }

    /// `{"code": "13", "name": "東京都"}` or `null` to clear.
    pub fn select_region(&mut self, selection_json: &str) -> Result<(), JsValue> {
        let selection: Option<RegionSelection> = serde_json::from_str(selection_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid region selection: {}", e)))?;
        self.inner.select_region(selection);
        Ok(())
    }

    pub fn set_zoom(&mut self, k: f64, x: f64, y: f64) {
        self.inner.set_zoom(ZoomState::new(k, x, y));
    }

    pub fn set_reduced_motion(&mut self, reduced: bool) {
        self.inner.set_reduced_motion(reduced);
    }

    pub fn sync_panel_expanded(&mut self, expanded: Option<bool>) {
        self.inner.sync_panel_expanded(expanded);
    }

    pub fn toggle_panel(&mut self) {
        self.inner.toggle_panel();
    }

    pub fn toggle_advisory(&mut self) {
        self.inner.toggle_advisory();
    }

    pub fn shutdown(&mut self) {
        self.inner.shutdown();
    }

    /// Render frame as JSON. `anchors_json` maps region code to projected `{x, y}`.
    pub fn frame(
        &mut self,
        now_ms: u64,
        anchors_json: &str,
        width: f64,
        height: f64,
    ) -> Result<String, JsValue> {
        let anchors: HashMap<String, ScreenPoint> = serde_json::from_str(anchors_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid anchors: {}", e)))?;
        let frame = self.inner.frame(
            Timestamp::from_millis(now_ms),
            &anchors,
            ViewportSize { width, height },
        );
        to_json(&frame)
    }
}

fn parse_snapshot<T: for<'de> Deserialize<'de>>(feed: &'static str, json: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| {
        let err = EngineError::InvalidSnapshot {
            feed,
            message: e.to_string(),
        };
        JsValue::from_str(&err.to_string())
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&EngineError::from(e).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_714_532_400_000;

    fn t(offset_ms: u64) -> Timestamp {
        Timestamp::from_millis(T0 + offset_ms)
    }

    fn engine() -> AlertEngine {
        AlertEngine::new(EngineConfig::default()).unwrap()
    }

    fn article(id: &str, region: &str) -> NewsArticle {
        NewsArticle {
            id: id.into(),
            title: format!("記事{}", id),
            link: String::new(),
            source: String::new(),
            published_at: String::new(),
            region_code: region.into(),
            region_name: String::new(),
            is_breaking: false,
            category: NewsCategory::Other,
            image_url: None,
        }
    }

    fn news(items: Vec<NewsArticle>) -> NewsSnapshot {
        NewsSnapshot {
            news: items,
            fetched_at: None,
        }
    }

    fn quake(id: &str, max_scale: i32, place: &str) -> EarthquakeReport {
        EarthquakeReport {
            id: id.into(),
            time: "2024/05/01 12:00:00".into(),
            hypocenter: Hypocenter {
                name: place.into(),
                magnitude: 5.2,
                ..Default::default()
            },
            max_scale,
            domestic_tsunami: "None".into(),
            region_intensities: Vec::new(),
        }
    }

    fn hazards(earthquakes: Vec<EarthquakeReport>) -> HazardSnapshot {
        HazardSnapshot {
            earthquakes,
            ..Default::default()
        }
    }

    /// Engine past its initial-load guard, seeded with one news item.
    fn settled_engine() -> AlertEngine {
        let mut engine = engine();
        let report = engine.ingest_news(news(vec![article("seed", "13")]), t(0));
        assert!(report.candidates.is_empty());
        engine.tick(t(200));
        engine
    }

    fn manual(id: &str, level: EffectLevel) -> EffectEvent {
        EffectEvent::new(id, level, EffectSource::Earthquake, t(0))
    }

    #[test]
    fn engine_creation_works() {
        assert!(AlertEngine::from_config_json("{}").is_ok());
        let bad = AlertEngine::from_config_json(r#"{"card_settings":{"card_height":0}}"#);
        assert!(matches!(bad, Err(EngineError::InvalidConfig(_))));
        assert!(AlertEngine::from_config_json("not json").is_err());
    }

    #[test]
    fn initial_snapshots_are_silent() {
        let mut engine = engine();
        engine.ingest_news(news(vec![article("a", "13")]), t(0));
        let report = engine.ingest_hazards(hazards(vec![quake("q", 70, "宮城県沖")]), t(50));
        assert!(report.candidates.is_empty());
        assert_eq!(engine.effect(), &EffectSlot::Idle);
    }

    #[test]
    fn first_news_batch_after_hazards_is_baseline() {
        let mut engine = engine();
        let report = engine.ingest_hazards(hazards(vec![quake("q", 30, "茨城県南部")]), t(0));
        assert!(report.candidates.is_empty());
        engine.tick(t(200));

        let batch: Vec<_> = (0..50).map(|i| article(&format!("n{}", i), "13")).collect();
        let report = engine.ingest_news(news(batch), t(2_000));
        assert!(report.candidates.is_empty());
        assert_eq!(engine.effect(), &EffectSlot::Idle);
    }

    #[test]
    fn scenario_new_quake_raises_alert() {
        let mut engine = settled_engine();
        let report = engine.ingest_hazards(hazards(Vec::new()), t(1_000));
        assert!(report.candidates.is_empty());

        let report = engine.ingest_hazards(hazards(vec![quake("q1", 40, "石川県能登地方")]), t(30_000));
        assert_eq!(report.candidates.len(), 1);
        let outcome = &report.candidates[0];
        assert_eq!(outcome.level, EffectLevel::Alert);
        assert_eq!(outcome.decision, Decision::Accepted(EffectLevel::Alert));

        match engine.effect() {
            EffectSlot::Showing { event, .. } => {
                assert!(event.headline.as_deref().unwrap().contains("石川県能登地方"));
            }
            EffectSlot::Idle => panic!("expected an active effect"),
        }
        // maxScale 40 is breaking.
        assert_eq!(report.breaking_queued, 1);
    }

    #[test]
    fn scenario_strongest_of_batch_is_critical() {
        let mut engine = settled_engine();
        engine.ingest_hazards(hazards(Vec::new()), t(1_000));
        let report = engine.ingest_hazards(
            hazards(vec![quake("weak", 30, "茨城県南部"), quake("strong", 60, "能登半島沖")]),
            t(30_000),
        );
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].event_id, "eq-strong");
        assert_eq!(report.candidates[0].level, EffectLevel::Critical);
        assert!(report.candidates[0].decision.is_accepted());
    }

    #[test]
    fn scenario_critical_blocks_alert_until_expiry() {
        let mut engine = settled_engine();
        assert!(engine.trigger_effect(manual("c", EffectLevel::Critical), t(10_000)).is_accepted());
        assert_eq!(
            engine.trigger_effect(manual("a", EffectLevel::Alert), t(11_000)),
            Decision::Outranked
        );
        assert!(engine.trigger_effect(manual("a", EffectLevel::Alert), t(15_000)).is_accepted());
    }

    #[test]
    fn scenario_reduced_motion_suppresses_incoming() {
        let mut engine = settled_engine();
        engine.set_reduced_motion(true);
        let report = engine.ingest_news(news(vec![article("seed", "13"), article("new", "27")]), t(5_000));
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].level, EffectLevel::Incoming);
        assert_eq!(report.candidates[0].decision, Decision::Suppressed);
        assert_eq!(engine.effect(), &EffectSlot::Idle);
    }

    #[test]
    fn scenario_crowded_card_is_skipped() {
        let mut engine = settled_engine();
        let items: Vec<_> = (1..=6)
            .map(|i| {
                let mut item = article(&format!("n{}", i), &format!("0{}", i));
                item.published_at = format!("2024-05-01T1{}:00:00Z", 9 - i);
                item.image_url = Some(format!("https://img.example/{}.jpg", i));
                item
            })
            .collect();
        engine.ingest_news(news(items), t(1_000));

        let anchors: HashMap<String, ScreenPoint> = [
            ("01", 100.0, 100.0),
            ("02", 140.0, 100.0),
            ("03", 500.0, 100.0),
            ("04", 100.0, 500.0),
            ("05", 500.0, 500.0),
            ("06", 900.0, 300.0),
        ]
        .iter()
        .map(|(code, x, y)| (code.to_string(), ScreenPoint::new(*x, *y)))
        .collect();
        let size = ViewportSize {
            width: 1000.0,
            height: 700.0,
        };

        let frame = engine.frame(t(2_000), &anchors, size);
        assert_eq!(frame.zoom_tier, ZoomTier::Country);
        let ids: Vec<_> = frame.cards.iter().map(|c| c.item.id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n3", "n4", "n5", "n6"]);
    }

    #[test]
    fn hazard_health_follows_upstream_meta() {
        let mut engine = engine();
        engine.ingest_hazards(HazardSnapshot::default(), t(0));
        assert_eq!(engine.feed_status(FeedKind::Seismic), FeedStatus::Stale);

        let snapshot: HazardSnapshot = serde_json::from_str(
            r#"{"earthquakes":[],"tsunamis":[],"warnings":[],
                "meta":{"sources":{"p2pquake":"ok","jmaWarning":"error"}}}"#,
        )
        .unwrap();
        engine.ingest_hazards(snapshot, t(30_000));
        assert_eq!(engine.feed_status(FeedKind::Seismic), FeedStatus::Fresh);
        assert_eq!(engine.feed_status(FeedKind::Warning), FeedStatus::Stale);
        assert_eq!(engine.feed_status(FeedKind::News), FeedStatus::Loading);
    }

    #[test]
    fn failed_cycle_marks_error_and_keeps_data() {
        let mut engine = settled_engine();
        engine.ingest_hazards(hazards(vec![quake("q", 20, "千葉県北西部")]), t(1_000));

        assert!(matches!(
            engine.report_fetch_failure(PollKind::Hazard, "HTTP 502", t(31_000)),
            RetryOutcome::RetryAt(_)
        ));
        engine.report_fetch_failure(PollKind::Hazard, "HTTP 502", t(32_000));
        assert_eq!(
            engine.report_fetch_failure(PollKind::Hazard, "HTTP 502", t(34_000)),
            RetryOutcome::GaveUp
        );
        assert_eq!(engine.feed_status(FeedKind::Seismic), FeedStatus::Error);
        assert_eq!(engine.feed_status(FeedKind::Warning), FeedStatus::Error);
        assert_eq!(engine.feed_status(FeedKind::News), FeedStatus::Fresh);
        assert_eq!(engine.earthquakes.len(), 1);
    }

    #[test]
    fn special_warning_reaches_ticker_and_panel() {
        let mut engine = settled_engine();
        engine.ingest_hazards(HazardSnapshot::default(), t(500));
        let snapshot: HazardSnapshot = serde_json::from_str(
            r#"{"warnings":[{"areaCode":"460100","prefectureName":"鹿児島県",
                "activeWarnings":[{"code":"33"}]}]}"#,
        )
        .unwrap();
        let report = engine.ingest_hazards(snapshot, t(1_000));
        assert_eq!(report.candidates[0].level, EffectLevel::Critical);
        assert_eq!(report.breaking_queued, 1);

        engine.select_region(Some(RegionSelection {
            code: "46".into(),
            name: "鹿児島県".into(),
        }));
        let frame = engine.frame(t(2_000), &HashMap::new(), ViewportSize { width: 800.0, height: 600.0 });
        assert!(frame.flags.has_special_warning);
        assert_eq!(frame.breaking.unwrap().title, "特別警報: 鹿児島県 大雨特別警報");
        assert_eq!(frame.panel_warnings.len(), 1);
        assert!(frame.region_news.is_empty());
    }

    #[test]
    fn shutdown_cancels_every_timer() {
        let mut engine = settled_engine();
        engine.start(t(0));
        let mut item = article("brk", "13");
        item.is_breaking = true;
        engine.ingest_news(news(vec![article("seed", "13"), item]), t(1_000));
        engine.trigger_effect(manual("c", EffectLevel::Critical), t(1_000));

        engine.shutdown();
        assert_eq!(engine.effect(), &EffectSlot::Idle);
        assert!(engine.due_polls(t(10_000_000)).is_empty());

        engine.tick(t(10_000_000));
        assert_eq!(engine.breaking.current().unwrap().id, "brk");
    }

    #[test]
    fn frame_serializes_for_host() {
        let mut engine = settled_engine();
        let frame = engine.frame(t(1_000), &HashMap::new(), ViewportSize { width: 800.0, height: 600.0 });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["effect"]["state"], "idle");
        assert_eq!(json["zoomTier"], "country");
        assert_eq!(json["hasTsunami"], false);
        assert_eq!(json["feeds"][0]["status"], "fresh");
    }
}
