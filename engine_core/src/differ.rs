// Snapshot differencing: per-source identity sets, "new since last poll" deltas.
// One candidate event per source per snapshot, never one per item.

use std::collections::HashSet;

use crate::severity;
use crate::types::*;

/// Identity set for one stream. Replaced wholesale by every snapshot.
#[derive(Debug, Default)]
pub struct SourceTracker {
    previous: HashSet<String>,
    seeded: bool,
}

impl SourceTracker {
    /// Positions of identities not seen in the previous snapshot, in snapshot order.
    /// The snapshot becomes the new baseline either way. The first snapshot a
    /// stream ever sees, empty or not, is only a baseline.
    fn advance(&mut self, ids: Vec<String>, baseline_only: bool) -> Vec<usize> {
        let first = !std::mem::replace(&mut self.seeded, true);
        let fresh = if baseline_only || first {
            Vec::new()
        } else {
            let mut seen = HashSet::new();
            ids.iter()
                .enumerate()
                .filter(|(_, id)| !self.previous.contains(*id) && seen.insert(id.as_str()))
                .map(|(i, _)| i)
                .collect()
        };
        self.previous = ids.into_iter().collect();
        fresh
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.previous.contains(id)
    }

    /// Whether any snapshot has been adopted yet.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }
}

/// Initial-load guard. Armed once by the first non-empty snapshot of any source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadGuard {
    Waiting,
    Settling { release_at: Timestamp },
    Released,
}

/// Watches the four streams and turns deltas into candidate effect events.
pub struct SnapshotDiffer {
    settings: DetectionSettings,
    news: SourceTracker,
    earthquakes: SourceTracker,
    tsunamis: SourceTracker,
    warnings: SourceTracker,
    guard: LoadGuard,
}

impl SnapshotDiffer {
    pub fn new(settings: DetectionSettings) -> Self {
        SnapshotDiffer {
            settings,
            news: SourceTracker::default(),
            earthquakes: SourceTracker::default(),
            tsunamis: SourceTracker::default(),
            warnings: SourceTracker::default(),
            guard: LoadGuard::Waiting,
        }
    }

    /// True until the settle delay after the first data has passed.
    pub fn is_initial_load(&self) -> bool {
        self.guard != LoadGuard::Released
    }

    /// Release the initial-load guard once its deadline has passed.
    pub fn settle(&mut self, now: Timestamp) {
        if let LoadGuard::Settling { release_at } = self.guard {
            if now >= release_at {
                self.guard = LoadGuard::Released;
                log::info!("initial load settled; update detection live");
            }
        }
    }

    pub fn tracker(&self, source: EffectSource) -> &SourceTracker {
        match source {
            EffectSource::News => &self.news,
            EffectSource::Earthquake => &self.earthquakes,
            EffectSource::Tsunami => &self.tsunamis,
            EffectSource::Warning => &self.warnings,
        }
    }

    /// Whether this snapshot should only be adopted as a baseline.
    fn baseline_only(&mut self, non_empty: bool, now: Timestamp) -> bool {
        self.settle(now);
        match self.guard {
            LoadGuard::Released => false,
            LoadGuard::Settling { .. } => non_empty,
            LoadGuard::Waiting => {
                if non_empty {
                    let release_at = now.plus_millis(self.settings.settle_delay_ms);
                    self.guard = LoadGuard::Settling { release_at };
                }
                non_empty
            }
        }
    }

    pub fn detect_news(&mut self, news: &[NewsArticle], now: Timestamp) -> Option<EffectEvent> {
        let baseline_only = self.baseline_only(!news.is_empty(), now);
        let ids = news.iter().map(|n| n.id.clone()).collect();
        let fresh = self.news.advance(ids, baseline_only);
        let first = news.get(*fresh.first()?)?;

        let count = fresh.len();
        let headline = if count > 1 {
            format!("{} 他{}件", first.title, count - 1)
        } else {
            first.title.clone()
        };

        let level = severity::classify_news(count, self.settings.news_alert_threshold);
        let mut event = EffectEvent::new(
            format!("news-{}", now.as_millis()),
            level,
            EffectSource::News,
            now,
        )
        .with_headline(headline);
        event.new_article_count = Some(count);
        Some(event)
    }

    pub fn detect_earthquakes(
        &mut self,
        earthquakes: &[EarthquakeReport],
        now: Timestamp,
    ) -> Option<EffectEvent> {
        let baseline_only = self.baseline_only(!earthquakes.is_empty(), now);
        let ids = earthquakes.iter().map(|eq| eq.id.clone()).collect();
        let fresh = self.earthquakes.advance(ids, baseline_only);

        // Strongest new report; ties keep the earliest in the snapshot.
        let strongest = fresh
            .iter()
            .map(|&i| &earthquakes[i])
            .reduce(|best, eq| if eq.max_scale > best.max_scale { eq } else { best })?;

        let mut event = EffectEvent::new(
            format!("eq-{}", strongest.id),
            severity::classify_earthquake(strongest.max_scale),
            EffectSource::Earthquake,
            now,
        )
        .with_headline(severity::earthquake_headline(strongest));
        event.magnitude = Some(strongest.hypocenter.magnitude);
        event.max_scale = Some(strongest.max_scale);
        event.region_codes = strongest
            .region_intensities
            .iter()
            .filter_map(|r| prefecture_code(&r.region).map(str::to_string))
            .collect();
        Some(event)
    }

    pub fn detect_tsunamis(
        &mut self,
        tsunamis: &[TsunamiAdvisory],
        now: Timestamp,
    ) -> Option<EffectEvent> {
        let baseline_only = self.baseline_only(!tsunamis.is_empty(), now);
        let ids = tsunamis.iter().map(|t| t.id.clone()).collect();
        let fresh = self.tsunamis.advance(ids, baseline_only);

        let mut new_items = fresh.iter().map(|&i| &tsunamis[i]);
        let first = new_items.clone().next()?;
        let active = new_items.find(|t| !t.cancelled).unwrap_or(first);

        let event = EffectEvent::new(
            format!("ts-{}", active.id),
            severity::classify_tsunami(active),
            EffectSource::Tsunami,
            now,
        )
        .with_headline(format!("津波情報: {}", active.area_summary(3)));
        Some(event)
    }

    /// Warnings are keyed per area and warning code. Expects normalized summaries.
    pub fn detect_warnings(
        &mut self,
        warnings: &[WarningSummary],
        now: Timestamp,
    ) -> Option<EffectEvent> {
        let baseline_only = self.baseline_only(!warnings.is_empty(), now);
        let keys = warnings
            .iter()
            .flat_map(|w| {
                w.active_warnings
                    .iter()
                    .map(move |aw| format!("{}-{}", w.area_code, aw.code))
            })
            .collect();
        if self.warnings.advance(keys, baseline_only).is_empty() {
            return None;
        }

        let max_severity = warnings
            .iter()
            .map(|w| w.max_severity)
            .max()
            .unwrap_or(WarningSeverity::None);
        let headline = warnings
            .iter()
            .find(|w| w.max_severity == max_severity)
            .map(|w| {
                let name = w
                    .active_warnings
                    .first()
                    .map(|aw| aw.name.as_str())
                    .unwrap_or("気象警報");
                format!("{} {}", w.prefecture_name, name)
            })
            .unwrap_or_else(|| "気象警報発表".to_string());

        let event = EffectEvent::new(
            format!("warn-{}", now.as_millis()),
            severity::classify_warning(max_severity),
            EffectSource::Warning,
            now,
        )
        .with_headline(headline);
        Some(event)
    }
}
