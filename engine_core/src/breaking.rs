// Breaking ticker queue: at-most-once per identity, timed auto-advance.
// The "already shown" set only grows for the life of the engine.

use std::collections::{HashSet, VecDeque};

use crate::severity;
use crate::types::*;

pub struct BreakingQueue {
    display_ms: u64,
    queue: VecDeque<BreakingItem>,
    shown: HashSet<String>,
    head_deadline: Option<Timestamp>,
}

impl BreakingQueue {
    pub fn new(settings: BreakingSettings) -> Self {
        BreakingQueue {
            display_ms: settings.display_duration_ms,
            queue: VecDeque::new(),
            shown: HashSet::new(),
            head_deadline: None,
        }
    }

    pub fn current(&self) -> Option<&BreakingItem> {
        self.queue.front()
    }

    /// Items waiting behind the head.
    pub fn pending_count(&self) -> usize {
        self.queue.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn head_deadline(&self) -> Option<Timestamp> {
        self.head_deadline
    }

    /// Append items never shown before. Returns how many were queued.
    pub fn enqueue(&mut self, items: impl IntoIterator<Item = BreakingItem>, now: Timestamp) -> usize {
        let mut added = 0;
        for item in items {
            if !self.shown.insert(item.id.clone()) {
                continue;
            }
            log::info!("breaking: queued {}", item.id);
            self.queue.push_back(item);
            added += 1;
        }
        if added > 0 && self.head_deadline.is_none() {
            self.head_deadline = Some(now.plus_millis(self.display_ms));
        }
        added
    }

    pub fn offer_news(&mut self, news: &[NewsArticle], now: Timestamp) -> usize {
        let items = news.iter().filter(|n| n.is_breaking).map(|n| BreakingItem {
            id: n.id.clone(),
            title: n.title.clone(),
            region_name: n.region_name.clone(),
        });
        self.enqueue(items, now)
    }

    pub fn offer_earthquakes(&mut self, earthquakes: &[EarthquakeReport], now: Timestamp) -> usize {
        let items = earthquakes
            .iter()
            .filter(|eq| eq.is_breaking())
            .map(|eq| BreakingItem {
                id: format!("eq-{}", eq.id),
                title: severity::earthquake_headline(eq),
                region_name: eq.hypocenter.name.clone(),
            });
        self.enqueue(items, now)
    }

    pub fn offer_tsunamis(&mut self, tsunamis: &[TsunamiAdvisory], now: Timestamp) -> usize {
        let items = tsunamis
            .iter()
            .filter(|t| t.is_breaking())
            .map(|t| BreakingItem {
                id: format!("ts-{}", t.id),
                title: format!("津波情報: {}", t.area_summary(3)),
                region_name: "全国".to_string(),
            });
        self.enqueue(items, now)
    }

    /// One item per active special warning.
    pub fn offer_warnings(&mut self, warnings: &[WarningSummary], now: Timestamp) -> usize {
        let items = warnings
            .iter()
            .filter(|w| w.max_severity == WarningSeverity::Special)
            .flat_map(|w| {
                w.active_warnings
                    .iter()
                    .filter(|aw| aw.severity == WarningSeverity::Special)
                    .map(move |aw| BreakingItem {
                        id: format!("sw-{}-{}", w.area_code, aw.code),
                        title: format!("特別警報: {} {}", w.prefecture_name, aw.name),
                        region_name: w.prefecture_name.clone(),
                    })
            });
        self.enqueue(items, now)
    }

    /// Pop every head whose display time has run out.
    pub fn advance(&mut self, now: Timestamp) {
        while let Some(deadline) = self.head_deadline {
            if now < deadline {
                break;
            }
            self.queue.pop_front();
            self.head_deadline = if self.queue.is_empty() {
                None
            } else {
                Some(deadline.plus_millis(self.display_ms))
            };
        }
    }

    /// Manual dismissal: pop the head now and restart the timer for the next one.
    /// Pops the item on screen; an overdue auto-advance is not applied first.
    pub fn dismiss(&mut self, now: Timestamp) -> Option<BreakingItem> {
        let dismissed = self.queue.pop_front();
        self.head_deadline = if self.queue.is_empty() {
            None
        } else {
            Some(now.plus_millis(self.display_ms))
        };
        dismissed
    }

    /// Drop the pending auto-advance. Queue contents are kept.
    pub fn cancel_timer(&mut self) {
        self.head_deadline = None;
    }
}
