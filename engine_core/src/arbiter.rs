// Effect arbitration: one active screen effect at a time.
// Order of gates: reduced-motion downgrade, per-level cooldown, priority.
// Same-level candidates replace the active effect and restart its timer.

use serde::{Deserialize, Serialize};

use crate::types::*;

/// The single effect slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EffectSlot {
    Idle,
    #[serde(rename_all = "camelCase")]
    Showing {
        event: EffectEvent,
        expires_at: Timestamp,
    },
}

/// Outcome of offering a candidate to the arbiter. Drops are silent to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    Accepted(EffectLevel),
    /// Reduced motion removed the lowest tier entirely.
    Suppressed,
    CoolingDown,
    /// The active effect has strictly higher priority.
    Outranked,
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted(_))
    }
}

pub struct EffectArbiter {
    settings: EffectSettings,
    slot: EffectSlot,
    last_fired: [Option<Timestamp>; 3],
}

impl EffectArbiter {
    pub fn new(settings: EffectSettings) -> Self {
        EffectArbiter {
            settings,
            slot: EffectSlot::Idle,
            last_fired: [None; 3],
        }
    }

    pub fn slot(&self) -> &EffectSlot {
        &self.slot
    }

    pub fn active(&self) -> Option<&EffectEvent> {
        match &self.slot {
            EffectSlot::Showing { event, .. } => Some(event),
            EffectSlot::Idle => None,
        }
    }

    pub fn set_reduced_motion(&mut self, reduced: bool) {
        self.settings.reduced_motion = reduced;
    }

    pub fn reduced_motion(&self) -> bool {
        self.settings.reduced_motion
    }

    /// Offer a candidate. Calls are applied strictly in arrival order.
    pub fn fire(&mut self, candidate: EffectEvent, now: Timestamp) -> Decision {
        self.expire(now);

        let level = if self.settings.reduced_motion {
            match candidate.level.downgraded() {
                Some(level) => level,
                None => {
                    log::debug!("effect {} suppressed by reduced motion", candidate.id);
                    return Decision::Suppressed;
                }
            }
        } else {
            candidate.level
        };

        if let Some(last) = self.last_fired[level.index()] {
            if now.millis_since(last) < self.settings.cooldown_ms(level) {
                log::debug!("effect {} dropped: {:?} cooling down", candidate.id, level);
                return Decision::CoolingDown;
            }
        }

        if let Some(active) = self.active() {
            if active.level.priority() > level.priority() {
                log::debug!(
                    "effect {} dropped: {:?} outranked by active {:?}",
                    candidate.id,
                    level,
                    active.level
                );
                return Decision::Outranked;
            }
        }

        self.last_fired[level.index()] = Some(now);
        let expires_at = now.plus_millis(self.settings.duration_ms(level));
        log::debug!("effect {} showing as {:?} until {:?}", candidate.id, level, expires_at);
        self.slot = EffectSlot::Showing {
            event: EffectEvent {
                level,
                ..candidate
            },
            expires_at,
        };
        Decision::Accepted(level)
    }

    /// Return to idle if the active effect's expiry has passed.
    pub fn expire(&mut self, now: Timestamp) -> bool {
        match &self.slot {
            EffectSlot::Showing { expires_at, .. } if now >= *expires_at => {
                self.slot = EffectSlot::Idle;
                true
            }
            _ => false,
        }
    }

    /// Force idle and drop the pending expiry.
    pub fn clear(&mut self) {
        self.slot = EffectSlot::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn candidate(level: EffectLevel, id: &str) -> EffectEvent {
        EffectEvent::new(id, level, EffectSource::Earthquake, t(0)).with_headline(id)
    }

    fn arbiter() -> EffectArbiter {
        EffectArbiter::new(EffectSettings::default())
    }

    #[test]
    fn idle_accepts_any_level() {
        for level in EffectLevel::ALL {
            let mut arb = arbiter();
            assert_eq!(arb.fire(candidate(level, "x"), t(100_000)), Decision::Accepted(level));
            assert_eq!(arb.active().unwrap().level, level);
        }
    }

    #[test]
    fn expiry_matches_level_duration() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Alert, "a"), t(100_000));
        assert!(!arb.expire(t(102_999)));
        assert!(arb.active().is_some());
        assert!(arb.expire(t(103_000)));
        assert_eq!(arb.slot(), &EffectSlot::Idle);
    }

    #[test]
    fn critical_blocks_lower_levels_until_expiry() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Critical, "c"), t(100_000));
        assert_eq!(arb.fire(candidate(EffectLevel::Alert, "a"), t(101_000)), Decision::Outranked);
        assert_eq!(
            arb.fire(candidate(EffectLevel::Incoming, "i"), t(101_000)),
            Decision::Outranked
        );
        assert_eq!(arb.active().unwrap().id, "c");

        assert!(arb.fire(candidate(EffectLevel::Alert, "a2"), t(105_000)).is_accepted());
        assert_eq!(arb.active().unwrap().id, "a2");
    }

    #[test]
    fn same_level_refreshes_active_effect() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Critical, "c1"), t(100_000));
        arb.fire(candidate(EffectLevel::Critical, "c2"), t(104_000));
        match arb.slot() {
            EffectSlot::Showing { event, expires_at } => {
                assert_eq!(event.id, "c2");
                assert_eq!(*expires_at, t(109_000));
            }
            EffectSlot::Idle => panic!("expected an active effect"),
        }
        // The first timer no longer applies.
        assert!(!arb.expire(t(105_000)));
    }

    #[test]
    fn higher_level_preempts() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Incoming, "i"), t(100_000));
        assert!(arb.fire(candidate(EffectLevel::Critical, "c"), t(100_500)).is_accepted());
        assert_eq!(arb.active().unwrap().id, "c");
    }

    #[test]
    fn cooldown_is_per_level() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Alert, "a1"), t(100_000));
        arb.clear();
        assert_eq!(arb.fire(candidate(EffectLevel::Alert, "a2"), t(104_999)), Decision::CoolingDown);
        assert!(arb.fire(candidate(EffectLevel::Incoming, "i"), t(104_999)).is_accepted());
        assert!(arb.fire(candidate(EffectLevel::Alert, "a3"), t(105_000)).is_accepted());
    }

    #[test]
    fn dropped_candidate_does_not_reset_cooldown() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Critical, "c"), t(100_000));
        arb.fire(candidate(EffectLevel::Alert, "a"), t(101_000));
        // The outranked alert never recorded a fire time.
        assert!(arb.fire(candidate(EffectLevel::Alert, "a"), t(105_000)).is_accepted());
    }

    #[test]
    fn critical_has_no_cooldown() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Critical, "c1"), t(100_000));
        assert!(arb.fire(candidate(EffectLevel::Critical, "c2"), t(100_001)).is_accepted());
    }

    #[test]
    fn reduced_motion_downgrades_and_suppresses() {
        let mut arb = arbiter();
        arb.set_reduced_motion(true);
        assert_eq!(arb.fire(candidate(EffectLevel::Incoming, "i"), t(100_000)), Decision::Suppressed);
        assert_eq!(arb.slot(), &EffectSlot::Idle);

        assert_eq!(
            arb.fire(candidate(EffectLevel::Critical, "c"), t(100_000)),
            Decision::Accepted(EffectLevel::Alert)
        );
        match arb.slot() {
            EffectSlot::Showing { event, expires_at } => {
                assert_eq!(event.level, EffectLevel::Alert);
                assert_eq!(*expires_at, t(103_000));
            }
            EffectSlot::Idle => panic!("expected an active effect"),
        }
    }

    #[test]
    fn clear_forces_idle() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Critical, "c"), t(100_000));
        arb.clear();
        assert!(arb.active().is_none());
        assert!(!arb.expire(t(200_000)));
    }

    #[test]
    fn slot_serializes_with_state_tag() {
        let mut arb = arbiter();
        arb.fire(candidate(EffectLevel::Alert, "a"), t(100_000));
        let json = serde_json::to_value(arb.slot()).unwrap();
        assert_eq!(json["state"], "showing");
        assert_eq!(json["event"]["level"], "alert");
        assert_eq!(json["expiresAt"], 103_000);
    }

    fn level_strategy() -> impl Strategy<Value = EffectLevel> {
        prop_oneof![
            Just(EffectLevel::Incoming),
            Just(EffectLevel::Alert),
            Just(EffectLevel::Critical),
        ]
    }

    proptest! {
        #[test]
        fn never_downgrades_active_priority_before_expiry(
            steps in prop::collection::vec((level_strategy(), 0u64..2_000), 1..40)
        ) {
            let mut arb = arbiter();
            let mut now = 1_000_000u64;
            for (i, (level, gap)) in steps.into_iter().enumerate() {
                now += gap;
                arb.expire(t(now));
                let before = arb.slot().clone();
                let decision = arb.fire(candidate(level, &format!("e{}", i)), t(now));

                if let EffectSlot::Showing { event, .. } = &before {
                    if event.level.priority() > level.priority() {
                        prop_assert!(!decision.is_accepted());
                        prop_assert_eq!(arb.slot(), &before);
                    }
                }
                if decision.is_accepted() {
                    prop_assert_eq!(arb.active().map(|e| e.level), Some(level));
                }
            }
        }
    }
}
