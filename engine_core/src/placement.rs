// Card placement: greedy, order-dependent rectangle packing around map anchors.
// No backtracking. A candidate whose four offsets all collide is skipped for good.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::*;

/// Resolves a region code to its projected screen anchor.
/// The host owns the map projection; the engine only sees the result.
pub trait AnchorLookup {
    fn anchor(&self, region_code: &str) -> Option<ScreenPoint>;
}

impl AnchorLookup for HashMap<String, ScreenPoint> {
    fn anchor(&self, region_code: &str) -> Option<ScreenPoint> {
        self.get(region_code).copied()
    }
}

/// Horizontal gap between anchor and card edge.
const OFFSET_GAP: f64 = 15.0;
/// How far an "up" card's top sits above the anchor.
const OFFSET_RISE: f64 = 50.0;
/// How far a "down" card's top sits below the anchor.
const OFFSET_DROP: f64 = 30.0;

/// Card footprint and the fixed offset candidates derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardLayout {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl CardLayout {
    pub fn new(settings: &CardSettings) -> Self {
        CardLayout {
            width: settings.card_width,
            height: settings.card_height,
            margin: settings.margin,
        }
    }

    /// Right-up, right-down, left-up, left-down. Tried in this order.
    pub fn offsets(&self) -> [ScreenPoint; 4] {
        let left = -self.width - OFFSET_GAP;
        [
            ScreenPoint::new(OFFSET_GAP, -OFFSET_RISE),
            ScreenPoint::new(OFFSET_GAP, OFFSET_DROP),
            ScreenPoint::new(left, -OFFSET_RISE),
            ScreenPoint::new(left, OFFSET_DROP),
        ]
    }

    fn rect_at(&self, anchor: ScreenPoint, offset: ScreenPoint) -> Rect {
        Rect {
            x: anchor.x + offset.x,
            y: anchor.y + offset.y,
            w: self.width,
            h: self.height,
        }
    }
}

impl Default for CardLayout {
    fn default() -> Self {
        CardLayout::new(&CardSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Rect {
    /// Axis-aligned overlap with both rectangles grown by `margin`.
    fn overlaps(&self, other: &Rect, margin: f64) -> bool {
        self.x - margin < other.x + other.w + margin
            && self.x + self.w + margin > other.x - margin
            && self.y - margin < other.y + other.h + margin
            && self.y + self.h + margin > other.y - margin
    }
}

/// A placed card: top-left corner plus the anchor for the leader line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPlacement {
    pub item: NewsArticle,
    pub position: ScreenPoint,
    pub anchor: ScreenPoint,
}

/// Cards with an image outside the national bucket, first per region,
/// then breaking first and newest first.
pub fn eligible_cards(news: &[NewsArticle]) -> Vec<&NewsArticle> {
    let mut regions = HashSet::new();
    let mut unique: Vec<&NewsArticle> = news
        .iter()
        .filter(|item| item.has_image() && !item.is_national())
        .filter(|item| regions.insert(item.region_code.as_str()))
        .collect();

    unique.sort_by_cached_key(|item| (Reverse(item.is_breaking), Reverse(item.published())));
    unique
}

pub fn place_cards(
    news: &[NewsArticle],
    anchors: &impl AnchorLookup,
    max_cards: usize,
    layout: &CardLayout,
) -> Vec<CardPlacement> {
    let offsets = layout.offsets();
    let mut placed: Vec<Rect> = Vec::with_capacity(max_cards);
    let mut placements = Vec::with_capacity(max_cards);

    for item in eligible_cards(news) {
        if placements.len() >= max_cards {
            break;
        }
        let Some(anchor) = anchors.anchor(&item.region_code) else {
            continue;
        };

        let free = offsets
            .iter()
            .map(|offset| layout.rect_at(anchor, *offset))
            .find(|rect| !placed.iter().any(|other| rect.overlaps(other, layout.margin)));

        if let Some(rect) = free {
            placed.push(rect);
            placements.push(CardPlacement {
                item: item.clone(),
                position: ScreenPoint::new(rect.x, rect.y),
                anchor,
            });
        }
    }

    placements
}
