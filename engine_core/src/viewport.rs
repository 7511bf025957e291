// Zoom tiers and viewport visibility for region markers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::placement::AnchorLookup;
use crate::types::*;

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 8.0;

/// Markers this close outside the viewport still count as visible.
const VIEWPORT_SLACK: f64 = 30.0;

/// Map zoom transform as reported by the host: scale `k`, translation `x`/`y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomState {
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

impl ZoomState {
    pub fn new(k: f64, x: f64, y: f64) -> Self {
        let k = if k.is_finite() { k.clamp(MIN_ZOOM, MAX_ZOOM) } else { MIN_ZOOM };
        ZoomState { k, x, y }
    }

    pub fn tier(&self) -> ZoomTier {
        ZoomTier::from_scale(self.k)
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        ZoomState {
            k: MIN_ZOOM,
            x: 0.0,
            y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomTier {
    Country,
    Region,
    Prefecture,
}

impl ZoomTier {
    pub fn from_scale(k: f64) -> Self {
        if k < 2.0 {
            ZoomTier::Country
        } else if k < 4.5 {
            ZoomTier::Region
        } else {
            ZoomTier::Prefecture
        }
    }

    /// Card budget for this tier.
    pub fn max_cards(self) -> usize {
        match self {
            ZoomTier::Country => 5,
            ZoomTier::Region => 8,
            ZoomTier::Prefecture => 12,
        }
    }
}

/// Size of the host's map surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

/// Visible map-space rectangle after undoing the zoom transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl ViewportBounds {
    pub fn new(zoom: &ZoomState, size: ViewportSize) -> Self {
        ViewportBounds {
            min_x: -zoom.x / zoom.k,
            max_x: (size.width - zoom.x) / zoom.k,
            min_y: -zoom.y / zoom.k,
            max_y: (size.height - zoom.y) / zoom.k,
        }
    }

    pub fn contains(&self, point: ScreenPoint, slack: f64) -> bool {
        point.x >= self.min_x - slack
            && point.x <= self.max_x + slack
            && point.y >= self.min_y - slack
            && point.y <= self.max_y + slack
    }
}

/// A region that currently gets a pulse marker on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionMarker {
    pub region_code: String,
    pub region_name: String,
    pub anchor: ScreenPoint,
    pub article_count: usize,
    pub has_breaking: bool,
}

/// Group news by region code, keeping feed order inside each group.
pub fn group_by_region(news: &[NewsArticle]) -> BTreeMap<&str, Vec<&NewsArticle>> {
    let mut groups: BTreeMap<&str, Vec<&NewsArticle>> = BTreeMap::new();
    for item in news {
        groups.entry(item.region_code.as_str()).or_default().push(item);
    }
    groups
}

/// Regions worth a marker at this zoom: inside the viewport, never the
/// national bucket, and at country tier only busy or breaking regions.
pub fn visible_regions(
    news: &[NewsArticle],
    anchors: &impl AnchorLookup,
    zoom: &ZoomState,
    size: ViewportSize,
) -> Vec<RegionMarker> {
    let bounds = ViewportBounds::new(zoom, size);
    let tier = zoom.tier();

    group_by_region(news)
        .into_iter()
        .filter(|(code, _)| *code != NATIONAL_REGION)
        .filter_map(|(code, items)| {
            let anchor = anchors.anchor(code)?;
            if !bounds.contains(anchor, VIEWPORT_SLACK) {
                return None;
            }
            let has_breaking = items.iter().any(|n| n.is_breaking);
            if tier == ZoomTier::Country && !has_breaking && items.len() < 2 {
                return None;
            }
            Some(RegionMarker {
                region_code: code.to_string(),
                region_name: items[0].region_name.clone(),
                anchor,
                article_count: items.len(),
                has_breaking,
            })
        })
        .collect()
}
