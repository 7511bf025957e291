// Warning panel reducer and list filters.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::severity::severity_rank;
use crate::types::*;

/// Panel toggles. An externally requested state overrides both toggles
/// whenever it changes; manual toggles stand until the next such change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelState {
    pub open: bool,
    pub show_advisory: bool,
    #[serde(skip)]
    last_external: Option<bool>,
}

impl PanelState {
    pub fn sync_external(&mut self, requested: Option<bool>) {
        if requested == self.last_external {
            return;
        }
        self.last_external = requested;
        if let Some(expanded) = requested {
            self.open = expanded;
            self.show_advisory = expanded;
        }
    }

    pub fn toggle_open(&mut self) {
        self.open = !self.open;
    }

    pub fn toggle_advisory(&mut self) {
        self.show_advisory = !self.show_advisory;
    }
}

/// Areas listed in the warning panel, most severe first. With advisories
/// hidden only warning and special warning areas are listed; with them
/// shown every area in the prefecture is.
pub fn panel_warnings(
    warnings: &[WarningSummary],
    prefecture_name: Option<&str>,
    show_advisory: bool,
) -> Vec<WarningSummary> {
    let mut listed: Vec<WarningSummary> = warnings
        .iter()
        .filter(|w| prefecture_name.map_or(true, |name| w.prefecture_name == name))
        .filter(|w| show_advisory || w.max_severity >= WarningSeverity::Warning)
        .cloned()
        .collect();

    listed.sort_by(|a, b| {
        Reverse(severity_rank(a.max_severity))
            .cmp(&Reverse(severity_rank(b.max_severity)))
            .then_with(|| a.area_code.cmp(&b.area_code))
    });
    listed
}

/// News for the selected region, or everything when nothing is selected.
pub fn news_for_region(news: &[NewsArticle], region_code: Option<&str>) -> Vec<NewsArticle> {
    match region_code {
        Some(code) => news.iter().filter(|n| n.region_code == code).cloned().collect(),
        None => news.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(area: &str, pref: &str, severity: WarningSeverity) -> WarningSummary {
        WarningSummary {
            area_code: area.into(),
            area_name: String::new(),
            prefecture_name: pref.into(),
            max_severity: severity,
            active_warnings: Vec::new(),
            report_datetime: String::new(),
        }
    }

    #[test]
    fn external_change_resets_toggles() {
        let mut panel = PanelState::default();
        panel.sync_external(Some(true));
        assert!(panel.open && panel.show_advisory);

        panel.toggle_open();
        panel.toggle_advisory();
        // Same external value again: manual state stands.
        panel.sync_external(Some(true));
        assert!(!panel.open && !panel.show_advisory);

        panel.sync_external(Some(false));
        panel.toggle_advisory();
        panel.sync_external(None);
        assert!(!panel.open);
        assert!(panel.show_advisory);

        panel.sync_external(Some(true));
        assert!(panel.open && panel.show_advisory);
    }

    #[test]
    fn warnings_sorted_by_rank_then_area() {
        let warnings = vec![
            summary("140000", "神奈川県", WarningSeverity::Advisory),
            summary("130020", "東京都", WarningSeverity::Warning),
            summary("130010", "東京都", WarningSeverity::Warning),
            summary("460100", "鹿児島県", WarningSeverity::Special),
            summary("270000", "大阪府", WarningSeverity::None),
        ];

        let codes = |list: Vec<WarningSummary>| -> Vec<String> {
            list.into_iter().map(|w| w.area_code).collect()
        };
        assert_eq!(
            codes(panel_warnings(&warnings, None, false)),
            vec!["460100", "130010", "130020"]
        );
        assert_eq!(
            codes(panel_warnings(&warnings, None, true)),
            vec!["460100", "130010", "130020", "140000", "270000"]
        );
        assert_eq!(
            codes(panel_warnings(&warnings, Some("東京都"), true)),
            vec!["130010", "130020"]
        );
    }

    #[test]
    fn quiet_areas_listed_only_with_advisories() {
        let warnings = vec![
            summary("170010", "石川県", WarningSeverity::None),
            summary("170020", "石川県", WarningSeverity::Advisory),
            summary("180000", "福井県", WarningSeverity::None),
        ];

        let shown = panel_warnings(&warnings, Some("石川県"), true);
        let codes: Vec<_> = shown.iter().map(|w| w.area_code.as_str()).collect();
        assert_eq!(codes, vec!["170020", "170010"]);

        assert!(panel_warnings(&warnings, Some("石川県"), false).is_empty());
    }

    #[test]
    fn region_filter() {
        let article = |id: &str, region: &str| NewsArticle {
            id: id.into(),
            title: String::new(),
            link: String::new(),
            source: String::new(),
            published_at: String::new(),
            region_code: region.into(),
            region_name: String::new(),
            is_breaking: false,
            category: NewsCategory::Other,
            image_url: None,
        };
        let news = vec![article("a", "13"), article("b", "27"), article("c", "13")];
        let ids: Vec<_> = news_for_region(&news, Some("13")).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(news_for_region(&news, None).len(), 3);
        assert!(news_for_region(&news, Some("01")).is_empty());
    }
}
