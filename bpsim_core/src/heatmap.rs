//! Visit and traversal counts for heatmap overlays.
//!
//! A pure function of the event log: `enter` rows count element visits,
//! `leave` rows count flow traversals. Colouring the diagram is left to the
//! presentation layer; this module only produces counts and intensity bins.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::rows::{EventKind, EventRow};

/// Number of non-zero intensity levels.
pub const INTENSITY_LEVELS: u8 = 4;

/// Maps a normalized count in `[0, 1]` to a level in `0..=4`.
///
/// 0 means "not visited"; the remaining quartiles map to 1 through 4.
pub fn intensity_bin(normalized: f64) -> u8 {
    if normalized <= 0.0 {
        0
    } else if normalized < 0.25 {
        1
    } else if normalized < 0.50 {
        2
    } else if normalized < 0.75 {
        3
    } else {
        INTENSITY_LEVELS
    }
}

/// Per-element and per-flow counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeatmapCounts {
    pub elements: BTreeMap<String, u64>,
    pub flows: BTreeMap<String, u64>,
}

impl HeatmapCounts {
    /// Counts visits and traversals in an event log.
    pub fn from_events(rows: &[EventRow]) -> Self {
        let mut counts = Self::default();
        for row in rows {
            match row.event_type {
                EventKind::Enter if !row.element_id.is_empty() => {
                    *counts.elements.entry(row.element_id.clone()).or_default() += 1;
                }
                EventKind::Leave if !row.flow_id.is_empty() => {
                    *counts.flows.entry(row.flow_id.clone()).or_default() += 1;
                }
                _ => {}
            }
        }
        counts
    }

    /// Intensity level per visited element, relative to the busiest one.
    pub fn element_levels(&self) -> BTreeMap<String, u8> {
        levels(&self.elements)
    }

    /// Intensity level per traversed flow, relative to the busiest one.
    pub fn flow_levels(&self) -> BTreeMap<String, u8> {
        levels(&self.flows)
    }
}

fn levels(counts: &BTreeMap<String, u64>) -> BTreeMap<String, u8> {
    let max = counts.values().copied().max().unwrap_or(0).max(1);
    counts
        .iter()
        .map(|(id, &count)| (id.clone(), intensity_bin(count as f64 / max as f64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: EventKind, element: &str, flow: &str) -> EventRow {
        EventRow {
            scenario_id: "s".to_string(),
            replication: 1,
            sim_time: 0.0,
            event_type: kind,
            case_id: "C1_1".to_string(),
            token_id: "T1_1".to_string(),
            element_id: element.to_string(),
            element_type: String::new(),
            from_id: String::new(),
            to_id: String::new(),
            flow_id: flow.to_string(),
        }
    }

    fn log() -> Vec<EventRow> {
        vec![
            row(EventKind::CaseStart, "S", ""),
            row(EventKind::Enter, "S", ""),
            row(EventKind::Leave, "", "f1"),
            row(EventKind::Enter, "A", ""),
            row(EventKind::Enter, "A", ""),
            row(EventKind::Enter, "A", ""),
            row(EventKind::Enter, "A", ""),
            row(EventKind::Leave, "", "f2"),
            row(EventKind::Enter, "", ""),
        ]
    }

    #[test]
    fn test_counts_enter_and_leave_only() {
        let counts = HeatmapCounts::from_events(&log());
        assert_eq!(counts.elements.get("S"), Some(&1));
        assert_eq!(counts.elements.get("A"), Some(&4));
        assert_eq!(counts.elements.len(), 2);
        assert_eq!(counts.flows.get("f1"), Some(&1));
        assert_eq!(counts.flows.get("f2"), Some(&1));
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let rows = log();
        let first = HeatmapCounts::from_events(&rows);
        let second = HeatmapCounts::from_events(&rows);
        assert_eq!(first, second);
    }

    #[test]
    fn test_levels_relative_to_max() {
        let counts = HeatmapCounts::from_events(&log());
        let levels = counts.element_levels();
        assert_eq!(levels["A"], 4);
        // 1 of 4 sits exactly on the first quartile edge.
        assert_eq!(levels["S"], 2);
        assert_eq!(counts.flow_levels()["f1"], 4);
    }

    #[test]
    fn test_levels_first_quartile() {
        let counts: BTreeMap<String, u64> = [("busy", 5), ("rare", 1), ("mid", 3)]
            .into_iter()
            .map(|(id, n)| (id.to_string(), n))
            .collect();
        let bins = levels(&counts);
        assert_eq!(bins["rare"], 1);
        assert_eq!(bins["mid"], 3);
        assert_eq!(bins["busy"], 4);
    }

    #[test]
    fn test_intensity_bins() {
        assert_eq!(intensity_bin(0.0), 0);
        assert_eq!(intensity_bin(0.1), 1);
        assert_eq!(intensity_bin(0.25), 2);
        assert_eq!(intensity_bin(0.5), 3);
        assert_eq!(intensity_bin(0.75), 4);
        assert_eq!(intensity_bin(1.0), 4);
    }

    #[test]
    fn test_empty_log() {
        let counts = HeatmapCounts::from_events(&[]);
        assert!(counts.element_levels().is_empty());
        assert!(counts.flow_levels().is_empty());
    }
}
