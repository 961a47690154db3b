//! In-memory measurement history, newest first

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::{DrapeSettings, Measurement};

#[derive(Clone, Debug, Default)]
pub struct MeasurementHistory {
    entries: VecDeque<Measurement>,
}

/// One export row in the fixed column order: time, area (cm²), drape (%)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub time: String,
    pub area_cm2: f64,
    pub drape_coefficient_pct: f64,
}

/// Everything an exporter needs: the settings in effect and the rows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub settings: DrapeSettings,
    pub rows: Vec<HistoryRow>,
}

impl MeasurementHistory {
    pub fn record(&mut self, measurement: Measurement) {
        self.entries.push_front(measurement);
    }

    /// Measurements in display order (newest first)
    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self, settings: DrapeSettings) -> HistorySnapshot {
        let rows = self
            .entries
            .iter()
            .map(|m| HistoryRow {
                time: m.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                area_cm2: m.area_cm2,
                drape_coefficient_pct: m.drape_coefficient_pct,
            })
            .collect();
        HistorySnapshot { settings, rows }
    }
}
