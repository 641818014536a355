//! The eight fixed city zones and their run-scoped status.

use serde::{Deserialize, Serialize};

use crate::config::ZONE_COUNT;

/// Static description of one zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub population: u32,
    /// Risk level between runs.
    pub baseline_risk: f64,
    /// Centre on the flood grid (row, col).
    pub grid_center: (usize, usize),
    /// Ground elevation in metres, used by the infrastructure graph.
    pub elevation: f64,
}

pub const CITY_ZONES: [ZoneSpec; ZONE_COUNT] = [
    ZoneSpec {
        id: "zone-1",
        name: "Riverside",
        population: 4200,
        baseline_risk: 22.0,
        grid_center: (4, 5),
        elevation: 8.0,
    },
    ZoneSpec {
        id: "zone-2",
        name: "Old Town",
        population: 3600,
        baseline_risk: 18.0,
        grid_center: (9, 8),
        elevation: 12.0,
    },
    ZoneSpec {
        id: "zone-3",
        name: "Harbor",
        population: 2900,
        baseline_risk: 20.0,
        grid_center: (16, 12),
        elevation: 6.0,
    },
    ZoneSpec {
        id: "zone-4",
        name: "Market District",
        population: 5100,
        baseline_risk: 12.0,
        grid_center: (6, 12),
        elevation: 22.0,
    },
    ZoneSpec {
        id: "zone-5",
        name: "University Hill",
        population: 3800,
        baseline_risk: 6.0,
        grid_center: (2, 13),
        elevation: 41.0,
    },
    ZoneSpec {
        id: "zone-6",
        name: "Industrial Park",
        population: 1900,
        baseline_risk: 15.0,
        grid_center: (13, 3),
        elevation: 15.0,
    },
    ZoneSpec {
        id: "zone-7",
        name: "Northgate",
        population: 4400,
        baseline_risk: 9.0,
        grid_center: (17, 5),
        elevation: 30.0,
    },
    ZoneSpec {
        id: "zone-8",
        name: "Eastwood",
        population: 3300,
        baseline_risk: 8.0,
        grid_center: (11, 14),
        elevation: 35.0,
    },
];

pub const SHELTER_IDS: [&str; 2] = ["shelter-A", "shelter-B"];

pub fn zone_spec(id: &str) -> Option<&'static ZoneSpec> {
    CITY_ZONES.iter().find(|z| z.id == id)
}

pub fn is_shelter(id: &str) -> bool {
    SHELTER_IDS.contains(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    #[default]
    Normal,
    Warning,
    Critical,
    Evacuating,
    Mitigated,
}

impl ZoneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneStatus::Normal => "normal",
            ZoneStatus::Warning => "warning",
            ZoneStatus::Critical => "critical",
            ZoneStatus::Evacuating => "evacuating",
            ZoneStatus::Mitigated => "mitigated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub risk_level: f64,
    pub population: u32,
    pub status: ZoneStatus,
}

impl From<&ZoneSpec> for Zone {
    fn from(spec: &ZoneSpec) -> Self {
        Self {
            id: spec.id.to_string(),
            name: spec.name.to_string(),
            risk_level: spec.baseline_risk,
            population: spec.population,
            status: ZoneStatus::Normal,
        }
    }
}

/// A zone change worth reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneChange {
    pub zone: String,
    pub status: ZoneStatus,
    pub risk: f64,
}

/// Mutable zone board for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneBoard {
    zones: Vec<Zone>,
}

impl Default for ZoneBoard {
    fn default() -> Self {
        Self {
            zones: CITY_ZONES.iter().map(Zone::from).collect(),
        }
    }
}

impl ZoneBoard {
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn get(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Set status and risk; returns the change if anything moved.
    pub fn update(&mut self, id: &str, status: ZoneStatus, risk: f64) -> Option<ZoneChange> {
        let zone = self.zones.iter_mut().find(|z| z.id == id)?;
        let risk = risk.clamp(0.0, 100.0);
        if zone.status == status && (zone.risk_level - risk).abs() < f64::EPSILON {
            return None;
        }
        zone.status = status;
        zone.risk_level = risk;
        Some(ZoneChange {
            zone: zone.id.clone(),
            status,
            risk,
        })
    }

    /// Set status, keeping the current risk.
    pub fn set_status(&mut self, id: &str, status: ZoneStatus) -> Option<ZoneChange> {
        let risk = self.get(id)?.risk_level;
        self.update(id, status, risk)
    }

    pub fn total_population(&self, ids: &[String]) -> u32 {
        ids.iter()
            .filter_map(|id| self.get(id))
            .map(|z| z.population)
            .sum()
    }

    /// Ids of the `n` riskiest zones, ties broken by id.
    pub fn riskiest(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<&Zone> = self.zones.iter().collect();
        ranked.sort_by(|a, b| {
            b.risk_level
                .total_cmp(&a.risk_level)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.into_iter().take(n).map(|z| z.id.clone()).collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eight_zones_with_unique_ids() {
        let board = ZoneBoard::default();
        assert_eq!(board.zones().len(), 8);
        let mut ids: Vec<&str> = board.zones().iter().map(|z| z.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert!(board.zones().iter().all(|z| z.status == ZoneStatus::Normal));
    }

    #[test]
    fn test_update_reports_changes_only() {
        let mut board = ZoneBoard::default();
        let change = board.update("zone-1", ZoneStatus::Critical, 91.0);
        assert!(change.is_some());
        assert!(board.update("zone-1", ZoneStatus::Critical, 91.0).is_none());
        assert!(board.update("zone-99", ZoneStatus::Critical, 91.0).is_none());
    }

    #[test]
    fn test_riskiest_orders_by_risk() {
        let mut board = ZoneBoard::default();
        board.update("zone-6", ZoneStatus::Critical, 95.0);
        let top = board.riskiest(3);
        assert_eq!(top[0], "zone-6");
        assert_eq!(top.len(), 3);
    }

    #[test]
    fn test_reset_restores_baseline() {
        let mut board = ZoneBoard::default();
        board.update("zone-2", ZoneStatus::Evacuating, 70.0);
        board.reset();
        assert_eq!(board, ZoneBoard::default());
    }

    #[test]
    fn test_total_population() {
        let board = ZoneBoard::default();
        let ids = vec!["zone-1".to_string(), "zone-2".to_string(), "nope".to_string()];
        assert_eq!(board.total_population(&ids), 4200 + 3600);
    }

    #[test]
    fn test_shelters() {
        assert!(is_shelter("shelter-A"));
        assert!(!is_shelter("zone-1"));
        assert_eq!(zone_spec("zone-3").map(|z| z.name), Some("Harbor"));
    }
}
