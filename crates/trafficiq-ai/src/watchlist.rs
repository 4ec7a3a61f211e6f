//! Watchlist (BOLO) reference table and the correlation over it.
//!
//! The table is read-only after load and shared between runs behind an
//! `Arc`; lookups are pure functions of the table and their arguments.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use trafficiq_core::ids::{hex_prefix, sha256};
use trafficiq_core::{BackendError, VehicleIdentification, WatchlistMatch, WatchlistService};

/// One watched value and the confidence reported when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub value: String,
    pub confidence: f64,
}

impl WatchEntry {
    pub fn new(value: impl Into<String>, confidence: f64) -> Self {
        Self {
            value: value.into(),
            confidence,
        }
    }
}

/// Which rule produced a match. Declaration order is lookup precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Make,
    Model,
    Plate,
    Suffix,
    Prefix,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Make => "MAKE",
            Self::Model => "MODEL",
            Self::Plate => "PLATE",
            Self::Suffix => "SUFFIX",
            Self::Prefix => "PREFIX",
        }
    }

    /// `BOLO-<KIND>-<8 hex>`, stable for a given watched value.
    pub fn record_id(&self, value: &str) -> String {
        format!(
            "BOLO-{}-{}",
            self.as_str(),
            hex_prefix(&sha256(value.as_bytes()), 4)
        )
    }

    fn reason(&self, value: &str) -> String {
        match self {
            Self::Make => format!("Make '{value}' on watchlist"),
            Self::Model => format!("Model '{value}' on watchlist"),
            Self::Plate => format!("Plate '{value}' on watchlist"),
            Self::Suffix => format!("Plate pattern match ({value})"),
            Self::Prefix => format!("Plate prefix match ({value})"),
        }
    }
}

/// Watched makes, models and plate patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchlistTable {
    pub makes: Vec<WatchEntry>,
    pub models: Vec<WatchEntry>,
    pub plates: Vec<WatchEntry>,
    pub plate_suffixes: Vec<WatchEntry>,
    pub plate_prefixes: Vec<WatchEntry>,
}

impl WatchlistTable {
    /// Built-in demonstration table.
    pub fn demo() -> Self {
        Self {
            makes: vec![WatchEntry::new("Honda", 0.85), WatchEntry::new("Toyota", 0.85)],
            models: Vec::new(),
            plates: Vec::new(),
            plate_suffixes: vec![WatchEntry::new("7", 0.75), WatchEntry::new("99", 0.75)],
            plate_prefixes: vec![WatchEntry::new("ABC", 0.70), WatchEntry::new("XYZ", 0.70)],
        }
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let table: Self = serde_json::from_str(json).context("parsing watchlist JSON")?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading watchlist {}", path.display()))?;
        let table = Self::from_json_str(&json)
            .with_context(|| format!("loading watchlist {}", path.display()))?;
        tracing::info!(path = %path.display(), entries = table.len(), "watchlist loaded");
        Ok(table)
    }

    fn sections(&self) -> [(MatchKind, &[WatchEntry]); 5] {
        [
            (MatchKind::Make, self.makes.as_slice()),
            (MatchKind::Model, self.models.as_slice()),
            (MatchKind::Plate, self.plates.as_slice()),
            (MatchKind::Suffix, self.plate_suffixes.as_slice()),
            (MatchKind::Prefix, self.plate_prefixes.as_slice()),
        ]
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (kind, entries) in self.sections() {
            for e in entries {
                if e.value.trim().is_empty() {
                    bail!("empty {} entry in watchlist", kind.as_str());
                }
                if !(0.0..=1.0).contains(&e.confidence) {
                    bail!(
                        "{} entry '{}' has confidence {} outside [0, 1]",
                        kind.as_str(),
                        e.value,
                        e.confidence
                    );
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sections().iter().map(|(_, e)| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(
        &self,
        vehicle: &VehicleIdentification,
        plate: Option<&str>,
    ) -> Option<(MatchKind, &WatchEntry)> {
        let plate = plate.map(str::to_ascii_uppercase);
        let hit = |kind: MatchKind, e: &WatchEntry| -> bool {
            let watched = e.value.to_ascii_uppercase();
            match (kind, plate.as_deref()) {
                (MatchKind::Make, _) => e.value.eq_ignore_ascii_case(&vehicle.make),
                (MatchKind::Model, _) => e.value.eq_ignore_ascii_case(&vehicle.model),
                (MatchKind::Plate, Some(p)) => p == watched,
                (MatchKind::Suffix, Some(p)) => p.ends_with(&watched),
                (MatchKind::Prefix, Some(p)) => p.starts_with(&watched),
                (_, None) => false,
            }
        };
        self.sections()
            .into_iter()
            .find_map(|(kind, entries)| entries.iter().find(|e| hit(kind, *e)).map(|e| (kind, e)))
    }

    /// Correlate `vehicle` and an optional plate. First rule to hit wins.
    pub fn lookup(&self, vehicle: &VehicleIdentification, plate: Option<&str>) -> WatchlistMatch {
        match self.find(vehicle, plate) {
            None => WatchlistMatch::no_match(),
            Some((kind, entry)) => WatchlistMatch {
                is_match: true,
                make: Some(vehicle.make.clone()),
                model: Some(vehicle.model.clone()),
                year_range: Some(vehicle.year_range.clone()),
                plate: plate.map(str::to_string),
                reason: kind.reason(&entry.value),
                match_confidence: entry.confidence,
                record_id: Some(kind.record_id(&entry.value)),
            },
        }
    }
}

/// [`WatchlistService`] over a shared [`WatchlistTable`].
#[derive(Debug, Clone)]
pub struct MockWatchlistService {
    table: Arc<WatchlistTable>,
}

impl MockWatchlistService {
    pub fn new(table: Arc<WatchlistTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &WatchlistTable {
        &self.table
    }
}

impl Default for MockWatchlistService {
    fn default() -> Self {
        Self::new(Arc::new(WatchlistTable::demo()))
    }
}

impl WatchlistService for MockWatchlistService {
    fn lookup(
        &self,
        vehicle: &VehicleIdentification,
        plate: Option<&str>,
    ) -> Result<WatchlistMatch, BackendError> {
        let m = self.table.lookup(vehicle, plate);
        tracing::debug!(
            make = %vehicle.make,
            plate = ?plate,
            is_match = m.is_match,
            reason = %m.reason,
            "watchlist lookup"
        );
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;
    use trafficiq_core::ImageCondition;

    fn vehicle(make: &str, model: &str) -> VehicleIdentification {
        VehicleIdentification {
            make: make.into(),
            model: model.into(),
            year_range: "2021-2022".into(),
            color: "White".into(),
            body_type: "sedan".into(),
            confidence: 0.8,
            image_condition: ImageCondition::Clear,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn make_match_is_case_insensitive() {
        let table = WatchlistTable::demo();
        let m = table.lookup(&vehicle("hONDA", "Civic"), None);
        assert!(m.is_match);
        assert_eq!(m.reason, "Make 'Honda' on watchlist");
        assert_eq!(m.match_confidence, 0.85);
        assert_eq!(m.record_id.as_deref(), Some(MatchKind::Make.record_id("Honda").as_str()));
        assert_eq!(m.make.as_deref(), Some("hONDA"));
    }

    #[test]
    fn plate_rules_need_a_plate() {
        let table = WatchlistTable::demo();
        let m = table.lookup(&vehicle("Ford", "F150"), None);
        assert_eq!(m, WatchlistMatch::no_match());
    }

    #[test]
    fn suffix_then_prefix() {
        let table = WatchlistTable::demo();
        let ford = vehicle("Ford", "F150");

        let m = table.lookup(&ford, Some("abc1237"));
        // suffix outranks prefix
        assert_eq!(m.reason, "Plate pattern match (7)");
        assert_eq!(m.match_confidence, 0.75);
        assert!(m.record_id.unwrap().starts_with("BOLO-SUFFIX-"));
        assert_eq!(m.plate.as_deref(), Some("abc1237"));

        let m = table.lookup(&ford, Some("XYZ1234"));
        assert_eq!(m.reason, "Plate prefix match (XYZ)");
        assert_eq!(m.match_confidence, 0.70);

        assert!(!table.lookup(&ford, Some("QRS1234")).is_match);
    }

    #[test]
    fn precedence_make_model_plate() {
        let table = WatchlistTable {
            makes: vec![WatchEntry::new("Tesla", 0.9)],
            models: vec![WatchEntry::new("Camry", 0.8)],
            plates: vec![WatchEntry::new("7ABC123", 0.95)],
            plate_suffixes: vec![WatchEntry::new("123", 0.6)],
            plate_prefixes: Vec::new(),
        };
        let m = table.lookup(&vehicle("Tesla", "Camry"), Some("7ABC123"));
        assert_eq!(m.record_id.unwrap(), MatchKind::Make.record_id("Tesla"));

        let m = table.lookup(&vehicle("Toyota", "camry"), Some("7ABC123"));
        assert_eq!(m.reason, "Model 'Camry' on watchlist");

        let m = table.lookup(&vehicle("Toyota", "Corolla"), Some("7abc123"));
        assert_eq!(m.reason, "Plate '7ABC123' on watchlist");
        assert_eq!(m.match_confidence, 0.95);
    }

    #[test]
    fn record_id_is_stable() {
        let id = MatchKind::Plate.record_id("7ABC123");
        assert_eq!(id, MatchKind::Plate.record_id("7ABC123"));
        assert_eq!(id.len(), "BOLO-PLATE-".len() + 8);
        assert_ne!(id, MatchKind::Plate.record_id("7ABC124"));
    }

    #[test]
    fn loads_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{
                "makes": [{{ "value": "BMW", "confidence": 0.9 }}],
                "plate_prefixes": [{{ "value": "ZZ", "confidence": 0.5 }}]
            }}"#
        )
        .unwrap();
        let table = WatchlistTable::from_json_file(f.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.lookup(&vehicle("bmw", "3 Series"), None).is_match);
    }

    #[test]
    fn rejects_bad_confidence() {
        let json = r#"{ "makes": [{ "value": "BMW", "confidence": 1.5 }] }"#;
        let err = WatchlistTable::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));
        assert!(WatchlistTable::from_json_file(Path::new("/nonexistent/watchlist.json")).is_err());
    }

    #[test]
    fn service_shares_table() {
        let table = Arc::new(WatchlistTable::demo());
        let a = MockWatchlistService::new(Arc::clone(&table));
        let b = MockWatchlistService::new(Arc::clone(&table));
        let v = vehicle("Toyota", "Camry");
        assert_eq!(a.lookup(&v, None).unwrap(), b.lookup(&v, None).unwrap());
        assert_eq!(Arc::strong_count(&table), 3);
    }
}
