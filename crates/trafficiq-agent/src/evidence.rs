//! Evidence packet assembly. Pure aggregation: no collaborator is called here.

use chrono::{DateTime, Utc};
use trafficiq_core::{
    EvidencePacket, IdError, IdGenerator, PlateResult, Priority, Stage, VehicleIdentification,
    WatchlistMatch,
};

/// Everything a packet records about one run.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceDraft<'a> {
    pub image_uri: &'a str,
    pub captured_at: Option<DateTime<Utc>>,
    pub location: Option<&'a str>,
    pub vehicle: &'a VehicleIdentification,
    /// Present only when plate extraction ran.
    pub plate: Option<&'a PlateResult>,
    pub plate_used_for_lookup: bool,
    pub watchlist: &'a WatchlistMatch,
    pub priority: Priority,
    pub trace: &'a [Stage],
}

pub fn evidence_notes(ocr_fallback_used: bool, is_match: bool) -> String {
    format!("OCR fallback used: {ocr_fallback_used}, BOLO match: {is_match}")
}

/// Issues `EV-` ids and stamps packets with their creation time.
#[derive(Debug)]
pub struct EvidenceBuilder {
    ids: IdGenerator,
}

impl EvidenceBuilder {
    pub fn new() -> Result<Self, IdError> {
        Ok(Self::with_ids(IdGenerator::new("EV")?))
    }

    pub fn with_ids(ids: IdGenerator) -> Self {
        Self { ids }
    }

    pub fn build(&self, draft: EvidenceDraft<'_>) -> EvidencePacket {
        let ocr_fallback_used = draft.plate.is_some();
        EvidencePacket {
            packet_id: self.ids.next_id(),
            created_at: Utc::now(),
            image_uri: draft.image_uri.to_string(),
            captured_at: draft.captured_at,
            location: draft.location.map(str::to_string),
            vehicle: draft.vehicle.clone(),
            ocr_fallback_used,
            plate: draft.plate.cloned(),
            plate_used_for_lookup: draft.plate_used_for_lookup,
            watchlist: draft.watchlist.clone(),
            priority: draft.priority,
            trace: draft.trace.to_vec(),
            notes: evidence_notes(ocr_fallback_used, draft.watchlist.is_match),
        }
    }
}
