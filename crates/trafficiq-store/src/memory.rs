use std::collections::HashMap;
use std::sync::Mutex;

use tracing::info;
use trafficiq_core::{BackendError, CaseRecord, CaseStore, EvidencePacket, IdGenerator, Priority};

use crate::StoreError;

#[derive(Debug, Default)]
struct Inner {
    cases: Vec<CaseRecord>,
    evidence: HashMap<String, EvidencePacket>,
}

/// Ephemeral case store. Evidence references use the `memory://` scheme.
#[derive(Debug)]
pub struct InMemoryCaseStore {
    ids: IdGenerator,
    inner: Mutex<Inner>,
}

impl InMemoryCaseStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self::with_ids(IdGenerator::new("CASE")?))
    }

    /// Store issuing case ids from `ids`.
    pub fn with_ids(ids: IdGenerator) -> Self {
        Self {
            ids,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn create_case(
        &self,
        packet: &EvidencePacket,
        priority: Priority,
    ) -> Result<CaseRecord, StoreError> {
        let evidence_ref = format!("memory://evidence/{}", packet.packet_id);
        let case = CaseRecord::open(self.ids.next_id(), packet, priority, evidence_ref);

        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        inner
            .evidence
            .insert(packet.packet_id.clone(), packet.clone());
        inner.cases.push(case.clone());
        info!(case_id = %case.case_id, %priority, "case created");
        Ok(case)
    }

    pub fn get_case(&self, case_id: &str) -> Result<Option<CaseRecord>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.cases.iter().find(|c| c.case_id == case_id).cloned())
    }

    /// The most recent `limit` cases, oldest first.
    pub fn list_cases(&self, limit: usize) -> Result<Vec<CaseRecord>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let skip = inner.cases.len().saturating_sub(limit);
        Ok(inner.cases[skip..].to_vec())
    }

    pub fn evidence(&self, packet_id: &str) -> Result<Option<EvidencePacket>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.evidence.get(packet_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.cases.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CaseStore for InMemoryCaseStore {
    fn create(
        &self,
        packet: &EvidencePacket,
        priority: Priority,
    ) -> Result<CaseRecord, BackendError> {
        Ok(self.create_case(packet, priority)?)
    }
}
