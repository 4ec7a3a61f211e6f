//! File-backed case store.
//!
//! Layout under the artifacts root:
//!
//! ```text
//! <root>/evidence/<packet_id>.json   one pretty-printed packet per run
//! <root>/cases.jsonl                 append-only case log, one record per line
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};
use trafficiq_core::{BackendError, CaseRecord, CaseStore, EvidencePacket, IdGenerator, Priority};

use crate::StoreError;

pub const EVIDENCE_DIR: &str = "evidence";
pub const CASE_LOG: &str = "cases.jsonl";

/// Case store writing evidence artifacts and a JSON-lines case log.
#[derive(Debug)]
pub struct LocalCaseStore {
    root: PathBuf,
    ids: IdGenerator,
    // Serialises appends to the case log.
    log: Mutex<()>,
}

impl LocalCaseStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        Self::open_with_ids(root, IdGenerator::new("CASE")?)
    }

    pub fn open_with_ids(root: &Path, ids: IdGenerator) -> Result<Self, StoreError> {
        let evidence = root.join(EVIDENCE_DIR);
        fs::create_dir_all(&evidence).map_err(StoreError::io(&evidence))?;
        info!(root = %root.display(), "local case store ready");
        Ok(Self {
            root: root.to_path_buf(),
            ids,
            log: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn case_log_path(&self) -> PathBuf {
        self.root.join(CASE_LOG)
    }

    pub fn evidence_path(&self, packet_id: &str) -> PathBuf {
        self.root.join(EVIDENCE_DIR).join(format!("{packet_id}.json"))
    }

    fn write_evidence(&self, packet: &EvidencePacket) -> Result<PathBuf, StoreError> {
        let path = self.evidence_path(&packet.packet_id);
        let json = serde_json::to_vec_pretty(packet)?;
        fs::write(&path, json).map_err(StoreError::io(&path))?;
        debug!(path = %path.display(), "evidence written");
        Ok(path)
    }

    fn append_case(&self, case: &CaseRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(case)?;
        line.push('\n');
        let path = self.case_log_path();

        let _guard = self.log.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(StoreError::io(&path))?;
        repair_tail(&mut file, &path).map_err(StoreError::io(&path))?;
        file.write_all(line.as_bytes()).map_err(StoreError::io(&path))?;
        Ok(())
    }

    /// Persist the packet, then append the case that references it.
    pub fn create_case(
        &self,
        packet: &EvidencePacket,
        priority: Priority,
    ) -> Result<CaseRecord, StoreError> {
        let evidence = self.write_evidence(packet)?;
        let case = CaseRecord::open(
            self.ids.next_id(),
            packet,
            priority,
            evidence.display().to_string(),
        );
        if let Err(e) = self.append_case(&case) {
            // No case references the packet.
            if let Err(rm) = fs::remove_file(&evidence) {
                warn!(path = %evidence.display(), error = %rm, "orphaned evidence not removed");
            }
            return Err(e);
        }
        info!(case_id = %case.case_id, %priority, evidence = %evidence.display(), "case created");
        Ok(case)
    }

    fn read_log(&self) -> Result<Vec<CaseRecord>, StoreError> {
        let path = self.case_log_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path)(e)),
        };
        let mut cases = Vec::new();
        for (i, raw) in text.split_inclusive('\n').enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(case) => cases.push(case),
                // An unterminated last line is an append that never finished.
                Err(e) if !raw.ends_with('\n') => {
                    warn!(
                        path = %path.display(),
                        line = i + 1,
                        error = %e,
                        "skipping truncated case log record"
                    );
                }
                Err(source) => return Err(StoreError::CorruptLog { line: i + 1, source }),
            }
        }
        Ok(cases)
    }

    pub fn get_case(&self, case_id: &str) -> Result<Option<CaseRecord>, StoreError> {
        Ok(self.read_log()?.into_iter().find(|c| c.case_id == case_id))
    }

    /// The most recent `limit` cases, oldest first.
    pub fn list_cases(&self, limit: usize) -> Result<Vec<CaseRecord>, StoreError> {
        let mut cases = self.read_log()?;
        let skip = cases.len().saturating_sub(limit);
        Ok(cases.split_off(skip))
    }

    pub fn load_evidence(&self, packet_id: &str) -> Result<EvidencePacket, StoreError> {
        let path = self.evidence_path(packet_id);
        let bytes = fs::read(&path).map_err(StoreError::io(&path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Make sure the log ends on a record boundary before appending.
///
/// A complete record missing only its newline is terminated; a partial record
/// left by an interrupted append is cut off.
fn repair_tail(file: &mut File, path: &Path) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;
    let keep = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    if serde_json::from_slice::<CaseRecord>(&bytes[keep..]).is_ok() {
        file.write_all(b"\n")?;
    } else {
        warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - keep,
            "discarding truncated case log record"
        );
        file.set_len(keep as u64)?;
    }
    Ok(())
}

impl CaseStore for LocalCaseStore {
    fn create(
        &self,
        packet: &EvidencePacket,
        priority: Priority,
    ) -> Result<CaseRecord, BackendError> {
        Ok(self.create_case(packet, priority)?)
    }
}
