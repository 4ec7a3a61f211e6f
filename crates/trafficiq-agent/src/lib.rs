//! Pipeline orchestration: router, evidence assembly and cancellation.

mod cancel;
pub use cancel::CancellationToken;

pub mod evidence;
pub use evidence::{EvidenceBuilder, EvidenceDraft, evidence_notes};

mod router;
pub use router::{Collaborators, RunRequest, Router};
