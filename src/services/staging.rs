use crate::services::attachment_pipeline::AttachmentCandidate;
use std::sync::Mutex;
use uuid::Uuid;

/// Files staged on the composer, waiting for the next send. Shared between
/// the pipeline (appends), the view (renders previews, unstages), and the
/// send path (reads, then clears on completion).
#[derive(Debug, Default)]
pub struct AttachmentStaging {
    files: Mutex<Vec<AttachmentCandidate>>,
}

impl AttachmentStaging {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AttachmentCandidate>> {
        self.files.lock().expect("staging mutex poisoned")
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn append(&self, candidates: Vec<AttachmentCandidate>) {
        self.lock().extend(candidates);
    }

    /// Removes one staged file by its preview id (user taps the x).
    pub fn remove(&self, preview_id: Uuid) {
        self.lock().retain(|c| c.preview_id != preview_id);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<AttachmentCandidate> {
        self.lock().clone()
    }
}
