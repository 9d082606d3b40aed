use crate::config::AttachmentConfig;
use crate::domain::message::{AttachmentRef, AttachmentSource};
use crate::error::{ChatError, Result, ValidationError};
use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use futures::future::join_all;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Media types a file may declare. Anything else is rejected per file.
const ALLOWED_MIME_TYPES: [&str; 10] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "video/mp4",
    "video/quicktime",
    "video/webm",
];

#[derive(Clone, Debug)]
struct Metrics {
    staged_total: Counter<u64>,
    rejected_total: Counter<u64>,
    staged_size_bytes: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("pitchside-chat");
        Self {
            staged_total: meter
                .u64_counter("chat_attachments_staged_total")
                .with_description("Total files accepted into attachment staging")
                .build(),
            rejected_total: meter
                .u64_counter("chat_attachments_rejected_total")
                .with_description("Total files rejected by attachment validation")
                .build(),
            staged_size_bytes: meter
                .u64_histogram("chat_attachments_staged_size_bytes")
                .with_description("Distribution of staged attachment sizes")
                .build(),
        }
    }
}

/// Asynchronous access to a selected file's bytes. Browser file handles read
/// asynchronously; tests and native callers can use in-memory `Bytes`.
#[async_trait]
pub trait FileContents: Send + Sync + std::fmt::Debug {
    async fn read(&self) -> std::io::Result<Bytes>;
}

#[async_trait]
impl FileContents for Bytes {
    async fn read(&self) -> std::io::Result<Bytes> {
        Ok(self.clone())
    }
}

/// A file the user picked, before any validation.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub contents: Arc<dyn FileContents>,
}

impl SelectedFile {
    #[must_use]
    pub fn in_memory(name: impl Into<String>, mime_type: impl Into<String>, bytes: Bytes) -> Self {
        let size = bytes.len() as u64;
        Self { name: name.into(), mime_type: mime_type.into(), size, contents: Arc::new(bytes) }
    }
}

/// A validated, encoded file waiting to be sent. The preview id is local to
/// the staging area and is never a message id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentCandidate {
    pub preview_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub data_url: String,
}

impl AttachmentCandidate {
    #[must_use]
    pub fn to_attachment_ref(&self) -> AttachmentRef {
        AttachmentRef {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
            source: AttachmentSource::Inline { data_url: self.data_url.clone() },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error(transparent)]
    Validation(ValidationError),
    #[error("Could not read file: {0}")]
    ReadFailed(String),
}

/// A file turned away without affecting its batch siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: RejectReason,
}

/// Result of staging one batch. Batch-level rule violations never get this
/// far; they are the `Err` path of [`AttachmentPipeline::process`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub accepted: Vec<AttachmentCandidate>,
    pub rejected: Vec<RejectedFile>,
}

/// Validates and encodes selected files into transmittable candidates.
///
/// The count rule is batch-level: one over-limit batch is rejected whole,
/// never truncated. Type and size rules are per-file: one bad file does not
/// sink its siblings.
#[derive(Debug, Clone)]
pub struct AttachmentPipeline {
    config: AttachmentConfig,
    metrics: Metrics,
}

impl AttachmentPipeline {
    #[must_use]
    pub fn new(config: AttachmentConfig) -> Self {
        Self { config, metrics: Metrics::new() }
    }

    /// Validates a batch against the given staged count and encodes the
    /// accepted files concurrently.
    ///
    /// # Errors
    /// Returns `ChatError::Validation` when the combined staged + incoming
    /// count exceeds the limit. Per-file failures are reported in the
    /// returned outcome instead.
    #[tracing::instrument(skip(self, batch), fields(staged = staged_count, incoming = batch.len()))]
    pub async fn process(&self, staged_count: usize, batch: Vec<SelectedFile>) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let limit = self.config.max_staged_files;
        if staged_count + batch.len() > limit {
            self.metrics.rejected_total.add(batch.len() as u64, &[]);
            tracing::debug!(limit, "Attachment batch rejected by count rule");
            return Err(ChatError::Validation(ValidationError::TooManyAttachments {
                staged: staged_count,
                incoming: batch.len(),
                limit,
            }));
        }

        let mut outcome = BatchOutcome::default();
        let mut to_encode = Vec::new();

        for file in batch {
            if let Some(reason) = self.check_file(&file) {
                tracing::debug!(name = %file.name, %reason, "File rejected");
                outcome.rejected.push(RejectedFile { name: file.name, reason });
            } else {
                to_encode.push(file);
            }
        }

        // Reads are fanned out concurrently; one failed read must not abort
        // its siblings, so each branch resolves to its own verdict.
        let encoded = join_all(to_encode.into_iter().map(Self::encode)).await;
        for result in encoded {
            match result {
                Ok(candidate) => {
                    self.metrics.staged_total.add(1, &[]);
                    self.metrics.staged_size_bytes.record(candidate.size, &[]);
                    outcome.accepted.push(candidate);
                }
                Err(rejected) => {
                    tracing::warn!(name = %rejected.name, reason = %rejected.reason, "File read failed during staging");
                    outcome.rejected.push(rejected);
                }
            }
        }

        self.metrics.rejected_total.add(outcome.rejected.len() as u64, &[]);
        tracing::debug!(accepted = outcome.accepted.len(), rejected = outcome.rejected.len(), "Batch staged");
        Ok(outcome)
    }

    fn check_file(&self, file: &SelectedFile) -> Option<RejectReason> {
        if !ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str()) {
            return Some(RejectReason::Validation(ValidationError::UnsupportedMediaType {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
            }));
        }
        if file.size > self.config.max_file_size_bytes {
            return Some(RejectReason::Validation(ValidationError::FileTooLarge {
                name: file.name.clone(),
                size: file.size,
                limit_bytes: self.config.max_file_size_bytes,
            }));
        }
        None
    }

    async fn encode(file: SelectedFile) -> std::result::Result<AttachmentCandidate, RejectedFile> {
        match file.contents.read().await {
            Ok(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                Ok(AttachmentCandidate {
                    preview_id: Uuid::new_v4(),
                    name: file.name,
                    mime_type: file.mime_type.clone(),
                    size: bytes.len() as u64,
                    data_url: format!("data:{};base64,{encoded}", file.mime_type),
                })
            }
            Err(e) => Err(RejectedFile { name: file.name, reason: RejectReason::ReadFailed(e.to_string()) }),
        }
    }
}
