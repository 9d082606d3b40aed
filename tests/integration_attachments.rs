use bytes::Bytes;
use pitchside_chat::config::AttachmentConfig;
use pitchside_chat::error::{ChatError, ValidationError};
use pitchside_chat::services::attachment_pipeline::{AttachmentPipeline, SelectedFile};
use pitchside_chat::services::staging::AttachmentStaging;

mod common;
use common::setup_tracing;

fn image(name: &str) -> SelectedFile {
    SelectedFile::in_memory(name, "image/jpeg", Bytes::from_static(b"jpeg-bytes"))
}

async fn stage(
    pipeline: &AttachmentPipeline,
    staging: &AttachmentStaging,
    files: Vec<SelectedFile>,
) -> pitchside_chat::error::Result<usize> {
    let outcome = pipeline.process(staging.count(), files).await?;
    let accepted = outcome.accepted.len();
    staging.append(outcome.accepted);
    Ok(accepted)
}

#[tokio::test]
async fn four_files_at_once_are_rejected_and_staging_stays_empty() {
    setup_tracing();
    let pipeline = AttachmentPipeline::new(AttachmentConfig::default());
    let staging = AttachmentStaging::new();

    let files: Vec<_> = (0..4).map(|i| image(&format!("kare-{i}.jpg"))).collect();
    let err = stage(&pipeline, &staging, files).await.expect_err("count rule fires");

    assert!(matches!(err, ChatError::Validation(ValidationError::TooManyAttachments { incoming: 4, limit: 3, .. })));
    assert_eq!(staging.count(), 0);
}

#[tokio::test]
async fn a_batch_overflowing_existing_staging_is_rejected_whole() {
    setup_tracing();
    let pipeline = AttachmentPipeline::new(AttachmentConfig::default());
    let staging = AttachmentStaging::new();

    stage(&pipeline, &staging, vec![image("bir.jpg"), image("iki.jpg")]).await.expect("two fit");
    assert_eq!(staging.count(), 2);

    let err = stage(&pipeline, &staging, vec![image("üç.jpg"), image("dört.jpg")]).await.expect_err("2 + 2 > 3");
    assert!(matches!(err, ChatError::Validation(ValidationError::TooManyAttachments { staged: 2, incoming: 2, limit: 3 })));
    assert_eq!(staging.count(), 2, "a rejected batch must not truncate into the free slot");
}

#[tokio::test]
async fn filling_up_to_the_limit_is_allowed() {
    setup_tracing();
    let pipeline = AttachmentPipeline::new(AttachmentConfig::default());
    let staging = AttachmentStaging::new();

    stage(&pipeline, &staging, vec![image("bir.jpg"), image("iki.jpg")]).await.expect("two fit");
    stage(&pipeline, &staging, vec![image("üç.jpg")]).await.expect("exactly at the limit");
    assert_eq!(staging.count(), 3);
}

#[tokio::test]
async fn unstaging_by_preview_id_frees_a_slot() {
    setup_tracing();
    let pipeline = AttachmentPipeline::new(AttachmentConfig::default());
    let staging = AttachmentStaging::new();

    stage(&pipeline, &staging, vec![image("bir.jpg"), image("iki.jpg"), image("üç.jpg")]).await.expect("full");
    let removed = staging.snapshot()[1].preview_id;
    staging.remove(removed);
    assert_eq!(staging.count(), 2);

    stage(&pipeline, &staging, vec![image("dört.jpg")]).await.expect("freed slot is usable");
    assert_eq!(staging.count(), 3);
}

#[tokio::test]
async fn mixed_batch_keeps_valid_files_while_naming_the_bad_one() {
    setup_tracing();
    let pipeline = AttachmentPipeline::new(AttachmentConfig::default());
    let staging = AttachmentStaging::new();

    let outcome = pipeline
        .process(
            staging.count(),
            vec![
                image("kadro.jpg"),
                SelectedFile::in_memory("notlar.txt", "text/plain", Bytes::from_static(b"dz")),
            ],
        )
        .await
        .expect("count rule passes");
    staging.append(outcome.accepted);

    assert_eq!(staging.count(), 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].name, "notlar.txt");
}
