use std::path::PathBuf;

use sha2::{Digest, Sha256};
use url::Url;

use pinwheel_core::config::AssetSection;
use pinwheel_core::publisher::{AssetStager, PublishError};

const PNG_BYTES: [u8; 16] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

fn stager() -> AssetStager {
    let section = AssetSection {
        max_retries: 2,
        retry_delay_seconds: 0,
        ..AssetSection::default()
    };
    AssetStager::new(section).unwrap()
}

#[tokio::test]
async fn test_file_scheme_staging_copies_and_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("original.png");
    std::fs::write(&source, PNG_BYTES).unwrap();
    let url = Url::from_file_path(&source).unwrap();

    let staged = stager().stage(url.as_str()).await.unwrap();

    assert!(staged.path().exists());
    assert_ne!(staged.path(), source.as_path(), "must copy, not reference");
    assert_eq!(staged.extension, "png");
    assert_eq!(staged.bytes, PNG_BYTES.len() as u64);
    assert_eq!(staged.sha256, hex::encode(Sha256::digest(PNG_BYTES)));
    assert_eq!(std::fs::read(staged.path()).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_staged_file_is_removed_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("original.png");
    std::fs::write(&source, PNG_BYTES).unwrap();
    let url = Url::from_file_path(&source).unwrap();

    let staged = stager().stage(url.as_str()).await.unwrap();
    let staged_path: PathBuf = staged.path().to_path_buf();
    assert!(staged_path.exists());

    drop(staged);
    assert!(!staged_path.exists(), "temp file must go with the asset");
}

#[tokio::test]
async fn test_remote_failure_reports_attempt_count() {
    // Port 1 on loopback is never listening; every attempt is refused.
    let result = stager().stage("http://127.0.0.1:1/pin.png").await;
    match result {
        Err(PublishError::AssetUnavailable { url, attempts }) => {
            assert_eq!(attempts, 2);
            assert!(url.contains("127.0.0.1"));
        }
        other => panic!("expected AssetUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_local_file_is_an_io_error() {
    let result = stager().stage("file:///definitely/not/here.png").await;
    assert!(matches!(result, Err(PublishError::Io(_))));
}

#[tokio::test]
async fn test_empty_local_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty.png");
    std::fs::write(&source, b"").unwrap();
    let url = Url::from_file_path(&source).unwrap();

    let result = stager().stage(url.as_str()).await;
    assert!(matches!(
        result,
        Err(PublishError::AssetUnavailable { .. })
    ));
}
