use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use sih_stack::{
    DirectoryObjectStore, ImageUpload, MemoryObjectStore, ObjectStore, PutObjectRequest,
    UploadError,
};

const PIXEL: &str = "iVBORw0KGgo=";

#[tokio::test]
async fn uploads_decoded_bytes_with_jpeg_headers() {
    let upload = ImageUpload::new(MemoryObjectStore::new());
    upload
        .upload_to_bucket(&format!("data:image/png;base64,{PIXEL}"), "fallback/image.jpg", "assets")
        .await
        .unwrap();

    let stored = upload.store().get("assets", "fallback/image.jpg").unwrap();
    assert_eq!(stored.body, vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    assert_eq!(stored.content_type, "image/jpeg");
    assert_eq!(stored.content_encoding, "base64");
    assert_eq!(upload.store().put_count(), 1);
}

#[tokio::test]
async fn invalid_payload_never_reaches_the_store() {
    let upload = ImageUpload::new(MemoryObjectStore::new());
    let err = upload
        .upload_to_bucket("data:image/png;base64,@@not base64@@", "k", "b")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::InvalidBase64(_)));
    assert_eq!(upload.store().put_count(), 0);
}

struct FailingStore {
    attempts: Mutex<usize>,
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), UploadError> {
        *self.attempts.lock() += 1;
        Err(UploadError::Store {
            bucket: request.bucket,
            key: request.key,
            message: "access denied".into(),
        })
    }
}

#[tokio::test]
async fn store_failures_are_not_retried() {
    let upload = ImageUpload::new(FailingStore {
        attempts: Mutex::new(0),
    });
    let err = upload.upload_to_bucket(PIXEL, "k", "b").await.unwrap_err();
    assert_eq!(err.to_string(), "put b/k failed: access denied");
    assert_eq!(*upload.store().attempts.lock(), 1);
}

#[tokio::test]
async fn directory_store_writes_under_bucket() {
    let root = tempfile::tempdir().unwrap();
    let upload = ImageUpload::new(DirectoryObjectStore::new(root.path()));
    upload
        .upload_to_bucket(PIXEL, "nested/image.jpg", "assets")
        .await
        .unwrap();
    let bytes = std::fs::read(root.path().join("assets/nested/image.jpg")).unwrap();
    assert_eq!(bytes.len(), 8);

    let err = upload
        .upload_to_bucket(PIXEL, "../escape.jpg", "assets")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Store { .. }));
}

#[tokio::test]
async fn directory_store_rejects_absolute_buckets() {
    let root = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let upload = ImageUpload::new(DirectoryObjectStore::new(root.path()));

    let bucket = outside.path().to_str().unwrap();
    let err = upload
        .upload_to_bucket(PIXEL, "image.jpg", bucket)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Store { .. }));
    assert!(!outside.path().join("image.jpg").exists());
}
