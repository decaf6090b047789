use std::sync::Arc;

use uuid::Uuid;

use super::api::UploadTicket;
use crate::error::AppError;
use crate::storage::ObjectStore;
use crate::validators::{FILE_EXTENSION, IMAGE_KEY};

pub const ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/heic"];

const KEY_PREFIX: &str = "events/";

/// Upload policies expire after an hour whatever the GET URL lifetime is.
const UPLOAD_TTL: u64 = 3600;

/// The normalized allowed type, or `None` if uploads of this type are refused.
fn allowed_type(file_type: &str) -> Option<&'static str> {
    let parsed: mime::Mime = file_type.trim().parse().ok()?;
    let essence = parsed.essence_str().to_ascii_lowercase();
    ALLOWED_TYPES.iter().copied().find(|allowed| *allowed == essence)
}

fn object_key(file_name: Option<&str>) -> String {
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, extension)| extension)
        .filter(|extension| FILE_EXTENSION.run(extension).is_ok());
    match extension {
        Some(extension) => format!("{}{}.{}", KEY_PREFIX, Uuid::new_v4(), extension),
        None => format!("{}{}", KEY_PREFIX, Uuid::new_v4()),
    }
}

/// Turns stored object keys into URLs and hands out upload tickets.
///
/// Only keys travel through the database; URLs are minted on every read.
#[derive(Clone)]
pub struct ObjectResolver {
    store: Arc<dyn ObjectStore>,
    ttl: u64,
}

impl ObjectResolver {
    pub fn new(store: Arc<dyn ObjectStore>, ttl: u64) -> ObjectResolver {
        ObjectResolver { store, ttl }
    }

    pub async fn to_presigned_get_url(&self, key: &str) -> Result<String, AppError> {
        self.presigned_get_url(key, self.ttl).await
    }

    pub async fn presigned_get_url(&self, key: &str, ttl: u64) -> Result<String, AppError> {
        IMAGE_KEY.run(key)?;
        Ok(self.store.presigned_get(key, ttl).await?)
    }

    /// Each call mints a fresh key, even for the same file name.
    pub async fn issue_upload_ticket(&self, file_type: &str, file_name: Option<&str>) -> Result<UploadTicket, AppError> {
        let content_type =
            allowed_type(file_type).ok_or_else(|| AppError::UnsupportedMediaType(file_type.to_string()))?;
        let file_key = object_key(file_name);
        let data = self.store.presigned_post(&file_key, content_type, UPLOAD_TTL).await?;
        log::debug!("Issued an upload ticket for {}", file_key);
        Ok(UploadTicket { data, file_key })
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        IMAGE_KEY.run(key)?;
        self.store.delete(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod fake {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::storage::{ObjectStore, StorageError, UploadForm};

    #[derive(Default)]
    pub struct FakeStore {
        pub posts: AtomicUsize,
        pub last_post_ttl: AtomicU64,
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn presigned_get(&self, key: &str, ttl: u64) -> Result<String, StorageError> {
            Ok(format!("https://bucket.test/{}?expires={}", key, ttl))
        }

        async fn presigned_post(&self, key: &str, content_type: &str, ttl: u64) -> Result<UploadForm, StorageError> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            self.last_post_ttl.store(ttl, Ordering::SeqCst);
            let mut fields = BTreeMap::new();
            fields.insert("key".to_string(), key.to_string());
            fields.insert("Content-Type".to_string(), content_type.to_string());
            Ok(UploadForm {
                url: "https://bucket.test/".to_string(),
                fields,
            })
        }

        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }
}

#[cfg(test)]
pub use fake::FakeStore;

#[test]
fn test_allowed_type() {
    assert_eq!(allowed_type("image/png"), Some("image/png"));
    assert_eq!(allowed_type("IMAGE/JPEG"), Some("image/jpeg"));
    assert_eq!(allowed_type("image/heic; charset=binary"), Some("image/heic"));
    assert_eq!(allowed_type("image/gif"), None);
    assert_eq!(allowed_type("text/plain"), None);
    assert_eq!(allowed_type("png"), None);
}

#[test]
fn test_object_key() {
    let key = object_key(Some("holiday.photo.PNG"));
    assert!(key.starts_with("events/"));
    assert!(key.ends_with(".PNG"));
    assert_eq!(key.len(), "events/".len() + 36 + ".PNG".len());

    assert_eq!(object_key(None).len(), "events/".len() + 36);
    assert_eq!(object_key(Some("no_extension")).len(), "events/".len() + 36);
    assert_eq!(object_key(Some("evil./../x")).len(), "events/".len() + 36);
    assert_eq!(object_key(Some("trailing.")).len(), "events/".len() + 36);
}

#[tokio::test]
async fn upload_ticket_policy() {
    use std::sync::atomic::Ordering;

    let store = Arc::new(FakeStore::default());
    let resolver = ObjectResolver::new(store.clone(), 600);

    let e = resolver.issue_upload_ticket("image/gif", Some("a.gif")).await.unwrap_err();
    assert_eq!(e.error_code(), "UNSUPPORTED_MEDIA_TYPE");
    assert_eq!(store.posts.load(Ordering::SeqCst), 0);

    let ticket = resolver.issue_upload_ticket("image/png", Some("a.png")).await.unwrap();
    assert!(ticket.file_key.starts_with("events/"));
    assert_eq!(ticket.data.fields["key"], ticket.file_key);
    assert_eq!(ticket.data.fields["Content-Type"], "image/png");
    // The GET lifetime does not leak into the upload policy.
    assert_eq!(store.last_post_ttl.load(Ordering::SeqCst), UPLOAD_TTL);
    assert_eq!(UPLOAD_TTL, 3600);

    let mut keys = std::collections::HashSet::new();
    for _ in 0..1000 {
        let ticket = resolver.issue_upload_ticket("image/jpeg", Some("a.jpg")).await.unwrap();
        keys.insert(ticket.file_key);
    }
    assert_eq!(keys.len(), 1000);
}

#[tokio::test]
async fn presigned_get_url_checks_key() {
    let resolver = ObjectResolver::new(Arc::new(FakeStore::default()), 3600);
    let url = resolver.to_presigned_get_url("events/a.png").await.unwrap();
    assert_eq!(url, "https://bucket.test/events/a.png?expires=3600");
    assert!(resolver.to_presigned_get_url("").await.is_err());
    assert!(resolver.delete("/events/a.png").await.is_err());
    assert!(resolver.delete("events/a.png").await.is_ok());
}
