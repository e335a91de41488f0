use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::task;
use tracing::{debug, error, info, instrument, warn};

use paste_db::{PasteStore, StoreError};
use paste_types::api::{CreatePasteRequest, CreatePasteResponse};
use paste_types::models::{ConsumedPaste, NewPaste};

use crate::error::ApiError;
use crate::short_code::ShortCode;

/// Fresh ids tried before a create gives up. Collisions are astronomically
/// unlikely, so hitting this means the store is misbehaving.
const MAX_ID_ATTEMPTS: usize = 5;

/// A creation request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPaste {
    pub content: String,
    pub ttl_seconds: Option<i64>,
    pub max_views: Option<u32>,
}

pub fn validate(req: CreatePasteRequest) -> Result<ValidPaste, ApiError> {
    let content = match req.content {
        Some(content) if !content.trim().is_empty() => content,
        _ => {
            return Err(ApiError::Validation(
                "content is required and must be a non-empty string".into(),
            ));
        }
    };

    let ttl_seconds = positive_integer("ttl_seconds", req.ttl_seconds.as_ref())?;
    let max_views = positive_integer("max_views", req.max_views.as_ref())?
        .map(|n| {
            u32::try_from(n).map_err(|_| {
                ApiError::Validation(format!("max_views must be at most {}", u32::MAX))
            })
        })
        .transpose()?;

    Ok(ValidPaste {
        content,
        ttl_seconds,
        max_views,
    })
}

/// An optional JSON field that must hold a whole number >= 1. `10.0` counts
/// as whole; `null`, strings and `2.5` do not.
fn positive_integer(field: &str, value: Option<&Value>) -> Result<Option<i64>, ApiError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let invalid = || ApiError::Validation(format!("{field} must be an integer >= 1"));
    let too_large = || ApiError::Validation(format!("{field} is too large"));

    let Value::Number(number) = value else {
        return Err(invalid());
    };

    let n = if let Some(n) = number.as_i64() {
        n
    } else if number.is_u64() {
        return Err(too_large());
    } else {
        let f = number.as_f64().ok_or_else(invalid)?;
        if !f.is_finite() || f.fract() != 0.0 || f < 1.0 {
            return Err(invalid());
        }
        // i64::MAX rounds up to 2^63 as f64
        if f >= i64::MAX as f64 {
            return Err(too_large());
        }
        f as i64
    };

    if n < 1 {
        return Err(invalid());
    }
    Ok(Some(n))
}

fn expiry(now: DateTime<Utc>, ttl_seconds: Option<i64>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(ttl) = ttl_seconds else {
        return Ok(None);
    };

    Duration::try_seconds(ttl)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .map(Some)
        .ok_or_else(|| ApiError::Validation("ttl_seconds is too large".into()))
}

/// Creation and retrieval of pastes on top of a [`PasteStore`].
#[derive(Clone)]
pub struct PasteService {
    store: Arc<dyn PasteStore>,
}

impl PasteService {
    pub fn new(store: Arc<dyn PasteStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a paste, returning its id and retrieval URL
    /// under `base_url`.
    #[instrument(skip(self, req), fields(ttl_seconds = ?req.ttl_seconds, max_views = ?req.max_views))]
    pub async fn create_paste(
        &self,
        req: CreatePasteRequest,
        now: DateTime<Utc>,
        base_url: &str,
    ) -> Result<CreatePasteResponse, ApiError> {
        let valid = validate(req)?;
        let expires_at = expiry(now, valid.ttl_seconds)?;

        let mut paste = NewPaste {
            id: ShortCode::generate().into(),
            content: valid.content,
            created_at: now,
            expires_at,
            max_views: valid.max_views,
        };

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let store = Arc::clone(&self.store);
            let (returned, result) = task::spawn_blocking(move || {
                let result = store.create(&paste);
                (paste, result)
            })
            .await?;
            paste = returned;

            match result {
                Ok(()) => {
                    info!(id = %paste.id, bytes = paste.content.len(), "Paste created");
                    let url = format!("{}/p/{}", base_url.trim_end_matches('/'), paste.id);
                    return Ok(CreatePasteResponse { id: paste.id, url });
                }
                Err(StoreError::DuplicateId) => {
                    warn!(attempt, "Paste id collision, regenerating");
                    paste.id = ShortCode::generate().into();
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!("No free paste id after {} attempts", MAX_ID_ATTEMPTS);
        Err(StoreError::DuplicateId.into())
    }

    /// Consume one view of a paste. Every reason a paste cannot be shown
    /// maps to [`ApiError::NotFound`].
    #[instrument(skip(self))]
    pub async fn fetch_paste(&self, id: &str, now: DateTime<Utc>) -> Result<ConsumedPaste, ApiError> {
        let Ok(code) = id.parse::<ShortCode>() else {
            debug!("Rejected malformed paste id");
            return Err(ApiError::NotFound);
        };

        let store = Arc::clone(&self.store);
        let consumed = task::spawn_blocking(move || store.consume(code.as_str(), now)).await??;

        match consumed {
            Some(paste) => {
                debug!(remaining_views = ?paste.remaining_views, "Paste served");
                Ok(paste)
            }
            None => Err(ApiError::NotFound),
        }
    }

    pub async fn health(&self) -> Result<(), ApiError> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.health_check()).await??;
        Ok(())
    }

    /// Delete pastes that can no longer be shown at `now`.
    pub async fn purge_inert(&self, now: DateTime<Utc>) -> Result<usize, ApiError> {
        let store = Arc::clone(&self.store);
        Ok(task::spawn_blocking(move || store.purge_inert(now)).await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paste_db::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "http://paste.test";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn request(content: &str, ttl_seconds: Option<i64>, max_views: Option<i64>) -> CreatePasteRequest {
        raw(content, ttl_seconds.map(Value::from), max_views.map(Value::from))
    }

    fn raw(content: &str, ttl_seconds: Option<Value>, max_views: Option<Value>) -> CreatePasteRequest {
        CreatePasteRequest {
            content: Some(content.to_string()),
            ttl_seconds,
            max_views,
        }
    }

    fn service() -> (Arc<MemoryStore>, PasteService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), PasteService::new(store))
    }

    /// Reports a collision for the first `collisions` inserts.
    struct CollidingStore {
        inner: MemoryStore,
        collisions: AtomicUsize,
    }

    impl PasteStore for CollidingStore {
        fn create(&self, paste: &NewPaste) -> Result<(), StoreError> {
            let left = self.collisions.load(Ordering::SeqCst);
            if left > 0 {
                self.collisions.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::DuplicateId);
            }
            self.inner.create(paste)
        }

        fn consume(&self, id: &str, now: DateTime<Utc>) -> Result<Option<ConsumedPaste>, StoreError> {
            self.inner.consume(id, now)
        }

        fn health_check(&self) -> Result<(), StoreError> {
            Err(StoreError::LockPoisoned)
        }

        fn purge_inert(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
            self.inner.purge_inert(now)
        }
    }

    fn colliding(collisions: usize) -> (Arc<CollidingStore>, PasteService) {
        let store = Arc::new(CollidingStore {
            inner: MemoryStore::new(),
            collisions: AtomicUsize::new(collisions),
        });
        (store.clone(), PasteService::new(store))
    }

    #[test]
    fn validation_rejects_bad_input() {
        let cases = [
            CreatePasteRequest::default(),
            request("", None, None),
            request("   \n\t", None, None),
            request("x", Some(0), None),
            request("x", Some(-5), None),
            request("x", None, Some(0)),
            request("x", None, Some(-1)),
            request("x", None, Some(i64::from(u32::MAX) + 1)),
            raw("x", Some(Value::Null), None),
            raw("x", None, Some(Value::Null)),
            raw("x", Some(json!(1.5)), None),
            raw("x", None, Some(json!(2.5))),
            raw("x", Some(json!("10")), None),
            raw("x", None, Some(json!(true))),
            raw("x", Some(json!(0.0)), None),
            raw("x", Some(json!(u64::MAX)), None),
            raw("x", Some(json!(1e300)), None),
        ];

        for req in cases {
            let debug = format!("{req:?}");
            assert!(matches!(validate(req), Err(ApiError::Validation(_))), "{debug}");
        }
    }

    #[test]
    fn validation_keeps_content_verbatim() {
        let valid = validate(request("  padded\n", Some(1), Some(1))).unwrap();
        assert_eq!(valid.content, "  padded\n");
        assert_eq!(valid.ttl_seconds, Some(1));
        assert_eq!(valid.max_views, Some(1));
    }

    #[test]
    fn validation_accepts_whole_floats() {
        let valid = validate(raw("x", Some(json!(10.0)), Some(json!(3.0)))).unwrap();
        assert_eq!(valid.ttl_seconds, Some(10));
        assert_eq!(valid.max_views, Some(3));
    }

    #[test]
    fn validation_names_the_offending_field() {
        let Err(ApiError::Validation(msg)) = validate(raw("x", None, Some(Value::Null))) else {
            panic!("null max_views accepted");
        };
        assert_eq!(msg, "max_views must be an integer >= 1");

        let Err(ApiError::Validation(msg)) = validate(raw("x", Some(json!(2.5)), None)) else {
            panic!("fractional ttl_seconds accepted");
        };
        assert_eq!(msg, "ttl_seconds must be an integer >= 1");
    }

    #[tokio::test]
    async fn rejected_create_writes_nothing() {
        let (store, service) = service();
        for req in [request("", None, None), request("x", Some(0), None), request("x", None, Some(-1))] {
            let err = service.create_paste(req, t0(), BASE).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn huge_ttl_is_a_validation_error() {
        let (store, service) = service();
        let err = service
            .create_paste(request("x", Some(i64::MAX), None), t0(), BASE)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn create_builds_url_and_record() {
        let (store, service) = service();
        let created = service
            .create_paste(request("hello", Some(10), Some(3)), t0(), "http://paste.test/")
            .await
            .unwrap();

        assert_eq!(created.url, format!("http://paste.test/p/{}", created.id));
        let stored = store.get(&created.id).unwrap().unwrap();
        assert_eq!(stored.content, "hello");
        assert_eq!(stored.created_at, t0());
        assert_eq!(stored.expires_at, Some(t0() + Duration::seconds(10)));
        assert_eq!(stored.max_views, Some(3));
        assert_eq!(stored.remaining_views, Some(3));
    }

    #[tokio::test]
    async fn unlimited_paste_is_served_forever() {
        let (_store, service) = service();
        let created = service
            .create_paste(request("hello", None, None), t0(), BASE)
            .await
            .unwrap();

        for days in [0, 1, 365, 365 * 50] {
            let paste = service
                .fetch_paste(&created.id, t0() + Duration::days(days))
                .await
                .unwrap();
            assert_eq!(paste.content, "hello");
            assert_eq!(paste.remaining_views, None);
            assert_eq!(paste.expires_at, None);
        }
    }

    #[tokio::test]
    async fn single_view_paste_is_served_once() {
        let (_store, service) = service();
        let created = service
            .create_paste(request("secret", None, Some(1)), t0(), BASE)
            .await
            .unwrap();

        let first = service.fetch_paste(&created.id, t0()).await.unwrap();
        assert_eq!(first.remaining_views, Some(0));

        let second = service.fetch_paste(&created.id, t0() + Duration::seconds(1)).await;
        assert!(matches!(second, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn ttl_bounds_visibility() {
        let (_store, service) = service();
        let created = service
            .create_paste(request("brief", Some(10), None), t0(), BASE)
            .await
            .unwrap();

        let early = service.fetch_paste(&created.id, t0() + Duration::seconds(5)).await.unwrap();
        assert_eq!(early.expires_at, Some(t0() + Duration::seconds(10)));
        assert!(service.fetch_paste(&created.id, t0() + Duration::seconds(9)).await.is_ok());

        let late = service.fetch_paste(&created.id, t0() + Duration::seconds(11)).await;
        assert!(matches!(late, Err(ApiError::NotFound)));
        let later = service.fetch_paste(&created.id, t0() + Duration::seconds(15)).await;
        assert!(matches!(later, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let (_store, service) = service();
        let unknown = ShortCode::generate();

        assert!(matches!(
            service.fetch_paste(unknown.as_str(), t0()).await,
            Err(ApiError::NotFound)
        ));
        assert!(matches!(
            service.fetch_paste("../../etc/passwd", t0()).await,
            Err(ApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_ids_are_retried() {
        let (store, service) = colliding(2);
        let created = service
            .create_paste(request("retry", None, None), t0(), BASE)
            .await
            .unwrap();

        assert_eq!(store.inner.get(&created.id).unwrap().unwrap().content, "retry");
    }

    #[tokio::test]
    async fn persistent_collisions_surface_as_storage_failure() {
        let (store, service) = colliding(MAX_ID_ATTEMPTS);
        let err = service
            .create_paste(request("never", None, None), t0(), BASE)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Storage(StoreError::DuplicateId)));
        assert!(err.is_server_error());
        assert!(store.inner.is_empty().unwrap());
    }

    #[tokio::test]
    async fn health_reports_store_failure() {
        let (_store, service) = service();
        assert!(service.health().await.is_ok());

        let (_store, broken) = colliding(0);
        assert!(matches!(broken.health().await, Err(ApiError::Storage(_))));
    }

    #[tokio::test]
    async fn purge_drops_spent_pastes() {
        let (store, service) = service();
        let created = service
            .create_paste(request("once", None, Some(1)), t0(), BASE)
            .await
            .unwrap();
        service.fetch_paste(&created.id, t0()).await.unwrap();

        assert_eq!(service.purge_inert(t0()).await.unwrap(), 1);
        assert!(store.is_empty().unwrap());
    }
}
