use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::routes::AppState;

/// Pins the request clock, in Unix milliseconds. Only read in test mode.
pub const TEST_NOW_HEADER: &str = "x-test-now-ms";

/// The instant a request is evaluated at.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceTime(pub DateTime<Utc>);

impl FromRequestParts<AppState> for ReferenceTime {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(reference_time(&parts.headers, state.test_mode)))
    }
}

/// `Utc::now()`, unless `test_mode` is on and the request pins a valid time.
pub fn reference_time(headers: &HeaderMap, test_mode: bool) -> DateTime<Utc> {
    if !test_mode {
        return Utc::now();
    }

    let Some(raw) = headers.get(TEST_NOW_HEADER) else {
        return Utc::now();
    };

    let pinned = raw
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis);

    match pinned {
        Some(at) => at,
        None => {
            debug!("Ignoring malformed {} header", TEST_NOW_HEADER);
            Utc::now()
        }
    }
}
