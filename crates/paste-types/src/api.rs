use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// -- Pastes --

/// Body of `POST /api/pastes`. Fields are loosely typed so that missing or
/// out-of-range values reach validation instead of failing deserialization.
///
/// `ttl_seconds` and `max_views` keep the raw JSON value: `None` means the
/// key was absent, while an explicit `null` arrives as `Some(Value::Null)`.
#[derive(Debug, Default, Deserialize)]
pub struct CreatePasteRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub ttl_seconds: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub max_views: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePasteResponse {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasteResponse {
    pub content: String,
    pub remaining_views: Option<u32>,
    #[serde(serialize_with = "iso_millis")]
    pub expires_at: Option<DateTime<Utc>>,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `2026-01-01T12:00:00.000Z`, the same shape as JavaScript's `toISOString`.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn iso_millis<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(at) => serializer.serialize_str(&format_timestamp(at)),
        None => serializer.serialize_none(),
    }
}
