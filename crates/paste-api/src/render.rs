//! HTML views of a paste.
//!
//! Templates live in `templates/` and are compiled in by askama, which
//! HTML-escapes every interpolated value.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use paste_types::models::ConsumedPaste;

#[derive(Template)]
#[template(path = "paste.html")]
pub struct PasteView {
    pub content: String,
    pub remaining: String,
    pub expires: String,
}

impl From<ConsumedPaste> for PasteView {
    fn from(paste: ConsumedPaste) -> Self {
        Self {
            content: paste.content,
            remaining: paste
                .remaining_views
                .map_or_else(|| "Unlimited".to_string(), |n| n.to_string()),
            expires: paste.expires_at.map_or_else(
                || "Never".to_string(),
                |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ),
        }
    }
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundView;

/// Render `template` with `status`. A rendering failure is logged and
/// answered with a plain-text 500.
pub fn render_template<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
