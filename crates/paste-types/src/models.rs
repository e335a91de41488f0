use chrono::{DateTime, Utc};

use crate::lifecycle::PasteState;

/// A stored paste. `remaining_views` is `None` exactly when `max_views` is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paste {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<u32>,
    pub remaining_views: Option<u32>,
}

impl Paste {
    pub fn state(&self) -> PasteState {
        PasteState {
            expires_at: self.expires_at,
            remaining_views: self.remaining_views,
        }
    }
}

/// Everything needed to insert a paste. The view counter is derived from
/// `max_views` by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaste {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<u32>,
}

impl NewPaste {
    pub fn into_paste(self) -> Paste {
        Paste {
            id: self.id,
            content: self.content,
            created_at: self.created_at,
            expires_at: self.expires_at,
            max_views: self.max_views,
            remaining_views: self.max_views,
        }
    }
}

/// Result of a successful consuming read. `remaining_views` is the count
/// after this read was charged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedPaste {
    pub content: String,
    pub remaining_views: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}
