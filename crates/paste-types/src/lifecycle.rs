//! Visibility rules for pastes.
//!
//! A paste is visible at `now` while it has not expired and still has views
//! left. Every store evaluates this predicate together with the transition
//! it implies, in one indivisible step.

use chrono::{DateTime, Utc};

/// The mutable part of a paste that gates visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasteState {
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_views: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Content may be revealed; the store must persist `next`.
    Available { next: PasteState },
    /// Content must not be revealed and nothing may change.
    Unavailable,
}

pub fn is_visible(state: &PasteState, now: DateTime<Utc>) -> bool {
    let alive = state.expires_at.is_none_or(|expires_at| expires_at > now);
    let has_views = state.remaining_views.is_none_or(|remaining| remaining > 0);
    alive && has_views
}

/// Decide whether a read at `now` may consume a view.
pub fn evaluate(state: &PasteState, now: DateTime<Utc>) -> Decision {
    if !is_visible(state, now) {
        return Decision::Unavailable;
    }

    Decision::Available {
        next: PasteState {
            expires_at: state.expires_at,
            // visible implies > 0, so this never saturates
            remaining_views: state.remaining_views.map(|remaining| remaining - 1),
        },
    }
}
