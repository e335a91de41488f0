use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use paste_types::lifecycle::{self, Decision};
use paste_types::models::{ConsumedPaste, NewPaste, Paste};

use crate::{PasteStore, StoreError};

/// In-process paste store.
///
/// The map lock is held across evaluate-and-apply, which makes `consume`
/// one indivisible step just like the SQL statement in [`crate::Database`].
#[derive(Default)]
pub struct MemoryStore {
    pastes: Mutex<HashMap<String, Paste>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<Paste>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Paste>>, StoreError> {
        self.pastes.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl PasteStore for MemoryStore {
    fn create(&self, paste: &NewPaste) -> Result<(), StoreError> {
        let mut pastes = self.lock()?;
        match pastes.entry(paste.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateId),
            Entry::Vacant(slot) => {
                slot.insert(paste.clone().into_paste());
                Ok(())
            }
        }
    }

    fn consume(&self, id: &str, now: DateTime<Utc>) -> Result<Option<ConsumedPaste>, StoreError> {
        let mut pastes = self.lock()?;
        let Some(paste) = pastes.get_mut(id) else {
            return Ok(None);
        };

        match lifecycle::evaluate(&paste.state(), now) {
            Decision::Unavailable => Ok(None),
            Decision::Available { next } => {
                paste.expires_at = next.expires_at;
                paste.remaining_views = next.remaining_views;
                Ok(Some(ConsumedPaste {
                    content: paste.content.clone(),
                    remaining_views: paste.remaining_views,
                    expires_at: paste.expires_at,
                }))
            }
        }
    }

    fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    fn purge_inert(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut pastes = self.lock()?;
        let before = pastes.len();
        pastes.retain(|_, paste| lifecycle::is_visible(&paste.state(), now));
        Ok(before - pastes.len())
    }
}
