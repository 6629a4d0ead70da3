//! The credential collection and its "currently selected" pointer.
//!
//! Every mutation is applied in memory first, then persisted inline. A
//! persistence failure is returned to the caller but the in-memory change
//! stands. Subscribers receive a [`StoreEvent`] per applied change.

use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::credential::Credential;
use crate::kv::{KeyValueStore, PersistenceError};
use crate::otp::{self, GeneratedCode, OtpError};

pub const CREDENTIALS_KEY: &str = "credentials";
pub const SELECTED_KEY: &str = "selected_credential";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no credential with id {0}")]
    UnknownCredential(Uuid),
    #[error("change applied but not saved: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(Uuid),
    Updated(Uuid),
    Deleted(Uuid),
    SelectionChanged(Option<Uuid>),
}

pub struct CredentialStore<S: KeyValueStore> {
    kv: S,
    credentials: Vec<Credential>,
    selected_id: Option<Uuid>,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl<S: KeyValueStore> CredentialStore<S> {
    /// Load persisted state. Missing records mean an empty store.
    pub fn load(kv: S) -> Result<Self, PersistenceError> {
        let credentials: Vec<Credential> = match kv.get(CREDENTIALS_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt {
                key: CREDENTIALS_KEY.to_string(),
                reason: e.to_string(),
            })?,
            None => Vec::new(),
        };

        let selected_id = match kv.get(SELECTED_KEY)? {
            Some(bytes) => {
                let raw = String::from_utf8_lossy(&bytes);
                match Uuid::parse_str(raw.trim()) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable selection record");
                        None
                    }
                }
            }
            None => None,
        };

        tracing::debug!(
            count = credentials.len(),
            selected = ?selected_id,
            "loaded credential store"
        );

        Ok(Self {
            kv,
            credentials,
            selected_id,
            subscribers: Vec::new(),
        })
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn selected_id(&self) -> Option<Uuid> {
        self.selected_id
    }

    pub fn get(&self, id: Uuid) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == id)
    }

    /// The selected credential; `None` when unset or stale.
    pub fn selected(&self) -> Option<&Credential> {
        self.selected_id.and_then(|id| self.get(id))
    }

    /// Resolve a credential by full id, unique id prefix, display name or
    /// name (names compared case-insensitively).
    pub fn find(&self, query: &str) -> Option<&Credential> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        if let Ok(id) = Uuid::parse_str(query) {
            return self.get(id);
        }

        let by_name = self.credentials.iter().find(|c| {
            c.display_name().eq_ignore_ascii_case(query) || c.name.eq_ignore_ascii_case(query)
        });
        if by_name.is_some() {
            return by_name;
        }

        let prefix = query.to_ascii_lowercase();
        let mut matches = self
            .credentials
            .iter()
            .filter(|c| c.id.to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Channel receiving every change applied from now on.
    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Append; the first credential in an empty store becomes selected.
    pub fn add(&mut self, credential: Credential) -> Result<(), StoreError> {
        let id = credential.id;
        self.credentials.push(credential);
        let auto_select = self.credentials.len() == 1;
        if auto_select {
            self.selected_id = Some(id);
        }

        tracing::info!(%id, "credential added");
        let saved = self.save_credentials();
        let saved = if auto_select {
            saved.and(self.save_selected())
        } else {
            saved
        };

        self.notify(StoreEvent::Added(id));
        if auto_select {
            self.notify(StoreEvent::SelectionChanged(Some(id)));
        }
        saved
    }

    /// Replace the entry with the same id. Unknown ids are ignored.
    pub fn update(&mut self, credential: Credential) -> Result<(), StoreError> {
        let id = credential.id;
        let Some(slot) = self.credentials.iter_mut().find(|c| c.id == id) else {
            tracing::debug!(%id, "update for unknown credential ignored");
            return Ok(());
        };
        *slot = credential;

        tracing::info!(%id, "credential updated");
        let saved = self.save_credentials();
        self.notify(StoreEvent::Updated(id));
        saved
    }

    /// Remove by id. Deleting the selected credential moves the selection to
    /// the first survivor, or clears it.
    pub fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        let before = self.credentials.len();
        self.credentials.retain(|c| c.id != id);
        let removed = self.credentials.len() != before;

        let reselect = self.selected_id == Some(id);
        if !removed && !reselect {
            tracing::debug!(%id, "delete for unknown credential ignored");
            return Ok(());
        }
        if reselect {
            self.selected_id = self.credentials.first().map(|c| c.id);
        }

        tracing::info!(%id, removed, "credential deleted");
        let saved = self.save_credentials();
        let saved = if reselect {
            saved.and(self.save_selected())
        } else {
            saved
        };

        if removed {
            self.notify(StoreEvent::Deleted(id));
        }
        if reselect {
            self.notify(StoreEvent::SelectionChanged(self.selected_id));
        }
        saved
    }

    /// Select an existing credential. A foreign id is rejected and leaves
    /// the selection untouched.
    pub fn select(&mut self, id: Uuid) -> Result<(), StoreError> {
        if self.get(id).is_none() {
            return Err(StoreError::UnknownCredential(id));
        }
        self.selected_id = Some(id);

        let saved = self.save_selected();
        self.notify(StoreEvent::SelectionChanged(Some(id)));
        saved
    }

    /// One refresh pass: a code (or the failure) per credential, in order.
    /// A bad credential never affects the others.
    pub fn codes_at(&self, now: OffsetDateTime) -> Vec<(&Credential, Result<GeneratedCode, OtpError>)> {
        self.credentials
            .iter()
            .map(|c| {
                let result = otp::generate(c, now);
                if let Err(e) = &result {
                    tracing::debug!(id = %c.id, error = %e, "code generation failed");
                }
                (c, result)
            })
            .collect()
    }

    fn save_credentials(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.credentials)
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        self.kv.set(CREDENTIALS_KEY, &bytes)?;
        Ok(())
    }

    fn save_selected(&self) -> Result<(), StoreError> {
        match self.selected_id {
            Some(id) => self.kv.set(SELECTED_KEY, id.to_string().as_bytes())?,
            None => self.kv.delete(SELECTED_KEY)?,
        }
        Ok(())
    }
}
