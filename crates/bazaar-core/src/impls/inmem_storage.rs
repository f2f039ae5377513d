//! In-memory storage backend.
//!
//! Besides standing in for Postgres in tests and demos, it counts probes,
//! schema creations and session acquire/release pairs so the readiness gate
//! and the context wrapper have something to assert against.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::NewUser;
use crate::error::StorageError;
use crate::ports::{Storage, StorageSession, REQUIRED_TABLES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub username: String,
    pub phone_number: String,
    pub password_hash: String,
}

#[derive(Default)]
struct StorageState {
    tables: HashSet<String>,
    users: HashMap<String, StoredUser>,
}

pub struct InMemoryStorage {
    state: Arc<Mutex<StorageState>>,
    failing_probes: AtomicU32,
    probes: AtomicU32,
    schema_creations: AtomicU32,
    sessions_opened: AtomicUsize,
    sessions_released: Arc<AtomicUsize>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Empty backend: reachable, but no schema yet.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StorageState::default())),
            failing_probes: AtomicU32::new(0),
            probes: AtomicU32::new(0),
            schema_creations: AtomicU32::new(0),
            sessions_opened: AtomicUsize::new(0),
            sessions_released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Backend with all required tables already in place.
    pub fn with_schema() -> Self {
        let storage = Self::new();
        {
            let mut state = lock(&storage.state);
            for table in REQUIRED_TABLES {
                state.tables.insert(table.to_string());
            }
        }
        storage
    }

    /// Make the next `n` probes fail with a connectivity error.
    pub fn fail_probes(&self, n: u32) {
        self.failing_probes.store(n, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn schema_creation_count(&self) -> u32 {
        self.schema_creations.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_released(&self) -> usize {
        self.sessions_released.load(Ordering::SeqCst)
    }

    pub fn user(&self, username: &str) -> Option<StoredUser> {
        lock(&self.state).users.get(username).cloned()
    }

    pub fn user_count(&self) -> usize {
        lock(&self.state).users.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn probe(&self) -> Result<(), StorageError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_probes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Connectivity(
                "could not connect to server".to_string(),
            ));
        }
        Ok(())
    }

    async fn existing_tables(&self) -> Result<HashSet<String>, StorageError> {
        Ok(lock(&self.state).tables.clone())
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        self.schema_creations.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        for table in REQUIRED_TABLES {
            state.tables.insert(table.to_string());
        }
        Ok(())
    }

    async fn open_session(&self) -> Result<Box<dyn StorageSession>, StorageError> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySession {
            pending: Vec::new(),
            state: Arc::clone(&self.state),
            released: Arc::clone(&self.sessions_released),
        }))
    }
}

struct InMemorySession {
    pending: Vec<NewUser>,
    state: Arc<Mutex<StorageState>>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl StorageSession for InMemorySession {
    async fn insert_user(&mut self, user: &NewUser) -> Result<(), StorageError> {
        self.pending.push(user.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        if !state.tables.contains("user") {
            return Err(StorageError::Other(
                "relation 'user' does not exist".to_string(),
            ));
        }
        // validate everything before applying anything
        for user in &self.pending {
            if state.users.contains_key(&user.username) {
                return Err(StorageError::Conflict {
                    entity: "user",
                    value: user.username.clone(),
                });
            }
        }
        for user in self.pending.drain(..) {
            state.users.insert(
                user.username.clone(),
                StoredUser {
                    username: user.username,
                    phone_number: user.phone_number,
                    password_hash: user.password_hash,
                },
            );
        }
        Ok(())
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock(state: &Mutex<StorageState>) -> std::sync::MutexGuard<'_, StorageState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
