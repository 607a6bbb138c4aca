//! In-memory tables for development and tests
//!
//! All tables share one mutex. Repositories hold the lock for the whole of a
//! multi-row operation, which gives the same all-or-nothing behaviour as a
//! PostgreSQL transaction.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{AuditLog, CreditEntry, Event, Registration, StoreError, User};

#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Query("memory store lock poisoned".to_string()))
    }
}

#[derive(Default)]
pub(crate) struct Tables {
    pub users: HashMap<Uuid, User>,
    pub events: HashMap<Uuid, Event>,
    pub registrations: HashMap<Uuid, Registration>,
    pub credit_ledger: Vec<CreditEntry>,
    pub audit_logs: Vec<AuditLog>,
}

impl Tables {
    pub(crate) fn clear(&mut self) {
        *self = Tables::default();
    }

    /// Mirrors the `users_email_key` and `users_usn_key` constraints.
    pub(crate) fn check_user_unique(
        &self,
        email: Option<&str>,
        usn: Option<&str>,
        except: Option<Uuid>,
    ) -> Result<(), StoreError> {
        for user in self.users.values().filter(|u| Some(u.id) != except) {
            if email.is_some_and(|e| user.email == e) {
                return Err(StoreError::Conflict("users_email_key".to_string()));
            }
            if usn.is_some() && user.usn.as_deref() == usn {
                return Err(StoreError::Conflict("users_usn_key".to_string()));
            }
        }
        Ok(())
    }

    pub(crate) fn registration_for(&self, student_id: Uuid, event_id: Uuid) -> Option<&Registration> {
        self.registrations
            .values()
            .find(|r| r.student_id == student_id && r.event_id == event_id)
    }

    /// Delete an event and its registrations (`ON DELETE CASCADE`).
    pub(crate) fn delete_event(&mut self, event_id: Uuid) -> bool {
        if self.events.remove(&event_id).is_none() {
            return false;
        }
        self.registrations.retain(|_, r| r.event_id != event_id);
        true
    }
}
