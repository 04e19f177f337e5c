//! In-memory store for tests and local development.
//!
//! Counts every write so tests can assert on side effects, and can be told to
//! fail specific operations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::{
    Contractor, ContractorProfile, DispatchRecord, InvitationSent, NotificationRequest,
};

use super::{NotificationStore, ProjectStore, UserStore};

/// A user row as kept by [`InMemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryUser {
    pub email: Option<String>,
    pub fcm_tokens: Vec<String>,
    pub contractor_profile: Option<ContractorProfile>,
}

#[derive(Debug, Default)]
struct MemoryState {
    notifications: HashMap<Uuid, NotificationRequest>,
    users: HashMap<Uuid, MemoryUser>,
    invitations: HashMap<Uuid, InvitationSent>,
    notification_writes: usize,
    token_writes: usize,
    project_writes: usize,
    delete_batches: usize,
}

/// In-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    contractor_lookup_error: Option<String>,
    token_removal_error: Option<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every contractor lookup fail with this message.
    pub fn failing_contractor_lookups(mut self, error: impl Into<String>) -> Self {
        self.contractor_lookup_error = Some(error.into());
        self
    }

    /// Make every token removal fail with this message.
    pub fn failing_token_removal(mut self, error: impl Into<String>) -> Self {
        self.token_removal_error = Some(error.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_notification(&self, request: NotificationRequest) {
        self.state().notifications.insert(request.id, request);
    }

    pub fn notification(&self, id: Uuid) -> Option<NotificationRequest> {
        self.state().notifications.get(&id).cloned()
    }

    pub fn notification_count(&self) -> usize {
        self.state().notifications.len()
    }

    pub fn insert_user(&self, id: Uuid, user: MemoryUser) {
        self.state().users.insert(id, user);
    }

    pub fn user_tokens(&self, id: Uuid) -> Vec<String> {
        self.state()
            .users
            .get(&id)
            .map(|u| u.fcm_tokens.clone())
            .unwrap_or_default()
    }

    pub fn invitation(&self, project_id: Uuid) -> Option<InvitationSent> {
        self.state().invitations.get(&project_id).cloned()
    }

    pub fn notification_writes(&self) -> usize {
        self.state().notification_writes
    }

    pub fn token_writes(&self) -> usize {
        self.state().token_writes
    }

    pub fn project_writes(&self) -> usize {
        self.state().project_writes
    }

    pub fn delete_batches(&self) -> usize {
        self.state().delete_batches
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn mark_processed(&self, id: Uuid, record: &DispatchRecord) -> Result<(), AppError> {
        let mut state = self.state();
        let request = state
            .notifications
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;

        request.processed = true;
        request.processed_at = Some(record.processed_at);
        request.success_count = record.success_count;
        request.failure_count = record.failure_count;
        request.error = record.error.clone();
        state.notification_writes += 1;
        Ok(())
    }

    async fn find_expired(&self, cutoff: DateTime<Utc>, limit: u32) -> Result<Vec<Uuid>, AppError> {
        let state = self.state();
        let mut expired: Vec<(DateTime<Utc>, Uuid)> = state
            .notifications
            .values()
            .filter(|n| n.created_at < cutoff)
            .map(|n| (n.created_at, n.id))
            .collect();

        expired.sort();
        Ok(expired
            .into_iter()
            .take(limit as usize)
            .map(|(_, id)| id)
            .collect())
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let mut state = self.state();
        let removed = ids
            .iter()
            .filter(|id| state.notifications.remove(*id).is_some())
            .count();
        state.delete_batches += 1;
        Ok(removed as u64)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn remove_tokens(&self, user_id: Uuid, tokens: &[String]) -> Result<(), AppError> {
        if let Some(error) = &self.token_removal_error {
            return Err(AppError::Internal(error.clone()));
        }

        let mut state = self.state();
        if let Some(user) = state.users.get_mut(&user_id) {
            user.fcm_tokens.retain(|t| !tokens.contains(t));
        }
        state.token_writes += 1;
        Ok(())
    }

    async fn find_contractor(&self, id: Uuid) -> Result<Option<Contractor>, AppError> {
        if let Some(error) = &self.contractor_lookup_error {
            return Err(AppError::Internal(error.clone()));
        }

        Ok(self.state().users.get(&id).map(|user| Contractor {
            id,
            email: user.email.clone(),
            contractor_profile: user.contractor_profile.clone(),
        }))
    }
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn record_invitation(&self, project_id: Uuid, sent: &InvitationSent) -> Result<(), AppError> {
        let mut state = self.state();
        state.invitations.insert(project_id, sent.clone());
        state.project_writes += 1;
        Ok(())
    }
}
