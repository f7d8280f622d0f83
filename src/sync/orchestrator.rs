//! Remote backup and restore for the signed-in user.
//!
//! The orchestrator only resolves who is signed in, delegates the heavy
//! lifting to a [`RemoteBackupProvider`], and records when the last backup
//! succeeded.

use std::future::Future;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::wire::now_millis;
use crate::storage::preferences::{PreferenceStore, keys};
use crate::storage::store::RecordStore;
use crate::sync::progress::{CancelToken, Progress};
use crate::sync::types::RestoreReport;

/// Supplies the id of the signed-in user, if any.
pub trait PrincipalResolver {
    fn current_principal(&self) -> Option<String>;
}

/// A principal fixed at startup (flag, environment or stored session).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPrincipal(pub Option<String>);

impl StaticPrincipal {
    #[must_use]
    pub fn new(principal: Option<String>) -> Self {
        Self(principal.filter(|p| !p.trim().is_empty()))
    }
}

impl PrincipalResolver for StaticPrincipal {
    fn current_principal(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Outcome of restoring the latest remote backup.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreStatus {
    pub principal: String,
    /// Identifier of the backup that was restored.
    pub backup_id: String,
    pub report: RestoreReport,
}

/// Pushes full backups to, and restores them from, a remote service.
pub trait RemoteBackupProvider {
    /// Short name for logs and status output.
    fn name(&self) -> &'static str;

    /// Upload a full backup for `principal`. Returns the backup identifier.
    fn push(
        &mut self,
        store: &dyn RecordStore,
        prefs: &dyn PreferenceStore,
        principal: &str,
        progress: &mut dyn Progress,
    ) -> impl Future<Output = Result<String>>;

    /// Download and apply the latest backup of `principal`.
    fn restore(
        &mut self,
        store: &mut dyn RecordStore,
        prefs: &mut dyn PreferenceStore,
        principal: &str,
        progress: &mut dyn Progress,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<RestoreStatus>>;
}

/// Drives remote backup and restore against local storage.
pub struct SyncOrchestrator<'a, B, R> {
    store: &'a mut dyn RecordStore,
    prefs: &'a mut dyn PreferenceStore,
    provider: B,
    principals: R,
}

impl<'a, B, R> SyncOrchestrator<'a, B, R>
where
    B: RemoteBackupProvider,
    R: PrincipalResolver,
{
    pub fn new(
        store: &'a mut dyn RecordStore,
        prefs: &'a mut dyn PreferenceStore,
        provider: B,
        principals: R,
    ) -> Self {
        Self {
            store,
            prefs,
            provider,
            principals,
        }
    }

    fn principal(&self) -> Result<String> {
        self.principals
            .current_principal()
            .ok_or(Error::NotAuthenticated)
    }

    /// Push a full backup for the signed-in user.
    ///
    /// The last-backup timestamp is only written when the push succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] when nobody is signed in, or the
    /// provider's error.
    pub async fn create_backup(&mut self, progress: &mut dyn Progress) -> Result<String> {
        let principal = self.principal()?;
        info!(provider = self.provider.name(), %principal, "Creating remote backup");

        let id = self
            .provider
            .push(&*self.store, &*self.prefs, &principal, progress)
            .await?;

        if let Err(e) = self.prefs.put_i64(keys::LAST_BACKUP_AT, now_millis()) {
            warn!(error = %e, "Backup uploaded but timestamp could not be saved");
        }
        info!(backup = %id, "Remote backup complete");
        Ok(id)
    }

    /// Restore the latest remote backup of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] before touching anything when
    /// nobody is signed in, or the provider's error.
    pub async fn restore_latest(
        &mut self,
        progress: &mut dyn Progress,
        cancel: &CancelToken,
    ) -> Result<RestoreStatus> {
        let principal = self.principal()?;
        info!(provider = self.provider.name(), %principal, "Restoring latest remote backup");

        self.provider
            .restore(&mut *self.store, &mut *self.prefs, &principal, progress, cancel)
            .await
    }

    /// Epoch millis of the last successful remote backup.
    #[must_use]
    pub fn last_backup_at(&self) -> Option<i64> {
        self.prefs.get_i64(keys::LAST_BACKUP_AT)
    }
}
