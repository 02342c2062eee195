use crate::transport::{ProgressMarkers, Transport, UploadOutcome};
use crate::wire::{self, ReplayMap};
use std::sync::Arc;
use store::{Database, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Bound,
    Active,
    Paused,
    Error,
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] crate::transport::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
    /// The server rejected an upload because it no longer has history for
    /// this client's last-integrated version (spec §4.9): the session
    /// transitions to `Error` and the caller must drive a client reset
    /// before the session can become `Active` again.
    #[error("server rejected upload: client version is behind server history")]
    BadServerVersion,
    #[error("session is not active (state: {0:?})")]
    NotActive(SessionState),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One realm's connection to a sync service: owns the local [`Database`]
/// and a [`Transport`], and drives the upload/download loop that keeps
/// them converged. Mirrors the state progression
/// `connecting -> bound -> active -> (paused|error|disconnected)` that
/// `sync::Session`'s C++ counterpart documents, generalized to this
/// store's changeset shape.
pub struct Session {
    db: Arc<Database>,
    transport: Arc<dyn Transport>,
    state: SessionState,
    markers: ProgressMarkers,
    replay_map: ReplayMap,
}

impl Session {
    pub fn new(db: Arc<Database>, transport: Arc<dyn Transport>) -> Session {
        Session {
            db,
            transport,
            state: SessionState::Connecting,
            markers: ProgressMarkers::default(),
            replay_map: ReplayMap::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn markers(&self) -> ProgressMarkers {
        self.markers
    }

    /// Connects the transport and binds the session to this realm,
    /// entering `Active` once bound (there is no separate handshake step
    /// to model at this layer -- `Transport::connect` stands in for it).
    pub async fn connect(&mut self) -> Result<()> {
        self.state = SessionState::Connecting;
        self.transport.connect().await?;
        self.state = SessionState::Bound;
        self.state = SessionState::Active;
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state == SessionState::Active {
            self.state = SessionState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == SessionState::Paused {
            self.state = SessionState::Active;
        }
    }

    pub fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(Error::NotActive(self.state))
        }
    }

    /// Uploads every locally-committed changeset the server hasn't
    /// integrated yet, one [`store::LogEntry`] at a time so a rejection
    /// can pin down exactly which version the server considers stale.
    pub async fn upload_pending(&mut self) -> Result<()> {
        self.ensure_active()?;
        let log = self.db.transaction_log();
        let txn = self.db.read();

        for entry in log.iter().filter(|e| e.version > self.markers.client_version) {
            let wire = wire::to_wire_changeset(&entry.mutations, &txn);
            match self.transport.upload(entry.version, wire).await? {
                UploadOutcome::Accepted { server_version } => {
                    self.markers.client_version = entry.version;
                    self.markers.server_version = self.markers.server_version.max(server_version);
                }
                UploadOutcome::BadServerVersion => {
                    self.state = SessionState::Error;
                    return Err(Error::BadServerVersion);
                }
            }
        }
        Ok(())
    }

    /// Downloads and applies every changeset integrated since this
    /// session's last-seen server version.
    pub async fn download_and_apply(&mut self) -> Result<()> {
        self.ensure_active()?;
        let batch = self.transport.download(self.markers.server_version).await?;
        if batch.changesets.is_empty() {
            self.markers.server_version = batch.server_version;
            return Ok(());
        }

        let mut wtx = self.db.begin_write().await?;
        for changeset in &batch.changesets {
            wire::apply_changeset(&mut wtx, &mut self.replay_map, changeset)?;
        }
        wtx.commit()?;
        self.markers.server_version = batch.server_version;
        Ok(())
    }
}
