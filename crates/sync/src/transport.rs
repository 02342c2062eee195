use crate::wire::WireChangeset;
use async_trait::async_trait;
use store::Version;

/// The server version a session has integrated and the client version it
/// has uploaded, exchanged in every upload/download round trip (spec §6
/// session protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressMarkers {
    pub server_version: u64,
    pub client_version: Version,
}

impl Default for ProgressMarkers {
    fn default() -> ProgressMarkers {
        ProgressMarkers {
            server_version: 0,
            client_version: Version::zero(),
        }
    }
}

/// One batch of changesets downloaded from the server, carrying the new
/// high-water server version they bring the session up to.
#[derive(Debug, Clone)]
pub struct DownloadBatch {
    pub server_version: u64,
    pub changesets: Vec<WireChangeset>,
}

/// What the server accepted (or rejected) from an upload.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Accepted { server_version: u64 },
    /// The client's `client_version` names a version the server no longer
    /// has history for (its sync log was truncated, or the client is
    /// talking to a different replica of the realm than it last synced
    /// with). Recoverable only via client reset (spec §4.9).
    BadServerVersion,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport connect failed: {0}")]
    Connect(String),
    #[error("transport request failed: {0}")]
    Request(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The network boundary a [`crate::session::Session`] talks through.
/// Modeled on `gazette::journal::Client`'s wrapped-sub-client shape: a
/// session owns one `Arc<dyn Transport>` and never constructs protocol
/// messages directly, so tests can swap in an in-memory transport without
/// touching session state-machine logic.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes (or re-establishes) the connection to the sync service
    /// for one realm.
    async fn connect(&self) -> Result<()>;

    /// Uploads one client-committed changeset, identified by the version
    /// it was committed at locally.
    async fn upload(&self, client_version: Version, changeset: WireChangeset) -> Result<UploadOutcome>;

    /// Downloads every changeset integrated since `since_server_version`.
    async fn download(&self, since_server_version: u64) -> Result<DownloadBatch>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// An in-memory [`Transport`] that appends uploads to a shared log and
    /// replays them back to every `download` call, used by `session` and
    /// `reset` tests as a stand-in for a real sync service.
    #[derive(Default)]
    pub struct MemoryTransport {
        log: Mutex<Vec<(u64, WireChangeset)>>,
        pub force_bad_server_version: std::sync::atomic::AtomicBool,
    }

    impl MemoryTransport {
        pub fn new() -> MemoryTransport {
            MemoryTransport::default()
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn upload(&self, client_version: Version, changeset: WireChangeset) -> Result<UploadOutcome> {
            if self.force_bad_server_version.load(std::sync::atomic::Ordering::SeqCst) {
                return Ok(UploadOutcome::BadServerVersion);
            }
            let _ = client_version;
            let mut log = self.log.lock().unwrap();
            log.push((log.len() as u64 + 1, changeset));
            Ok(UploadOutcome::Accepted {
                server_version: log.len() as u64,
            })
        }

        async fn download(&self, since_server_version: u64) -> Result<DownloadBatch> {
            let log = self.log.lock().unwrap();
            let changesets: Vec<WireChangeset> = log
                .iter()
                .filter(|(v, _)| *v > since_server_version)
                .map(|(_, c)| c.clone())
                .collect();
            Ok(DownloadBatch {
                server_version: log.len() as u64,
                changesets,
            })
        }
    }
}
