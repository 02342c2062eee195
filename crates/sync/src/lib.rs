//! Peer-to-peer replica convergence on top of [`store`]: a changeset wire
//! vocabulary ([`wire`]) that travels [`store::Mutation`]s between
//! replicas via content-derived object identity, a [`session::Session`]
//! that uploads/downloads changesets over a pluggable [`transport::Transport`],
//! and a [`reset::ClientResetController`] that recovers a diverged replica
//! by merging it against a freshly-downloaded one.

mod reset;
mod session;
mod transport;
mod wire;

pub use reset::{ClientResetController, RecoveryMode, ResetState};
pub use session::{Error as SessionError, Session, SessionState};
pub use transport::{DownloadBatch, Error as TransportError, ProgressMarkers, Transport, UploadOutcome};
pub use wire::{apply, apply_changeset, to_wire, to_wire_changeset, ObjectRef, ReplayMap, WireChangeset, WireMutation};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] session::Error),
    #[error(transparent)]
    Transport(#[from] transport::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),
}

pub type Result<T> = std::result::Result<T, Error>;
