//! Synchronization engine
//!
//! Pushes pending change-log records to a remote endpoint and pulls remote
//! changes back, with last-write-wins conflict detection. The engine never
//! touches courseware/question rows itself; it reads entity snapshots
//! through the repositories and mutates only the change log and the sync
//! config side file.

pub mod config;
pub mod engine;
pub mod remote;

pub use config::{SyncConfig, SyncConfigUpdate};
pub use engine::SyncEngine;
pub use remote::{HttpRemote, RemoteChange, RemoteEndpoint, RemoteError, UploadRequest};

/// Which sync phases to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncDirection {
    Upload,
    Download,
    #[default]
    Both,
}

impl SyncDirection {
    pub fn includes_upload(&self) -> bool {
        matches!(self, Self::Upload | Self::Both)
    }

    pub fn includes_download(&self) -> bool {
        matches!(self, Self::Download | Self::Both)
    }
}

impl std::str::FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown sync direction '{}' (expected upload, download or both)",
                other
            )),
        }
    }
}
