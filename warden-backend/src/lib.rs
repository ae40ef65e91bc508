//! warden-backend: one filesystem contract for local disks and ssh hosts.
//!
//! The sync engine never branches on where a project lives. It asks the
//! [`Resolver`] for a [`FilesystemBackend`] once and talks only to the trait.

pub mod backend;
pub mod checksum;
pub mod error;
pub mod local;
pub mod location;
pub mod remote;
pub mod runner;

pub use backend::{file_name_of, join_dest, parent_of, BatchOutcome, CopyPair, FilesystemBackend};
pub use checksum::{digest, digest_file, digest_reader};
pub use error::BackendError;
pub use local::LocalBackend;
pub use location::{is_windows_path, resolve, Location, Resolved, Resolver};
pub use remote::{quote_remote_path, RemoteBackend, TransferTool};
pub use runner::{CommandOutput, CommandRunner, RunError, SystemRunner};
