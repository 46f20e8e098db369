// Capability surface of the underlying FTP engine.
// The session never speaks the wire protocol itself; it sequences calls
// through this trait and normalises the outcomes.

pub mod memory;
pub mod suppa;

use crate::core_client::options::{FtpOption, OptionValue};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryEngine;
pub use suppa::SuppaEngine;

/// Failure reported by an engine call. Only carries the engine's own detail;
/// the session decides which taxonomy kind it belongs to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }

    pub fn detail(&self) -> &str {
        &self.0
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Representation type used for data transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Ascii,
    Binary,
}

impl TransferMode {
    pub fn from_binary_flag(binary: bool) -> Self {
        if binary {
            TransferMode::Binary
        } else {
            TransferMode::Ascii
        }
    }
}

/// Narrow interface to an FTP implementation.
///
/// Every call operates on a connection handle previously returned by
/// [`FtpEngine::open`]. `close` consumes the handle: once closed it can never
/// be used again.
pub trait FtpEngine {
    type Connection;

    fn open(
        &mut self,
        host: &str,
        use_tls: bool,
        port: u16,
        timeout: Duration,
    ) -> EngineResult<Self::Connection>;

    fn authenticate(
        &mut self,
        conn: &mut Self::Connection,
        username: &str,
        password: &str,
    ) -> EngineResult<()>;

    fn close(&mut self, conn: Self::Connection) -> EngineResult<()>;

    fn set_passive(&mut self, conn: &mut Self::Connection, enabled: bool) -> EngineResult<()>;

    fn change_dir(&mut self, conn: &mut Self::Connection, path: &str) -> EngineResult<()>;

    fn change_to_parent(&mut self, conn: &mut Self::Connection) -> EngineResult<()>;

    fn working_dir(&mut self, conn: &mut Self::Connection) -> EngineResult<String>;

    fn make_dir(&mut self, conn: &mut Self::Connection, path: &str) -> EngineResult<()>;

    fn remove_dir(&mut self, conn: &mut Self::Connection, path: &str) -> EngineResult<()>;

    /// Raw NLST output, in whatever order the server produced it.
    fn list_names(&mut self, conn: &mut Self::Connection, path: &str)
        -> EngineResult<Vec<String>>;

    fn delete_file(&mut self, conn: &mut Self::Connection, path: &str) -> EngineResult<()>;

    fn file_size(&mut self, conn: &mut Self::Connection, path: &str) -> EngineResult<u64>;

    /// Last modification time as Unix seconds.
    fn modified_time(&mut self, conn: &mut Self::Connection, path: &str) -> EngineResult<i64>;

    fn rename(&mut self, conn: &mut Self::Connection, from: &str, to: &str) -> EngineResult<()>;

    fn download_to_file(
        &mut self,
        conn: &mut Self::Connection,
        local: &Path,
        remote: &str,
        mode: TransferMode,
        resume_offset: u64,
    ) -> EngineResult<()>;

    fn upload_from_file(
        &mut self,
        conn: &mut Self::Connection,
        remote: &str,
        local: &Path,
        mode: TransferMode,
        start_offset: u64,
    ) -> EngineResult<()>;

    fn download_to_writer(
        &mut self,
        conn: &mut Self::Connection,
        writer: &mut dyn Write,
        remote: &str,
        mode: TransferMode,
        resume_offset: u64,
    ) -> EngineResult<()>;

    fn upload_from_reader(
        &mut self,
        conn: &mut Self::Connection,
        remote: &str,
        reader: &mut dyn Read,
        mode: TransferMode,
        start_offset: u64,
    ) -> EngineResult<()>;

    fn get_option(&mut self, conn: &mut Self::Connection, option: FtpOption)
        -> EngineResult<OptionValue>;

    /// Values reaching the engine have already been validated by the session.
    fn set_option(
        &mut self,
        conn: &mut Self::Connection,
        option: FtpOption,
        value: &OptionValue,
    ) -> EngineResult<()>;

    fn preallocate(&mut self, conn: &mut Self::Connection, bytes: u64) -> EngineResult<()>;

    fn change_permissions(
        &mut self,
        conn: &mut Self::Connection,
        mode: u32,
        path: &str,
    ) -> EngineResult<()>;

    fn execute(&mut self, conn: &mut Self::Connection, command: &str) -> EngineResult<()>;
}
