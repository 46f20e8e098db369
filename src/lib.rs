//! Single-session FTP client.
//!
//! [`FtpSession`] owns one control connection to a server and exposes the
//! usual directory and file operations on top of a pluggable [`FtpEngine`].
//! The default engine is backed by `suppaftp`; [`MemoryEngine`] is an
//! in-memory server used for tests and dry runs.

pub mod config;
pub mod constants;
pub mod core_client;
pub mod core_engine;

pub use core_client::{ErrorKind, FtpError, FtpOption, FtpResult, FtpSession, OptionValue};
pub use core_engine::{EngineError, FtpEngine, MemoryEngine, SuppaEngine, TransferMode};
