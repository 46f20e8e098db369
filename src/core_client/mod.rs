pub mod error;
pub mod options;
pub mod session;

#[cfg(test)]
mod test_session;

pub use error::{ErrorKind, FtpError, FtpResult};
pub use options::{FtpOption, OptionValue};
pub use session::FtpSession;
