use crate::constants::{ANONYMOUS_PASSWORD, ANONYMOUS_USER};
use crate::core_client::error::{FtpError, FtpResult};
use crate::core_client::options::{FtpOption, OptionValue};
use crate::core_engine::{EngineError, EngineResult, FtpEngine, SuppaEngine, TransferMode};
use chrono::{Local, TimeZone};
use log::{debug, info, warn};
use std::fmt::{self, Write as _};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

/// A single FTP session: owns at most one engine connection and remembers
/// the message of the last failed call.
///
/// Chainable operations hand back `&mut Self`, so a whole sequence can be
/// driven with `?`:
///
/// ```no_run
/// # use rouilleftpc::{FtpSession, TransferMode};
/// # fn run() -> rouilleftpc::FtpResult<()> {
/// let mut session = FtpSession::new();
/// session
///     .connect("ftp.example.com", false, 21, 30)?
///     .login("user", "pw")?
///     .change_directory("incoming")?
///     .put("remote.txt", "local.txt", TransferMode::Binary, 0)?;
/// # Ok(())
/// # }
/// ```
///
/// The connection is closed when the session is dropped.
pub struct FtpSession<E: FtpEngine = SuppaEngine> {
    engine: E,
    connection: Option<E::Connection>,
    last_error: Option<String>,
}

impl FtpSession<SuppaEngine> {
    pub fn new() -> Self {
        Self::with_engine(SuppaEngine::default())
    }
}

impl Default for FtpSession<SuppaEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: FtpEngine> FtpSession<E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            connection: None,
            last_error: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens the control connection. Fails if one is already owned.
    pub fn connect(
        &mut self,
        host: &str,
        use_tls: bool,
        port: u16,
        timeout_sec: u64,
    ) -> FtpResult<&mut Self> {
        let outcome = if self.connection.is_some() {
            Err(FtpError::AlreadyConnected)
        } else if host.trim().is_empty() {
            Err(FtpError::InvalidArgument("host must not be empty".to_string()))
        } else if timeout_sec == 0 {
            Err(FtpError::InvalidArgument(
                "timeout must be greater than zero".to_string(),
            ))
        } else {
            info!(
                "Connecting to {}:{} (tls: {}, timeout: {}s)",
                host, port, use_tls, timeout_sec
            );
            self.engine
                .open(host, use_tls, port, Duration::from_secs(timeout_sec))
                .map_err(|source| FtpError::Connect {
                    host: host.to_string(),
                    port,
                    source,
                })
        };

        let conn = self.record(outcome)?;
        self.connection = Some(conn);
        info!("Connected to {}:{}", host, port);
        Ok(self)
    }

    pub fn login(&mut self, username: &str, password: &str) -> FtpResult<&mut Self> {
        debug!("Logging in as {}", username);
        self.call(
            |engine, conn| engine.authenticate(conn, username, password),
            FtpError::Login,
        )?;
        info!("Logged in as {}", username);
        Ok(self)
    }

    pub fn login_anonymous(&mut self) -> FtpResult<&mut Self> {
        self.login(ANONYMOUS_USER, ANONYMOUS_PASSWORD)
    }

    /// Releases the connection. Calling it without a connection is a no-op.
    ///
    /// The handle is given up even when the engine reports a failure, so the
    /// session is always disconnected afterwards.
    pub fn close(&mut self) -> FtpResult<()> {
        let Some(conn) = self.connection.take() else {
            debug!("close() on a disconnected session, nothing to do");
            return Ok(());
        };
        let outcome = self.engine.close(conn).map_err(FtpError::Close);
        self.record(outcome)?;
        info!("Connection closed");
        Ok(())
    }

    pub fn passive(&mut self, enabled: bool) -> FtpResult<&mut Self> {
        self.call(
            |engine, conn| engine.set_passive(conn, enabled),
            FtpError::rejected("Unable to change passive mode"),
        )?;
        Ok(self)
    }

    pub fn change_directory(&mut self, path: &str) -> FtpResult<&mut Self> {
        self.require_arg("path", path)?;
        self.call(
            |engine, conn| engine.change_dir(conn, path),
            FtpError::rejected("Unable to change directory"),
        )?;
        Ok(self)
    }

    pub fn parent_directory(&mut self) -> FtpResult<&mut Self> {
        self.call(
            |engine, conn| engine.change_to_parent(conn),
            FtpError::rejected("Unable to get parent folder"),
        )?;
        Ok(self)
    }

    pub fn get_directory(&mut self) -> FtpResult<String> {
        self.call(
            |engine, conn| engine.working_dir(conn),
            FtpError::rejected("Unable to get directory name"),
        )
    }

    pub fn create_directory(&mut self, path: &str) -> FtpResult<&mut Self> {
        self.require_arg("path", path)?;
        self.call(
            |engine, conn| engine.make_dir(conn, path),
            FtpError::rejected("Unable to create directory"),
        )?;
        Ok(self)
    }

    pub fn remove_directory(&mut self, path: &str) -> FtpResult<&mut Self> {
        self.require_arg("path", path)?;
        self.call(
            |engine, conn| engine.remove_dir(conn, path),
            FtpError::rejected("Unable to remove directory"),
        )?;
        Ok(self)
    }

    /// Entry names of `path`, sorted ascending.
    pub fn list_directory(&mut self, path: &str) -> FtpResult<Vec<String>> {
        let mut names = self.call(
            |engine, conn| engine.list_names(conn, path),
            FtpError::rejected("Unable to list directory"),
        )?;
        names.sort();
        Ok(names)
    }

    pub fn delete(&mut self, path: &str) -> FtpResult<&mut Self> {
        self.require_arg("path", path)?;
        self.call(
            |engine, conn| engine.delete_file(conn, path),
            FtpError::rejected("Unable to delete file"),
        )?;
        Ok(self)
    }

    pub fn size(&mut self, remote_file: &str) -> FtpResult<u64> {
        self.require_arg("remote file", remote_file)?;
        self.call(
            |engine, conn| engine.file_size(conn, remote_file),
            FtpError::rejected("Unable to get file size"),
        )
    }

    /// Last modification time of `remote_file` as Unix seconds.
    pub fn modified_time(&mut self, remote_file: &str) -> FtpResult<i64> {
        self.require_arg("remote file", remote_file)?;
        self.call(
            |engine, conn| engine.modified_time(conn, remote_file),
            FtpError::rejected("Unable to get modification time"),
        )
    }

    /// Same as [`FtpSession::modified_time`], rendered in local time with a
    /// strftime-like `format`.
    pub fn modified_time_formatted(
        &mut self,
        remote_file: &str,
        format: &str,
    ) -> FtpResult<String> {
        let timestamp = self.modified_time(remote_file)?;
        let outcome = format_timestamp(timestamp, format);
        self.record(outcome)
    }

    pub fn rename(&mut self, old_path: &str, new_path: &str) -> FtpResult<&mut Self> {
        self.require_arg("old path", old_path)?;
        self.require_arg("new path", new_path)?;
        self.call(
            |engine, conn| engine.rename(conn, old_path, new_path),
            FtpError::rejected("Unable to rename"),
        )?;
        Ok(self)
    }

    /// Downloads `remote_file` into `local_file`, optionally resuming at
    /// `resume_offset`.
    pub fn get(
        &mut self,
        local_file: impl AsRef<Path>,
        remote_file: &str,
        mode: TransferMode,
        resume_offset: u64,
    ) -> FtpResult<&mut Self> {
        let local = local_file.as_ref();
        debug!("GET {} -> {:?} ({:?}, offset {})", remote_file, local, mode, resume_offset);
        let action = format!(
            "Unable to get or save file {:?} from {}",
            local, remote_file
        );
        self.call(
            |engine, conn| engine.download_to_file(conn, local, remote_file, mode, resume_offset),
            |source| FtpError::Transfer { action, source },
        )?;
        Ok(self)
    }

    pub fn put(
        &mut self,
        remote_file: &str,
        local_file: impl AsRef<Path>,
        mode: TransferMode,
        start_offset: u64,
    ) -> FtpResult<&mut Self> {
        let local = local_file.as_ref();
        debug!("PUT {:?} -> {} ({:?}, offset {})", local, remote_file, mode, start_offset);
        self.call(
            |engine, conn| engine.upload_from_file(conn, remote_file, local, mode, start_offset),
            |source| FtpError::Transfer {
                action: "Unable to put file".to_string(),
                source,
            },
        )?;
        Ok(self)
    }

    /// Downloads `remote_file` into an already open local handle.
    pub fn stream_get<W: Write>(
        &mut self,
        writer: &mut W,
        remote_file: &str,
        mode: TransferMode,
        resume_offset: u64,
    ) -> FtpResult<&mut Self> {
        self.call(
            |engine, conn| {
                engine.download_to_writer(conn, writer, remote_file, mode, resume_offset)
            },
            |source| FtpError::Transfer {
                action: "Unable to get file".to_string(),
                source,
            },
        )?;
        Ok(self)
    }

    /// Uploads the remaining content of an already open local handle.
    pub fn stream_put<R: Read>(
        &mut self,
        remote_file: &str,
        reader: &mut R,
        mode: TransferMode,
        start_offset: u64,
    ) -> FtpResult<&mut Self> {
        self.call(
            |engine, conn| engine.upload_from_reader(conn, remote_file, reader, mode, start_offset),
            |source| FtpError::Transfer {
                action: "Unable to put file".to_string(),
                source,
            },
        )?;
        Ok(self)
    }

    pub fn get_option(&mut self, name: &str) -> FtpResult<OptionValue> {
        let option = self.record(name.parse::<FtpOption>())?;
        self.call(
            |engine, conn| engine.get_option(conn, option),
            FtpError::rejected("Unable to get option"),
        )
    }

    /// Validates the value locally before the engine ever sees it.
    pub fn set_option(
        &mut self,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> FtpResult<&mut Self> {
        let value = value.into();
        let checked = name
            .parse::<FtpOption>()
            .and_then(|option| option.validate(&value).map(|_| option));
        let option = self.record(checked)?;
        debug!("Setting option {} = {}", option, value);
        self.call(
            |engine, conn| engine.set_option(conn, option, &value),
            FtpError::rejected("Unable to set option"),
        )?;
        Ok(self)
    }

    /// Asks the server to reserve room for an upload of `bytes` bytes.
    pub fn allocate(&mut self, bytes: u64) -> FtpResult<&mut Self> {
        self.call(
            |engine, conn| engine.preallocate(conn, bytes),
            FtpError::rejected("Unable to allocate"),
        )?;
        Ok(self)
    }

    pub fn chmod(&mut self, mode: u32, path: &str) -> FtpResult<&mut Self> {
        self.require_arg("path", path)?;
        self.call(
            |engine, conn| engine.change_permissions(conn, mode, path),
            FtpError::rejected("Unable to change permissions"),
        )?;
        Ok(self)
    }

    /// Runs a raw command on the server (`SITE EXEC`).
    pub fn exec(&mut self, command: &str) -> FtpResult<&mut Self> {
        self.require_arg("command", command)?;
        self.call(
            |engine, conn| engine.execute(conn, command),
            FtpError::rejected("Unable to exec command"),
        )?;
        Ok(self)
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Message of the most recent failure. Successful calls leave it alone.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn call<T>(
        &mut self,
        op: impl FnOnce(&mut E, &mut E::Connection) -> EngineResult<T>,
        on_error: impl FnOnce(EngineError) -> FtpError,
    ) -> FtpResult<T> {
        let outcome = match self.connection.as_mut() {
            Some(conn) => op(&mut self.engine, conn).map_err(on_error),
            None => Err(FtpError::NotConnected),
        };
        self.record(outcome)
    }

    fn require_arg(&mut self, what: &str, value: &str) -> FtpResult<()> {
        let outcome = if value.is_empty() {
            Err(FtpError::InvalidArgument(format!("{} must not be empty", what)))
        } else {
            Ok(())
        };
        self.record(outcome)
    }

    fn record<T>(&mut self, outcome: FtpResult<T>) -> FtpResult<T> {
        if let Err(err) = &outcome {
            warn!("{}", err);
            self.last_error = Some(err.to_string());
        }
        outcome
    }
}

impl<E: FtpEngine> fmt::Debug for FtpSession<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpSession")
            .field("connected", &self.connection.is_some())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl<E: FtpEngine> Drop for FtpSession<E> {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            debug!("Session dropped with an open connection, closing it");
            if let Err(e) = self.engine.close(conn) {
                warn!("Unable to close connection on drop: {}", e);
            }
        }
    }
}

fn format_timestamp(timestamp: i64, format: &str) -> FtpResult<String> {
    let datetime = Local
        .timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| FtpError::InvalidArgument(format!("invalid timestamp {}", timestamp)))?;
    let mut rendered = String::new();
    write!(rendered, "{}", datetime.format(format))
        .map_err(|_| FtpError::InvalidArgument(format!("invalid time format {:?}", format)))?;
    Ok(rendered)
}
