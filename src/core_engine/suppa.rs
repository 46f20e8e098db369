// Production engine: blocking suppaftp stream, optionally upgraded to FTPS
// with AUTH TLS right after the greeting.

use crate::core_client::options::{FtpOption, OptionValue};
use crate::core_engine::{EngineError, EngineResult, FtpEngine, TransferMode};
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::ToSocketAddrs;
use std::path::Path;
use std::time::Duration;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::{FileType, FormatControl};
use suppaftp::{Mode, NativeTlsConnector, NativeTlsFtpStream, Status};

impl From<suppaftp::FtpError> for EngineError {
    fn from(err: suppaftp::FtpError) -> Self {
        EngineError::new(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuppaEngine {
    /// Skip certificate verification on FTPS connections (self-signed servers).
    pub accept_invalid_certs: bool,
}

pub struct SuppaConnection {
    stream: NativeTlsFtpStream,
    timeout: Duration,
    autoseek: bool,
}

impl SuppaEngine {
    pub fn new(accept_invalid_certs: bool) -> Self {
        Self {
            accept_invalid_certs,
        }
    }

    fn tls_connector(&self) -> EngineResult<NativeTlsConnector> {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| EngineError::new(format!("TLS setup failed: {}", e)))?;
        Ok(NativeTlsConnector::from(connector))
    }
}

fn apply_socket_timeout(stream: &NativeTlsFtpStream, timeout: Duration) -> EngineResult<()> {
    let socket = stream.get_ref();
    socket.set_read_timeout(Some(timeout))?;
    socket.set_write_timeout(Some(timeout))?;
    Ok(())
}

fn file_type(mode: TransferMode) -> FileType {
    match mode {
        TransferMode::Ascii => FileType::Ascii(FormatControl::Default),
        TransferMode::Binary => FileType::Binary,
    }
}

fn to_offset(offset: u64) -> EngineResult<usize> {
    usize::try_from(offset).map_err(|_| EngineError::new(format!("offset {} is too large", offset)))
}

fn prepare_transfer(
    conn: &mut SuppaConnection,
    mode: TransferMode,
    offset: u64,
) -> EngineResult<()> {
    conn.stream.transfer_type(file_type(mode))?;
    if offset > 0 {
        conn.stream.resume_transfer(to_offset(offset)?)?;
    }
    Ok(())
}

impl FtpEngine for SuppaEngine {
    type Connection = SuppaConnection;

    fn open(
        &mut self,
        host: &str,
        use_tls: bool,
        port: u16,
        timeout: Duration,
    ) -> EngineResult<SuppaConnection> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| EngineError::new(format!("no address found for {}", host)))?;
        debug!("Resolved {} to {}", host, addr);

        let mut stream = NativeTlsFtpStream::connect_timeout(addr, timeout)?;
        apply_socket_timeout(&stream, timeout)?;
        if let Some(welcome) = stream.get_welcome_msg() {
            debug!("Server greeting: {}", welcome.trim());
        }

        if use_tls {
            stream = stream.into_secure(self.tls_connector()?, host)?;
            info!("Control channel secured with TLS");
        }

        Ok(SuppaConnection {
            stream,
            timeout,
            autoseek: true,
        })
    }

    fn authenticate(
        &mut self,
        conn: &mut SuppaConnection,
        username: &str,
        password: &str,
    ) -> EngineResult<()> {
        conn.stream.login(username, password)?;
        Ok(())
    }

    fn close(&mut self, mut conn: SuppaConnection) -> EngineResult<()> {
        conn.stream.quit()?;
        Ok(())
    }

    fn set_passive(&mut self, conn: &mut SuppaConnection, enabled: bool) -> EngineResult<()> {
        let mode = if enabled { Mode::Passive } else { Mode::Active };
        debug!("Switching data channel to {:?}", mode);
        conn.stream.set_mode(mode);
        Ok(())
    }

    fn change_dir(&mut self, conn: &mut SuppaConnection, path: &str) -> EngineResult<()> {
        conn.stream.cwd(path)?;
        Ok(())
    }

    fn change_to_parent(&mut self, conn: &mut SuppaConnection) -> EngineResult<()> {
        conn.stream.cdup()?;
        Ok(())
    }

    fn working_dir(&mut self, conn: &mut SuppaConnection) -> EngineResult<String> {
        Ok(conn.stream.pwd()?)
    }

    fn make_dir(&mut self, conn: &mut SuppaConnection, path: &str) -> EngineResult<()> {
        conn.stream.mkdir(path)?;
        Ok(())
    }

    fn remove_dir(&mut self, conn: &mut SuppaConnection, path: &str) -> EngineResult<()> {
        conn.stream.rmdir(path)?;
        Ok(())
    }

    fn list_names(&mut self, conn: &mut SuppaConnection, path: &str) -> EngineResult<Vec<String>> {
        let target = if path.is_empty() { None } else { Some(path) };
        Ok(conn.stream.nlst(target)?)
    }

    fn delete_file(&mut self, conn: &mut SuppaConnection, path: &str) -> EngineResult<()> {
        conn.stream.rm(path)?;
        Ok(())
    }

    fn file_size(&mut self, conn: &mut SuppaConnection, path: &str) -> EngineResult<u64> {
        let size = conn.stream.size(path)?;
        Ok(size as u64)
    }

    fn modified_time(&mut self, conn: &mut SuppaConnection, path: &str) -> EngineResult<i64> {
        let modified = conn.stream.mdtm(path)?;
        Ok(modified.and_utc().timestamp())
    }

    fn rename(&mut self, conn: &mut SuppaConnection, from: &str, to: &str) -> EngineResult<()> {
        conn.stream.rename(from, to)?;
        Ok(())
    }

    fn download_to_file(
        &mut self,
        conn: &mut SuppaConnection,
        local: &Path,
        remote: &str,
        mode: TransferMode,
        resume_offset: u64,
    ) -> EngineResult<()> {
        let mut file = if resume_offset > 0 && conn.autoseek {
            let mut file = OpenOptions::new().write(true).create(true).open(local)?;
            file.seek(SeekFrom::Start(resume_offset))?;
            file
        } else {
            File::create(local)?
        };
        self.download_to_writer(conn, &mut file, remote, mode, resume_offset)?;
        file.flush()?;
        Ok(())
    }

    fn upload_from_file(
        &mut self,
        conn: &mut SuppaConnection,
        remote: &str,
        local: &Path,
        mode: TransferMode,
        start_offset: u64,
    ) -> EngineResult<()> {
        let mut file = File::open(local)?;
        if start_offset > 0 && conn.autoseek {
            file.seek(SeekFrom::Start(start_offset))?;
        }
        self.upload_from_reader(conn, remote, &mut file, mode, start_offset)
    }

    fn download_to_writer(
        &mut self,
        conn: &mut SuppaConnection,
        writer: &mut dyn Write,
        remote: &str,
        mode: TransferMode,
        resume_offset: u64,
    ) -> EngineResult<()> {
        prepare_transfer(conn, mode, resume_offset)?;
        let mut data = conn.stream.retr_as_stream(remote)?;
        let copied = io::copy(&mut data, writer)?;
        conn.stream.finalize_retr_stream(data)?;
        debug!("Received {} bytes from {}", copied, remote);
        Ok(())
    }

    fn upload_from_reader(
        &mut self,
        conn: &mut SuppaConnection,
        remote: &str,
        mut reader: &mut dyn Read,
        mode: TransferMode,
        start_offset: u64,
    ) -> EngineResult<()> {
        prepare_transfer(conn, mode, start_offset)?;
        let sent = conn.stream.put_file(remote, &mut reader)?;
        debug!("Sent {} bytes to {}", sent, remote);
        Ok(())
    }

    fn get_option(
        &mut self,
        conn: &mut SuppaConnection,
        option: FtpOption,
    ) -> EngineResult<OptionValue> {
        Ok(match option {
            FtpOption::TimeoutSec => OptionValue::Int(conn.timeout.as_secs() as i64),
            FtpOption::Autoseek => OptionValue::Bool(conn.autoseek),
        })
    }

    fn set_option(
        &mut self,
        conn: &mut SuppaConnection,
        option: FtpOption,
        value: &OptionValue,
    ) -> EngineResult<()> {
        match (option, value) {
            (FtpOption::TimeoutSec, OptionValue::Int(secs)) if *secs > 0 => {
                let timeout = Duration::from_secs(*secs as u64);
                apply_socket_timeout(&conn.stream, timeout)?;
                conn.timeout = timeout;
            }
            (FtpOption::Autoseek, OptionValue::Bool(enabled)) => conn.autoseek = *enabled,
            _ => {
                return Err(EngineError::new(format!(
                    "invalid value {} for option {}",
                    value, option
                )))
            }
        }
        Ok(())
    }

    fn preallocate(&mut self, conn: &mut SuppaConnection, bytes: u64) -> EngineResult<()> {
        conn.stream.custom_command(
            format!("ALLO {}", bytes),
            &[Status::CommandOk, Status::CommandNotImplemented],
        )?;
        Ok(())
    }

    fn change_permissions(
        &mut self,
        conn: &mut SuppaConnection,
        mode: u32,
        path: &str,
    ) -> EngineResult<()> {
        conn.stream
            .custom_command(format!("SITE CHMOD {:o} {}", mode, path), &[Status::CommandOk])?;
        Ok(())
    }

    fn execute(&mut self, conn: &mut SuppaConnection, command: &str) -> EngineResult<()> {
        conn.stream
            .custom_command(format!("SITE EXEC {}", command), &[Status::CommandOk])?;
        Ok(())
    }
}
