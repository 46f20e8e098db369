use crate::core_cli::batch::parse_batch;
use crate::core_cli::core_cli::Action;
use anyhow::{Context, Result};
use filetime::{set_file_mtime, FileTime};
use log::info;
use rouilleftpc::{FtpEngine, FtpSession, OptionValue, TransferMode};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Runs one action on an already logged-in session, printing results to `out`.
pub fn execute<E: FtpEngine, W: Write>(
    session: &mut FtpSession<E>,
    action: &Action,
    mode: TransferMode,
    out: &mut W,
) -> Result<()> {
    match action {
        Action::Ls { path } => {
            for name in session.list_directory(path)? {
                writeln!(out, "{}", name)?;
            }
        }
        Action::Pwd => writeln!(out, "{}", session.get_directory()?)?,
        Action::Cd { path } => {
            session.change_directory(path)?;
        }
        Action::Cdup => {
            session.parent_directory()?;
        }
        Action::Mkdir { path } => {
            session.create_directory(path)?;
            info!("Created directory {}", path);
        }
        Action::Rmdir { path } => {
            session.remove_directory(path)?;
            info!("Removed directory {}", path);
        }
        Action::Rm { path } => {
            session.delete(path)?;
            info!("Deleted {}", path);
        }
        Action::Mv { from, to } => {
            session.rename(from, to)?;
            info!("Renamed {} to {}", from, to);
        }
        Action::Size { path } => writeln!(out, "{}", session.size(path)?)?,
        Action::Mdtm { path, format } => match format {
            Some(format) => writeln!(out, "{}", session.modified_time_formatted(path, format)?)?,
            None => writeln!(out, "{}", session.modified_time(path)?)?,
        },
        Action::Get {
            remote,
            local,
            resume,
            preserve_mtime,
        } => {
            let local = match local {
                Some(local) => local.clone(),
                None => local_name_for(remote)?,
            };
            session.get(&local, remote, mode, *resume)?;
            if *preserve_mtime {
                let modified = session.modified_time(remote)?;
                set_file_mtime(&local, FileTime::from_unix_time(modified, 0))
                    .with_context(|| format!("Failed to set modification time on {:?}", local))?;
            }
            info!("Downloaded {} to {:?}", remote, local);
        }
        Action::Put {
            local,
            remote,
            start,
        } => {
            let remote = match remote {
                Some(remote) => remote.clone(),
                None => remote_name_for(local)?,
            };
            session.put(&remote, local, mode, *start)?;
            info!("Uploaded {:?} to {}", local, remote);
        }
        Action::Chmod { mode: perms, path } => {
            session.chmod(*perms, path)?;
        }
        Action::Site { command } => {
            session.exec(&command.join(" "))?;
        }
        Action::Alloc { bytes } => {
            session.allocate(*bytes)?;
        }
        Action::Opt { name, value } => match value {
            Some(raw) => {
                session.set_option(name, parse_option_value(raw))?;
            }
            None => writeln!(out, "{}", session.get_option(name)?)?,
        },
        Action::Batch { file } => {
            let script = fs::read_to_string(file)
                .with_context(|| format!("Failed to read batch file: {:?}", file))?;
            let actions =
                parse_batch(&script).with_context(|| format!("Invalid batch file: {:?}", file))?;
            info!("Running {} command(s) from {:?}", actions.len(), file);
            for action in &actions {
                execute(session, action, mode, out)?;
            }
        }
    }
    Ok(())
}

fn local_name_for(remote: &str) -> Result<PathBuf> {
    remote
        .rsplit('/')
        .find(|part| !part.is_empty())
        .map(PathBuf::from)
        .with_context(|| format!("Cannot derive a local name from {:?}", remote))
}

fn remote_name_for(local: &Path) -> Result<String> {
    local
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Cannot derive a remote name from {:?}", local))
}

fn parse_option_value(raw: &str) -> OptionValue {
    if let Ok(flag) = raw.parse::<bool>() {
        OptionValue::Bool(flag)
    } else if let Ok(number) = raw.parse::<i64>() {
        OptionValue::Int(number)
    } else {
        OptionValue::Text(raw.to_string())
    }
}
