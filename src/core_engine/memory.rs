// In-memory FTP server.
// Behaves like a small, well-mannered server so sessions can be exercised
// without a network. Each refusal knob mimics a real-world server quirk.

use crate::core_client::options::{FtpOption, OptionValue};
use crate::core_engine::{EngineError, EngineResult, FtpEngine, TransferMode};
use chrono::Utc;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    pub data: Vec<u8>,
    /// Unix seconds.
    pub modified: i64,
    pub mode: u32,
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(MemoryFile),
}

#[derive(Debug, Default)]
pub struct MemoryEngine {
    // Absolute paths in creation order; "/" is implicit.
    nodes: Vec<(String, Node)>,
    credentials: Option<(String, String)>,
    refuse_connections: bool,
    size_unsupported: bool,
    exec_disabled: bool,
    alloc_disabled: bool,
    fail_on_close: bool,
    refuse_options: bool,
    open_connections: Arc<AtomicUsize>,
    executed: Vec<String>,
    calls: Vec<&'static str>,
}

#[derive(Debug)]
pub struct MemoryConnection {
    cwd: String,
    authenticated: bool,
    passive: bool,
    timeout_sec: i64,
    autoseek: bool,
}

impl MemoryConnection {
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }
}

fn resolve(cwd: &str, path: &str) -> String {
    let mut parts: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        cwd.split('/').filter(|p| !p.is_empty()).collect()
    };
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn not_found(path: &str) -> EngineError {
    EngineError::new(format!("550 {}: No such file or directory", path))
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        let path = resolve("/", path);
        if self.find(&path).is_none() && path != "/" {
            self.nodes.push((path, Node::Dir));
        }
        self
    }

    pub fn with_file(mut self, path: &str, data: &[u8], modified: i64) -> Self {
        let path = resolve("/", path);
        self.nodes.retain(|(p, _)| *p != path);
        self.nodes.push((
            path,
            Node::File(MemoryFile {
                data: data.to_vec(),
                modified,
                mode: 0o644,
            }),
        ));
        self
    }

    /// Only this user/password pair may log in; commands before login fail.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    pub fn set_refuse_connections(&mut self, refuse: bool) {
        self.refuse_connections = refuse;
    }

    pub fn without_size(mut self) -> Self {
        self.size_unsupported = true;
        self
    }

    pub fn without_site_exec(mut self) -> Self {
        self.exec_disabled = true;
        self
    }

    pub fn without_alloc(mut self) -> Self {
        self.alloc_disabled = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_on_close = true;
        self
    }

    pub fn refusing_options(mut self) -> Self {
        self.refuse_options = true;
        self
    }

    /// Names of every engine call made so far, in order.
    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Live connection counter that outlives the engine, for checking that a
    /// dropped session released its connection.
    pub fn connection_gauge(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.open_connections)
    }

    /// Commands received through `SITE EXEC`.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn file(&self, path: &str) -> Option<&MemoryFile> {
        match self.find(&resolve("/", path)) {
            Some(Node::File(file)) => Some(file),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        path == "/" || matches!(self.find(path), Some(Node::Dir))
    }

    fn find(&self, path: &str) -> Option<&Node> {
        self.nodes.iter().find(|(p, _)| p == path).map(|(_, n)| n)
    }

    fn find_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|(p, _)| p == path).map(|(_, n)| n)
    }

    fn exists(&self, path: &str) -> bool {
        path == "/" || self.find(path).is_some()
    }

    fn children<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.nodes
            .iter()
            .filter(move |(p, _)| parent_of(p) == Some(dir))
            .map(|(p, _)| p.as_str())
    }

    fn guard(&self, conn: &MemoryConnection) -> EngineResult<()> {
        if self.credentials.is_some() && !conn.authenticated {
            return Err(EngineError::new("530 Please login with USER and PASS"));
        }
        Ok(())
    }

    fn read_file(
        &self,
        conn: &MemoryConnection,
        remote: &str,
        offset: u64,
    ) -> EngineResult<Vec<u8>> {
        let path = resolve(&conn.cwd, remote);
        let file = match self.find(&path) {
            Some(Node::File(file)) => file,
            _ => return Err(not_found(remote)),
        };
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        if offset > file.data.len() {
            return Err(EngineError::new("554 Invalid REST parameter"));
        }
        Ok(file.data[offset..].to_vec())
    }

    fn store(
        &mut self,
        conn: &MemoryConnection,
        remote: &str,
        offset: u64,
        bytes: Vec<u8>,
    ) -> EngineResult<()> {
        let path = resolve(&conn.cwd, remote);
        let parent = parent_of(&path).ok_or_else(|| not_found(remote))?;
        if !self.is_dir(parent) {
            return Err(not_found(remote));
        }
        let modified = Utc::now().timestamp();
        match self.find_mut(&path) {
            Some(Node::Dir) => Err(EngineError::new(format!("553 {}: Is a directory", remote))),
            Some(Node::File(file)) => {
                let offset = usize::try_from(offset).unwrap_or(usize::MAX);
                if offset > file.data.len() {
                    return Err(EngineError::new("554 Invalid REST parameter"));
                }
                file.data.truncate(offset);
                file.data.extend_from_slice(&bytes);
                file.modified = modified;
                Ok(())
            }
            None if offset > 0 => Err(EngineError::new("554 Invalid REST parameter")),
            None => {
                self.nodes.push((
                    path,
                    Node::File(MemoryFile {
                        data: bytes,
                        modified,
                        mode: 0o644,
                    }),
                ));
                Ok(())
            }
        }
    }
}

impl FtpEngine for MemoryEngine {
    type Connection = MemoryConnection;

    fn open(
        &mut self,
        host: &str,
        _use_tls: bool,
        port: u16,
        timeout: Duration,
    ) -> EngineResult<MemoryConnection> {
        self.calls.push("open");
        if self.refuse_connections {
            return Err(EngineError::new(format!("{}:{}: connection refused", host, port)));
        }
        let open = self.open_connections.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("memory engine: {} connection(s) open", open);
        Ok(MemoryConnection {
            cwd: "/".to_string(),
            authenticated: false,
            passive: true,
            timeout_sec: timeout.as_secs() as i64,
            autoseek: true,
        })
    }

    fn authenticate(
        &mut self,
        conn: &mut MemoryConnection,
        username: &str,
        password: &str,
    ) -> EngineResult<()> {
        self.calls.push("authenticate");
        if let Some((user, pass)) = &self.credentials {
            if user != username || pass != password {
                return Err(EngineError::new("530 Login incorrect"));
            }
        }
        conn.authenticated = true;
        Ok(())
    }

    fn close(&mut self, _conn: MemoryConnection) -> EngineResult<()> {
        self.calls.push("close");
        let _ = self
            .open_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if self.fail_on_close {
            return Err(EngineError::new("421 Connection lost while closing"));
        }
        Ok(())
    }

    fn set_passive(&mut self, conn: &mut MemoryConnection, enabled: bool) -> EngineResult<()> {
        self.calls.push("set_passive");
        self.guard(conn)?;
        conn.passive = enabled;
        Ok(())
    }

    fn change_dir(&mut self, conn: &mut MemoryConnection, path: &str) -> EngineResult<()> {
        self.calls.push("change_dir");
        self.guard(conn)?;
        let target = resolve(&conn.cwd, path);
        if !self.is_dir(&target) {
            return Err(not_found(path));
        }
        conn.cwd = target;
        Ok(())
    }

    fn change_to_parent(&mut self, conn: &mut MemoryConnection) -> EngineResult<()> {
        self.calls.push("change_to_parent");
        self.guard(conn)?;
        match parent_of(&conn.cwd) {
            Some(parent) => {
                conn.cwd = parent.to_string();
                Ok(())
            }
            None => Err(EngineError::new("550 Already at the root directory")),
        }
    }

    fn working_dir(&mut self, conn: &mut MemoryConnection) -> EngineResult<String> {
        self.calls.push("working_dir");
        self.guard(conn)?;
        Ok(conn.cwd.clone())
    }

    fn make_dir(&mut self, conn: &mut MemoryConnection, path: &str) -> EngineResult<()> {
        self.calls.push("make_dir");
        self.guard(conn)?;
        let target = resolve(&conn.cwd, path);
        if self.exists(&target) {
            return Err(EngineError::new(format!("550 {}: File exists", path)));
        }
        match parent_of(&target) {
            Some(parent) if self.is_dir(parent) => {
                self.nodes.push((target, Node::Dir));
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn remove_dir(&mut self, conn: &mut MemoryConnection, path: &str) -> EngineResult<()> {
        self.calls.push("remove_dir");
        self.guard(conn)?;
        let target = resolve(&conn.cwd, path);
        if target == "/" || !self.is_dir(&target) {
            return Err(not_found(path));
        }
        if self.children(&target).next().is_some() {
            return Err(EngineError::new(format!("550 {}: Directory not empty", path)));
        }
        if conn.cwd == target || conn.cwd.starts_with(&format!("{}/", target)) {
            return Err(EngineError::new(format!("550 {}: Directory in use", path)));
        }
        self.nodes.retain(|(p, _)| *p != target);
        Ok(())
    }

    fn list_names(&mut self, conn: &mut MemoryConnection, path: &str) -> EngineResult<Vec<String>> {
        self.calls.push("list_names");
        self.guard(conn)?;
        let target = resolve(&conn.cwd, path);
        if !self.is_dir(&target) {
            return Err(not_found(path));
        }
        Ok(self
            .children(&target)
            .map(|p| base_name(p).to_string())
            .collect())
    }

    fn delete_file(&mut self, conn: &mut MemoryConnection, path: &str) -> EngineResult<()> {
        self.calls.push("delete_file");
        self.guard(conn)?;
        let target = resolve(&conn.cwd, path);
        match self.find(&target) {
            Some(Node::File(_)) => {
                self.nodes.retain(|(p, _)| *p != target);
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn file_size(&mut self, conn: &mut MemoryConnection, path: &str) -> EngineResult<u64> {
        self.calls.push("file_size");
        self.guard(conn)?;
        if self.size_unsupported {
            return Err(EngineError::new("502 SIZE not implemented"));
        }
        match self.find(&resolve(&conn.cwd, path)) {
            Some(Node::File(file)) => Ok(file.data.len() as u64),
            _ => Err(not_found(path)),
        }
    }

    fn modified_time(&mut self, conn: &mut MemoryConnection, path: &str) -> EngineResult<i64> {
        self.calls.push("modified_time");
        self.guard(conn)?;
        match self.find(&resolve(&conn.cwd, path)) {
            Some(Node::File(file)) => Ok(file.modified),
            _ => Err(not_found(path)),
        }
    }

    fn rename(&mut self, conn: &mut MemoryConnection, from: &str, to: &str) -> EngineResult<()> {
        self.calls.push("rename");
        self.guard(conn)?;
        let source = resolve(&conn.cwd, from);
        let target = resolve(&conn.cwd, to);
        if source == "/" || !self.exists(&source) {
            return Err(not_found(from));
        }
        if self.exists(&target) {
            return Err(EngineError::new(format!("553 {}: File exists", to)));
        }
        if !parent_of(&target).is_some_and(|parent| self.is_dir(parent)) {
            return Err(not_found(to));
        }
        let prefix = format!("{}/", source);
        for (path, _) in self.nodes.iter_mut() {
            if *path == source {
                *path = target.clone();
            } else if let Some(rest) = path.strip_prefix(&prefix) {
                *path = format!("{}/{}", target, rest);
            }
        }
        Ok(())
    }

    fn download_to_file(
        &mut self,
        conn: &mut MemoryConnection,
        local: &Path,
        remote: &str,
        _mode: TransferMode,
        resume_offset: u64,
    ) -> EngineResult<()> {
        self.calls.push("download_to_file");
        self.guard(conn)?;
        let data = self.read_file(conn, remote, resume_offset)?;
        let mut file = if resume_offset > 0 && conn.autoseek {
            let mut file = OpenOptions::new().write(true).create(true).open(local)?;
            file.seek(SeekFrom::Start(resume_offset))?;
            file
        } else {
            File::create(local)?
        };
        file.write_all(&data)?;
        Ok(())
    }

    fn upload_from_file(
        &mut self,
        conn: &mut MemoryConnection,
        remote: &str,
        local: &Path,
        _mode: TransferMode,
        start_offset: u64,
    ) -> EngineResult<()> {
        self.calls.push("upload_from_file");
        self.guard(conn)?;
        let mut file = File::open(local)?;
        if start_offset > 0 && conn.autoseek {
            file.seek(SeekFrom::Start(start_offset))?;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        self.store(conn, remote, start_offset, bytes)
    }

    fn download_to_writer(
        &mut self,
        conn: &mut MemoryConnection,
        writer: &mut dyn Write,
        remote: &str,
        _mode: TransferMode,
        resume_offset: u64,
    ) -> EngineResult<()> {
        self.calls.push("download_to_writer");
        self.guard(conn)?;
        let data = self.read_file(conn, remote, resume_offset)?;
        writer.write_all(&data)?;
        Ok(())
    }

    fn upload_from_reader(
        &mut self,
        conn: &mut MemoryConnection,
        remote: &str,
        reader: &mut dyn Read,
        _mode: TransferMode,
        start_offset: u64,
    ) -> EngineResult<()> {
        self.calls.push("upload_from_reader");
        self.guard(conn)?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.store(conn, remote, start_offset, bytes)
    }

    fn get_option(
        &mut self,
        conn: &mut MemoryConnection,
        option: FtpOption,
    ) -> EngineResult<OptionValue> {
        self.calls.push("get_option");
        Ok(match option {
            FtpOption::TimeoutSec => OptionValue::Int(conn.timeout_sec),
            FtpOption::Autoseek => OptionValue::Bool(conn.autoseek),
        })
    }

    fn set_option(
        &mut self,
        conn: &mut MemoryConnection,
        option: FtpOption,
        value: &OptionValue,
    ) -> EngineResult<()> {
        self.calls.push("set_option");
        if self.refuse_options {
            return Err(EngineError::new(format!("option {} cannot be changed", option)));
        }
        match (option, value) {
            (FtpOption::TimeoutSec, OptionValue::Int(secs)) => conn.timeout_sec = *secs,
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

    fn preallocate(&mut self, conn: &mut MemoryConnection, _bytes: u64) -> EngineResult<()> {
        self.calls.push("preallocate");
        self.guard(conn)?;
        if self.alloc_disabled {
            return Err(EngineError::new("502 ALLO not implemented"));
        }
        Ok(())
    }

    fn change_permissions(
        &mut self,
        conn: &mut MemoryConnection,
        mode: u32,
        path: &str,
    ) -> EngineResult<()> {
        self.calls.push("change_permissions");
        self.guard(conn)?;
        let target = resolve(&conn.cwd, path);
        match self.find_mut(&target) {
            Some(Node::File(file)) => {
                file.mode = mode;
                Ok(())
            }
            Some(Node::Dir) => Ok(()),
            None => Err(not_found(path)),
        }
    }

    fn execute(&mut self, conn: &mut MemoryConnection, command: &str) -> EngineResult<()> {
        self.calls.push("execute");
        self.guard(conn)?;
        if self.exec_disabled {
            return Err(EngineError::new("500 SITE EXEC is disabled"));
        }
        self.executed.push(command.to_string());
        Ok(())
    }
}
