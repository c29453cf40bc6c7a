//! Synchronization from a dump.
//!
//! The dump is restored into a scratch database next to the primary store,
//! the scratch database is mirrored into the primary store with
//! [`SyncEngine`], and the scratch database is dropped again. Which dumps can
//! be restored depends on the store backend: [`MysqlClient`] loads SQL dumps
//! into a MySQL server, [`DirDumpTool`] copies exported table files into a
//! store directory that [`DirConnector`](crate::store::DirConnector) opens.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use crate::config::{StoreDescriptor, SyncMethod, SynchronizeConfig};
use crate::error::{Error, Result};
use crate::lifecycle::{Operation, RunStats};
use crate::store::{StoreConnector, TimeSeriesStore};
use crate::sync::SyncEngine;

/// Database administration used by the dump bridge.
pub trait DumpTool {
    /// The synchronization method whose dumps this tool restores.
    fn method(&self) -> SyncMethod;

    fn create_database(&self, server: &StoreDescriptor, database: &str) -> Result<()>;

    fn load_dump(&self, server: &StoreDescriptor, database: &str, dump: &Path) -> Result<()>;

    fn drop_database(&self, server: &StoreDescriptor, database: &str) -> Result<()>;
}

/// Drives the `mysql` command line client.
///
/// Arguments are passed without a shell and the password through the
/// `MYSQL_PWD` environment variable, so neither shows up in process listings.
#[derive(Debug, Clone)]
pub struct MysqlClient {
    program: PathBuf,
}

impl Default for MysqlClient {
    fn default() -> Self {
        Self::new("mysql")
    }
}

impl MysqlClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, server: &StoreDescriptor) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(host) = &server.host {
            cmd.arg(format!("--host={host}"));
        }
        if let Some(port) = server.port {
            cmd.arg(format!("--port={port}"));
        }
        if let Some(user) = &server.user {
            cmd.arg(format!("--user={user}"));
        }
        if let Some(password) = &server.password {
            cmd.env("MYSQL_PWD", password);
        }
        cmd
    }

    fn execute(&self, mut cmd: Command, stdin: Stdio) -> Result<()> {
        let tool = self.program.display().to_string();
        let output = cmd
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| Error::ExternalTool {
                tool: tool.clone(),
                message: err.to_string(),
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(Error::ExternalTool {
            tool,
            message: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        })
    }
}

impl DumpTool for MysqlClient {
    fn method(&self) -> SyncMethod {
        SyncMethod::SqlDump
    }

    fn create_database(&self, server: &StoreDescriptor, database: &str) -> Result<()> {
        validate_database_name(database)?;
        let mut cmd = self.command(server);
        cmd.arg("-e").arg(format!(
            "CREATE DATABASE IF NOT EXISTS {database} DEFAULT CHARACTER SET utf8;"
        ));
        self.execute(cmd, Stdio::null())
    }

    fn load_dump(&self, server: &StoreDescriptor, database: &str, dump: &Path) -> Result<()> {
        validate_database_name(database)?;
        let file = File::open(dump)?;
        let mut cmd = self.command(server);
        cmd.arg(database);
        self.execute(cmd, Stdio::from(file))
    }

    fn drop_database(&self, server: &StoreDescriptor, database: &str) -> Result<()> {
        validate_database_name(database)?;
        let mut cmd = self.command(server);
        cmd.arg("-e")
            .arg(format!("DROP DATABASE IF EXISTS {database};"));
        self.execute(cmd, Stdio::null())
    }
}

/// Restores directory dumps for stores opened by
/// [`DirConnector`](crate::store::DirConnector).
///
/// Databases are directories under `root`. A dump is either a single
/// `<table>.jsonl` file or a directory of them, as written by
/// [`DirStore`](crate::store::DirStore).
#[derive(Debug, Clone)]
pub struct DirDumpTool {
    root: PathBuf,
}

impl DirDumpTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn database_path(&self, database: &str) -> Result<PathBuf> {
        validate_database_name(database)?;
        Ok(self.root.join(database))
    }
}

impl DumpTool for DirDumpTool {
    fn method(&self) -> SyncMethod {
        SyncMethod::Directory
    }

    fn create_database(&self, _server: &StoreDescriptor, database: &str) -> Result<()> {
        std::fs::create_dir_all(self.database_path(database)?)?;
        Ok(())
    }

    fn load_dump(&self, _server: &StoreDescriptor, database: &str, dump: &Path) -> Result<()> {
        let target = self.database_path(database)?;
        let files = if dump.is_dir() {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(dump)? {
                let path = entry?.path();
                if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("jsonl") {
                    files.push(path);
                }
            }
            files
        } else {
            vec![dump.to_path_buf()]
        };

        for file in files {
            let name = file.file_name().ok_or_else(|| {
                Error::Configuration(format!("invalid dump file {}", file.display()))
            })?;
            std::fs::copy(&file, target.join(name))?;
        }
        Ok(())
    }

    fn drop_database(&self, _server: &StoreDescriptor, database: &str) -> Result<()> {
        let path = self.database_path(database)?;
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }
}

/// Database names end up inside SQL statements, so only identifier
/// characters are accepted.
pub fn validate_database_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "invalid scratch database name: {name:?}"
        )))
    }
}

/// A scratch database that is dropped when the guard goes out of scope.
pub struct ScratchDatabase<'a> {
    tool: &'a dyn DumpTool,
    server: StoreDescriptor,
    name: String,
}

impl<'a> ScratchDatabase<'a> {
    pub fn create(tool: &'a dyn DumpTool, server: &StoreDescriptor, name: &str) -> Result<Self> {
        validate_database_name(name)?;
        tool.create_database(server, name)?;
        debug!("Created scratch database {name}");
        Ok(Self {
            tool,
            server: server.clone(),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor of the scratch database on the same server.
    pub fn descriptor(&self) -> StoreDescriptor {
        self.server.with_database(&self.name)
    }
}

impl Drop for ScratchDatabase<'_> {
    fn drop(&mut self) {
        match self.tool.drop_database(&self.server, &self.name) {
            Ok(()) => debug!("Dropped scratch database {}", self.name),
            Err(err) => warn!("Failed to drop scratch database {}: {err}", self.name),
        }
    }
}

/// Restores a dump into a scratch database and mirrors it into a store.
pub struct DumpBridge<'a> {
    tool: &'a dyn DumpTool,
    connector: &'a dyn StoreConnector,
    engine: &'a SyncEngine,
}

impl<'a> DumpBridge<'a> {
    pub fn new(
        tool: &'a dyn DumpTool,
        connector: &'a dyn StoreConnector,
        engine: &'a SyncEngine,
    ) -> Self {
        Self {
            tool,
            connector,
            engine,
        }
    }

    /// Merge the dump named by `config` into `primary`.
    ///
    /// `server` is the descriptor of the primary store; the scratch database
    /// is created next to it.
    pub fn synchronize(
        &self,
        server: &StoreDescriptor,
        config: &SynchronizeConfig,
        primary: &mut dyn TimeSeriesStore,
    ) -> Result<RunStats> {
        let method = config.method()?;
        if method != self.tool.method() {
            return Err(Error::Configuration(format!(
                "synchronization method {} is not supported by this store backend, expected {}",
                method.as_str(),
                self.tool.method().as_str()
            )));
        }
        if !config.dump.exists() {
            return Err(Error::Configuration(format!(
                "dump {} does not exist",
                config.dump.display()
            )));
        }

        let scratch = ScratchDatabase::create(self.tool, server, &config.database)?;
        info!(
            "Loading dump {} into scratch database {}",
            config.dump.display(),
            scratch.name()
        );
        self.tool.load_dump(server, scratch.name(), &config.dump)?;

        let source = self.connector.connect(&scratch.descriptor())?;
        let stats = self.engine.run(Operation::Synchronize, source.as_ref(), primary);
        drop(source);
        drop(scratch);
        stats
    }
}
