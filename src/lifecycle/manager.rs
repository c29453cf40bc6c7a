//! Maintenance manager.

use std::sync::Arc;

use log::info;

use crate::config::{BackupConfig, MaintenanceConfig, RotationConfig, SynchronizeConfig};
use crate::core::{format_timestamp, CancelToken, Clock, SystemClock};
use crate::error::{Error, Result};
use crate::lifecycle::RunStats;
use crate::rotate::RotationEngine;
use crate::store::{StoreConnector, TimeSeriesStore};
use crate::sync::{DumpBridge, DumpTool, SyncEngine};

/// Owns the primary store and runs the configured maintenance operations
/// against it.
pub struct MaintenanceManager {
    /// Immutable configuration.
    config: MaintenanceConfig,

    /// Primary store.
    store: Box<dyn TimeSeriesStore>,

    /// Opens backup targets and scratch databases.
    connector: Box<dyn StoreConnector>,

    /// Restores dumps for `run_synchronize`, by default the connector's own.
    dump_tool: Box<dyn DumpTool>,

    clock: Arc<dyn Clock>,
    cancel: CancelToken,
}

impl MaintenanceManager {
    /// Create a manager around an already opened primary store.
    pub fn new(
        config: MaintenanceConfig,
        store: Box<dyn TimeSeriesStore>,
        connector: Box<dyn StoreConnector>,
    ) -> Self {
        let dump_tool = connector.dump_tool();
        Self {
            config,
            store,
            connector,
            dump_tool,
            clock: Arc::new(SystemClock),
            cancel: CancelToken::new(),
        }
    }

    /// Open the primary store named by `config` through `connector`.
    pub fn open(config: MaintenanceConfig, connector: Box<dyn StoreConnector>) -> Result<Self> {
        let store = connector.connect(&config.store)?;
        info!("Opened store {} for {}", store.label(), config.name);
        Ok(Self::new(config, store, connector))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_dump_tool(mut self, tool: Box<dyn DumpTool>) -> Self {
        self.dump_tool = tool;
        self
    }

    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn TimeSeriesStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn TimeSeriesStore {
        self.store.as_mut()
    }

    /// Backup section, if configured and enabled.
    pub fn backup_config(&self) -> Option<&BackupConfig> {
        self.config.backup.as_ref().filter(|backup| backup.enabled)
    }

    /// Rotation section, if configured and enabled.
    pub fn rotation_config(&self) -> Option<&RotationConfig> {
        self.config.rotation.as_ref().filter(|rotation| rotation.enabled)
    }

    pub fn synchronize_config(&self) -> Option<&SynchronizeConfig> {
        self.config.synchronize.as_ref()
    }

    fn sync_engine(&self) -> SyncEngine {
        SyncEngine::new()
            .with_clock(self.clock.clone())
            .with_cancel_token(self.cancel.clone())
    }

    /// Mirror the primary store into the configured backup target.
    pub fn run_backup(&mut self) -> Result<RunStats> {
        let backup = self
            .backup_config()
            .ok_or_else(|| self.unavailable("backup", self.config.backup.is_some()))?;
        let target = backup.target.as_ref().ok_or_else(|| {
            Error::Configuration(
                "unable to backup to unconfigured remote backup location".to_string(),
            )
        })?;

        let mut remote = self.connector.connect(target)?;
        info!(
            "Starting backup of {} into {}",
            self.store.label(),
            remote.label()
        );
        let stats = self
            .sync_engine()
            .synchronize(self.store.as_ref(), remote.as_mut())?;
        info!("{}", stats.summary());
        Ok(stats)
    }

    /// Merge the configured dump into the primary store.
    pub fn run_synchronize(&mut self) -> Result<RunStats> {
        let sync = self.config.synchronize.as_ref().ok_or_else(|| {
            Error::Configuration("unable to synchronize from unconfigured backup".to_string())
        })?;

        let engine = self.sync_engine();
        let bridge = DumpBridge::new(self.dump_tool.as_ref(), self.connector.as_ref(), &engine);
        let stats = bridge.synchronize(&self.config.store, sync, self.store.as_mut())?;
        info!("{}", stats.summary());
        Ok(stats)
    }

    /// Rotate aged data of the primary store.
    pub fn run_rotate(&mut self, full: bool) -> Result<RunStats> {
        let rotation = self
            .rotation_config()
            .ok_or_else(|| self.unavailable("rotation", self.config.rotation.is_some()))?;

        let engine = RotationEngine::new(rotation.clone())?
            .with_clock(self.clock.clone())
            .with_cancel_token(self.cancel.clone());
        info!(
            "Starting rotation of {} older than {}",
            self.store.label(),
            format_timestamp(engine.cutoff()?)
        );
        let stats = engine.rotate(self.store.as_mut(), full)?;
        info!("{}", stats.summary());
        Ok(stats)
    }

    fn unavailable(&self, feature: &str, configured: bool) -> Error {
        let state = if configured { "is disabled" } else { "is not configured" };
        Error::Configuration(format!("{} {feature} {state}", self.config.name))
    }
}
