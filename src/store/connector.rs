use std::path::PathBuf;

use crate::config::StoreDescriptor;
use crate::error::{Error, Result};
use crate::store::{DirStore, TimeSeriesStore};
use crate::sync::{DirDumpTool, DumpTool};

/// Opens stores from connection descriptors.
pub trait StoreConnector {
    fn connect(&self, descriptor: &StoreDescriptor) -> Result<Box<dyn TimeSeriesStore>>;

    /// Restores dumps into scratch databases this connector can open.
    fn dump_tool(&self) -> Box<dyn DumpTool>;
}

/// Resolves descriptors to [`DirStore`] directories.
///
/// A descriptor with an explicit `path` opens that directory; otherwise the
/// descriptor's `database` name is looked up under `root`.
#[derive(Debug, Clone)]
pub struct DirConnector {
    root: PathBuf,
}

impl DirConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, descriptor: &StoreDescriptor) -> PathBuf {
        match &descriptor.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root.join(path),
            None => self.root.join(&descriptor.database),
        }
    }
}

impl StoreConnector for DirConnector {
    fn connect(&self, descriptor: &StoreDescriptor) -> Result<Box<dyn TimeSeriesStore>> {
        let path = self.resolve(descriptor);
        let store = DirStore::open(&path)
            .map_err(|err| Error::store_unavailable(descriptor.to_string(), err))?;
        Ok(Box::new(store))
    }

    fn dump_tool(&self) -> Box<dyn DumpTool> {
        Box::new(DirDumpTool::new(&self.root))
    }
}
