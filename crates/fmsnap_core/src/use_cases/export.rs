use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::entities::{DeviceRecord, Session};
use crate::error::Error;
use crate::ports::{AccountService, SnapshotStore};

/// One enumerated device, with the snapshot path when export was
/// requested and succeeded.
#[derive(Debug, Clone)]
pub struct ExportedDevice {
    pub record: DeviceRecord,
    pub snapshot: Option<PathBuf>,
}

/// Enumerates registered devices in the service's order and, when
/// requested, persists each record to its per-device snapshot file.
/// A failed write aborts the remaining exports (fail-fast; no
/// partial-success continuation).
pub struct ExportUseCase<S, W>
where
    S: AccountService,
    W: SnapshotStore,
{
    service: Arc<S>,
    snapshot_store: Arc<W>,
}

impl<S, W> ExportUseCase<S, W>
where
    S: AccountService,
    W: SnapshotStore,
{
    pub fn new(service: Arc<S>, snapshot_store: Arc<W>) -> Self {
        Self {
            service,
            snapshot_store,
        }
    }

    pub async fn execute(
        &self,
        session: &Session,
        write_snapshots: bool,
    ) -> Result<Vec<ExportedDevice>, Error> {
        let records = self.service.list_devices(session).await?;
        info!(devices = records.len(), "enumerated device records");

        let mut exported = Vec::with_capacity(records.len());
        for record in records {
            let snapshot = if write_snapshots {
                let path = self.snapshot_store.export(&record)?;
                debug!(device = %record.id, path = %path.display(), "wrote snapshot");
                Some(path)
            } else {
                None
            };
            exported.push(ExportedDevice { record, snapshot });
        }
        Ok(exported)
    }
}
