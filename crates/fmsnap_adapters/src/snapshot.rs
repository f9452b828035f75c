use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fmsnap_core::entities::DeviceRecord;
use fmsnap_core::ports::SnapshotStore;
use fmsnap_core::Error;
use tracing::{debug, instrument};

/// Writes device records as a bincode stream, one file per device,
/// named from the device's normalized name. Records are appendable
/// and read back by repeated deserialization until end-of-stream.
///
/// Name collisions are not deduplicated: the second write overwrites
/// the first (accepted data-loss edge case, see DESIGN.md).
pub struct SnapshotWriter {
    output_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    fn path_for(&self, record: &DeviceRecord) -> Result<PathBuf, Error> {
        let file_name = record
            .snapshot_file_name()
            .ok_or_else(|| Error::SnapshotExport("device record has no name".to_string()))?;
        Ok(self.output_dir.join(file_name))
    }

    fn write_record(file: File, record: &DeviceRecord) -> Result<(), Error> {
        // Scoped handle: flushed and closed on every path out.
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, record)
            .map_err(|e| Error::SnapshotExport(format!("failed to serialize record: {}", e)))?;
        writer.flush()?;
        Ok(())
    }
}

impl SnapshotStore for SnapshotWriter {
    #[instrument(skip(self, record), fields(device = %record.id))]
    fn export(&self, record: &DeviceRecord) -> Result<PathBuf, Error> {
        let path = self.path_for(record)?;
        let file = File::create(&path)?;
        Self::write_record(file, record)?;
        debug!(path = %path.display(), "snapshot written");
        Ok(path)
    }

    #[instrument(skip(self, record), fields(device = %record.id))]
    fn append(&self, record: &DeviceRecord) -> Result<PathBuf, Error> {
        let path = self.path_for(record)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Self::write_record(file, record)?;
        Ok(path)
    }
}

/// Read every record back from a snapshot file, stopping at
/// end-of-stream.
pub fn read_snapshot(path: &Path) -> Result<Vec<DeviceRecord>, Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();

    loop {
        match bincode::deserialize_from::<_, DeviceRecord>(&mut reader) {
            Ok(record) => records.push(record),
            Err(e) => match *e {
                bincode::ErrorKind::Io(ref io)
                    if io.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                _ => {
                    return Err(Error::SnapshotExport(format!(
                        "failed to deserialize record: {}",
                        e
                    )))
                }
            },
        }
    }

    Ok(records)
}
