use std::fs::{OpenOptions, create_dir_all};
use std::path::Path;

use datagen_generate::GenerationReport;
use serde::Serialize;

use super::{RegistryError, RegistryResult};

/// Write the run report as pretty JSON, creating parent directories.
pub fn write_report(path: &Path, report: &GenerationReport) -> RegistryResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent)?;
    }
    write_json(path, report)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}
