use std::path::Path;

use tempfile::NamedTempFile;

use crate::StoreError;

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

pub(crate) fn csv_error(path: &Path, source: csv::Error) -> StoreError {
    StoreError::Csv {
        path: path.display().to_string(),
        source,
    }
}

/// Write a CSV file by filling a temp file in the same directory and renaming
/// it over `path`, so readers never observe a half-written file.
pub(crate) fn write_csv_atomically<F>(path: &Path, fill: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut csv::Writer<&mut NamedTempFile>) -> Result<(), csv::Error>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;
    {
        let mut writer = csv::Writer::from_writer(&mut tmp);
        fill(&mut writer).map_err(|e| csv_error(path, e))?;
        writer.flush().map_err(|e| io_error(path, e))?;
    }
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| io_error(path, e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

/// Open a CSV file with headers, or `None` if it does not exist.
pub(crate) fn open_csv(path: &Path) -> Result<Option<csv::Reader<std::fs::File>>, StoreError> {
    match std::fs::File::open(path) {
        Ok(file) => Ok(Some(
            csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .from_reader(file),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

pub(crate) fn remove_file(path: &Path) -> Result<(), StoreError> {
    std::fs::remove_file(path).map_err(|e| io_error(path, e))
}

pub(crate) fn read_dir_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, StoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}
