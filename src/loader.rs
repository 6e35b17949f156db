use crate::error::{Error, Result};
use crate::types::RawTable;
use csv::{ReaderBuilder, Trim};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Locations probed, in order, when no input path is given.
pub const DEFAULT_CANDIDATES: [&str; 3] = [
    "data/data-pharmacy.csv",
    "data-pharmacy.csv",
    "/mnt/data/data-pharmacy.csv",
];

/// A raw table together with where it came from and a content fingerprint.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub source: String,
    pub fingerprint: String,
    pub raw: RawTable,
}

/// First candidate path that exists on disk.
pub fn locate_dataset<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<LoadedDataset> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let fingerprint = fingerprint(&bytes);
    let raw = read_raw_table(bytes.as_slice())?;
    if raw.headers.is_empty() {
        return Err(Error::no_data(format!("{} has no header row", path.display())));
    }
    info!(
        path = %path.display(),
        rows = raw.rows.len(),
        columns = raw.headers.len(),
        fingerprint = %&fingerprint[..12],
        "dataset loaded"
    );
    Ok(LoadedDataset {
        source: path.display().to_string(),
        fingerprint,
        raw,
    })
}

/// Parse delimited text into headers and string cells. Rows shorter than
/// the header are padded with empty cells; longer ones are cut.
pub fn read_raw_table<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let width = headers.len();
    let mut rows = Vec::new();
    let mut ragged = 0usize;
    for result in rdr.records() {
        let record = result?;
        if record.len() != width {
            ragged += 1;
        }
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }
    if ragged > 0 {
        debug!(ragged, "rows with a different cell count than the header");
    }
    Ok(RawTable::new(headers, rows))
}

/// SHA-256 of the file content, hex encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
