//! Archive building for compressed-batch uploads
//!
//! The selection is packed into one deflate ZIP inside a temp directory, then
//! uploaded as a single object. The temp directory is a scoped resource owned
//! by the orchestrator (`tempfile::TempDir`), so it is removed on every exit
//! path including failures.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

/// Deflate level used for batch archives (moderate: good ratio, fast enough
/// to keep the build phase inside its narrow progress band)
const COMPRESSION_LEVEL: i64 = 6;

/// Selections of at least this many files suggest compressing first
pub const MULTI_FILE_COUNT_HINT: usize = 5;

/// Multi-file selections of at least this total size suggest compressing
pub const MULTI_FILE_SIZE_HINT: u64 = 100 * 1024 * 1024;

/// Folders with at least this many files suggest compressing first
pub const FOLDER_FILE_COUNT_HINT: usize = 10;

/// Folders of at least this total size suggest compressing
pub const FOLDER_SIZE_HINT: u64 = 500 * 1024 * 1024;

/// Whether a multi-file selection should prompt the compress-first choice
pub fn recommend_compression_for_files(file_count: usize, total_size: u64) -> bool {
    file_count >= MULTI_FILE_COUNT_HINT || total_size >= MULTI_FILE_SIZE_HINT
}

/// Whether a folder selection should prompt the compress-first choice
pub fn recommend_compression_for_folder(file_count: usize, total_size: u64) -> bool {
    file_count >= FOLDER_FILE_COUNT_HINT || total_size >= FOLDER_SIZE_HINT
}

/// Build a deflate ZIP archive from loose files and whole folders
///
/// Files land at the archive root under their file name; folder contents keep
/// the folder's name as their top-level directory. Selected paths that have
/// disappeared since selection are skipped with a warning. Returns the size
/// of the finished archive in bytes.
///
/// Blocking; the orchestrator calls this through `spawn_blocking`.
pub fn build_archive(archive_path: &Path, files: &[PathBuf], folders: &[PathBuf]) -> Result<u64> {
    let output = File::create(archive_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(output));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
        .large_file(true);

    for file_path in files {
        if !file_path.is_file() {
            warn!("skipping vanished file {}", file_path.display());
            continue;
        }
        let name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        add_file(&mut zip, file_path, &name, options)?;
    }

    for folder_path in folders {
        if !folder_path.is_dir() {
            warn!("skipping vanished folder {}", folder_path.display());
            continue;
        }
        let folder_name = folder_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        for entry in WalkDir::new(folder_path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
        {
            let relative = entry
                .path()
                .strip_prefix(folder_path)
                .expect("walkdir entry is below its root")
                .to_string_lossy()
                .replace('\\', "/");
            let name = format!("{folder_name}/{relative}");
            add_file(&mut zip, entry.path(), &name, options)?;
        }
    }

    zip.finish()?;
    let size = std::fs::metadata(archive_path)?.len();
    debug!("built archive {} ({size} bytes)", archive_path.display());
    Ok(size)
}

fn add_file<W: io::Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    name: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)?;
    let mut reader = BufReader::new(File::open(path)?);
    io::copy(&mut reader, zip)?;
    Ok(())
}
