//! Archive production: one zip file per snapshot.
//!
//! The archiver is all-or-nothing from the caller's point of view. Data is
//! written to `<dest>.partial` and only renamed into place once the zip
//! central directory has been flushed.

use crate::error::ArchiveError;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level used unless a caller asks for another one
pub const NORMAL_COMPRESSION_LEVEL: i64 = 5;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Compresses a file or a directory tree into a single archive file
pub trait Archiver: Send + Sync {
    fn compress(&self, source: &Path, dest: &Path) -> Result<(), ArchiveError>;
}

/// A produced snapshot: `<sanitized-source-name>_<YYYYMMDD_HHmmss>.zip`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
}

impl ArchiveFile {
    pub const EXTENSION: &'static str = "zip";

    pub fn for_source(backup_dir: &Path, source: &Path, created_at: DateTime<Local>) -> Self {
        let file_name = format!(
            "{}_{}.{}",
            sanitize_name(&source_name(source)),
            created_at.format(TIMESTAMP_FORMAT),
            Self::EXTENSION
        );
        Self {
            path: backup_dir.join(file_name),
            created_at,
        }
    }
}

/// Replace whitespace so archive names stay shell friendly
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

fn source_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            source
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "snapshot".to_string())
}

/// Deflate-compressed zip archiver
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    level: i64,
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::with_level(NORMAL_COMPRESSION_LEVEL)
    }
}

impl ZipArchiver {
    pub fn with_level(level: i64) -> Self {
        Self { level }
    }

    fn options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.level))
            .large_file(true)
    }

    fn write_archive(
        &self,
        source: &Path,
        metadata: &fs::Metadata,
        partial: &Path,
        dest: &Path,
    ) -> Result<(), ArchiveError> {
        let mut zip = ZipWriter::new(BufWriter::new(File::create(partial)?));
        let options = self.options();

        if metadata.is_file() {
            let name = source_name(source);
            zip.start_file(name, options)?;
            io::copy(&mut File::open(source)?, &mut zip)?;
        } else {
            let root = source_name(source);
            zip.add_directory(root.as_str(), options)?;

            let walker = WalkDir::new(source)
                .min_depth(1)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.path() != partial && e.path() != dest);

            for entry in walker {
                let entry = entry?;
                let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
                let name = entry_name(&root, relative);
                let file_type = entry.file_type();

                if file_type.is_dir() {
                    zip.add_directory(name, options)?;
                } else if file_type.is_file() {
                    zip.start_file(name, options)?;
                    io::copy(&mut File::open(entry.path())?, &mut zip)?;
                } else {
                    tracing::warn!(path = %entry.path().display(), "Skipping non-regular file");
                }
            }
        }

        zip.finish()?.flush()?;
        Ok(())
    }
}

impl Archiver for ZipArchiver {
    fn compress(&self, source: &Path, dest: &Path) -> Result<(), ArchiveError> {
        let metadata = fs::metadata(source)?;
        if !metadata.is_file() && !metadata.is_dir() {
            return Err(ArchiveError::UnsupportedSource(source.to_path_buf()));
        }

        let partial = partial_path(dest);
        match self.write_archive(source, &metadata, &partial, dest) {
            Ok(()) => {
                fs::rename(&partial, dest)?;
                tracing::debug!(
                    source = %source.display(),
                    dest = %dest.display(),
                    "Archive written"
                );
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

/// Zip entry names always use `/`, regardless of platform
fn entry_name(root: &str, relative: &Path) -> String {
    let mut name = root.to_string();
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}
