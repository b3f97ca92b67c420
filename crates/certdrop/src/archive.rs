//! Certificate archive creation and verification
//!
//! Packs the private key and full chain into a gzip-compressed tar with flat
//! top-level entries (`privkey.pem`, `fullchain.pem`), so the recipient can
//! unpack straight into a certificate directory.
//!
//! Archives are all-or-nothing on disk: if writing fails part way, the
//! partial file is removed before the error is returned.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, error, info, warn};

use crate::cert::REQUIRED_FILES;
use crate::errors::ArchiveError;

/// File name prefix for generated archives
pub const ARCHIVE_PREFIX: &str = "ssl_cert";

/// File name extension for generated archives
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// A written archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    /// Absolute path of the archive
    pub path: PathBuf,
    /// Entries stored in the archive
    pub file_count: usize,
    pub byte_size: u64,
    /// Set once the archive has been reopened and read back cleanly
    pub verified: bool,
}

impl ArchiveResult {
    /// Bare file name, used in notifications
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Builds certificate archives
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    /// Directory for archives without an explicit output path
    output_dir: Option<PathBuf>,
}

impl ArchiveBuilder {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    /// `ssl_cert_<name>_<YYYYMMDD_HHMMSS>.tar.gz`
    pub fn default_file_name(name: &str, now: DateTime<Local>) -> String {
        format!(
            "{}_{}_{}.{}",
            ARCHIVE_PREFIX,
            name,
            now.format("%Y%m%d_%H%M%S"),
            ARCHIVE_EXTENSION
        )
    }

    fn default_output_path(&self, cert_dir: &Path, domain_hint: Option<&str>) -> PathBuf {
        let name = domain_hint
            .map(str::to_string)
            .or_else(|| cert_dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "cert".to_string());
        let file_name = Self::default_file_name(&name, Local::now());

        match self.output_dir {
            Some(ref dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    /// Write an archive of the certificate files in `cert_dir`
    ///
    /// Missing individual files are skipped with a warning; an archive with
    /// no files at all is an error.
    pub fn build(
        &self,
        cert_dir: &Path,
        output_path: Option<&Path>,
        domain_hint: Option<&str>,
    ) -> Result<ArchiveResult, ArchiveError> {
        if !cert_dir.is_dir() {
            return Err(ArchiveError::SourceMissing(cert_dir.to_path_buf()));
        }

        let mut entries = Vec::new();
        for name in REQUIRED_FILES {
            let path = cert_dir.join(name);
            if path.is_file() {
                entries.push((path, name));
            } else {
                warn!(file = %name, "Certificate file missing, skipping");
            }
        }

        if entries.is_empty() {
            return Err(ArchiveError::NoFiles(cert_dir.to_path_buf()));
        }

        let output = output_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_output_path(cert_dir, domain_hint));

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        info!(output = %output.display(), "Packing certificate files");

        if let Err(e) = write_archive(&output, &entries) {
            error!(output = %output.display(), error = %e, "Failed to write archive");
            if output.exists() {
                if let Err(cleanup) = fs::remove_file(&output) {
                    warn!(error = %cleanup, "Failed to remove partial archive");
                }
            }
            return Err(e.into());
        }

        let path = fs::canonicalize(&output)?;
        let byte_size = fs::metadata(&path)?.len();

        info!(files = entries.len(), bytes = byte_size, "Archive written");

        Ok(ArchiveResult {
            path,
            file_count: entries.len(),
            byte_size,
            verified: false,
        })
    }

    /// Build an archive and read it back before returning it
    pub fn build_and_verify(
        &self,
        cert_dir: &Path,
        output_path: Option<&Path>,
        domain_hint: Option<&str>,
    ) -> Result<ArchiveResult, ArchiveError> {
        let mut result = self.build(cert_dir, output_path, domain_hint)?;

        let names = verify(&result.path)?;
        result.file_count = names.len();
        result.verified = true;

        info!(archive = %result.path.display(), "Certificate archive ready");
        Ok(result)
    }
}

fn write_archive(output: &Path, entries: &[(PathBuf, &str)]) -> io::Result<()> {
    let file = File::create(output)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, name) in entries {
        builder.append_path_with_name(path, name)?;
        debug!(file = %name, "Added to archive");
    }

    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Read every entry of an archive back, returning the entry names
///
/// Fails on truncated or corrupted data and on archives with no entries.
pub fn verify(path: &Path) -> Result<Vec<String>, ArchiveError> {
    let invalid = |reason: String| ArchiveError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut names = Vec::new();

    let entries = archive.entries().map_err(|e| invalid(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| invalid(e.to_string()))?;
        let name = entry
            .path()
            .map_err(|e| invalid(e.to_string()))?
            .to_string_lossy()
            .into_owned();

        let expected = entry.size();
        let copied = io::copy(&mut entry, &mut io::sink()).map_err(|e| invalid(e.to_string()))?;
        if copied != expected {
            return Err(invalid(format!(
                "entry {} is short: {} of {} bytes",
                name, copied, expected
            )));
        }
        names.push(name);
    }

    // Drain to the gzip trailer so the CRC is checked
    let mut decoder = archive.into_inner();
    io::copy(&mut decoder, &mut io::sink()).map_err(|e| invalid(e.to_string()))?;

    if names.is_empty() {
        return Err(invalid("archive has no entries".to_string()));
    }

    info!(
        archive = %path.display(),
        entries = names.len(),
        names = %names.join(", "),
        "Archive verified"
    );
    Ok(names)
}

/// Newest archive in `dir` named like a generated one, by modification time
pub fn latest_archive(dir: &Path) -> Result<Option<PathBuf>, ArchiveError> {
    let prefix = format!("{}_", ARCHIVE_PREFIX);
    let suffix = format!(".{}", ARCHIVE_EXTENSION);
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&prefix) || !name.ends_with(&suffix) || !entry.file_type()?.is_file() {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(time, _)| modified >= *time) {
            newest = Some((modified, entry.path()));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
