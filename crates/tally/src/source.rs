//! File source lister
//!
//! Turns the input path into the ordered list of spreadsheet files every pass
//! iterates over.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{TallyError, TallyResult};

/// Recognised spreadsheet extensions, compared case-insensitively
pub const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xls", "xlsm", "xlsb"];

/// Whether a path carries a spreadsheet extension
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SPREADSHEET_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// The resolved input: a sorted file list, plus the extraction directory
/// when the input was an archive.
///
/// The extraction directory lives exactly as long as this value.
#[derive(Debug)]
pub struct InputFiles {
    files: Vec<PathBuf>,
    temp_dir: Option<TempDir>,
}

impl InputFiles {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Where an archive was extracted, if it was one
    pub fn extraction_dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Remove the extraction directory now, reporting failures.
    /// Dropping the value removes it too, silently.
    pub fn cleanup(self) -> io::Result<()> {
        match self.temp_dir {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

/// Resolve an input path.
///
/// - a directory is scanned recursively
/// - a file with a spreadsheet extension is the only input
/// - any other file that is a zip archive (judged by content) is extracted
///   to a temporary directory which is then scanned
///
/// Everything else is [`TallyError::UnrecognizedInput`].
pub fn resolve_input(path: &Path) -> TallyResult<InputFiles> {
    if path.is_dir() {
        let files = scan_dir(path);
        tracing::info!(input = %path.display(), files = files.len(), "scanned directory");
        return Ok(InputFiles {
            files,
            temp_dir: None,
        });
    }

    if !path.is_file() {
        return Err(TallyError::UnrecognizedInput {
            path: path.to_path_buf(),
            reason: "no such file or directory".into(),
        });
    }

    if is_spreadsheet(path) {
        return Ok(InputFiles {
            files: vec![path.to_path_buf()],
            temp_dir: None,
        });
    }

    let mut archive = File::open(path)
        .map(BufReader::new)
        .map_err(zip::result::ZipError::Io)
        .and_then(ZipArchive::new)
        .map_err(|e| TallyError::UnrecognizedInput {
            path: path.to_path_buf(),
            reason: format!("not a directory or zip archive ({})", e),
        })?;

    let temp_dir = tempfile::Builder::new().prefix("sheet-tally-").tempdir()?;
    extract(&mut archive, temp_dir.path())?;

    let files = scan_dir(temp_dir.path());
    tracing::info!(
        input = %path.display(),
        dir = %temp_dir.path().display(),
        files = files.len(),
        "extracted archive"
    );
    Ok(InputFiles {
        files,
        temp_dir: Some(temp_dir),
    })
}

fn scan_dir(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_spreadsheet(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

fn extract<R: io::Read + io::Seek>(archive: &mut ZipArchive<R>, dest: &Path) -> TallyResult<()> {
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(index = i, error = %e, "skipping unreadable archive entry");
                continue;
            }
        };

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(name = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}
