//! Defines the [`Manifest`], the explicit list of content files fed to the
//! loader. Scanning the file system happens here and only here, so
//! [`crate::loader::load`] can work on in-memory input.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

/// A single content file: its path relative to the content directory and its
/// contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub contents: String,
}

/// The content files of a book, in a stable order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Builds a manifest from in-memory `(relative path, contents)` pairs,
    /// keeping their order.
    pub fn from_entries<I, P, S>(entries: I) -> Manifest
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        Manifest {
            entries: entries
                .into_iter()
                .map(|(path, contents)| ManifestEntry {
                    path: path.into(),
                    contents: contents.into(),
                })
                .collect(),
        }
    }

    /// Recursively collects every markdown file (extension `.md`) under
    /// `content_directory`, sorted by path. Hidden files and directories are
    /// skipped. Files that aren't valid UTF-8 are read lossily; the loader
    /// decides what to make of them.
    pub fn scan(content_directory: &Path) -> Result<Manifest> {
        let mut entries = Vec::new();
        let walker = WalkDir::new(content_directory)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for result in walker {
            let entry = result.map_err(|err| Error::Walk {
                path: content_directory.to_owned(),
                err,
            })?;
            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }

            let relative = match entry.path().strip_prefix(content_directory) {
                Ok(relative) => relative.to_owned(),
                Err(_) => continue,
            };
            let bytes = std::fs::read(entry.path()).map_err(|err| Error::Read {
                path: entry.path().to_owned(),
                err,
            })?;
            tracing::trace!(
                path = %relative.display(),
                "discovered content file"
            );
            entries.push(ManifestEntry {
                path: relative,
                contents: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        tracing::debug!(
            directory = %content_directory.display(),
            files = entries.len(),
            "scanned content directory"
        );
        Ok(Manifest { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "md")
}

/// The result of a fallible scan.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an I/O problem while scanning the content directory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the directory tree can't be walked.
    #[error("walking content directory `{}`", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        err: walkdir::Error,
    },

    /// Returned when a content file can't be read.
    #[error("reading content file `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}
