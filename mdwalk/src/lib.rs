use serde::{Deserialize, Serialize};
use std::{
    fs::{self, Metadata},
    io::{Error, ErrorKind},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};
use tracing::debug;

/// Files at or above this size are skipped by the default file filter.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Extensions the default file filter keeps. The empty string keeps files
/// with no extension at all (README, LICENSE, ...).
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "", "md", "markdown", "mdown", "mmd", "text", "txt", "rmarkdown", "mkd", "mdwn", "mdtxt",
    "rmd", "mdtext", "apib",
];

/// Directory names the default directory filter skips on top of dot-dirs.
pub const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FileStats {
    pub size: u64,
    /// Modification time in epoch milliseconds.
    pub mtime_ms: i64,
}

/// One candidate file: identity, stat, and raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full path as handed back to the caller.
    pub path: String,
    /// File name component.
    pub file: String,
    pub stats: FileStats,
    pub data: Vec<u8>,
}

pub type FileFilter = Box<dyn Fn(&Path, &Metadata) -> bool + Send + Sync>;
pub type DirFilter = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Filter chains consulted during the walk. A candidate survives only if
/// every predicate in its chain returns `true`.
pub struct WalkOptions {
    pub file_filters: Vec<FileFilter>,
    pub dir_filters: Vec<DirFilter>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            file_filters: vec![
                Box::new(|path, _| !is_dot_entry(path)),
                Box::new(|_, metadata| metadata.len() < MAX_FILE_BYTES),
                Box::new(|path, _| {
                    let name = file_name_of(path);
                    DEFAULT_EXTENSIONS.contains(&bare_extension(&name).as_str())
                }),
            ],
            dir_filters: vec![
                Box::new(|path| !is_dot_entry(path)),
                Box::new(|path| !SKIPPED_DIRS.contains(&file_name_of(path).as_str())),
            ],
        }
    }
}

fn is_dot_entry(path: &Path) -> bool {
    file_name_of(path).starts_with('.')
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extension without the leading dot, lowercased; `""` when the name has no
/// dot after its first character.
fn bare_extension(name: &str) -> String {
    match name[1.min(name.len())..].rfind('.') {
        Some(pos) => name[pos + 2..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Lazy depth-first walk yielding [`FileRecord`]s.
///
/// Entries within a directory are visited in lexicographic order and
/// sub-directories are descended into immediately, so results come out in a
/// stable depth-first order. At most one file is read at a time; dropping
/// the iterator stops the walk. The iterator fuses after the first I/O
/// error.
pub struct Walker {
    stack: Vec<std::vec::IntoIter<PathBuf>>,
    options: WalkOptions,
    started: Option<PathBuf>,
    done: bool,
}

impl Walker {
    pub fn new(dir: impl Into<PathBuf>, options: WalkOptions) -> Self {
        Self {
            stack: Vec::new(),
            options,
            started: Some(dir.into()),
            done: false,
        }
    }

    fn push_dir(&mut self, dir: &Path) -> Result<(), Error> {
        let mut entries: Vec<PathBuf> = read_dir_retrying(dir)?;
        entries.sort();
        self.stack.push(entries.into_iter());
        Ok(())
    }

    fn keep_dir(&self, path: &Path) -> bool {
        self.options.dir_filters.iter().all(|filter| filter(path))
    }

    fn keep_file(&self, path: &Path, metadata: &Metadata) -> bool {
        self.options
            .file_filters
            .iter()
            .all(|filter| filter(path, metadata))
    }
}

impl Iterator for Walker {
    type Item = Result<FileRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(root) = self.started.take() {
            if let Err(error) = self.push_dir(&root) {
                self.done = true;
                return Some(Err(error));
            }
        }
        loop {
            let path = loop {
                let entries = self.stack.last_mut()?;
                match entries.next() {
                    Some(path) => break path,
                    None => {
                        self.stack.pop();
                    }
                }
            };
            // Symlinks are neither followed nor reported.
            let metadata = match path.symlink_metadata() {
                Ok(metadata) => metadata,
                Err(error) if error.kind() == ErrorKind::NotFound => continue,
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            };
            if metadata.is_dir() {
                if !self.keep_dir(&path) {
                    debug!(?path, "directory skipped");
                    continue;
                }
                if let Err(error) = self.push_dir(&path) {
                    self.done = true;
                    return Some(Err(error));
                }
                continue;
            }
            if !metadata.is_file() || !self.keep_file(&path, &metadata) {
                continue;
            }
            return Some(read_record(&path, &metadata).map_err(|error| {
                self.done = true;
                error
            }));
        }
    }
}

fn read_dir_retrying(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    match read_dir_once(dir) {
        Err(error) if error.kind() == ErrorKind::Interrupted => read_dir_once(dir),
        result => result,
    }
}

fn read_dir_once(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect()
}

fn read_record(path: &Path, metadata: &Metadata) -> Result<FileRecord, Error> {
    let data = fs::read(path)?;
    let mtime_ms = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default();
    Ok(FileRecord {
        path: path.to_string_lossy().into_owned(),
        file: file_name_of(path),
        stats: FileStats {
            size: metadata.len(),
            mtime_ms,
        },
        data,
    })
}
