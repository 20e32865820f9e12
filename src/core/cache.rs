//! Stage cache guard.
//!
//! Completion of a stage is inferred from the files it leaves behind; no
//! marker files are written. A stage whose output directory holds at least
//! one file with the stage's extension is considered done.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub const WAV_EXT: &str = "wav";
pub const MIDI_EXT: &str = "mid";

#[derive(Clone, Copy, Debug)]
pub struct StageGuard<'a> {
    extension: &'a str,
    force: bool,
}

impl<'a> StageGuard<'a> {
    pub fn new(extension: &'a str, force: bool) -> Self {
        Self { extension, force }
    }

    /// True when the stage writing into `dir` has to run.
    pub fn should_run(&self, dir: &Path) -> bool {
        self.force || !dir.is_dir() || collect_files(dir, self.extension).is_empty()
    }

    /// True when the stage expected to write exactly `file` has to run.
    pub fn should_run_file(&self, file: &Path) -> bool {
        self.force || !file.is_file()
    }
}

/// Recursively lists files under `dir` whose extension matches `ext`
/// (case-insensitive), sorted by path. Unreadable entries are skipped.
pub fn collect_files(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect();
    files.sort();
    files
}

/// Lower-cased file stem, the key stems are looked up by.
pub fn stem_key(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
