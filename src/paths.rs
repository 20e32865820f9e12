use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Default location of `settings.toml`, if the platform has a config dir.
pub fn settings_file() -> Option<PathBuf> {
    let proj = ProjectDirs::from("dev", "Wav2Midi", "wav2midi")?;
    Some(proj.config_dir().join("settings.toml"))
}

/// Where one song's outputs live. The layout doubles as the cache key.
///
/// ```text
/// <root>/<song>/
///   bandit/                 pre-separation
///   <model>/<song>/         main separation
///   midi/                   transcriptions
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongLayout {
    song: String,
    base: PathBuf,
}

impl SongLayout {
    pub fn new(output_root: &Path, input: &Path) -> Self {
        let song = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let base = output_root.join(&song);
        Self { song, base }
    }

    pub fn song(&self) -> &str {
        &self.song
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn pre_separation_dir(&self) -> PathBuf {
        self.base.join("bandit")
    }

    pub fn separation_dir(&self, model: &str) -> PathBuf {
        self.base.join(model).join(&self.song)
    }

    pub fn midi_dir(&self) -> PathBuf {
        self.base.join("midi")
    }
}
