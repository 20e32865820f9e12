//! Settings: tool commands, directories and transcription tuning.
//!
//! Loaded from TOML. Every field has a default, so a partial file (or no
//! file at all) is valid. A handful of environment variables override the
//! file afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConvertError, Result},
    paths::settings_file,
};

pub const ENV_OUTPUT_DIR: &str = "WAV2MIDI_OUTPUT_DIR";
pub const ENV_MODELS_DIR: &str = "WAV2MIDI_MODELS_DIR";
pub const ENV_PYTHON: &str = "WAV2MIDI_PYTHON";
pub const ENV_SEPARATOR_SCRIPT: &str = "WAV2MIDI_SEPARATOR_SCRIPT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Outputs land in `<output_root>/<song>/`.
    pub output_root: PathBuf,
    /// Directory scanned for pre-separation model bundles.
    pub models_dir: PathBuf,
    pub tools: ToolSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("outputs"),
            models_dir: PathBuf::from("GuiApp/bandit"),
            tools: ToolSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Interpreter that runs the pre-separator script.
    pub python: String,
    pub pre_separator_script: PathBuf,
    pub main_separator: String,
    pub four_stem_model: String,
    pub six_stem_model: String,
    pub drum_transcriber: String,
    pub drum_device: String,
    pub general_transcriber: String,
    /// Minimum note length (ms) passed for `fine_stems`.
    pub fine_note_length_ms: u32,
    pub fine_stems: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            pre_separator_script: PathBuf::from("Music-Source-Separation-Training/inference.py"),
            main_separator: "demucs".into(),
            four_stem_model: "htdemucs".into(),
            six_stem_model: "htdemucs_6s".into(),
            drum_transcriber: "adtof".into(),
            drum_device: "cpu".into(),
            general_transcriber: "basic-pitch".into(),
            fine_note_length_ms: 30,
            fine_stems: ["bass", "other", "guitar", "piano"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConvertError::Settings(format!("{}: {e}", path.display())))?;
        Ok(toml::from_str(&text)?)
    }

    /// Loads `path` when given (it must exist), otherwise the platform
    /// settings file if present, otherwise defaults. Environment overrides
    /// are applied last.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::load(p)?,
            None => match settings_file().filter(|p| p.is_file()) {
                Some(p) => {
                    log::info!("loading settings from {}", p.display());
                    Self::load(&p)?
                }
                None => Self::default(),
            },
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_OUTPUT_DIR) {
            self.output_root = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_MODELS_DIR) {
            self.models_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_PYTHON) {
            self.tools.python = v;
        }
        if let Some(v) = lookup(ENV_SEPARATOR_SCRIPT) {
            self.tools.pre_separator_script = PathBuf::from(v);
        }
    }

    pub fn separator_model(&self, six_stems: bool) -> &str {
        if six_stems {
            &self.tools.six_stem_model
        } else {
            &self.tools.four_stem_model
        }
    }
}
