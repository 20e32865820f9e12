use std::{fmt, path::PathBuf};

use crate::routing::StemRouting;

/// A separation model installed on disk: one directory holding a YAML
/// config and a checkpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelBundle {
    pub name: String,
    pub dir: PathBuf,
    pub stems: Vec<String>,
    pub model_type: String,
    pub config_path: PathBuf,
    pub checkpoint_path: PathBuf,
}

/// Everything the pipeline needs to know about one conversion.
#[derive(Clone, Debug)]
pub struct ConversionRequest {
    pub input: PathBuf,
    /// Re-run both separators even when their output is on disk.
    pub force_separate: bool,
    /// Re-run transcription even when the MIDI file already exists.
    pub force_midi: bool,
    /// Use the 6-stem separator model (adds guitar and piano).
    pub six_stems: bool,
    /// Split speech/music/effects before the main separator.
    pub pre_separation: bool,
    /// Name of the [`ModelBundle`] used for pre-separation.
    pub bundle: Option<String>,
    /// Routing table; derived from the bundle's stems when absent.
    pub routing: Option<StemRouting>,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            force_separate: false,
            force_midi: false,
            six_stems: false,
            pre_separation: false,
            bundle: None,
            routing: None,
        }
    }

    /// Enables pre-separation with the given bundle.
    pub fn with_bundle(mut self, name: impl Into<String>) -> Self {
        self.pre_separation = true;
        self.bundle = Some(name.into());
        self
    }
}

/// Pipeline states, in the order they are entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    PreSeparation,
    MainSeparation,
    Merge,
    Transcription,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::PreSeparation => "pre-separation",
            Stage::MainSeparation => "main separation",
            Stage::Merge => "merge",
            Stage::Transcription => "transcription",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageResult {
    pub success: bool,
    /// Whether an external tool was invoked, as opposed to reusing output on disk.
    pub ran: bool,
    pub files: Vec<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ConversionReport {
    pub song: String,
    pub output_dir: PathBuf,
    pub stages: Vec<(Stage, StageResult)>,
    pub midi_files: Vec<PathBuf>,
    /// Stems whose transcription failed; the rest of the run still completed.
    pub failed_stems: Vec<String>,
}

impl ConversionReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, result)| result)
    }
}
