//! Conversion pipeline: song audio in, one MIDI file per instrument out.
//!
//! ```text
//! Init ─▶ PreSeparation? ─▶ MainSeparation ─▶ Merge? ─▶ Transcription ─▶ Done
//!   └──────────────┴───────────────┴──────────────┴─────────────▶ Failed
//! ```
//!
//! Each stage checks the output layout first and skips work whose results
//! are already on disk. Separation failures abort the run; merge and
//! transcription problems are reported per stem and the run carries on.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    config::Settings,
    core::{
        cache::{collect_files, stem_key, StageGuard, MIDI_EXT, WAV_EXT},
        invoker::{CommandLine, ProcessInvoker, ToolInvoker},
        mixer::{mix, normalize_to_pcm16, Normalization},
    },
    error::{ConvertError, Result},
    io::progress::ProgressSink,
    model::registry::ModelRegistry,
    paths::SongLayout,
    routing::{resolve_stem, StemRouting},
    types::{ConversionReport, ConversionRequest, ModelBundle, Stage, StageResult},
};

const DRUMS_STEM: &str = "drums";
const SKIPPED_STEM: &str = "effects";
const DRUM_SUFFIX: &str = "adtof";
const GENERAL_SUFFIX: &str = "basic_pitch";

/// Which transcriber handles a separated stem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transcriber {
    Drums,
    /// Melodic transcriber, optionally with a minimum note length in ms.
    General { min_note_ms: Option<u32> },
    Skip,
}

/// Picks the transcriber for a stem by its (case-insensitive) file stem.
pub fn transcriber_for(stem: &str, settings: &Settings) -> Transcriber {
    let lower = stem.to_lowercase();
    if lower == DRUMS_STEM {
        Transcriber::Drums
    } else if lower == SKIPPED_STEM {
        Transcriber::Skip
    } else {
        let fine = settings.tools.fine_stems.iter().any(|s| s.eq_ignore_ascii_case(&lower));
        Transcriber::General {
            min_note_ms: fine.then_some(settings.tools.fine_note_length_ms),
        }
    }
}

/// Mutable state of one conversion, dropped when it finishes.
struct PipelineState {
    layout: SongLayout,
    stage: Stage,
    current_input: PathBuf,
    routing: Option<StemRouting>,
    pre_stems: BTreeMap<String, PathBuf>,
    separated: Vec<PathBuf>,
    main_stems: BTreeMap<String, PathBuf>,
    stages: Vec<(Stage, StageResult)>,
    midi_files: Vec<PathBuf>,
    failed_stems: Vec<String>,
}

impl PipelineState {
    fn enter(&mut self, stage: Stage) {
        log::info!("[{}] {} -> {}", self.layout.song(), self.stage, stage);
        self.stage = stage;
    }

    fn record(&mut self, result: StageResult) {
        self.stages.push((self.stage, result));
    }

    fn into_report(self) -> ConversionReport {
        ConversionReport {
            song: self.layout.song().to_string(),
            output_dir: self.layout.base_dir().to_path_buf(),
            stages: self.stages,
            midi_files: self.midi_files,
            failed_stems: self.failed_stems,
        }
    }
}

/// Runs conversions, one request per [`Converter::convert`] call.
pub struct Converter {
    settings: Settings,
    registry: ModelRegistry,
    invoker: Arc<dyn ToolInvoker>,
}

impl Converter {
    pub fn new(settings: Settings, registry: ModelRegistry, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            settings,
            registry,
            invoker,
        }
    }

    /// Real subprocesses and the bundles found under `settings.models_dir`.
    pub fn from_settings(settings: Settings) -> Self {
        let registry = ModelRegistry::discover(&settings.models_dir);
        Self::new(settings, registry, Arc::new(ProcessInvoker))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn convert(&self, request: &ConversionRequest, progress: &dyn ProgressSink) -> Result<ConversionReport> {
        progress.line("--- Starting Process ---");

        let mut state = match self.init(request, progress) {
            Ok(state) => state,
            Err(e) => {
                progress.line(&format!("Error: {e}"));
                return Err(e);
            }
        };

        match self.run_stages(request, &mut state, progress) {
            Ok(()) => {
                state.enter(Stage::Done);
                progress.line("--- All tasks completed successfully ---");
                Ok(state.into_report())
            }
            Err(e) => {
                state.enter(Stage::Failed);
                log::error!("conversion of {} failed: {e}", request.input.display());
                progress.line(&format!("Error: {e}"));
                Err(e)
            }
        }
    }

    fn init(&self, request: &ConversionRequest, progress: &dyn ProgressSink) -> Result<PipelineState> {
        if !request.input.is_file() {
            return Err(ConvertError::InputNotFound {
                path: request.input.clone(),
            });
        }

        let layout = SongLayout::new(&self.settings.output_root, &request.input);
        fs::create_dir_all(layout.base_dir())?;
        fs::create_dir_all(layout.midi_dir())?;
        progress.line(&format!("Output Directory: {}", layout.base_dir().display()));

        Ok(PipelineState {
            layout,
            stage: Stage::Init,
            current_input: request.input.clone(),
            routing: None,
            pre_stems: BTreeMap::new(),
            separated: Vec::new(),
            main_stems: BTreeMap::new(),
            stages: Vec::new(),
            midi_files: Vec::new(),
            failed_stems: Vec::new(),
        })
    }

    fn run_stages(&self, request: &ConversionRequest, state: &mut PipelineState, progress: &dyn ProgressSink) -> Result<()> {
        if request.pre_separation {
            state.enter(Stage::PreSeparation);
            self.pre_separate(request, state, progress)?;
        }

        state.enter(Stage::MainSeparation);
        self.separate(request, state, progress)?;

        // Merging edits the separated stems in place, so it only runs on
        // freshly separated output.
        let fresh = state
            .stages
            .last()
            .is_some_and(|(stage, result)| *stage == Stage::MainSeparation && result.ran);
        if state.routing.as_ref().is_some_and(StemRouting::has_merges) {
            if fresh {
                state.enter(Stage::Merge);
                self.merge(state, progress);
            } else {
                progress.line("Separated stems were reused; skipping merge.");
            }
        }

        state.enter(Stage::Transcription);
        self.transcribe(request, state, progress);
        Ok(())
    }

    fn bundle(&self, request: &ConversionRequest) -> Result<&ModelBundle> {
        let name = request
            .bundle
            .as_deref()
            .ok_or_else(|| ConvertError::ModelNotFound("<none selected>".into()))?;
        let bundle = self
            .registry
            .find(name)
            .ok_or_else(|| ConvertError::ModelNotFound(name.to_string()))?;

        if !bundle.config_path.is_file() {
            return Err(ConvertError::ConfigNotFound {
                dir: bundle.dir.clone(),
            });
        }
        if !bundle.checkpoint_path.is_file() {
            return Err(ConvertError::CheckpointNotFound {
                dir: bundle.dir.clone(),
            });
        }
        Ok(bundle)
    }

    fn pre_separate(&self, request: &ConversionRequest, state: &mut PipelineState, progress: &dyn ProgressSink) -> Result<()> {
        let bundle = self.bundle(request)?;
        let routing = request
            .routing
            .clone()
            .unwrap_or_else(|| StemRouting::from_stems(&bundle.stems));

        progress.line(&format!(
            "Selected Model: {} (Type: {})",
            bundle.name, bundle.model_type
        ));
        progress.line(&format!("Expected Stems: {:?}", bundle.stems));

        let out_dir = state.layout.pre_separation_dir();
        fs::create_dir_all(&out_dir)?;

        let guard = StageGuard::new(WAV_EXT, request.force_separate);
        let ran = guard.should_run(&out_dir);
        if ran {
            if request.force_separate {
                progress.line("Force separation enabled: re-running pre-separation.");
            }
            self.run_pre_separator(request, bundle, &state.layout, &out_dir, progress)?;
        } else {
            progress.line(&format!(
                "Pre-separation output already exists at {}. Skipping separation.",
                out_dir.display()
            ));
        }

        let files = collect_files(&out_dir, WAV_EXT);
        let names: Vec<String> = files
            .iter()
            .filter_map(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        progress.line(&format!("Generated files: {names:?}"));

        progress.line("Converting pre-separation outputs to 16-bit WAV...");
        for f in &files {
            let name = f.file_name().unwrap_or_default().to_string_lossy();
            match normalize_to_pcm16(f) {
                Ok(Normalization::Converted) => progress.line(&format!("Converted {name} to 16-bit.")),
                Ok(Normalization::Unchanged { bits }) => {
                    progress.line(&format!("{name} is already {bits}-bit integer."))
                }
                Err(e) => warn(progress, &format!("Error converting {name}: {e}")),
            }
            state.pre_stems.entry(stem_key(f)).or_insert_with(|| f.clone());
        }

        let wanted = routing.primary().to_lowercase();
        let (_, primary) = resolve_stem(&state.pre_stems, &wanted)
            .ok_or(ConvertError::UnresolvedPrimaryStem { stem: wanted.clone() })?;
        progress.line(&format!(
            "Using pre-separation stem '{}' as input for the main separator.",
            primary.file_name().unwrap_or_default().to_string_lossy()
        ));

        state.current_input = primary.clone();
        state.routing = Some(routing);
        state.record(StageResult {
            success: true,
            ran,
            files,
        });
        Ok(())
    }

    fn run_pre_separator(
        &self,
        request: &ConversionRequest,
        bundle: &ModelBundle,
        layout: &SongLayout,
        out_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        progress.line("Running pre-separation...");

        // The separator processes whole folders, so it gets one holding only this song.
        let scratch = tempfile::Builder::new()
            .prefix("tmp_input")
            .tempdir_in(layout.base_dir())?;
        let file_name = request
            .input
            .file_name()
            .ok_or_else(|| ConvertError::InputNotFound {
                path: request.input.clone(),
            })?;
        fs::copy(&request.input, scratch.path().join(file_name))?;

        let tools = &self.settings.tools;
        let cmd = CommandLine::new(&tools.python)
            .arg(&tools.pre_separator_script)
            .arg("--model_type")
            .arg(&bundle.model_type)
            .arg("--config_path")
            .arg(&bundle.config_path)
            .arg("--start_check_point")
            .arg(&bundle.checkpoint_path)
            .arg("--input_folder")
            .arg(scratch.path())
            .arg("--store_dir")
            .arg(out_dir)
            .arg("--disable_detailed_pbar");

        let outcome = self.invoker.run(&cmd, "Separation Inference", progress);
        if let Err(e) = scratch.close() {
            log::warn!("failed to remove scratch input dir: {e}");
        }
        outcome
    }

    fn separate(&self, request: &ConversionRequest, state: &mut PipelineState, progress: &dyn ProgressSink) -> Result<()> {
        let model = self.settings.separator_model(request.six_stems);
        let out_dir = state.layout.separation_dir(model);

        let guard = StageGuard::new(WAV_EXT, request.force_separate);
        let ran = guard.should_run(&out_dir);
        if ran {
            if request.force_separate {
                progress.line("Force separation enabled.");
            }
            let cmd = CommandLine::new(&self.settings.tools.main_separator)
                .args(["-n", model])
                .arg("--filename")
                .arg(format!("{}/{{stem}}.{{ext}}", state.layout.song()))
                .arg(&state.current_input)
                .arg("-o")
                .arg(state.layout.base_dir());
            self.invoker
                .run(&cmd, &format!("Main separation ({model})"), progress)?;
        } else {
            progress.line(&format!(
                "Main separator output already exists at {}. Skipping separation.",
                out_dir.display()
            ));
        }

        let files = collect_files(&out_dir, WAV_EXT);
        if files.is_empty() {
            return Err(ConvertError::NoOutputProduced { dir: out_dir });
        }
        progress.line(&format!("Found {} split audio files.", files.len()));

        for f in &files {
            state.main_stems.entry(stem_key(f)).or_insert_with(|| f.clone());
        }
        state.separated = files.clone();
        state.record(StageResult {
            success: true,
            ran,
            files,
        });
        Ok(())
    }

    fn merge(&self, state: &mut PipelineState, progress: &dyn ProgressSink) {
        let Some(routing) = state.routing.as_ref() else {
            return;
        };
        progress.line("Processing merge targets...");

        let mut merged = Vec::new();
        let mut success = true;
        for (stem, target) in routing.routes() {
            let Some(target_key) = target.stem_name() else {
                continue;
            };

            let Some(pre) = state.pre_stems.get(&stem.to_lowercase()) else {
                warn(
                    progress,
                    &format!("Could not find pre-separation output for stem '{stem}' to merge."),
                );
                success = false;
                continue;
            };
            let Some(main) = state.main_stems.get(target_key) else {
                warn(
                    progress,
                    &format!("Main separator target '{target}' not found. Cannot merge '{stem}'."),
                );
                success = false;
                continue;
            };

            progress.line(&format!("Merging '{stem}' into '{target}'."));
            match mix(pre, main, main) {
                Ok(()) => merged.push(main.clone()),
                Err(e) => {
                    warn(progress, &format!("Failed to merge '{stem}' into '{target}': {e}"));
                    success = false;
                }
            }
        }

        state.record(StageResult {
            success,
            ran: !merged.is_empty(),
            files: merged,
        });
    }

    fn transcribe(&self, request: &ConversionRequest, state: &mut PipelineState, progress: &dyn ProgressSink) {
        let midi_dir = state.layout.midi_dir();
        let guard = StageGuard::new(MIDI_EXT, request.force_midi);
        let mut ran = false;

        // Pre-separation stems are transcribed too, unless the main separator
        // already produced a stem of the same name.
        let mut sources = state.separated.clone();
        sources.extend(
            state
                .pre_stems
                .iter()
                .filter(|(key, _)| !state.main_stems.contains_key(*key))
                .map(|(_, path)| path.clone()),
        );

        for wav in sources {
            let stem = wav
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let Some((cmd, midi_out, description)) = self.transcription_job(&stem, &wav, &midi_dir) else {
                progress.line(&format!("Skipping transcription of '{stem}'."));
                continue;
            };
            let midi_name = midi_out.file_name().unwrap_or_default().to_string_lossy().into_owned();

            if !guard.should_run_file(&midi_out) {
                progress.line(&format!("MIDI file {midi_name} already exists. Skipping."));
                state.midi_files.push(midi_out);
                continue;
            }

            ran = true;
            // Transcribers refuse to overwrite an existing file.
            if midi_out.is_file() {
                if let Err(e) = fs::remove_file(&midi_out) {
                    warn(progress, &format!("Could not replace {midi_name}: {e}"));
                    state.failed_stems.push(stem);
                    continue;
                }
            }
            match self.invoker.run(&cmd, &description, progress) {
                Ok(()) if midi_out.is_file() => state.midi_files.push(midi_out),
                Ok(()) => {
                    warn(progress, &format!("{description} did not produce {midi_name}."));
                    state.failed_stems.push(stem);
                }
                Err(e) => {
                    warn(progress, &format!("Transcription of '{stem}' failed: {e}"));
                    state.failed_stems.push(stem);
                }
            }
        }

        state.record(StageResult {
            success: state.failed_stems.is_empty(),
            ran,
            files: state.midi_files.clone(),
        });
    }

    fn transcription_job(&self, stem: &str, wav: &Path, midi_dir: &Path) -> Option<(CommandLine, PathBuf, String)> {
        let tools = &self.settings.tools;
        let file_name = wav.file_name().unwrap_or_default().to_string_lossy();

        match transcriber_for(stem, &self.settings) {
            Transcriber::Skip => None,
            Transcriber::Drums => {
                let out = midi_dir.join(format!("{stem}_{DRUM_SUFFIX}.mid"));
                let cmd = CommandLine::new(&tools.drum_transcriber)
                    .arg("--audio")
                    .arg(wav)
                    .arg("--out")
                    .arg(&out)
                    .args(["--device", tools.drum_device.as_str()]);
                Some((cmd, out, format!("Drum transcription for {file_name}")))
            }
            Transcriber::General { min_note_ms } => {
                let out = midi_dir.join(format!("{stem}_{GENERAL_SUFFIX}.mid"));
                let mut cmd = CommandLine::new(&tools.general_transcriber).arg(midi_dir).arg(wav);
                if let Some(ms) = min_note_ms {
                    cmd = cmd.arg("--minimum-note-length").arg(ms.to_string());
                }
                Some((cmd, out, format!("Transcription for {file_name}")))
            }
        }
    }
}

fn warn(progress: &dyn ProgressSink, message: &str) {
    log::warn!("{message}");
    progress.line(&format!("Warning: {message}"));
}

/// Converts one file with real tools and settings, reporting to `progress`.
pub fn convert_file(request: &ConversionRequest, settings: Settings, progress: &dyn ProgressSink) -> Result<ConversionReport> {
    Converter::from_settings(settings).convert(request, progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_map_to_transcribers() {
        let s = Settings::default();
        assert_eq!(transcriber_for("drums", &s), Transcriber::Drums);
        assert_eq!(transcriber_for("effects", &s), Transcriber::Skip);
        assert_eq!(
            transcriber_for("vocals", &s),
            Transcriber::General { min_note_ms: None }
        );
        for stem in ["bass", "other", "guitar", "piano"] {
            assert_eq!(
                transcriber_for(stem, &s),
                Transcriber::General { min_note_ms: Some(30) }
            );
        }
    }
}
