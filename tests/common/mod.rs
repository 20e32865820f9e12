#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use hound::{SampleFormat, WavSpec, WavWriter};
use wav2midi_core::{CommandLine, ConvertError, ProgressSink, Result, ToolInvoker};

pub const SR: u32 = 44_100;

pub fn write_i16(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut w = WavWriter::create(path, spec).unwrap();
    for &s in samples {
        w.write_sample(s).unwrap();
    }
    w.finalize().unwrap();
}

pub fn write_f32(path: &Path, sample_rate: u32, channels: u16, samples: &[f32]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut w = WavWriter::create(path, spec).unwrap();
    for &s in samples {
        w.write_sample(s).unwrap();
    }
    w.finalize().unwrap();
}

pub fn read_i16(path: &Path) -> Vec<i16> {
    hound::WavReader::open(path)
        .unwrap()
        .into_samples::<i16>()
        .map(|s| s.unwrap())
        .collect()
}

/// Collects progress lines for assertions.
#[derive(Default)]
pub struct Lines(pub Mutex<Vec<String>>);

impl ProgressSink for Lines {
    fn line(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

impl Lines {
    pub fn contains(&self, needle: &str) -> bool {
        self.0.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

pub const MAIN_FRAMES: usize = 1000;
pub const MAIN_SAMPLE: i16 = 1000;
pub const PRE_FRAMES: usize = 1200;
pub const PRE_SAMPLE: f32 = 0.25;

/// Stands in for the external tools: writes the files each real tool would
/// write and records every command it receives.
pub struct ScriptedInvoker {
    pub calls: Mutex<Vec<CommandLine>>,
    fail_programs: Vec<String>,
    silent_programs: Vec<String>,
    main_stems: Vec<&'static str>,
    pre_stems: Vec<&'static str>,
    pre_sample_rate: u32,
    /// Number of files found in `--input_folder` on each pre-separator call.
    pub scratch_file_counts: Mutex<Vec<usize>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_programs: Vec::new(),
            silent_programs: Vec::new(),
            main_stems: vec!["vocals", "drums", "bass", "other"],
            pre_stems: vec!["speech", "music", "effects"],
            pre_sample_rate: SR,
            scratch_file_counts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, program: &str) -> Self {
        self.fail_programs.push(program.to_string());
        self
    }

    /// The program "succeeds" but writes nothing.
    pub fn silent(mut self, program: &str) -> Self {
        self.silent_programs.push(program.to_string());
        self
    }

    /// Pre-separation stems come out at `rate` instead of [`SR`].
    pub fn pre_sample_rate(mut self, rate: u32) -> Self {
        self.pre_sample_rate = rate;
        self
    }

    /// The pre-separator leaves `stem` out of its output.
    pub fn without_pre_stem(mut self, stem: &str) -> Self {
        self.pre_stems.retain(|s| *s != stem);
        self
    }

    pub fn six_stems(mut self) -> Self {
        self.main_stems = vec!["vocals", "drums", "bass", "other", "guitar", "piano"];
        self
    }

    pub fn calls_to(&self, program: &str) -> Vec<CommandLine> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program == program)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn fake_pre_separator(&self, cmd: &CommandLine) {
        let input = PathBuf::from(cmd.value_of("--input_folder").unwrap());
        self.scratch_file_counts
            .lock()
            .unwrap()
            .push(fs::read_dir(&input).unwrap().count());

        let store = PathBuf::from(cmd.value_of("--store_dir").unwrap());
        for stem in &self.pre_stems {
            write_f32(
                &store.join(format!("{stem}.wav")),
                self.pre_sample_rate,
                2,
                &vec![PRE_SAMPLE; PRE_FRAMES * 2],
            );
        }
    }

    fn fake_main_separator(&self, cmd: &CommandLine) {
        let model = cmd.value_of("-n").unwrap();
        let out = PathBuf::from(cmd.value_of("-o").unwrap());
        let template = cmd.value_of("--filename").unwrap();
        let track_dir = template.split('/').next().unwrap();
        let dir = out.join(model).join(track_dir);
        for stem in &self.main_stems {
            write_i16(
                &dir.join(format!("{stem}.wav")),
                SR,
                2,
                &vec![MAIN_SAMPLE; MAIN_FRAMES * 2],
            );
        }
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn run(&self, cmd: &CommandLine, description: &str, progress: &dyn ProgressSink) -> Result<()> {
        self.calls.lock().unwrap().push(cmd.clone());
        progress.line(&format!("Running: {description}"));

        if self.fail_programs.contains(&cmd.program) {
            return Err(ConvertError::ExternalToolFailure {
                tool: cmd.program.clone(),
                reason: "exit status: 1".into(),
            });
        }
        if self.silent_programs.contains(&cmd.program) {
            return Ok(());
        }

        match cmd.program.as_str() {
            "python3" => self.fake_pre_separator(cmd),
            "demucs" => self.fake_main_separator(cmd),
            "adtof" => write_midi(&PathBuf::from(cmd.value_of("--out").unwrap()), &cmd.program)?,
            "basic-pitch" => {
                let dir = PathBuf::from(&cmd.args[0]);
                let wav = PathBuf::from(&cmd.args[1]);
                let stem = wav.file_stem().unwrap().to_string_lossy().into_owned();
                write_midi(&dir.join(format!("{stem}_basic_pitch.mid")), &cmd.program)?;
            }
            other => panic!("unexpected tool {other}"),
        }
        Ok(())
    }
}

/// Like the real transcribers, never overwrites an existing output.
fn write_midi(path: &Path, program: &str) -> Result<()> {
    if path.exists() {
        return Err(ConvertError::ExternalToolFailure {
            tool: program.to_string(),
            reason: format!("{} already exists", path.display()),
        });
    }
    fs::write(path, b"MThd").unwrap();
    Ok(())
}

/// Creates `<models>/<name>/` with a config and a checkpoint.
pub fn make_bundle(models: &Path, name: &str, config: &str) -> PathBuf {
    let dir = models.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.yaml"), config).unwrap();
    fs::write(dir.join("model.ckpt"), b"weights").unwrap();
    dir
}

pub const CINEMATIC_CONFIG: &str = "training:\n  instruments: [speech, music, effects]\n  model_type: bandit_v2\n";
