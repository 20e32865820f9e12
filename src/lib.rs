//! # wav2midi-core
//!
//! Turns a song into per-instrument MIDI files by chaining external tools:
//! an optional speech/music/effects pre-separator, a stem separator, a drum
//! transcriber and a melodic transcriber. Work already on disk is reused.

pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod paths;
pub mod routing;
pub mod types;

pub use crate::{
    config::{Settings, ToolSettings},
    core::{
        converter::{convert_file, Converter},
        invoker::{CommandLine, ProcessInvoker, ToolInvoker},
        mixer::{mix, normalize_to_pcm16},
        worker::ConversionWorker,
    },
    error::{ConvertError, Result},
    io::progress::{PipelineEvent, ProgressSink},
    model::registry::ModelRegistry,
    routing::{MergeTarget, StemRouting},
    types::{ConversionReport, ConversionRequest, ModelBundle, Stage, StageResult},
};
