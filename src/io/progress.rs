use crossbeam_channel::Sender;

use crate::{error::Result, types::ConversionReport};

/// Receives human-readable progress lines in the order they happen.
pub trait ProgressSink {
    fn line(&self, line: &str);
}

impl<F: Fn(&str)> ProgressSink for F {
    fn line(&self, line: &str) {
        self(line)
    }
}

/// Drops every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn line(&self, _line: &str) {}
}

/// What a background conversion sends back to whoever started it.
#[derive(Debug)]
pub enum PipelineEvent {
    Line(String),
    /// Always the last event of a run.
    Finished(Result<ConversionReport>),
}

/// Forwards lines over the channel a background run reports through.
#[derive(Debug, Clone)]
pub struct ChannelSink(pub Sender<PipelineEvent>);

impl ProgressSink for ChannelSink {
    fn line(&self, line: &str) {
        // The receiver going away only means nobody is listening any more.
        let _ = self.0.send(PipelineEvent::Line(line.to_string()));
    }
}
