use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use crossbeam_channel::{unbounded, Receiver};

use crate::{
    core::converter::Converter,
    error::{ConvertError, Result},
    io::progress::{ChannelSink, PipelineEvent},
    types::ConversionRequest,
};

/// Runs conversions on a background thread, one at a time.
///
/// Progress lines and the final outcome arrive on the receiver returned by
/// [`ConversionWorker::start`], in order, ending with
/// [`PipelineEvent::Finished`].
pub struct ConversionWorker {
    converter: Arc<Converter>,
    running: Arc<AtomicBool>,
}

impl ConversionWorker {
    pub fn new(converter: Converter) -> Self {
        Self {
            converter: Arc::new(converter),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn is_busy(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts `request` unless a previous one is still running.
    pub fn start(&self, request: ConversionRequest) -> Result<Receiver<PipelineEvent>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ConvertError::Busy);
        }

        let (tx, rx) = unbounded();
        let converter = Arc::clone(&self.converter);
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("wav2midi-worker".into())
            .spawn(move || {
                let sink = ChannelSink(tx);
                // Declared after `sink` so a panic clears it before the
                // channel disconnects.
                let idle = IdleOnDrop(running);
                let outcome = converter.convert(&request, &sink);
                // Idle before the outcome is visible, so a caller reacting to
                // `Finished` can start the next request right away.
                drop(idle);
                let _ = sink.0.send(PipelineEvent::Finished(outcome));
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::Release);
            return Err(e.into());
        }
        Ok(rx)
    }
}

/// Marks the worker idle when the run ends, including by panic.
struct IdleOnDrop(Arc<AtomicBool>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
