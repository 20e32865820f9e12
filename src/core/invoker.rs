use std::{
    fmt,
    io::{self, BufRead, BufReader, Read},
    process::{Command, Stdio},
    thread,
};

use crossbeam_channel::{unbounded, Sender};

use crate::{
    error::{ConvertError, Result},
    io::progress::ProgressSink,
};

/// Program plus arguments, passed to the OS without a shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        for a in args {
            self = self.arg(a);
        }
        self
    }

    /// Value following a named flag, e.g. `value_of("-o")`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// Runs external tools for the pipeline.
///
/// Implementations must forward every output line to `progress` before
/// returning, and return [`ConvertError::ExternalToolFailure`] when the tool
/// cannot be started or exits unsuccessfully.
pub trait ToolInvoker: Send + Sync {
    fn run(&self, cmd: &CommandLine, description: &str, progress: &dyn ProgressSink) -> Result<()>;
}

/// Spawns real processes and streams their merged stdout/stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl ToolInvoker for ProcessInvoker {
    fn run(&self, cmd: &CommandLine, description: &str, progress: &dyn ProgressSink) -> Result<()> {
        progress.line(&format!("Running: {description}"));
        progress.line(&format!("Command: {cmd}"));
        log::debug!("spawning {cmd}");

        let mut child = match Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                progress.line(&format!("Command not found: {}", cmd.program));
                return Err(ConvertError::tool(&cmd.program, "command not found"));
            }
            Err(e) => {
                progress.line(&format!("Error during {description}: {e}"));
                return Err(ConvertError::tool(&cmd.program, e.to_string()));
            }
        };

        let (tx, rx) = unbounded::<String>();
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, tx.clone()));
        }
        drop(tx);

        // Ends once both pipes are closed.
        for line in rx {
            progress.line(&line);
        }
        for r in readers {
            let _ = r.join();
        }

        let status = child.wait()?;
        if !status.success() {
            progress.line(&format!("Error during {description}: {status}"));
            return Err(ConvertError::tool(&cmd.program, status.to_string()));
        }

        progress.line(&format!("--- Finished {description} ---"));
        Ok(())
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, tx: Sender<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || forward_lines(&mut BufReader::new(stream), &tx))
}

/// Sends each line of `reader` to `tx` until EOF. After a read error or a
/// closed receiver the rest of the stream is still consumed, so the child
/// never blocks on a full pipe.
fn forward_lines<R: BufRead>(reader: &mut R, tx: &Sender<String>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                if tx.send(line.trim_end().to_string()).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::debug!("tool output read failed: {e}");
                break;
            }
        }
    }
    let _ = io::copy(reader, &mut io::sink());
}
