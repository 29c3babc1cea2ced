//! Plain-text trace files written during a run.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::case::{CaseConfig, FileRole};
use crate::sim::engine::{EngineError, EngineResult};

/// One open trace file.
#[derive(Debug)]
struct TraceFile {
    path: PathBuf,
    out: BufWriter<File>,
}

impl TraceFile {
    fn create(path: &Path) -> EngineResult<Self> {
        let file = File::create(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> EngineResult<()> {
        writeln!(self.out, "{args}").map_err(|source| EngineError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn flush(&mut self) -> EngineResult<()> {
        self.out.flush().map_err(|source| EngineError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Trace outputs of a run; roles absent from the case are skipped.
#[derive(Debug, Default)]
pub struct Traces {
    output: Option<TraceFile>,
    init: Option<TraceFile>,
    continuous: Option<TraceFile>,
    discrete: Option<TraceFile>,
}

impl Traces {
    /// Creates (truncating) every trace file named by `case`.
    ///
    /// # Errors
    ///
    /// `EngineError::Io` if a file cannot be created.
    pub fn open(case: &CaseConfig) -> EngineResult<Self> {
        let open = |role| case.get(role).map(TraceFile::create).transpose();
        Ok(Self {
            output: open(FileRole::OutputLog)?,
            init: open(FileRole::InitLog)?,
            continuous: open(FileRole::ContinuousTrace)?,
            discrete: open(FileRole::DiscreteTrace)?,
        })
    }

    pub fn output(&mut self, args: fmt::Arguments<'_>) -> EngineResult<()> {
        write(&mut self.output, args)
    }

    pub fn init(&mut self, args: fmt::Arguments<'_>) -> EngineResult<()> {
        write(&mut self.init, args)
    }

    pub fn continuous(&mut self, args: fmt::Arguments<'_>) -> EngineResult<()> {
        write(&mut self.continuous, args)
    }

    pub fn discrete(&mut self, args: fmt::Arguments<'_>) -> EngineResult<()> {
        write(&mut self.discrete, args)
    }

    /// Flushes every open file.
    ///
    /// # Errors
    ///
    /// The first flush failure.
    pub fn flush(&mut self) -> EngineResult<()> {
        for file in [
            &mut self.output,
            &mut self.init,
            &mut self.continuous,
            &mut self.discrete,
        ]
        .into_iter()
        .flatten()
        {
            file.flush()?;
        }
        Ok(())
    }
}

fn write(slot: &mut Option<TraceFile>, args: fmt::Arguments<'_>) -> EngineResult<()> {
    match slot {
        Some(file) => file.line(args),
        None => Ok(()),
    }
}
