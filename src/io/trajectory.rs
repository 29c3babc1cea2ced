//! CSV trajectory artifact: one `time` column plus one column per channel.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::extract::signal::Channel;

/// Name of the first trajectory column.
pub const TIME_COLUMN: &str = "time";

/// Errors raised while reading or writing a trajectory file.
#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("cannot access trajectory \"{}\": {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("malformed trajectory: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed trajectory: {0}")]
    Format(String),
}

/// Column-oriented record of every observed channel over time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    channels: Vec<Channel>,
    times: Vec<f64>,
    /// One column per channel, each `times.len()` long.
    columns: Vec<Vec<f64>>,
}

impl Trajectory {
    /// Creates an empty trajectory recording `channels`.
    pub fn new(channels: Vec<Channel>) -> Self {
        let columns = vec![Vec::new(); channels.len()];
        Self {
            channels,
            times: Vec::new(),
            columns,
        }
    }

    /// Appends one sample row.
    ///
    /// # Panics
    ///
    /// Panics if `row` does not hold one value per channel.
    pub fn push(&mut self, time: f64, row: &[f64]) {
        assert_eq!(row.len(), self.channels.len(), "row width must match channels");
        self.times.push(time);
        for (column, &value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Values of the channel at `index`.
    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    /// Index of `channel`, if recorded.
    pub fn position(&self, channel: &Channel) -> Option<usize> {
        self.channels.iter().position(|c| c == channel)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Writes the trajectory to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns a `TrajectoryError` if the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<(), TrajectoryError> {
        let io_err = |source: io::Error| TrajectoryError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut buf = BufWriter::new(file);
        self.write_csv(&mut buf)?;
        buf.flush().map_err(io_err)
    }

    /// Writes the trajectory as CSV to any writer.
    ///
    /// # Errors
    ///
    /// Returns a `TrajectoryError` if writing fails.
    pub fn write_csv(&self, writer: impl Write) -> Result<(), TrajectoryError> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);

        let mut header = Vec::with_capacity(self.channels.len() + 1);
        header.push(TIME_COLUMN.to_string());
        header.extend(self.channels.iter().map(Channel::to_string));
        wtr.write_record(&header)?;

        let mut record = Vec::with_capacity(header.len());
        for (row, time) in self.times.iter().enumerate() {
            record.clear();
            record.push(time.to_string());
            record.extend(self.columns.iter().map(|c| c[row].to_string()));
            wtr.write_record(&record)?;
        }

        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Loads a trajectory previously written with [`Trajectory::save`].
    ///
    /// # Errors
    ///
    /// Returns a `TrajectoryError` if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self, TrajectoryError> {
        let file = File::open(path).map_err(|source| TrajectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read_csv(file)
    }

    /// Parses a CSV trajectory from any reader.
    ///
    /// # Errors
    ///
    /// Returns a `TrajectoryError` if the header or any value is malformed,
    /// or if time is not non-decreasing.
    pub fn read_csv(reader: impl Read) -> Result<Self, TrajectoryError> {
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
        let headers = rdr.headers()?.clone();

        let mut fields = headers.iter();
        if fields.next() != Some(TIME_COLUMN) {
            return Err(TrajectoryError::Format(format!(
                "first column must be \"{TIME_COLUMN}\""
            )));
        }
        let channels = fields
            .map(|h| h.parse::<Channel>().map_err(TrajectoryError::Format))
            .collect::<Result<Vec<_>, _>>()?;

        let mut trajectory = Trajectory::new(channels);
        let mut row = Vec::with_capacity(trajectory.channels.len());
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let mut values = record.iter().map(|v| {
                v.trim().parse::<f64>().map_err(|e| {
                    TrajectoryError::Format(format!("row {}: \"{v}\": {e}", line + 1))
                })
            });
            let time = values
                .next()
                .ok_or_else(|| TrajectoryError::Format(format!("row {} is empty", line + 1)))??;
            row.clear();
            for value in values {
                row.push(value?);
            }
            if row.len() != trajectory.channels.len() {
                return Err(TrajectoryError::Format(format!(
                    "row {} has {} values, expected {}",
                    line + 1,
                    row.len(),
                    trajectory.channels.len()
                )));
            }
            if trajectory.times.last().is_some_and(|&last| time < last) {
                return Err(TrajectoryError::Format(format!(
                    "row {}: time {time} goes backwards",
                    line + 1
                )));
            }
            trajectory.push(time, &row);
        }

        Ok(trajectory)
    }
}
