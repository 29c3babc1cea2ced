//! CSV export for extracted time series.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::extract::TimeSeries;

/// File name for a series, e.g. `sync_g5_S.csv`.
pub fn file_name(series: &TimeSeries) -> String {
    let channel = series.channel();
    format!(
        "{}_{}_{}.csv",
        channel.group(),
        channel.component,
        channel.signal.code()
    )
}

/// Writes each series to its own CSV file under `dir`, creating `dir` if needed.
///
/// # Arguments
///
/// * `series` - Series to export
/// * `dir` - Output directory
///
/// # Returns
///
/// Paths of the written files, in input order.
///
/// # Errors
///
/// Returns an `io::Error` if the directory or a file cannot be written.
pub fn export_series_dir(series: &[TimeSeries], dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(series.len());
    for s in series {
        let path = dir.join(file_name(s));
        let file = File::create(&path)?;
        write_series_csv(s, io::BufWriter::new(file))?;
        written.push(path);
    }
    Ok(written)
}

/// Writes one series as two-column CSV (`time,<channel>`) to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_series_csv(series: &TimeSeries, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(["time".to_string(), series.channel().to_string()])?;
    for &(t, v) in series.points() {
        wtr.write_record(&[format!("{t:.4}"), v.to_string()])?;
    }

    wtr.flush()?;
    Ok(())
}
