//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use dynsim::config::StudyConfig;

/// Directory holding the bundled Nordic case.
pub const NORDIC_CASE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/cases/nordic");

/// Copies the Nordic case inputs into a fresh temporary directory.
pub fn nordic_workspace() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    copy_inputs(Path::new(NORDIC_CASE), dir.path());
    dir
}

/// Copies every regular input file (no run artifacts) from `from` to `to`.
pub fn copy_inputs(from: &Path, to: &Path) {
    for entry in fs::read_dir(from).expect("read case dir") {
        let path = entry.expect("dir entry").path();
        let artifact = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("trace" | "trj")
        );
        if path.is_file() && !artifact {
            let name = path.file_name().expect("file name");
            fs::copy(&path, to.join(name)).expect("copy case file");
        }
    }
}

/// A preset study pointed at `workdir`.
pub fn preset_in(name: &str, workdir: &Path) -> StudyConfig {
    let mut study = StudyConfig::from_preset(name).expect("known preset");
    study.workdir = workdir.to_path_buf();
    study
}

/// The generator-trip study pointed at `workdir`.
pub fn nordic_study(workdir: &Path) -> StudyConfig {
    preset_in("nordic", workdir)
}
