//! dynsim entry point: CLI wiring, study loading, and result presentation.

use std::fs;
use std::process;

use tracing_subscriber::EnvFilter;

use dynsim::cli::{self, CliOptions};
use dynsim::config::StudyConfig;
use dynsim::io::export::export_series_dir;
use dynsim::reference::ReferenceEngine;
use dynsim::runner::{StudyReport, run_study};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the study named on the command line and applies overrides.
fn load_study(cli: &CliOptions) -> Result<(String, StudyConfig), String> {
    let (title, mut study) = if let Some(ref path) = cli.study {
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "study".to_string());
        let study = StudyConfig::from_toml_file(path).map_err(|e| e.to_string())?;
        (title, study)
    } else {
        let name = cli.preset.as_deref().unwrap_or("nordic");
        let study = StudyConfig::from_preset(name).map_err(|e| e.to_string())?;
        (name.to_string(), study)
    };

    if let Some(ref dir) = cli.workdir {
        study.workdir = dir.clone();
    }
    if let Some(t) = cli.end_time {
        study.run.end_time = t;
    }
    Ok((title, study))
}

fn print_report(title: &str, cli: &CliOptions, report: &StudyReport) {
    for path in &report.removed {
        eprintln!("removed {}", path.display());
    }

    println!("Study: {title}");
    println!("Simulated to t = {:.3} s", report.final_time);
    println!("Trajectory: {}", report.trajectory.display());

    for plot in &report.plots {
        println!();
        println!("{}", plot.series.label());
        print!("{}", plot.series.plot(cli.plot_width, cli.plot_height));
        println!("{}", plot.metrics);
    }

    if cli.show_log {
        match report.output_log {
            Some(ref path) => match fs::read_to_string(path) {
                Ok(text) => {
                    println!();
                    println!("--- {} ---", path.display());
                    print!("{text}");
                }
                Err(e) => eprintln!("warning: cannot read {}: {e}", path.display()),
            },
            None => eprintln!("warning: the case names no output log"),
        }
    }
}

fn main() {
    init_tracing();

    let cli = match cli::parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            cli::print_usage();
            process::exit(2);
        }
    };
    if cli.help {
        cli::print_usage();
        process::exit(0);
    }

    let (title, study) = match load_study(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let report = match run_study(&study, ReferenceEngine::new()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    print_report(&title, &cli, &report);

    if let Some(ref dir) = cli.series_out {
        let series: Vec<_> = report.plots.iter().map(|p| p.series.clone()).collect();
        match export_series_dir(&series, dir) {
            Ok(paths) => eprintln!("{} series written to {}", paths.len(), dir.display()),
            Err(e) => {
                eprintln!("error: failed to write series CSV: {e}");
                process::exit(1);
            }
        }
    }

    #[cfg(feature = "tui")]
    if cli.tui {
        if let Err(e) = dynsim::tui::run(&title, report.plots.clone()) {
            eprintln!("error: TUI failed: {e}");
            process::exit(1);
        }
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let metrics = report
            .plots
            .iter()
            .map(|p| (p.series.channel().clone(), p.metrics.clone()))
            .collect();
        let state = Arc::new(dynsim::api::AppState {
            final_time: report.final_time,
            extractor: report.extractor,
            metrics,
        });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                eprintln!("error: failed to create tokio runtime: {e}");
                process::exit(1);
            }
        };
        if let Err(e) = rt.block_on(dynsim::api::serve(state, addr)) {
            eprintln!("error: API server failed: {e}");
            process::exit(1);
        }
    }
}
