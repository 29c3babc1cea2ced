use std::env;
use std::path::PathBuf;

/// Default plot size in terminal cells.
pub const DEFAULT_PLOT_WIDTH: u16 = 80;
pub const DEFAULT_PLOT_HEIGHT: u16 = 20;

#[cfg(feature = "api")]
pub const DEFAULT_PORT: u16 = 3000;

/// Parsed command-line options.
#[derive(Debug)]
pub struct CliOptions {
    pub study: Option<PathBuf>,
    pub preset: Option<String>,
    pub workdir: Option<PathBuf>,
    pub end_time: Option<f64>,
    pub series_out: Option<PathBuf>,
    pub show_log: bool,
    pub plot_width: u16,
    pub plot_height: u16,
    pub help: bool,
    #[cfg(feature = "tui")]
    pub tui: bool,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub port: u16,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

/// Parses `args` (without the program name).
///
/// # Errors
///
/// Returns a message for unknown flags, missing or malformed values, and
/// conflicting sources.
pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut opts = CliOptions {
        study: None,
        preset: None,
        workdir: None,
        end_time: None,
        series_out: None,
        show_log: false,
        plot_width: DEFAULT_PLOT_WIDTH,
        plot_height: DEFAULT_PLOT_HEIGHT,
        help: false,
        #[cfg(feature = "tui")]
        tui: false,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: DEFAULT_PORT,
    };

    while i < args.len() {
        match args[i].as_str() {
            "--study" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --study (expected a TOML file path)")?;
                if opts.study.replace(PathBuf::from(path)).is_some() {
                    return Err("--study provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name =
                    args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--workdir" => {
                i += 1;
                let dir =
                    args.next_or_err(i, "missing value for --workdir (expected a directory)")?;
                opts.workdir = Some(PathBuf::from(dir));
            }
            "--end-time" => {
                i += 1;
                let value =
                    args.next_or_err(i, "missing value for --end-time (expected seconds)")?;
                let t: f64 = value
                    .parse()
                    .map_err(|_| format!("--end-time value \"{value}\" is not a number"))?;
                opts.end_time = Some(t);
            }
            "--series-out" => {
                i += 1;
                let dir =
                    args.next_or_err(i, "missing value for --series-out (expected a directory)")?;
                opts.series_out = Some(PathBuf::from(dir));
            }
            "--show-log" => opts.show_log = true,
            "--plot-width" => {
                i += 1;
                opts.plot_width = parse_cells(&args, i, "--plot-width")?;
            }
            "--plot-height" => {
                i += 1;
                opts.plot_height = parse_cells(&args, i, "--plot-height")?;
            }
            #[cfg(feature = "tui")]
            "--tui" => opts.tui = true,
            #[cfg(feature = "api")]
            "--serve" => opts.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                opts.port = value
                    .parse()
                    .map_err(|_| format!("--port value \"{value}\" is not a valid u16"))?;
            }
            "--help" | "-h" => opts.help = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.study.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--study` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if opts.study.is_none() && opts.preset.is_none() {
        opts.preset = Some("nordic".to_string());
    }

    Ok(opts)
}

fn parse_cells(args: &[String], index: usize, flag: &str) -> Result<u16, String> {
    let value = args.next_or_err(index, &format!("missing value for {flag} (expected cells)"))?;
    match value.parse::<u16>() {
        Ok(n) if n >= 10 => Ok(n),
        _ => Err(format!("{flag} value \"{value}\" must be an integer >= 10")),
    }
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("dynsim: drive a time-domain dynamic simulation study");
    eprintln!();
    eprintln!("Usage: dynsim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --study <path>           Load study from TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (nordic, nordic_load_step)");
    eprintln!("  --workdir <dir>          Override the study working directory");
    eprintln!("  --end-time <s>           Override the final simulated time");
    eprintln!("  --series-out <dir>       Export each plotted series to CSV");
    eprintln!("  --show-log               Print the engine output log after the run");
    eprintln!("  --plot-width <n>         Plot width in cells (default: {DEFAULT_PLOT_WIDTH})");
    eprintln!("  --plot-height <n>        Plot height in cells (default: {DEFAULT_PLOT_HEIGHT})");
    #[cfg(feature = "tui")]
    eprintln!("  --tui                    Browse the plots in an interactive viewer");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after the run");
        eprintln!("  --port <u16>             API server port (default: {DEFAULT_PORT})");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --study or --preset is given, the nordic preset is used.");
    eprintln!("Set RUST_LOG to change log verbosity (default: info).");
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_nordic_preset() {
        let opts = parse_args_from(Vec::new()).expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("nordic"));
        assert!(opts.study.is_none());
        assert_eq!(opts.plot_width, 80);
        assert!(!opts.show_log);
    }

    #[test]
    fn supports_study_cli() {
        let opts = parse_args_from(args(&["--study", "study.toml"])).expect("parse should succeed");
        assert_eq!(
            opts.study.as_deref().and_then(|p| p.to_str()),
            Some("study.toml")
        );
        assert!(opts.preset.is_none());
    }

    #[test]
    fn supports_overrides() {
        let opts = parse_args_from(args(&[
            "--preset",
            "nordic_load_step",
            "--workdir",
            "/tmp/run",
            "--end-time",
            "30",
            "--series-out",
            "out",
            "--show-log",
            "--plot-height",
            "12",
        ]))
        .expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("nordic_load_step"));
        assert_eq!(opts.end_time, Some(30.0));
        assert_eq!(opts.plot_height, 12);
        assert!(opts.show_log);
        assert!(opts.series_out.is_some());
        assert!(opts.workdir.is_some());
    }

    #[test]
    fn study_and_preset_conflict() {
        let err = parse_args_from(args(&["--study", "a.toml", "--preset", "nordic"]));
        assert!(err.is_err_and(|e| e.contains("mutually exclusive")));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_args_from(args(&["--end-time", "soon"])).is_err());
        assert!(parse_args_from(args(&["--plot-width", "3"])).is_err());
        assert!(parse_args_from(args(&["--study"])).is_err());
        assert!(parse_args_from(args(&["--frobnicate"])).is_err());
    }

    #[test]
    fn help_flag_is_reported() {
        let opts = parse_args_from(args(&["-h"])).expect("parse should succeed");
        assert!(opts.help);
    }
}
