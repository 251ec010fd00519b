use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Full filter directives (e.g. `pupilnet_remote=trace`) that replace
/// `--log-level` when set.
pub const LOG_ENV: &str = "PUPILNET_LOG";

/// Crates whose events follow `--log-level`. Other targets stay at warn.
const OWN_CRATES: [&str; 4] = [
    "pupilnet",
    "pupilnet_remote",
    "pupilnet_transport",
    "pupilnet_codec",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Directives for `level`: this project's crates at `level`, everything
/// else at warn (or error when that is quieter).
pub fn filter_directives(level: LogLevel) -> String {
    let default = if level.as_filter() < LevelFilter::WARN {
        level
    } else {
        LogLevel::Warn
    };
    let mut directives = default.as_directive().to_string();
    for target in OWN_CRATES {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(level.as_directive());
    }
    directives
}

/// Install the stderr subscriber. Stdout is reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| filter_directives(level));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(directives))
        .with_ansi(false)
        .with_target(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
