use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use gumdrop::{Options, ParsingStyle};
use thiserror::Error;

use crate::{
    collector::CollectorKind,
    config::Config,
    filter::{command_regex, Filters},
};

#[derive(Options, Debug, Default)]
pub struct Args {
    #[options(help = "Print help message")]
    pub help: bool,

    #[options(short = "w", help = "Update until interrupted")]
    watch: bool,

    #[options(short = "n", help = "Seconds to wait between updates", meta = "SECONDS")]
    interval: Option<f64>,

    #[options(
        short = "a",
        help = "Prepend arguments loaded from a json array file",
        meta = "JSON_FILE"
    )]
    args_file: Option<PathBuf>,

    #[options(short = "u", help = "Only show subtrees with this user", meta = "USERNAME")]
    user: Vec<String>,

    #[options(short = "U", help = "Hide processes of this user", meta = "USERNAME")]
    not_user: Vec<String>,

    #[options(short = "P", help = "Hide the subtree of this pid, -1 is pstree itself", meta = "PID")]
    not_pid: Vec<i64>,

    #[options(short = "c", help = "Only show commands starting with a match", meta = "REGEX")]
    command: Vec<String>,

    #[options(short = "C", help = "Hide commands starting with a match", meta = "REGEX")]
    not_command: Vec<String>,

    #[options(short = "s", help = "Process source: ps or sysinfo", meta = "SOURCE")]
    collector: Option<CollectorKind>,

    #[options(short = "i", help = "Columns per tree level", meta = "N")]
    indent: Option<usize>,

    #[options(short = "t", help = "Show process start times")]
    started: bool,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct UsageError(String);

/// Validated command line, merged with the config file.
#[derive(Debug)]
pub struct Settings {
    pub watch: bool,
    pub interval: Duration,
    pub collector: CollectorKind,
    pub indent: usize,
    pub show_started: bool,
    pub filters: Filters,
}

/// Parses `argv` (without the program name), expanding `--args-file` once.
pub fn parse_args(argv: &[String]) -> Result<Args, UsageError> {
    let args = parse_once(argv)?;
    let Some(path) = &args.args_file else {
        return Ok(args);
    };

    let prepend = load_args_file(path)?;
    log::debug!("prepending {prepend:?} from {}", path.display());
    let combined: Vec<String> = prepend.into_iter().chain(argv.iter().cloned()).collect();
    //second pass does not look at args_file again
    parse_once(&combined)
}

fn parse_once(argv: &[String]) -> Result<Args, UsageError> {
    Args::parse_args(argv, ParsingStyle::AllOptions).map_err(|e| UsageError(e.to_string()))
}

fn load_args_file(path: &Path) -> Result<Vec<String>, UsageError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| UsageError(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&contents).map_err(|e| {
        UsageError(format!(
            "{} must hold a json array of strings: {e}",
            path.display()
        ))
    })
}

pub fn usage() -> String {
    format!("Usage: pstree [OPTIONS]\n\n{}", Args::usage())
}

impl Args {
    pub fn into_settings(self, config: &Config) -> Result<Settings, UsageError> {
        let interval = self.interval.unwrap_or(config.interval);
        if !interval.is_finite() || interval <= 0.0 {
            return Err(UsageError(format!("interval must be positive, got {interval}")));
        }
        let indent = self.indent.unwrap_or(config.indent);
        if indent < 1 {
            return Err(UsageError("indent must be at least 1".to_string()));
        }

        let include_users: HashSet<String> = self.user.into_iter().collect();
        let exclude_users: HashSet<String> = self.not_user.into_iter().collect();
        if let Some(user) = include_users.intersection(&exclude_users).next() {
            return Err(UsageError(format!(
                "user {user:?} is both included and excluded"
            )));
        }

        let own_pid = std::process::id() as i64;
        let filters = Filters {
            exclude_pids: self
                .not_pid
                .into_iter()
                .map(|pid| if pid == -1 { own_pid } else { pid })
                .collect(),
            include_users,
            exclude_users,
            include_commands: compile(&self.command)?,
            exclude_commands: compile(&self.not_command)?,
        };

        Ok(Settings {
            watch: self.watch,
            interval: Duration::from_secs_f64(interval),
            collector: self.collector.unwrap_or(config.collector),
            indent,
            show_started: self.started || config.show_started,
            filters,
        })
    }
}

fn compile(patterns: &[String]) -> Result<Vec<regex::Regex>, UsageError> {
    patterns
        .iter()
        .map(|p| command_regex(p).map_err(|e| UsageError(format!("bad regex {p:?}: {e}"))))
        .collect()
}
