use std::{
    process::{Command, ExitStatus, Stdio},
    str::FromStr,
};

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sysinfo::{System, Users};
use thiserror::Error;

use crate::{
    record::{printable, ProcessRecord},
    table::{encode_heading, split_columns},
};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to run ps: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ps exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("ps wrote to stderr: {0}")]
    UnexpectedStderr(String),
    #[error("unexpected ps output: {0}")]
    Shape(String),
}

/// The process table at one point in time.
pub struct Snapshot {
    pub records: Vec<ProcessRecord>,
    /// pid of the listing process itself, which is not part of the tree
    pub collector_pid: Option<i64>,
    pub taken_at: NaiveDateTime,
}

pub trait Collector {
    fn snapshot(&self) -> Result<Snapshot, CollectError>;
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    #[default]
    Ps,
    Sysinfo,
}

impl CollectorKind {
    pub fn build(self) -> Box<dyn Collector> {
        match self {
            CollectorKind::Ps => Box::new(PsCollector::new()),
            CollectorKind::Sysinfo => Box::new(SysinfoCollector),
        }
    }
}

impl FromStr for CollectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ps" => Ok(CollectorKind::Ps),
            "sysinfo" => Ok(CollectorKind::Sysinfo),
            other => Err(format!("unknown collector {other:?}, expected ps or sysinfo")),
        }
    }
}

/// Reads the process table through `ps`.
pub struct PsCollector {
    fields: Vec<&'static str>,
}

impl PsCollector {
    pub fn new() -> Self {
        let mut fields = vec!["pid", "ppid", "pgid", "user", "etime", "rss"];
        //no lstart on solaris
        if !cfg!(any(target_os = "solaris", target_os = "illumos")) {
            fields.push("lstart");
        }
        //args may contain spaces so it must be last
        fields.push("args");
        Self { fields }
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["-e".to_string()];
        args.extend(
            self.fields
                .iter()
                .map(|f| format!("-o{f}={}", encode_heading(f))),
        );
        args
    }
}

impl Collector for PsCollector {
    fn snapshot(&self) -> Result<Snapshot, CollectError> {
        let args = self.args();
        log::debug!("running ps {}", args.join(" "));

        let child = Command::new("ps")
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let ps_pid = child.id() as i64;
        let output = child.wait_with_output()?;
        let taken_at = Local::now().naive_local();

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(CollectError::Failed {
                status: output.status,
                stderr,
            });
        }
        if !stderr.is_empty() {
            return Err(CollectError::UnexpectedStderr(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = split_columns(&stdout)?
            .iter()
            .map(ProcessRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("ps listed {} processes", records.len());

        Ok(Snapshot {
            records,
            collector_pid: Some(ps_pid),
            taken_at,
        })
    }
}

/// Reads the process table through `sysinfo`, for hosts without a usable `ps`.
pub struct SysinfoCollector;

impl Collector for SysinfoCollector {
    fn snapshot(&self) -> Result<Snapshot, CollectError> {
        let mut system = System::new();
        system.refresh_all();
        let users = Users::new_with_refreshed_list();
        let taken_at = Local::now().naive_local();

        let mut procs: Vec<_> = system
            .processes()
            .values()
            .filter(|p| p.thread_kind() != Some(sysinfo::ThreadKind::Userland))
            .collect();
        procs.sort_by_key(|p| p.pid());

        let records = procs
            .into_iter()
            .map(|p| {
                let pid = p.pid().as_u32() as i64;
                let user = p
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|u| u.name().to_string())
                    .unwrap_or_default();
                let command = if p.cmd().is_empty() {
                    printable(&p.name().to_string_lossy())
                } else {
                    let argv = p
                        .cmd()
                        .iter()
                        .map(|a| a.to_string_lossy())
                        .collect::<Vec<_>>()
                        .join(" ");
                    printable(&argv)
                };
                ProcessRecord {
                    pid,
                    //no parent means a root, marked as its own parent
                    ppid: p.parent().map_or(pid, |pp| pp.as_u32() as i64),
                    pgid: None,
                    user,
                    elapsed: Some(std::time::Duration::from_secs(p.run_time())),
                    rss: (p.memory() / 1024).to_string(),
                    started: DateTime::from_timestamp(p.start_time() as i64, 0)
                        .map(|t| t.with_timezone(&Local).naive_local()),
                    command,
                }
            })
            .collect::<Vec<_>>();
        log::debug!("sysinfo listed {} processes", records.len());

        Ok(Snapshot {
            records,
            collector_pid: None,
            taken_at,
        })
    }
}
