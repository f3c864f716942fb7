//! Process lookup through `/proc`

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Clock ticks per second on every Linux architecture except alpha and ia64
const CLK_TCK: f64 = 100.0;

/// Errors reading process information
#[derive(Debug, Error)]
pub enum ProcError {
    #[error("failed to read process information: {0}")]
    Io(#[from] io::Error),

    #[error("invalid proc stat format: {0}")]
    Format(&'static str),

    #[error("invalid value for {field}: {value:?}")]
    Field { field: &'static str, value: String },
}

/// PIDs of processes whose executable name is `name`.
///
/// Matches the basename of `argv[0]` first, then the target of the `exe`
/// link. Processes that vanish or cannot be inspected are skipped.
pub fn pid_of(name: &str) -> Vec<u32> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut pids = Vec::new();
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };

        let dir = entry.path();
        if let Ok(cmdline) = fs::read(dir.join("cmdline")) {
            let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
            if basename(&String::from_utf8_lossy(argv0)) == name {
                pids.push(pid);
                continue;
            }
        }

        if let Ok(exe) = fs::read_link(dir.join("exe")) {
            if exe.file_name().is_some_and(|n| n == name) {
                pids.push(pid);
            }
        }
    }
    pids
}

/// Command line of `pid`
pub fn args_of(pid: u32) -> Result<Vec<String>, ProcError> {
    let buf = fs::read(format!("/proc/{pid}/cmdline"))?;
    let buf = buf.strip_suffix(&[0]).unwrap_or(&buf);
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    Ok(buf
        .split(|b| *b == 0)
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect())
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Parsed `/proc/<pid>/stat` record, see proc(5)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcState {
    pub pid: i32,
    /// Executable name, may contain spaces
    pub comm: String,
    /// `R`, `S`, `D`, `Z`, `T`, `t`, `W`, ...
    pub state: char,
    pub ppid: i32,
    pub pgrp: i32,
    pub session: i32,
    pub tty_nr: i32,
    pub tpgid: i32,
    pub flags: u32,
    pub minflt: u64,
    pub cminflt: u64,
    pub majflt: u64,
    pub cmajflt: u64,
    pub utime: u64,
    pub stime: u64,
    pub cutime: i64,
    pub cstime: i64,
    pub priority: i64,
    /// 19 (low priority) to -20 (high priority)
    pub nice: i64,
    pub num_threads: i64,
    pub itrealvalue: i64,
    /// Start time after boot, in clock ticks
    pub starttime: u64,
    pub vsize: u64,
    pub rss: i64,
    pub rsslim: u64,
}

impl ProcState {
    pub fn is_running(&self) -> bool {
        self.state == 'R'
    }

    /// Wall-clock time the process started
    pub fn started(&self) -> Result<DateTime<Utc>, ProcError> {
        let uptime = fs::read_to_string("/proc/uptime")?;
        let uptime: f64 = uptime
            .split_whitespace()
            .next()
            .ok_or(ProcError::Format("empty /proc/uptime"))?
            .parse()
            .map_err(|_| ProcError::Field {
                field: "uptime",
                value: uptime.clone(),
            })?;

        let age = uptime - self.starttime as f64 / CLK_TCK;
        if age < 0.0 {
            return Err(ProcError::Format("process started after current uptime"));
        }

        Ok(Utc::now() - Duration::milliseconds((age * 1000.0) as i64))
    }
}

impl FromStr for ProcState {
    type Err = ProcError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let open = data.find('(').ok_or(ProcError::Format("missing comm"))?;
        let close = data.rfind(')').ok_or(ProcError::Format("unterminated comm"))?;
        if close < open {
            return Err(ProcError::Format("unterminated comm"));
        }

        let pid = parse_field("pid", data[..open].trim())?;
        let comm = data[open + 1..close].to_string();

        let mut fields = data[close + 1..].split_whitespace();
        let mut next = |field: &'static str| {
            fields
                .next()
                .ok_or(ProcError::Format("not enough fields"))
                .map(|value| (field, value))
        };

        let state = {
            let (field, value) = next("state")?;
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(ProcError::Field {
                        field,
                        value: value.to_string(),
                    })
                }
            }
        };

        macro_rules! field {
            ($name:literal) => {{
                let (field, value) = next($name)?;
                parse_field(field, value)?
            }};
        }

        Ok(ProcState {
            pid,
            comm,
            state,
            ppid: field!("ppid"),
            pgrp: field!("pgrp"),
            session: field!("session"),
            tty_nr: field!("tty_nr"),
            tpgid: field!("tpgid"),
            flags: field!("flags"),
            minflt: field!("minflt"),
            cminflt: field!("cminflt"),
            majflt: field!("majflt"),
            cmajflt: field!("cmajflt"),
            utime: field!("utime"),
            stime: field!("stime"),
            cutime: field!("cutime"),
            cstime: field!("cstime"),
            priority: field!("priority"),
            nice: field!("nice"),
            num_threads: field!("num_threads"),
            itrealvalue: field!("itrealvalue"),
            starttime: field!("starttime"),
            vsize: field!("vsize"),
            rss: field!("rss"),
            rsslim: field!("rsslim"),
        })
    }
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, ProcError> {
    value.parse().map_err(|_| ProcError::Field {
        field,
        value: value.to_string(),
    })
}

/// Current state of `pid`
pub fn pid_state(pid: u32) -> Result<ProcState, ProcError> {
    fs::read_to_string(format!("/proc/{pid}/stat"))?.parse()
}
