//! Per-run log for classification jobs. Each launch truncates the file, so
//! it holds one run: the maps loaded, merge and analysis counts, applies,
//! and any per-map failure.
//!
//! Log location:
//!   Windows:  `%APPDATA%\MapLegend\maplegend.log`
//!   Linux:    `~/.local/share/MapLegend/maplegend.log`
//!   macOS:    `~/Library/Application Support/MapLegend/maplegend.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the crate.
//! Before [`init`] is called (library use, tests) every write is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static MIRROR_STDERR: AtomicBool = AtomicBool::new(false);

/// Returns the path to the current log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Also echo every logged line to stderr (`--verbose`).
pub fn set_verbose(on: bool) {
    MIRROR_STDERR.store(on, Ordering::Relaxed);
}

/// Write a line to the log. I/O errors are ignored.
pub fn write_line(line: &str) {
    if MIRROR_STDERR.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

fn format_line(ts: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level.tag(), msg)
}

/// Write a timestamped, level-tagged line to the log.
pub fn write(level: Level, msg: &str) {
    write_line(&format_line(&timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    };
}

/// Open the run log and hook panics into it. Call once from `main`.
pub fn init() {
    let path = log_file_path();

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            // Not fatal, the run continues without a log file
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!(
        "=== MapLegend {} run started {} (pid {}) ===",
        env!("CARGO_PKG_VERSION"),
        human_timestamp(),
        std::process::id()
    ));
    write_line(&format!("Log file: {}", path.display()));

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    data_dir().join("MapLegend").join("maplegend.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS within the current UTC day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            let h = (secs % 86400) / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            format!("{:02}:{:02}:{:02}", h, m, s)
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.matches(':').count(), 2);
    }

    #[test]
    fn test_line_format() {
        assert_eq!(
            format_line("01:02:03", Level::Warn, "3 colour(s) unresolved"),
            "[01:02:03] [WARN] 3 colour(s) unresolved"
        );
        assert_eq!(Level::Error.tag(), "ERROR");
    }

    #[test]
    fn test_log_file_name() {
        let path = log_file_path();
        assert!(path.ends_with("MapLegend/maplegend.log"));
    }
}
