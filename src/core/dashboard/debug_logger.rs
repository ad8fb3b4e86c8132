//! JSON-lines debug log for the console
//!
//! Disabled unless `OMNIPING_DEBUG` is truthy. Entries go to
//! `~/.omniping/omniping-debug.log` (or `OMNIPING_DEBUG_LOG`), one JSON object
//! per line. The file is gzip-archived once it grows past the size limit;
//! console instances sharing the file coordinate archiving through a lock file.

use std::collections::HashMap;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Local;
use flate2::{write::GzEncoder, Compression};
use fs2::FileExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Environment switch for the debug log
pub const DEBUG_ENV_VAR: &str = "OMNIPING_DEBUG";
/// Override for the debug log location
pub const DEBUG_LOG_ENV_VAR: &str = "OMNIPING_DEBUG_LOG";

/// Secrets that can reach the log: URL userinfo in request URLs and
/// credentials echoed back in engine messages
const SECRET_PATTERNS: [(&str, &str); 3] = [
    (r"(://)[^/\s@]+@", "${1}[REDACTED]@"),
    (r"(?i)password[:=\s]+\S+", "[REDACTED]"),
    (r"(?i)token[:=\s]+\S+", "[REDACTED]"),
];

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LogEntry {
    /// RFC 3339, local timezone
    pub timestamp: String,
    /// DEBUG, ERROR, REQUEST, STATE or TIMER
    pub level: String,
    pub component: String,
    pub event: String,
    pub message: String,
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy)]
struct ArchivePolicy {
    max_bytes: u64,
    keep: usize,
    /// Size is only checked on every n-th write
    check_every: u32,
}

const ARCHIVE_POLICY: ArchivePolicy = ArchivePolicy {
    max_bytes: 8 * 1024 * 1024,
    keep: 5,
    check_every: 200,
};

/// Append-only log file with size-based gzip archiving
struct LogFile {
    path: PathBuf,
    writes: AtomicU32,
    policy: ArchivePolicy,
}

impl LogFile {
    fn open(path: PathBuf, policy: ArchivePolicy) -> Self {
        if let Some(dir) = path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        Self {
            path,
            writes: AtomicU32::new(0),
            policy,
        }
    }

    fn append(&self, line: &str) -> io::Result<()> {
        let n = self.writes.fetch_add(1, Ordering::Relaxed);
        if n % self.policy.check_every == 0 {
            // Archiving problems never block the write itself
            let _ = self.archive_if_oversized();
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    fn oversized(&self) -> io::Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() >= self.policy.max_bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn archive_if_oversized(&self) -> io::Result<()> {
        if !self.oversized()? {
            return Ok(());
        }

        let lock_path = self.path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        // Someone else holds the lock and is archiving
        if lock.try_lock_exclusive().is_err() {
            return Ok(());
        }

        let result = if self.oversized()? {
            self.archive()
        } else {
            Ok(())
        };
        let _ = fs::remove_file(&lock_path);
        result
    }

    fn dir_and_stem(&self) -> io::Result<(&Path, &str)> {
        let bad_path = || io::Error::new(io::ErrorKind::InvalidInput, "invalid log path");
        let dir = self.path.parent().ok_or_else(bad_path)?;
        let stem = self
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(bad_path)?;
        Ok((dir, stem))
    }

    fn archive(&self) -> io::Result<()> {
        let (dir, stem) = self.dir_and_stem()?;
        let archive_path = dir.join(format!(
            "{}.{}.gz",
            stem,
            Local::now().format("%Y%m%d_%H%M%S")
        ));

        // Move the live file aside first so new writes start a fresh log
        let staged = self.path.with_extension("archiving");
        fs::rename(&self.path, &staged)?;

        let mut gz = GzEncoder::new(File::create(&archive_path)?, Compression::default());
        io::copy(&mut BufReader::new(File::open(&staged)?), &mut gz)?;
        gz.finish()?;
        fs::remove_file(&staged)?;

        let _ = self.prune_archives();
        Ok(())
    }

    fn prune_archives(&self) -> io::Result<()> {
        let (dir, stem) = self.dir_and_stem()?;
        let prefix = format!("{}.", stem);

        let mut archives = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(&prefix) && name.ends_with(".gz")
            })
            .filter_map(|entry| {
                let modified = entry.metadata().and_then(|meta| meta.modified()).ok()?;
                Some((modified, entry.path()))
            })
            .collect::<Vec<_>>();

        if archives.len() <= self.policy.keep {
            return Ok(());
        }

        archives.sort();
        let excess = archives.len() - self.policy.keep;
        for (_, path) in archives.into_iter().take(excess) {
            let _ = fs::remove_file(path);
        }
        Ok(())
    }
}

/// Structured debug logger shared by the gateway, controller and codec
pub struct DebugLogger {
    file: Option<Arc<Mutex<LogFile>>>,
    session_id: String,
    secrets: Vec<(Regex, &'static str)>,
}

impl DebugLogger {
    /// Logger configured from the environment
    pub fn new() -> Self {
        Self::build(Self::env_enabled().then(Self::env_log_path))
    }

    /// Logger that always writes to `log_path`
    pub fn with_path(log_path: PathBuf) -> Self {
        Self::build(Some(log_path))
    }

    fn build(log_path: Option<PathBuf>) -> Self {
        Self {
            file: log_path.map(|path| Arc::new(Mutex::new(LogFile::open(path, ARCHIVE_POLICY)))),
            session_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            secrets: SECRET_PATTERNS
                .iter()
                .filter_map(|(pattern, replacement)| {
                    Regex::new(pattern).ok().map(|regex| (regex, *replacement))
                })
                .collect(),
        }
    }

    /// Accepts true/1/yes/on in any case
    fn env_enabled() -> bool {
        env::var(DEBUG_ENV_VAR)
            .map(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "true" | "1" | "yes" | "on"
                )
            })
            .unwrap_or(false)
    }

    fn env_log_path() -> PathBuf {
        match env::var(DEBUG_LOG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".omniping")
                .join("omniping-debug.log"),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn redact_sensitive_data(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, (secret, replacement)| {
                secret.replace_all(&acc, *replacement).into_owned()
            })
    }

    fn write(
        &self,
        level: &str,
        component: &str,
        event: &str,
        message: &str,
        correlation_id: Option<String>,
        fields: HashMap<String, Value>,
    ) {
        let Some(file) = &self.file else {
            return;
        };

        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339(),
            level: level.to_string(),
            component: component.to_string(),
            event: event.to_string(),
            message: self.redact_sensitive_data(message),
            correlation_id: correlation_id.or_else(|| Some(self.session_id.clone())),
            fields,
        };

        let Ok(line) = serde_json::to_string(&entry) else {
            return;
        };
        if let Ok(file) = file.lock() {
            let _ = file.append(&line);
        }
    }

    pub fn debug(&self, component: &str, event: &str, message: &str) {
        self.write("DEBUG", component, event, message, None, HashMap::new());
    }

    pub fn error(&self, component: &str, event: &str, message: &str) {
        self.write("ERROR", component, event, message, None, HashMap::new());
    }

    pub fn request_start(&self, verb: &str, url: &str, correlation_id: String) {
        self.write(
            "REQUEST",
            "ApiGateway",
            "request_start",
            &format!("{} {}", verb, url),
            Some(correlation_id),
            fields([("verb", verb.into()), ("url", url.into())]),
        );
    }

    /// `status_code` is `None` when no response arrived
    pub fn request_end(
        &self,
        verb: &str,
        url: &str,
        status_code: Option<u16>,
        duration_ms: u64,
        correlation_id: String,
    ) {
        let mut entry_fields = fields([
            ("verb", verb.into()),
            ("url", url.into()),
            ("duration_ms", duration_ms.into()),
        ]);
        let outcome = match status_code {
            Some(code) => {
                entry_fields.insert("status_code".to_string(), code.into());
                code.to_string()
            }
            None => "no response".to_string(),
        };

        self.write(
            "REQUEST",
            "ApiGateway",
            "request_end",
            &format!("{} {} -> {} ({}ms)", verb, url, outcome, duration_ms),
            Some(correlation_id),
            entry_fields,
        );
    }

    pub fn indicator_change(&self, indicator: &str, state: &str) {
        self.write(
            "STATE",
            "PollingController",
            "indicator_change",
            &format!("{} indicator -> {}", indicator, state),
            None,
            fields([("indicator", indicator.into()), ("state", state.into())]),
        );
    }

    pub fn timer_event(&self, event: &str, interval_ms: u64) {
        self.write(
            "TIMER",
            "PollingController",
            event,
            &format!("auto-refresh {} ({}ms)", event, interval_ms),
            None,
            fields([("interval_ms", interval_ms.into())]),
        );
    }

    pub fn codec_summary(&self, records: usize, dropped_lines: usize) {
        self.write(
            "DEBUG",
            "TestConfigCodec",
            "decode_summary",
            &format!("decoded {} tests, dropped {} lines", records, dropped_lines),
            None,
            fields([
                ("records", records.into()),
                ("dropped_lines", dropped_lines.into()),
            ]),
        );
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> HashMap<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

pub fn get_debug_logger() -> DebugLogger {
    DebugLogger::new()
}
