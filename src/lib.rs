//! Routing and multi-agent orchestration core for an AI tutoring backend.
//!
//! - `routing`: scores registered models per request and tracks their stats
//! - `tools`: tool registry with retry/backoff and usage accounting
//! - `agent_core`: sessions, intents, plans and the plan executor
//! - `config`: YAML configuration

pub mod agent_core;
pub mod config;
pub mod routing;
pub mod tools;

mod text;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Env var selecting the log line format (`json` or `text`).
pub const LOG_FORMAT_ENV_VAR: &str = "TUTOR_CORE_LOG_FORMAT";

/// Log files kept besides the current one.
const LOG_FILES_KEPT: u32 = 3;

/// Return the platform-standard data directory for the core.
///
/// - macOS: `~/Library/Application Support/tutor-core/`
/// - Windows: `{FOLDERID_RoamingAppData}\tutor-core\`
/// - Linux: `$XDG_DATA_HOME/tutor-core/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.tutor-core/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("tutor-core");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tutor-core")
}

/// Initialize the tracing subscriber.
///
/// With a `log_dir`, rotates `core.log` (keeping the last three) and writes a
/// fresh one through a line-flushing writer. Without one, logs go to stderr.
/// `RUST_LOG` overrides the default filter; `TUTOR_CORE_LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tutor_core=info,warn"));

    let (writer, log_path) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log dir {}", dir.display()))?;
            let log_path = dir.join("core.log");
            rotate_log_file(&log_path, LOG_FILES_KEPT);
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("failed to open {}", log_path.display()))?;
            (BoxMakeWriter::new(FlushingWriter::new(file)), Some(log_path))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = ?log_path.as_ref().map(|p| p.display().to_string()),
        pid = std::process::id(),
        "=== tutor-core starting ==="
    );
    Ok(())
}

/// Rotate log files: `core.log` → `core.log.1` → … → `.{keep}`.
///
/// The oldest file beyond `keep` is deleted. Gaps in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// File writer that flushes after every write, so a crash loses no lines.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
