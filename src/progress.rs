//! Build progress reporting.
//!
//! Reports what `blog build` is doing: discovering posts, then encoding
//! them one by one. Progress goes to **stderr** so stdout stays parseable
//! for scripts.

use std::io::Write;

/// A single progress event for a build.
#[derive(Clone, Debug)]
pub enum BuildProgressEvent {
    /// Walking the content root. Total unknown.
    Discovering { root: String },
    /// Post `n` of `total` needs encoding and is being processed.
    Encoding {
        filename: String,
        title: String,
        n: u64,
        total: u64,
    },
    /// Artifact written.
    Written { path: String, posts: u64 },
}

/// Reports build progress.
pub trait BuildProgressReporter: Send + Sync {
    fn report(&self, event: BuildProgressEvent);
}

/// Human-friendly progress on stderr:
/// `build  encoding  3 / 12  async.md "Async Rust"`.
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = match &event {
            BuildProgressEvent::Discovering { root } => {
                format!("build  discovering posts in {}...\n", root)
            }
            BuildProgressEvent::Encoding {
                filename,
                title,
                n,
                total,
            } => format!(
                "build  encoding  {} / {}  {} \"{}\"\n",
                format_number(*n),
                format_number(*total),
                filename,
                title
            ),
            BuildProgressEvent::Written { path, posts } => {
                format!("build  wrote {} posts to {}\n", format_number(*posts), path)
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &BuildProgressEvent) -> serde_json::Value {
        match event {
            BuildProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root
            }),
            BuildProgressEvent::Encoding {
                filename,
                title,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "encoding",
                "filename": filename,
                "title": title,
                "n": n,
                "total": total
            }),
            BuildProgressEvent::Written { path, posts } => serde_json::json!({
                "event": "progress",
                "phase": "written",
                "path": path,
                "posts": posts
            }),
        }
    }
}

impl BuildProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
