//! Batch progress reporting.
//!
//! The generator emits a [`ProgressEvent`] as each edition starts and
//! finishes. Reporters decide how to show them: [`ConsoleProgress`] writes
//! human-readable lines, [`JsonProgress`] writes one JSON object per line,
//! and [`NullProgress`] drops everything.
//!
//! ```ignore
//! use layermint::generate::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::BatchStarted { requested: 10 });
//! ```

use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Events reported during batch generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A batch started
    BatchStarted {
        /// Editions asked for
        requested: usize,
    },
    /// Work on an edition began
    EditionStarted { edition: u64 },
    /// An edition was written and registered
    EditionCompleted {
        edition: u64,
        /// Artifact file name
        artifact: String,
        /// Samples drawn before one was accepted
        attempts: u32,
        duration_ms: u64,
    },
    /// The batch ended, successfully or not
    BatchCompleted {
        /// Whether every requested edition was produced
        success: bool,
        generated: usize,
        requested: usize,
        cancelled: bool,
        duration_ms: u64,
    },
    /// A non-fatal problem, e.g. a substituted layer
    Warning {
        #[serde(skip_serializing_if = "Option::is_none")]
        edition: Option<u64>,
        message: String,
    },
    /// The failure that stopped a batch
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        edition: Option<u64>,
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    /// Editions completed in the current batch
    current: AtomicUsize,
    /// Editions requested in the current batch
    total: AtomicUsize,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Reporter writing to stderr, colored when stderr is a terminal.
    pub fn new() -> Self {
        Self {
            use_colors: std::io::stderr().is_terminal(),
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { requested } => {
                self.total.store(requested, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if requested > 0 {
                    self.writeln(&format!(
                        "{} Generating {} edition{}...",
                        self.cyan("[generate]"),
                        requested,
                        if requested == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::EditionStarted { edition } => {
                if self.verbose {
                    self.writeln(&format!("{} Edition #{}...", self.cyan("[generate]"), edition));
                }
            }
            ProgressEvent::EditionCompleted { edition, artifact, attempts, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);
                let mut line = format!(
                    "{} [{}/{}] {} #{} -> {} ({})",
                    self.cyan("[generate]"),
                    current,
                    total,
                    self.green("ok"),
                    edition,
                    artifact,
                    format_duration(duration_ms)
                );
                if self.verbose && attempts > 1 {
                    line.push_str(&format!(", {} attempts", attempts));
                }
                self.writeln(&line);
            }
            ProgressEvent::BatchCompleted { success, generated, requested, cancelled, duration_ms } => {
                let duration = format_duration(duration_ms);
                if success {
                    self.writeln(&format!(
                        "\n{} {} edition{} generated in {}",
                        self.green("[done]"),
                        generated,
                        if generated == 1 { "" } else { "s" },
                        duration
                    ));
                } else if cancelled {
                    self.writeln(&format!(
                        "\n{} Cancelled after {} of {} editions ({})",
                        self.yellow("[stopped]"),
                        generated,
                        requested,
                        duration
                    ));
                } else {
                    self.writeln(&format!(
                        "\n{} Generation stopped: {} of {} editions completed in {}",
                        self.red("[error]"),
                        generated,
                        requested,
                        duration
                    ));
                }
            }
            ProgressEvent::Warning { edition, message } => {
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), edition_prefix(edition), message));
            }
            ProgressEvent::Error { edition, message } => {
                self.writeln(&format!("{} {}{}", self.red("[error]"), edition_prefix(edition), message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Line-delimited JSON reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Reporter writing to stdout.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stdout())) }
    }

    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let Ok(json) = serde_json::to_string(&event) else {
            return;
        };
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", json);
        }
    }
}

fn edition_prefix(edition: Option<u64>) -> String {
    match edition {
        Some(n) => format!("#{}: ", n),
        None => String::new(),
    }
}

/// Format a duration in milliseconds to a human-readable string.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}
