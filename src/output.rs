// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::update::{TaskOutcome, UpdatePlanPreview, UpdateReport};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({elapsed:.1}s)");
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                println!("{message}");
            }
            OutputMode::Json => self.emit_stdout(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => self.emit_stderr(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => self.emit_stderr(&JsonEvent {
                event: "error",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print the per-container outcome of an update.
    pub fn report(&self, report: &UpdateReport) {
        match self.mode {
            OutputMode::Normal => {
                for task in &report.tasks {
                    let marker = match task.outcome {
                        TaskOutcome::Replaced => "✓",
                        TaskOutcome::Intact | TaskOutcome::RolledBack => "!",
                        TaskOutcome::RollbackFailed => "✗",
                    };
                    match &task.error {
                        Some(error) => println!("  {marker} {}: {} ({error})", task.container, task.outcome),
                        None => println!("  {marker} {}: {}", task.container, task.outcome),
                    }
                }
                println!(
                    "{} replaced, {} rolled back, {} rollback failed, {} untouched (of {})",
                    report.replaced(),
                    report.rolled_back(),
                    report.rollback_failed(),
                    report.intact(),
                    report.total()
                );
            }
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit_stdout(&JsonReport {
                event: "report",
                report,
            }),
        }
    }

    /// Print what an update would replace.
    pub fn plan(&self, plan: &UpdatePlanPreview) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                println!("{} ({})", plan.tag, plan.old_image.short());
                for container in plan.containers.iter() {
                    println!(
                        "  {} {} [{:?}]",
                        container.id.short(),
                        container.display_name(),
                        container.state
                    );
                }
            }
            OutputMode::Json => self.emit_stdout(&JsonReport {
                event: "plan",
                report: plan,
            }),
        }
    }

    fn emit_stdout<T: Serialize>(&self, event: &T) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }

    fn emit_stderr<T: Serialize>(&self, event: &T) {
        if let Ok(json) = serde_json::to_string(event) {
            eprintln!("{json}");
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct JsonReport<'a, T> {
    event: &'a str,
    #[serde(flatten)]
    report: &'a T,
}
