use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

const SEPARATOR: &str = "-----------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => f.write_str("text"),
            ReportFormat::Json => f.write_str("json"),
        }
    }
}

/// Timing for one batch against one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchReport {
    pub backend: String,
    pub total: u64,
    pub concurrency: usize,
    pub elapsed: Duration,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    backend: &'a str,
    total: u64,
    concurrency: usize,
    elapsed_secs: f64,
    inserts_per_sec: u64,
}

impl BenchReport {
    pub fn new(backend: impl Into<String>, total: u64, concurrency: usize, elapsed: Duration) -> Self {
        Self {
            backend: backend.into(),
            total,
            concurrency,
            elapsed,
        }
    }

    /// Whole inserts per second, truncated. Zero when no time elapsed.
    pub fn inserts_per_sec(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0;
        }
        (self.total as f64 / secs) as u64
    }

    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.to_string(),
            ReportFormat::Json => {
                let line = JsonReport {
                    backend: &self.backend,
                    total: self.total,
                    concurrency: self.concurrency,
                    elapsed_secs: self.elapsed.as_secs_f64(),
                    inserts_per_sec: self.inserts_per_sec(),
                };
                // Serializing plain numbers and a string cannot fail
                serde_json::to_string(&line).unwrap_or_default()
            }
        }
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} users insert at the same time:", self.total)?;
        writeln!(f, "Total time: {}", format_elapsed(self.elapsed))?;
        writeln!(f, "Inserts/sec: {}", self.inserts_per_sec())?;
        write!(f, "{}", SEPARATOR)
    }
}

/// `hh:mm:ss.fffffff`, with the fraction in 100ns ticks.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let ticks = elapsed.subsec_nanos() / 100;
    format!(
        "{:02}:{:02}:{:02}.{:07}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ticks
    )
}
