//! Terminal reporting for fill sessions

use console::{style, Style, Term};
use formwright::{ExecutionLog, LogEntry};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Status lines, operator waits and the final fill log
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    fn stamp() -> String {
        chrono::Local::now().format("%H:%M:%S").to_string()
    }

    fn line(&self, prefix: String, message: &str) {
        let stamp = if self.use_color {
            style(Self::stamp()).dim().to_string()
        } else {
            Self::stamp()
        };
        let _ = self.term.write_line(&format!("{stamp} {prefix} {message}"));
    }

    /// Spin while the operator does something in the browser
    pub fn start_wait(&mut self, message: &str) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(message.to_string());
        self.spinner = Some(pb);
    }

    /// Stop the wait spinner and report how long it took
    pub fn finish_wait(&mut self, message: &str, waited: Duration) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        self.success(&format!("{message} ({:.1}s)", waited.as_secs_f64()));
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        self.line(prefix, message);
    }

    /// Printed even in quiet mode
    pub fn failure(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "ERR".to_string()
        };
        self.line(prefix, message);
    }

    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        self.line(prefix, message);
    }

    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        self.line(prefix, message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print every log entry; failures are always shown
    pub fn log(&self, log: &ExecutionLog) {
        for entry in log {
            if entry.is_failure() {
                self.failure(&entry.to_string());
            } else if !self.quiet {
                let _ = self.term.write_line(&self.render_entry(entry));
            }
        }
    }

    fn render_entry(&self, entry: &LogEntry) -> String {
        let text = entry.to_string();
        if !self.use_color {
            return text;
        }
        match entry {
            LogEntry::Filled { .. } => style(text).green().to_string(),
            LogEntry::TabSwitch { .. } => style(text).cyan().to_string(),
            LogEntry::TabUnavailable { .. } => style(text).yellow().to_string(),
            _ => text,
        }
    }

    /// Print the fill summary
    pub fn summary(&self, log: &ExecutionLog, duration: Duration) {
        let failed = log.failures().len();
        if self.quiet && failed == 0 {
            return;
        }
        let filled = log.filled_count();
        let secs = duration.as_secs_f64();
        let _ = self.term.write_line("");
        if self.use_color {
            let ok = Style::new().green().bold();
            let bad = Style::new().red().bold();
            let status = if failed > 0 {
                bad.apply_to("INCOMPLETE")
            } else {
                ok.apply_to("FILLED")
            };
            let _ = self.term.write_line(&format!(
                "{status} {} fields filled, {} failed in {secs:.2}s",
                ok.apply_to(filled),
                if failed > 0 {
                    bad.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
            ));
        } else {
            let status = if failed > 0 { "INCOMPLETE" } else { "FILLED" };
            let _ = self.term.write_line(&format!(
                "{status} {filled} fields filled, {failed} failed in {secs:.2}s"
            ));
        }
    }
}
