use crate::core::report::{JobReport, JobState, PassStatus, RecordOutcome, RecordStatus, SyncReport};
use crate::utils::format::format_datetime;
use colored::*;
use std::fmt::Write;

pub struct OutputStyle;

impl OutputStyle {
    pub fn title(text: &str) -> ColoredString {
        text.bright_blue().bold()
    }

    pub fn header(text: &str) -> ColoredString {
        text.bold()
    }

    pub fn label(text: &str) -> ColoredString {
        text.cyan()
    }

    pub fn success(text: &str) -> ColoredString {
        text.green()
    }

    pub fn error(text: &str) -> ColoredString {
        text.red()
    }

    pub fn warning(text: &str) -> ColoredString {
        text.yellow()
    }

    pub fn muted(text: &str) -> ColoredString {
        text.dimmed()
    }

    pub fn separator() -> String {
        "─".repeat(50)
    }

    pub fn header_separator() -> String {
        "═".repeat(50)
    }

    pub fn print_header(title: &str) {
        println!("{}", Self::title(title));
        println!("{}", Self::header_separator());
    }

    pub fn print_field(label: &str, value: &str) {
        println!("{:>14}: {}", Self::label(label), value);
    }

    fn status(status: PassStatus) -> ColoredString {
        match status {
            PassStatus::Success => Self::success("success"),
            PassStatus::Partial => Self::warning("partial"),
            PassStatus::Failure => Self::error("failure"),
        }
    }

    fn job_state(job: &JobReport) -> ColoredString {
        match job.state {
            JobState::Errored => Self::error("errored"),
            _ if job.cancelled => Self::warning("cancelled"),
            JobState::Done => Self::success("done"),
            _ => Self::muted("pending"),
        }
    }

    fn record_status(status: RecordStatus) -> ColoredString {
        match status {
            RecordStatus::Written => Self::success("written"),
            RecordStatus::Skipped => Self::muted("skipped"),
            RecordStatus::Failed => Self::error("failed"),
        }
    }
}

/// Human-readable rendering of a sync report.
///
/// With `verbose` off, only failed records are listed under each job.
pub fn render_report(report: &SyncReport, verbose: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", OutputStyle::title("Sync report"));
    let _ = writeln!(out, "{}", OutputStyle::header_separator());
    let _ = writeln!(
        out,
        "{} → {}  {}",
        format_datetime(&report.started_at),
        format_datetime(&report.finished_at),
        OutputStyle::status(report.status)
    );

    for job in &report.jobs {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} {} {}",
            OutputStyle::header(&job.name),
            OutputStyle::muted(&format!("({} → {})", job.source, job.sink)),
            OutputStyle::job_state(job)
        );

        if let Some(err) = &job.error {
            let _ = writeln!(out, "  {} {}", OutputStyle::error(err.kind.as_str()), err.message);
            continue;
        }

        let tally = job.tally();
        let _ = writeln!(
            out,
            "  fetched {}, selected {}, written {}, skipped {}, failed {}",
            job.fetched, job.filtered_in, tally.written, tally.skipped, tally.failed
        );

        for outcome in job
            .outcomes
            .iter()
            .filter(|o| verbose || o.status == RecordStatus::Failed)
        {
            let _ = writeln!(out, "  {}", render_outcome(outcome));
        }
    }

    let _ = writeln!(out, "{}", OutputStyle::separator());
    let _ = writeln!(
        out,
        "{} written, {} skipped, {} failed",
        OutputStyle::success(&report.totals.written.to_string()),
        OutputStyle::muted(&report.totals.skipped.to_string()),
        OutputStyle::error(&report.totals.failed.to_string())
    );
    out
}

fn render_outcome(outcome: &RecordOutcome) -> String {
    let mut line = format!("{:<8} {}", OutputStyle::record_status(outcome.status), outcome.identifier);
    if let Some(target) = &outcome.target {
        let _ = write!(line, " → {}", target);
    }
    if let Some(reason) = &outcome.reason {
        let _ = write!(line, " ({})", reason);
    }
    if let Some(err) = &outcome.error {
        let _ = write!(line, ": {} {}", err.kind, err.message);
    }
    line
}
