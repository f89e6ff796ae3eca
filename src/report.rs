//! Run reporting.
//!
//! ## RunReporter Trait
//!
//! The controller streams progress through a [`RunReporter`]; the [`Report`] it returns holds the aggregate. A unit
//! reaches the report only once it is fully done (teardown included), so counts never reflect partial state.
//!
//! [`ConsoleReporter`] prints pytest-style lines; [`NullReporter`] prints nothing.

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use crate::lifecycle::Phase;
use crate::unit::{AssertionMismatch, Fault};

/// Final result of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// Expected and actual output diverged
    Failed(AssertionMismatch),
    /// Something broke before a verdict was reached
    Errored(Fault),
    Skipped(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed(_) => "FAILED",
            Outcome::Errored(_) => "ERROR",
            Outcome::Skipped(_) => "SKIPPED",
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => f.write_str("passed"),
            Outcome::Failed(m) => write!(f, "failed\n{}", m.render()),
            Outcome::Errored(fault) => write!(f, "errored: {fault}"),
            Outcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// One finished unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub name: String,
    pub outcome: Outcome,
    /// Recorded next to the outcome, never in place of it
    pub teardown_fault: Option<Fault>,
    pub duration: Duration,
    /// `Reported`, or `Failed` when the lifecycle was cut short
    pub final_phase: Phase,
}

/// Aggregated results of a run, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Report {
    units: Vec<UnitReport>,
    passed: usize,
    failed: usize,
    errored: usize,
    skipped: usize,
    teardown_errors: usize,
    duration: Duration,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished unit and update the counts.
    pub fn record(&mut self, unit: UnitReport) {
        match unit.outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed(_) => self.failed += 1,
            Outcome::Errored(_) => self.errored += 1,
            Outcome::Skipped(_) => self.skipped += 1,
        }
        if unit.teardown_fault.is_some() {
            self.teardown_errors += 1;
        }
        self.units.push(unit);
    }

    pub fn units(&self) -> &[UnitReport] {
        &self.units
    }

    pub fn get(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Units that ran (everything but skips).
    pub fn run(&self) -> usize {
        self.passed + self.failed + self.errored
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn errored(&self) -> usize {
        self.errored
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn teardown_errors(&self) -> usize {
        self.teardown_errors
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// True when nothing failed, errored, or faulted in teardown.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0 && self.teardown_errors == 0
    }

    /// `N run: P passed, F failed, E errored`, with skips and teardown errors appended when present.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} run: {} passed, {} failed, {} errored",
            self.run(),
            self.passed,
            self.failed,
            self.errored
        );
        if self.skipped > 0 {
            line.push_str(&format!(", {} skipped", self.skipped));
        }
        if self.teardown_errors > 0 {
            line.push_str(&format!(", {} teardown errors", self.teardown_errors));
        }
        line
    }

    /// Detail for every non-passing unit and every teardown fault, in discovery order.
    pub fn render_failures(&self) -> String {
        let mut sections = Vec::new();
        for unit in &self.units {
            match &unit.outcome {
                Outcome::Failed(mismatch) => {
                    sections.push(format!("FAILED {}\n{}", unit.name, indent(&mismatch.render())));
                }
                Outcome::Errored(fault) => {
                    sections.push(format!("ERROR {}\n{}", unit.name, indent(&fault.message)));
                }
                Outcome::Passed | Outcome::Skipped(_) => {}
            }
        }
        for unit in &self.units {
            if let Some(fault) = &unit.teardown_fault {
                sections.push(format!("TEARDOWN ERROR {}\n{}", unit.name, indent(&fault.message)));
            }
        }
        sections.join("\n\n")
    }
}

fn indent(text: &str) -> String {
    text.lines().map(|l| format!("    {l}")).collect::<Vec<_>>().join("\n")
}

// ============================================================================
// Reporters
// ============================================================================

/// Receives progress events from the lifecycle controller.
pub trait RunReporter {
    /// Called once the registry is final
    fn on_collection_complete(&mut self, _unit_count: usize) {}

    /// Called before a unit's lifecycle begins
    fn on_unit_start(&mut self, _name: &str) {}

    /// Called when a unit reaches `Reported` or `Failed`
    fn on_unit_complete(&mut self, unit: &UnitReport);

    /// Called after the last unit
    fn on_run_complete(&mut self, report: &Report);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl RunReporter for NullReporter {
    fn on_unit_complete(&mut self, _unit: &UnitReport) {}

    fn on_run_complete(&mut self, _report: &Report) {}
}

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

/// Pytest-style console output.
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
    color: bool,
    verbose: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            color: false,
            verbose: false,
        }
    }

    /// ANSI colors on status words and the summary banner.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Per-unit timings and the total run time.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

impl<W: Write> RunReporter for ConsoleReporter<W> {
    fn on_collection_complete(&mut self, unit_count: usize) {
        let _ = match unit_count {
            0 => writeln!(self.out, "no test units collected"),
            1 => writeln!(self.out, "collected 1 unit"),
            n => writeln!(self.out, "collected {n} units"),
        };
        let _ = writeln!(self.out);
    }

    fn on_unit_complete(&mut self, unit: &UnitReport) {
        let color = match unit.outcome {
            Outcome::Passed => GREEN,
            Outcome::Failed(_) | Outcome::Errored(_) => RED,
            Outcome::Skipped(_) => YELLOW,
        };
        let mut line = format!("{} {}", unit.name, self.paint(color, unit.outcome.label()));
        if let Outcome::Skipped(reason) = &unit.outcome {
            if !reason.is_empty() {
                line.push_str(&format!(" ({reason})"));
            }
        }
        if unit.teardown_fault.is_some() {
            line.push_str(&format!(" [{}]", self.paint(RED, "teardown error")));
        }
        if self.verbose && !matches!(unit.outcome, Outcome::Skipped(_)) {
            line.push_str(&format!(" ({}ms)", unit.duration.as_millis()));
        }
        let _ = writeln!(self.out, "{line}");
    }

    fn on_run_complete(&mut self, report: &Report) {
        let failures = report.render_failures();
        if !failures.is_empty() {
            let _ = writeln!(self.out);
            let _ = writeln!(
                self.out,
                "{}",
                self.paint(BOLD_RED, "=================== FAILURES ===================")
            );
            let _ = writeln!(self.out, "{failures}");
            if report.failed() > 0 {
                let _ = writeln!(self.out);
                let _ = writeln!(self.out, "note: output is compared exactly; whitespace and quote style are significant");
            }
        }

        let _ = writeln!(self.out);
        let mut summary = report.summary_line();
        if self.verbose {
            summary.push_str(&format!(" in {:.2}s", report.duration().as_secs_f64()));
        }
        let banner = format!("=================== {summary} ===================");
        let color = if report.is_success() { BOLD_GREEN } else { BOLD_RED };
        let _ = writeln!(self.out, "{}", self.paint(color, &banner));
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, outcome: Outcome) -> UnitReport {
        UnitReport {
            name: name.to_string(),
            outcome,
            teardown_fault: None,
            duration: Duration::from_millis(3),
            final_phase: Phase::Reported,
        }
    }

    fn mixed_report() -> Report {
        let mut report = Report::new();
        report.record(unit("a::passes", Outcome::Passed));
        report.record(unit(
            "a::fails",
            Outcome::Failed(AssertionMismatch::new("1", "2").with_context("line 4: >>> count p")),
        ));
        report.record(UnitReport {
            teardown_fault: Some(Fault::new("tearDown: disk full")),
            ..unit("a::errors", Outcome::Errored(Fault::new("loading fixtures: fixture 'x' not found")))
        });
        report.record(unit("a::skipped", Outcome::Skipped("later".to_string())));
        report
    }

    #[test]
    fn test_counts_and_summary() {
        let report = mixed_report();
        assert_eq!(report.run(), 3);
        assert_eq!(
            (report.passed(), report.failed(), report.errored(), report.skipped()),
            (1, 1, 1, 1)
        );
        assert_eq!(
            report.summary_line(),
            "3 run: 1 passed, 1 failed, 1 errored, 1 skipped, 1 teardown errors"
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_empty_report_is_success() {
        let report = Report::new();
        assert_eq!(report.summary_line(), "0 run: 0 passed, 0 failed, 0 errored");
        assert!(report.is_success());
    }

    #[test]
    fn test_teardown_fault_alone_fails_the_run() {
        let mut report = Report::new();
        report.record(UnitReport {
            teardown_fault: Some(Fault::new("tearDown: boom")),
            ..unit("t", Outcome::Passed)
        });
        assert_eq!(report.passed(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_render_failures() {
        insta::assert_snapshot!(mixed_report().render_failures(), @r"
        FAILED a::fails
            line 4: >>> count p
            expected:
                1
            actual:
                2

        ERROR a::errors
            loading fixtures: fixture 'x' not found

        TEARDOWN ERROR a::errors
            tearDown: disk full
        ");
    }

    #[test]
    fn test_console_output() {
        let report = mixed_report();
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.on_collection_complete(report.units().len());
        for unit in report.units() {
            reporter.on_unit_complete(unit);
        }
        reporter.on_run_complete(&report);
        let output = String::from_utf8(reporter.into_inner()).unwrap();

        insta::assert_snapshot!(output, @r"
        collected 4 units

        a::passes PASSED
        a::fails FAILED
        a::errors ERROR [teardown error]
        a::skipped SKIPPED (later)

        =================== FAILURES ===================
        FAILED a::fails
            line 4: >>> count p
            expected:
                1
            actual:
                2

        ERROR a::errors
            loading fixtures: fixture 'x' not found

        TEARDOWN ERROR a::errors
            tearDown: disk full

        note: output is compared exactly; whitespace and quote style are significant

        =================== 3 run: 1 passed, 1 failed, 1 errored, 1 skipped, 1 teardown errors ===================
        ");
    }

    #[test]
    fn test_color_output() {
        let mut reporter = ConsoleReporter::new(Vec::new()).with_color(true);
        reporter.on_unit_complete(&unit("x", Outcome::Passed));
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(output, "x \x1b[32mPASSED\x1b[0m\n");
    }
}
