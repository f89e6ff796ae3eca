//! Lifecycle controller.
//!
//! Each unit walks `Pending → Resetting → Loading → SettingUp → Running → TearingDown → Reported`, one unit at a time
//! in discovery order. `Failed` is the terminal state for a unit whose lifecycle was cut short (fixture or setup
//! error); teardown does not run for those.
//!
//! Bodies and hooks run under `catch_unwind`, so a panicking unit becomes an errored outcome and the run goes on.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use testbed_core::Store;
use testbed_syntax::Step;

use crate::interpreter::{Interpreter, StoreInterpreter};
use crate::loader::Loader;
use crate::registry::Registry;
use crate::report::{Outcome, Report, RunReporter, UnitReport};
use crate::unit::{AssertionMismatch, Fault, Hook, TestUnit, UnitBody, UnitError, UnitResult};

/// Where a unit is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pending,
    Resetting,
    Loading,
    SettingUp,
    Running,
    TearingDown,
    Reported,
    /// Terminal: the lifecycle stopped before `Running`
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Reported | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Pending => "pending",
            Phase::Resetting => "resetting",
            Phase::Loading => "loading",
            Phase::SettingUp => "setting up",
            Phase::Running => "running",
            Phase::TearingDown => "tearing down",
            Phase::Reported => "reported",
            Phase::Failed => "failed",
        })
    }
}

/// Prefix marking expected text that anticipates an interpreter error.
const ERROR_PREFIX: &str = "error:";

/// Runs registered units against a store.
pub struct Controller {
    loader: Loader,
    interpreter: Box<dyn Interpreter>,
    exit_first: bool,
}

impl Controller {
    pub fn new(loader: Loader) -> Self {
        Self {
            loader,
            interpreter: Box::new(StoreInterpreter::new()),
            exit_first: false,
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Interpreter + 'static) -> Self {
        self.interpreter = Box::new(interpreter);
        self
    }

    /// Stop scheduling units after the first failure or error.
    pub fn with_exit_first(mut self, exit_first: bool) -> Self {
        self.exit_first = exit_first;
        self
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Run every unit of `registry` in discovery order. Units are consumed; each runs at most once.
    #[tracing::instrument(skip_all, fields(units = registry.len()))]
    pub fn run(&mut self, store: &mut Store, registry: Registry, reporter: &mut dyn RunReporter) -> Report {
        let started = Instant::now();
        let mut report = Report::new();
        reporter.on_collection_complete(registry.len());

        for unit in registry {
            reporter.on_unit_start(&unit.name);
            let result = self.run_unit(store, &unit);
            reporter.on_unit_complete(&result);
            let stop = self.exit_first && matches!(result.outcome, Outcome::Failed(_) | Outcome::Errored(_));
            report.record(result);
            if stop {
                tracing::debug!(unit = %unit.name, "exit-first: stopping run");
                break;
            }
        }

        report.set_duration(started.elapsed());
        reporter.on_run_complete(&report);
        report
    }

    /// Drive one unit through its lifecycle.
    pub fn run_unit(&mut self, store: &mut Store, unit: &TestUnit) -> UnitReport {
        let started = Instant::now();
        let name = unit.name.as_str();

        if let Some(reason) = &unit.skip {
            transition(name, Phase::Pending, Phase::Reported);
            return finish(unit, Outcome::Skipped(reason.clone()), None, started, Phase::Reported);
        }

        transition(name, Phase::Pending, Phase::Resetting);
        store.reset();
        self.interpreter.reset();

        let mut phase = Phase::Resetting;
        if !unit.fixtures.is_empty() {
            transition(name, phase, Phase::Loading);
            phase = Phase::Loading;
            if let Err(err) = self.loader.load(store, unit.fixtures.as_slice()) {
                transition(name, phase, Phase::Failed);
                let fault = Fault::new(err.to_string()).during("loading fixtures");
                return finish(unit, Outcome::Errored(fault), None, started, Phase::Failed);
            }
        }

        transition(name, phase, Phase::SettingUp);
        if let Err(err) = run_hooks(&unit.setup, store) {
            transition(name, Phase::SettingUp, Phase::Failed);
            let fault = into_fault(err).during("setUp");
            return finish(unit, Outcome::Errored(fault), None, started, Phase::Failed);
        }

        transition(name, Phase::SettingUp, Phase::Running);
        let outcome = match &unit.body {
            UnitBody::Inline(body) => match guarded(|| body(store)) {
                Ok(()) => Outcome::Passed,
                Err(UnitError::Mismatch(mismatch)) => Outcome::Failed(mismatch),
                Err(UnitError::Fault(fault)) => Outcome::Errored(fault),
            },
            UnitBody::Transcript(steps) => self.run_transcript(store, steps),
        };

        transition(name, Phase::Running, Phase::TearingDown);
        let teardown_fault = run_hooks(&unit.teardown, store)
            .err()
            .map(|err| into_fault(err).during("tearDown"));
        if let Some(fault) = &teardown_fault {
            tracing::warn!(unit = name, fault = %fault, "teardown fault");
        }

        transition(name, Phase::TearingDown, Phase::Reported);
        finish(unit, outcome, teardown_fault, started, Phase::Reported)
    }

    fn run_transcript(&mut self, store: &mut Store, steps: &[Step]) -> Outcome {
        for step in steps {
            let context = format!("line {}: >>> {}", step.line, step.directive);
            let interpreter = &mut self.interpreter;
            let evaluated = panic::catch_unwind(AssertUnwindSafe(|| interpreter.eval(store, &step.directive)))
                .unwrap_or_else(|payload| Err(Fault::from_panic(payload)));

            let actual = match evaluated {
                Ok(output) => output,
                Err(fault) if step.expected.starts_with(ERROR_PREFIX) => format!("{ERROR_PREFIX} {}", fault.message),
                Err(fault) => return Outcome::Errored(fault.during(&context)),
            };

            if actual != step.expected {
                return Outcome::Failed(AssertionMismatch::new(step.expected.clone(), actual).with_context(context));
            }
        }
        Outcome::Passed
    }
}

fn transition(unit: &str, from: Phase, to: Phase) {
    tracing::debug!(unit, %from, %to, "phase transition");
}

fn finish(
    unit: &TestUnit,
    outcome: Outcome,
    teardown_fault: Option<Fault>,
    started: Instant,
    final_phase: Phase,
) -> UnitReport {
    debug_assert!(final_phase.is_terminal());
    let duration: Duration = started.elapsed();
    tracing::debug!(unit = %unit.name, outcome = outcome.label(), ?duration, "unit finished");
    UnitReport {
        name: unit.name.clone(),
        outcome,
        teardown_fault,
        duration,
        final_phase,
    }
}

/// Run hooks in order, stopping at the first error.
fn run_hooks(hooks: &[Hook], store: &mut Store) -> UnitResult {
    for hook in hooks {
        guarded(|| hook(store))?;
    }
    Ok(())
}

/// Run a body or hook, turning a panic into a fault.
fn guarded<F: FnOnce() -> UnitResult>(f: F) -> UnitResult {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(Fault::from_panic(payload).into()))
}

fn into_fault(err: UnitError) -> Fault {
    match err {
        UnitError::Fault(fault) => fault,
        UnitError::Mismatch(mismatch) => Fault::new(mismatch.render()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{check_count, check_eq};
    use crate::fixtures::MemorySource;
    use crate::report::NullReporter;
    use std::cell::RefCell;
    use std::rc::Rc;
    use testbed_core::{EntityType, Record, Schema};

    fn store() -> Store {
        Store::new(Schema::from_entities([EntityType::new("polls.poll")]).unwrap())
    }

    fn controller() -> Controller {
        Controller::new(Loader::new(
            MemorySource::new().with_file("polls.fixture", "[polls.poll 1]\nvotes = 1\n[polls.poll 2]\nvotes = 2\n"),
        ))
    }

    #[test]
    fn test_setup_failure_skips_body_and_teardown() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (body_log, teardown_log) = (log.clone(), log.clone());
        let unit = TestUnit::inline("u", move |_| {
            body_log.borrow_mut().push("body");
            Ok(())
        })
        .with_setup(|_| Err(Fault::new("no connection").into()))
        .with_teardown(move |_| {
            teardown_log.borrow_mut().push("teardown");
            Ok(())
        });

        let result = controller().run_unit(&mut store(), &unit);
        assert_eq!(result.final_phase, Phase::Failed);
        assert_eq!(result.outcome, Outcome::Errored(Fault::new("setUp: no connection")));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_teardown_fault_does_not_replace_failure() {
        let unit = TestUnit::inline("u", |_| check_eq(1, 2)).with_teardown(|_| Err(Fault::new("boom").into()));
        let result = controller().run_unit(&mut store(), &unit);
        assert!(matches!(result.outcome, Outcome::Failed(_)));
        assert_eq!(result.teardown_fault, Some(Fault::new("tearDown: boom")));
        assert_eq!(result.final_phase, Phase::Reported);
    }

    #[test]
    fn test_panicking_body_is_errored() {
        let unit = TestUnit::inline("u", |_| panic!("kaboom"));
        let result = controller().run_unit(&mut store(), &unit);
        assert_eq!(result.outcome, Outcome::Errored(Fault::new("panicked: kaboom")));
    }

    #[test]
    fn test_fixture_error_fails_unit() {
        let unit = TestUnit::inline("u", |_| Ok(())).with_fixture("missing");
        let result = controller().run_unit(&mut store(), &unit);
        assert_eq!(result.final_phase, Phase::Failed);
        assert!(matches!(&result.outcome, Outcome::Errored(f) if f.message.starts_with("loading fixtures: fixture 'missing' not found")));
    }

    #[test]
    fn test_store_is_reset_and_fixtures_loaded() {
        let mut store = store();
        store.upsert(Record::new("polls.poll", 99)).unwrap();
        let unit = TestUnit::inline("u", |s| check_count(s, "polls.poll", 2)).with_fixture("polls");
        let result = controller().run_unit(&mut store, &unit);
        assert_eq!(result.outcome, Outcome::Passed);
    }

    #[test]
    fn test_skipped_unit_does_not_touch_store() {
        let mut store = store();
        store.upsert(Record::new("polls.poll", 99)).unwrap();
        let unit = TestUnit::inline("u", |_| Ok(())).skipped("later");
        let result = controller().run_unit(&mut store, &unit);
        assert_eq!(result.outcome, Outcome::Skipped("later".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_transcript_error_expectation() {
        let steps = vec![
            Step {
                directive: "get polls.poll 5".to_string(),
                expected: "error: no 'polls.poll' record with primary key 5".to_string(),
                line: 1,
            },
            Step {
                directive: "get polls.poll 6".to_string(),
                expected: "{}".to_string(),
                line: 3,
            },
        ];
        let result = controller().run_unit(&mut store(), &TestUnit::transcript("t", steps));
        assert_eq!(
            result.outcome,
            Outcome::Errored(Fault::new(
                "line 3: >>> get polls.poll 6: no 'polls.poll' record with primary key 6"
            ))
        );
    }

    #[test]
    fn test_exit_first_stops_after_failure() {
        let mut registry = Registry::new();
        registry.register(TestUnit::inline("a", |_| Ok(()))).unwrap();
        registry.register(TestUnit::inline("b", |_| check_eq(1, 2))).unwrap();
        registry.register(TestUnit::inline("c", |_| Ok(()))).unwrap();

        let report = controller()
            .with_exit_first(true)
            .run(&mut store(), registry, &mut NullReporter);
        assert_eq!(report.units().len(), 2);
        assert_eq!(report.summary_line(), "2 run: 1 passed, 1 failed, 0 errored");
    }
}
