//! Test units and the errors a unit body can produce.
//!
//! A unit is either an inline body (a closure over the store) or a transcript (directives with literal expected
//! output). Both carry the same lifecycle metadata: fixtures to load, setup and teardown hooks, an optional skip
//! reason.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use testbed_core::{Store, StoreError};
use testbed_syntax::Step;

/// Result of a unit body or hook.
pub type UnitResult = Result<(), UnitError>;

/// Inline unit body.
pub type Body = Box<dyn Fn(&mut Store) -> UnitResult>;

/// Setup or teardown hook. Shared, since a suite hands the same hook to each of its units.
pub type Hook = Rc<dyn Fn(&mut Store) -> UnitResult>;

/// Expected and actual output diverged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.render())]
pub struct AssertionMismatch {
    /// Where the mismatch happened (a message, or a transcript line and directive)
    pub context: Option<String>,
    pub expected: String,
    pub actual: String,
}

impl AssertionMismatch {
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            context: None,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Multi-line rendering: context, then expected and actual text verbatim.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(context) = &self.context {
            out.push_str(context);
            out.push('\n');
        }
        out.push_str("expected:\n");
        out.push_str(&indent(&self.expected));
        out.push_str("\nactual:\n");
        out.push_str(&indent(&self.actual));
        out
    }
}

/// Something went wrong that the unit did not anticipate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Fault {
    pub message: String,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Prefix the message with where the fault happened.
    pub fn during(self, phase: &str) -> Self {
        Self {
            message: format!("{phase}: {}", self.message),
        }
    }

    /// Build a fault from a caught panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("panicked: {message}"))
    }
}

impl From<StoreError> for Fault {
    fn from(err: StoreError) -> Self {
        Fault::new(err.to_string())
    }
}

/// Why a unit body or hook did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error(transparent)]
    Mismatch(#[from] AssertionMismatch),

    #[error(transparent)]
    Fault(#[from] Fault),
}

impl From<StoreError> for UnitError {
    fn from(err: StoreError) -> Self {
        UnitError::Fault(err.into())
    }
}

/// What a unit executes.
pub enum UnitBody {
    Inline(Body),
    Transcript(Vec<Step>),
}

impl fmt::Debug for UnitBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitBody::Inline(_) => f.write_str("Inline(..)"),
            UnitBody::Transcript(steps) => f.debug_tuple("Transcript").field(steps).finish(),
        }
    }
}

/// One independently executable check.
pub struct TestUnit {
    pub name: String,
    pub fixtures: Vec<String>,
    pub skip: Option<String>,
    pub(crate) setup: Vec<Hook>,
    pub(crate) teardown: Vec<Hook>,
    pub(crate) body: UnitBody,
}

impl TestUnit {
    /// An inline-assertion unit.
    pub fn inline<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Store) -> UnitResult + 'static,
    {
        Self::with_body(name, UnitBody::Inline(Box::new(body)))
    }

    /// A transcript unit.
    pub fn transcript(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self::with_body(name, UnitBody::Transcript(steps))
    }

    fn with_body(name: impl Into<String>, body: UnitBody) -> Self {
        Self {
            name: name.into(),
            fixtures: Vec::new(),
            skip: None,
            setup: Vec::new(),
            teardown: Vec::new(),
            body,
        }
    }

    pub fn with_fixture(mut self, fixture: impl Into<String>) -> Self {
        self.fixtures.push(fixture.into());
        self
    }

    pub fn with_fixtures<I, S>(mut self, fixtures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixtures.extend(fixtures.into_iter().map(Into::into));
        self
    }

    pub fn with_setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Store) -> UnitResult + 'static,
    {
        self.setup.push(Rc::new(hook));
        self
    }

    pub fn with_teardown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Store) -> UnitResult + 'static,
    {
        self.teardown.push(Rc::new(hook));
        self
    }

    pub(crate) fn with_shared_hooks(mut self, setup: Option<&Hook>, teardown: Option<&Hook>) -> Self {
        self.setup.extend(setup.cloned());
        self.teardown.extend(teardown.cloned());
        self
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skip = Some(reason.into());
        self
    }

    pub fn is_transcript(&self) -> bool {
        matches!(self.body, UnitBody::Transcript(_))
    }
}

impl fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUnit")
            .field("name", &self.name)
            .field("fixtures", &self.fixtures)
            .field("skip", &self.skip)
            .field("setup", &self.setup.len())
            .field("teardown", &self.teardown.len())
            .field("body", &self.body)
            .finish()
    }
}

fn indent(text: &str) -> String {
    if text.is_empty() {
        return "    <empty>".to_string();
    }
    text.split('\n').map(|l| format!("    {l}")).collect::<Vec<_>>().join("\n")
}
