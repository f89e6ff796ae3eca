//! Discovery registry: the ordered, uniquely named set of test units for a run.
//!
//! Units arrive by explicit registration, either one at a time or as a whole declared source (a [`Suite`] of inline
//! units, or a parsed transcript document). Names are unique across the registry; a clash is reported instead of
//! replacing the earlier unit.

use std::collections::HashSet;
use std::rc::Rc;

use thiserror::Error;

use testbed_core::Store;
use testbed_syntax::TranscriptDocument;

use crate::unit::{Body, Hook, TestUnit, UnitBody, UnitResult};

/// Two units share an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate test unit name '{name}'")]
pub struct DuplicateNameError {
    pub name: String,
}

/// Typed handle to a registered unit.
///
/// A handle is tied to the registry's layout when it was issued. Filtering with [`Registry::retain_matching`]
/// invalidates every earlier handle; [`Registry::get`] returns `None` for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitHandle {
    epoch: u32,
    index: usize,
}

impl UnitHandle {
    /// Position in discovery order.
    pub fn index(self) -> usize {
        self.index
    }
}

/// A declared source of test units.
pub trait UnitSource {
    fn into_units(self) -> Vec<TestUnit>;
}

impl UnitSource for TestUnit {
    fn into_units(self) -> Vec<TestUnit> {
        vec![self]
    }
}

impl UnitSource for Vec<TestUnit> {
    fn into_units(self) -> Vec<TestUnit> {
        self
    }
}

/// Transcript units are named `<document>::<unit>`.
impl UnitSource for TranscriptDocument {
    fn into_units(self) -> Vec<TestUnit> {
        let document = self.name;
        self.units
            .into_iter()
            .map(|unit| {
                let mut test = TestUnit::transcript(format!("{document}::{}", unit.name), unit.steps)
                    .with_fixtures(unit.fixtures);
                if let Some(reason) = unit.skip {
                    test = test.skipped(reason);
                }
                test
            })
            .collect()
    }
}

/// A named group of inline units sharing fixtures and setup/teardown, in the manner of a test case class.
///
/// Units are named `<suite>::<test>`.
pub struct Suite {
    name: String,
    fixtures: Vec<String>,
    setup: Option<Hook>,
    teardown: Option<Hook>,
    tests: Vec<(String, Body, Option<String>)>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixtures: Vec::new(),
            setup: None,
            teardown: None,
            tests: Vec::new(),
        }
    }

    pub fn fixtures<I, S>(mut self, fixtures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixtures.extend(fixtures.into_iter().map(Into::into));
        self
    }

    pub fn setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Store) -> UnitResult + 'static,
    {
        self.setup = Some(Rc::new(hook));
        self
    }

    pub fn teardown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Store) -> UnitResult + 'static,
    {
        self.teardown = Some(Rc::new(hook));
        self
    }

    pub fn test<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Store) -> UnitResult + 'static,
    {
        self.tests.push((name.into(), Box::new(body), None));
        self
    }

    /// Declare a test that is reported as skipped without running.
    pub fn skip_test<F>(mut self, name: impl Into<String>, reason: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Store) -> UnitResult + 'static,
    {
        self.tests.push((name.into(), Box::new(body), Some(reason.into())));
        self
    }
}

impl UnitSource for Suite {
    fn into_units(self) -> Vec<TestUnit> {
        let Suite {
            name,
            fixtures,
            setup,
            teardown,
            tests,
        } = self;
        tests
            .into_iter()
            .map(|(test, body, skip)| {
                TestUnit {
                    name: format!("{name}::{test}"),
                    fixtures: fixtures.clone(),
                    skip,
                    setup: Vec::new(),
                    teardown: Vec::new(),
                    body: UnitBody::Inline(body),
                }
                .with_shared_hooks(setup.as_ref(), teardown.as_ref())
            })
            .collect()
    }
}

/// Ordered set of registered units.
#[derive(Debug, Default)]
pub struct Registry {
    units: Vec<TestUnit>,
    names: HashSet<String>,
    /// Bumped whenever units are removed
    epoch: u32,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit.
    pub fn register(&mut self, unit: TestUnit) -> Result<UnitHandle, DuplicateNameError> {
        if self.names.contains(&unit.name) {
            return Err(DuplicateNameError { name: unit.name });
        }
        self.names.insert(unit.name.clone());
        self.units.push(unit);
        tracing::trace!(count = self.units.len(), "unit registered");
        Ok(UnitHandle {
            epoch: self.epoch,
            index: self.units.len() - 1,
        })
    }

    /// Register every unit of a source, in order. Nothing is registered if any name clashes.
    pub fn register_source<S: UnitSource>(&mut self, source: S) -> Result<Vec<UnitHandle>, DuplicateNameError> {
        let units = source.into_units();

        {
            let mut incoming: HashSet<&str> = HashSet::with_capacity(units.len());
            for unit in &units {
                if self.names.contains(&unit.name) || !incoming.insert(unit.name.as_str()) {
                    return Err(DuplicateNameError {
                        name: unit.name.clone(),
                    });
                }
            }
        }

        let mut handles = Vec::with_capacity(units.len());
        for unit in units {
            handles.push(self.register(unit)?);
        }
        Ok(handles)
    }

    /// The unit behind `handle`, unless a filter has run since it was issued.
    pub fn get(&self, handle: UnitHandle) -> Option<&TestUnit> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.units.get(handle.index)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units in discovery order.
    pub fn units(&self) -> impl Iterator<Item = &TestUnit> {
        self.units.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.name.as_str())
    }

    /// Keep only units whose name contains `keyword`. Returns how many were dropped.
    ///
    /// Dropping anything shifts positions, so handles issued before the call stop resolving.
    pub fn retain_matching(&mut self, keyword: &str) -> usize {
        let before = self.units.len();
        self.units.retain(|u| u.name.contains(keyword));
        let dropped = before - self.units.len();
        if dropped > 0 {
            self.names = self.units.iter().map(|u| u.name.clone()).collect();
            self.epoch = self.epoch.wrapping_add(1);
        }
        dropped
    }
}

/// Consumes the registry in discovery order.
impl IntoIterator for Registry {
    type Item = TestUnit;
    type IntoIter = std::vec::IntoIter<TestUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}
