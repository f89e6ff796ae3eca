#![forbid(unsafe_code)]
//! Test discovery and fixture lifecycle harness.
//!
//! Test units come from declared sources (inline [`Suite`]s and transcript documents) into a [`Registry`]. The
//! lifecycle [`Controller`] runs them one at a time against a [`Store`]: reset to baseline, load the unit's fixtures,
//! set up, run, tear down, report.
//!
//! ## Modules
//!
//! - `unit` - test units, assertion mismatches and faults
//! - `registry` - the ordered, uniquely named set of units; suites
//! - `discovery` - `*.transcript` file discovery
//! - `fixtures` - fixture lookup across formats and search directories
//! - `loader` - atomic fixture loading and store dumps
//! - `interpreter` - the directive interpreter used by transcript units
//! - `lifecycle` - the per-unit state machine
//! - `report` - outcomes, the run report and reporters
//! - `checks` - assertion helpers for inline bodies
//! - `config` - harness configuration
//! - `cli` - the `testbed` command line
//!
//! ## Panic Policy
//!
//! Production code returns `Result`; the `cli` module enforces `#![deny(clippy::unwrap_used)]`. Panics inside unit
//! bodies and hooks are caught by the controller and reported as errored units. `.unwrap()` is fine in tests.
//!
//! ## Example
//!
//! ```rust
//! use testbed::checks::check_count;
//! use testbed::{Controller, Loader, MemorySource, NullReporter, Registry, Suite};
//! use testbed::{EntityType, Schema, Store};
//!
//! let schema = Schema::from_entities([EntityType::new("polls.poll")]).unwrap();
//! let mut store = Store::new(schema);
//!
//! let fixtures = MemorySource::new().with_file("polls.fixture", "[polls.poll 1]\nquestion = \"Hi?\"\n");
//! let mut registry = Registry::new();
//! registry
//!     .register_source(
//!         Suite::new("PollTests")
//!             .fixtures(["polls"])
//!             .test("one_poll", |store| check_count(store, "polls.poll", 1)),
//!     )
//!     .unwrap();
//!
//! let report = Controller::new(Loader::new(fixtures)).run(&mut store, registry, &mut NullReporter);
//! assert_eq!(report.summary_line(), "1 run: 1 passed, 0 failed, 0 errored");
//! ```

pub mod checks;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod fixtures;
pub mod interpreter;
pub mod lifecycle;
pub mod loader;
pub mod registry;
pub mod report;
pub mod unit;

pub use testbed_core::{EntityType, Fields, PrimaryKey, Record, Schema, Store, StoreError, Value};
pub use testbed_syntax::{Format, ParseError};

pub use config::{ConfigError, HarnessConfig};
pub use discovery::{DiscoveryError, DiscoverySummary, FsTranscriptDiscovery, TranscriptDiscovery};
pub use fixtures::{DirectorySource, Fixture, FixtureSource, MemorySource};
pub use interpreter::{Interpreter, StoreInterpreter};
pub use lifecycle::{Controller, Phase};
pub use loader::{DumpError, LoadError, Loader, dump, load_fixtures};
pub use registry::{DuplicateNameError, Registry, Suite, UnitHandle, UnitSource};
pub use report::{ConsoleReporter, NullReporter, Outcome, Report, RunReporter, UnitReport};
pub use unit::{AssertionMismatch, Fault, TestUnit, UnitError, UnitResult};
