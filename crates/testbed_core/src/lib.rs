#![forbid(unsafe_code)]
//! Record model and persistent store shared by the testbed harness.
//!
//! This crate owns the data the harness moves around:
//!
//! - `value` - scalar field values and primary keys, plus their canonical text rendering
//! - `record` - a single stored record (entity type, primary key, fields)
//! - `schema` - registered entity types
//! - `store` - the in-memory persistent store test units read and mutate
//!
//! ## Notes
//! - The store is an ordinary owned value. Nothing here is global; a harness run threads a `&mut Store` through
//!   loading, setup, the unit body and teardown.
//! - Text formats (fixture files, transcripts) live in `testbed_syntax`; this crate only knows how to render a single
//!   scalar so both formats agree on quoting.
//!
//! ## Examples
//! ```rust
//! use testbed_core::{EntityType, PrimaryKey, Schema, Store, Value};
//!
//! let schema = Schema::from_entities([EntityType::new("polls.poll")]).unwrap();
//! let mut store = Store::new(schema);
//! store.create("polls.poll", PrimaryKey::Int(1), [("question".to_string(), Value::from("Hi?"))].into()).unwrap();
//! assert_eq!(store.count("polls.poll").unwrap(), 1);
//! store.reset();
//! assert!(store.is_baseline());
//! ```

pub mod record;
pub mod schema;
pub mod store;
pub mod value;

pub use record::{Fields, Record};
pub use schema::{EntityType, Schema};
pub use store::{Store, StoreError};
pub use value::{PrimaryKey, Value, format_float, quote_str, render_fields};
