//! Assertion helpers for inline unit bodies.
//!
//! Each helper returns a [`UnitResult`] so bodies chain them with `?`:
//!
//! ```rust
//! use testbed::checks::{check_count, check_eq};
//! use testbed::{Store, UnitResult};
//!
//! fn body(store: &mut Store) -> UnitResult {
//!     check_count(store, "polls.poll", 0)?;
//!     check_eq(2, 1 + 1)
//! }
//! ```

use std::fmt::Debug;

use testbed_core::{PrimaryKey, Store, Value};

use crate::unit::{AssertionMismatch, Fault, UnitError, UnitResult};

/// Fail unless `condition` holds.
pub fn check(condition: bool, message: &str) -> UnitResult {
    if condition {
        Ok(())
    } else {
        Err(AssertionMismatch::new("true", "false").with_context(message).into())
    }
}

/// Fail unless `expected == actual`. Both sides are rendered with `Debug`.
pub fn check_eq<T: PartialEq + Debug>(expected: T, actual: T) -> UnitResult {
    if expected == actual {
        Ok(())
    } else {
        Err(AssertionMismatch::new(format!("{expected:?}"), format!("{actual:?}")).into())
    }
}

/// Fail if `left == right`.
pub fn check_ne<T: PartialEq + Debug>(left: T, right: T) -> UnitResult {
    if left != right {
        Ok(())
    } else {
        Err(AssertionMismatch::new(format!("anything but {left:?}"), format!("{right:?}")).into())
    }
}

/// Fail unless the store holds exactly `expected` records of `entity`.
pub fn check_count(store: &Store, entity: &str, expected: usize) -> UnitResult {
    let actual = store.count(entity)?;
    if actual == expected {
        Ok(())
    } else {
        Err(AssertionMismatch::new(expected.to_string(), actual.to_string())
            .with_context(format!("record count of '{entity}'"))
            .into())
    }
}

/// Fail unless the record's `field` equals `expected`. A missing record is a fault; a missing field is a mismatch.
pub fn check_field(
    store: &Store,
    entity: &str,
    key: impl Into<PrimaryKey>,
    field: &str,
    expected: impl Into<Value>,
) -> UnitResult {
    let key = key.into();
    let expected = expected.into();
    let fields = store.fetch(entity, &key)?;
    let context = format!("{entity}({key}).{field}");
    match fields.get(field) {
        Some(actual) if *actual == expected => Ok(()),
        Some(actual) => Err(AssertionMismatch::new(expected.to_string(), actual.to_string())
            .with_context(context)
            .into()),
        None => Err(AssertionMismatch::new(expected.to_string(), "<missing field>")
            .with_context(context)
            .into()),
    }
}

/// Fail explicitly with a message.
pub fn fail(message: impl Into<String>) -> UnitResult {
    Err(UnitError::Fault(Fault::new(message)))
}
