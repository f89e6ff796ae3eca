//! Property-based tests for the fixture formats and the store
//!
//! These tests use proptest to check that what the harness writes it can read back, across many randomly generated
//! stores.

use proptest::prelude::*;

use testbed::{EntityType, Fixture, Format, PrimaryKey, Record, Schema, Store, Value, dump, load_fixtures};

const ENTITIES: [&str; 3] = ["polls.poll", "polls.choice", "auth.user"];

fn schema() -> Schema {
    Schema::from_entities(ENTITIES.iter().map(|name| EntityType::new(*name))).unwrap()
}

// =============================================================================
// Strategies
// =============================================================================

fn text_strategy() -> impl Strategy<Value = String> {
    // Quotes, backslashes, control characters and non-ASCII all need escaping in at least one format.
    "[ -~\\n\\t\\r\\x00éü✓]{0,12}"
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>()
            .prop_filter("finite", |x| x.is_finite())
            .prop_map(Value::Float),
        text_strategy().prop_map(Value::Str),
    ]
}

fn key_strategy() -> impl Strategy<Value = PrimaryKey> {
    prop_oneof![any::<i64>().prop_map(PrimaryKey::Int), text_strategy().prop_map(PrimaryKey::Str),]
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        prop::sample::select(&ENTITIES[..]),
        key_strategy(),
        prop::collection::btree_map("[a-z_][a-z0-9_ .-]{0,8}", value_strategy(), 0..4),
    )
        .prop_map(|(entity, key, fields)| Record {
            entity: entity.to_string(),
            key,
            fields,
        })
}

fn store_strategy() -> impl Strategy<Value = Store> {
    prop::collection::vec(record_strategy(), 0..12).prop_map(|records| {
        let mut store = Store::new(schema());
        for record in records {
            store.upsert(record).unwrap();
        }
        store
    })
}

fn reload(text: &str, format: Format) -> Store {
    let records = testbed_syntax::read_fixture(text, format).unwrap();
    let mut store = Store::new(schema());
    load_fixtures(&mut store, &[Fixture::new("dump", records)]).unwrap();
    store
}

// =============================================================================
// Dump / load
// =============================================================================

proptest! {
    /// Property: loading a JSON dump reproduces the store
    #[test]
    fn json_dump_reloads_to_same_store(store in store_strategy()) {
        let text = dump(&store, Format::Json, &[]).unwrap();
        prop_assert_eq!(reload(&text, Format::Json).records(), store.records());
    }

    /// Property: loading a block dump reproduces the store
    #[test]
    fn block_dump_reloads_to_same_store(store in store_strategy()) {
        let text = dump(&store, Format::Block, &[]).unwrap();
        prop_assert_eq!(reload(&text, Format::Block).records(), store.records());
    }

    /// Property: dumping is deterministic, so a reloaded store dumps to the same text
    #[test]
    fn dump_is_stable_across_reload(store in store_strategy()) {
        for format in Format::ALL {
            let first = dump(&store, format, &[]).unwrap();
            let second = dump(&reload(&first, format), format, &[]).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    /// Property: resetting always returns the store to baseline
    #[test]
    fn reset_returns_to_baseline(mut store in store_strategy()) {
        store.reset();
        prop_assert!(store.is_baseline());
        prop_assert_eq!(store.len(), 0);
    }

    /// Property: a failed batch leaves the store untouched
    #[test]
    fn rejected_batch_is_not_applied(mut store in store_strategy(), record in record_strategy()) {
        let before = store.records();
        let duplicated = vec![record.clone(), record];
        prop_assert!(store.apply_batch(duplicated).is_err());
        prop_assert_eq!(store.records(), before);
    }
}
