//! Directive interpreter for transcript units.
//!
//! A transcript directive (`>>> count polls.poll`) is handed to an [`Interpreter`], whose output is compared with the
//! transcript's expected text. [`StoreInterpreter`] is the built-in one: a small command language over the store.
//!
//! | Command | Output |
//! |---------|--------|
//! | `create <entity> <pk> [field=value ...]` | nothing |
//! | `update <entity> <pk> field=value ...` | nothing |
//! | `get <entity> <pk>` | `{"field": value, ...}` |
//! | `delete <entity> <pk>` | nothing |
//! | `count <entity>` | the record count |
//! | `keys <entity>` | `[1, 2, "c"]` |
//! | `dump <format> [entity ...]` | fixture text |
//! | `echo <text>` | `<text>` |
//!
//! Values use the block fixture syntax: `votes=3`, `question="What's up?"`, `closed=true`, `owner=null`.

use testbed_core::{Fields, PrimaryKey, Store, render_fields};
use testbed_syntax::Format;
use testbed_syntax::block::{parse_key, parse_scalar};

use crate::loader::dump;
use crate::unit::Fault;

/// Evaluates transcript directives against the store.
pub trait Interpreter {
    /// Run one directive and return what it printed.
    fn eval(&mut self, store: &mut Store, directive: &str) -> Result<String, Fault>;

    /// Forget any per-unit state. Called before each unit.
    fn reset(&mut self) {}
}

/// The built-in store command interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreInterpreter;

impl StoreInterpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Interpreter for StoreInterpreter {
    fn eval(&mut self, store: &mut Store, directive: &str) -> Result<String, Fault> {
        // Trailing whitespace is kept: it is part of an `echo` argument.
        let directive = directive.trim_start();
        let (command, rest) = directive.split_once(char::is_whitespace).unwrap_or((directive, ""));

        // `echo` takes its argument verbatim after the separating whitespace.
        if command == "echo" {
            return Ok(rest.trim_start().to_string());
        }

        let args = split_args(rest)?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match (command, args.as_slice()) {
            ("create", [entity, key, assignments @ ..]) => {
                let key = key_arg(key)?;
                store.create(entity, key, assignments_arg(assignments)?)?;
                Ok(String::new())
            }
            ("update", [entity, key, assignments @ ..]) if !assignments.is_empty() => {
                let key = key_arg(key)?;
                store.update(entity, &key, assignments_arg(assignments)?)?;
                Ok(String::new())
            }
            ("get", [entity, key]) => {
                let key = key_arg(key)?;
                Ok(render_fields(store.fetch(entity, &key)?))
            }
            ("delete", [entity, key]) => {
                let key = key_arg(key)?;
                store.delete(entity, &key)?;
                Ok(String::new())
            }
            ("count", [entity]) => Ok(store.count(entity)?.to_string()),
            ("keys", [entity]) => {
                let keys: Vec<String> = store.keys(entity)?.iter().map(PrimaryKey::to_string).collect();
                Ok(format!("[{}]", keys.join(", ")))
            }
            ("dump", [format, entities @ ..]) => {
                let format: Format = format.parse().map_err(Fault::new)?;
                let entities: Vec<String> = entities.iter().map(|e| e.to_string()).collect();
                let text = dump(store, format, &entities).map_err(|e| Fault::new(e.to_string()))?;
                Ok(text.trim_end_matches('\n').to_string())
            }
            ("create" | "update" | "get" | "delete" | "count" | "keys" | "dump", _) => {
                Err(Fault::new(format!("usage: {}", usage(command))))
            }
            ("", _) => Err(Fault::new("empty directive")),
            _ => Err(Fault::new(format!("unknown command '{command}'"))),
        }
    }
}

fn usage(command: &str) -> &'static str {
    match command {
        "create" => "create <entity> <pk> [field=value ...]",
        "update" => "update <entity> <pk> field=value ...",
        "get" => "get <entity> <pk>",
        "delete" => "delete <entity> <pk>",
        "count" => "count <entity>",
        "keys" => "keys <entity>",
        _ => "dump <json|block> [entity ...]",
    }
}

fn key_arg(text: &str) -> Result<PrimaryKey, Fault> {
    parse_key(text).map_err(|e| Fault::new(format!("invalid primary key '{text}': {}", e.message)))
}

fn assignments_arg(assignments: &[&str]) -> Result<Fields, Fault> {
    let mut fields = Fields::new();
    for assignment in assignments {
        let Some((name, value)) = assignment.split_once('=') else {
            return Err(Fault::new(format!("expected field=value, found '{assignment}'")));
        };
        if name.is_empty() {
            return Err(Fault::new(format!("missing field name in '{assignment}'")));
        }
        let value =
            parse_scalar(value).map_err(|e| Fault::new(format!("invalid value for '{name}': {}", e.message)))?;
        if fields.insert(name.to_string(), value).is_some() {
            return Err(Fault::new(format!("field '{name}' given twice")));
        }
    }
    Ok(fields)
}

/// Split on whitespace outside double quotes. Quotes and escapes are kept for the scalar parser.
fn split_args(text: &str) -> Result<Vec<String>, Fault> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\\' if in_quotes => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err(Fault::new("unterminated string in directive"));
    }
    if !current.is_empty() {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use testbed_core::{EntityType, Schema};

    fn store() -> Store {
        Store::new(
            Schema::from_entities([
                EntityType::new("polls.poll").with_fields(["question", "votes"]),
                EntityType::new("polls.choice"),
            ])
            .unwrap(),
        )
    }

    fn run(store: &mut Store, directives: &[&str]) -> Vec<Result<String, Fault>> {
        let mut interp = StoreInterpreter::new();
        directives.iter().map(|d| interp.eval(store, d)).collect()
    }

    #[test]
    fn test_create_get_count() {
        let mut store = store();
        let out = run(
            &mut store,
            &[
                r#"create polls.poll 1 question="What's up?" votes=0"#,
                "create polls.poll 2",
                "get polls.poll 1",
                "count polls.poll",
                "keys polls.poll",
            ],
        );
        assert_eq!(out[0], Ok(String::new()));
        assert_eq!(out[2], Ok(r#"{"question": "What's up?", "votes": 0}"#.to_string()));
        assert_eq!(out[3], Ok("2".to_string()));
        assert_eq!(out[4], Ok("[1, 2]".to_string()));
    }

    #[test]
    fn test_update_and_delete() {
        let mut store = store();
        let out = run(
            &mut store,
            &[
                "create polls.poll 1 votes=1",
                "update polls.poll 1 votes=2",
                "get polls.poll 1",
                "delete polls.poll 1",
                "count polls.poll",
                "delete polls.poll 1",
            ],
        );
        assert_eq!(out[2], Ok(r#"{"votes": 2}"#.to_string()));
        assert_eq!(out[4], Ok("0".to_string()));
        assert_eq!(
            out[5],
            Err(Fault::new("no 'polls.poll' record with primary key 1"))
        );
    }

    #[test]
    fn test_string_keys_and_spaces_in_values() {
        let mut store = store();
        let out = run(
            &mut store,
            &[
                r#"create polls.choice "c 1" text="two words" weight=0.5"#,
                r#"get polls.choice "c 1""#,
                "keys polls.choice",
            ],
        );
        assert_eq!(out[1], Ok(r#"{"text": "two words", "weight": 0.5}"#.to_string()));
        assert_eq!(out[2], Ok(r#"["c 1"]"#.to_string()));
    }

    #[test]
    fn test_dump_and_echo() {
        let mut store = store();
        let out = run(
            &mut store,
            &[
                "create polls.poll 1 votes=3",
                "dump block",
                "echo  hello   world",
                "echo trailing  ",
                "count polls.poll ",
            ],
        );
        assert_eq!(out[1], Ok("[polls.poll 1]\nvotes = 3".to_string()));
        assert_eq!(out[2], Ok("hello   world".to_string()));
        assert_eq!(out[3], Ok("trailing  ".to_string()));
        assert_eq!(out[4], Ok("1".to_string()));
    }

    #[test]
    fn test_errors() {
        let mut store = store();
        let out = run(
            &mut store,
            &[
                "frobnicate x",
                "count",
                "create polls.poll x",
                "create polls.poll 1 votes",
                "create polls.poll 1 colour=1",
                r#"create polls.poll 1 question="open"#,
                "count ghosts",
            ],
        );
        assert_eq!(out[0], Err(Fault::new("unknown command 'frobnicate'")));
        assert_eq!(out[1], Err(Fault::new("usage: count <entity>")));
        assert!(matches!(&out[2], Err(f) if f.message.starts_with("invalid primary key 'x'")));
        assert_eq!(out[3], Err(Fault::new("expected field=value, found 'votes'")));
        assert_eq!(
            out[4],
            Err(Fault::new("entity type 'polls.poll' has no field 'colour'"))
        );
        assert_eq!(out[5], Err(Fault::new("unterminated string in directive")));
        assert_eq!(out[6], Err(Fault::new("unknown entity type 'ghosts'")));
    }
}
