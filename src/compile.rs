//! Schema compilation: one depth-first traversal of the schema tree against
//! the current data, in two passes.
//!
//! Pass one runs parsers and writes normalized values back into the store.
//! Validators are queued and run as a second pass so that any validator
//! (date pair checks, source membership over siblings) sees every field's
//! already-normalized value, not just fields visited earlier in traversal
//! order.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use serde_json::Value;

use crate::context::{Env, RuleCtx};
use crate::fields::{FieldDescriptor, FieldKind, Schema};
use crate::items::DataItem;
use crate::outcome::FieldResult;
use crate::path;
use crate::store::PathStore;

/// Path-keyed validation outcomes for one pass.
pub type ResultMap = HashMap<String, FieldResult>;

/// Output of a full compile.
#[derive(Debug)]
pub struct Compiled {
    /// The normalized data graph.
    pub data: Value,
    /// Validation outcomes keyed by path; absent means valid/untouched.
    pub results: ResultMap,
    /// True iff any result has error severity.
    pub has_error: bool,
    /// One data item per top-level schema member.
    pub items: Vec<DataItem>,
}

/// Compile a schema against raw input data.
///
/// Parsers normalize values in place; validators run as a deferred second
/// pass over the fully-normalized data.
pub fn compile(schema: &Schema, raw: Value, deps: &Value, env: &Env) -> Compiled {
    let mut store = PathStore::from_value(raw);
    let results = compile_into(schema, &mut store, deps, env);
    let items = build_items(schema);
    let has_error = results.values().any(FieldResult::is_error);
    debug!(
        "compiled schema: {} results, has_error={}",
        results.len(),
        has_error
    );
    Compiled {
        data: store.into_value(),
        results,
        has_error,
        items,
    }
}

/// Run both compiler passes over an existing store. Used for re-validation,
/// where the data item tree is reused rather than rebuilt.
pub(crate) fn compile_into(
    schema: &Schema,
    store: &mut PathStore,
    deps: &Value,
    env: &Env,
) -> ResultMap {
    let mut results = ResultMap::new();
    let mut pending: Vec<(String, Rc<FieldDescriptor>)> = Vec::new();

    if let FieldKind::Struct(root) = schema.root().kind() {
        for (name, descriptor) in root.members() {
            walk(descriptor, name, store, &mut results, &mut pending);
        }
    }

    run_deferred(pending, store, deps, env, &mut results);
    results
}

/// Materialize the data item tree (first compile of a session only).
pub(crate) fn build_items(schema: &Schema) -> Vec<DataItem> {
    match schema.root().kind() {
        FieldKind::Struct(root) => root
            .members()
            .map(|(name, descriptor)| DataItem::build(name.to_string(), Rc::clone(descriptor)))
            .collect(),
        _ => Vec::new(),
    }
}

fn walk(
    descriptor: &Rc<FieldDescriptor>,
    path: &str,
    store: &mut PathStore,
    results: &mut ResultMap,
    pending: &mut Vec<(String, Rc<FieldDescriptor>)>,
) {
    // split-date components: the stored value is an object of numeric parts,
    // each normalized and bound-checked independently
    if let FieldKind::Date(date) = descriptor.kind() {
        if !date.parts().is_empty() && !matches!(store.get(path), Some(Value::String(_))) {
            for (unit, part) in date.parts() {
                let part_path = path::join_key(path, unit.as_str());
                let raw = store.get(&part_path).cloned();
                let (value, result) = part.check(raw.as_ref());
                if let Some(v) = value {
                    if raw.as_ref() != Some(&v) {
                        store.set(&part_path, v);
                    }
                }
                if let Some(r) = result {
                    results.insert(part_path, r);
                }
            }
            return;
        }
    }

    let raw = store.get(path).cloned();
    let parsed = descriptor.parse(raw.as_ref());

    if let Some(error) = parsed.error {
        // unparsable raw input: no value, and the validator chain is
        // short-circuited for this pass
        if raw.is_some() {
            store.set(path, Value::Null);
        }
        results.insert(path.to_string(), error);
        return;
    }

    if let Some(value) = parsed.value {
        if raw.as_ref() != Some(&value) {
            store.set(path, value);
        }
    }
    pending.push((path.to_string(), Rc::clone(descriptor)));

    match descriptor.kind() {
        FieldKind::Struct(s) => {
            for (name, child) in s.members() {
                walk(child, &path::join_key(path, name), store, results, pending);
            }
        }
        FieldKind::Array(a) => {
            // iteration count is driven by the current data's length, not a
            // declared bound: adding an element updates the count next pass
            let len = store
                .get(path)
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            for i in 0..len {
                walk(
                    a.element(),
                    &path::join_index(path, i),
                    store,
                    results,
                    pending,
                );
            }
        }
        _ => {}
    }
}

fn run_deferred(
    pending: Vec<(String, Rc<FieldDescriptor>)>,
    store: &PathStore,
    deps: &Value,
    env: &Env,
    results: &mut ResultMap,
) {
    let null = Value::Null;
    for (path, descriptor) in pending {
        if results.contains_key(&path) {
            continue;
        }
        let value = store.get(&path).unwrap_or(&null);
        let ctx = RuleCtx {
            path: &path,
            value,
            data: store.data(),
            deps,
            env,
        };
        if let Some(result) = descriptor.validate(&ctx) {
            results.insert(path, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{
        ArrayField, DateField, DatePart, DateUnit, NumberField, PairRule, StringField, StructField,
    };
    use crate::outcome::Code;
    use serde_json::json;

    fn env() -> Env {
        Env::new()
    }

    #[test]
    fn normalizes_and_validates_number() {
        let schema = Schema::new(StructField::new().field(
            "age",
            NumberField::new().min(0.0).max(120.0).build().required(true),
        ));
        let compiled = compile(&schema, json!({"age": "15"}), &Value::Null, &env());
        assert_eq!(compiled.data["age"], json!(15));
        assert!(compiled.results.get("age").is_none());
        assert!(!compiled.has_error);
    }

    #[test]
    fn parse_failure_short_circuits_validators() {
        let schema = Schema::new(StructField::new().field(
            "age",
            NumberField::new().min(0.0).max(120.0).build().required(true),
        ));
        let compiled = compile(&schema, json!({"age": "abc"}), &Value::Null, &env());
        assert_eq!(compiled.data["age"], Value::Null);
        assert_eq!(compiled.results["age"].code, Code::Parse);
        assert!(compiled.has_error);
    }

    #[test]
    fn required_absent_field() {
        let schema = Schema::new(
            StructField::new().field("name", StringField::new().build().required(true)),
        );
        let compiled = compile(&schema, json!({}), &Value::Null, &env());
        assert_eq!(compiled.results["name"].code, Code::Required);
    }

    #[test]
    fn pair_validator_sees_normalized_sibling() {
        // "end" is declared before "start"; the deferred pass still sees
        // start's normalized value
        let schema = Schema::new(
            StructField::new()
                .field(
                    "end",
                    DateField::date().pair(PairRule::after("start")).build(),
                )
                .field("start", DateField::date().build()),
        );
        let compiled = compile(
            &schema,
            json!({"start": "2024/1/10", "end": "2024-01-01"}),
            &Value::Null,
            &env(),
        );
        assert_eq!(compiled.data["start"], json!("2024-01-10"));
        assert_eq!(
            compiled.results["end"].code,
            Code::PairAfter {
                name: "start".into()
            }
        );
    }

    #[test]
    fn array_traversal_is_data_shape_driven() {
        let schema = Schema::new(StructField::new().field(
            "tags",
            ArrayField::new(NumberField::new().min(0.0).build()).min(2).build(),
        ));
        let compiled = compile(&schema, json!({"tags": ["1", "-3"]}), &Value::Null, &env());
        // elements normalized in place
        assert_eq!(compiled.data["tags"], json!([1, -3]));
        // element result addressed by indexed path
        assert_eq!(
            compiled.results["tags[1]"].code,
            Code::Min { min: 0.0 }
        );
        assert!(compiled.results.get("tags").is_none());
    }

    #[test]
    fn array_min_count() {
        let schema = Schema::new(StructField::new().field(
            "tags",
            ArrayField::new(StringField::new().build()).min(2).build(),
        ));
        let compiled = compile(&schema, json!({"tags": ["a"]}), &Value::Null, &env());
        assert_eq!(compiled.results["tags"].code, Code::MinLength { min: 2 });
    }

    #[test]
    fn nested_struct_paths() {
        let schema = Schema::new(
            StructField::new().field(
                "user",
                StructField::new()
                    .field("name", StringField::new().min_length(2).build())
                    .build(),
            ),
        );
        let compiled = compile(&schema, json!({"user": {"name": "x"}}), &Value::Null, &env());
        assert_eq!(
            compiled.results["user.name"].code,
            Code::MinLength { min: 2 }
        );
    }

    #[test]
    fn deterministic_over_same_input() {
        let schema = Schema::new(
            StructField::new()
                .field("age", NumberField::new().min(18.0).build())
                .field("name", StringField::new().min_length(2).build()),
        );
        let input = json!({"age": "15", "name": "a"});
        let first = compile(&schema, input.clone(), &Value::Null, &env());
        let second = compile(&schema, input, &Value::Null, &env());
        assert_eq!(first.results, second.results);
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn items_materialize_per_top_level_member() {
        let schema = Schema::new(
            StructField::new()
                .field("name", StringField::new().build())
                .field("age", NumberField::new().build()),
        );
        let compiled = compile(&schema, json!({}), &Value::Null, &env());
        let names: Vec<&str> = compiled.items.iter().map(|i| i.name()).collect();
        assert_eq!(names, ["name", "age"]);
    }

    #[test]
    fn split_date_parts_validated_independently() {
        let schema = Schema::new(StructField::new().field(
            "birth",
            DateField::date()
                .part(DateUnit::Year, DatePart::new().min(1900).max(2100).required())
                .part(DateUnit::Month, DatePart::new().min(1).max(12))
                .build(),
        ));
        let compiled = compile(
            &schema,
            json!({"birth": {"year": "1985", "month": "13"}}),
            &Value::Null,
            &env(),
        );
        assert_eq!(compiled.data["birth"]["year"], json!(1985));
        assert!(compiled.results.get("birth.year").is_none());
        assert_eq!(
            compiled.results["birth.month"].code,
            Code::Max { max: 12.0 }
        );
    }

    #[test]
    fn split_date_missing_required_part() {
        let schema = Schema::new(StructField::new().field(
            "birth",
            DateField::date()
                .part(DateUnit::Year, DatePart::new().required())
                .build(),
        ));
        let compiled = compile(&schema, json!({}), &Value::Null, &env());
        assert_eq!(compiled.results["birth.year"].code, Code::Required);
    }
}
