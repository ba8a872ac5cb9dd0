//! Schema-driven form data and validation engine.
//!
//! A schema is a tree of field descriptors (string, number, boolean, date,
//! array, struct, file) built through per-type builders. Compiling a schema
//! against raw input runs each field's parser (normalizing values in place
//! in a path-addressed store) and then, as a deferred second pass, each
//! field's validator chain over the fully-normalized data. A [`FormSession`]
//! wraps the same machinery reactively: mutations flow through a single
//! controller that batches change events to subscribers, and a
//! [`FieldBinding`] per UI field re-parses on its own changes and
//! re-validates when a declared dependency changes.
//!
//! # Example
//!
//! ```
//! use formkit::{compile, Code, Env, NumberField, Schema, StringField, StructField};
//! use serde_json::{json, Value};
//!
//! let schema = Schema::new(
//!     StructField::new()
//!         .field("name", StringField::new().min_length(2).build().required(true))
//!         .field("age", NumberField::new().min(0.0).max(120.0).build()),
//! );
//!
//! let compiled = compile(
//!     &schema,
//!     json!({"name": "Ada", "age": "１５"}),
//!     &Value::Null,
//!     &Env::new(),
//! );
//!
//! // full-width input normalized to a plain number
//! assert_eq!(compiled.data["age"], json!(15));
//! assert!(!compiled.has_error);
//!
//! let compiled = compile(&schema, json!({"age": 200}), &Value::Null, &Env::new());
//! assert_eq!(compiled.results["name"].code, Code::Required);
//! assert_eq!(compiled.results["age"].code, Code::Max { max: 120.0 });
//! ```
//!
//! # Paths
//!
//! Every field is addressed by a path string: dotted keys (`user.name`),
//! numeric indices (`lines[0].qty`), and an append segment (`tags[]`) for
//! pushes. Dependency refs are written relative to the declaring field:
//! leading dots strip trailing segments from its path (`.start` names a
//! sibling).

mod compile;
mod context;
mod fields;
mod items;
mod mode;
mod outcome;
mod path;
mod session;
mod store;

pub use compile::{compile, Compiled, ResultMap};
pub use context::{lookup, Constraint, Env, RuleCtx};
pub use fields::{
    is_empty, ArrayField, BooleanField, DateField, DateKind, DatePart, DateUnit, FieldDescriptor,
    FieldKind, FileField, NumberField, PairPosition, PairRule, Parsed, Schema, StringField,
    StructField, Validator,
};
pub use items::{Children, DataItem};
pub use mode::{apply_scope, cascade, FieldSetState, Mode};
pub use outcome::{Code, FieldResult, Severity};
pub use path::{join_index, join_key, resolve_relative, Segment};
pub use session::{
    ChangeEvent, Delta, FieldBinding, FormSession, MountInfo, ResultDelta, SubscriptionId,
    ValidateTrigger,
};
pub use store::{PathStore, StoreError};
