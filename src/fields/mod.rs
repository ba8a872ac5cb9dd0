//! Field descriptors: authoring-time rule bundles, one builder per field
//! type.
//!
//! Every builder is a pure factory: given authoring-time props it produces a
//! [`FieldDescriptor`] carrying a parser (dispatched on the closed
//! [`FieldKind`] union), an ordered validator chain (first non-`None` result
//! wins), declared dependency refs, a mode function, and a required
//! predicate. Constraints accept a static value or a context function via
//! [`Constraint`](crate::context::Constraint).

mod array;
mod boolean;
mod date;
mod file;
mod number;
mod string;
mod structure;

pub use array::ArrayField;
pub use boolean::BooleanField;
pub use date::{DateField, DateKind, DatePart, DateUnit, PairPosition, PairRule};
pub use file::FileField;
pub use number::NumberField;
pub use string::StringField;
pub use structure::{Schema, StructField};

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::context::{Constraint, RuleCtx};
use crate::mode::Mode;
use crate::outcome::{Code, FieldResult};

/// One link in a descriptor's validator chain.
pub type Validator = Rc<dyn Fn(&RuleCtx) -> Option<FieldResult>>;

type ModeFn = Rc<dyn Fn(&RuleCtx) -> Mode>;

/// Parser output: a normalized value (or `None` when absent/unparsable) and
/// an optional parse error. A parse error short-circuits the field's
/// validator chain for that pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub value: Option<Value>,
    pub error: Option<FieldResult>,
}

impl Parsed {
    pub(crate) fn absent() -> Self {
        Self {
            value: None,
            error: None,
        }
    }

    pub(crate) fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            error: None,
        }
    }

    pub(crate) fn failed() -> Self {
        Self {
            value: None,
            error: Some(FieldResult::error(Code::Parse)),
        }
    }
}

/// Closed union of field types. One module per tag; the dispatcher below
/// matches on the tag rather than using open-ended inheritance.
#[derive(Debug)]
pub enum FieldKind {
    Str(StringField),
    Number(NumberField),
    Boolean(BooleanField),
    Date(DateField),
    Array(ArrayField),
    Struct(StructField),
    File(FileField),
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Str(_) => "string",
            FieldKind::Number(_) => "number",
            FieldKind::Boolean(_) => "boolean",
            FieldKind::Date(d) => d.kind().type_name(),
            FieldKind::Array(_) => "array",
            FieldKind::Struct(_) => "struct",
            FieldKind::File(_) => "file",
        }
    }
}

/// Immutable, authoring-time description of one field.
pub struct FieldDescriptor {
    pub(crate) kind: FieldKind,
    pub(crate) label: Option<String>,
    pub(crate) required: Option<Constraint<bool>>,
    pub(crate) mode: Option<ModeFn>,
    pub(crate) refs: Vec<String>,
    pub(crate) validators: Vec<Validator>,
}

impl FieldDescriptor {
    pub(crate) fn of(kind: FieldKind, validators: Vec<Validator>) -> Self {
        Self {
            kind,
            label: None,
            required: None,
            mode: None,
            refs: Vec::new(),
            validators,
        }
    }

    // --- builder combinators ---

    /// Set the display label (defaults to the last path segment).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Mark the field required, statically or via a context predicate.
    pub fn required(mut self, required: impl Into<Constraint<bool>>) -> Self {
        self.required = Some(required.into());
        self
    }

    /// Install a dynamic mode function (default: enabled).
    pub fn mode(mut self, mode: impl Fn(&RuleCtx) -> Mode + 'static) -> Self {
        self.mode = Some(Rc::new(mode));
        self
    }

    /// Declare relative paths this field's validity depends on.
    pub fn refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refs.extend(refs.into_iter().map(Into::into));
        self
    }

    /// Append an authored validator after the built-in chain.
    pub fn validator(
        mut self,
        validator: impl Fn(&RuleCtx) -> Option<FieldResult> + 'static,
    ) -> Self {
        self.validators.push(Rc::new(validator));
        self
    }

    // --- accessors ---

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Declared dependency refs (relative paths).
    pub fn dependencies(&self) -> &[String] {
        &self.refs
    }

    /// The authored label, or the last segment of `path` as a fallback.
    pub fn resolved_label(&self, path: &str) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        crate::path::parse(path)
            .iter()
            .rev()
            .find_map(|seg| match seg {
                crate::path::Segment::Key(k) => Some(k.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Evaluate the required predicate.
    pub fn is_required(&self, ctx: &RuleCtx) -> bool {
        match &self.required {
            Some(required) => required.resolve(ctx).unwrap_or(false),
            None => false,
        }
    }

    /// Evaluate the field's own mode function (not the ancestor cascade).
    pub fn mode_in(&self, ctx: &RuleCtx) -> Mode {
        match &self.mode {
            Some(mode) => mode(ctx),
            None => Mode::Enabled,
        }
    }

    /// Run the parser for this field's type.
    pub fn parse(&self, raw: Option<&Value>) -> Parsed {
        match &self.kind {
            FieldKind::Str(f) => f.parse(raw),
            FieldKind::Number(f) => f.parse(raw),
            FieldKind::Boolean(f) => f.parse(raw),
            FieldKind::Date(f) => f.parse(raw),
            FieldKind::Array(f) => f.parse(raw),
            FieldKind::Struct(f) => f.parse(raw),
            FieldKind::File(f) => f.parse(raw),
        }
    }

    /// Run the required check and the validator chain, in order; the first
    /// non-`None` outcome wins. Absent values are only checked for
    /// required-ness.
    pub fn validate(&self, ctx: &RuleCtx) -> Option<FieldResult> {
        if is_empty(ctx.value) {
            if self.is_required(ctx) {
                return Some(FieldResult::error(Code::Required));
            }
            return None;
        }
        for validator in &self.validators {
            if let Some(result) = validator(ctx) {
                return Some(result);
            }
        }
        None
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("type", &self.type_name())
            .field("label", &self.label)
            .field("refs", &self.refs)
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// "Absent" for validation purposes: null, empty string, empty array or
/// empty object.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Shift full-width characters (U+FF01..U+FF5E) to their ASCII forms and the
/// ideographic space to a plain space, so numeric and date input typed with
/// an IME still parses.
pub(crate) fn shift_fullwidth(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => {
                char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
            }
            '\u{3000}' => ' ',
            other => other,
        })
        .collect()
}

/// Membership test used by `source` (allowed-values) validators.
pub(crate) fn source_contains(allowed: &[Value], value: &Value) -> bool {
    allowed.iter().any(|candidate| candidate == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Env;
    use serde_json::json;

    fn ctx<'a>(value: &'a Value, data: &'a Value, deps: &'a Value, env: &'a Env) -> RuleCtx<'a> {
        RuleCtx {
            path: "field",
            value,
            data,
            deps,
            env,
        }
    }

    #[test]
    fn shift_fullwidth_digits() {
        assert_eq!(shift_fullwidth("１２３"), "123");
        assert_eq!(shift_fullwidth("１．５"), "1.5");
        assert_eq!(shift_fullwidth("abc"), "abc");
    }

    #[test]
    fn empty_values() {
        assert!(is_empty(&json!(null)));
        assert!(is_empty(&json!("")));
        assert!(is_empty(&json!([])));
        assert!(!is_empty(&json!(0)));
        assert!(!is_empty(&json!(false)));
        assert!(!is_empty(&json!("x")));
    }

    #[test]
    fn required_check_runs_before_chain() {
        let desc = StringField::new().min_length(3).build().required(true);
        let value = json!(null);
        let data = json!({});
        let deps = Value::Null;
        let env = Env::new();
        let result = desc.validate(&ctx(&value, &data, &deps, &env));
        assert_eq!(result, Some(FieldResult::error(Code::Required)));
    }

    #[test]
    fn absent_value_skips_chain_when_not_required() {
        let desc = StringField::new().min_length(3).build();
        let value = json!("");
        let data = json!({});
        let deps = Value::Null;
        let env = Env::new();
        assert_eq!(desc.validate(&ctx(&value, &data, &deps, &env)), None);
    }

    #[test]
    fn dynamic_required_predicate() {
        let desc = StringField::new()
            .build()
            .required(Constraint::computed(|ctx| {
                Some(ctx.at("other").map(|v| v == &json!(true)).unwrap_or(false))
            }));
        let value = json!(null);
        let deps = Value::Null;
        let env = Env::new();

        let data = json!({"other": true});
        assert_eq!(
            desc.validate(&ctx(&value, &data, &deps, &env)),
            Some(FieldResult::error(Code::Required))
        );

        let data = json!({"other": false});
        assert_eq!(desc.validate(&ctx(&value, &data, &deps, &env)), None);
    }

    #[test]
    fn custom_validator_appends_after_builtins() {
        let desc = StringField::new().build().validator(|ctx| {
            if ctx.value.as_str() == Some("forbidden") {
                Some(FieldResult::error(Code::Custom {
                    key: "forbiddenWord".into(),
                }))
            } else {
                None
            }
        });
        let value = json!("forbidden");
        let data = json!({});
        let deps = Value::Null;
        let env = Env::new();
        let result = desc.validate(&ctx(&value, &data, &deps, &env));
        assert_eq!(
            result,
            Some(FieldResult::error(Code::Custom {
                key: "forbiddenWord".into()
            }))
        );
    }

    #[test]
    fn resolved_label_falls_back_to_last_key() {
        let desc = StringField::new().build();
        assert_eq!(desc.resolved_label("order.lines[0].qty"), "qty");
        let labeled = StringField::new().build().label("Quantity");
        assert_eq!(labeled.resolved_label("order.lines[0].qty"), "Quantity");
    }
}
