//! Evaluation context threaded through parsers, validators, and mode
//! functions.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// Host environment supplied at compile time.
///
/// Carries the server/client flag and an optional text-lookup hook. The
/// engine itself only ever produces result *codes*; the lookup hook exists
/// for authored validators that need to key a locale table.
#[derive(Clone, Default)]
pub struct Env {
    pub is_server: bool,
    lookup: Option<Rc<dyn Fn(&str) -> String>>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server() -> Self {
        Self {
            is_server: true,
            lookup: None,
        }
    }

    /// Install a text-lookup hook.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> String + 'static) -> Self {
        self.lookup = Some(Rc::new(lookup));
        self
    }

    /// Resolve a text key through the installed hook, if any.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.lookup.as_ref().map(|f| f(key))
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("is_server", &self.is_server)
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}

/// Context handed to every validator, dynamic constraint, mode function,
/// and required predicate for one field at one point in time.
pub struct RuleCtx<'a> {
    /// Absolute path of the field under evaluation.
    pub path: &'a str,
    /// The field's current (normalized) value; `Null` when absent.
    pub value: &'a Value,
    /// The whole session data graph.
    pub data: &'a Value,
    /// Externally supplied dependency context.
    pub deps: &'a Value,
    pub env: &'a Env,
}

impl<'a> RuleCtx<'a> {
    /// Read another field's value by a relative reference from this field.
    pub fn relative(&self, reference: &str) -> Option<&'a Value> {
        let absolute = crate::path::resolve_relative(self.path, reference);
        lookup(self.data, &absolute)
    }

    /// Read another field's value by absolute path.
    pub fn at(&self, path: &str) -> Option<&'a Value> {
        lookup(self.data, path)
    }
}

/// Read-only path lookup over a nested value graph.
pub fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    use crate::path::Segment;
    let mut cur = root;
    for seg in crate::path::parse(path) {
        match seg {
            Segment::Key(k) => cur = cur.as_object()?.get(&k)?,
            Segment::Index(i) => cur = cur.as_array()?.get(i)?,
            Segment::Append => return None,
        }
    }
    Some(cur)
}

/// A constraint parameter: either a static value fixed at authoring time or
/// a function of the evaluation context, resolved per validation call.
pub enum Constraint<T> {
    Value(T),
    Computed(Rc<dyn Fn(&RuleCtx) -> Option<T>>),
}

impl<T: Clone> Constraint<T> {
    /// Build the dynamic form from a closure.
    pub fn computed(f: impl Fn(&RuleCtx) -> Option<T> + 'static) -> Self {
        Constraint::Computed(Rc::new(f))
    }

    /// Resolve against a context. The dynamic form may decline (`None`),
    /// which switches the constraint off for that call.
    pub fn resolve(&self, ctx: &RuleCtx) -> Option<T> {
        match self {
            Constraint::Value(v) => Some(v.clone()),
            Constraint::Computed(f) => f(ctx),
        }
    }
}

impl<T> From<T> for Constraint<T> {
    fn from(value: T) -> Self {
        Constraint::Value(value)
    }
}

impl<T> Clone for Constraint<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Constraint::Value(v) => Constraint::Value(v.clone()),
            Constraint::Computed(f) => Constraint::Computed(Rc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Constraint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Constraint::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx<'a>(value: &'a Value, data: &'a Value, deps: &'a Value, env: &'a Env) -> RuleCtx<'a> {
        RuleCtx {
            path: "order.end",
            value,
            data,
            deps,
            env,
        }
    }

    #[test]
    fn static_constraint_resolves_to_itself() {
        let c: Constraint<usize> = 3.into();
        let value = json!("x");
        let data = json!({});
        let deps = Value::Null;
        let env = Env::new();
        assert_eq!(c.resolve(&ctx(&value, &data, &deps, &env)), Some(3));
    }

    #[test]
    fn computed_constraint_reads_context() {
        let c: Constraint<f64> =
            Constraint::computed(|ctx| ctx.at("limits.max").and_then(|v| v.as_f64()));
        let value = json!(5);
        let data = json!({"limits": {"max": 10.0}});
        let deps = Value::Null;
        let env = Env::new();
        assert_eq!(c.resolve(&ctx(&value, &data, &deps, &env)), Some(10.0));
    }

    #[test]
    fn relative_lookup_from_ctx() {
        let value = json!("2024-01-01");
        let data = json!({"order": {"start": "2023-12-01", "end": "2024-01-01"}});
        let deps = Value::Null;
        let env = Env::new();
        let c = ctx(&value, &data, &deps, &env);
        assert_eq!(c.relative(".start"), Some(&json!("2023-12-01")));
    }

    #[test]
    fn env_lookup_hook() {
        let env = Env::new().with_lookup(|key| format!("text:{}", key));
        assert_eq!(env.lookup("greeting").as_deref(), Some("text:greeting"));
        assert_eq!(Env::new().lookup("greeting"), None);
    }
}
