//! Array fields: one repeated element descriptor plus bounds on the
//! element count.

use std::rc::Rc;

use serde_json::Value;

use super::{source_contains, FieldDescriptor, FieldKind, Parsed, Validator};
use crate::context::Constraint;
use crate::outcome::{Code, FieldResult};

/// Builder for array fields.
///
/// `source` (allowed element values) supersedes the plain count bounds when
/// both are declared, mirroring the string field's constraint groups.
#[derive(Debug)]
pub struct ArrayField {
    element: Rc<FieldDescriptor>,
    length: Option<Constraint<usize>>,
    min: Option<Constraint<usize>>,
    max: Option<Constraint<usize>>,
    source: Option<Constraint<Vec<Value>>>,
}

impl ArrayField {
    pub fn new(element: FieldDescriptor) -> Self {
        Self {
            element: Rc::new(element),
            length: None,
            min: None,
            max: None,
            source: None,
        }
    }

    /// Exact element count.
    pub fn length(mut self, length: impl Into<Constraint<usize>>) -> Self {
        self.length = Some(length.into());
        self
    }

    /// Minimum element count.
    pub fn min(mut self, min: impl Into<Constraint<usize>>) -> Self {
        self.min = Some(min.into());
        self
    }

    /// Maximum element count.
    pub fn max(mut self, max: impl Into<Constraint<usize>>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Allowed element values. Supersedes the count bounds.
    pub fn source(mut self, source: impl Into<Constraint<Vec<Value>>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn build(self) -> FieldDescriptor {
        let mut validators: Vec<Validator> = Vec::new();

        if let Some(source) = self.source.clone() {
            validators.push(Rc::new(move |ctx| {
                let allowed = source.resolve(ctx)?;
                let items = ctx.value.as_array()?;
                let ok = items.iter().all(|item| source_contains(&allowed, item));
                (!ok).then(|| FieldResult::error(Code::Source))
            }));
        } else {
            if let Some(length) = self.length.clone() {
                validators.push(Rc::new(move |ctx| {
                    let len = length.resolve(ctx)?;
                    let actual = ctx.value.as_array()?.len();
                    (actual != len).then(|| FieldResult::error(Code::Length { len }))
                }));
            }
            if let Some(min) = self.min.clone() {
                validators.push(Rc::new(move |ctx| {
                    let min = min.resolve(ctx)?;
                    let actual = ctx.value.as_array()?.len();
                    (actual < min).then(|| FieldResult::error(Code::MinLength { min }))
                }));
            }
            if let Some(max) = self.max.clone() {
                validators.push(Rc::new(move |ctx| {
                    let max = max.resolve(ctx)?;
                    let actual = ctx.value.as_array()?.len();
                    (actual > max).then(|| FieldResult::error(Code::MaxLength { max }))
                }));
            }
        }

        FieldDescriptor::of(FieldKind::Array(self), validators)
    }

    /// The repeated element descriptor.
    pub fn element(&self) -> &Rc<FieldDescriptor> {
        &self.element
    }

    pub(crate) fn parse(&self, raw: Option<&Value>) -> Parsed {
        match raw {
            None | Some(Value::Null) => Parsed::absent(),
            Some(v @ Value::Array(_)) => Parsed::value(v.clone()),
            // single value promotes to a one-element array (flat-map hydration
            // leaves singletons unwrapped)
            Some(other) => Parsed::value(Value::Array(vec![other.clone()])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Env, RuleCtx};
    use crate::fields::StringField;
    use serde_json::json;

    fn tags() -> FieldDescriptor {
        ArrayField::new(StringField::new().build()).min(2).build()
    }

    fn validate(desc: &FieldDescriptor, value: Value) -> Option<FieldResult> {
        let data = json!({});
        let deps = Value::Null;
        let env = Env::new();
        desc.validate(&RuleCtx {
            path: "tags",
            value: &value,
            data: &data,
            deps: &deps,
            env: &env,
        })
    }

    #[test]
    fn min_count_reports_min_length() {
        assert_eq!(
            validate(&tags(), json!(["a"])),
            Some(FieldResult::error(Code::MinLength { min: 2 }))
        );
        assert_eq!(validate(&tags(), json!(["a", "b"])), None);
    }

    #[test]
    fn max_count_reports_max_length() {
        let desc = ArrayField::new(StringField::new().build()).max(1).build();
        assert_eq!(
            validate(&desc, json!(["a", "b"])),
            Some(FieldResult::error(Code::MaxLength { max: 1 }))
        );
    }

    #[test]
    fn source_checks_membership_and_supersedes_bounds() {
        let desc = ArrayField::new(StringField::new().build())
            .min(5)
            .source(vec![json!("a"), json!("b")])
            .build();
        // violates min but all members allowed
        assert_eq!(validate(&desc, json!(["a"])), None);
        assert_eq!(
            validate(&desc, json!(["a", "z"])),
            Some(FieldResult::error(Code::Source))
        );
    }

    #[test]
    fn parse_promotes_singletons() {
        let f = ArrayField::new(StringField::new().build());
        assert_eq!(
            f.parse(Some(&json!("solo"))),
            Parsed::value(json!(["solo"]))
        );
        assert_eq!(f.parse(Some(&json!(["a"]))), Parsed::value(json!(["a"])));
    }

    #[test]
    fn empty_array_not_validated_unless_required() {
        assert_eq!(validate(&tags(), json!([])), None);
        let required = ArrayField::new(StringField::new().build())
            .min(2)
            .build()
            .required(true);
        assert_eq!(
            validate(&required, json!([])),
            Some(FieldResult::error(Code::Required))
        );
    }
}
