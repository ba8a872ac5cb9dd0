//! String fields.

use std::rc::Rc;

use regex::Regex;
use serde_json::Value;

use super::{source_contains, FieldDescriptor, FieldKind, Parsed, Validator};
use crate::context::Constraint;
use crate::outcome::{Code, FieldResult};

/// Builder for string fields.
///
/// Length bounds (`length`, `min_length`, `max_length`) and `source`
/// (allowed values) are mutually exclusive constraint groups: declaring a
/// source supersedes the plain length bounds.
#[derive(Debug, Default)]
pub struct StringField {
    length: Option<Constraint<usize>>,
    min_length: Option<Constraint<usize>>,
    max_length: Option<Constraint<usize>>,
    pattern: Option<Regex>,
    source: Option<Constraint<Vec<Value>>>,
    trim: bool,
}

impl StringField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact character count.
    pub fn length(mut self, length: impl Into<Constraint<usize>>) -> Self {
        self.length = Some(length.into());
        self
    }

    pub fn min_length(mut self, min: impl Into<Constraint<usize>>) -> Self {
        self.min_length = Some(min.into());
        self
    }

    pub fn max_length(mut self, max: impl Into<Constraint<usize>>) -> Self {
        self.max_length = Some(max.into());
        self
    }

    /// Full-match regular expression constraint. The pattern is anchored at
    /// both ends; it must match the whole value, not a substring.
    ///
    /// # Panics
    ///
    /// Panics on an invalid pattern: schema construction happens at
    /// authoring time, so a malformed pattern is a configuration bug.
    pub fn pattern(mut self, pattern: &str) -> Self {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .unwrap_or_else(|e| panic!("invalid pattern {:?}: {}", pattern, e));
        self.pattern = Some(regex);
        self
    }

    /// Allowed values. Supersedes the length bounds.
    pub fn source(mut self, source: impl Into<Constraint<Vec<Value>>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Trim surrounding whitespace during parsing.
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn build(self) -> FieldDescriptor {
        let mut validators: Vec<Validator> = Vec::new();

        if let Some(source) = self.source.clone() {
            validators.push(Rc::new(move |ctx| {
                let allowed = source.resolve(ctx)?;
                if source_contains(&allowed, ctx.value) {
                    None
                } else {
                    Some(FieldResult::error(Code::Source))
                }
            }));
        } else {
            if let Some(length) = self.length.clone() {
                validators.push(Rc::new(move |ctx| {
                    let len = length.resolve(ctx)?;
                    let actual = ctx.value.as_str()?.chars().count();
                    (actual != len).then(|| FieldResult::error(Code::Length { len }))
                }));
            }
            if let Some(min) = self.min_length.clone() {
                validators.push(Rc::new(move |ctx| {
                    let min = min.resolve(ctx)?;
                    let actual = ctx.value.as_str()?.chars().count();
                    (actual < min).then(|| FieldResult::error(Code::MinLength { min }))
                }));
            }
            if let Some(max) = self.max_length.clone() {
                validators.push(Rc::new(move |ctx| {
                    let max = max.resolve(ctx)?;
                    let actual = ctx.value.as_str()?.chars().count();
                    (actual > max).then(|| FieldResult::error(Code::MaxLength { max }))
                }));
            }
        }

        if let Some(regex) = self.pattern.clone() {
            validators.push(Rc::new(move |ctx| {
                let s = ctx.value.as_str()?;
                (!regex.is_match(s)).then(|| FieldResult::error(Code::Pattern))
            }));
        }

        FieldDescriptor::of(FieldKind::Str(self), validators)
    }

    pub(crate) fn parse(&self, raw: Option<&Value>) -> Parsed {
        match raw {
            None | Some(Value::Null) => Parsed::absent(),
            Some(Value::String(s)) => {
                let s = if self.trim { s.trim() } else { s.as_str() };
                if s.is_empty() {
                    Parsed::absent()
                } else {
                    Parsed::value(Value::String(s.to_string()))
                }
            }
            Some(Value::Number(n)) => Parsed::value(Value::String(n.to_string())),
            Some(Value::Bool(b)) => Parsed::value(Value::String(b.to_string())),
            Some(_) => Parsed::failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Env, RuleCtx};
    use serde_json::json;

    fn validate(desc: &FieldDescriptor, value: Value) -> Option<FieldResult> {
        let data = json!({});
        let deps = Value::Null;
        let env = Env::new();
        desc.validate(&RuleCtx {
            path: "f",
            value: &value,
            data: &data,
            deps: &deps,
            env: &env,
        })
    }

    #[test]
    fn parse_passes_strings_through() {
        let f = StringField::new();
        assert_eq!(f.parse(Some(&json!("abc"))), Parsed::value(json!("abc")));
        assert_eq!(f.parse(Some(&json!(""))), Parsed::absent());
        assert_eq!(f.parse(None), Parsed::absent());
    }

    #[test]
    fn parse_stringifies_scalars() {
        let f = StringField::new();
        assert_eq!(f.parse(Some(&json!(12))), Parsed::value(json!("12")));
        assert_eq!(f.parse(Some(&json!(true))), Parsed::value(json!("true")));
    }

    #[test]
    fn parse_trims_when_asked() {
        let f = StringField::new().trim();
        assert_eq!(f.parse(Some(&json!("  ab "))), Parsed::value(json!("ab")));
        assert_eq!(f.parse(Some(&json!("   "))), Parsed::absent());
    }

    #[test]
    fn parse_rejects_containers() {
        let f = StringField::new();
        assert!(f.parse(Some(&json!({"a": 1}))).error.is_some());
    }

    #[test]
    fn length_bounds() {
        let desc = StringField::new().min_length(2).max_length(4).build();
        assert_eq!(
            validate(&desc, json!("a")),
            Some(FieldResult::error(Code::MinLength { min: 2 }))
        );
        assert_eq!(validate(&desc, json!("abc")), None);
        assert_eq!(
            validate(&desc, json!("abcde")),
            Some(FieldResult::error(Code::MaxLength { max: 4 }))
        );
    }

    #[test]
    fn exact_length() {
        let desc = StringField::new().length(4).build();
        assert_eq!(
            validate(&desc, json!("abc")),
            Some(FieldResult::error(Code::Length { len: 4 }))
        );
        assert_eq!(validate(&desc, json!("abcd")), None);
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        let desc = StringField::new().max_length(3).build();
        assert_eq!(validate(&desc, json!("äöü")), None);
    }

    #[test]
    fn pattern_constraint() {
        let desc = StringField::new().pattern("^[a-z]+$").build();
        assert_eq!(validate(&desc, json!("abc")), None);
        assert_eq!(
            validate(&desc, json!("Abc")),
            Some(FieldResult::error(Code::Pattern))
        );
    }

    #[test]
    fn pattern_matches_whole_value() {
        // unanchored patterns must not pass on a substring hit
        let desc = StringField::new().pattern("[a-z]+").build();
        assert_eq!(validate(&desc, json!("abc")), None);
        assert_eq!(
            validate(&desc, json!("9a9")),
            Some(FieldResult::error(Code::Pattern))
        );
    }

    #[test]
    fn source_supersedes_length_bounds() {
        let desc = StringField::new()
            .min_length(10)
            .source(vec![json!("a"), json!("b")])
            .build();
        // "a" violates min_length but is in the source set
        assert_eq!(validate(&desc, json!("a")), None);
        assert_eq!(
            validate(&desc, json!("c")),
            Some(FieldResult::error(Code::Source))
        );
    }

    #[test]
    #[should_panic]
    fn invalid_pattern_panics() {
        StringField::new().pattern("[");
    }
}
