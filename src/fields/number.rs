//! Number fields.

use std::rc::Rc;

use serde_json::Value;

use super::{shift_fullwidth, source_contains, FieldDescriptor, FieldKind, Parsed, Validator};
use crate::context::Constraint;
use crate::outcome::{Code, FieldResult};

/// Builder for numeric fields.
#[derive(Debug, Default)]
pub struct NumberField {
    min: Option<Constraint<f64>>,
    max: Option<Constraint<f64>>,
    integer: bool,
    source: Option<Constraint<Vec<Value>>>,
}

impl NumberField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: impl Into<Constraint<f64>>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn max(mut self, max: impl Into<Constraint<f64>>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Reject fractional values (`float` code).
    pub fn integer(mut self) -> Self {
        self.integer = true;
        self
    }

    /// Allowed values.
    pub fn source(mut self, source: impl Into<Constraint<Vec<Value>>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn build(self) -> FieldDescriptor {
        let mut validators: Vec<Validator> = Vec::new();

        if self.integer {
            validators.push(Rc::new(|ctx| {
                let n = ctx.value.as_f64()?;
                (n.fract() != 0.0).then(|| FieldResult::error(Code::Float))
            }));
        }
        if let Some(min) = self.min.clone() {
            validators.push(Rc::new(move |ctx| {
                let min = min.resolve(ctx)?;
                let n = ctx.value.as_f64()?;
                (n < min).then(|| FieldResult::error(Code::Min { min }))
            }));
        }
        if let Some(max) = self.max.clone() {
            validators.push(Rc::new(move |ctx| {
                let max = max.resolve(ctx)?;
                let n = ctx.value.as_f64()?;
                (n > max).then(|| FieldResult::error(Code::Max { max }))
            }));
        }
        if let Some(source) = self.source.clone() {
            validators.push(Rc::new(move |ctx| {
                let allowed = source.resolve(ctx)?;
                if source_contains(&allowed, ctx.value) {
                    None
                } else {
                    Some(FieldResult::error(Code::Source))
                }
            }));
        }

        FieldDescriptor::of(FieldKind::Number(self), validators)
    }

    pub(crate) fn parse(&self, raw: Option<&Value>) -> Parsed {
        parse_number(raw)
    }
}

/// Shared numeric parser, also used for split-date components.
///
/// Empty string and null are "absent", not errors; full-width numerals are
/// shifted to ASCII before parsing; unparsable input yields no value plus a
/// `parse` error.
pub(crate) fn parse_number(raw: Option<&Value>) -> Parsed {
    match raw {
        None | Some(Value::Null) => Parsed::absent(),
        Some(v @ Value::Number(_)) => Parsed::value(v.clone()),
        Some(Value::String(s)) => {
            let shifted = shift_fullwidth(s);
            let trimmed = shifted.trim();
            if trimmed.is_empty() {
                return Parsed::absent();
            }
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => Parsed::value(number_value(n)),
                _ => Parsed::failed(),
            }
        }
        Some(_) => Parsed::failed(),
    }
}

/// Represent an integral f64 as a JSON integer so normalized data compares
/// cleanly against authored fixtures.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}
