//! Boolean fields.

use serde_json::Value;

use super::{FieldDescriptor, FieldKind, Parsed};

/// Builder for boolean fields. No constraints beyond required/custom.
#[derive(Debug, Default)]
pub struct BooleanField;

impl BooleanField {
    pub fn new() -> Self {
        Self
    }

    pub fn build(self) -> FieldDescriptor {
        FieldDescriptor::of(FieldKind::Boolean(self), Vec::new())
    }

    pub(crate) fn parse(&self, raw: Option<&Value>) -> Parsed {
        match raw {
            None | Some(Value::Null) => Parsed::absent(),
            Some(Value::Bool(b)) => Parsed::value(Value::Bool(*b)),
            Some(Value::String(s)) => match s.trim() {
                "" => Parsed::absent(),
                "true" | "1" => Parsed::value(Value::Bool(true)),
                "false" | "0" => Parsed::value(Value::Bool(false)),
                _ => Parsed::failed(),
            },
            Some(Value::Number(n)) => match n.as_i64() {
                Some(1) => Parsed::value(Value::Bool(true)),
                Some(0) => Parsed::value(Value::Bool(false)),
                _ => Parsed::failed(),
            },
            Some(_) => Parsed::failed(),
        }
    }
}
