//! File fields.
//!
//! A file value is the metadata object the UI binding layer produces from a
//! picked file: `{ "name": ..., "type": ..., "size": ... }`. The engine
//! never touches file contents.

use std::rc::Rc;

use serde_json::Value;

use super::{FieldDescriptor, FieldKind, Parsed, Validator};
use crate::context::Constraint;
use crate::outcome::{Code, FieldResult};

/// Builder for file fields.
#[derive(Debug, Default)]
pub struct FileField {
    accept: Option<Vec<String>>,
    max_size: Option<Constraint<u64>>,
}

impl FileField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted types: extension patterns (`.png`) or MIME patterns
    /// (`image/*`, `application/pdf`).
    pub fn accept<I, S>(mut self, accept: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept = Some(accept.into_iter().map(Into::into).collect());
        self
    }

    /// Maximum size in bytes.
    pub fn max_size(mut self, max: impl Into<Constraint<u64>>) -> Self {
        self.max_size = Some(max.into());
        self
    }

    pub fn build(self) -> FieldDescriptor {
        let mut validators: Vec<Validator> = Vec::new();

        if let Some(accept) = self.accept.clone() {
            let joined = accept.join(",");
            validators.push(Rc::new(move |ctx| {
                let name = ctx.value.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let mime = ctx.value.get("type").and_then(|v| v.as_str()).unwrap_or("");
                let ok = accept.iter().any(|pattern| matches_accept(pattern, name, mime));
                (!ok).then(|| {
                    FieldResult::error(Code::Accept {
                        accept: joined.clone(),
                    })
                })
            }));
        }
        if let Some(max_size) = self.max_size.clone() {
            validators.push(Rc::new(move |ctx| {
                let max = max_size.resolve(ctx)?;
                let size = ctx.value.get("size").and_then(|v| v.as_u64())?;
                (size > max).then(|| FieldResult::error(Code::MaxSize { max }))
            }));
        }

        FieldDescriptor::of(FieldKind::File(self), validators)
    }

    pub(crate) fn parse(&self, raw: Option<&Value>) -> Parsed {
        match raw {
            None | Some(Value::Null) => Parsed::absent(),
            Some(v @ Value::Object(_)) => Parsed::value(v.clone()),
            Some(_) => Parsed::failed(),
        }
    }
}

/// One accept pattern against a file's name and MIME type.
fn matches_accept(pattern: &str, name: &str, mime: &str) -> bool {
    if let Some(ext) = pattern.strip_prefix('.') {
        // a name without a dot has no extension to compare
        return name
            .rsplit_once('.')
            .map(|(_, e)| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false);
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        return mime
            .split('/')
            .next()
            .map(|m| m.eq_ignore_ascii_case(prefix))
            .unwrap_or(false);
    }
    pattern.eq_ignore_ascii_case(mime)
}
