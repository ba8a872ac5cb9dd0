//! Struct fields and the schema root.

use std::rc::Rc;

use serde_json::Value;

use super::{FieldDescriptor, FieldKind, Parsed};
use crate::path::{self, Segment};

/// Builder for struct fields: an ordered map of named child descriptors.
#[derive(Debug, Default)]
pub struct StructField {
    members: Vec<(String, Rc<FieldDescriptor>)>,
}

impl StructField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named member. Order is preserved: it drives traversal and
    /// validator queueing order.
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.members.push((name.into(), Rc::new(descriptor)));
        self
    }

    pub fn build(self) -> FieldDescriptor {
        FieldDescriptor::of(FieldKind::Struct(self), Vec::new())
    }

    /// Ordered members.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Rc<FieldDescriptor>)> {
        self.members.iter().map(|(name, d)| (name.as_str(), d))
    }

    pub fn member(&self, name: &str) -> Option<&Rc<FieldDescriptor>> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub(crate) fn parse(&self, raw: Option<&Value>) -> Parsed {
        match raw {
            None | Some(Value::Null) => Parsed::absent(),
            Some(v @ Value::Object(_)) => Parsed::value(v.clone()),
            Some(_) => Parsed::failed(),
        }
    }
}

/// A compiled schema: the root struct descriptor plus path lookup over the
/// descriptor tree.
#[derive(Debug, Clone)]
pub struct Schema {
    root: Rc<FieldDescriptor>,
}

impl Schema {
    /// Wrap a root struct. The root itself has no path; its members sit at
    /// top-level paths.
    pub fn new(root: StructField) -> Self {
        Self {
            root: Rc::new(root.build()),
        }
    }

    pub fn root(&self) -> &Rc<FieldDescriptor> {
        &self.root
    }

    /// Descriptor for an absolute path, if the schema declares one.
    pub fn descriptor_at(&self, path: &str) -> Option<Rc<FieldDescriptor>> {
        self.chain(path).pop().map(|(_, d)| d)
    }

    /// The descriptor chain from the outermost ancestor down to `path`
    /// itself, with each descriptor's own absolute path. The anonymous root
    /// struct is not included. Index segments resolve to the enclosing
    /// array's element descriptor.
    pub fn chain(&self, path: &str) -> Vec<(String, Rc<FieldDescriptor>)> {
        let mut chain = Vec::new();
        let mut current: Rc<FieldDescriptor> = Rc::clone(&self.root);
        let mut walked: Vec<Segment> = Vec::new();

        for seg in path::parse(path) {
            let next = match (&current.kind, &seg) {
                (FieldKind::Struct(s), Segment::Key(k)) => s.member(k).cloned(),
                (FieldKind::Array(a), Segment::Index(_)) => Some(Rc::clone(a.element())),
                _ => None,
            };
            let Some(next) = next else {
                return Vec::new();
            };
            walked.push(seg);
            chain.push((path::to_string(&walked), next.clone()));
            current = next;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ArrayField, NumberField, StringField};

    fn schema() -> Schema {
        Schema::new(
            StructField::new()
                .field("name", StringField::new().build())
                .field(
                    "order",
                    StructField::new()
                        .field(
                            "lines",
                            ArrayField::new(
                                StructField::new()
                                    .field("qty", NumberField::new().build())
                                    .build(),
                            )
                            .build(),
                        )
                        .build(),
                ),
        )
    }

    #[test]
    fn descriptor_at_top_level() {
        let s = schema();
        assert_eq!(s.descriptor_at("name").unwrap().type_name(), "string");
    }

    #[test]
    fn descriptor_at_nested_array_element_member() {
        let s = schema();
        let d = s.descriptor_at("order.lines[2].qty").unwrap();
        assert_eq!(d.type_name(), "number");
    }

    #[test]
    fn descriptor_at_unknown_path() {
        let s = schema();
        assert!(s.descriptor_at("order.missing").is_none());
        assert!(s.descriptor_at("name.deeper").is_none());
    }

    #[test]
    fn chain_tracks_ancestor_paths() {
        let s = schema();
        let chain = s.chain("order.lines[0].qty");
        let paths: Vec<&str> = chain.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, ["order", "order.lines", "order.lines[0]", "order.lines[0].qty"]);
    }

    #[test]
    fn member_order_is_preserved() {
        let s = StructField::new()
            .field("b", StringField::new().build())
            .field("a", StringField::new().build());
        let names: Vec<&str> = s.members().map(|(n, _)| n).collect();
        assert_eq!(names, ["b", "a"]);
    }
}
