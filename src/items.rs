//! Data items: compiler-produced handles binding one descriptor to one
//! resolved path.
//!
//! Data items carry no values (values live in the store); they exist so the
//! UI binding layer can walk the addressable shape of a session. They are
//! rebuilt only on schema-structural change; array growth materializes new
//! element items on demand.

use std::rc::Rc;

use crate::fields::{FieldDescriptor, FieldKind};
use crate::path;

/// Child topology of a data item.
#[derive(Debug, Clone)]
pub enum Children {
    /// Leaf field.
    None,
    /// Struct: one item per named member, in declaration order.
    Named(Vec<DataItem>),
    /// Array: elements generated on demand from the repeated descriptor.
    Repeated(Rc<FieldDescriptor>),
}

/// One addressable field of a session.
#[derive(Debug, Clone)]
pub struct DataItem {
    name: String,
    label: String,
    descriptor: Rc<FieldDescriptor>,
    children: Children,
}

impl DataItem {
    /// Build the item subtree for a descriptor at an absolute path.
    pub(crate) fn build(name: String, descriptor: Rc<FieldDescriptor>) -> Self {
        let label = descriptor.resolved_label(&name);
        let children = match &descriptor.kind {
            FieldKind::Struct(s) => Children::Named(
                s.members()
                    .map(|(member, d)| {
                        DataItem::build(path::join_key(&name, member), Rc::clone(d))
                    })
                    .collect(),
            ),
            FieldKind::Array(a) => Children::Repeated(Rc::clone(a.element())),
            _ => Children::None,
        };
        Self {
            name,
            label,
            descriptor,
            children,
        }
    }

    /// Absolute path of this item.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn descriptor(&self) -> &Rc<FieldDescriptor> {
        &self.descriptor
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    /// Named child item (struct items only).
    pub fn child(&self, name: &str) -> Option<&DataItem> {
        match &self.children {
            Children::Named(items) => items
                .iter()
                .find(|item| item.name.rsplit('.').next() == Some(name)),
            _ => None,
        }
    }

    /// Generate the element item for an index (array items only). Items are
    /// produced on demand so array growth never forces a rebuild.
    pub fn element(&self, index: usize) -> Option<DataItem> {
        match &self.children {
            Children::Repeated(element) => Some(DataItem::build(
                path::join_index(&self.name, index),
                Rc::clone(element),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ArrayField, NumberField, StringField, StructField};

    fn order_item() -> DataItem {
        let descriptor = StructField::new()
            .field("id", StringField::new().build().label("Order ID"))
            .field(
                "lines",
                ArrayField::new(
                    StructField::new()
                        .field("qty", NumberField::new().build())
                        .build(),
                )
                .build(),
            )
            .build();
        DataItem::build("order".into(), Rc::new(descriptor))
    }

    #[test]
    fn names_are_absolute() {
        let item = order_item();
        assert_eq!(item.name(), "order");
        assert_eq!(item.child("id").unwrap().name(), "order.id");
    }

    #[test]
    fn labels_resolve_with_fallback() {
        let item = order_item();
        assert_eq!(item.child("id").unwrap().label(), "Order ID");
        assert_eq!(item.child("lines").unwrap().label(), "lines");
    }

    #[test]
    fn array_elements_generate_on_demand() {
        let item = order_item();
        let lines = item.child("lines").unwrap();
        let line3 = lines.element(3).unwrap();
        assert_eq!(line3.name(), "order.lines[3]");
        assert_eq!(line3.child("qty").unwrap().name(), "order.lines[3].qty");
    }

    #[test]
    fn leaves_have_no_children() {
        let item = order_item();
        let id = item.child("id").unwrap();
        assert!(matches!(id.children(), Children::None));
        assert!(id.element(0).is_none());
    }
}
