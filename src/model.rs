//! The business-object document tree.
//!
//! The host hands the engine a typed, introspectable tree: every node carries
//! a `$type` discriminator plus a mapping from field name to value (scalar,
//! nested node, or ordered list of nodes). The engine edits subtrees under an
//! element but never constructs or destroys the root tree itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Well-known names ─────────────────────────────────────────

/// Field on a host element holding the extension wrapper node.
pub const EXTENSION_ELEMENTS: &str = "extensionElements";
/// `$type` of the extension wrapper node.
pub const EXTENSION_ELEMENTS_TYPE: &str = "bpmn:ExtensionElements";
/// List field inside the wrapper holding the typed containers.
pub const EXTENSION_VALUES: &str = "values";

/// Identity stamp: template id, persisted directly on the element.
pub const MODELER_TEMPLATE: &str = "modelerTemplate";
/// Identity stamp: template version. May legitimately be `"0"`.
pub const MODELER_TEMPLATE_VERSION: &str = "modelerTemplateVersion";
/// `$type` of the icon extension child.
pub const MODELER_TEMPLATE_ICON_TYPE: &str = "zeebe:ModelerTemplateIcon";
/// Field on the icon child carrying the icon contents.
pub const ICON_BODY: &str = "body";

/// User-visible label field.
pub const NAME_FIELD: &str = "name";
/// Element id field.
pub const ID_FIELD: &str = "id";

// ─── Value ────────────────────────────────────────────────────

/// A field value inside a business object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Node(Box<BusinessObject>),
    List(Vec<BusinessObject>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&BusinessObject> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BusinessObject]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

// ─── BusinessObject ───────────────────────────────────────────

/// One node in the document tree.
///
/// Ownership is structural: children are owned by their parent field. Every
/// edit walks downward from the host element, so no parent back-pointer is
/// kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusinessObject {
    #[serde(rename = "$type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl BusinessObject {
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Scalar read. `Some("")` and `None` are distinct outcomes.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn set_str(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), Value::Str(value.into()));
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn node(&self, field: &str) -> Option<&BusinessObject> {
        self.fields.get(field).and_then(Value::as_node)
    }

    pub fn node_mut(&mut self, field: &str) -> Option<&mut BusinessObject> {
        match self.fields.get_mut(field) {
            Some(Value::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn list(&self, field: &str) -> Option<&[BusinessObject]> {
        self.fields.get(field).and_then(Value::as_list)
    }

    pub fn list_mut(&mut self, field: &str) -> Option<&mut Vec<BusinessObject>> {
        match self.fields.get_mut(field) {
            Some(Value::List(l)) => Some(l),
            _ => None,
        }
    }

    /// List field, created empty on first access.
    pub fn list_mut_or_default(&mut self, field: &str) -> &mut Vec<BusinessObject> {
        let entry = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        match entry {
            Value::List(l) => l,
            other => {
                // A non-list value under a list field is host corruption;
                // replace rather than panic.
                *other = Value::List(Vec::new());
                match other {
                    Value::List(l) => l,
                    _ => unreachable!(),
                }
            }
        }
    }

    /// Whether any meaningful content remains. Empty lists do not count:
    /// a container whose every list drained is due for pruning.
    pub fn has_content(&self) -> bool {
        self.fields.values().any(|v| match v {
            Value::List(l) => !l.is_empty(),
            _ => true,
        })
    }

    /// Whether this element type may carry an `extensionElements` wrapper.
    /// Extension children and containers (`zeebe:*`) cannot nest another
    /// wrapper inside themselves.
    pub fn can_host_extensions(&self) -> bool {
        self.element_type.starts_with("bpmn:")
    }

    /// The extension wrapper node, if present.
    pub fn extension_elements(&self) -> Option<&BusinessObject> {
        self.node(EXTENSION_ELEMENTS)
    }

    pub fn extension_elements_mut(&mut self) -> Option<&mut BusinessObject> {
        self.node_mut(EXTENSION_ELEMENTS)
    }

    /// Local part of the element type (`bpmn:ServiceTask` → `ServiceTask`).
    pub fn local_type(&self) -> &str {
        self.element_type
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.element_type)
    }
}
