//! Template and binding descriptors.
//!
//! The wire shape (`*Json` types) mirrors the externally-authored JSON format;
//! the parsed shape replaces string-tagged binding kinds with a closed enum so
//! resolution is an exhaustive match instead of string comparison.

use serde::{Deserialize, Serialize};

// ─── Wire shape ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDescriptorJson {
    pub id: String,
    /// `0` is a real version, distinct from absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "appliesTo", default)]
    pub applies_to: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<IconJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataJson>,
    #[serde(rename = "isDefault", default, skip_serializing_if = "is_false")]
    pub is_default: bool,
}

fn is_false(v: &bool) -> bool {
    !v
}

impl TemplateDescriptorJson {
    /// Parse a loader-supplied JSON array of descriptors. I/O and fetching
    /// stay with the loader; this is the only parsing seam the engine owns.
    pub fn parse_batch(json: &str) -> serde_json::Result<Vec<Self>> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconJson {
    pub contents: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyJson {
    /// Binding kind tag: `property`, `zeebe:input`, `zeebe:output`,
    /// `zeebe:taskHeader`, `zeebe:property`, `zeebe:taskDefinition`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub binding: BindingParamsJson,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Path parameters of a binding. Which ones are required depends on the kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingParamsJson {
    /// Field name (`property`), input target (`zeebe:input`), or
    /// property name (`zeebe:property`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Output source expression (`zeebe:output`), or the source an input
    /// entry is keyed by when no target is declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Header key (`zeebe:taskHeader`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Field inside the task-definition singleton (`zeebe:taskDefinition`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

// ─── Parsed shape ─────────────────────────────────────────────

/// Where a template property's value lives inside the document tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingKind {
    /// Direct field on the element.
    Property { field: String },
    /// A unique nested child of the given type, holding one field.
    SingletonNested { element_type: String, field: String },
    /// An entry in an ordered collection under a typed container, located by
    /// `key_field == key_value`; the property's value lives in `value_field`.
    CollectionEntry {
        container_type: String,
        collection_field: String,
        entry_type: String,
        key_field: String,
        key_value: String,
        value_field: String,
    },
}

impl BindingKind {
    /// Two bindings address the same storage slot when their path parameters
    /// match, regardless of which template version declared them. Used for
    /// cross-version property matching during migration.
    pub fn same_slot(&self, other: &BindingKind) -> bool {
        match (self, other) {
            (BindingKind::Property { field: a }, BindingKind::Property { field: b }) => a == b,
            (
                BindingKind::SingletonNested {
                    element_type: at,
                    field: af,
                },
                BindingKind::SingletonNested {
                    element_type: bt,
                    field: bf,
                },
            ) => at == bt && af == bf,
            (
                BindingKind::CollectionEntry {
                    container_type: ac,
                    collection_field: al,
                    key_field: ak,
                    key_value: av,
                    ..
                },
                BindingKind::CollectionEntry {
                    container_type: bc,
                    collection_field: bl,
                    key_field: bk,
                    key_value: bv,
                    ..
                },
            ) => ac == bc && al == bl && ak == bk && av == bv,
            _ => false,
        }
    }
}

/// One named template property and where it binds.
#[derive(Clone, Debug, PartialEq)]
pub struct BindingDescriptor {
    pub name: String,
    pub kind: BindingKind,
    /// Empty value means "remove the entry/field", not "store empty string".
    pub optional: bool,
    pub default_value: Option<String>,
}

/// A versioned template: identity, metadata, and the ordered property list.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateDescriptor {
    pub id: String,
    pub version: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub applies_to: Vec<String>,
    pub properties: Vec<BindingDescriptor>,
    pub icon: Option<String>,
    pub created: Option<i64>,
    pub updated: Option<i64>,
    pub is_default: bool,
}

impl TemplateDescriptor {
    pub fn applies_to_type(&self, element_type: &str) -> bool {
        self.applies_to.iter().any(|t| t == element_type)
    }
}

// ─── Wire → parsed ────────────────────────────────────────────

impl BindingDescriptor {
    /// Maps a wire property to its storage strategy. Returns a reason string
    /// on malformed input; the loader turns that into a validation error.
    pub fn from_json(prop: &PropertyJson) -> std::result::Result<Self, String> {
        let b = &prop.binding;
        let name = prop
            .name
            .clone()
            .or_else(|| b.name.clone())
            .or_else(|| b.key.clone())
            .or_else(|| b.source.clone())
            .unwrap_or_default();

        let kind = match prop.kind.as_str() {
            "property" => {
                let field = b
                    .name
                    .clone()
                    .or_else(|| prop.name.clone())
                    .ok_or("property binding requires a field name")?;
                BindingKind::Property { field }
            }
            "zeebe:taskDefinition" | "zeebe:taskDefinition:type" => BindingKind::SingletonNested {
                element_type: "zeebe:TaskDefinition".to_string(),
                field: b.property.clone().unwrap_or_else(|| "type".to_string()),
            },
            "zeebe:input" => {
                // Keyed by target when one is declared, otherwise by source
                // (an input that only maps an expression in).
                let (key_field, key_value, value_field) = match (&b.name, &b.source) {
                    (Some(target), _) => ("target", target.clone(), "source"),
                    (None, Some(source)) => ("source", source.clone(), "target"),
                    (None, None) => return Err("zeebe:input binding requires name or source".into()),
                };
                BindingKind::CollectionEntry {
                    container_type: "zeebe:IoMapping".to_string(),
                    collection_field: "inputParameters".to_string(),
                    entry_type: "zeebe:Input".to_string(),
                    key_field: key_field.to_string(),
                    key_value,
                    value_field: value_field.to_string(),
                }
            }
            "zeebe:output" => {
                let source = b
                    .source
                    .clone()
                    .ok_or("zeebe:output binding requires a source")?;
                BindingKind::CollectionEntry {
                    container_type: "zeebe:IoMapping".to_string(),
                    collection_field: "outputParameters".to_string(),
                    entry_type: "zeebe:Output".to_string(),
                    key_field: "source".to_string(),
                    key_value: source,
                    value_field: "target".to_string(),
                }
            }
            "zeebe:taskHeader" => {
                let key = b.key.clone().ok_or("zeebe:taskHeader binding requires a key")?;
                BindingKind::CollectionEntry {
                    container_type: "zeebe:TaskHeaders".to_string(),
                    collection_field: "values".to_string(),
                    entry_type: "zeebe:Header".to_string(),
                    key_field: "key".to_string(),
                    key_value: key,
                    value_field: "value".to_string(),
                }
            }
            "zeebe:property" => {
                let name = b
                    .name
                    .clone()
                    .or_else(|| prop.name.clone())
                    .ok_or("zeebe:property binding requires a name")?;
                BindingKind::CollectionEntry {
                    container_type: "zeebe:Properties".to_string(),
                    collection_field: "properties".to_string(),
                    entry_type: "zeebe:Property".to_string(),
                    key_field: "name".to_string(),
                    key_value: name,
                    value_field: "value".to_string(),
                }
            }
            other => return Err(format!("unrecognized binding kind '{other}'")),
        };

        Ok(BindingDescriptor {
            name,
            kind,
            optional: prop.optional,
            default_value: prop.value.clone(),
        })
    }
}

impl TemplateDescriptor {
    /// Parses the wire shape without judging structural validity; the
    /// validator owns the rule list.
    pub fn from_json(json: &TemplateDescriptorJson) -> std::result::Result<Self, String> {
        let mut properties = Vec::with_capacity(json.properties.len());
        for (i, prop) in json.properties.iter().enumerate() {
            let parsed = BindingDescriptor::from_json(prop)
                .map_err(|reason| format!("property #{i}: {reason}"))?;
            properties.push(parsed);
        }
        Ok(TemplateDescriptor {
            id: json.id.clone(),
            version: json.version,
            name: json.name.clone(),
            description: json.description.clone(),
            applies_to: json.applies_to.clone(),
            properties,
            icon: json.icon.as_ref().map(|i| i.contents.clone()),
            created: json.metadata.as_ref().and_then(|m| m.created),
            updated: json.metadata.as_ref().and_then(|m| m.updated),
            is_default: json.is_default,
        })
    }
}
