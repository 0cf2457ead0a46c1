//! Applying a template descriptor to an element.
//!
//! Properties are written strictly in declaration order — later bindings may
//! rely on containers created by earlier ones. Identity is stamped last, so a
//! stamp is never attached to a partially built element.

use crate::binding::order::InsertionPolicy;
use crate::binding::resolver::{self, SetOptions};
use crate::command::CommandStack;
use crate::descriptor::{BindingDescriptor, BindingKind, TemplateDescriptor};
use crate::error::{EngineError, Result};
use crate::model::{
    BusinessObject, Value, ICON_BODY, ID_FIELD, MODELER_TEMPLATE, MODELER_TEMPLATE_ICON_TYPE,
    MODELER_TEMPLATE_VERSION,
};
use crate::registry::TemplateRegistry;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// How `apply` treats values the user has already edited away from the
/// template default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPolicy {
    /// Leave user-diverged values alone (re-applying the same template).
    KeepUserValues,
    /// Write template defaults over whatever is stored (switching templates).
    ReapplyDefaults,
}

pub struct TemplateApplier;

impl TemplateApplier {
    /// Instantiate a fresh element from a template: validate, create a node of
    /// the first `appliesTo` type, write every property in declaration order,
    /// stamp identity last. Validation failure aborts before any node exists.
    pub fn create(stack: &mut CommandStack, template: &TemplateDescriptor) -> Result<BusinessObject> {
        validate_for_apply(template)?;

        let element_type = template.applies_to[0].clone();
        let mut element = BusinessObject::new(element_type);
        let local = element.local_type().to_string();
        element.set_str(ID_FIELD, format!("{}_{}", local, Uuid::now_v7().simple()));

        stack.execute("element-template.create", &mut element, |el| {
            write_properties(el, template, ApplyPolicy::ReapplyDefaults)?;
            stamp_identity(el, template);
            Ok(())
        })?;
        debug!(template = %template.id, element = %element.element_type, "template instantiated");
        Ok(element)
    }

    /// Instantiate the default template for a node type, if one is registered.
    /// Callers creating pasted or duplicated nodes must not call this.
    pub fn create_default_for(
        stack: &mut CommandStack,
        registry: &TemplateRegistry,
        element_type: &str,
    ) -> Result<Option<BusinessObject>> {
        match registry.get_default(element_type) {
            Some(template) => Self::create(stack, template).map(Some),
            None => Ok(None),
        }
    }

    /// Apply a template to an existing element as one undoable command.
    pub fn apply(
        stack: &mut CommandStack,
        element: &mut BusinessObject,
        template: &TemplateDescriptor,
        policy: ApplyPolicy,
    ) -> Result<()> {
        validate_for_apply(template)?;
        stack.execute("element-template.apply", element, |el| {
            write_properties(el, template, policy)?;
            stamp_identity(el, template);
            Ok(())
        })
    }
}

fn validate_for_apply(template: &TemplateDescriptor) -> Result<()> {
    if template.applies_to.is_empty() {
        return Err(EngineError::InvalidTemplate {
            id: template.id.clone(),
            reason: "appliesTo must name at least one element type".to_string(),
        });
    }
    for binding in &template.properties {
        if let BindingKind::CollectionEntry { key_value, .. } = &binding.kind {
            if key_value.is_empty() {
                return Err(EngineError::InvalidTemplate {
                    id: template.id.clone(),
                    reason: format!("property '{}' has an empty collection key", binding.name),
                });
            }
        }
    }
    Ok(())
}

/// Write template properties in declaration order. Collection entries are
/// placed in declaration order relative to their template siblings; foreign
/// entries already in a container stay where they are.
pub(crate) fn write_properties(
    element: &mut BusinessObject,
    template: &TemplateDescriptor,
    policy: ApplyPolicy,
) -> Result<()> {
    let ranks = declaration_ranks(template);

    for (i, binding) in template.properties.iter().enumerate() {
        if policy == ApplyPolicy::KeepUserValues {
            let stored = resolver::stored_value(element, binding)?;
            if let Some(stored) = &stored {
                if Some(stored) != binding.default_value.as_ref() {
                    continue;
                }
            }
        }

        let value = binding.default_value.as_deref();
        if value.is_none() && !matches!(binding.kind, BindingKind::CollectionEntry { .. }) {
            // Nothing to write; collection entries are still created because
            // their key alone is content.
            continue;
        }

        let insertion = collection_policy(binding, i, &ranks);
        resolver::set_value(
            element,
            binding,
            value,
            SetOptions {
                insertion,
                old_key: None,
            },
        )?;
    }
    Ok(())
}

pub(crate) type RankMap = HashMap<(String, String), HashMap<String, usize>>;

/// Per-collection map of key value → declaration index.
pub(crate) fn declaration_ranks(template: &TemplateDescriptor) -> RankMap {
    let mut ranks: RankMap = HashMap::new();
    for (i, binding) in template.properties.iter().enumerate() {
        if let BindingKind::CollectionEntry {
            container_type,
            collection_field,
            key_value,
            ..
        } = &binding.kind
        {
            ranks
                .entry((container_type.clone(), collection_field.clone()))
                .or_default()
                .insert(key_value.clone(), i);
        }
    }
    ranks
}

pub(crate) fn collection_policy<'a>(
    binding: &'a BindingDescriptor,
    index: usize,
    ranks: &'a RankMap,
) -> Option<InsertionPolicy<'a>> {
    match &binding.kind {
        BindingKind::CollectionEntry {
            container_type,
            collection_field,
            key_field,
            ..
        } => ranks
            .get(&(container_type.clone(), collection_field.clone()))
            .map(|by_key| InsertionPolicy::DeclarationOrder {
                rank: index,
                key_field,
                ranks: by_key,
            }),
        _ => None,
    }
}

/// Persist template identity on the element: stamp fields plus the icon
/// extension child. Explicit presence rules — a version of `0` is written as
/// `"0"`, an absent version writes no field.
pub(crate) fn stamp_identity(element: &mut BusinessObject, template: &TemplateDescriptor) {
    element.set_str(MODELER_TEMPLATE, template.id.clone());
    match template.version {
        Some(v) => element.set_str(MODELER_TEMPLATE_VERSION, v.to_string()),
        None => {
            element.remove(MODELER_TEMPLATE_VERSION);
        }
    }

    crate::binding::container::remove_child(element, MODELER_TEMPLATE_ICON_TYPE);
    if let Some(contents) = &template.icon {
        let mut icon = BusinessObject::new(MODELER_TEMPLATE_ICON_TYPE);
        icon.set_str(ICON_BODY, contents.clone());
        if element.extension_elements().is_none() {
            element.set(
                crate::model::EXTENSION_ELEMENTS,
                Value::Node(Box::new(BusinessObject::new(
                    crate::model::EXTENSION_ELEMENTS_TYPE,
                ))),
            );
        }
        if let Some(ext) = element.extension_elements_mut() {
            ext.list_mut_or_default(crate::model::EXTENSION_VALUES).push(icon);
        }
    }
}
