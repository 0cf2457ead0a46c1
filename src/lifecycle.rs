//! Whole-element template lifecycle: apply, replace, unlink, remove, and
//! cross-version migration.
//!
//! An element's template relationship is a small state machine:
//! `NoTemplate → Templated → (Outdated | Unknown)`. `Outdated` means the
//! stamped version no longer resolves but the id still does; `Unknown` means
//! the id resolves to nothing at all. Every mutating operation here runs as a
//! single undoable command — a failure mid-migration leaves the document
//! exactly as it was.

use crate::applier::{self, ApplyPolicy, TemplateApplier};
use crate::binding::resolver::{self, SetOptions};
use crate::command::CommandStack;
use crate::descriptor::{BindingDescriptor, TemplateDescriptor};
use crate::error::{EngineError, Result};
use crate::model::{
    BusinessObject, ID_FIELD, MODELER_TEMPLATE, MODELER_TEMPLATE_ICON_TYPE,
    MODELER_TEMPLATE_VERSION, NAME_FIELD,
};
use crate::registry::TemplateRegistry;
use tracing::{debug, warn};

/// An element's relationship to the registry.
#[derive(Debug)]
pub enum TemplateState<'a> {
    NoTemplate,
    Templated(&'a TemplateDescriptor),
    /// The stamped version is gone but a same-id descriptor exists.
    Outdated {
        id: String,
        stamped_version: Option<i64>,
        latest: &'a TemplateDescriptor,
    },
    /// No descriptor with the stamped id exists at all.
    Unknown {
        id: String,
        stamped_version: Option<i64>,
    },
}

/// The (id, version) stamp persisted on an element. Version is parsed with
/// explicit presence semantics: a stored `"0"` is `Some(0)`, never absent.
/// A version stamp that does not parse yields `None` here and is reported;
/// `state_of` refuses to resolve such an element as `Templated`.
pub fn stamped_identity(element: &BusinessObject) -> Option<(String, Option<i64>)> {
    let id = element.get_str(MODELER_TEMPLATE)?.to_string();
    let version = match element.get_str(MODELER_TEMPLATE_VERSION) {
        Some(raw) => match raw.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(template = %id, version = raw, "unparseable template version stamp");
                None
            }
        },
        None => None,
    };
    Some((id, version))
}

/// A version stamp exists but does not parse as a number. Such an element
/// must never pass for one stamped without a version.
fn version_stamp_corrupt(element: &BusinessObject) -> bool {
    element
        .get_str(MODELER_TEMPLATE_VERSION)
        .is_some_and(|v| v.parse::<i64>().is_err())
}

pub struct TemplateLifecycleManager<'a> {
    registry: &'a TemplateRegistry,
}

impl<'a> TemplateLifecycleManager<'a> {
    pub fn new(registry: &'a TemplateRegistry) -> Self {
        Self { registry }
    }

    pub fn state_of(&self, element: &BusinessObject) -> TemplateState<'a> {
        let Some((id, version)) = stamped_identity(element) else {
            return TemplateState::NoTemplate;
        };
        if !version_stamp_corrupt(element) {
            if let Some(descriptor) = self.registry.get(&id, version) {
                return TemplateState::Templated(descriptor);
            }
        }
        match self.registry.latest_version(&id) {
            Some(latest) => TemplateState::Outdated {
                id,
                stamped_version: version,
                latest,
            },
            None => {
                warn!(template = %id, "stamped template unknown to registry");
                TemplateState::Unknown {
                    id,
                    stamped_version: version,
                }
            }
        }
    }

    /// Detach the element from its template: stamp and icon go, every
    /// property value and container stays. The element keeps its data but is
    /// no longer template-governed.
    pub fn unlink(&self, stack: &mut CommandStack, element: &mut BusinessObject) -> Result<()> {
        self.require_stamp(element)?;
        stack.execute("element-template.unlink", element, |el| {
            strip_identity(el);
            Ok(())
        })
    }

    /// Remove the template and everything it exclusively owns: stamp, icon,
    /// and every bound entry with its containers. The element's label reverts
    /// to what a plain node of its type would show. For `Unknown` templates
    /// both ownership and the template's display name are unknowable, so only
    /// the stamp and icon are touched and the label is left alone.
    ///
    /// The caller keeps its reference to the element throughout — the same
    /// node is edited in place, so selection never dangles.
    pub fn remove(&self, stack: &mut CommandStack, element: &mut BusinessObject) -> Result<()> {
        let descriptor = match self.state_of(element) {
            TemplateState::NoTemplate => {
                return Err(EngineError::NotTemplated {
                    element_id: element.get_str(ID_FIELD).unwrap_or_default().to_string(),
                })
            }
            TemplateState::Templated(d) => Some(d),
            TemplateState::Outdated { latest, .. } => Some(latest),
            TemplateState::Unknown { .. } => None,
        };

        stack.execute("element-template.remove", element, |el| {
            if let Some(descriptor) = descriptor {
                for binding in &descriptor.properties {
                    resolver::remove_value(el, binding, None)?;
                }
                reset_label(el, descriptor);
            }
            strip_identity(el);
            Ok(())
        })
    }

    /// Re-bind the element to `new_template`, migrating values across
    /// versions: a property still holding the old template's default moves to
    /// the new default; a user-edited value is preserved verbatim, even when
    /// its storage path changed. The identity stamp is updated last.
    pub fn update(
        &self,
        stack: &mut CommandStack,
        element: &mut BusinessObject,
        new_template: &TemplateDescriptor,
    ) -> Result<()> {
        let (old_id, old_version) = self.require_stamp(element)?;
        let old_descriptor = self.registry.get(&old_id, old_version);
        if old_descriptor.is_none() {
            debug!(template = %old_id, "old descriptor unresolved; treating all values as user edits");
        }

        stack.execute("element-template.update", element, |el| {
            migrate_properties(el, old_descriptor, new_template)?;
            applier::stamp_identity(el, new_template);
            Ok(())
        })
    }

    /// Upgrade an element to the newest registered version of its stamped id.
    /// The usual exit from the `Outdated` state.
    pub fn update_to_latest(
        &self,
        stack: &mut CommandStack,
        element: &mut BusinessObject,
    ) -> Result<()> {
        let (id, _) = self.require_stamp(element)?;
        let latest = self
            .registry
            .latest_version(&id)
            .ok_or(EngineError::TemplateNotFound { id, version: None })?;
        self.update(stack, element, latest)
    }

    /// Replace the element's template wholesale: old bound values are removed,
    /// the new template's defaults are applied.
    pub fn replace(
        &self,
        stack: &mut CommandStack,
        element: &mut BusinessObject,
        new_template: &TemplateDescriptor,
    ) -> Result<()> {
        let old = match self.state_of(element) {
            TemplateState::Templated(d) => Some(d),
            TemplateState::Outdated { latest, .. } => Some(latest),
            _ => None,
        };
        stack.execute("element-template.replace", element, |el| {
            if let Some(old) = old {
                for binding in &old.properties {
                    resolver::remove_value(el, binding, None)?;
                }
            }
            applier::write_properties(el, new_template, ApplyPolicy::ReapplyDefaults)?;
            applier::stamp_identity(el, new_template);
            Ok(())
        })
    }

    fn require_stamp(&self, element: &BusinessObject) -> Result<(String, Option<i64>)> {
        stamped_identity(element).ok_or_else(|| EngineError::NotTemplated {
            element_id: element.get_str(ID_FIELD).unwrap_or_default().to_string(),
        })
    }
}

// Convenience so hosts can instantiate and manage through one type.
impl TemplateLifecycleManager<'_> {
    pub fn apply(
        &self,
        stack: &mut CommandStack,
        element: &mut BusinessObject,
        template: &TemplateDescriptor,
    ) -> Result<()> {
        TemplateApplier::apply(stack, element, template, ApplyPolicy::KeepUserValues)
    }
}

fn strip_identity(element: &mut BusinessObject) {
    element.remove(MODELER_TEMPLATE);
    element.remove(MODELER_TEMPLATE_VERSION);
    crate::binding::container::remove_child(element, MODELER_TEMPLATE_ICON_TYPE);
}

/// Revert the label the template put on the element. A user-renamed element
/// keeps its name; a label still equal to the template's display name is
/// dropped so the host recomputes the plain per-type label with no staleness
/// window.
fn reset_label(element: &mut BusinessObject, descriptor: &TemplateDescriptor) {
    if element.get_str(NAME_FIELD) == Some(descriptor.name.as_str()) {
        element.remove(NAME_FIELD);
    }
}

/// Property-by-property migration, matched by property name across versions.
fn migrate_properties(
    element: &mut BusinessObject,
    old_descriptor: Option<&TemplateDescriptor>,
    new_template: &TemplateDescriptor,
) -> Result<()> {
    // Old-only properties first: entries the old template owned and the new
    // one dropped are removed, unless the user edited them.
    if let Some(old) = old_descriptor {
        for old_binding in &old.properties {
            if property_by_name(new_template, &old_binding.name).is_some() {
                continue;
            }
            let live = resolver::stored_value(element, old_binding)?;
            if live == old_binding.default_value || live.is_none() {
                resolver::remove_value(element, old_binding, None)?;
            }
        }
    }

    let ranks = applier::declaration_ranks(new_template);

    for (i, new_binding) in new_template.properties.iter().enumerate() {
        let old_binding =
            old_descriptor.and_then(|old| property_by_name(old, &new_binding.name));

        let (value, moved_from) = match old_binding {
            Some(old_binding) => {
                let live = resolver::stored_value(element, old_binding)?;
                let is_default = live.is_none() || live == old_binding.default_value;
                let value = if is_default {
                    new_binding.default_value.clone()
                } else {
                    live
                };
                let moved = if old_binding.kind.same_slot(&new_binding.kind) {
                    None
                } else {
                    Some(old_binding)
                };
                (value, moved)
            }
            None => {
                let value = if old_descriptor.is_none() {
                    // Old defaults are unknowable, so every stored value
                    // counts as a user edit; the new default fills only
                    // slots with nothing stored.
                    resolver::stored_value(element, new_binding)?
                        .or_else(|| new_binding.default_value.clone())
                } else {
                    // New in this version: the new default applies.
                    new_binding.default_value.clone()
                };
                (value, None)
            }
        };

        if let Some(old_binding) = moved_from {
            debug!(property = %new_binding.name, "storage path changed; re-binding");
            resolver::remove_value(element, old_binding, None)?;
        }

        let skippable = value.is_none()
            && !matches!(
                new_binding.kind,
                crate::descriptor::BindingKind::CollectionEntry { .. }
            );
        if skippable {
            continue;
        }
        resolver::set_value(
            element,
            new_binding,
            value.as_deref(),
            SetOptions {
                insertion: applier::collection_policy(new_binding, i, &ranks),
                old_key: None,
            },
        )?;
    }
    Ok(())
}

fn property_by_name<'t>(
    template: &'t TemplateDescriptor,
    name: &str,
) -> Option<&'t BindingDescriptor> {
    template.properties.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::container;
    use crate::descriptor::TemplateDescriptorJson;

    fn registry_with(raw: Vec<serde_json::Value>) -> TemplateRegistry {
        let batch: Vec<TemplateDescriptorJson> = raw
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        let mut reg = TemplateRegistry::new();
        let outcome = reg.set(batch);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        reg
    }

    fn rest_template_v(version: i64, timeout_default: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "rest-task",
            "version": version,
            "name": "REST Task",
            "appliesTo": ["bpmn:ServiceTask"],
            "icon": { "contents": "svg" },
            "properties": [
                { "type": "zeebe:taskDefinition", "binding": {}, "value": "http" },
                { "type": "zeebe:taskHeader", "binding": { "key": "timeout" }, "value": timeout_default }
            ]
        })
    }

    fn templated_element(
        reg: &TemplateRegistry,
        stack: &mut CommandStack,
        version: i64,
    ) -> BusinessObject {
        let template = reg.get("rest-task", Some(version)).unwrap();
        TemplateApplier::create(stack, template).unwrap()
    }

    #[test]
    fn state_machine_over_registry_contents() {
        let reg = registry_with(vec![rest_template_v(1, "10")]);
        let mgr = TemplateLifecycleManager::new(&reg);
        let mut stack = CommandStack::new();

        let plain = BusinessObject::new("bpmn:ServiceTask");
        assert!(matches!(mgr.state_of(&plain), TemplateState::NoTemplate));

        let templated = templated_element(&reg, &mut stack, 1);
        assert!(matches!(mgr.state_of(&templated), TemplateState::Templated(_)));

        // Registry moves on to v2 only: stamped v1 is now outdated.
        let reg2 = registry_with(vec![rest_template_v(2, "10")]);
        let mgr2 = TemplateLifecycleManager::new(&reg2);
        match mgr2.state_of(&templated) {
            TemplateState::Outdated {
                id,
                stamped_version,
                latest,
            } => {
                assert_eq!(id, "rest-task");
                assert_eq!(stamped_version, Some(1));
                assert_eq!(latest.version, Some(2));
            }
            other => panic!("unexpected state {other:?}"),
        }

        // Registry without the id at all: unknown.
        let empty = TemplateRegistry::new();
        let mgr3 = TemplateLifecycleManager::new(&empty);
        assert!(matches!(
            mgr3.state_of(&templated),
            TemplateState::Unknown { .. }
        ));
    }

    #[test]
    fn unlink_keeps_data_drops_identity() {
        let reg = registry_with(vec![rest_template_v(1, "10")]);
        let mgr = TemplateLifecycleManager::new(&reg);
        let mut stack = CommandStack::new();
        let mut element = templated_element(&reg, &mut stack, 1);

        mgr.unlink(&mut stack, &mut element).unwrap();

        assert_eq!(element.get_str(MODELER_TEMPLATE), None);
        assert_eq!(element.get_str(MODELER_TEMPLATE_VERSION), None);
        assert!(container::find(&element, MODELER_TEMPLATE_ICON_TYPE)
            .unwrap()
            .is_none());
        // Bound data and its containers survive.
        assert!(container::find(&element, "zeebe:TaskDefinition")
            .unwrap()
            .is_some());
        assert!(container::find(&element, "zeebe:TaskHeaders")
            .unwrap()
            .is_some());
        assert!(matches!(mgr.state_of(&element), TemplateState::NoTemplate));
    }

    #[test]
    fn remove_strips_owned_containers_and_label() {
        let reg = registry_with(vec![rest_template_v(1, "10")]);
        let mgr = TemplateLifecycleManager::new(&reg);
        let mut stack = CommandStack::new();
        let mut element = templated_element(&reg, &mut stack, 1);
        element.set_str(NAME_FIELD, "REST Task");

        mgr.remove(&mut stack, &mut element).unwrap();

        assert_eq!(element.get_str(MODELER_TEMPLATE), None);
        assert!(element.extension_elements().is_none());
        // Label reverted: the host recomputes the plain per-type label.
        assert_eq!(element.get_str(NAME_FIELD), None);
    }

    #[test]
    fn remove_keeps_user_chosen_label() {
        let reg = registry_with(vec![rest_template_v(1, "10")]);
        let mgr = TemplateLifecycleManager::new(&reg);
        let mut stack = CommandStack::new();
        let mut element = templated_element(&reg, &mut stack, 1);
        element.set_str(NAME_FIELD, "My renamed task");

        mgr.remove(&mut stack, &mut element).unwrap();
        assert_eq!(element.get_str(NAME_FIELD), Some("My renamed task"));
    }

    #[test]
    fn remove_on_unknown_template_strips_identity_only() {
        let reg = registry_with(vec![rest_template_v(1, "10")]);
        let mut stack = CommandStack::new();
        let mut element = templated_element(&reg, &mut stack, 1);
        element.set_str(NAME_FIELD, "REST Task");

        let empty = TemplateRegistry::new();
        let mgr = TemplateLifecycleManager::new(&empty);
        mgr.remove(&mut stack, &mut element).unwrap();

        assert_eq!(element.get_str(MODELER_TEMPLATE), None);
        // Ownership and display name unknowable: bound data and label are
        // left alone.
        assert!(container::find(&element, "zeebe:TaskHeaders")
            .unwrap()
            .is_some());
        assert_eq!(element.get_str(NAME_FIELD), Some("REST Task"));
    }

    #[test]
    fn update_migrates_defaults_and_preserves_user_edits() {
        let reg = registry_with(vec![rest_template_v(1, "10"), rest_template_v(2, "30")]);
        let mgr = TemplateLifecycleManager::new(&reg);
        let mut stack = CommandStack::new();

        // Element A: timeout left at the v1 default.
        let mut untouched = templated_element(&reg, &mut stack, 1);
        // Element B: timeout user-edited.
        let mut edited = templated_element(&reg, &mut stack, 1);
        let timeout = reg
            .get("rest-task", Some(1))
            .unwrap()
            .properties
            .iter()
            .find(|p| p.name == "timeout")
            .unwrap()
            .clone();
        resolver::edit_property(&mut stack, &mut edited, &timeout, Some("99")).unwrap();

        let v2 = reg.get("rest-task", Some(2)).unwrap();
        mgr.update(&mut stack, &mut untouched, v2).unwrap();
        mgr.update(&mut stack, &mut edited, v2).unwrap();

        assert_eq!(
            resolver::get_value(&untouched, &timeout).unwrap().as_deref(),
            Some("30")
        );
        assert_eq!(
            resolver::get_value(&edited, &timeout).unwrap().as_deref(),
            Some("99")
        );
        assert_eq!(untouched.get_str(MODELER_TEMPLATE_VERSION), Some("2"));
        assert_eq!(edited.get_str(MODELER_TEMPLATE_VERSION), Some("2"));
    }

    #[test]
    fn update_rebinds_when_storage_path_changes() {
        // v1 stores "endpoint" as a task header; v3 moves it to zeebe:property.
        let v1 = serde_json::json!({
            "id": "move", "version": 1, "name": "Move", "appliesTo": ["bpmn:ServiceTask"],
            "properties": [
                { "type": "zeebe:taskHeader", "name": "endpoint", "binding": { "key": "endpoint" }, "value": "http://a" }
            ]
        });
        let v3 = serde_json::json!({
            "id": "move", "version": 3, "name": "Move", "appliesTo": ["bpmn:ServiceTask"],
            "properties": [
                { "type": "zeebe:property", "name": "endpoint", "binding": { "name": "endpoint" }, "value": "http://a" }
            ]
        });
        let reg = registry_with(vec![v1, v3]);
        let mgr = TemplateLifecycleManager::new(&reg);
        let mut stack = CommandStack::new();

        let mut element = templated_element_for(&reg, &mut stack, "move", 1);
        let old_binding = reg.get("move", Some(1)).unwrap().properties[0].clone();
        resolver::edit_property(&mut stack, &mut element, &old_binding, Some("http://mine"))
            .unwrap();

        let v3 = reg.get("move", Some(3)).unwrap();
        mgr.update(&mut stack, &mut element, v3).unwrap();

        // Old location gone, container pruned; value carried to the new one.
        assert!(container::find(&element, "zeebe:TaskHeaders")
            .unwrap()
            .is_none());
        let new_binding = &v3.properties[0];
        assert_eq!(
            resolver::get_value(&element, new_binding).unwrap().as_deref(),
            Some("http://mine")
        );
    }

    fn templated_element_for(
        reg: &TemplateRegistry,
        stack: &mut CommandStack,
        id: &str,
        version: i64,
    ) -> BusinessObject {
        let template = reg.get(id, Some(version)).unwrap();
        TemplateApplier::create(stack, template).unwrap()
    }

    #[test]
    fn update_without_old_descriptor_preserves_stored_values() {
        // The old version has been dropped from the registry by the time the
        // element is upgraded — old defaults are unknowable.
        let reg1 = registry_with(vec![rest_template_v(1, "10")]);
        let mut stack = CommandStack::new();
        let mut element = templated_element(&reg1, &mut stack, 1);

        let timeout = reg1.get("rest-task", Some(1)).unwrap().properties[1].clone();
        resolver::edit_property(&mut stack, &mut element, &timeout, Some("99")).unwrap();

        let v2 = serde_json::json!({
            "id": "rest-task", "version": 2, "name": "REST Task",
            "appliesTo": ["bpmn:ServiceTask"],
            "properties": [
                { "type": "zeebe:taskDefinition", "binding": {}, "value": "http" },
                { "type": "zeebe:taskHeader", "binding": { "key": "timeout" }, "value": "30" },
                { "type": "zeebe:taskHeader", "binding": { "key": "trace" }, "value": "on" }
            ]
        });
        let reg2 = registry_with(vec![v2]);
        let mgr = TemplateLifecycleManager::new(&reg2);
        mgr.update_to_latest(&mut stack, &mut element).unwrap();

        // Every stored value counts as a user edit and survives verbatim;
        // only the slot with nothing stored takes the new default.
        let v2 = reg2.get("rest-task", Some(2)).unwrap();
        let timeout_v2 = v2.properties.iter().find(|p| p.name == "timeout").unwrap();
        let trace = v2.properties.iter().find(|p| p.name == "trace").unwrap();
        assert_eq!(
            resolver::get_value(&element, timeout_v2).unwrap().as_deref(),
            Some("99")
        );
        assert_eq!(
            resolver::get_value(&element, trace).unwrap().as_deref(),
            Some("on")
        );
        assert_eq!(element.get_str(MODELER_TEMPLATE_VERSION), Some("2"));
    }

    #[test]
    fn corrupt_version_stamp_never_resolves_as_templated() {
        let reg = registry_with(vec![rest_template_v(1, "10")]);
        let mut stack = CommandStack::new();
        let mut element = templated_element(&reg, &mut stack, 1);
        element.set_str(MODELER_TEMPLATE_VERSION, "banana");

        // Same-id descriptors exist: the exact version just cannot resolve.
        let mgr = TemplateLifecycleManager::new(&reg);
        assert!(matches!(
            mgr.state_of(&element),
            TemplateState::Outdated { .. }
        ));

        let empty = TemplateRegistry::new();
        let mgr2 = TemplateLifecycleManager::new(&empty);
        assert!(matches!(
            mgr2.state_of(&element),
            TemplateState::Unknown { .. }
        ));
    }

    #[test]
    fn update_to_latest_exits_the_outdated_state() {
        let reg = registry_with(vec![rest_template_v(1, "10")]);
        let mut stack = CommandStack::new();
        let mut element = templated_element(&reg, &mut stack, 1);

        let reg2 = registry_with(vec![rest_template_v(2, "20"), rest_template_v(3, "30")]);
        let mgr = TemplateLifecycleManager::new(&reg2);
        assert!(matches!(mgr.state_of(&element), TemplateState::Outdated { .. }));

        mgr.update_to_latest(&mut stack, &mut element).unwrap();
        assert_eq!(element.get_str(MODELER_TEMPLATE_VERSION), Some("3"));
        assert!(matches!(mgr.state_of(&element), TemplateState::Templated(_)));

        // No registered version at all: the upgrade has no target.
        let empty = TemplateRegistry::new();
        let mgr3 = TemplateLifecycleManager::new(&empty);
        assert!(matches!(
            mgr3.update_to_latest(&mut stack, &mut element),
            Err(EngineError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn lifecycle_ops_require_a_stamp() {
        let reg = TemplateRegistry::new();
        let mgr = TemplateLifecycleManager::new(&reg);
        let mut stack = CommandStack::new();
        let mut plain = BusinessObject::new("bpmn:ServiceTask");

        assert!(matches!(
            mgr.unlink(&mut stack, &mut plain),
            Err(EngineError::NotTemplated { .. })
        ));
        assert!(matches!(
            mgr.remove(&mut stack, &mut plain),
            Err(EngineError::NotTemplated { .. })
        ));
    }
}
