//! The get/set dispatcher over binding kinds.
//!
//! `get_value` never fails on absence — it reports `None` and callers fall
//! back to defaults. `set_value` stages every mutation needed for one edit
//! (container creation, entry insertion, pruning) so the caller can wrap the
//! whole thing in a single undoable command.

use crate::binding::container;
use crate::binding::order::{self, InsertionPolicy};
use crate::command::CommandStack;
use crate::descriptor::{BindingDescriptor, BindingKind};
use crate::error::Result;
use crate::model::BusinessObject;
use tracing::debug;

/// Options for one `set_value` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions<'a> {
    /// Placement for a newly created collection entry. Interactive edits
    /// append; template application passes declaration order.
    pub insertion: Option<InsertionPolicy<'a>>,
    /// When the edited field is itself the entry's key, the entry must be
    /// located by its old key, not the new one.
    pub old_key: Option<&'a str>,
}

// ─── Read path ────────────────────────────────────────────────

/// The value currently stored at the binding's location, or the binding's
/// default when nothing is stored. `None` is the empty sentinel, not an error.
pub fn get_value(element: &BusinessObject, binding: &BindingDescriptor) -> Result<Option<String>> {
    Ok(stored_value(element, binding)?.or_else(|| binding.default_value.clone()))
}

/// The stored value only — no default fallback. Lifecycle migration uses this
/// to tell a user edit from an untouched template default.
pub fn stored_value(
    element: &BusinessObject,
    binding: &BindingDescriptor,
) -> Result<Option<String>> {
    let value = match &binding.kind {
        BindingKind::Property { field } => element.get_str(field).map(str::to_string),
        BindingKind::SingletonNested {
            element_type,
            field,
        } => container::find(element, element_type)?
            .and_then(|child| child.get_str(field))
            .map(str::to_string),
        BindingKind::CollectionEntry {
            container_type,
            collection_field,
            key_field,
            key_value,
            value_field,
            ..
        } => container::find(element, container_type)?
            .and_then(|c| c.list(collection_field))
            .and_then(|entries| {
                order::locate(entries, key_field, key_value).map(|idx| &entries[idx])
            })
            .and_then(|entry| entry.get_str(value_field))
            .map(str::to_string),
    };
    Ok(value)
}

// ─── Write path ───────────────────────────────────────────────

/// Write `new_value` to the binding's location, creating intermediate
/// containers on demand. An empty value on an optional binding removes the
/// field/entry instead and prunes containers that became empty.
pub fn set_value(
    element: &mut BusinessObject,
    binding: &BindingDescriptor,
    new_value: Option<&str>,
    opts: SetOptions<'_>,
) -> Result<()> {
    let is_empty = new_value.map_or(true, str::is_empty);
    if binding.optional && is_empty {
        return remove_value(element, binding, opts.old_key);
    }

    match &binding.kind {
        BindingKind::Property { field } => {
            if let Some(v) = new_value {
                element.set_str(field.clone(), v);
            }
        }
        BindingKind::SingletonNested {
            element_type,
            field,
        } => {
            if let Some(v) = new_value {
                let child = container::find_or_create(element, element_type)?;
                child.set_str(field.clone(), v);
            }
        }
        BindingKind::CollectionEntry {
            container_type,
            collection_field,
            entry_type,
            key_field,
            key_value,
            value_field,
        } => {
            let lookup_key = opts.old_key.unwrap_or(key_value);
            let cont = container::find_or_create(element, container_type)?;
            let entries = cont.list_mut_or_default(collection_field);

            match order::locate(entries, key_field, lookup_key) {
                Some(idx) => {
                    // In-place update preserves the entry's position among
                    // its siblings.
                    let entry = &mut entries[idx];
                    entry.set_str(key_field.clone(), key_value.clone());
                    if let Some(v) = new_value {
                        entry.set_str(value_field.clone(), v);
                    }
                }
                None => {
                    debug!(container = %container_type, key = %key_value, "inserting entry");
                    let mut entry = BusinessObject::new(entry_type.clone());
                    entry.set_str(key_field.clone(), key_value.clone());
                    if let Some(v) = new_value {
                        entry.set_str(value_field.clone(), v);
                    }
                    order::insert_ordered(
                        entries,
                        entry,
                        opts.insertion.unwrap_or(InsertionPolicy::Append),
                    );
                }
            }
        }
    }
    Ok(())
}

/// Remove whatever the binding stores, then prune containers left empty.
/// Removing the last entry of a collection removes the whole typed container,
/// and the wrapper too when nothing else lives in it.
pub fn remove_value(
    element: &mut BusinessObject,
    binding: &BindingDescriptor,
    old_key: Option<&str>,
) -> Result<()> {
    match &binding.kind {
        BindingKind::Property { field } => {
            element.remove(field);
        }
        BindingKind::SingletonNested {
            element_type,
            field,
        } => {
            if container::find(element, element_type)?.is_some() {
                if let Some(child) = find_child_mut(element, element_type) {
                    child.remove(field);
                }
                container::prune(element, element_type);
            }
        }
        BindingKind::CollectionEntry {
            container_type,
            collection_field,
            key_field,
            key_value,
            ..
        } => {
            let lookup_key = old_key.unwrap_or(key_value);
            if container::find(element, container_type)?.is_some() {
                if let Some(cont) = find_child_mut(element, container_type) {
                    if let Some(entries) = cont.list_mut(collection_field) {
                        if let Some(idx) = order::locate(entries, key_field, lookup_key) {
                            entries.remove(idx);
                        }
                    }
                }
                container::prune(element, container_type);
            }
        }
    }
    Ok(())
}

fn find_child_mut<'a>(
    element: &'a mut BusinessObject,
    child_type: &str,
) -> Option<&'a mut BusinessObject> {
    element
        .extension_elements_mut()?
        .list_mut(crate::model::EXTENSION_VALUES)?
        .iter_mut()
        .find(|c| c.element_type == child_type)
}

// ─── UI seam ──────────────────────────────────────────────────

/// One user edit as one undoable command.
pub fn edit_property(
    stack: &mut CommandStack,
    element: &mut BusinessObject,
    binding: &BindingDescriptor,
    new_value: Option<&str>,
) -> Result<()> {
    stack.execute("element-template.edit-property", element, |el| {
        set_value(el, binding, new_value, SetOptions::default())
    })
}

/// A user edit that changes the entry's key field. `old_key` locates the
/// existing entry; the binding carries the new key.
pub fn edit_property_rekey(
    stack: &mut CommandStack,
    element: &mut BusinessObject,
    binding: &BindingDescriptor,
    old_key: &str,
    new_value: Option<&str>,
) -> Result<()> {
    stack.execute("element-template.edit-property", element, |el| {
        set_value(
            el,
            binding,
            new_value,
            SetOptions {
                old_key: Some(old_key),
                ..SetOptions::default()
            },
        )
    })
}
