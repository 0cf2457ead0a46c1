//! Extension-container lifetime.
//!
//! Containers exist only while they have content: the wrapper node and its
//! typed children are created lazily on first write and detached eagerly when
//! their last content is removed, by whichever binding removed it. Lifetime is
//! structural and collection-counted, never tied to the descriptor that
//! created a container.

use crate::error::{EngineError, Result};
use crate::model::{
    BusinessObject, Value, EXTENSION_ELEMENTS, EXTENSION_ELEMENTS_TYPE, EXTENSION_VALUES,
};
use tracing::debug;

fn check_host(element: &BusinessObject) -> Result<()> {
    if element.can_host_extensions() {
        Ok(())
    } else {
        Err(EngineError::UnsupportedHost {
            element_type: element.element_type.clone(),
        })
    }
}

/// The typed container of `container_type` under the element's extension
/// wrapper, if present.
pub fn find<'a>(
    element: &'a BusinessObject,
    container_type: &str,
) -> Result<Option<&'a BusinessObject>> {
    check_host(element)?;
    Ok(element
        .extension_elements()
        .and_then(|ext| ext.list(EXTENSION_VALUES))
        .and_then(|values| values.iter().find(|c| c.element_type == container_type)))
}

/// Mutable access to the typed container, creating the wrapper and the
/// container on demand.
pub fn find_or_create<'a>(
    element: &'a mut BusinessObject,
    container_type: &str,
) -> Result<&'a mut BusinessObject> {
    check_host(element)?;

    if element.extension_elements().is_none() {
        debug!(element = %element.element_type, "creating extension wrapper");
        element.set(
            EXTENSION_ELEMENTS,
            Value::Node(Box::new(BusinessObject::new(EXTENSION_ELEMENTS_TYPE))),
        );
    }
    let element_type = element.element_type.clone();
    let Some(ext) = element.extension_elements_mut() else {
        return Err(EngineError::UnsupportedHost { element_type });
    };

    let values = ext.list_mut_or_default(EXTENSION_VALUES);
    if !values.iter().any(|c| c.element_type == container_type) {
        debug!(container = container_type, "creating typed container");
        values.push(BusinessObject::new(container_type));
    }
    let idx = values
        .iter()
        .position(|c| c.element_type == container_type)
        .unwrap_or(values.len() - 1);
    Ok(&mut values[idx])
}

/// Detach the typed container if it is now empty, and the wrapper itself if
/// no typed children remain. Invoked deterministically after every removal.
pub fn prune(element: &mut BusinessObject, container_type: &str) {
    let Some(ext) = element.extension_elements_mut() else {
        return;
    };
    if let Some(values) = ext.list_mut(EXTENSION_VALUES) {
        if let Some(idx) = values
            .iter()
            .position(|c| c.element_type == container_type && !c.has_content())
        {
            debug!(container = container_type, "pruning empty container");
            values.remove(idx);
        }
    }
    if !ext.has_content() {
        debug!(element = %element.element_type, "pruning empty extension wrapper");
        element.remove(EXTENSION_ELEMENTS);
    }
}

/// Detach one extension child by type regardless of its content, pruning the
/// wrapper when it empties. Used for identity-owned children like the
/// template icon.
pub fn remove_child(element: &mut BusinessObject, child_type: &str) {
    let Some(ext) = element.extension_elements_mut() else {
        return;
    };
    if let Some(values) = ext.list_mut(EXTENSION_VALUES) {
        values.retain(|c| c.element_type != child_type);
    }
    if !ext.has_content() {
        element.remove(EXTENSION_ELEMENTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_without_wrapper_returns_none() {
        let element = BusinessObject::new("bpmn:ServiceTask");
        assert!(find(&element, "zeebe:IoMapping").unwrap().is_none());
    }

    #[test]
    fn find_or_create_builds_wrapper_and_container_once() {
        let mut element = BusinessObject::new("bpmn:ServiceTask");
        find_or_create(&mut element, "zeebe:IoMapping").unwrap();
        find_or_create(&mut element, "zeebe:IoMapping").unwrap();
        find_or_create(&mut element, "zeebe:TaskHeaders").unwrap();

        let values = element
            .extension_elements()
            .unwrap()
            .list(EXTENSION_VALUES)
            .unwrap();
        assert_eq!(values.len(), 2);
        assert!(find(&element, "zeebe:IoMapping").unwrap().is_some());
    }

    #[test]
    fn non_host_type_is_rejected() {
        let mut header = BusinessObject::new("zeebe:Header");
        assert!(matches!(
            find(&header, "zeebe:IoMapping"),
            Err(EngineError::UnsupportedHost { .. })
        ));
        assert!(find_or_create(&mut header, "zeebe:IoMapping").is_err());
    }

    #[test]
    fn prune_removes_empty_container_and_wrapper() {
        let mut element = BusinessObject::new("bpmn:ServiceTask");
        {
            let mapping = find_or_create(&mut element, "zeebe:IoMapping").unwrap();
            mapping
                .list_mut_or_default("inputParameters")
                .push(BusinessObject::new("zeebe:Input"));
        }

        // Still occupied: prune is a no-op.
        prune(&mut element, "zeebe:IoMapping");
        assert!(find(&element, "zeebe:IoMapping").unwrap().is_some());

        element
            .extension_elements_mut()
            .unwrap()
            .list_mut(EXTENSION_VALUES)
            .unwrap()[0]
            .list_mut("inputParameters")
            .unwrap()
            .clear();
        prune(&mut element, "zeebe:IoMapping");

        // No empty wrapper left behind either.
        assert!(element.extension_elements().is_none());
    }

    #[test]
    fn prune_keeps_wrapper_while_siblings_remain() {
        let mut element = BusinessObject::new("bpmn:ServiceTask");
        find_or_create(&mut element, "zeebe:IoMapping").unwrap();
        {
            let headers = find_or_create(&mut element, "zeebe:TaskHeaders").unwrap();
            headers
                .list_mut_or_default("values")
                .push(BusinessObject::new("zeebe:Header"));
        }

        prune(&mut element, "zeebe:IoMapping");
        assert!(find(&element, "zeebe:IoMapping").unwrap().is_none());
        assert!(find(&element, "zeebe:TaskHeaders").unwrap().is_some());
        assert!(element.extension_elements().is_some());
    }
}
