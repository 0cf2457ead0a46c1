//! In-memory store of template descriptors.
//!
//! An explicit instance owned by the host — no process-wide singleton. The
//! store keeps descriptors in registration order and does not deduplicate;
//! the validator reports duplicates and keeps lookups deterministic by
//! skipping them at load time.

use crate::descriptor::{TemplateDescriptor, TemplateDescriptorJson};
use crate::validate::{self, ValidationError};
use tracing::{debug, warn};

/// Outcome of one `set` call — the changed-set and errors event pair. Both
/// sides can be populated when a batch is partially valid.
#[derive(Debug)]
pub struct LoadOutcome {
    /// Whether the registry contents were replaced.
    pub changed: bool,
    /// Number of descriptors now registered.
    pub added: usize,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: Vec<TemplateDescriptor>,
    /// Epoch ms of the last successful `set`, for host status displays.
    loaded_at: Option<i64>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents from a parsed JSON batch.
    ///
    /// A batch in which nothing validates leaves the previously loaded
    /// contents in place — a failed load never clears a working registry.
    pub fn set(&mut self, batch: Vec<TemplateDescriptorJson>) -> LoadOutcome {
        let (accepted, errors) = validate::validate_batch(&batch);
        for err in &errors {
            warn!(%err, "template descriptor rejected");
        }

        if accepted.is_empty() && !batch.is_empty() {
            return LoadOutcome {
                changed: false,
                added: 0,
                errors,
            };
        }

        debug!(count = accepted.len(), "template registry replaced");
        let added = accepted.len();
        self.templates = accepted;
        self.loaded_at = Some(chrono::Utc::now().timestamp_millis());
        LoadOutcome {
            changed: true,
            added,
            errors,
        }
    }

    pub fn loaded_at(&self) -> Option<i64> {
        self.loaded_at
    }

    /// Lookup by id, optionally pinned to an exact version. `Some(0)` matches
    /// only a descriptor registered with `version: 0`; `None` returns the
    /// first descriptor with that id regardless of version.
    pub fn get(&self, id: &str, version: Option<i64>) -> Option<&TemplateDescriptor> {
        match version {
            None => self.templates.iter().find(|t| t.id == id),
            Some(v) => self
                .templates
                .iter()
                .find(|t| t.id == id && t.version == Some(v)),
        }
    }

    /// All descriptors, or all versions of one id, in registration order.
    pub fn get_all(&self, id: Option<&str>) -> Vec<&TemplateDescriptor> {
        self.templates
            .iter()
            .filter(|t| id.is_none_or(|id| t.id == id))
            .collect()
    }

    /// The descriptor flagged as default for a node type. Auto-applied to
    /// newly created nodes of that type; callers duplicating or pasting nodes
    /// skip this lookup.
    pub fn get_default(&self, element_type: &str) -> Option<&TemplateDescriptor> {
        self.templates
            .iter()
            .find(|t| t.is_default && t.applies_to_type(element_type))
    }

    /// Highest registered version of an id. A versionless descriptor ranks
    /// below any versioned one.
    pub fn latest_version(&self, id: &str) -> Option<&TemplateDescriptor> {
        self.templates
            .iter()
            .filter(|t| t.id == id)
            .max_by_key(|t| t.version.unwrap_or(i64::MIN))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
