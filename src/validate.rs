//! Structural validation of template descriptor batches.
//!
//! Returns every error found rather than stopping at the first, so a loader
//! can report a complete errors event alongside the accepted subset.

use crate::descriptor::{TemplateDescriptor, TemplateDescriptorJson};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub rule: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

fn error(rule: &str, message: String) -> ValidationError {
    ValidationError {
        rule: rule.to_string(),
        message,
    }
}

/// Validate and parse a descriptor batch. Descriptors that pass every rule are
/// returned parsed, in batch order; failures are reported per descriptor and
/// never poison their siblings.
///
/// Rules:
/// - T1: `id` must be non-empty
/// - T2: `appliesTo` must name at least one element type
/// - T3: `name` must be non-empty
/// - T4: every property's binding must be well-formed
/// - T5: `(id, version)` must be unique within the batch — first wins, the
///   duplicate is reported and skipped
pub fn validate_batch(
    batch: &[TemplateDescriptorJson],
) -> (Vec<TemplateDescriptor>, Vec<ValidationError>) {
    let mut accepted = Vec::new();
    let mut errors = Vec::new();
    let mut seen: HashSet<(String, Option<i64>)> = HashSet::new();

    for json in batch {
        let label = describe(json);
        let mut ok = true;

        if json.id.is_empty() {
            errors.push(error("T1", format!("template {label}: missing id")));
            ok = false;
        }
        if json.applies_to.is_empty() {
            errors.push(error(
                "T2",
                format!("template {label}: appliesTo must name at least one element type"),
            ));
            ok = false;
        }
        if json.name.is_empty() {
            errors.push(error("T3", format!("template {label}: missing name")));
            ok = false;
        }

        let parsed = match TemplateDescriptor::from_json(json) {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                errors.push(error("T4", format!("template {label}: {reason}")));
                ok = false;
                None
            }
        };

        // Explicit presence semantics: (id, Some(0)) and (id, None) are
        // different identities.
        if !json.id.is_empty() && !seen.insert((json.id.clone(), json.version)) {
            errors.push(error(
                "T5",
                format!("template {label}: duplicate (id, version) — first registration wins"),
            ));
            ok = false;
        }

        if ok {
            if let Some(parsed) = parsed {
                accepted.push(parsed);
            }
        }
    }

    (accepted, errors)
}

fn describe(json: &TemplateDescriptorJson) -> String {
    let id = if json.id.is_empty() {
        "<missing>"
    } else {
        json.id.as_str()
    };
    match json.version {
        Some(v) => format!("'{id}' v{v}"),
        None => format!("'{id}'"),
    }
}
