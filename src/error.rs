//! Error taxonomy for the binding engine.
//!
//! Validation failures are fatal to the single call that raised them and never
//! corrupt already-committed state. Absent values are not errors: `get_value`
//! reports them as `None`, and callers distinguish "empty" from "failed".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A template descriptor fails structural validation. Fatal to the single
    /// `create`/`apply` call; the registry's existing contents are untouched.
    #[error("invalid template '{id}': {reason}")]
    InvalidTemplate { id: String, reason: String },

    /// The target element's type cannot carry extension elements, so a binding
    /// that needs a container has nowhere to live.
    #[error("element type '{element_type}' cannot host extension elements")]
    UnsupportedHost { element_type: String },

    /// A lifecycle operation needs a registered descriptor that does not exist.
    #[error("no template registered for id '{id}'{}", version.map(|v| format!(" version {v}")).unwrap_or_default())]
    TemplateNotFound { id: String, version: Option<i64> },

    /// A lifecycle operation was invoked on an element with no identity stamp.
    #[error("element '{element_id}' carries no template identity stamp")]
    NotTemplated { element_id: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
