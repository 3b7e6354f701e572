//! Registration failure kinds.

use thiserror::Error;

/// Why the registry refused a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryWriteError {
    #[error("registry is sealed")]
    Sealed,

    #[error("already registered")]
    Duplicate,
}

/// Why one extension class was not registered.
///
/// None of these are fatal; the class is skipped and startup continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("failed to instantiate extension `{class}`: {reason}")]
    Instantiation { class: String, reason: String },

    #[error("extension `{class}` does not provide capability `{capability}`")]
    CapabilityMismatch {
        class: String,
        capability: &'static str,
    },

    #[error("failed to register extension `{class}` as `{capability}`: {source}")]
    RegistryWrite {
        class: String,
        capability: &'static str,
        #[source]
        source: RegistryWriteError,
    },

    #[error("no processor bound to marker `{marker}` (extension `{class}`)")]
    UnknownMarker { class: String, marker: String },
}

impl RegistrationError {
    /// Name of the extension class the failure concerns.
    pub fn class(&self) -> &str {
        match self {
            Self::Instantiation { class, .. }
            | Self::CapabilityMismatch { class, .. }
            | Self::RegistryWrite { class, .. }
            | Self::UnknownMarker { class, .. } => class,
        }
    }

    /// Short kind label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Instantiation { .. } => "instantiation",
            Self::CapabilityMismatch { .. } => "capability-mismatch",
            Self::RegistryWrite { .. } => "registry-write",
            Self::UnknownMarker { .. } => "unknown-marker",
        }
    }
}
