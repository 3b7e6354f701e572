//! Framework handle given to registration processors.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::Span;
use wsgate_protocol::InitParams;

use crate::capability::Capability;
use crate::class::{ExtensionClass, Instance};
use crate::error::RegistrationError;
use crate::registry::{ExtensionRegistry, RegistrySnapshot};

/// Owns the extension registry and the process-wide configuration, and
/// constructs extension instances.
pub struct Framework {
    params: InitParams,
    registry: ExtensionRegistry,
    span: Span,
}

impl Framework {
    pub fn new(params: InitParams) -> Self {
        Self {
            params,
            registry: ExtensionRegistry::new(),
            span: Span::current(),
        }
    }

    /// Emit registration records under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn params(&self) -> &InitParams {
        &self.params
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run the class constructor. A constructor that panics is reported as
    /// an instantiation failure like one that returns an error.
    pub(crate) fn new_instance(&self, class: &ExtensionClass) -> Result<Instance, RegistrationError> {
        let instantiation = |reason: String| RegistrationError::Instantiation {
            class: class.name().to_string(),
            reason,
        };
        match catch_unwind(AssertUnwindSafe(|| class.construct(self))) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(e)) => Err(instantiation(e.to_string())),
            Err(panic) => Err(instantiation(format!(
                "constructor panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    /// Add an instance to the registry under `C`.
    pub fn register<C: Capability>(
        &self,
        class: &str,
        instance: Arc<C::Object>,
    ) -> Result<(), RegistrationError> {
        self.registry
            .register::<C>(class, instance)
            .map_err(|source| RegistrationError::RegistryWrite {
                class: class.to_string(),
                capability: C::NAME,
                source,
            })
    }

    /// End startup: no further registrations are accepted.
    pub fn seal(&self) -> Arc<RegistrySnapshot> {
        self.registry.seal()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}
