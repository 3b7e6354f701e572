//! Capability registration processors.

use std::marker::PhantomData;

use tracing::debug;

use crate::capability::Capability;
use crate::class::ExtensionClass;
use crate::error::RegistrationError;
use crate::framework::Framework;

/// Outcome of registering one extension class.
pub type Registration = Result<(), RegistrationError>;

/// Handles one discovered extension class.
///
/// Implementations never panic out of `handle` and leave the registry
/// untouched when they return an error.
pub trait Processor: Send + Sync {
    /// Capability this processor registers instances under.
    fn capability(&self) -> &'static str;

    fn handle(&self, framework: &Framework, class: &ExtensionClass) -> Registration;
}

/// Instantiates a class, checks it provides `C` and registers it.
pub struct CapabilityProcessor<C> {
    _capability: PhantomData<fn() -> C>,
}

impl<C: Capability> CapabilityProcessor<C> {
    pub fn new() -> Self {
        Self {
            _capability: PhantomData,
        }
    }
}

impl<C: Capability> Default for CapabilityProcessor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Capability> Processor for CapabilityProcessor<C> {
    fn capability(&self) -> &'static str {
        C::NAME
    }

    fn handle(&self, framework: &Framework, class: &ExtensionClass) -> Registration {
        let result = register::<C>(framework, class);
        match &result {
            Ok(()) => debug!(
                parent: framework.span(),
                class = class.name(),
                capability = C::NAME,
                "extension registered"
            ),
            Err(e) => debug!(
                parent: framework.span(),
                class = class.name(),
                capability = C::NAME,
                kind = e.kind(),
                "extension skipped: {e}"
            ),
        }
        result
    }
}

fn register<C: Capability>(framework: &Framework, class: &ExtensionClass) -> Registration {
    // Classes that do not declare `C` are rejected without being constructed.
    if !class.declares::<C>() {
        return Err(mismatch::<C>(class));
    }
    let instance = framework.new_instance(class)?;
    let object = class.cast::<C>(instance).ok_or_else(|| mismatch::<C>(class))?;
    framework.register::<C>(class.name(), object)
}

fn mismatch<C: Capability>(class: &ExtensionClass) -> RegistrationError {
    RegistrationError::CapabilityMismatch {
        class: class.name().to_string(),
        capability: C::NAME,
    }
}
