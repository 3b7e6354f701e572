//! wsgate Extension Registration
//!
//! Extensions are declared in code as [`ExtensionClass`] descriptors: a
//! constructor plus the capabilities the constructed object provides. At
//! startup each discovered `(marker, class)` pair is handed to the
//! [`Processor`] bound to its marker, which instantiates the class through
//! the [`Framework`], checks the target capability and registers the
//! instance in the [`ExtensionRegistry`].
//!
//! A misbehaving extension never stops startup. Every registration yields an
//! explicit result; the [`ExtensionLoader`] aggregates them into one
//! [`RegistrationReport`] per batch.
//!
//! Once startup is done the registry is sealed into an immutable
//! [`RegistrySnapshot`] that is read without locking.

pub mod capability;
pub mod class;
pub mod error;
pub mod framework;
pub mod loader;
pub mod processor;
pub mod registry;

pub use capability::Capability;
pub use class::{ClassBuilder, ExtensionClass};
pub use error::{RegistrationError, RegistryWriteError};
pub use framework::Framework;
pub use loader::{ExtensionLoader, Marker, ProcessorTable, RegistrationReport};
pub use processor::{CapabilityProcessor, Processor, Registration};
pub use registry::{ExtensionRegistry, RegistrySnapshot};
