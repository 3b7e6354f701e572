//! Extension class descriptors.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::capability::Capability;
use crate::framework::Framework;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A constructed extension before it is viewed through any capability.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

type Constructor = Box<dyn Fn(&Framework) -> Result<Instance, BoxError> + Send + Sync>;

/// Casts an instance to `Arc<C::Object>`, boxed as `dyn Any`.
type Cast = Box<dyn Fn(Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Everything needed to construct one extension and view it through the
/// capabilities it declares.
pub struct ExtensionClass {
    name: String,
    type_name: &'static str,
    construct: Constructor,
    casts: HashMap<TypeId, Cast>,
}

impl ExtensionClass {
    /// Start describing an extension whose instances are built by `construct`.
    pub fn builder<T, F>(name: impl Into<String>, construct: F) -> ClassBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Framework) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        ClassBuilder {
            class: ExtensionClass {
                name: name.into(),
                type_name: type_name::<T>(),
                construct: Box::new(move |framework: &Framework| {
                    construct(framework).map(|value| Arc::new(value) as Instance)
                }),
                casts: HashMap::new(),
            },
            _type: PhantomData,
        }
    }

    /// Describe an extension constructed with `T::default()`.
    pub fn of_default<T>(name: impl Into<String>) -> ClassBuilder<T>
    where
        T: Default + Send + Sync + 'static,
    {
        Self::builder(name, |_| Ok(T::default()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type of the instances this class builds.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the class declares capability `C`.
    pub fn declares<C: Capability>(&self) -> bool {
        self.casts.contains_key(&TypeId::of::<C>())
    }

    pub(crate) fn construct(&self, framework: &Framework) -> Result<Instance, BoxError> {
        (self.construct)(framework)
    }

    /// View `instance` as `C::Object`, or `None` when the class does not
    /// declare `C`.
    pub(crate) fn cast<C: Capability>(&self, instance: Instance) -> Option<Arc<C::Object>> {
        let cast = self.casts.get(&TypeId::of::<C>())?;
        let boxed = cast(instance)?;
        boxed.downcast::<Arc<C::Object>>().ok().map(|arc| *arc)
    }
}

impl fmt::Debug for ExtensionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionClass")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("capabilities", &self.casts.len())
            .finish()
    }
}

/// Builder returned by [`ExtensionClass::builder`].
pub struct ClassBuilder<T> {
    class: ExtensionClass,
    _type: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ClassBuilder<T> {
    /// Declare that instances satisfy `C`, viewed through `cast`.
    ///
    /// `cast` is normally an unsizing coercion:
    /// `.provides::<LifecycleObserverCapability>(|o| o as Arc<dyn LifecycleObserver>)`.
    pub fn provides<C: Capability>(mut self, cast: fn(Arc<T>) -> Arc<C::Object>) -> Self {
        self.class.casts.insert(
            TypeId::of::<C>(),
            Box::new(move |instance: Instance| {
                let typed = instance.downcast::<T>().ok()?;
                Some(Box::new(cast(typed)) as Box<dyn Any + Send + Sync>)
            }),
        );
        self
    }

    pub fn build(self) -> ExtensionClass {
        self.class
    }
}
