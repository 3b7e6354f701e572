//! Capability markers.

/// A behavioural contract an extension instance can satisfy.
///
/// Implemented by a zero-sized marker type per contract; `Object` is the
/// trait object the registry hands out for it.
///
/// ```ignore
/// pub struct LifecycleObserverCapability;
///
/// impl Capability for LifecycleObserverCapability {
///     type Object = dyn LifecycleObserver;
///     const NAME: &'static str = "connection-lifecycle-observer";
/// }
/// ```
pub trait Capability: 'static {
    type Object: ?Sized + Send + Sync + 'static;

    /// Human-readable name used in logs and errors.
    const NAME: &'static str;
}
