//! Per-connection request context.

use std::sync::Arc;

/// The request that upgraded into a connection, plus whatever state the
/// host attached to it.
///
/// `destroy` releases that state. It must be idempotent; the connection
/// layer guarantees it is called once per connection even when the
/// protocol layer fails during close.
pub trait RequestContext: Send + Sync {
    fn id(&self) -> &str;

    /// Request path the connection was opened on.
    fn path(&self) -> &str;

    fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

pub type SharedRequest = Arc<dyn RequestContext>;
