//! Request context for connections accepted by the transport server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;
use wsgate_protocol::RequestContext;

/// The HTTP request that was upgraded, plus attributes the application
/// attaches for the life of the connection.
#[derive(Debug)]
pub struct UpgradeRequest {
    id: String,
    path: String,
    remote_addr: Option<SocketAddr>,
    headers: Vec<(String, String)>,
    attributes: Mutex<HashMap<String, String>>,
    destroyed: AtomicBool,
}

impl UpgradeRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: path.into(),
            remote_addr: None,
            headers: Vec::new(),
            attributes: Mutex::new(HashMap::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attach an attribute. Ignored once the request is destroyed.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<String>) {
        if !self.is_destroyed() {
            self.attributes.lock().insert(key.into(), value.into());
        }
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.attributes.lock().get(key).cloned()
    }
}

impl RequestContext for UpgradeRequest {
    fn id(&self) -> &str {
        &self.id
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.attributes.lock().clear();
        debug!(request = %self.id, "request destroyed");
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}
