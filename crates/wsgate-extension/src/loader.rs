//! Startup loading: markers bound to processors, batches of discovered
//! classes in, one report out.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::class::ExtensionClass;
use crate::error::RegistrationError;
use crate::framework::Framework;
use crate::processor::Processor;

/// Declared marker under which an extension class was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker(String);

impl Marker {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Marker {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Marker → processor bindings. Keys are unique.
#[derive(Default)]
pub struct ProcessorTable {
    processors: HashMap<Marker, Arc<dyn Processor>>,
}

impl ProcessorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `marker` to `processor`. Returns the table unchanged as `Err`
    /// when the marker is already bound.
    pub fn bind<P: Processor + 'static>(
        mut self,
        marker: impl Into<Marker>,
        processor: P,
    ) -> Result<Self, Self> {
        let marker = marker.into();
        if self.processors.contains_key(&marker) {
            return Err(self);
        }
        self.processors.insert(marker, Arc::new(processor));
        Ok(self)
    }

    pub fn get(&self, marker: &Marker) -> Option<&Arc<dyn Processor>> {
        self.processors.get(marker)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl fmt::Debug for ProcessorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.processors.iter().map(|(m, p)| (m.as_str(), p.capability())))
            .finish()
    }
}

/// Per-batch outcome of [`ExtensionLoader::load`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    registered: Vec<(String, &'static str)>,
    failures: Vec<RegistrationError>,
}

impl RegistrationReport {
    /// `(class, capability)` for every successful registration, in order.
    pub fn registered(&self) -> &[(String, &'static str)] {
        &self.registered
    }

    pub fn failures(&self) -> &[RegistrationError] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.registered.len() + self.failures.len()
    }
}

/// Runs each discovered class through the processor bound to its marker.
pub struct ExtensionLoader {
    table: ProcessorTable,
}

impl ExtensionLoader {
    pub fn new(table: ProcessorTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ProcessorTable {
        &self.table
    }

    /// Register every class in `discovered`. One failing class never stops
    /// the others; failures are collected and logged once for the batch.
    pub fn load<I>(&self, framework: &Framework, discovered: I) -> RegistrationReport
    where
        I: IntoIterator<Item = (Marker, ExtensionClass)>,
    {
        let mut report = RegistrationReport::default();

        for (marker, class) in discovered {
            let Some(processor) = self.table.get(&marker) else {
                report.failures.push(RegistrationError::UnknownMarker {
                    class: class.name().to_string(),
                    marker: marker.to_string(),
                });
                continue;
            };
            match processor.handle(framework, &class) {
                Ok(()) => report
                    .registered
                    .push((class.name().to_string(), processor.capability())),
                Err(e) => report.failures.push(e),
            }
        }

        if report.is_clean() {
            info!(
                parent: framework.span(),
                registered = report.registered.len(),
                "extensions loaded"
            );
        } else {
            let failed: Vec<String> = report.failures.iter().map(ToString::to_string).collect();
            warn!(
                parent: framework.span(),
                registered = report.registered.len(),
                failed = report.failures.len(),
                "extensions loaded with failures: {}",
                failed.join("; ")
            );
        }

        report
    }
}
