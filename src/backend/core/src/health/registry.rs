//! The fixed, ordered set of probes a service runs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::probe::{Criticality, Probe};
use super::probes::{
    CpuProbe, DatabaseProbe, FilesystemProbe, HttpReachabilityProbe, MemoryProbe, OsIntrospect,
    PgDatabase, SystemIntrospect,
};
use crate::config::Config;
use crate::error::{PreflightError, Result};

/// One probe and how it is run.
#[derive(Clone)]
pub struct RegisteredProbe {
    name: String,
    probe: Arc<dyn Probe>,
    criticality: Criticality,
    timeout: Option<Duration>,
}

impl RegisteredProbe {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probe(&self) -> &Arc<dyn Probe> {
        &self.probe
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    /// Per-probe timeout override.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl std::fmt::Debug for RegisteredProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProbe")
            .field("name", &self.name)
            .field("criticality", &self.criticality)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Immutable, ordered probe list. Cloning shares the same entries.
#[derive(Clone, Debug)]
pub struct ProbeRegistry {
    entries: Arc<[RegisteredProbe]>,
}

impl ProbeRegistry {
    pub fn builder() -> ProbeRegistryBuilder {
        ProbeRegistryBuilder::default()
    }

    /// Build the standard set: database, filesystem, memory and cpu as
    /// critical probes, then every enabled integration as optional.
    ///
    /// Must be called from within a Tokio runtime; the database pool is
    /// created lazily but registers its maintenance task on creation.
    pub fn from_config(config: &Config) -> Result<Self> {
        let health = &config.health;

        let database = match config.database.url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let handle = PgDatabase::connect_lazy(url, config.database.connect_timeout)?;
                DatabaseProbe::new(Arc::new(handle))
            }
            None => DatabaseProbe::unconfigured(),
        }
        .with_slow_threshold(config.database.slow_threshold);

        let introspect: Arc<dyn SystemIntrospect> =
            Arc::new(OsIntrospect::new(health.process_memory_limit_bytes));

        let mut builder = Self::builder()
            .critical(database)
            .with_timeout(config.database.connect_timeout.max(health.probe_timeout))
            .critical(FilesystemProbe::new(&health.scratch_dir))
            .critical(MemoryProbe::new(introspect.clone()).with_thresholds(health.memory))
            .critical(CpuProbe::new(introspect).with_thresholds(health.cpu));

        let integrations = &config.integrations;
        let presets = [
            (&integrations.github, HttpReachabilityProbe::github(None)),
            (&integrations.payments, HttpReachabilityProbe::payments(None)),
            (&integrations.email, HttpReachabilityProbe::email(None)),
        ];
        for (settings, preset) in presets {
            if settings.enabled {
                builder = builder.optional(settings.apply(preset));
            }
        }

        for (name, settings) in integrations.additional.iter().filter(|(_, s)| s.enabled) {
            let url = settings.url.clone().ok_or_else(|| {
                PreflightError::invalid_configuration(format!(
                    "integrations.additional.{} needs a url",
                    name
                ))
            })?;
            builder = builder.optional(settings.apply(HttpReachabilityProbe::new(name, url)));
        }

        let registry = builder.build()?;
        info!(
            critical = ?registry.critical_names().collect::<Vec<_>>(),
            optional = ?registry.optional_names().collect::<Vec<_>>(),
            "Probe registry initialized"
        );
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredProbe> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegisteredProbe> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn critical_names(&self) -> impl Iterator<Item = &str> {
        self.names_with(Criticality::Critical)
    }

    pub fn optional_names(&self) -> impl Iterator<Item = &str> {
        self.names_with(Criticality::Optional)
    }

    fn names_with(&self, criticality: Criticality) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |e| e.criticality == criticality)
            .map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects probes in registration order.
#[derive(Default)]
pub struct ProbeRegistryBuilder {
    entries: Vec<RegisteredProbe>,
}

impl ProbeRegistryBuilder {
    pub fn critical(self, probe: impl Probe + 'static) -> Self {
        self.register(Arc::new(probe), Criticality::Critical)
    }

    pub fn optional(self, probe: impl Probe + 'static) -> Self {
        self.register(Arc::new(probe), Criticality::Optional)
    }

    pub fn register(mut self, probe: Arc<dyn Probe>, criticality: Criticality) -> Self {
        self.entries.push(RegisteredProbe {
            name: probe.name().to_string(),
            probe,
            criticality,
            timeout: None,
        });
        self
    }

    /// Override the timeout of the most recently registered probe.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.timeout = Some(timeout);
        }
        self
    }

    /// Fails if two probes share a name.
    pub fn build(self) -> Result<ProbeRegistry> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(PreflightError::duplicate_probe(&entry.name));
            }
        }
        Ok(ProbeRegistry {
            entries: self.entries.into(),
        })
    }
}
