//! Profiler type name -> session factory.
//!
//! Filled through a [`RegistryBuilder`] during startup, then frozen into a
//! [`Registry`] that is only ever read, from any number of sampling loops.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use crate::bridge::Bridge;
use crate::error::SpyError;
use crate::session::{InitParams, Session};

pub type Factory = Arc<dyn Fn(InitParams) -> Result<Session, SpyError> + Send + Sync>;

/// Name the rbspy capture library registers under
pub const RBSPY: &str = "rbspy";
/// Scripted in-process bridge, for exercising the agent without a capture library
#[cfg(feature = "mock")]
pub const MOCK: &str = "mock";

static GLOBAL: OnceCell<Registry> = OnceCell::new();

#[derive(Default)]
pub struct RegistryBuilder {
    factories: HashMap<String, Factory>,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort_unstable();
        f.debug_struct("RegistryBuilder").field("profilers", &names).finish()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<&mut Self, SpyError>
    where
        F: Fn(InitParams) -> Result<Session, SpyError> + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(SpyError::DuplicateProfiler(name.to_owned()));
        }
        self.factories.insert(name.to_owned(), Arc::new(factory));
        Ok(self)
    }

    /// Register a factory that starts sessions on `bridge`.
    pub fn register_bridge(&mut self, name: &str, bridge: Arc<dyn Bridge>) -> Result<&mut Self, SpyError> {
        self.register(name, move |params| Session::start(Arc::clone(&bridge), params))
    }

    pub fn build(self) -> Registry {
        Registry { factories: self.factories }
    }
}

pub struct Registry {
    factories: HashMap<String, Factory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("profilers", &self.names()).finish()
    }
}

impl Registry {
    pub fn lookup(&self, name: &str) -> Result<Factory, SpyError> {
        self.factories
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| SpyError::NotFound(name.to_owned()))
    }

    pub fn start(&self, name: &str, params: InitParams) -> Result<Session, SpyError> {
        let factory = self.lookup(name)?;
        factory(params)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered profiler names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Profilers compiled into this build.
pub fn builtin() -> Result<RegistryBuilder, SpyError> {
    #[allow(unused_mut)]
    let mut builder = RegistryBuilder::new();
    #[cfg(feature = "rbspy")]
    builder.register_bridge(RBSPY, Arc::new(crate::bridge::RbspyBridge))?;
    #[cfg(feature = "mock")]
    builder.register_bridge(MOCK, Arc::new(crate::bridge::MockBridge::live()))?;
    Ok(builder)
}

/// Install the process-wide registry. Only the first call succeeds.
pub fn install(registry: Registry) -> Result<&'static Registry, SpyError> {
    GLOBAL.set(registry).map_err(|_| SpyError::RegistryInstalled)?;
    let registry = global().ok_or(SpyError::RegistryInstalled)?;
    info!(profilers = ?registry.names(), "registry installed");
    Ok(registry)
}

pub fn global() -> Option<&'static Registry> {
    GLOBAL.get()
}
