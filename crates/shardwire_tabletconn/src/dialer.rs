//! Init-time registry of tablet dialers keyed by protocol name.

use crate::config::ConnConfig;
use crate::conn::TabletConn;
use crate::context::Context;
use crate::error::{TabletError, TabletResult};
use crate::loopback::{LoopbackDialer, LoopbackDirectory};
use crate::tcp::TcpDialer;
use async_trait::async_trait;
use shardwire_types::{EndPoint, Target};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Produces connections for one wire protocol.
#[async_trait]
pub trait TabletDialer: Send + Sync + Debug {
    /// Connects to the tablet at `endpoint`, bound to `target`.
    async fn dial(
        &self,
        ctx: &Context,
        endpoint: &EndPoint,
        target: &Target,
        timeout: Duration,
    ) -> TabletResult<Box<dyn TabletConn>>;
}

/// Collects dialers during process initialization.
#[derive(Debug, Default)]
pub struct DialerRegistryBuilder {
    dialers: HashMap<String, Arc<dyn TabletDialer>>,
}

impl DialerRegistryBuilder {
    /// Registers a dialer. A second registration of the same protocol fails.
    pub fn register(
        mut self,
        protocol: impl Into<String>,
        dialer: Arc<dyn TabletDialer>,
    ) -> TabletResult<Self> {
        let protocol = protocol.into();
        if self.dialers.contains_key(&protocol) {
            return Err(TabletError::config(format!(
                "dialer for protocol '{protocol}' is already registered"
            )));
        }
        debug!(%protocol, "registered tablet dialer");
        self.dialers.insert(protocol, dialer);
        Ok(self)
    }

    /// Registers the `tcp` and `loopback` dialers.
    pub fn with_builtin(self, config: &ConnConfig, directory: LoopbackDirectory) -> TabletResult<Self> {
        self.register("tcp", Arc::new(TcpDialer::new(config.clone())))?
            .register("loopback", Arc::new(LoopbackDialer::new(directory, config.clone())))
    }

    /// Freezes the registry and selects `config.protocol`.
    ///
    /// Fails if no dialer is registered for the configured protocol.
    pub fn build(self, config: &ConnConfig) -> TabletResult<DialerRegistry> {
        let selected = self.dialers.get(&config.protocol).cloned().ok_or_else(|| {
            TabletError::config(format!(
                "no dialer registered for protocol '{}'",
                config.protocol
            ))
        })?;
        info!(protocol = %config.protocol, "tablet protocol selected");
        Ok(DialerRegistry {
            dialers: Arc::new(self.dialers),
            selected,
            config: config.clone(),
        })
    }
}

/// Read-only catalog of dialers with the configured protocol resolved.
///
/// Cheap to clone; clones share the same frozen table.
#[derive(Debug, Clone)]
pub struct DialerRegistry {
    dialers: Arc<HashMap<String, Arc<dyn TabletDialer>>>,
    selected: Arc<dyn TabletDialer>,
    config: ConnConfig,
}

impl DialerRegistry {
    /// Starts building a registry.
    pub fn builder() -> DialerRegistryBuilder {
        DialerRegistryBuilder::default()
    }

    /// Returns the dialer for the configured protocol.
    pub fn get_dialer(&self) -> Arc<dyn TabletDialer> {
        Arc::clone(&self.selected)
    }

    /// Returns the dialer for a specific protocol.
    pub fn get(&self, protocol: &str) -> Option<Arc<dyn TabletDialer>> {
        self.dialers.get(protocol).cloned()
    }

    /// Returns the configured protocol name.
    pub fn protocol(&self) -> &str {
        &self.config.protocol
    }

    /// Returns the registered protocol names, sorted.
    pub fn protocols(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dialers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Dials with the configured protocol and dial timeout.
    pub async fn dial(
        &self,
        ctx: &Context,
        endpoint: &EndPoint,
        target: &Target,
    ) -> TabletResult<Box<dyn TabletConn>> {
        self.selected
            .dial(ctx, endpoint, target, self.config.dial_timeout)
            .await
    }
}
