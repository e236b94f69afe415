use std::sync::Arc;

use tracing::debug;

use super::Provenance;
use crate::channel::ChannelOpener;
use crate::channel::RelayFileOpener;
use crate::control::ControlChannel;
use crate::control::SecurityFsControl;
use crate::filter::FilterPolicy;
use crate::metrics::register_custom_metrics;
use crate::registry::Registry;
use crate::simulated::SimulatedKernel;
use crate::ProvenanceConfig;
use crate::RelayStats;
use crate::Result;

/// Assembles a [`Provenance`].
///
/// Without overrides the control plane is the securityfs directory and the
/// record channels are the relay files named by the configuration.
#[derive(Default)]
pub struct ProvenanceBuilder {
    config: Option<ProvenanceConfig>,
    control: Option<Arc<dyn ControlChannel>>,
    opener: Option<Arc<dyn ChannelOpener>>,
}

impl ProvenanceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config` instead of loading one from the environment.
    pub fn config(
        mut self,
        config: ProvenanceConfig,
    ) -> Self {
        self.config = Some(config);
        self
    }

    pub fn control(
        mut self,
        control: impl ControlChannel,
    ) -> Self {
        self.control = Some(Arc::new(control));
        self
    }

    pub fn channel_opener(
        mut self,
        opener: impl ChannelOpener,
    ) -> Self {
        self.opener = Some(Arc::new(opener));
        self
    }

    /// Routes both control calls and record channels to `kernel`.
    pub fn simulated(
        self,
        kernel: &SimulatedKernel,
    ) -> Self {
        self.control(kernel.clone()).channel_opener(kernel.clone())
    }

    /// # Errors
    /// `Error::Config` when loading or validating the configuration fails.
    pub fn build(self) -> Result<Provenance> {
        let config = match self.config {
            Some(config) => config,
            None => ProvenanceConfig::new()?,
        }
        .validate()?;

        let control = self
            .control
            .unwrap_or_else(|| Arc::new(SecurityFsControl::from_config(&config.control)));
        let opener = self
            .opener
            .unwrap_or_else(|| Arc::new(RelayFileOpener::new(config.relay.clone())));

        register_custom_metrics();
        let policy = Arc::new(FilterPolicy::new());
        let stats = Arc::new(RelayStats::default());
        let registry = Registry::new(
            control.clone(),
            opener,
            policy.clone(),
            stats.clone(),
            config.relay.stop_grace_period(),
        );
        debug!(?config, "provenance instance built");

        Ok(Provenance {
            config,
            control,
            policy,
            stats,
            registry,
        })
    }
}

impl std::fmt::Debug for ProvenanceBuilder {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ProvenanceBuilder")
            .field("config", &self.config)
            .field("control", &self.control.is_some())
            .field("opener", &self.opener.is_some())
            .finish()
    }
}
