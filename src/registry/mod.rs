//! Registration lifecycle.
//!
//! ```text
//!  Unregistered --register--> Registered --stop--> Stopped
//!                                 ^                   |
//!                                 +-----register------+
//! ```
//!
//! The state sits behind a `parking_lot::Mutex` that is only held for
//! transitions; probing, opening channels, the init hook and joining relay
//! tasks all happen outside of it.

use std::mem;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::channel::ChannelOpener;
use crate::channel::RecordChannel;
use crate::control::ControlChannel;
use crate::dispatch::Dispatcher;
use crate::dispatch::ProvenanceOps;
use crate::filter::FilterPolicy;
use crate::relay::run_relay;
use crate::relay::RelayLoop;
use crate::utils::spawn_task;
use crate::wire::ChannelKind;
use crate::Error;
use crate::RelayStats;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unregistered,
    Registered,
    Stopped,
}

/// One relayed channel of the active registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: ChannelKind,
    /// Whether its relay task is still alive
    pub running: bool,
}

struct RelayTask {
    channel: Arc<dyn RecordChannel>,
    handle: JoinHandle<()>,
}

struct ActiveRelay {
    shutdown: CancellationToken,
    dispatcher: Dispatcher,
    tasks: Vec<RelayTask>,
}

impl ActiveRelay {
    /// Signals every loop and unblocks every pending read.
    fn signal(&self) {
        self.shutdown.cancel();
        for task in &self.tasks {
            task.channel.close();
        }
    }
}

enum Lifecycle {
    Unregistered,
    /// `register` in progress; holds the state to restore on failure
    Starting(LifecycleState),
    Registered(ActiveRelay),
    Stopped,
}

impl Lifecycle {
    fn state(&self) -> LifecycleState {
        match self {
            Lifecycle::Unregistered => LifecycleState::Unregistered,
            Lifecycle::Starting(previous) => *previous,
            Lifecycle::Registered(_) => LifecycleState::Registered,
            Lifecycle::Stopped => LifecycleState::Stopped,
        }
    }

    fn restore(previous: LifecycleState) -> Self {
        match previous {
            LifecycleState::Stopped => Lifecycle::Stopped,
            _ => Lifecycle::Unregistered,
        }
    }
}

/// Owns the relay tasks of at most one registration at a time.
pub struct Registry {
    control: Arc<dyn ControlChannel>,
    opener: Arc<dyn ChannelOpener>,
    policy: Arc<FilterPolicy>,
    stats: Arc<RelayStats>,
    stop_grace_period: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl Registry {
    pub fn new(
        control: Arc<dyn ControlChannel>,
        opener: Arc<dyn ChannelOpener>,
        policy: Arc<FilterPolicy>,
        stats: Arc<RelayStats>,
        stop_grace_period: Duration,
    ) -> Self {
        Self {
            control,
            opener,
            policy,
            stats,
            stop_grace_period,
            lifecycle: Mutex::new(Lifecycle::Unregistered),
        }
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle.lock().state()
    }

    /// Opens the record channels, runs the init hook and starts one relay
    /// task per channel on the current Tokio runtime.
    ///
    /// # Errors
    /// - `Error::AlreadyRegistered` while a registration is active or starting
    /// - `Error::SubsystemAbsent` when the kernel subsystem is missing
    /// - channel open failures, leaving the state unchanged
    /// - `Error::Fatal` outside a Tokio runtime or when the init hook panics
    pub fn register(
        &self,
        ops: ProvenanceOps,
    ) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Fatal(format!("register requires a Tokio runtime: {e}")))?;

        let previous = {
            let mut lifecycle = self.lifecycle.lock();
            match &*lifecycle {
                Lifecycle::Registered(_) | Lifecycle::Starting(_) => {
                    return Err(Error::AlreadyRegistered);
                }
                other => {
                    let previous = other.state();
                    *lifecycle = Lifecycle::Starting(previous);
                    previous
                }
            }
        };

        match self.start(&runtime, ops) {
            Ok(active) => {
                let channels = active.tasks.len();
                *self.lifecycle.lock() = Lifecycle::Registered(active);
                info!(channels, "provenance handlers registered");
                Ok(())
            }
            Err(e) => {
                *self.lifecycle.lock() = Lifecycle::restore(previous);
                debug!(error = %e, ?previous, "registration failed");
                Err(e)
            }
        }
    }

    fn start(
        &self,
        runtime: &Handle,
        ops: ProvenanceOps,
    ) -> Result<ActiveRelay> {
        if !self.control.probe() {
            return Err(Error::SubsystemAbsent);
        }
        let channels = self.opener.open_channels()?;

        let (init, table) = ops.into_parts();
        if let Some(init) = init {
            if catch_unwind(AssertUnwindSafe(init)).is_err() {
                for channel in &channels {
                    channel.close();
                }
                return Err(Error::Fatal("init hook panicked".to_string()));
            }
        }

        let dispatcher = Dispatcher::new(Arc::new(table), self.policy.clone(), self.stats.clone());
        let shutdown = CancellationToken::new();
        let tasks = channels
            .into_iter()
            .map(|channel| {
                let relay = RelayLoop::new(
                    channel.clone(),
                    dispatcher.clone(),
                    self.stats.clone(),
                    shutdown.clone(),
                );
                let handle = spawn_task(runtime, channel.name(), move || run_relay(relay));
                RelayTask { channel, handle }
            })
            .collect();

        Ok(ActiveRelay {
            shutdown,
            dispatcher,
            tasks,
        })
    }

    /// Stops every relay task of the active registration.
    ///
    /// No-op unless registered. Each task gets the configured grace period
    /// after the shutdown signal; one that overruns is aborted and abandoned.
    pub async fn stop(&self) -> Result<()> {
        let active = {
            let mut lifecycle = self.lifecycle.lock();
            if !matches!(&*lifecycle, Lifecycle::Registered(_)) {
                debug!(state = ?lifecycle.state(), "stop ignored, not registered");
                return Ok(());
            }
            match mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Registered(active) => active,
                _ => return Ok(()),
            }
        };

        active.signal();
        let grace = self.stop_grace_period;
        let joins = active.tasks.into_iter().map(|task| async move {
            let name = task.channel.name().to_string();
            let mut handle = task.handle;
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => debug!(channel = %name, "relay task joined"),
                Ok(Err(e)) => warn!(channel = %name, error = %e, "relay task ended abnormally"),
                Err(_) => {
                    handle.abort();
                    warn!(channel = %name, ?grace, "relay task did not stop in time, abandoned");
                }
            }
        });
        join_all(joins).await;

        info!("provenance handlers stopped");
        Ok(())
    }

    /// Dispatcher of the active registration, cloned out of the lock so
    /// handlers never run while it is held.
    ///
    /// # Errors
    /// `Error::NotRegistered` unless a registration is active.
    pub(crate) fn dispatcher(&self) -> Result<Dispatcher> {
        match &*self.lifecycle.lock() {
            Lifecycle::Registered(active) => Ok(active.dispatcher.clone()),
            _ => Err(Error::NotRegistered),
        }
    }

    /// # Errors
    /// `Error::NotRegistered` unless a registration is active.
    pub fn active_channels(&self) -> Result<Vec<ChannelInfo>> {
        match &*self.lifecycle.lock() {
            Lifecycle::Registered(active) => Ok(active
                .tasks
                .iter()
                .map(|task| ChannelInfo {
                    name: task.channel.name().to_string(),
                    kind: task.channel.kind(),
                    running: !task.handle.is_finished(),
                })
                .collect()),
            _ => Err(Error::NotRegistered),
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if let Lifecycle::Registered(active) = &*self.lifecycle.get_mut() {
            debug!("registry dropped while registered, signalling relay tasks");
            active.signal();
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("lifecycle", &self.lifecycle())
            .field("stop_grace_period", &self.stop_grace_period)
            .finish()
    }
}
