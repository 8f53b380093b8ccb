//! # Network Monitor
//!
//! Process-wide connectivity state with edge-triggered subscriptions.
//!
//! ## Features
//!
//! - **Snapshot**: `is_online()` reads the current state without waiting
//! - **Edge-triggered callbacks**: `subscribe` handlers fire once per actual
//!   transition, never on subscribe and never on a repeated event
//! - **Async watch**: `watch()` hands out a `tokio::sync::watch` receiver
//! - **Probing**: [`HttpProbe`] stands in for the browser's `online`/`offline`
//!   events on native targets
//!
//! Only [`ConnectivityMonitor::apply`] changes the state, and it is meant to be
//! called from the platform event source (the probe loop or a test harness).

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Network event raised by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Online,
    Offline,
}

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Subscriber {
    on_online: Callback,
    on_offline: Callback,
}

/// Platform reachability primitive consulted at startup and by the probe loop
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Process-wide connectivity state
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    events: Mutex<()>,
    subscribers: Mutex<BTreeMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .finish()
    }
}

impl ConnectivityMonitor {
    /// Create a monitor with a known initial state
    pub fn new(online: bool) -> Arc<Self> {
        let (state, _) = watch::channel(online);
        Arc::new(Self {
            state,
            events: Mutex::new(()),
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a monitor initialized from the platform's reachability
    pub async fn init(probe: &dyn ReachabilityProbe) -> Arc<Self> {
        let online = probe.is_reachable().await;
        tracing::info!(online, "connectivity monitor initialized");
        Self::new(online)
    }

    /// Current snapshot
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Register transition handlers
    ///
    /// The returned [`Subscription`] deregisters both handlers when
    /// `unsubscribe` is called or when it is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F, G>(self: &Arc<Self>, on_online: F, on_offline: G) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Subscriber {
            on_online: Arc::new(on_online),
            on_offline: Arc::new(on_offline),
        };
        self.lock_subscribers().insert(id, subscriber);
        Subscription {
            monitor: Arc::downgrade(self),
            id,
        }
    }

    /// Number of registered subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Feed a platform event
    ///
    /// Returns true when the event changed the state. Handlers run after the
    /// state is updated, in registration order. Concurrent callers are
    /// serialized, so handlers observe transitions in the order they happened.
    /// Handlers must not call `apply` themselves.
    pub fn apply(&self, event: NetworkEvent) -> bool {
        let _event = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let online = event == NetworkEvent::Online;
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return false;
        }

        if online {
            tracing::info!("network connectivity restored");
        } else {
            tracing::warn!("network connectivity lost");
        }

        let callbacks: Vec<Callback> = self
            .lock_subscribers()
            .values()
            .map(|s| {
                if online {
                    Arc::clone(&s.on_online)
                } else {
                    Arc::clone(&s.on_offline)
                }
            })
            .collect();
        for callback in callbacks {
            callback();
        }
        true
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Subscriber>> {
        // A panicking subscriber must not disable the monitor
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: u64) {
        self.lock_subscribers().remove(&id);
    }
}

/// Disposer returned by [`ConnectivityMonitor::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    monitor: Weak<ConnectivityMonitor>,
    id: u64,
}

impl Subscription {
    /// Deregister both handlers; safe to call more than once
    pub fn unsubscribe(&self) {
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Reachability check against the server over HTTP
///
/// Any HTTP response counts as reachable; only transport failures count as
/// offline.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self
            .client
            .head(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.url, "reachability probe failed: {}", e);
                false
            }
        }
    }
}

/// Poll `probe` every `interval` and feed the result into `monitor`
pub fn spawn_probe_loop(
    monitor: Arc<ConnectivityMonitor>,
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let event = if probe.is_reachable().await {
                NetworkEvent::Online
            } else {
                NetworkEvent::Offline
            };
            monitor.apply(event);
        }
    })
}
