//! # Connectivity Banner
//!
//! What the user should currently be told about connectivity. The banner is
//! driven by a monitor subscription; rendering it is left to the host.
//!
//! - Going offline shows the offline banner until it is dismissed or the
//!   connection returns
//! - Coming back online shows a "back online" notice that hides itself after
//!   a short delay
//! - A dismissed offline banner comes back on the next offline transition

use crate::client::sync::{ConnectivityMonitor, Subscription};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// How long the "back online" notice stays visible
pub const DEFAULT_RESTORED_NOTICE: Duration = Duration::from_secs(3);

/// Visible banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerState {
    Hidden,
    Offline,
    Restored,
}

impl BannerState {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            BannerState::Hidden => None,
            BannerState::Offline => {
                Some("You are offline. Changes are saved locally and will sync when the connection returns.")
            }
            BannerState::Restored => Some("Back online"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Shown {
    Hidden,
    Offline,
    Restored(Instant),
}

/// Banner state bound to a [`ConnectivityMonitor`]
#[derive(Debug)]
pub struct ConnectivityBanner {
    shown: Arc<Mutex<Shown>>,
    restored_for: Duration,
    _subscription: Subscription,
}

impl ConnectivityBanner {
    pub fn attach(monitor: &Arc<ConnectivityMonitor>) -> Self {
        Self::with_notice(monitor, DEFAULT_RESTORED_NOTICE)
    }

    pub fn with_notice(monitor: &Arc<ConnectivityMonitor>, restored_for: Duration) -> Self {
        let initial = if monitor.is_online() {
            Shown::Hidden
        } else {
            Shown::Offline
        };
        let shown = Arc::new(Mutex::new(initial));

        let on_online = Arc::clone(&shown);
        let on_offline = Arc::clone(&shown);
        let subscription = monitor.subscribe(
            move || *lock(&on_online) = Shown::Restored(Instant::now()),
            move || *lock(&on_offline) = Shown::Offline,
        );

        Self {
            shown,
            restored_for,
            _subscription: subscription,
        }
    }

    /// Current banner
    pub fn state(&self) -> BannerState {
        let mut shown = lock(&self.shown);
        match *shown {
            Shown::Hidden => BannerState::Hidden,
            Shown::Offline => BannerState::Offline,
            Shown::Restored(since) if since.elapsed() >= self.restored_for => {
                *shown = Shown::Hidden;
                BannerState::Hidden
            }
            Shown::Restored(_) => BannerState::Restored,
        }
    }

    /// Hide whatever is showing
    pub fn dismiss(&self) {
        *lock(&self.shown) = Shown::Hidden;
    }
}

fn lock(shown: &Mutex<Shown>) -> MutexGuard<'_, Shown> {
    shown.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
