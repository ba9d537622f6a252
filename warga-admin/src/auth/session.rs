//! Process-wide signed-in identity
//!
//! Injected into whatever needs to know who is signed in. Updated only by
//! the authentication workflow; every change is also published on the bus.

use chrono::Utc;
use tokio::sync::watch;
use tracing::info;

use warga_common::events::{EventBus, WargaEvent};

use super::AuthUser;

#[derive(Clone)]
pub struct SessionContext {
    tx: watch::Sender<Option<AuthUser>>,
    event_bus: EventBus,
}

impl SessionContext {
    pub fn new(event_bus: EventBus) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx, event_bus }
    }

    pub fn current(&self) -> Option<AuthUser> {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every identity change
    pub fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.tx.subscribe()
    }

    pub(crate) fn set(&self, user: Option<AuthUser>) {
        let uid = user.as_ref().map(|u| u.uid.clone());
        self.tx.send_replace(user);

        info!(uid = ?uid, "Auth state changed");
        self.event_bus.emit_lossy(WargaEvent::AuthStateChanged {
            uid,
            timestamp: Utc::now(),
        });
    }

    /// Clear the identity if `uid` is the one currently signed in
    pub(crate) fn clear_if(&self, uid: &str) {
        let matches = self
            .tx
            .borrow()
            .as_ref()
            .map(|u| u.uid == uid)
            .unwrap_or(false);
        if matches {
            self.set(None);
        }
    }
}
