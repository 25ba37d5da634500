//! Host notification bridge.
//!
//! Hosts fire change callbacks synchronously, often in the middle of their
//! own mutation. The [`ChangeNotifier`] handed to the host therefore does
//! nothing but enqueue a [`ChangeNotice`]; the owner of the
//! [`ObserverBridge`] drains the queue later, from a safe point, by calling
//! [`ObserverBridge::run_pending`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use super::{ChangeCoordinator, CycleOutcome, SyncError};
use crate::host::{GroupId, Host, HostError, NotificationSource, ObserverId};

/// One "this group changed" message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    /// Group the host reported.
    pub group: GroupId,
}

/// Counters describing what the bridge did with notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Notifications delivered by the host.
    pub received: u64,
    /// Notifications dropped because one was already pending.
    pub coalesced: u64,
    /// Notifications dropped because a cycle was running.
    pub inhibited: u64,
    /// Coordinator cycles run.
    pub cycles: u64,
}

/// State shared between the bridge and its notifiers.
#[derive(Debug, Default)]
struct Shared {
    inhibit: AtomicBool,
    pending: AtomicBool,
    received: AtomicU64,
    coalesced: AtomicU64,
    inhibited: AtomicU64,
    cycles: AtomicU64,
}

/// Callback handle registered with the host.
///
/// Cheap to clone. Calling [`notify`](Self::notify) never touches the scene.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: UnboundedSender<ChangeNotice>,
    shared: Arc<Shared>,
}

impl ChangeNotifier {
    /// Report that `group` changed.
    pub fn notify(&self, group: GroupId) {
        self.shared.received.fetch_add(1, Ordering::Relaxed);

        if self.shared.inhibit.load(Ordering::Acquire) {
            self.shared.inhibited.fetch_add(1, Ordering::Relaxed);
            trace!(group = %group, "Change ignored while a cycle runs");
            return;
        }

        if self.shared.pending.swap(true, Ordering::AcqRel) {
            self.shared.coalesced.fetch_add(1, Ordering::Relaxed);
            trace!(group = %group, "Change coalesced into pending notice");
            return;
        }

        if self.sender.send(ChangeNotice { group }).is_err() {
            // Bridge is gone; nobody is listening any more.
            self.shared.pending.store(false, Ordering::Release);
            trace!(group = %group, "Change dropped, bridge closed");
        }
    }
}

/// Resets the inhibit flag when a cycle ends, however it ends.
struct InhibitGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InhibitGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self { flag }
    }
}

impl Drop for InhibitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Defers, de-duplicates and guards coordinator cycles.
///
/// Each bridge owns its own flags, so several bridges (one per model, or one
/// per test) never interfere.
pub struct ObserverBridge {
    coordinator: ChangeCoordinator,
    sender: UnboundedSender<ChangeNotice>,
    receiver: UnboundedReceiver<ChangeNotice>,
    shared: Arc<Shared>,
    observers: Vec<ObserverId>,
}

impl ObserverBridge {
    /// Create a bridge driving `coordinator`.
    pub fn new(coordinator: ChangeCoordinator) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            coordinator,
            sender,
            receiver,
            shared: Arc::new(Shared::default()),
            observers: Vec::new(),
        }
    }

    /// A notifier feeding this bridge.
    pub fn notifier(&self) -> ChangeNotifier {
        ChangeNotifier {
            sender: self.sender.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// The coordinator run by this bridge.
    pub fn coordinator(&self) -> &ChangeCoordinator {
        &self.coordinator
    }

    /// Mutable access to the coordinator, for `attach`.
    pub fn coordinator_mut(&mut self) -> &mut ChangeCoordinator {
        &mut self.coordinator
    }

    /// Observe `group` on `source`.
    pub fn attach<N: NotificationSource + ?Sized>(
        &mut self,
        source: &mut N,
        group: GroupId,
    ) -> Result<ObserverId, HostError> {
        let id = source.add_observer(group, self.notifier())?;
        self.observers.push(id);
        debug!(group = %group, observer = id.0, "Observer attached");
        Ok(id)
    }

    /// Remove every observer this bridge registered.
    pub fn detach<N: NotificationSource + ?Sized>(
        &mut self,
        source: &mut N,
    ) -> Result<(), HostError> {
        for id in self.observers.drain(..) {
            source.remove_observer(id)?;
            debug!(observer = id.0, "Observer detached");
        }
        Ok(())
    }

    /// Whether a notice is waiting to be processed.
    pub fn has_pending(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Whether a cycle is currently running.
    pub fn is_inhibited(&self) -> bool {
        self.shared.inhibit.load(Ordering::Acquire)
    }

    /// Current counters.
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            received: self.shared.received.load(Ordering::Relaxed),
            coalesced: self.shared.coalesced.load(Ordering::Relaxed),
            inhibited: self.shared.inhibited.load(Ordering::Relaxed),
            cycles: self.shared.cycles.load(Ordering::Relaxed),
        }
    }

    /// Scheduler tick: drain queued notices and run at most one cycle.
    ///
    /// Returns `Ok(None)` when nothing was queued. Changes made by the cycle
    /// itself are ignored rather than queued.
    pub fn run_pending<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Result<Option<CycleOutcome>, SyncError> {
        let mut drained = 0usize;
        while let Ok(notice) = self.receiver.try_recv() {
            trace!(group = %notice.group, "Draining change notice");
            drained += 1;
        }
        if drained == 0 {
            return Ok(None);
        }

        self.shared.pending.store(false, Ordering::Release);
        self.shared.cycles.fetch_add(1, Ordering::Relaxed);

        let _guard = InhibitGuard::engage(&self.shared.inhibit);
        let outcome = self.coordinator.on_change(host)?;
        Ok(Some(outcome))
    }
}

impl std::fmt::Debug for ObserverBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverBridge")
            .field("stats", &self.stats())
            .field("observers", &self.observers)
            .finish()
    }
}
