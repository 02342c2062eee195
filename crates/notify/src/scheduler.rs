use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

/// The capability that dispatches change-notification callbacks onto
/// their owning thread (spec §4.8, §5: "single-threaded cooperative
/// delivery"). The repository selects one event loop at build time; this
/// crate ships the [`ChannelScheduler`] in-process default and
/// [`FrozenScheduler`] for frozen accessors, and leaves host event-loop
/// integrations (libuv, `CFRunLoop`, `ALooper`, ...) out of scope.
pub trait Scheduler: Send + Sync {
    /// Wakes the scheduler's thread so it pumps pending deliveries.
    fn notify(&self);

    /// Registers the callback the scheduler invokes each time it pumps.
    /// A later call replaces the previous callback.
    fn set_notify_callback(&self, callback: Box<dyn Fn() + Send + Sync>);

    /// Whether the calling thread is the scheduler's owning thread.
    fn is_on_thread(&self) -> bool;

    /// Whether this scheduler can deliver notifications at all.
    /// `false` for frozen accessors, which have no owning thread to
    /// pump on.
    fn can_deliver_notifications(&self) -> bool;
}

/// A [`Scheduler`] backed by a dedicated OS thread pumping a
/// `std::sync::mpsc` channel, the default in-process implementation
/// (spec §4.8, §1 "event-loop integrations are not specified"). Each
/// `notify()` wakes the worker thread, which then invokes whatever
/// callback is currently registered.
pub struct ChannelScheduler {
    sender: mpsc::Sender<()>,
    thread_id: ThreadId,
    callback: Arc<Mutex<Option<Box<dyn Fn() + Send + Sync>>>>,
}

impl ChannelScheduler {
    pub fn new() -> ChannelScheduler {
        let (sender, receiver) = mpsc::channel::<()>();
        let callback: Arc<Mutex<Option<Box<dyn Fn() + Send + Sync>>>> = Arc::new(Mutex::new(None));
        let worker_callback = callback.clone();
        let (id_tx, id_rx) = mpsc::channel();

        thread::spawn(move || {
            let _ = id_tx.send(thread::current().id());
            while receiver.recv().is_ok() {
                let callback = worker_callback.lock().unwrap().take();
                if let Some(callback) = callback {
                    callback();
                    let mut slot = worker_callback.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(callback);
                    }
                }
            }
        });

        let thread_id = id_rx.recv().expect("scheduler worker thread failed to start");
        ChannelScheduler { sender, thread_id, callback }
    }
}

impl Default for ChannelScheduler {
    fn default() -> ChannelScheduler {
        ChannelScheduler::new()
    }
}

impl Scheduler for ChannelScheduler {
    fn notify(&self) {
        let _ = self.sender.send(());
    }

    fn set_notify_callback(&self, callback: Box<dyn Fn() + Send + Sync>) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn is_on_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn can_deliver_notifications(&self) -> bool {
        true
    }
}

/// The scheduler bound to a frozen accessor: notification delivery is
/// meaningless once a view is pinned to a single version, so `notify`
/// is a no-op and `can_deliver_notifications` is always false (spec
/// §4.4, §4.8), mirroring the original `FrozenScheduler`.
pub struct FrozenScheduler;

impl Scheduler for FrozenScheduler {
    fn notify(&self) {}

    fn set_notify_callback(&self, _callback: Box<dyn Fn() + Send + Sync>) {}

    fn is_on_thread(&self) -> bool {
        true
    }

    fn can_deliver_notifications(&self) -> bool {
        false
    }
}
