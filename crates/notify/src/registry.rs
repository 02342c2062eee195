use crate::notifier::Notifier;
use std::sync::{Arc, Mutex, Weak};
use store::Database;

/// Drives the delivery protocol's steps 1-3 (spec §4.8): a commit on
/// some writer schedules a differencing job against each registered
/// notifier. Modeled the way `journal-client`'s log reader owns a
/// cursor over an append-only log between two offsets, generalized here
/// to a cursor over `(old_version, new_version]` per notifier.
///
/// Notifiers are held weakly so a dropped live view's notifier is
/// forgotten on the next `notify_all` rather than leaking.
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Mutex<Vec<Weak<Notifier>>>,
}

impl NotifierRegistry {
    pub fn new() -> NotifierRegistry {
        NotifierRegistry::default()
    }

    pub fn register(&self, notifier: &Arc<Notifier>) {
        self.notifiers.lock().unwrap().push(Arc::downgrade(notifier));
    }

    /// Refreshes every live registered notifier against `db`'s latest
    /// committed state. Call this after each commit (or on a timer, for
    /// batched delivery); a notifier whose accessor was dropped is
    /// quietly pruned.
    pub fn notify_all(&self, db: &Database) {
        let log = db.transaction_log();
        let txn = db.read();
        tracing::debug!(version = %txn.version(), "diffing registered notifiers");
        let mut notifiers = self.notifiers.lock().unwrap();
        notifiers.retain(|weak| match weak.upgrade() {
            Some(notifier) => {
                notifier.refresh(&txn, &log);
                true
            }
            None => false,
        });
    }

    pub fn len(&self) -> usize {
        self.notifiers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::changeset::Delivery;
    use crate::scheduler::ChannelScheduler;
    use keys::{ColumnAttributes, ColumnKind};
    use schema::Schema;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_registry_drives_refresh_on_commit() {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        schema.add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
        let db = Database::open(schema);

        let registry = NotifierRegistry::new();
        let scheduler = Arc::new(ChannelScheduler::new());
        let notifier = Notifier::for_results(people, move |txn| txn.objects(people), scheduler);
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        notifier.set_callback(move |delivery| {
            if matches!(delivery, Delivery::Changed(_)) {
                counted.fetch_add(1, Ordering::SeqCst);
            }
        });
        registry.register(&notifier);

        let mut wtx = db.begin_write().await.unwrap();
        wtx.create_object(people, None).unwrap();
        wtx.commit().unwrap();
        registry.notify_all(&db);

        let mut waited = Duration::ZERO;
        while count.load(Ordering::SeqCst) == 0 && waited < Duration::from_secs(1) {
            std::thread::sleep(Duration::from_millis(5));
            waited += Duration::from_millis(5);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }
}
