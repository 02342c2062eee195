use crate::changeset::{ChangeSet, Delivery};
use crate::differencing::{diff, touched_objects};
use crate::scheduler::Scheduler;
use keys::{ObjKey, TableKey};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use store::{LogEntry, ReadTransaction, Version};

type QueryFn = dyn Fn(&ReadTransaction) -> store::Result<Vec<ObjKey>> + Send + Sync;

enum Target {
    /// A live `Results`/`List` view: re-evaluates `query` each refresh
    /// and diffs the resulting ordering by `ObjKey` identity.
    Results(Box<QueryFn>),
    /// A live single-object accessor: watches one `ObjKey` for deletion
    /// (invalidation) or column-level modification (spec §4.8).
    Object(ObjKey),
}

struct State {
    anchor_version: Version,
    prior: Vec<ObjKey>,
    invalidated: bool,
    suppress_next: bool,
    pending: VecDeque<Delivery>,
    callback: Option<Box<dyn FnMut(Delivery) + Send>>,
}

/// The internal object that computes and delivers change sets for one
/// live view (spec §4.8). Every commit that might affect it is checked
/// with [`Notifier::refresh`]; deliveries queue until the backing
/// [`Scheduler`] next pumps, preserving registration order.
pub struct Notifier {
    table: TableKey,
    target: Target,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<State>,
}

impl Notifier {
    pub fn for_results<F>(table: TableKey, query: F, scheduler: Arc<dyn Scheduler>) -> Arc<Notifier>
    where
        F: Fn(&ReadTransaction) -> store::Result<Vec<ObjKey>> + Send + Sync + 'static,
    {
        Self::new(table, Target::Results(Box::new(query)), scheduler)
    }

    pub fn for_object(table: TableKey, obj: ObjKey, scheduler: Arc<dyn Scheduler>) -> Arc<Notifier> {
        Self::new(table, Target::Object(obj), scheduler)
    }

    fn new(table: TableKey, target: Target, scheduler: Arc<dyn Scheduler>) -> Arc<Notifier> {
        let notifier = Arc::new(Notifier {
            table,
            target,
            scheduler: scheduler.clone(),
            state: Mutex::new(State {
                anchor_version: Version::zero(),
                prior: Vec::new(),
                invalidated: false,
                suppress_next: false,
                pending: VecDeque::new(),
                callback: None,
            }),
        });

        let weak = Arc::downgrade(&notifier);
        scheduler.set_notify_callback(Box::new(move || {
            if let Some(notifier) = weak.upgrade() {
                notifier.pump();
            }
        }));
        notifier
    }

    pub fn table(&self) -> TableKey {
        self.table
    }

    pub fn set_callback(&self, callback: impl FnMut(Delivery) + Send + 'static) {
        self.state.lock().unwrap().callback = Some(Box::new(callback));
    }

    /// Elides exactly the next delivery that would otherwise result
    /// from a refresh (spec §4.8: "a callback may call `suppress_next()`
    /// before returning"). The notifier's anchor still advances; only
    /// the callback invocation is skipped.
    pub fn suppress_next(&self) {
        self.state.lock().unwrap().suppress_next = true;
    }

    pub fn is_invalidated(&self) -> bool {
        self.state.lock().unwrap().invalidated
    }

    /// Diffs this notifier's pinned version against `txn`'s and, if
    /// anything relevant changed, enqueues a delivery and wakes the
    /// scheduler (spec §4.8 steps 1-3). A no-op once invalidated.
    pub fn refresh(&self, txn: &ReadTransaction, log: &[LogEntry]) {
        let mut state = self.state.lock().unwrap();
        if state.invalidated {
            return;
        }
        let new_version = txn.version();
        if new_version == state.anchor_version {
            return;
        }

        let result = self.recompute(txn, log, &mut state, new_version);
        state.anchor_version = new_version;
        let suppress = std::mem::take(&mut state.suppress_next);

        let delivery = match result {
            Ok(changes) if changes.is_empty() => None,
            Ok(changes) => Some(Delivery::Changed(changes)),
            Err(err) => Some(Delivery::Error(err)),
        };

        let Some(delivery) = delivery else { return };
        if suppress {
            return;
        }
        tracing::trace!(table = ?self.table, version = %new_version, "enqueuing notifier delivery");
        state.pending.push_back(delivery);
        drop(state);
        self.scheduler.notify();
    }

    fn recompute(&self, txn: &ReadTransaction, log: &[LogEntry], state: &mut State, new_version: Version) -> store::Result<ChangeSet> {
        match &self.target {
            Target::Results(query) => {
                let new_objects = query(txn)?;
                let changes = diff(self.table, &state.prior, &new_objects, state.anchor_version, new_version, log);
                state.prior = new_objects;
                Ok(changes)
            }
            Target::Object(obj) => {
                let objects = txn.objects(self.table)?;
                if !objects.contains(obj) {
                    state.invalidated = true;
                    return Ok(ChangeSet::single_deletion());
                }
                let mut touched = touched_objects(self.table, state.anchor_version, new_version, log);
                let columns = touched.remove(obj).unwrap_or_default();
                let mut changes = ChangeSet::default();
                if !columns.is_empty() {
                    changes.modifications.insert(0);
                    for col in columns {
                        changes.columns.entry(col).or_default().insert(0);
                    }
                }
                Ok(changes)
            }
        }
    }

    fn pump(&self) {
        loop {
            let (delivery, callback) = {
                let mut state = self.state.lock().unwrap();
                let Some(delivery) = state.pending.pop_front() else { break };
                (delivery, state.callback.take())
            };
            if let Some(mut callback) = callback {
                callback(delivery);
                let mut state = self.state.lock().unwrap();
                if state.callback.is_none() {
                    state.callback = Some(callback);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scheduler::ChannelScheduler;
    use keys::{ColumnAttributes, ColumnKind, Value};
    use schema::Schema;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;
    use store::Database;

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let mut waited = Duration::ZERO;
        while !condition() && waited < Duration::from_secs(1) {
            std::thread::sleep(Duration::from_millis(5));
            waited += Duration::from_millis(5);
        }
    }

    #[tokio::test]
    async fn test_results_notifier_delivers_insertion() {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let name = schema.add_column(people, "name", ColumnKind::String, ColumnAttributes::scalar(), None).unwrap();
        let db = Database::open(schema);

        let scheduler = Arc::new(ChannelScheduler::new());
        let notifier = Notifier::for_results(people, |txn| txn.objects(people), scheduler);

        let deliveries: Arc<Mutex<Vec<Delivery>>> = Arc::new(Mutex::new(Vec::new()));
        let collected = deliveries.clone();
        notifier.set_callback(move |delivery| collected.lock().unwrap().push(delivery));

        let mut wtx = db.begin_write().await.unwrap();
        let obj = wtx.create_object(people, None).unwrap();
        wtx.object(people, obj).unwrap().set(name, Value::String("Alice".into()).into()).unwrap();
        wtx.commit().unwrap();

        let rtx = db.read();
        notifier.refresh(&rtx, &db.transaction_log());

        wait_for(|| !deliveries.lock().unwrap().is_empty());
        let delivered = deliveries.lock().unwrap();
        match &delivered[0] {
            Delivery::Changed(changes) => assert_eq!(changes.insertions, [0].into_iter().collect()),
            Delivery::Error(err) => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test]
    async fn test_suppress_next_elides_one_delivery() {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let db = Database::open(schema);
        let scheduler = Arc::new(ChannelScheduler::new());
        let notifier = Notifier::for_results(people, |txn| txn.objects(people), scheduler);

        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        notifier.set_callback(move |_| {
            counted.fetch_add(1, AtomicOrdering::SeqCst);
        });

        notifier.suppress_next();
        let mut wtx = db.begin_write().await.unwrap();
        wtx.create_object(people, None).unwrap();
        wtx.commit().unwrap();
        let rtx = db.read();
        notifier.refresh(&rtx, &db.transaction_log());

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_object_notifier_invalidates_on_delete() {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let db = Database::open(schema);

        let mut wtx = db.begin_write().await.unwrap();
        let obj = wtx.create_object(people, None).unwrap();
        wtx.commit().unwrap();

        let scheduler = Arc::new(ChannelScheduler::new());
        let notifier = Notifier::for_object(people, obj, scheduler);
        let deliveries: Arc<Mutex<Vec<Delivery>>> = Arc::new(Mutex::new(Vec::new()));
        let collected = deliveries.clone();
        notifier.set_callback(move |delivery| collected.lock().unwrap().push(delivery));

        let mut wtx = db.begin_write().await.unwrap();
        wtx.remove_object(people, obj).unwrap();
        wtx.commit().unwrap();
        let rtx = db.read();
        notifier.refresh(&rtx, &db.transaction_log());

        wait_for(|| !deliveries.lock().unwrap().is_empty());
        assert!(notifier.is_invalidated());
        match &deliveries.lock().unwrap()[0] {
            Delivery::Changed(changes) => assert_eq!(*changes, ChangeSet::single_deletion()),
            Delivery::Error(err) => panic!("unexpected error: {err}"),
        }
    }
}
