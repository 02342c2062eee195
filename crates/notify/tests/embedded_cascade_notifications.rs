use keys::{ColKey, ColumnAttributes, ColumnKind, Mixed, TableKey, Value};
use notify::{ChannelScheduler, ChangeSet, Delivery, Notifier};
use schema::Schema;
use std::sync::{Arc, Mutex};
use store::Database;

fn parent_child_schema() -> (Schema, TableKey, TableKey, ColKey, ColKey) {
    let mut schema = Schema::new();
    let parents = schema.add_table("Parent").unwrap();
    let children = schema.add_table("Child").unwrap();
    schema.set_embedded(children, true).unwrap();

    let value = schema.add_column(children, "value", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
    let child_col = schema.add_column(parents, "child", ColumnKind::Link, ColumnAttributes::scalar(), Some(children)).unwrap();

    (schema, parents, children, child_col, value)
}

fn wait_for(predicate: impl Fn() -> bool) {
    let mut waited = std::time::Duration::ZERO;
    while !predicate() && waited < std::time::Duration::from_secs(1) {
        std::thread::sleep(std::time::Duration::from_millis(5));
        waited += std::time::Duration::from_millis(5);
    }
}

/// Removing a parent cascades to its embedded child (spec §4.3, §8
/// scenario 4): both accessors must see the deletion, not just the one
/// the caller removed directly.
#[tokio::test]
async fn test_parent_removal_delivers_deletion_to_both_parent_and_child_accessors() {
    let (schema, parents, children, child_col, value) = parent_child_schema();
    let db = Database::open(schema);

    let mut wtx = db.begin_write().await.unwrap();
    let parent = wtx.create_object(parents, None).unwrap();
    let child = wtx.create_object(children, None).unwrap();
    wtx.object(children, child).unwrap().set(value, Mixed::Value(Value::Int(10))).unwrap();
    wtx.object(parents, parent).unwrap().set_link(child_col, child).unwrap();
    wtx.commit().unwrap();

    let rtx = db.read();
    assert_eq!(rtx.get_value(children, child, value).unwrap(), Mixed::Value(Value::Int(10)));
    drop(rtx);

    let scheduler = Arc::new(ChannelScheduler::new());
    let parent_notifier = Notifier::for_object(parents, parent, scheduler.clone());
    let child_notifier = Notifier::for_object(children, child, scheduler);

    let parent_deliveries: Arc<Mutex<Vec<Delivery>>> = Arc::new(Mutex::new(Vec::new()));
    let child_deliveries: Arc<Mutex<Vec<Delivery>>> = Arc::new(Mutex::new(Vec::new()));
    let collected_parent = parent_deliveries.clone();
    let collected_child = child_deliveries.clone();
    parent_notifier.set_callback(move |d| collected_parent.lock().unwrap().push(d));
    child_notifier.set_callback(move |d| collected_child.lock().unwrap().push(d));

    let mut wtx = db.begin_write().await.unwrap();
    wtx.object(parents, parent).unwrap().remove().unwrap();
    wtx.commit().unwrap();
    let rtx = db.read();
    let log = db.transaction_log();
    parent_notifier.refresh(&rtx, &log);
    child_notifier.refresh(&rtx, &log);

    wait_for(|| !parent_deliveries.lock().unwrap().is_empty() && !child_deliveries.lock().unwrap().is_empty());

    assert!(parent_notifier.is_invalidated());
    assert!(child_notifier.is_invalidated());
    match &parent_deliveries.lock().unwrap()[0] {
        Delivery::Changed(changes) => assert_eq!(*changes, ChangeSet::single_deletion()),
        Delivery::Error(err) => panic!("unexpected error: {err}"),
    }
    match &child_deliveries.lock().unwrap()[0] {
        Delivery::Changed(changes) => assert_eq!(*changes, ChangeSet::single_deletion()),
        Delivery::Error(err) => panic!("unexpected error: {err}"),
    }

    assert_eq!(rtx.table_object_count(children).unwrap(), 0);
}
