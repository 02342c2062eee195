use async_trait::async_trait;
use keys::{ColumnAttributes, ColumnKind, Value};
use schema::Schema;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use store::{Database, Version};
use sync::{ClientResetController, DownloadBatch, RecoveryMode, Session, SessionState, Transport, TransportError, UploadOutcome, WireChangeset};

type TxResult<T> = std::result::Result<T, TransportError>;

/// A shared append-only server log, standing in for the sync service:
/// every client `Session` in this test uploads into and downloads from
/// one `FakeServer` via a `FakeServerHandle`.
#[derive(Default)]
struct FakeServer {
    log: Vec<(u64, WireChangeset)>,
}

struct FakeServerHandle {
    server: Mutex<FakeServer>,
    reject_uploads: AtomicBool,
}

impl FakeServerHandle {
    fn new() -> Arc<FakeServerHandle> {
        Arc::new(FakeServerHandle {
            server: Mutex::new(FakeServer::default()),
            reject_uploads: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Transport for FakeServerHandle {
    async fn connect(&self) -> TxResult<()> {
        Ok(())
    }

    async fn upload(&self, client_version: Version, changeset: WireChangeset) -> TxResult<UploadOutcome> {
        let _ = client_version;
        if self.reject_uploads.load(Ordering::SeqCst) {
            return Ok(UploadOutcome::BadServerVersion);
        }
        let mut server = self.server.lock().unwrap();
        let next = server.log.len() as u64 + 1;
        server.log.push((next, changeset));
        Ok(UploadOutcome::Accepted { server_version: next })
    }

    async fn download(&self, since_server_version: u64) -> TxResult<DownloadBatch> {
        let server = self.server.lock().unwrap();
        let changesets: Vec<WireChangeset> = server.log.iter().filter(|(v, _)| *v > since_server_version).map(|(_, c)| c.clone()).collect();
        Ok(DownloadBatch {
            server_version: server.log.len() as u64,
            changesets,
        })
    }
}

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn people_schema() -> Schema {
    let mut schema = Schema::new();
    let people = schema.add_table("Person").unwrap();
    let name = schema.add_column(people, "name", ColumnKind::String, ColumnAttributes::scalar(), None).unwrap();
    schema.set_primary_key(people, Some(name)).unwrap();
    schema.add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
    schema
}

async fn commit_person(db: &Arc<Database>, name: &str, age: i64) {
    let people = db.read().schema().table_by_name("Person").unwrap().key();
    let age_col = db.read().schema().table_by_name("Person").unwrap().resolve_name("age").unwrap();
    let mut wtx = db.begin_write().await.unwrap();
    let obj = wtx.create_object(people, Some(Value::String(name.into()))).unwrap();
    wtx.object(people, obj).unwrap().set(age_col, Value::Int(age).into()).unwrap();
    wtx.commit().unwrap();
}

fn person_names(db: &Database) -> Vec<String> {
    let txn = db.read();
    let people = txn.schema().table_by_name("Person").unwrap().key();
    let name_col = txn.schema().table_by_name("Person").unwrap().resolve_name("name").unwrap();
    let mut names: Vec<String> = txn
        .objects(people)
        .unwrap()
        .into_iter()
        .map(|obj| match txn.get_value(people, obj, name_col).unwrap() {
            keys::Mixed::Value(Value::String(s)) => s,
            other => panic!("unexpected name value: {other:?}"),
        })
        .collect();
    names.sort();
    names
}

/// Spec scenario 3: two clients diverge from a server that gets replaced
/// by a backup lacking their latest commits; both hit `bad_server_version`,
/// run a recovery-enabled client reset, commit one further row locally,
/// and converge -- along with a freshly-joining third client -- to
/// byte-equal (here: logically equal) replicas.
#[tokio::test]
async fn test_three_client_reset_scenario_converges_to_equal_replicas() -> Result<()> {
    let s1 = FakeServerHandle::new();

    let db1 = Arc::new(Database::open(people_schema()));
    let db2 = Arc::new(Database::open(people_schema()));

    let mut session1 = Session::new(db1.clone(), s1.clone());
    let mut session2 = Session::new(db2.clone(), s1.clone());
    session1.connect().await?;
    session2.connect().await?;

    commit_person(&db1, "adam", 32).await;
    commit_person(&db2, "brian", 33).await;
    session1.upload_pending().await?;
    session2.upload_pending().await?;

    // `fresh` models the state server S2 (a backup) actually has: a
    // schema-only replica, missing everything clients committed to S1.
    let fresh_for_1 = Database::open(people_schema());
    let fresh_for_2 = Database::open(people_schema());

    let s2 = FakeServerHandle::new();
    s2.reject_uploads.store(true, Ordering::SeqCst);
    session1 = Session::new(db1.clone(), s2.clone());
    session2 = Session::new(db2.clone(), s2.clone());
    session1.connect().await?;
    session2.connect().await?;

    commit_person(&db1, "extra1", 1).await;
    commit_person(&db2, "extra2", 1).await;
    let err1 = session1.upload_pending().await.unwrap_err();
    let err2 = session2.upload_pending().await.unwrap_err();
    assert!(matches!(err1, sync::SessionError::BadServerVersion));
    assert!(matches!(err2, sync::SessionError::BadServerVersion));
    assert_eq!(session1.state(), SessionState::Error);
    assert_eq!(session2.state(), SessionState::Error);

    let mut reset1 = ClientResetController::new(RecoveryMode::Enabled);
    let merged1 = reset1.run(&db1, fresh_for_1).await?;
    db1.replace_atomically(merged1).await?;
    reset1.finish();

    let mut reset2 = ClientResetController::new(RecoveryMode::Enabled);
    let merged2 = reset2.run(&db2, fresh_for_2).await?;
    db2.replace_atomically(merged2).await?;
    reset2.finish();

    s2.reject_uploads.store(false, Ordering::SeqCst);
    let mut session1 = Session::new(db1.clone(), s2.clone());
    let mut session2 = Session::new(db2.clone(), s2.clone());
    session1.connect().await?;
    session2.connect().await?;

    commit_person(&db1, "charley", 34).await;
    commit_person(&db2, "donald", 35).await;

    // Each session must pull its peer's history before advancing its own
    // download marker past entries it only knows about because *it*
    // just pushed them -- uploading does not imply having downloaded
    // whatever the peer pushed earlier in the same round.
    session1.upload_pending().await?;
    session2.download_and_apply().await?;
    session2.upload_pending().await?;
    session1.download_and_apply().await?;

    let db3 = Arc::new(Database::open(people_schema()));
    let mut session3 = Session::new(db3.clone(), s2.clone());
    session3.connect().await?;
    session3.download_and_apply().await?;

    let names1 = person_names(&db1);
    let names2 = person_names(&db2);
    let names3 = person_names(&db3);
    assert_eq!(names1, names2);
    assert_eq!(names1, names3);

    Ok(())
}
