use crate::table_key::TableKey;
use crate::value::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-derived identifier used by sync. Two replicas that independently
/// create an object with the same table and primary key arrive at the same
/// `GlobalKey`, which is how the client-reset controller matches "present
/// in both replicas" objects without a shared `ObjKey` allocation (spec §3,
/// §4.9).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct GlobalKey([u8; 16]);

impl GlobalKey {
    /// Derives a GlobalKey from a table and the value of its primary key
    /// column. Two calls with equal `(table, primary_key)` always produce
    /// the same GlobalKey, regardless of which replica computes it.
    pub fn from_primary_key(table: TableKey, primary_key: &Value) -> GlobalKey {
        let mut hasher = Sha256::new();
        hasher.update(table.raw().to_le_bytes());
        hash_value(&mut hasher, primary_key);

        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        GlobalKey(bytes)
    }

    pub fn from_raw(bytes: [u8; 16]) -> GlobalKey {
        GlobalKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Int(v) => hasher.update(v.to_le_bytes()),
        Value::String(v) => hasher.update(v.as_bytes()),
        Value::ObjectId(v) => hasher.update(v.as_bytes()),
        Value::Uuid(v) => hasher.update(v.as_bytes()),
        other => panic!("{other:?} is not a valid primary key value"),
    }
}

impl fmt::Debug for GlobalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GlobalKey(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        f.write_str(")")
    }
}
