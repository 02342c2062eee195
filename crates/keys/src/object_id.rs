use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// A 12-byte identifier, rendered as 24 hex characters (spec §4.1). Unlike
/// a wire-compatible MongoDB ObjectId, `gen()` seeds its discriminator
/// from an in-process counter rather than a raw process id -- this store
/// only needs collision-avoidance within and across open databases, not
/// cross-ecosystem interop.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ObjectId([u8; 12]);

static COUNTER: AtomicU32 = AtomicU32::new(0);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> ObjectId {
        ObjectId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Generates a new ObjectId from the current time, a per-process salt,
    /// and a monotonic counter, mirroring the classic
    /// timestamp|machine|process|counter layout.
    pub fn gen(seconds: i64, process_salt: u32) -> ObjectId {
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&(seconds as u32).to_be_bytes());
        bytes[4..8].copy_from_slice(&process_salt.to_be_bytes());
        bytes[8..12].copy_from_slice(&counter.to_be_bytes());
        ObjectId(bytes)
    }

    /// Parses the 24-hex-character canonical form (spec §4.1).
    pub fn parse(text: &str) -> Option<ObjectId> {
        if text.len() != 24 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut bytes = [0u8; 12];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            *chunk = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(ObjectId(bytes))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let oid = ObjectId::gen(1_700_000_000, 42);
        let text = oid.to_string();
        assert_eq!(text.len(), 24);
        assert_eq!(ObjectId::parse(&text), Some(oid));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert_eq!(ObjectId::parse("abcd"), None);
        assert_eq!(ObjectId::parse(&"a".repeat(23)), None);
        assert_eq!(ObjectId::parse(&"zz".repeat(12)), None);
    }
}
