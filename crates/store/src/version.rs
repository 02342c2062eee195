/// A monotonically increasing commit counter. Every [`crate::Database`]
/// starts at `Version(0)` (the empty database) and each committed write
/// transaction produces the next one (spec §5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Version(u64);

impl Version {
    pub const fn zero() -> Version {
        Version(0)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
