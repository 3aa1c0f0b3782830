//! Lock requests against shared resources.
//!
//! A lock names a resource, a mode, and an optional value. An empty value
//! means "ANY" for a read lock (the arbiter picks a free value) and "ALL"
//! for a write lock (exclusive over the whole resource). Quoted resources
//! always use empty values.

/// Mode of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockMode {
    /// Shared: compatible with other read locks.
    Read,
    /// Exclusive: incompatible with any other lock on the resource.
    Write,
}

impl LockMode {
    /// The wire string used in feature parameters and persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Read => "readLock",
            LockMode::Write => "writeLock",
        }
    }

    /// Parse a wire string. Returns `None` for anything other than
    /// `readLock` or `writeLock`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "readLock" => Some(LockMode::Read),
            "writeLock" => Some(LockMode::Write),
            _ => None,
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lock request by a build against a resource, by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lock {
    /// Name of the resource the lock is requested against.
    pub name: String,

    /// Requested mode.
    pub mode: LockMode,

    /// Requested value. Empty means ANY (read) or ALL (write).
    pub value: String,
}

impl Lock {
    /// Create a lock with an empty value.
    pub fn new(name: impl Into<String>, mode: LockMode) -> Self {
        Self {
            name: name.into(),
            mode,
            value: String::new(),
        }
    }

    /// Create a lock on a specific custom-resource value.
    pub fn with_value(name: impl Into<String>, mode: LockMode, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode,
            value: value.into(),
        }
    }

    /// Whether the lock leaves the value choice to the arbiter (read) or
    /// claims the whole resource (write).
    pub fn is_any_value(&self) -> bool {
        self.value.is_empty()
    }

    /// Parse one feature-parameter record of the form
    /// `name<SP>mode[<SP>value]`.
    ///
    /// The value is everything after the second space and may itself
    /// contain spaces. Returns `None` for blank lines and for records with
    /// a missing or unknown mode.
    pub fn from_feature_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return None;
        }
        let mut parts = line.splitn(3, ' ');
        let name = parts.next()?;
        let mode = LockMode::parse(parts.next()?)?;
        if name.is_empty() {
            return None;
        }
        let value = parts.next().unwrap_or("");
        Some(Self {
            name: name.to_string(),
            mode,
            value: value.to_string(),
        })
    }

    /// Serialize to the feature-parameter record form.
    pub fn to_feature_line(&self) -> String {
        if self.value.is_empty() {
            format!("{} {}", self.name, self.mode.as_str())
        } else {
            format!("{} {} {}", self.name, self.mode.as_str(), self.value)
        }
    }
}
