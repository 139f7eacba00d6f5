//! Identifier newtypes
//!
//! `ContextId` tags every command context so its open/flush/close log lines
//! can be correlated. `LockOwner` is the stamp an acquirer writes onto the
//! timer jobs it claims.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one unit-of-work context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    /// Generate a new ContextId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner stamp written onto claimed jobs
///
/// Each engine instance uses one owner for all the jobs its acquisition loop
/// claims. Two instances sharing a store must use distinct owners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockOwner(String);

impl LockOwner {
    /// Generate a random owner (UUIDv7)
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Use an explicit owner name, e.g. a host name
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_generation() {
        let id1 = ContextId::new();
        let id2 = ContextId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_context_id_display() {
        let id = ContextId::new();
        assert_eq!(format!("{}", id), id.as_str());
    }

    #[test]
    fn test_lock_owner_named() {
        let owner = LockOwner::named("node-a");
        assert_eq!(owner.as_str(), "node-a");
        assert_ne!(LockOwner::generate(), LockOwner::generate());
    }

    #[test]
    fn test_lock_owner_serializes_as_plain_string() {
        let owner = LockOwner::named("node-a");
        let json = serde_json::to_string(&owner).unwrap();
        assert_eq!(json, "\"node-a\"");
        let back: LockOwner = serde_json::from_str(&json).unwrap();
        assert_eq!(back, owner);
    }
}
