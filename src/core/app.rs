// src/core/app.rs

//! The `App` entity: a logical application identity shared by every unit of
//! one deployed OpenSearch application across the fleet (§3).

use serde::{Deserialize, Serialize};

/// Identifies one logical application across the fleet.
///
/// `id` uniquely identifies one application for the operator's lifetime;
/// `short_id` is a cheap, human-friendly collision-tolerant tag derived from it
/// (used in generated cluster names and log lines, never for identity checks).
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
pub struct App {
    pub model_uuid: String,
    pub name: String,
    pub id: String,
    pub short_id: String,
}

impl App {
    /// Builds an `App` from its two constituent fields, deriving `id`/`short_id`.
    pub fn new(model_uuid: impl Into<String>, name: impl Into<String>) -> Self {
        let model_uuid = model_uuid.into();
        let name = name.into();
        let id = format!("{model_uuid}/{name}");
        let short_id = Self::short_id_of(&id);
        Self {
            model_uuid,
            name,
            id,
            short_id,
        }
    }

    /// Reconstructs an `App` from its canonical `id` (`"{model_uuid}/{name}"`).
    pub fn from_id(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let (model_uuid, name) = id.split_once('/')?;
        Some(Self::new(model_uuid, name))
    }

    fn short_id_of(id: &str) -> String {
        let digest = md5::compute(id.as_bytes());
        hex::encode(digest.0)[..3].to_string()
    }
}

impl PartialEq for App {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::hash::Hash for App {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// I1 (App identity): `App.id = model_uuid + "/" + name`, `short_id` is the
    /// first 3 hex chars of `md5(id)`.
    #[test]
    fn app_identity_invariant() {
        let app = App::new("m1", "opensearch");
        assert_eq!(app.id, "m1/opensearch");
        let full = format!("{:x}", md5::compute(b"m1/opensearch"));
        assert_eq!(app.short_id, full[..3]);
        assert_eq!(app.short_id.len(), 3);
    }

    #[test]
    fn equality_is_by_id_only() {
        let a = App::new("m1", "opensearch");
        let b = App::from_id("m1/opensearch").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_id_roundtrip() {
        let a = App::new("model-uuid-123", "wazuh-indexer");
        let b = App::from_id(a.id.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.short_id, b.short_id);
    }
}
