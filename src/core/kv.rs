// src/core/kv.rs

//! The typed KV bus (C1): the deployment substrate's relation/secret
//! primitives, treated as an external collaborator per §1/§6. Only the trait
//! boundary and an in-memory test double live in this crate; the production
//! implementation (backed by the host platform's relation data bags and
//! secret store) is out of scope.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

/// An opaque reference to a secret stored in the KV bus, minted on grant and
/// carried across the wire instead of the secret's plaintext (§6.2
/// `SecretRef`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SecretRef(pub String);

impl SecretRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SecretRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope a KV entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Writable only by the current app's leader (§5 shared-resource policy).
    App,
    /// Writable only by the owning unit.
    Unit(u32),
    /// A specific relation id, for relation-databag reads/writes.
    Relation(i64),
}

/// The typed KV bus contract consumed by every component in this crate.
///
/// Keys are namespaced by the caller (e.g. `"deployment-description"`,
/// `"orchestrators"`) — this trait does not interpret key names, matching the
/// "typed key-value bus" framing of §6's C1.
#[async_trait]
pub trait KvBus: Send + Sync {
    async fn get(&self, scope: Scope, key: &str) -> Option<String>;
    async fn set(&self, scope: Scope, key: &str, value: String);
    async fn delete(&self, scope: Scope, key: &str);

    /// Stores `plaintext` as a secret and returns a reference to it, granting
    /// visibility to `relation_id` immediately (§6.2: "every embedded
    /// `SecretRef` is granted to the relation before write").
    async fn grant_secret(&self, relation_id: i64, plaintext: String) -> SecretRef;

    /// Reads back the plaintext behind a previously-granted secret reference.
    /// Returns `None` if the caller has not been granted visibility.
    async fn peek_secret(&self, relation_id: i64, secret: &SecretRef) -> Option<String>;
}

/// An in-memory `KvBus` used by tests and by any harness exercising this
/// crate without a live deployment substrate.
#[derive(Debug, Default)]
pub struct InMemoryKvBus {
    app: DashMap<String, String>,
    units: DashMap<u32, HashMap<String, String>>,
    relations: DashMap<i64, HashMap<String, String>>,
    secrets: DashMap<String, String>,
    grants: DashMap<(i64, String), ()>,
}

impl InMemoryKvBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBus for InMemoryKvBus {
    async fn get(&self, scope: Scope, key: &str) -> Option<String> {
        match scope {
            Scope::App => self.app.get(key).map(|v| v.clone()),
            Scope::Unit(id) => self.units.get(&id).and_then(|m| m.get(key).cloned()),
            Scope::Relation(id) => self.relations.get(&id).and_then(|m| m.get(key).cloned()),
        }
    }

    async fn set(&self, scope: Scope, key: &str, value: String) {
        match scope {
            Scope::App => {
                self.app.insert(key.to_string(), value);
            }
            Scope::Unit(id) => {
                self.units
                    .entry(id)
                    .or_default()
                    .insert(key.to_string(), value);
            }
            Scope::Relation(id) => {
                self.relations
                    .entry(id)
                    .or_default()
                    .insert(key.to_string(), value);
            }
        }
    }

    async fn delete(&self, scope: Scope, key: &str) {
        match scope {
            Scope::App => {
                self.app.remove(key);
            }
            Scope::Unit(id) => {
                if let Some(mut m) = self.units.get_mut(&id) {
                    m.remove(key);
                }
            }
            Scope::Relation(id) => {
                if let Some(mut m) = self.relations.get_mut(&id) {
                    m.remove(key);
                }
            }
        }
    }

    async fn grant_secret(&self, relation_id: i64, plaintext: String) -> SecretRef {
        let secret = SecretRef::new();
        self.secrets.insert(secret.0.clone(), plaintext);
        self.grants.insert((relation_id, secret.0.clone()), ());
        secret
    }

    async fn peek_secret(&self, relation_id: i64, secret: &SecretRef) -> Option<String> {
        if !self.grants.contains_key(&(relation_id, secret.0.clone())) {
            return None;
        }
        self.secrets.get(&secret.0).map(|v| v.clone())
    }
}
