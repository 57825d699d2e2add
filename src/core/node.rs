// src/core/node.rs

//! The `Node` entity: one observed OpenSearch process (§3).

use crate::core::app::App;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A role an OpenSearch node can hold.
///
/// `VotingOnly` and `ClusterManager` are mutually exclusive on the same node
/// (I2); this is enforced by [`Node::new`], not by the enum itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    ClusterManager,
    Data,
    Ingest,
    Ml,
    VotingOnly,
    Coordinating,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ClusterManager => "cluster_manager",
            Role::Data => "data",
            Role::Ingest => "ingest",
            Role::Ml => "ml",
            Role::VotingOnly => "voting_only",
            Role::Coordinating => "coordinating",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "cluster_manager" => Some(Role::ClusterManager),
            "data" => Some(Role::Data),
            "ingest" => Some(Role::Ingest),
            "ml" => Some(Role::Ml),
            "voting_only" => Some(Role::VotingOnly),
            "coordinating" => Some(Role::Coordinating),
            _ => None,
        }
    }
}

/// Data temperature tier, valid only alongside [`Role::Data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
    Frozen,
    Content,
}

impl Temperature {
    pub fn parse(s: &str) -> Option<Temperature> {
        match s {
            "hot" => Some(Temperature::Hot),
            "warm" => Some(Temperature::Warm),
            "cold" => Some(Temperature::Cold),
            "frozen" => Some(Temperature::Frozen),
            "content" => Some(Temperature::Content),
            _ => None,
        }
    }
}

/// One OpenSearch process, as observed via the topology reader (C3) or via a
/// peer-cluster relation payload (§6.2). Never owned or mutated by this crate
/// directly — only built from live data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    roles: BTreeSet<Role>,
    pub temperature: Option<Temperature>,
    pub ip: String,
    pub app: App,
    pub unit_number: i64,
}

impl Node {
    /// Builds a node, deduplicating roles and rejecting the forbidden
    /// `cluster_manager` + `voting_only` combination (I2).
    pub fn new(
        name: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
        ip: impl Into<String>,
        app: App,
        unit_number: i64,
        temperature: Option<Temperature>,
    ) -> Result<Self, &'static str> {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        if roles.contains(&Role::ClusterManager) && roles.contains(&Role::VotingOnly) {
            return Err("cluster_manager and voting_only roles cannot be both set on the same nodes.");
        }
        Ok(Self {
            name: name.into(),
            roles,
            temperature,
            ip: ip.into(),
            app,
            unit_number,
        })
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    pub fn is_cm_eligible(&self) -> bool {
        self.roles.contains(&Role::ClusterManager)
    }

    pub fn is_voting_only(&self) -> bool {
        self.roles.contains(&Role::VotingOnly)
    }

    pub fn is_data(&self) -> bool {
        self.roles.contains(&Role::Data)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new("m1", "opensearch")
    }

    /// I2 (Node roles): `|{cluster_manager, voting_only} ∩ roles| ≤ 1`.
    #[test]
    fn cm_and_voting_only_mutually_exclusive() {
        let err = Node::new(
            "unit-0",
            [Role::ClusterManager, Role::VotingOnly],
            "10.0.0.1",
            app(),
            0,
            None,
        )
        .unwrap_err();
        assert_eq!(err, "cluster_manager and voting_only roles cannot be both set on the same nodes.");
    }

    #[test]
    fn roles_are_deduplicated() {
        let node = Node::new(
            "unit-0",
            [Role::Data, Role::Data, Role::Ingest],
            "10.0.0.1",
            app(),
            0,
            None,
        )
        .unwrap();
        assert_eq!(node.roles().count(), 2);
    }
}
