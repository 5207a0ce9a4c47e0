// src/engine/mod.rs

//! Progress and unlock engine.
//!
//! Owns the per-user state machine of a node (`locked -> unlocked -> completed`),
//! the "next node" traversal, and path-level aggregation. Lock state is either
//! persisted or derived depending on the [`UnlockPolicy`] chosen at construction.
//!
//! A node is gated on its declared prerequisites. A node that declares none is
//! gated on the node before it in traversal order, except the path's entry node,
//! which is never gated.

pub mod policy;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    error::AppError,
    models::{
        category::PathCategory,
        node::{NodeCompletion, NodeView, PathNode},
        progress::{NodeStatus, PathProgress, UserNodeProgress},
    },
    store::{CatalogStore, ProgressLedger},
};

use self::policy::UnlockPolicy;

/// A path's nodes in traversal order, plus the id of its entry node.
struct PathOrder {
    nodes: Vec<PathNode>,
    entry_id: Option<String>,
}

impl PathOrder {
    fn position(&self, node_id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == node_id)
    }

    fn is_entry(&self, node_id: &str) -> bool {
        self.entry_id.as_deref() == Some(node_id)
    }

    /// Ids the node at `index` waits on before it opens.
    fn gates(&self, index: usize) -> Vec<String> {
        let node = &self.nodes[index];
        if !node.prerequisite_node_ids.is_empty() {
            return node.prerequisite_node_ids.clone();
        }
        if index == 0 || self.is_entry(&node.id) {
            return Vec::new();
        }
        vec![self.nodes[index - 1].id.clone()]
    }
}

#[derive(Clone)]
pub struct PathEngine {
    catalog: Arc<dyn CatalogStore>,
    ledger: Arc<dyn ProgressLedger>,
    policy: UnlockPolicy,
}

impl PathEngine {
    pub fn new(catalog: Arc<dyn CatalogStore>, ledger: Arc<dyn ProgressLedger>, policy: UnlockPolicy) -> Self {
        Self {
            catalog,
            ledger,
            policy,
        }
    }

    pub fn policy(&self) -> &UnlockPolicy {
        &self.policy
    }

    /// Opens the path's entry node for the user. Idempotent.
    ///
    /// A path without categories or nodes is left alone. Under the derived
    /// strategy nothing is written because the entry node is unlocked on read.
    pub async fn initialize(&self, user_id: &str, path_id: &str) -> Result<(), AppError> {
        if !self.policy.persists_unlocks() {
            return Ok(());
        }

        let Some(entry) = self.catalog.entry_node(path_id).await? else {
            return Ok(());
        };

        if self.ledger.insert_unlocked(user_id, &entry.id).await? {
            tracing::debug!("Initialized path {} for {} at node {}", path_id, user_id, entry.id);
        }
        Ok(())
    }

    async fn path_order(&self, path_id: &str) -> Result<PathOrder, AppError> {
        let nodes = self.catalog.list_path_nodes(path_id).await?;
        let first_category = self.catalog.list_categories(path_id).await?.into_iter().next();

        // The entry node only exists when the first category has nodes.
        let entry_id = match (first_category, nodes.first()) {
            (Some(category), Some(first)) if first.category_id == category.id => Some(first.id.clone()),
            _ => None,
        };

        Ok(PathOrder { nodes, entry_id })
    }

    /// The user's ledger rows for a node set, in a single fetch.
    async fn records_for<'a>(
        &self,
        user_id: &str,
        ids: impl Iterator<Item = &'a String>,
    ) -> Result<HashMap<String, UserNodeProgress>, AppError> {
        let mut seen = HashSet::new();
        let lookup: Vec<String> = ids.filter(|id| seen.insert(*id)).cloned().collect();

        let records = self
            .ledger
            .list_progress(user_id, &lookup)
            .await?
            .into_iter()
            .map(|record| (record.node_id.clone(), record))
            .collect();
        Ok(records)
    }

    fn status_of(
        &self,
        node_id: &str,
        gates: &[String],
        is_entry: bool,
        records: &HashMap<String, UserNodeProgress>,
    ) -> NodeStatus {
        let derived = self.policy.derive(gates, is_entry, records);
        self.policy.resolve(records.get(node_id).map(|r| r.status), derived)
    }

    /// Nodes of a category in traversal order, annotated with the user's status when a user is given.
    pub async fn list_nodes(&self, category: &PathCategory, user_id: Option<&str>) -> Result<Vec<NodeView>, AppError> {
        let Some(user_id) = user_id else {
            let nodes = self.catalog.list_nodes(&category.id).await?;
            return Ok(nodes.into_iter().map(NodeView::anonymous).collect());
        };

        let order = self.path_order(&category.path_id).await?;
        let members: Vec<(usize, Vec<String>)> = order
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.category_id == category.id)
            .map(|(index, _)| (index, order.gates(index)))
            .collect();

        // Own rows plus every gating node's row.
        let ids: Vec<&String> = members
            .iter()
            .flat_map(|(index, gates)| std::iter::once(&order.nodes[*index].id).chain(gates.iter()))
            .collect();
        let records = self.records_for(user_id, ids.into_iter()).await?;

        let views = members
            .iter()
            .map(|(index, gates)| {
                let node = &order.nodes[*index];
                let status = self.status_of(&node.id, gates, order.is_entry(&node.id), &records);
                NodeView::with_status(node.clone(), status, records.get(&node.id))
            })
            .collect();

        Ok(views)
    }

    /// Records the user's answers on a node and works out where to go next.
    ///
    /// `unlocked_next` is the status a read of the next node returns right after
    /// this write: true unless that node is still locked.
    pub async fn complete_node(
        &self,
        user_id: &str,
        node_id: &str,
        correct_count: i64,
        total_count: i64,
    ) -> Result<NodeCompletion, AppError> {
        let user_id = user_id.trim();
        let node_id = node_id.trim();

        if user_id.is_empty() {
            return Err(AppError::BadRequest("userId must not be empty".to_string()));
        }
        if node_id.is_empty() {
            return Err(AppError::BadRequest("nodeId must not be empty".to_string()));
        }
        if correct_count < 0 || total_count < 0 {
            return Err(AppError::BadRequest("Answer counts must not be negative".to_string()));
        }
        if correct_count > total_count {
            return Err(AppError::BadRequest(
                "correctCount must not exceed totalCount".to_string(),
            ));
        }

        let node = self
            .catalog
            .get_node(node_id)
            .await?
            .ok_or_else(|| AppError::not_found("node", node_id))?;

        let progress = self
            .ledger
            .upsert_completion(user_id, node_id, correct_count, total_count)
            .await?;

        let Some((order, index)) = self.locate_next(&node).await? else {
            return Ok(NodeCompletion {
                node,
                progress,
                next_node: None,
                unlocked_next: false,
            });
        };

        let next = &order.nodes[index];
        let gates = order.gates(index);
        let records = self
            .records_for(user_id, std::iter::once(&next.id).chain(gates.iter()))
            .await?;
        let status = self.status_of(&next.id, &gates, order.is_entry(&next.id), &records);

        if status == NodeStatus::Unlocked
            && !records.contains_key(&next.id)
            && self.policy.persists_unlocks()
        {
            self.ledger.insert_unlocked(user_id, &next.id).await?;
        }

        Ok(NodeCompletion {
            node,
            progress,
            next_node: Some(next.clone()),
            unlocked_next: status != NodeStatus::Locked,
        })
    }

    /// The path order together with the index of the node after `current`.
    async fn locate_next(&self, current: &PathNode) -> Result<Option<(PathOrder, usize)>, AppError> {
        let Some(category) = self.catalog.get_category(&current.category_id).await? else {
            return Ok(None);
        };

        let order = self.path_order(&category.path_id).await?;
        let next = order
            .position(&current.id)
            .map(|index| index + 1)
            .filter(|&index| index < order.nodes.len());

        Ok(next.map(|index| (order, index)))
    }

    /// The node after `current`: the next one in its category, else the first node
    /// of the next non-empty category of the same path, else none.
    pub async fn next_node(&self, current: &PathNode) -> Result<Option<PathNode>, AppError> {
        Ok(self
            .locate_next(current)
            .await?
            .map(|(mut order, index)| order.nodes.swap_remove(index)))
    }

    pub async fn path_progress(&self, user_id: &str, path_id: &str) -> Result<PathProgress, AppError> {
        self.ledger.aggregate_path_progress(user_id, path_id).await
    }
}
