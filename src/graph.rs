/*!
 * The directed graph of cloud elements.
 *
 * Only identifiers live here, the descriptors are kept in a separate node table. Every container
 * is ordered so iteration is deterministic.
 */
use crate::cloud_element::{CeId, Edge};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq)]
struct Adjacency {
    parents: BTreeSet<CeId>,
    children: BTreeMap<CeId, Edge>,
}

/// Cloud elements linked parent to child across consecutive frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CeGraph {
    nodes: BTreeMap<CeId, Adjacency>,
}

impl CeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no edges, does nothing if it is already present.
    pub fn add_node(&mut self, id: CeId) {
        self.nodes.entry(id).or_default();
    }

    /**
     * Link a parent to a child.
     *
     * Both nodes are added if they are missing. Links that do not go from one frame to the next
     * are refused, which keeps the graph acyclic.
     */
    pub fn add_edge(&mut self, parent: CeId, child: CeId, edge: Edge) -> bool {
        if child.frame != parent.frame + 1 {
            return false;
        }

        self.nodes.entry(parent).or_default().children.insert(child, edge);
        self.nodes.entry(child).or_default().parents.insert(parent);
        true
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: CeId) -> bool {
        let adj = match self.nodes.remove(&id) {
            Some(adj) => adj,
            None => return false,
        };

        for parent in adj.parents {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.remove(&id);
            }
        }

        for child in adj.children.keys() {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parents.remove(&id);
            }
        }

        true
    }

    pub fn contains(&self, id: CeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = CeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Parents of a node in ascending order.
    pub fn parents(&self, id: CeId) -> impl Iterator<Item = CeId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|adj| adj.parents.iter().copied())
    }

    /// Children of a node in ascending order.
    pub fn children(&self, id: CeId) -> impl Iterator<Item = (CeId, &Edge)> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|adj| adj.children.iter().map(|(c, e)| (*c, e)))
    }

    pub fn edge(&self, parent: CeId, child: CeId) -> Option<&Edge> {
        self.nodes.get(&parent)?.children.get(&child)
    }

    /// Every edge ordered by parent and then child.
    pub fn edges(&self) -> impl Iterator<Item = (CeId, CeId, &Edge)> + '_ {
        self.nodes
            .iter()
            .flat_map(|(p, adj)| adj.children.iter().map(move |(c, e)| (*p, *c, e)))
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|adj| adj.children.len()).sum()
    }

    /// Nodes without parents.
    pub fn is_root(&self, id: CeId) -> bool {
        self.nodes
            .get(&id)
            .map(|adj| adj.parents.is_empty())
            .unwrap_or(false)
    }

    /// Nodes without children.
    pub fn is_leaf(&self, id: CeId) -> bool {
        self.nodes
            .get(&id)
            .map(|adj| adj.children.is_empty())
            .unwrap_or(false)
    }

    /**
     * Group the nodes into weakly connected components.
     *
     * Each component is sorted, and the components are ordered by their smallest node.
     */
    pub fn weakly_connected_components(&self) -> Vec<Vec<CeId>> {
        let mut seen: BTreeSet<CeId> = BTreeSet::new();
        let mut components = vec![];
        let mut stack = vec![];

        for &start in self.nodes.keys() {
            if !seen.insert(start) {
                continue;
            }

            let mut component = vec![];
            stack.push(start);

            while let Some(id) = stack.pop() {
                component.push(id);

                let adj = match self.nodes.get(&id) {
                    Some(adj) => adj,
                    None => continue,
                };

                for &n in adj.parents.iter().chain(adj.children.keys()) {
                    if seen.insert(n) {
                        stack.push(n);
                    }
                }
            }

            component.sort_unstable();
            components.push(component);
        }

        components
    }
}
