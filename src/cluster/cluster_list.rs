use super::Cluster;
use crate::{cloud_element::CeCatalog, config::SearchConfig};
use log::{debug, info};
use std::fmt::{self, Display};

/// Counts of what pruning removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Nodes removed by the repeated cold core test.
    pub weak_core_nodes: usize,
    /// Components made of a single cloud element.
    pub single_node_components: usize,
    /// Components with more than one node that did not last long enough.
    pub short_lived_components: usize,
    /// Total nodes removed from the graph.
    pub nodes_removed: usize,
    /// Total edges removed from the graph.
    pub edges_removed: usize,
}

impl PruneReport {
    /// Nothing was removed.
    pub fn is_noop(&self) -> bool {
        self.nodes_removed == 0 && self.edges_removed == 0
    }
}

impl Display for PruneReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "       Weak core nodes: {:>8}", self.weak_core_nodes)?;
        writeln!(f, "   Single node removed: {:>8}", self.single_node_components)?;
        writeln!(f, "    Short-lived groups: {:>8}", self.short_lived_components)?;
        writeln!(f, "         Nodes removed: {:>8}", self.nodes_removed)?;
        writeln!(f, "         Edges removed: {:>8}", self.edges_removed)?;
        Ok(())
    }
}

/**
 * The cloud clusters left after pruning, along with what was removed to get there.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterList {
    /// Ordered by the smallest cloud element in each cluster.
    pub clusters: Vec<Cluster>,
    pub report: PruneReport,
}

impl ClusterList {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }
}

/**
 * Remove the parts of the graph that cannot be a convective system and gather the rest into
 * clusters.
 *
 * Only the graph is modified, the node table keeps every descriptor. Running this again on its own
 * output changes nothing.
 *
 * #Arguments
 * catalog - the output of the cloud element search, its graph is pruned in place.
 * config - the cold core threshold, the minimum duration, and whether to repeat the core test.
 */
pub fn prune_clusters(catalog: &mut CeCatalog, config: &SearchConfig) -> ClusterList {
    let mut report = PruneReport::default();
    let edges_before = catalog.graph.edge_count();

    if config.recheck_core {
        let weak: Vec<_> = catalog
            .graph
            .node_ids()
            .filter(|id| {
                catalog
                    .nodes
                    .get(*id)
                    .map(|ce| ce.core.area_km2 < config.a_core_min)
                    .unwrap_or(true)
            })
            .collect();

        for id in weak {
            debug!("removing {} with a weak core", id);
            catalog.graph.remove_node(id);
            report.weak_core_nodes += 1;
            report.nodes_removed += 1;
        }
    }

    let mut clusters = vec![];
    for component in catalog.graph.weakly_connected_components() {
        if component.len() == 1 {
            report.single_node_components += 1;
            report.nodes_removed += 1;
            catalog.graph.remove_node(component[0]);
            continue;
        }

        let candidate = Cluster::new(clusters.len() + 1, component);
        if candidate.duration(catalog.interval) < config.d_mcs {
            debug!(
                "dropping {} nodes starting at {}, only {} frames",
                candidate.len(),
                candidate.nodes[0],
                candidate.frame_span()
            );

            report.short_lived_components += 1;
            report.nodes_removed += candidate.len();
            for &id in &candidate.nodes {
                catalog.graph.remove_node(id);
            }
            continue;
        }

        clusters.push(candidate);
    }

    report.edges_removed = edges_before - catalog.graph.edge_count();

    info!(
        "{} clusters, {} nodes and {} edges removed",
        clusters.len(),
        report.nodes_removed,
        report.edges_removed
    );

    ClusterList { clusters, report }
}
