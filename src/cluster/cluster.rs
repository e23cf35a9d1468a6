use crate::{cloud_element::CeId, graph::CeGraph};
use chrono::Duration;

/// A connected group of cloud elements that survived pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Clusters are numbered from 1 in order of their smallest cloud element.
    pub id: usize,
    /// Sorted cloud element identifiers.
    pub nodes: Vec<CeId>,
}

impl Cluster {
    /**
     * Build a cluster from a sorted, non-empty list of nodes.
     *
     * #Arguments
     * id - the cluster number.
     * nodes - the members, sorted ascending.
     */
    pub fn new(id: usize, nodes: Vec<CeId>) -> Self {
        debug_assert!(!nodes.is_empty());
        debug_assert!(nodes.windows(2).all(|w| w[0] < w[1]));
        Cluster { id, nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first_frame(&self) -> u32 {
        self.nodes.iter().map(|id| id.frame).min().unwrap_or(0)
    }

    pub fn last_frame(&self) -> u32 {
        self.nodes.iter().map(|id| id.frame).max().unwrap_or(0)
    }

    /// The number of frames from the first to the last frame of the cluster, inclusive.
    pub fn frame_span(&self) -> u32 {
        if self.nodes.is_empty() {
            0
        } else {
            self.last_frame() - self.first_frame() + 1
        }
    }

    /// The time covered by the cluster, each frame counts for one interval.
    pub fn duration(&self, interval: Duration) -> Duration {
        interval * self.frame_span() as i32
    }

    /// The members with no parent in the graph, in ascending order.
    pub fn roots<'a>(&'a self, graph: &'a CeGraph) -> impl Iterator<Item = CeId> + 'a {
        self.nodes.iter().copied().filter(move |id| graph.is_root(*id))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cloud_element::Edge;

    #[test]
    fn test_cluster_span_and_roots() {
        let edge = Edge {
            parent_fraction: 1.0,
            child_fraction: 1.0,
            overlap_km2: 1.0,
        };

        let mut graph = CeGraph::new();
        graph.add_edge(CeId::new(3, 1), CeId::new(4, 1), edge);
        graph.add_edge(CeId::new(3, 2), CeId::new(4, 1), edge);
        graph.add_edge(CeId::new(4, 1), CeId::new(5, 1), edge);

        let cluster = Cluster::new(1, graph.node_ids().collect());

        assert_eq!(cluster.len(), 4);
        assert_eq!(cluster.first_frame(), 3);
        assert_eq!(cluster.last_frame(), 5);
        assert_eq!(cluster.frame_span(), 3);
        assert_eq!(
            cluster.duration(Duration::minutes(30)),
            Duration::minutes(90)
        );
        assert_eq!(
            cluster.roots(&graph).collect::<Vec<_>>(),
            vec![CeId::new(3, 1), CeId::new(3, 2)]
        );
    }
}
