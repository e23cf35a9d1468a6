/*!
 * Stage C, reduce the cloud element graph to cloud clusters.
 *
 * A cluster is a weakly connected group of cloud elements that lives long enough to be a
 * candidate mesoscale convective system.
 */

pub use cluster::Cluster;
pub use cluster_list::{prune_clusters, ClusterList, PruneReport};

mod cluster;
mod cluster_list;
