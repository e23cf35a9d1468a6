/*!
 * Run the stages of the search in order.
 *
 * Stages B and C are pure functions of their inputs, so a search can be split between runs by
 * storing the catalog after stage B and picking it back up with [classify].
 */
use crate::{
    cloud_element::{find_cloud_elements, CeCatalog},
    cluster::{prune_clusters, ClusterList, PruneReport},
    config::SearchConfig,
    mcc::{find_features, FeatureList},
    reader::{FrameCube, PrecipitationSource},
};
use log::info;
use std::fmt::{self, Display};

/// Everything produced by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    /// The catalog with its graph pruned down to the clusters.
    pub catalog: CeCatalog,
    pub clusters: ClusterList,
    pub features: FeatureList,
}

impl SearchResults {
    /// Counts from every stage of the search.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames: self.catalog.times.len(),
            empty_frames: self.catalog.empty_frames.len(),
            cloud_elements: self.catalog.nodes.len(),
            edges: self.catalog.graph.edge_count(),
            clusters: self.clusters.len(),
            pruned: self.clusters.report,
            mcc: self.features.mcc.len(),
            mcs: self.features.mcs.len(),
            discarded_paths: self.features.discarded_paths,
            truncated_clusters: self.features.truncated_clusters,
        }
    }
}

/// Counts from every stage of the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub empty_frames: usize,
    pub cloud_elements: usize,
    /// Edges left in the graph after pruning.
    pub edges: usize,
    pub clusters: usize,
    pub pruned: PruneReport,
    pub mcc: usize,
    pub mcs: usize,
    pub discarded_paths: usize,
    pub truncated_clusters: usize,
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "                Frames: {:>8}", self.frames)?;
        writeln!(f, "          Empty frames: {:>8}", self.empty_frames)?;
        writeln!(f, "        Cloud elements: {:>8}", self.cloud_elements)?;
        writeln!(f, "          Linked edges: {:>8}", self.edges)?;
        writeln!(f, "              Clusters: {:>8}", self.clusters)?;
        write!(f, "{}", self.pruned)?;
        writeln!(f, "                   MCC: {:>8}", self.mcc)?;
        writeln!(f, "                   MCS: {:>8}", self.mcs)?;
        writeln!(f, "       Discarded paths: {:>8}", self.discarded_paths)?;
        writeln!(f, "    Truncated clusters: {:>8}", self.truncated_clusters)?;
        Ok(())
    }
}

/// Run the whole search on a cube of frames.
pub fn search(
    cube: &FrameCube,
    precipitation: &dyn PrecipitationSource,
    config: &SearchConfig,
) -> SearchResults {
    let catalog = find_cloud_elements(cube, precipitation, config);
    classify(catalog, config)
}

/// Prune and classify a catalog from an earlier cloud element search.
pub fn classify(mut catalog: CeCatalog, config: &SearchConfig) -> SearchResults {
    let clusters = prune_clusters(&mut catalog, config);
    let features = find_features(&catalog, &clusters, config);

    info!(
        "{} clusters, {} MCC tracks, {} MCS tracks",
        clusters.len(),
        features.mcc.len(),
        features.mcs.len()
    );

    SearchResults {
        catalog,
        clusters,
        features,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        grid::Grid,
        reader::{Frame, NoPrecipitation},
    };
    use chrono::{Duration, TimeZone, Utc};

    fn empty_cube(n_frames: usize) -> FrameCube {
        let coords: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let grid = Grid::new(coords.clone(), coords).unwrap();
        let start = Utc.ymd(2006, 9, 11).and_hms(0, 0, 0);
        let frames = (0..n_frames)
            .map(|k| Frame::from_values(start + Duration::hours(k as i64), vec![290.0; 100]))
            .collect();

        FrameCube::new(grid, frames, Duration::hours(1)).unwrap()
    }

    #[test]
    fn test_warm_cube_finds_nothing() {
        let results = search(&empty_cube(4), &NoPrecipitation, &SearchConfig::default());
        let summary = results.summary();

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.empty_frames, 4);
        assert_eq!(summary.cloud_elements, 0);
        assert_eq!(summary.clusters, 0);
        assert!(results.features.is_empty());
        assert!(summary.pruned.is_noop());

        let text = format!("{}", summary);
        assert!(text.contains("Empty frames:        4"));
    }
}
