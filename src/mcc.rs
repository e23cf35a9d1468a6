/*!
 * Stage D, classify cloud clusters with the Maddox criteria.
 *
 * Every root to leaf path through a cluster is a candidate track. Each track is walked in time
 * order by a small state machine that watches for an uninterrupted run of frames meeting the size
 * criterion, then checks the shape and coldness at the peak of that run.
 */
use crate::{
    cloud_element::{CeCatalog, CeId, CloudElement, NodeTable},
    cluster::{Cluster, ClusterList},
    config::SearchConfig,
    graph::CeGraph,
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

/// The kind of convective system a track was classified as.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
pub enum Classification {
    /// Mesoscale convective complex.
    #[strum(serialize = "MCC")]
    Mcc,
    /// Mesoscale convective system.
    #[strum(serialize = "MCS")]
    Mcs,
}

/// States of the per track classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// The current frame does not meet the size criterion.
    BelowSize,
    /// The size criterion holds, but not for long enough yet.
    Accumulating,
    /// The size criterion has held long enough, shape and coldness are checked when the run ends.
    SatisfiedPendingShape,
    ClassifiedMcc,
    ClassifiedMcs,
    Discarded,
}

/// The run of frames where an MCC met the size criterion, as indexes into its track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatureStage {
    pub first: usize,
    pub last: usize,
    /// The frame with the largest cold core.
    pub peak: usize,
}

/// The result of walking one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathOutcome {
    /// One of the three terminal states.
    pub state: PathState,
    pub mature: Option<MatureStage>,
}

/// A classified path through a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Tracks are numbered from 1 within their list.
    pub id: usize,
    pub cluster: usize,
    /// The cloud elements in time order, one per frame.
    pub nodes: Vec<CeId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub classification: Classification,
    /// Only set for MCCs.
    pub mature: Option<MatureStage>,
}

impl Track {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Each frame of the track counts for one interval.
    pub fn duration(&self, interval: Duration) -> Duration {
        interval * self.nodes.len() as i32
    }
}

/// The two disjoint lists of classified tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureList {
    pub mcc: Vec<Track>,
    pub mcs: Vec<Track>,
    /// Paths that met neither set of criteria.
    pub discarded_paths: usize,
    /// Clusters where path enumeration stopped at the limit.
    pub truncated_clusters: usize,
}

impl FeatureList {
    pub fn is_empty(&self) -> bool {
        self.mcc.is_empty() && self.mcs.is_empty()
    }
}

/**
 * List the maximal paths through a cluster.
 *
 * Paths start at roots in ascending order and follow children in ascending order, so they come
 * out sorted. At most `max_paths` are returned, the flag is set if there were more.
 */
pub fn enumerate_paths(
    graph: &CeGraph,
    cluster: &Cluster,
    max_paths: usize,
) -> (Vec<Vec<CeId>>, bool) {
    let mut paths = vec![];
    let mut path: Vec<CeId> = vec![];
    let mut stack: Vec<(CeId, usize)> = vec![];

    for root in cluster.roots(graph) {
        stack.push((root, 0));

        while let Some((id, depth)) = stack.pop() {
            path.truncate(depth);
            path.push(id);

            let children: Vec<CeId> = graph.children(id).map(|(c, _)| c).collect();
            if children.is_empty() {
                if paths.len() == max_paths {
                    return (paths, true);
                }
                paths.push(path.clone());
            } else {
                for &child in children.iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }
    }

    (paths, false)
}

fn meets_size(ce: &CloudElement, config: &SearchConfig) -> bool {
    ce.core.area_km2 >= config.a_mcc_size && ce.area_km2 >= config.a_mcs_size
}

/// Check the shape and coldness at the peak of a run of frames meeting the size criterion.
fn check_peak(
    path: &[CeId],
    first: usize,
    last: usize,
    nodes: &NodeTable,
    config: &SearchConfig,
) -> Option<MatureStage> {
    let mut peak: Option<(usize, &CloudElement)> = None;
    for (i, id) in path.iter().enumerate().take(last + 1).skip(first) {
        let ce = nodes.get(*id)?;
        match peak {
            Some((_, best)) if ce.core.area_km2 <= best.core.area_km2 => {}
            _ => peak = Some((i, ce)),
        }
    }

    let (peak, ce) = peak?;
    if ce.core.eccentricity >= config.eccentricity_min
        && ce.core.mean_temperature <= config.t_mcc_peak
    {
        Some(MatureStage { first, last, peak })
    } else {
        debug!(
            "{} failed at peak {}: eccentricity {:.2}, core mean {:.1} K",
            path[0], ce.id, ce.core.eccentricity, ce.core.mean_temperature
        );
        None
    }
}

/**
 * Walk a path through the classification states.
 *
 * #Arguments
 * path - cloud elements in time order, one per frame.
 * nodes - the descriptors.
 * interval - time between frames.
 * config - the thresholds.
 */
pub fn classify_path(
    path: &[CeId],
    nodes: &NodeTable,
    interval: Duration,
    config: &SearchConfig,
) -> PathOutcome {
    use PathState::*;

    let mut state = BelowSize;
    let mut run_start = 0;
    let mut mature = None;

    for (i, id) in path.iter().enumerate() {
        let size_ok = nodes
            .get(*id)
            .map(|ce| meets_size(ce, config))
            .unwrap_or(false);

        if size_ok {
            if state == BelowSize {
                state = Accumulating;
                run_start = i;
            }

            if state == Accumulating && interval * (i - run_start + 1) as i32 >= config.d_mcc {
                state = SatisfiedPendingShape;
            }
        } else {
            if state == SatisfiedPendingShape {
                mature = check_peak(path, run_start, i - 1, nodes, config);
                if mature.is_some() {
                    state = ClassifiedMcc;
                    break;
                }
            }
            state = BelowSize;
        }
    }

    if state == SatisfiedPendingShape && !path.is_empty() {
        mature = check_peak(path, run_start, path.len() - 1, nodes, config);
        if mature.is_some() {
            state = ClassifiedMcc;
        }
    }

    if state != ClassifiedMcc {
        state = if interval * path.len() as i32 >= config.d_mcs {
            ClassifiedMcs
        } else {
            Discarded
        };
    }

    PathOutcome { state, mature }
}

/**
 * Classify every path through every cluster.
 *
 * Both lists are sorted by their cloud element identifiers, so tracks sharing a root are next to
 * each other.
 */
pub fn find_features(
    catalog: &CeCatalog,
    clusters: &ClusterList,
    config: &SearchConfig,
) -> FeatureList {
    let mut features = FeatureList::default();

    for cluster in clusters.iter() {
        let (paths, truncated) =
            enumerate_paths(&catalog.graph, cluster, config.max_paths_per_cluster);

        if truncated {
            warn!(
                "cluster {} has more than {} paths, only the first ones were classified",
                cluster.id, config.max_paths_per_cluster
            );
            features.truncated_clusters += 1;
        }

        for path in paths {
            let outcome = classify_path(&path, &catalog.nodes, catalog.interval, config);

            let classification = match outcome.state {
                PathState::ClassifiedMcc => Classification::Mcc,
                PathState::ClassifiedMcs => Classification::Mcs,
                _ => {
                    features.discarded_paths += 1;
                    continue;
                }
            };

            let start = path.first().and_then(|id| catalog.nodes.get(*id));
            let end = path.last().and_then(|id| catalog.nodes.get(*id));
            let (start, end) = match (start, end) {
                (Some(start), Some(end)) => (start.time, end.time),
                _ => {
                    warn!("cluster {} has a path with unknown cloud elements", cluster.id);
                    features.discarded_paths += 1;
                    continue;
                }
            };

            let track = Track {
                id: 0,
                cluster: cluster.id,
                nodes: path,
                start,
                end,
                classification,
                mature: outcome.mature,
            };

            match classification {
                Classification::Mcc => features.mcc.push(track),
                Classification::Mcs => features.mcs.push(track),
            }
        }
    }

    // Number by the CeId order of the nodes, frames compare as numbers.
    for list in [&mut features.mcc, &mut features.mcs] {
        list.sort_by(|a, b| a.nodes.cmp(&b.nodes));
        for (i, track) in list.iter_mut().enumerate() {
            track.id = i + 1;
        }
    }

    info!(
        "{} MCC tracks, {} MCS tracks, {} paths discarded",
        features.mcc.len(),
        features.mcs.len(),
        features.discarded_paths
    );

    features
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cloud_element::{CoreDescriptor, Edge, GridBox},
        geo::{BoundingBox, Coord},
    };
    use chrono::TimeZone;

    const EDGE: Edge = Edge {
        parent_fraction: 1.0,
        child_fraction: 1.0,
        overlap_km2: 100.0,
    };

    fn node(id: CeId, area: f64, core_area: f64, eccentricity: f64, core_mean: f64) -> CloudElement {
        CloudElement {
            id,
            time: Utc.ymd(2006, 9, 11).and_hms(0, 0, 0) + Duration::minutes(30 * id.frame as i64),
            pixels: vec![0],
            area_km2: area,
            centroid: Coord::default(),
            min_temperature: 200.0,
            mean_temperature: 220.0,
            max_temperature: 240.0,
            grid_box: GridBox {
                row_min: 0,
                row_max: 0,
                col_min: 0,
                col_max: 0,
            },
            bounds: BoundingBox::default(),
            core: CoreDescriptor {
                pixels: vec![0],
                area_km2: core_area,
                min_temperature: 200.0,
                mean_temperature: core_mean,
                major_extent_km: 100.0,
                minor_extent_km: 100.0 * eccentricity,
                eccentricity,
            },
            precipitation: None,
        }
    }

    /// A single chain where each frame is given as (area, core area, eccentricity).
    fn chain(frames: &[(f64, f64, f64)]) -> (NodeTable, Vec<CeId>) {
        let mut nodes = NodeTable::new();
        let mut path = vec![];
        for (f, &(area, core, ecc)) in frames.iter().enumerate() {
            let id = CeId::new(f as u32, 1);
            nodes.insert(node(id, area, core, ecc, 215.0));
            path.push(id);
        }
        (nodes, path)
    }

    const BIG: (f64, f64, f64) = (120_000.0, 60_000.0, 0.9);
    const SMALL: (f64, f64, f64) = (20_000.0, 5_000.0, 0.9);

    fn interval() -> Duration {
        Duration::minutes(30)
    }

    #[test]
    fn test_twelve_big_frames_is_an_mcc() {
        let (nodes, path) = chain(&[BIG; 12]);
        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::ClassifiedMcc);
        assert_eq!(
            outcome.mature,
            Some(MatureStage {
                first: 0,
                last: 11,
                peak: 0
            })
        );
    }

    #[test]
    fn test_eleven_big_frames_is_an_mcs() {
        let (nodes, path) = chain(&[BIG; 11]);
        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::ClassifiedMcs);
        assert!(outcome.mature.is_none());
    }

    #[test]
    fn test_interrupted_run_resets() {
        let mut frames = vec![BIG; 6];
        frames.push(SMALL);
        frames.extend_from_slice(&[BIG; 6]);

        let (nodes, path) = chain(&frames);
        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::ClassifiedMcs);
    }

    #[test]
    fn test_second_run_can_qualify() {
        // The first run is long enough but thin at its peak, the second one is round.
        let mut frames = vec![(120_000.0, 60_000.0, 0.5); 12];
        frames.push(SMALL);
        frames.extend_from_slice(&[BIG; 12]);
        frames.push(SMALL);

        let (nodes, path) = chain(&frames);
        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::ClassifiedMcc);
        assert_eq!(
            outcome.mature,
            Some(MatureStage {
                first: 13,
                last: 24,
                peak: 13
            })
        );
    }

    #[test]
    fn test_peak_decides_shape() {
        // Only the largest core matters, the thin frames before it do not.
        let mut frames = vec![(120_000.0, 60_000.0, 0.2); 12];
        frames[7] = (150_000.0, 80_000.0, 0.75);

        let (nodes, path) = chain(&frames);
        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::ClassifiedMcc);
        assert_eq!(outcome.mature.unwrap().peak, 7);

        frames[7] = (150_000.0, 80_000.0, 0.69);
        let (nodes, path) = chain(&frames);
        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::ClassifiedMcs);
    }

    #[test]
    fn test_warm_peak_is_not_an_mcc() {
        let mut nodes = NodeTable::new();
        let mut path = vec![];
        for f in 0..12 {
            let id = CeId::new(f, 1);
            nodes.insert(node(id, 120_000.0, 60_000.0, 1.0, 235.0));
            path.push(id);
        }

        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::ClassifiedMcs);
    }

    #[test]
    fn test_short_path_is_discarded() {
        let (nodes, path) = chain(&[SMALL; 5]);
        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::Discarded);

        let (nodes, path) = chain(&[SMALL; 6]);
        let outcome = classify_path(&path, &nodes, interval(), &SearchConfig::default());
        assert_eq!(outcome.state, PathState::ClassifiedMcs);
    }

    /// Two roots merge, then split into two leaves.
    fn diamond() -> (CeGraph, Cluster) {
        let mut graph = CeGraph::new();
        graph.add_edge(CeId::new(0, 1), CeId::new(1, 1), EDGE);
        graph.add_edge(CeId::new(0, 2), CeId::new(1, 1), EDGE);
        graph.add_edge(CeId::new(1, 1), CeId::new(2, 2), EDGE);
        graph.add_edge(CeId::new(1, 1), CeId::new(2, 1), EDGE);

        let cluster = Cluster::new(1, graph.node_ids().collect());
        (graph, cluster)
    }

    #[test]
    fn test_enumerate_paths_in_order() {
        let (graph, cluster) = diamond();
        let (paths, truncated) = enumerate_paths(&graph, &cluster, 100);

        assert!(!truncated);
        assert_eq!(
            paths,
            vec![
                vec![CeId::new(0, 1), CeId::new(1, 1), CeId::new(2, 1)],
                vec![CeId::new(0, 1), CeId::new(1, 1), CeId::new(2, 2)],
                vec![CeId::new(0, 2), CeId::new(1, 1), CeId::new(2, 1)],
                vec![CeId::new(0, 2), CeId::new(1, 1), CeId::new(2, 2)],
            ]
        );
    }

    #[test]
    fn test_enumerate_paths_limit() {
        let (graph, cluster) = diamond();

        let (paths, truncated) = enumerate_paths(&graph, &cluster, 3);
        assert!(truncated);
        assert_eq!(paths.len(), 3);

        let (paths, truncated) = enumerate_paths(&graph, &cluster, 4);
        assert!(!truncated);
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn test_classification_names() {
        assert_eq!(Classification::Mcc.to_string(), "MCC");
        let name: &'static str = Classification::Mcs.into();
        assert_eq!(name, "MCS");
        assert_eq!("MCC".parse::<Classification>().unwrap(), Classification::Mcc);
    }
}
