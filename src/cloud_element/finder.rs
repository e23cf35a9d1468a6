use super::{label_components, CeId, CloudElement, CoreDescriptor, Edge, GridBox, PrecipStats};
use crate::{
    config::SearchConfig,
    geo::{BoundingBox, Coord},
    graph::CeGraph,
    grid::Grid,
    reader::{Frame, FrameCube, PrecipitationSource},
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rustc_hash::FxHashSet as HashSet;
use std::collections::BTreeMap;

/// The descriptors of every accepted cloud element, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable {
    nodes: BTreeMap<CeId, CloudElement>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ce: CloudElement) {
        self.nodes.insert(ce.id, ce);
    }

    pub fn get(&self, id: CeId) -> Option<&CloudElement> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every cloud element in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &CloudElement> {
        self.nodes.values()
    }

    /// The cloud elements of a single frame in identifier order.
    pub fn in_frame(&self, frame: u32) -> impl Iterator<Item = &CloudElement> {
        self.nodes
            .range(CeId::new(frame, 0)..=CeId::new(frame, u32::MAX))
            .map(|(_, ce)| ce)
    }
}

/**
 * Everything found by the cloud element search.
 *
 * The node table is never modified after the search, pruning only removes nodes from the graph.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct CeCatalog {
    pub nodes: NodeTable,
    pub graph: CeGraph,
    /// Valid time of every frame searched.
    pub times: Vec<DateTime<Utc>>,
    /// Time between frames.
    pub interval: Duration,
    /// Area of a pixel used for every area in the catalog.
    pub cell_area_km2: f64,
    /// Frames without a single accepted cloud element.
    pub empty_frames: Vec<usize>,
}

impl CeCatalog {
    /// The length of a frame interval in hours.
    pub fn interval_hours(&self) -> f64 {
        self.interval.num_seconds() as f64 / 3600.0
    }

    /// The valid time of a frame.
    pub fn time(&self, frame: usize) -> Option<DateTime<Utc>> {
        self.times.get(frame).copied()
    }
}

#[derive(Debug, Clone, Copy)]
enum Rejection {
    TooSmall,
    WeakCore,
}

/**
 * Find the cloud elements in every frame and link them through time.
 *
 * # Arguments
 * * cube - the brightness temperature frames.
 * * precipitation - co-registered precipitation, use [NoPrecipitation](crate::NoPrecipitation) if
 *   there is none.
 * * config - thresholds for accepting and linking cloud elements.
 */
pub fn find_cloud_elements(
    cube: &FrameCube,
    precipitation: &dyn PrecipitationSource,
    config: &SearchConfig,
) -> CeCatalog {
    let grid = cube.grid();
    let cell_area = config
        .cell_area_km2
        .unwrap_or_else(|| grid.cell_area_km2());
    let interval_hours = cube.interval().num_seconds() as f64 / 3600.0;

    let mut nodes = NodeTable::new();
    let mut graph = CeGraph::new();
    let mut empty_frames = vec![];

    let mut num_labeled = 0;
    let mut num_small = 0;
    let mut num_weak_core = 0;
    let mut num_no_precip = 0;

    let mut previous: Vec<CeId> = vec![];

    for (f, frame) in cube.frames().iter().enumerate() {
        let mask: Vec<bool> = (0..frame.len())
            .map(|i| {
                frame
                    .value(i)
                    .map(|t| t as f64 <= config.t_cold)
                    .unwrap_or(false)
            })
            .collect();

        let components = label_components(&mask, grid.nrows(), grid.ncols(), config.connectivity);
        num_labeled += components.len();

        let precip_frame = match precipitation.precipitation(f) {
            Some(p) if p.len() == grid.len() => Some(p),
            Some(p) => {
                warn!(
                    "precipitation for {} has {} pixels, expected {}",
                    frame.time(),
                    p.len(),
                    grid.len()
                );
                None
            }
            None => {
                debug!("no precipitation for frame {} ({})", f, frame.time());
                num_no_precip += 1;
                None
            }
        };

        let mut current: Vec<CeId> = vec![];
        for pixels in components {
            let id = CeId::new(f as u32, current.len() as u32 + 1);

            match describe(
                id,
                frame,
                pixels,
                grid,
                cell_area,
                config,
                precip_frame.as_ref(),
                interval_hours,
            ) {
                Ok(ce) => {
                    graph.add_node(id);
                    nodes.insert(ce);
                    current.push(id);
                }
                Err(Rejection::TooSmall) => num_small += 1,
                Err(Rejection::WeakCore) => num_weak_core += 1,
            }
        }

        if current.is_empty() {
            warn!("no cloud elements in frame {} ({})", f, frame.time());
            empty_frames.push(f);
        } else {
            debug!(
                "frame {} ({}) has {} cloud elements",
                f,
                frame.time(),
                current.len()
            );
        }

        link_frames(&mut graph, &nodes, &previous, &current, cell_area, config.o_min);
        previous = current;
    }

    info!(
        "{} regions labeled, {} too small, {} with a weak core, {} cloud elements kept",
        num_labeled,
        num_small,
        num_weak_core,
        nodes.len()
    );
    info!(
        "{} edges, {} empty frames, {} frames without precipitation",
        graph.edge_count(),
        empty_frames.len(),
        num_no_precip
    );

    CeCatalog {
        nodes,
        graph,
        times: cube.times(),
        interval: cube.interval(),
        cell_area_km2: cell_area,
        empty_frames,
    }
}

#[allow(clippy::too_many_arguments)]
fn describe(
    id: CeId,
    frame: &Frame,
    pixels: Vec<u32>,
    grid: &Grid,
    cell_area: f64,
    config: &SearchConfig,
    precip: Option<&Frame>,
    interval_hours: f64,
) -> Result<CloudElement, Rejection> {
    let area_km2 = pixels.len() as f64 * cell_area;
    if area_km2 < config.a_min {
        return Err(Rejection::TooSmall);
    }

    let temperature = |idx: u32| frame.values()[idx as usize] as f64;

    let core_pixels: Vec<u32> = pixels
        .iter()
        .copied()
        .filter(|&idx| temperature(idx) < config.t_core)
        .collect();

    let core_area = core_pixels.len() as f64 * cell_area;
    if core_area < config.a_core_min {
        return Err(Rejection::WeakCore);
    }

    let (min_temperature, mean_temperature, max_temperature) =
        temperature_stats(&pixels, temperature);

    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    let mut grid_box = GridBox {
        row_min: u32::MAX,
        row_max: 0,
        col_min: u32::MAX,
        col_max: 0,
    };

    for &idx in &pixels {
        let Coord { lat, lon } = grid.coord(idx as usize);
        lat_sum += lat;
        lon_sum += lon;

        let (row, col) = grid.row_col(idx as usize);
        let (row, col) = (row as u32, col as u32);
        grid_box.row_min = grid_box.row_min.min(row);
        grid_box.row_max = grid_box.row_max.max(row);
        grid_box.col_min = grid_box.col_min.min(col);
        grid_box.col_max = grid_box.col_max.max(col);
    }

    let n = pixels.len() as f64;
    let centroid = Coord {
        lat: lat_sum / n,
        lon: lon_sum / n,
    };

    let bounds = BoundingBox {
        ll: Coord {
            lat: grid.lats()[grid_box.row_min as usize],
            lon: grid.lons()[grid_box.col_min as usize],
        },
        ur: Coord {
            lat: grid.lats()[grid_box.row_max as usize],
            lon: grid.lons()[grid_box.col_max as usize],
        },
    };

    let core = describe_core(core_pixels, grid, cell_area, temperature);

    let precipitation =
        precip.and_then(|p| precipitation_stats(&pixels, p, cell_area, interval_hours));

    Ok(CloudElement {
        id,
        time: frame.time(),
        pixels,
        area_km2,
        centroid,
        min_temperature,
        mean_temperature,
        max_temperature,
        grid_box,
        bounds,
        core,
        precipitation,
    })
}

fn temperature_stats<F: Fn(u32) -> f64>(pixels: &[u32], temperature: F) -> (f64, f64, f64) {
    if pixels.is_empty() {
        return (f64::NAN, f64::NAN, f64::NAN);
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;

    for &idx in pixels {
        let t = temperature(idx);
        min = min.min(t);
        max = max.max(t);
        sum += t;
    }

    (min, sum / pixels.len() as f64, max)
}

/// Size and shape of the cold core using the rows and columns it occupies.
fn describe_core<F: Fn(u32) -> f64>(
    pixels: Vec<u32>,
    grid: &Grid,
    cell_area: f64,
    temperature: F,
) -> CoreDescriptor {
    let (min_temperature, mean_temperature, _) = temperature_stats(&pixels, temperature);

    let mut rows: HashSet<usize> = HashSet::default();
    let mut cols: HashSet<usize> = HashSet::default();
    for &idx in &pixels {
        let (row, col) = grid.row_col(idx as usize);
        rows.insert(row);
        cols.insert(col);
    }

    let ns_extent = rows.len() as f64 * grid.cell_height_km();
    let ew_extent = cols.len() as f64 * grid.cell_width_km();

    let major_extent_km = ns_extent.max(ew_extent);
    let minor_extent_km = ns_extent.min(ew_extent);
    let eccentricity = if major_extent_km > 0.0 {
        minor_extent_km / major_extent_km
    } else {
        0.0
    };

    CoreDescriptor {
        area_km2: pixels.len() as f64 * cell_area,
        pixels,
        min_temperature,
        mean_temperature,
        major_extent_km,
        minor_extent_km,
        eccentricity,
    }
}

/// Returns `None` when none of the pixels have a valid rain rate.
fn precipitation_stats(
    pixels: &[u32],
    precip: &Frame,
    cell_area: f64,
    interval_hours: f64,
) -> Option<PrecipStats> {
    let mut any_valid = false;
    let mut total_volume = 0.0;
    let mut max_rate: f64 = 0.0;
    let mut min_rate = f64::INFINITY;
    let mut raining = 0usize;

    for rate in pixels.iter().filter_map(|&idx| precip.value(idx as usize)) {
        let rate = rate as f64;
        any_valid = true;
        total_volume += rate * cell_area * interval_hours;
        max_rate = max_rate.max(rate);
        if rate > 0.0 {
            min_rate = min_rate.min(rate);
            raining += 1;
        }
    }

    if any_valid {
        Some(PrecipStats {
            total_volume,
            max_rate,
            min_rate: if raining > 0 { min_rate } else { 0.0 },
            raining_area_km2: raining as f64 * cell_area,
        })
    } else {
        None
    }
}

/// Count the pixels two sorted pixel lists have in common.
fn overlap_count(a: &[u32], b: &[u32]) -> usize {
    let mut i = 0;
    let mut j = 0;
    let mut count = 0;

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }

    count
}

/// Link the cloud elements of one frame to those of the next.
///
/// Pairs are visited parent ascending then child ascending.
fn link_frames(
    graph: &mut CeGraph,
    nodes: &NodeTable,
    parents: &[CeId],
    children: &[CeId],
    cell_area: f64,
    o_min: f64,
) {
    for &parent_id in parents {
        let parent = match nodes.get(parent_id) {
            Some(ce) => ce,
            None => continue,
        };

        for &child_id in children {
            let child = match nodes.get(child_id) {
                Some(ce) => ce,
                None => continue,
            };

            if !parent.grid_box.overlaps(&child.grid_box) {
                continue;
            }

            let shared = overlap_count(&parent.pixels, &child.pixels);
            if shared == 0 {
                continue;
            }

            let parent_fraction = shared as f64 / parent.pixels.len() as f64;
            let child_fraction = shared as f64 / child.pixels.len() as f64;

            if parent_fraction.max(child_fraction) >= o_min {
                graph.add_edge(
                    parent_id,
                    child_id,
                    Edge {
                        parent_fraction,
                        child_fraction,
                        overlap_km2: shared as f64 * cell_area,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::{NoPrecipitation, PrecipitationFrames};
    use chrono::TimeZone;

    const N: usize = 40;

    fn grid() -> Grid {
        let coords: Vec<f64> = (0..N).map(|i| i as f64 * 0.1).collect();
        Grid::new(coords.clone(), coords).unwrap().with_cell_area(100.0)
    }

    fn start() -> DateTime<Utc> {
        Utc.ymd(2006, 9, 11).and_hms(0, 0, 0)
    }

    /// A frame at 260 K with rectangles (row0, col0, nrows, ncols, temperature) painted on it.
    fn frame(k: i32, rects: &[(usize, usize, usize, usize, f32)]) -> Frame {
        let mut values = vec![260.0f32; N * N];
        for &(r0, c0, nr, nc, t) in rects {
            for r in r0..(r0 + nr) {
                for c in c0..(c0 + nc) {
                    values[r * N + c] = t;
                }
            }
        }
        Frame::from_values(start() + Duration::minutes(30) * k, values)
    }

    fn cube(frames: Vec<Frame>) -> FrameCube {
        FrameCube::new(grid(), frames, Duration::minutes(30)).unwrap()
    }

    fn config() -> SearchConfig {
        SearchConfig {
            cell_area_km2: Some(100.0),
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_descriptors() {
        // 10 x 8 block, with a 6 x 4 core inside.
        let cube = cube(vec![frame(0, &[(5, 5, 10, 8, 235.0), (7, 7, 6, 4, 210.0)])]);
        let catalog = find_cloud_elements(&cube, &NoPrecipitation, &config());

        assert_eq!(catalog.nodes.len(), 1);
        let ce = catalog.nodes.get(CeId::new(0, 1)).unwrap();

        assert_eq!(ce.pixels.len(), 80);
        assert_eq!(ce.area_km2, 8_000.0);
        assert_eq!(ce.core.area_km2, 2_400.0);
        assert_eq!(ce.min_temperature, 210.0);
        assert_eq!(ce.max_temperature, 235.0);
        assert!((ce.mean_temperature - (24.0 * 210.0 + 56.0 * 235.0) / 80.0).abs() < 1.0e-9);
        assert_eq!(ce.core.mean_temperature, 210.0);
        assert!((ce.centroid.lat - 0.95).abs() < 1.0e-9);
        assert!((ce.centroid.lon - 0.85).abs() < 1.0e-9);
        assert_eq!(
            ce.grid_box,
            GridBox {
                row_min: 5,
                row_max: 14,
                col_min: 5,
                col_max: 12
            }
        );
        assert!((ce.core.eccentricity - 4.0 / 6.0).abs() < 1.0e-9);
        assert!(ce.precipitation.is_none());
    }

    #[test]
    fn test_rejections() {
        let cube = cube(vec![frame(
            0,
            &[
                // Too small, 20 pixels.
                (0, 0, 4, 5, 200.0),
                // Big enough, but the core is only 10 pixels.
                (10, 10, 5, 6, 235.0),
                (10, 10, 2, 5, 200.0),
                // Accepted.
                (20, 20, 6, 5, 215.0),
            ],
        )]);

        let catalog = find_cloud_elements(&cube, &NoPrecipitation, &config());

        assert_eq!(catalog.nodes.len(), 1);
        let ce = catalog.nodes.iter().next().unwrap();
        assert_eq!(ce.id, CeId::new(0, 1));
        assert_eq!(ce.grid_box.row_min, 20);
        assert!(catalog.empty_frames.is_empty());
    }

    #[test]
    fn test_core_threshold_is_strict() {
        // Exactly at the core threshold does not count toward the core.
        let cube = cube(vec![frame(0, &[(0, 0, 6, 5, 221.0)])]);
        let catalog = find_cloud_elements(&cube, &NoPrecipitation, &config());
        assert!(catalog.nodes.is_empty());
        assert_eq!(catalog.empty_frames, vec![0]);

        // Exactly at the cold threshold is inside the cloud element.
        let cube = self::cube(vec![frame(0, &[(0, 0, 6, 5, 241.0), (0, 0, 4, 4, 200.0)])]);
        let catalog = find_cloud_elements(&cube, &NoPrecipitation, &config());
        assert_eq!(catalog.nodes.iter().next().unwrap().pixels.len(), 30);
    }

    #[test]
    fn test_linking() {
        let cube = cube(vec![
            frame(0, &[(0, 0, 6, 6, 210.0), (20, 20, 6, 6, 210.0)]),
            // The first moves one row, the second moves away completely.
            frame(1, &[(1, 0, 6, 6, 210.0), (20, 30, 6, 6, 210.0)]),
            frame(2, &[]),
            frame(3, &[(1, 0, 6, 6, 210.0)]),
        ]);

        let catalog = find_cloud_elements(&cube, &NoPrecipitation, &config());

        assert_eq!(catalog.nodes.len(), 5);
        assert_eq!(catalog.graph.edge_count(), 1);
        assert_eq!(catalog.empty_frames, vec![2]);

        let edge = catalog
            .graph
            .edge(CeId::new(0, 1), CeId::new(1, 1))
            .unwrap();
        assert!((edge.parent_fraction - 30.0 / 36.0).abs() < 1.0e-9);
        assert!((edge.child_fraction - 30.0 / 36.0).abs() < 1.0e-9);
        assert_eq!(edge.overlap_km2, 3_000.0);

        assert!(catalog.graph.is_root(CeId::new(3, 1)));
        assert!(catalog.graph.is_leaf(CeId::new(1, 1)));
    }

    #[test]
    fn test_link_uses_smaller_element() {
        // A small element inside a large one links even though it covers little of the large one.
        let cube = cube(vec![
            frame(0, &[(0, 0, 30, 30, 210.0)]),
            frame(1, &[(0, 0, 6, 6, 210.0)]),
        ]);

        let catalog = find_cloud_elements(&cube, &NoPrecipitation, &config());
        let edge = catalog
            .graph
            .edge(CeId::new(0, 1), CeId::new(1, 1))
            .unwrap();
        assert_eq!(edge.child_fraction, 1.0);
        assert!(edge.parent_fraction < 0.5);
    }

    #[test]
    fn test_precipitation_stats() {
        let cube = cube(vec![
            frame(0, &[(0, 0, 6, 5, 210.0)]),
            frame(1, &[(0, 0, 6, 5, 210.0)]),
        ]);

        let mut rain = vec![0.0f32; N * N];
        rain[0] = 10.0;
        rain[1] = 4.0;
        rain[2] = f32::NAN;
        let rain = Frame::from_values(start(), rain);

        let precip = PrecipitationFrames(vec![Some(rain), None]);
        let catalog = find_cloud_elements(&cube, &precip, &config());

        let stats = catalog
            .nodes
            .get(CeId::new(0, 1))
            .unwrap()
            .precipitation
            .unwrap();
        assert!((stats.total_volume - 14.0 * 100.0 * 0.5).abs() < 1.0e-9);
        assert_eq!(stats.max_rate, 10.0);
        assert_eq!(stats.min_rate, 4.0);
        assert_eq!(stats.raining_area_km2, 200.0);

        assert!(catalog
            .nodes
            .get(CeId::new(1, 1))
            .unwrap()
            .precipitation
            .is_none());
    }

    #[test]
    fn test_nodes_in_frame() {
        let cube = cube(vec![
            frame(0, &[(0, 0, 6, 5, 210.0), (20, 20, 6, 5, 210.0)]),
            frame(1, &[(0, 0, 6, 5, 210.0)]),
        ]);

        let catalog = find_cloud_elements(&cube, &NoPrecipitation, &config());
        let ids: Vec<CeId> = catalog.nodes.in_frame(0).map(|ce| ce.id).collect();
        assert_eq!(ids, vec![CeId::new(0, 1), CeId::new(0, 2)]);
        assert_eq!(catalog.nodes.in_frame(1).count(), 1);
        assert_eq!(catalog.nodes.in_frame(2).count(), 0);
    }
}
