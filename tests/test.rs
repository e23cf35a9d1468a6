use chrono::{DateTime, Duration, TimeZone, Utc};
use mccsearch::{
    classify, find_cloud_elements, prune_clusters, read_directory, search, write_kml,
    write_reports, CeDatabase, CeGraph, Classification, Frame, FrameCube, Grid, NoPrecipitation,
    PrecipitationFrames, SearchConfig, SearchResults, TrackSummary, MCC_REPORT, MCS_REPORT,
    SUMMARY_REPORT,
};
use std::{io::Write, path::PathBuf};

/*-------------------------------------------------------------------------------------------------
 *                                    Synthetic scenes
 *-----------------------------------------------------------------------------------------------*/
const N: usize = 100;
const CELL_AREA: f64 = 100.0;
const BACKGROUND: f32 = 290.0;
const CORE: f32 = 220.0;
const SHIELD: f32 = 235.0;

fn grid() -> Grid {
    let coords: Vec<f64> = (0..N).map(|i| i as f64 * 0.1).collect();
    Grid::new(coords.clone(), coords).unwrap()
}

fn start() -> DateTime<Utc> {
    Utc.ymd(2006, 9, 11).and_hms(0, 0, 0)
}

fn interval() -> Duration {
    Duration::minutes(30)
}

fn config() -> SearchConfig {
    SearchConfig {
        cell_area_km2: Some(CELL_AREA),
        ..SearchConfig::default()
    }
}

/// A brightness temperature field that only ever gets colder as features are painted on it.
#[derive(Clone)]
struct Scene(Vec<f32>);

impl Scene {
    fn new() -> Self {
        Scene(vec![BACKGROUND; N * N])
    }

    fn paint(&mut self, row: usize, col: usize, t: f32) {
        let val = &mut self.0[row * N + col];
        *val = val.min(t);
    }

    fn disk(mut self, row: usize, col: usize, radius: usize, t: f32) -> Self {
        let r2 = (radius * radius) as i64;
        for r in row.saturating_sub(radius)..=(row + radius).min(N - 1) {
            for c in col.saturating_sub(radius)..=(col + radius).min(N - 1) {
                let dr = r as i64 - row as i64;
                let dc = c as i64 - col as i64;
                if dr * dr + dc * dc <= r2 {
                    self.paint(r, c, t);
                }
            }
        }
        self
    }

    /// Fill `nrows` by `ncols` pixels with the lower left corner at `row`, `col`.
    fn rect(mut self, row: usize, col: usize, nrows: usize, ncols: usize, t: f32) -> Self {
        for r in row..(row + nrows) {
            for c in col..(col + ncols) {
                self.paint(r, c, t);
            }
        }
        self
    }
}

fn cube(scenes: Vec<Scene>) -> FrameCube {
    let frames = scenes
        .into_iter()
        .enumerate()
        .map(|(k, scene)| Frame::from_values(start() + interval() * k as i32, scene.0))
        .collect();

    FrameCube::new(grid(), frames, interval()).unwrap()
}

fn repeat(scene: Scene, n: usize) -> Vec<Scene> {
    vec![scene; n]
}

/// A 300 km wide cold core inside a 400 km wide cloud shield.
fn cold_disk() -> Scene {
    Scene::new().disk(50, 50, 20, SHIELD).disk(50, 50, 15, CORE)
}

/// Two systems that move toward each other and merge at frame 4.
fn merging_systems() -> Vec<Scene> {
    (0..16)
        .map(|k| {
            if k < 4 {
                Scene::new()
                    .disk(50, 33 + 2 * k, 7, CORE)
                    .disk(50, 67 - 2 * k, 7, CORE)
            } else {
                Scene::new()
                    .disk(50, 40, 7, CORE)
                    .disk(50, 60, 7, CORE)
                    .rect(47, 40, 7, 21, CORE)
            }
        })
        .collect()
}

fn run(scenes: Vec<Scene>) -> SearchResults {
    search(&cube(scenes), &NoPrecipitation, &config())
}

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mccsearch_test_{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/*-------------------------------------------------------------------------------------------------
 *                                        Scenarios
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_cold_disk_is_an_mcc() {
    let results = run(repeat(cold_disk(), 16));
    let features = &results.features;

    assert_eq!(results.clusters.len(), 1);
    assert_eq!(features.mcc.len(), 1);
    assert!(features.mcs.is_empty());

    let track = &features.mcc[0];
    assert_eq!(track.id, 1);
    assert_eq!(track.classification, Classification::Mcc);
    assert_eq!(track.len(), 16);
    assert_eq!(track.duration(interval()), Duration::hours(8));
    assert_eq!(track.start, start());
    assert_eq!(track.end, start() + interval() * 15);

    let summary =
        TrackSummary::new(track, &results.catalog.nodes, results.catalog.interval).unwrap();
    assert!((summary.peak_core_area_km2 - 70_000.0).abs() < 0.05 * 70_000.0);
    assert_eq!(summary.eccentricity_at_peak, 1.0);
    assert_eq!(summary.min_temperature, CORE as f64);
    assert!(summary.total_precipitation.is_none());
    assert!(summary.mean_speed_kmh.unwrap() < 1.0e-6);
    assert_eq!(summary.mature, Some((start(), start() + interval() * 15)));
}

#[test]
fn test_short_lived_disk_is_dropped() {
    let results = run(repeat(cold_disk(), 4));

    assert!(results.clusters.is_empty());
    assert!(results.features.is_empty());
    assert_eq!(results.clusters.report.short_lived_components, 1);
    assert_eq!(results.clusters.report.nodes_removed, 4);
    assert!(results.catalog.graph.is_empty());
}

#[test]
fn test_duration_boundary() {
    // 6 frames at 30 minutes is exactly 3 hours.
    let results = run(repeat(cold_disk(), 6));
    assert!(results.features.mcc.is_empty());
    assert_eq!(results.features.mcs.len(), 1);

    let results = run(repeat(cold_disk(), 5));
    assert!(results.features.is_empty());
}

#[test]
fn test_small_disk_is_an_mcs() {
    let small = Scene::new().disk(50, 50, 5, CORE);
    let results = run(repeat(small, 16));

    assert!(results.features.mcc.is_empty());
    assert_eq!(results.features.mcs.len(), 1);
    assert_eq!(results.features.mcs[0].len(), 16);
}

#[test]
fn test_elongated_core_is_an_mcs() {
    let line = Scene::new()
        .rect(40, 15, 20, 70, SHIELD)
        .rect(45, 20, 10, 60, CORE);
    let results = run(repeat(line, 16));

    assert!(results.features.mcc.is_empty());
    assert_eq!(results.features.mcs.len(), 1);

    let ce = results
        .catalog
        .nodes
        .get(results.features.mcs[0].nodes[0])
        .unwrap();
    assert_eq!(ce.core.area_km2, 60_000.0);
    assert!(ce.area_km2 >= 100_000.0);
    assert!((ce.core.eccentricity - 10.0 / 60.0).abs() < 1.0e-9);
}

#[test]
fn test_eccentricity_boundary() {
    // 20 / 29 is just under 0.7
    let narrow = Scene::new()
        .rect(30, 30, 40, 40, SHIELD)
        .rect(40, 35, 20, 29, CORE);
    let results = run(repeat(narrow, 16));
    assert!(results.features.mcc.is_empty());
    assert_eq!(results.features.mcs.len(), 1);

    let square = Scene::new()
        .rect(30, 30, 40, 40, SHIELD)
        .rect(35, 35, 29, 29, CORE);
    let results = run(repeat(square, 16));
    assert_eq!(results.features.mcc.len(), 1);
    assert!(results.features.mcs.is_empty());
}

#[test]
fn test_merging_systems_form_one_cluster() {
    let results = run(merging_systems());
    let catalog = &results.catalog;

    assert_eq!(results.clusters.len(), 1);
    let cluster = &results.clusters.clusters[0];
    assert_eq!(cluster.duration(catalog.interval), Duration::hours(8));

    let roots: Vec<_> = cluster.roots(&catalog.graph).collect();
    assert_eq!(roots.len(), 2);
    assert!(roots.iter().all(|id| id.frame == 0));

    let merged: Vec<_> = catalog.nodes.in_frame(4).map(|ce| ce.id).collect();
    assert_eq!(merged.len(), 1);
    assert_eq!(catalog.graph.parents(merged[0]).count(), 2);

    // One track from each seed, sharing everything after the merge.
    assert!(results.features.mcc.is_empty());
    assert_eq!(results.features.mcs.len(), 2);
    for track in &results.features.mcs {
        assert_eq!(track.len(), 16);
        assert_eq!(track.nodes[4], merged[0]);
    }
    assert_ne!(
        results.features.mcs[0].nodes[0],
        results.features.mcs[1].nodes[0]
    );
}

#[test]
fn test_precipitation_accumulates_over_track() {
    let block = Scene::new().rect(40, 40, 20, 25, CORE);
    let scenes = repeat(block, 12);

    let rain = (0..12)
        .map(|k| {
            Some(Frame::from_values(
                start() + interval() * k,
                vec![10.0; N * N],
            ))
        })
        .collect();

    let results = search(&cube(scenes), &PrecipitationFrames(rain), &config());
    assert_eq!(results.features.mcs.len(), 1);

    let track = &results.features.mcs[0];
    assert_eq!(track.duration(interval()), Duration::hours(6));

    let ce = results.catalog.nodes.get(track.nodes[0]).unwrap();
    assert_eq!(ce.area_km2, 50_000.0);

    let summary =
        TrackSummary::new(track, &results.catalog.nodes, results.catalog.interval).unwrap();
    assert!((summary.total_precipitation.unwrap() - 3_000_000.0).abs() < 1.0);
    assert_eq!(summary.max_precipitation_rate, Some(10.0));
}

/*-------------------------------------------------------------------------------------------------
 *                                        Invariants
 *-----------------------------------------------------------------------------------------------*/
fn assert_adjacent_edges(graph: &CeGraph) {
    for (parent, child, edge) in graph.edges() {
        assert_eq!(parent.frame + 1, child.frame);
        assert!(edge.overlap_km2 > 0.0);
        assert!(edge.parent_fraction.max(edge.child_fraction) >= 0.5);
    }
}

#[test]
fn test_edges_join_adjacent_frames() {
    let catalog = find_cloud_elements(&cube(merging_systems()), &NoPrecipitation, &config());
    assert_eq!(catalog.nodes.len(), 2 * 4 + 12);
    assert_adjacent_edges(&catalog.graph);

    let results = run(repeat(cold_disk(), 16));
    assert_adjacent_edges(&results.catalog.graph);
}

#[test]
fn test_mcc_tracks_meet_every_criterion() {
    let cfg = config();
    let results = run(repeat(cold_disk(), 16));

    for track in &results.features.mcc {
        let mature = track.mature.unwrap();
        assert!(interval() * (mature.last - mature.first + 1) as i32 >= cfg.d_mcc);

        for id in &track.nodes[mature.first..=mature.last] {
            let ce = results.catalog.nodes.get(*id).unwrap();
            assert!(ce.core.area_km2 >= cfg.a_mcc_size);
            assert!(ce.area_km2 >= cfg.a_mcs_size);
        }

        let peak = results
            .catalog
            .nodes
            .get(track.nodes[mature.peak])
            .unwrap();
        assert!(peak.core.eccentricity >= cfg.eccentricity_min);
        assert!(peak.core.mean_temperature <= cfg.t_mcc_peak);
    }
}

#[test]
fn test_mcc_and_mcs_are_disjoint() {
    let scenes = merging_systems()
        .into_iter()
        .map(|scene| scene.disk(20, 20, 20, SHIELD).disk(20, 20, 15, CORE))
        .collect();
    let results = run(scenes);

    assert_eq!(results.clusters.len(), 2);
    assert_eq!(results.features.mcc.len(), 1);
    assert_eq!(results.features.mcs.len(), 2);

    for mcc in &results.features.mcc {
        assert!(results.features.mcs.iter().all(|mcs| mcs.nodes != mcc.nodes));
    }

    let ids: Vec<_> = results.features.mcs.iter().map(|t| t.id).collect();
    assert_eq!(ids, (1..=ids.len()).collect::<Vec<_>>());
}

#[test]
fn test_search_is_deterministic() {
    let first = run(merging_systems());
    let second = run(merging_systems());
    assert_eq!(first, second);
}

#[test]
fn test_pruning_is_idempotent() {
    let cfg = config();
    let results = run(merging_systems());

    let mut catalog = results.catalog.clone();
    let again = prune_clusters(&mut catalog, &cfg);

    assert_eq!(again.clusters, results.clusters.clusters);
    assert!(again.report.is_noop());
    assert_eq!(catalog, results.catalog);
}

/*-------------------------------------------------------------------------------------------------
 *                                     Store and outputs
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_store_round_trip() {
    let cfg = config();
    let catalog = find_cloud_elements(&cube(merging_systems()), &NoPrecipitation, &cfg);

    let dir = test_dir("store");
    let path = dir.join("mcc.sqlite");

    {
        let db = CeDatabase::connect(&path).unwrap();
        db.store(&catalog).unwrap();
    }

    let db = CeDatabase::connect(&path).unwrap();
    let loaded = db.load().unwrap();
    assert_eq!(loaded, catalog);

    assert_eq!(classify(loaded, &cfg), classify(catalog, &cfg));
}

#[test]
fn test_write_reports_and_kml() {
    let cfg = config();
    let results = run(repeat(cold_disk(), 16));

    let dir = test_dir("reports");
    let paths = write_reports(
        &dir,
        &results.catalog,
        &results.clusters,
        &results.features,
        &cfg,
    )
    .unwrap();
    assert_eq!(paths.len(), 4);
    assert!(paths.iter().all(|p| p.exists()));

    let mcc = std::fs::read_to_string(dir.join(MCC_REPORT)).unwrap();
    assert!(mcc.contains("MCC track 1 (cluster 1)"));
    assert!(mcc.contains("CE_0F1"));
    assert!(mcc.contains("CE_15F1"));

    let mcs = std::fs::read_to_string(dir.join(MCS_REPORT)).unwrap();
    assert!(mcs.contains("# 0 tracks"));

    let summary = std::fs::read_to_string(dir.join(SUMMARY_REPORT)).unwrap();
    assert!(summary.contains("Number of tracks: 1"));

    let kml_path = dir.join("tracks.kml");
    write_kml(
        &kml_path,
        &results.features,
        &results.catalog.nodes,
        results.catalog.interval,
    )
    .unwrap();

    let kml = std::fs::read_to_string(&kml_path).unwrap();
    assert!(kml.ends_with("</Document>\n</kml>\n"));
    assert_eq!(kml.matches("<Placemark>").count(), 17);
    assert_eq!(kml.matches("<Folder>").count(), kml.matches("</Folder>").count());
}

#[test]
fn test_search_from_files() {
    // Bytes are stored as kelvin minus 75.
    fn to_bytes(scene: &Scene) -> Vec<u8> {
        scene.0.iter().map(|t| (*t - 75.0) as u8).collect()
    }

    let dir = test_dir("files");
    let ctl = "\
DSET ^merg_%y4%m2%d2%h2_4km-pixel
UNDEF 330
XDEF 100 LINEAR 0.0 0.1
YDEF 100 LINEAR 0.0 0.1
TDEF 2 LINEAR 30mn
OFFSET 75
";
    std::fs::write(dir.join("merg.ctl"), ctl).unwrap();

    let bytes = to_bytes(&cold_disk());
    for hour in 0..8 {
        let path = dir.join(format!("merg_20060911{:02}_4km-pixel", hour));
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(&bytes).unwrap();
        f.write_all(&bytes).unwrap();
    }

    let input = read_directory(&dir, None, None).unwrap();
    assert_eq!(input.cube.len(), 16);
    assert_eq!(input.cube.times()[15], start() + interval() * 15);

    let results = search(&input.cube, &*input.precipitation, &config());
    assert_eq!(results.features.mcc.len(), 1);
    assert_eq!(results.features.mcc[0].len(), 16);
}
