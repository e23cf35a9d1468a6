/*!
 * Stage E, write out the classified tracks.
 *
 * Every output is plain text: a report per track list, a summary of the whole search, a dump of
 * every cloud element, and optionally a KML file for viewing the tracks on a map.
 */
use crate::{
    cloud_element::{CeCatalog, NodeTable},
    cluster::ClusterList,
    config::SearchConfig,
    kml::{KmlFile, KmlWriter},
    mcc::{FeatureList, Track},
    MccResult,
};
use chrono::Duration;
use log::info;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

mod report;
mod summary;

pub use report::{write_cloud_elements, write_summary, write_track_report};
pub use summary::{FeatureStatistics, TrackSummary};

/// File names used by [write_reports].
pub const MCC_REPORT: &str = "mcc_tracks.txt";
pub const MCS_REPORT: &str = "mcs_tracks.txt";
pub const SUMMARY_REPORT: &str = "summary.txt";
pub const CLOUD_ELEMENT_REPORT: &str = "cloud_elements.txt";

fn create<P: AsRef<Path>>(path: P) -> MccResult<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/**
 * Write every text report into a directory, creating it if needed.
 *
 * #Returns
 * The paths of the files written.
 */
pub fn write_reports(
    dir: &Path,
    catalog: &CeCatalog,
    clusters: &ClusterList,
    features: &FeatureList,
    config: &SearchConfig,
) -> MccResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mcc_path = dir.join(MCC_REPORT);
    let mut out = create(&mcc_path)?;
    write_track_report(
        &mut out,
        "Mesoscale convective complexes",
        &features.mcc,
        &catalog.nodes,
        catalog.interval,
    )?;
    out.flush()?;

    let mcs_path = dir.join(MCS_REPORT);
    let mut out = create(&mcs_path)?;
    write_track_report(
        &mut out,
        "Mesoscale convective systems",
        &features.mcs,
        &catalog.nodes,
        catalog.interval,
    )?;
    out.flush()?;

    let summary_path = dir.join(SUMMARY_REPORT);
    let mut out = create(&summary_path)?;
    write_summary(&mut out, catalog, clusters, features, config)?;
    out.flush()?;

    let ce_path = dir.join(CLOUD_ELEMENT_REPORT);
    let mut out = create(&ce_path)?;
    write_cloud_elements(&mut out, catalog)?;
    out.flush()?;

    info!("reports written to {}", dir.display());

    Ok(vec![mcc_path, mcs_path, summary_path, ce_path])
}

/// Export the tracks to a KML file.
pub fn write_kml<P: AsRef<Path>>(
    path: P,
    features: &FeatureList,
    nodes: &NodeTable,
    interval: Duration,
) -> MccResult<()> {
    let mut kml = KmlFile::new(path.as_ref())?;
    write_tracks_kml(&mut kml, features, nodes, interval)?;
    info!("KML written to {}", path.as_ref().display());
    Ok(())
}

/**
 * Write a folder per track list with a folder per track.
 *
 * Each track gets a line through its centroids and a placemark per cloud element showing the
 * centroid and the bounding box, spanning the frame interval in time.
 */
pub fn write_tracks_kml<K: KmlWriter>(
    kml: &mut K,
    features: &FeatureList,
    nodes: &NodeTable,
    interval: Duration,
) -> MccResult<()> {
    kml.create_style("mcc", "ff0000ff", 2.0, "400000ff")?;
    kml.create_style("mcs", "ff00ffff", 2.0, "4000ffff")?;

    write_track_folder(kml, "MCC", "#mcc", &features.mcc, nodes, interval)?;
    write_track_folder(kml, "MCS", "#mcs", &features.mcs, nodes, interval)?;

    Ok(())
}

fn write_track_folder<K: KmlWriter>(
    kml: &mut K,
    name: &str,
    style: &str,
    tracks: &[Track],
    nodes: &NodeTable,
    interval: Duration,
) -> MccResult<()> {
    kml.start_folder(Some(name), None)?;

    for track in tracks {
        let ces: Vec<_> = track.nodes.iter().filter_map(|id| nodes.get(*id)).collect();

        let track_name = format!("{} {}", name, track.id);
        let description = TrackSummary::new(track, nodes, interval)
            .map(|s| format!("<pre>{}</pre>", s))
            .unwrap_or_default();

        kml.start_folder(Some(&track_name), Some(&description))?;

        kml.start_placemark(Some(&track_name), None, Some(style))?;
        let vertices: Vec<(f64, f64)> = ces
            .iter()
            .map(|ce| (ce.centroid.lat, ce.centroid.lon))
            .collect();
        kml.create_line_string(&vertices)?;
        kml.finish_placemark()?;

        for ce in ces {
            let description = format!(
                "area: {:.0} km^2<br/>core area: {:.0} km^2<br/>min T: {:.1} K",
                ce.area_km2, ce.core.area_km2, ce.min_temperature
            );

            kml.start_placemark(Some(&ce.id.to_string()), Some(&description), Some(style))?;
            kml.timespan(ce.time, ce.time + interval)?;
            kml.start_multi_geometry()?;
            kml.create_point(ce.centroid.lat, ce.centroid.lon)?;
            kml.create_box_polygon(&ce.bounds)?;
            kml.finish_multi_geometry()?;
            kml.finish_placemark()?;
        }

        kml.finish_folder()?;
    }

    kml.finish_folder()?;
    Ok(())
}
