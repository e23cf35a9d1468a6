use super::summary::{FeatureStatistics, TrackSummary};
use crate::{
    cloud_element::{CeCatalog, NodeTable},
    cluster::ClusterList,
    config::SearchConfig,
    mcc::{FeatureList, Track},
    MccResult,
};
use chrono::Duration;
use std::io::Write;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/**
 * Write one block per track: the track summary followed by one line per cloud element.
 *
 * The node lines hold the track id, node id, time, area, core area, mean and minimum temperature
 * and the centroid.
 */
pub fn write_track_report<W: Write>(
    out: &mut W,
    title: &str,
    tracks: &[Track],
    nodes: &NodeTable,
    interval: Duration,
) -> MccResult<()> {
    writeln!(out, "# {}", title)?;
    writeln!(out, "# {} tracks", tracks.len())?;

    for track in tracks {
        writeln!(out)?;

        match TrackSummary::new(track, nodes, interval) {
            Some(summary) => write!(out, "{}", summary)?,
            None => writeln!(out, "{} track {} (incomplete)", track.classification, track.id)?,
        }

        writeln!(
            out,
            "{:>6} {:<14} {:<16} {:>10} {:>10} {:>7} {:>7} {:>9} {:>9}",
            "track", "node", "time", "area", "core_area", "mean_T", "min_T", "lat", "lon"
        )?;

        for ce in track.nodes.iter().filter_map(|id| nodes.get(*id)) {
            writeln!(
                out,
                "{:>6} {:<14} {:<16} {:>10.0} {:>10.0} {:>7.2} {:>7.2} {:>9.4} {:>9.4}",
                track.id,
                ce.id.to_string(),
                ce.time.format(TIME_FORMAT).to_string(),
                ce.area_km2,
                ce.core.area_km2,
                ce.mean_temperature,
                ce.min_temperature,
                ce.centroid.lat,
                ce.centroid.lon,
            )?;
        }
    }

    Ok(())
}

/// Write every accepted cloud element, one per line, with its full set of descriptors.
pub fn write_cloud_elements<W: Write>(out: &mut W, catalog: &CeCatalog) -> MccResult<()> {
    writeln!(
        out,
        "# {} cloud elements in {} frames, {} frames without any",
        catalog.nodes.len(),
        catalog.times.len(),
        catalog.empty_frames.len()
    )?;
    writeln!(
        out,
        "{:<14} {:<16} {:>8} {:>10} {:>9} {:>9} {:>7} {:>7} {:>7} {:>10} {:>7} {:>7} {:>5} {:>12} {:>8}",
        "node",
        "time",
        "pixels",
        "area",
        "lat",
        "lon",
        "min_T",
        "mean_T",
        "max_T",
        "core_area",
        "core_mn",
        "core_mT",
        "ecc",
        "precip",
        "max_rate"
    )?;

    for ce in catalog.nodes.iter() {
        let (precip, max_rate) = match ce.precipitation {
            Some(p) => (format!("{:.1}", p.total_volume), format!("{:.2}", p.max_rate)),
            None => ("n/a".to_owned(), "n/a".to_owned()),
        };

        writeln!(
            out,
            "{:<14} {:<16} {:>8} {:>10.0} {:>9.4} {:>9.4} {:>7.2} {:>7.2} {:>7.2} {:>10.0} {:>7.2} {:>7.2} {:>5.2} {:>12} {:>8}",
            ce.id.to_string(),
            ce.time.format(TIME_FORMAT).to_string(),
            ce.pixels.len(),
            ce.area_km2,
            ce.centroid.lat,
            ce.centroid.lon,
            ce.min_temperature,
            ce.mean_temperature,
            ce.max_temperature,
            ce.core.area_km2,
            ce.core.min_temperature,
            ce.core.mean_temperature,
            ce.core.eccentricity,
            precip,
            max_rate,
        )?;
    }

    Ok(())
}

/// Write the options used, the counts from every stage, and the statistics of each track list.
pub fn write_summary<W: Write>(
    out: &mut W,
    catalog: &CeCatalog,
    clusters: &ClusterList,
    features: &FeatureList,
    config: &SearchConfig,
) -> MccResult<()> {
    writeln!(out, "Search options")?;
    write!(out, "{}", config)?;
    writeln!(out)?;

    writeln!(out, "Cloud elements")?;
    writeln!(out, "                  Frames: {}", catalog.times.len())?;
    writeln!(out, "            Empty frames: {}", catalog.empty_frames.len())?;
    writeln!(out, "          Cloud elements: {}", catalog.nodes.len())?;
    writeln!(out)?;

    writeln!(out, "Clusters")?;
    writeln!(out, "                Clusters: {}", clusters.len())?;
    write!(out, "{}", clusters.report)?;
    writeln!(out)?;

    let lists = [("MCC", &features.mcc), ("MCS", &features.mcs)];
    for (name, tracks) in lists {
        let summaries: Vec<TrackSummary> = tracks
            .iter()
            .filter_map(|t| TrackSummary::new(t, &catalog.nodes, catalog.interval))
            .collect();
        let stats = FeatureStatistics::new(&summaries, tracks, &catalog.nodes);

        writeln!(out, "{} tracks", name)?;
        write!(out, "{}", stats)?;
        writeln!(out)?;
    }

    writeln!(out, "   Discarded paths: {}", features.discarded_paths)?;
    writeln!(out, "Truncated clusters: {}", features.truncated_clusters)?;

    Ok(())
}
