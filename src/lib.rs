//! Find Mesoscale Convective Complexes in infrared brightness temperature imagery.
//!
//! The search runs in stages: read the frames, find and link the cloud elements, prune the graph
//! down to cloud clusters, classify the paths through each cluster, and write out the results.

pub use cloud_element::{
    find_cloud_elements, label_components, CeCatalog, CeId, CloudElement, CoreDescriptor, Edge,
    GridBox, NodeTable, PrecipStats,
};
pub use cluster::{prune_clusters, Cluster, ClusterList, PruneReport};
pub use config::{Connectivity, SearchConfig};
pub use database::CeDatabase;
pub use error::{InputFormatError, StoreError};
pub use geo::{great_circle_distance, BoundingBox, Coord, KM_PER_DEGREE};
pub use graph::CeGraph;
pub use grid::{Grid, GridWindow};
pub use kml::{KmlFile, KmlWriter};
pub use mcc::{
    classify_path, enumerate_paths, find_features, Classification, FeatureList, MatureStage,
    PathOutcome, PathState, Track,
};
pub use options::{parse_bbox, SearchOptions};
pub use pipeline::{classify, search, RunSummary, SearchResults};
pub use reader::{
    find_start_time, read_directory, Frame, FrameCube, NoPrecipitation, PrecipitationArchive,
    PrecipitationFrames, PrecipitationSource, ReaderOutput,
};
pub use sink::{
    write_cloud_elements, write_kml, write_reports, write_summary, write_track_report,
    write_tracks_kml, FeatureStatistics, TrackSummary, CLOUD_ELEMENT_REPORT, MCC_REPORT,
    MCS_REPORT, SUMMARY_REPORT,
};

/// Result type used throughout the crate.
pub type MccResult<T> = Result<T, Box<dyn std::error::Error>>;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod cloud_element;
mod cluster;
mod config;
mod database;
mod error;
mod geo;
mod graph;
mod grid;
mod kml;
mod mcc;
mod options;
mod pipeline;
mod reader;
mod sink;
