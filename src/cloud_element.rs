/*!
 * Stage B, cloud elements and the graph that links them through time.
 *
 * A cloud element is a connected region of cold pixels in a single frame. Every cloud element
 * that passes the size and coldness tests becomes a node, and nodes in consecutive frames that
 * overlap enough are linked by an edge.
 */
use crate::geo::{BoundingBox, Coord};
use chrono::{DateTime, Utc};
use std::{
    fmt::{self, Display},
    str::FromStr,
};

mod finder;
mod labeling;

pub use finder::{find_cloud_elements, CeCatalog, NodeTable};
pub use labeling::label_components;

/// The identifier of a cloud element, printed as `CE_<frame>F<component>`.
///
/// Frames are counted from 0 and components from 1 in the order they were labeled. Identifiers
/// sort by frame first, then component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CeId {
    pub frame: u32,
    pub component: u32,
}

impl CeId {
    pub fn new(frame: u32, component: u32) -> Self {
        CeId { frame, component }
    }
}

impl Display for CeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CE_{}F{}", self.frame, self.component)
    }
}

impl FromStr for CeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("CE_")
            .ok_or_else(|| format!("invalid cloud element id: {}", s))?;

        let (frame, component) = rest
            .split_once('F')
            .ok_or_else(|| format!("invalid cloud element id: {}", s))?;

        let frame = frame
            .parse()
            .map_err(|_| format!("invalid frame in cloud element id: {}", s))?;
        let component = component
            .parse()
            .map_err(|_| format!("invalid component in cloud element id: {}", s))?;

        Ok(CeId { frame, component })
    }
}

/// An axis aligned block of grid rows and columns, all bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBox {
    pub row_min: u32,
    pub row_max: u32,
    pub col_min: u32,
    pub col_max: u32,
}

impl GridBox {
    pub fn overlaps(&self, other: &GridBox) -> bool {
        self.row_min <= other.row_max
            && other.row_min <= self.row_max
            && self.col_min <= other.col_max
            && other.col_min <= self.col_max
    }
}

/// The part of a cloud element colder than the core threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreDescriptor {
    /// Sorted flat grid indexes.
    pub pixels: Vec<u32>,
    pub area_km2: f64,
    pub min_temperature: f64,
    pub mean_temperature: f64,
    /// The longer of the north-south and east-west extents in km.
    pub major_extent_km: f64,
    /// The shorter of the north-south and east-west extents in km.
    pub minor_extent_km: f64,
    /// Minor over major extent, 1.0 is round and values near 0 are long and thin.
    pub eccentricity: f64,
}

/// Precipitation falling under a cloud element during one frame interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecipStats {
    /// Rain rate times area times the frame interval, in mm km^2.
    pub total_volume: f64,
    /// Largest rain rate in mm/h.
    pub max_rate: f64,
    /// Smallest rain rate above zero in mm/h, zero if nothing is raining.
    pub min_rate: f64,
    /// Area with a rain rate above zero in km^2.
    pub raining_area_km2: f64,
}

/// All the descriptors of an accepted cloud element.
///
/// These are computed once when the element is found and never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudElement {
    pub id: CeId,
    pub time: DateTime<Utc>,
    /// Sorted flat grid indexes.
    pub pixels: Vec<u32>,
    pub area_km2: f64,
    /// Unweighted mean of the pixel coordinates.
    pub centroid: Coord,
    pub min_temperature: f64,
    pub mean_temperature: f64,
    pub max_temperature: f64,
    pub grid_box: GridBox,
    /// The geographic extent of the pixel centers.
    pub bounds: BoundingBox,
    pub core: CoreDescriptor,
    pub precipitation: Option<PrecipStats>,
}

impl CloudElement {
    pub fn frame(&self) -> usize {
        self.id.frame as usize
    }
}

/// The link between two cloud elements in consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Overlap area divided by the area of the parent.
    pub parent_fraction: f64,
    /// Overlap area divided by the area of the child.
    pub child_fraction: f64,
    pub overlap_km2: f64,
}
