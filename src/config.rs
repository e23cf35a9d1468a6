/*!
 * Thresholds and switches that control the search.
 *
 * A single [SearchConfig] is built once (usually from the command line) and handed by reference
 * to every stage of the pipeline.
 */
use crate::geo::BoundingBox;
use chrono::Duration;
use std::fmt::{self, Display};

/// The pixel neighborhood used when labeling connected regions of cold pixels.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum Connectivity {
    /// Only the pixels directly north, south, east, and west are neighbors.
    #[strum(serialize = "4")]
    Four,
    /// Diagonal pixels are also neighbors.
    #[strum(serialize = "8")]
    Eight,
}

impl Default for Connectivity {
    fn default() -> Self {
        Connectivity::Eight
    }
}

/// Every tunable value used by the search.
///
/// Temperatures are in kelvin, areas in square kilometers, and durations are wall clock time.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Pixels at or below this brightness temperature are part of a cloud element.
    pub t_cold: f64,
    /// Pixels below this brightness temperature are part of the cold core.
    pub t_core: f64,
    /// Minimum area of a cloud element.
    pub a_min: f64,
    /// Minimum area of the cold core of a cloud element.
    pub a_core_min: f64,
    /// Minimum cloud shield area for the MCC size criterion.
    pub a_mcs_size: f64,
    /// Minimum cold core area for the MCC size criterion.
    pub a_mcc_size: f64,
    /// Fraction of the smaller cloud element that must overlap to link two frames.
    pub o_min: f64,
    /// Minimum lifetime of a cluster, and of an MCS track.
    pub d_mcs: Duration,
    /// Minimum time the MCC size criterion must hold without interruption.
    pub d_mcc: Duration,
    /// Minimum cold core extent ratio at the peak of an MCC.
    pub eccentricity_min: f64,
    /// Maximum mean cold core temperature at the peak of an MCC.
    pub t_mcc_peak: f64,
    pub connectivity: Connectivity,
    /// Overrides the grid derived area of a pixel.
    pub cell_area_km2: Option<f64>,
    /// Run the cold core area filter again while pruning the graph.
    pub recheck_core: bool,
    /// Stop enumerating tracks in a cluster after this many.
    pub max_paths_per_cluster: usize,
    /// Only keep the part of the grid inside this box.
    pub domain: Option<BoundingBox>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            t_cold: 241.0,
            t_core: 221.0,
            a_min: 2_400.0,
            a_core_min: 1_600.0,
            a_mcs_size: 100_000.0,
            a_mcc_size: 50_000.0,
            o_min: 0.5,
            d_mcs: Duration::hours(3),
            d_mcc: Duration::hours(6),
            eccentricity_min: 0.7,
            t_mcc_peak: 233.0,
            connectivity: Connectivity::Eight,
            cell_area_km2: None,
            recheck_core: false,
            max_paths_per_cluster: 10_000,
            domain: None,
        }
    }
}

impl Display for SearchConfig {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "         T cold: {:.1} K", self.t_cold)?;
        writeln!(f, "         T core: {:.1} K", self.t_core)?;
        writeln!(f, "          A min: {:.0} km^2", self.a_min)?;
        writeln!(f, "     A core min: {:.0} km^2", self.a_core_min)?;
        writeln!(f, "     A MCS size: {:.0} km^2", self.a_mcs_size)?;
        writeln!(f, "     A MCC size: {:.0} km^2", self.a_mcc_size)?;
        writeln!(f, "          O min: {:.2}", self.o_min)?;
        writeln!(f, "          D MCS: {} min", self.d_mcs.num_minutes())?;
        writeln!(f, "          D MCC: {} min", self.d_mcc.num_minutes())?;
        writeln!(f, "   Eccentricity: {:.2}", self.eccentricity_min)?;
        writeln!(f, "     T MCC peak: {:.1} K", self.t_mcc_peak)?;
        writeln!(f, "   Connectivity: {}", self.connectivity)?;
        match self.cell_area_km2 {
            Some(area) => writeln!(f, "      Cell area: {:.2} km^2", area)?,
            None => writeln!(f, "      Cell area: from grid")?,
        }
        writeln!(f, "   Recheck core: {}", self.recheck_core)?;
        writeln!(f, "      Max paths: {}", self.max_paths_per_cluster)?;
        if let Some(domain) = self.domain {
            writeln!(
                f,
                "         Domain: {:.3},{:.3} to {:.3},{:.3}",
                domain.ll.lat, domain.ll.lon, domain.ur.lat, domain.ur.lon
            )?;
        }

        Ok(())
    }
}
