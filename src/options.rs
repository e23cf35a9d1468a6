/*!
 * Command line options shared by the programs.
 */
use crate::{
    config::{Connectivity, SearchConfig},
    geo::{BoundingBox, Coord},
};
use chrono::Duration;
use clap::Args;

/// The search thresholds, flattened into each program's options.
#[derive(Debug, Clone, Args)]
pub struct SearchOptions {
    /// Pixels at or below this brightness temperature (K) are part of a cloud element.
    #[clap(long, default_value_t = 241.0)]
    pub t_cold: f64,

    /// Pixels colder than this brightness temperature (K) are part of the cold core.
    #[clap(long, default_value_t = 221.0)]
    pub t_core: f64,

    /// Minimum area (km^2) of a cloud element.
    #[clap(long, default_value_t = 2_400.0)]
    pub a_min: f64,

    /// Minimum cold core area (km^2) of a cloud element.
    #[clap(long, default_value_t = 1_600.0)]
    pub a_core_min: f64,

    /// Minimum cloud shield area (km^2) for the MCC size criterion.
    #[clap(long, default_value_t = 100_000.0)]
    pub a_mcs_size: f64,

    /// Minimum cold core area (km^2) for the MCC size criterion.
    #[clap(long, default_value_t = 50_000.0)]
    pub a_mcc_size: f64,

    /// Fraction of a cloud element that must overlap one in the next frame to link them.
    #[clap(long, default_value_t = 0.5)]
    pub o_min: f64,

    /// Minimum lifetime (hours) of a cluster and of an MCS.
    #[clap(long, default_value_t = 3.0)]
    pub d_mcs: f64,

    /// Minimum time (hours) the MCC size criterion must hold.
    #[clap(long, default_value_t = 6.0)]
    pub d_mcc: f64,

    /// Minimum ratio of the cold core's minor to major extent at the peak of an MCC.
    #[clap(long, default_value_t = 0.7)]
    pub eccentricity_min: f64,

    /// Maximum mean cold core temperature (K) at the peak of an MCC.
    #[clap(long, default_value_t = 233.0)]
    pub t_mcc_peak: f64,

    /// Pixel connectivity for grouping cold pixels, 4 or 8.
    #[clap(long, default_value = "8")]
    pub connectivity: Connectivity,

    /// Area of a grid cell (km^2), by default this is derived from the grid spacing.
    #[clap(long)]
    pub cell_area: Option<f64>,

    /// Apply the cold core area test again while pruning clusters.
    #[clap(long)]
    pub recheck_core: bool,

    /// Stop enumerating tracks through a cluster after this many.
    #[clap(long, default_value_t = 10_000)]
    pub max_paths: usize,

    /// Only search inside this box, given as bottom_lat,left_lon,top_lat,right_lon
    #[clap(long, parse(try_from_str=parse_bbox))]
    pub domain: Option<BoundingBox>,
}

impl SearchOptions {
    /// Check the options for consistency and turn them into a configuration.
    pub fn to_config(&self) -> Result<SearchConfig, String> {
        if self.t_core > self.t_cold {
            return Err(format!(
                "core temperature ({}) must not be warmer than the cloud temperature ({})",
                self.t_core, self.t_cold
            ));
        }

        if !(self.o_min > 0.0 && self.o_min <= 1.0) {
            return Err(format!("overlap fraction out of range (0, 1]: {}", self.o_min));
        }

        if self.max_paths == 0 {
            return Err("max-paths must be at least 1".to_owned());
        }

        if let Some(area) = self.cell_area {
            if area <= 0.0 {
                return Err(format!("cell area must be positive: {}", area));
            }
        }

        for (name, value) in [
            ("a-min", self.a_min),
            ("a-core-min", self.a_core_min),
            ("a-mcs-size", self.a_mcs_size),
            ("a-mcc-size", self.a_mcc_size),
            ("d-mcs", self.d_mcs),
            ("d-mcc", self.d_mcc),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(format!("{} must be a non-negative number: {}", name, value));
            }
        }

        Ok(SearchConfig {
            t_cold: self.t_cold,
            t_core: self.t_core,
            a_min: self.a_min,
            a_core_min: self.a_core_min,
            a_mcs_size: self.a_mcs_size,
            a_mcc_size: self.a_mcc_size,
            o_min: self.o_min,
            d_mcs: hours(self.d_mcs),
            d_mcc: hours(self.d_mcc),
            eccentricity_min: self.eccentricity_min,
            t_mcc_peak: self.t_mcc_peak,
            connectivity: self.connectivity,
            cell_area_km2: self.cell_area,
            recheck_core: self.recheck_core,
            max_paths_per_cluster: self.max_paths,
            domain: self.domain,
        })
    }
}

fn hours(h: f64) -> Duration {
    Duration::seconds((h * 3600.0).round() as i64)
}

/// Parse a bounding box argument.
pub fn parse_bbox(bbox_str: &str) -> Result<BoundingBox, String> {
    let corners: Vec<_> = bbox_str.split(',').collect();

    if corners.len() != 4 {
        return Err("Invalid number of coords".to_owned());
    }

    let mut vals = [0.0f64; 4];
    for (val, corner) in vals.iter_mut().zip(&corners) {
        *val = corner
            .trim()
            .parse()
            .map_err(|err| format!("invalid coordinate '{}': {}", corner, err))?;
    }
    let [min_lat, min_lon, max_lat, max_lon] = vals;

    if min_lat >= max_lat || min_lon >= max_lon {
        return Err(format!(
            concat!(
                "Minimum Lat/Lon must be less than Maximum Lat/Lon:",
                " min_lat={} max_lat={} min_lon={} max_lon={}"
            ),
            min_lat, max_lat, min_lon, max_lon
        ));
    }

    if min_lat < -90.0 || max_lat > 90.0 || min_lon < -180.0 || max_lon > 180.0 {
        return Err(format!(
            concat!(
                "Lat/Lon are out of range (-90.0 to 90.0 and -180.0 to 180.0):",
                " min_lat={} max_lat={} min_lon={} max_lon={}"
            ),
            min_lat, max_lat, min_lon, max_lon
        ));
    }

    let ll = Coord {
        lat: min_lat,
        lon: min_lon,
    };
    let ur = Coord {
        lat: max_lat,
        lon: max_lon,
    };

    Ok(BoundingBox { ll, ur })
}
