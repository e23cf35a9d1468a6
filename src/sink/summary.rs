use crate::{
    cloud_element::NodeTable,
    geo::great_circle_distance,
    mcc::{Classification, Track},
};
use chrono::{DateTime, Duration, Utc};
use std::fmt::{self, Display};

/// Statistics describing a single track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    pub track_id: usize,
    pub cluster: usize,
    pub classification: Classification,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub lifetime: Duration,
    pub frames: usize,
    pub peak_area_km2: f64,
    pub peak_area_time: DateTime<Utc>,
    pub peak_core_area_km2: f64,
    pub peak_core_time: DateTime<Utc>,
    /// Extent ratio of the cold core at the frame with the largest core.
    pub eccentricity_at_peak: f64,
    /// Coldest pixel anywhere along the track in kelvin.
    pub min_temperature: f64,
    /// Precipitation volume summed over the frames that had precipitation, in mm km^2.
    ///
    /// Frames without precipitation data add nothing, so the sum is partial whenever
    /// `precipitation_frames` is less than `frames`. `None` if no frame had any.
    pub total_precipitation: Option<f64>,
    /// Number of frames with precipitation data.
    pub precipitation_frames: usize,
    /// Largest rain rate anywhere along the track in mm/h.
    pub max_precipitation_rate: Option<f64>,
    /// Smallest rain rate above zero anywhere along the track in mm/h.
    pub min_precipitation_rate: Option<f64>,
    /// Mean raining area over the frames with precipitation in km^2.
    pub mean_raining_area_km2: Option<f64>,
    /// Mean fraction of the cloud element area that is raining during the mature stage.
    pub mature_raining_fraction: Option<f64>,
    /// Mean speed of the centroid in km/h, needs at least two frames.
    pub mean_speed_kmh: Option<f64>,
    /// First and last valid time of the mature stage of an MCC.
    pub mature: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl TrackSummary {
    /// Summarize a track, returns `None` if any of its cloud elements are unknown.
    pub fn new(track: &Track, nodes: &NodeTable, interval: Duration) -> Option<Self> {
        let ces = track
            .nodes
            .iter()
            .map(|id| nodes.get(*id))
            .collect::<Option<Vec<_>>>()?;

        let first = *ces.first()?;

        let mut peak_area = first;
        let mut peak_core = first;
        let mut min_temperature = f64::INFINITY;
        let mut total_precipitation: Option<f64> = None;
        let mut precipitation_frames = 0;
        let mut max_precipitation_rate: Option<f64> = None;
        let mut min_precipitation_rate: Option<f64> = None;
        let mut raining_area = 0.0;

        for &ce in &ces {
            if ce.area_km2 > peak_area.area_km2 {
                peak_area = ce;
            }

            if ce.core.area_km2 > peak_core.core.area_km2 {
                peak_core = ce;
            }

            min_temperature = min_temperature.min(ce.min_temperature);

            if let Some(precip) = ce.precipitation {
                precipitation_frames += 1;
                raining_area += precip.raining_area_km2;
                *total_precipitation.get_or_insert(0.0) += precip.total_volume;

                let max_rate = max_precipitation_rate.get_or_insert(0.0);
                *max_rate = max_rate.max(precip.max_rate);

                let min_rate = min_precipitation_rate.get_or_insert(0.0);
                if precip.min_rate > 0.0 && (*min_rate == 0.0 || precip.min_rate < *min_rate) {
                    *min_rate = precip.min_rate;
                }
            }
        }

        let mean_raining_area_km2 = if precipitation_frames > 0 {
            Some(raining_area / precipitation_frames as f64)
        } else {
            None
        };

        let mean_speed_kmh = if ces.len() > 1 {
            let distance: f64 = ces
                .windows(2)
                .map(|pair| {
                    great_circle_distance(
                        pair[0].centroid.lat,
                        pair[0].centroid.lon,
                        pair[1].centroid.lat,
                        pair[1].centroid.lon,
                    )
                })
                .sum();

            let hours = (ces.len() - 1) as f64 * interval.num_seconds() as f64 / 3600.0;
            Some(distance / hours)
        } else {
            None
        };

        let mature = track
            .mature
            .and_then(|m| Some((ces.get(m.first)?.time, ces.get(m.last)?.time)));

        let mature_raining_fraction = track.mature.and_then(|m| {
            let fractions = ces
                .iter()
                .skip(m.first)
                .take((m.last + 1).saturating_sub(m.first))
                .filter(|ce| ce.area_km2 > 0.0)
                .filter_map(|ce| Some(ce.precipitation?.raining_area_km2 / ce.area_km2));
            mean(fractions)
        });

        Some(TrackSummary {
            track_id: track.id,
            cluster: track.cluster,
            classification: track.classification,
            start: track.start,
            end: track.end,
            lifetime: track.duration(interval),
            frames: track.len(),
            peak_area_km2: peak_area.area_km2,
            peak_area_time: peak_area.time,
            peak_core_area_km2: peak_core.core.area_km2,
            peak_core_time: peak_core.time,
            eccentricity_at_peak: peak_core.core.eccentricity,
            min_temperature,
            total_precipitation,
            precipitation_frames,
            max_precipitation_rate,
            min_precipitation_rate,
            mean_raining_area_km2,
            mature_raining_fraction,
            mean_speed_kmh,
            mature,
        })
    }
}

/// Mean of the values, `None` if there are none.
fn mean<I: IntoIterator<Item = f64>>(vals: I) -> Option<f64> {
    let (sum, count) = vals
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count > 0 {
        Some(sum / count as f64)
    } else {
        None
    }
}

fn fmt_optional(val: Option<f64>, precision: usize) -> String {
    match val {
        Some(val) => format!("{:.*}", precision, val),
        None => "n/a".to_owned(),
    }
}

impl Display for TrackSummary {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "{} track {} (cluster {})", self.classification, self.track_id, self.cluster)?;
        writeln!(f, "                 Start: {}", self.start)?;
        writeln!(f, "                   End: {}", self.end)?;
        writeln!(f, "              Lifetime: {:.1} h ({} frames)",
            self.lifetime.num_minutes() as f64 / 60.0, self.frames)?;
        writeln!(f, "             Peak area: {:.0} km^2 at {}", self.peak_area_km2, self.peak_area_time)?;
        writeln!(f, "        Peak core area: {:.0} km^2 at {}",
            self.peak_core_area_km2, self.peak_core_time)?;
        writeln!(f, "  Eccentricity at peak: {:.2}", self.eccentricity_at_peak)?;
        writeln!(f, "      Min. temperature: {:.1} K", self.min_temperature)?;
        writeln!(f, "   Total precipitation: {} mm km^2 ({} of {} frames)",
            fmt_optional(self.total_precipitation, 1), self.precipitation_frames, self.frames)?;
        writeln!(f, "        Max. rain rate: {} mm/h", fmt_optional(self.max_precipitation_rate, 2))?;
        writeln!(f, "        Min. rain rate: {} mm/h", fmt_optional(self.min_precipitation_rate, 2))?;
        writeln!(f, "   Mean raining area: {} km^2", fmt_optional(self.mean_raining_area_km2, 0))?;
        writeln!(f, "  Mature raining area: {} %",
            fmt_optional(self.mature_raining_fraction.map(|v| v * 100.0), 1))?;
        writeln!(f, "            Mean speed: {} km/h", fmt_optional(self.mean_speed_kmh, 1))?;
        if let Some((start, end)) = self.mature {
            writeln!(f, "          Mature stage: {} to {}", start, end)?;
        }
        Ok(())
    }
}

/// Statistics describing all the tracks in one list.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStatistics {
    pub count: usize,
    pub longest: Option<Duration>,
    pub shortest: Option<Duration>,
    pub average_duration: Option<Duration>,
    /// Mean cloud element area over every frame of every track.
    pub average_area_km2: Option<f64>,
    /// Mean of the largest area each track reached.
    pub average_max_area_km2: Option<f64>,
    /// Mean, fastest, and slowest of the track mean speeds in km/h.
    pub average_speed_kmh: Option<f64>,
    pub max_speed_kmh: Option<f64>,
    pub min_speed_kmh: Option<f64>,
    /// Precipitation volume summed over every track that had precipitation.
    pub total_precipitation: Option<f64>,
    /// Mean raining area of the tracks with precipitation.
    pub average_precipitation_area_km2: Option<f64>,
    /// Mean percentage of the mature systems' area that is raining.
    pub mature_precipitation_area_percent: Option<f64>,
    /// Means of the smallest and largest rain rates of each track in mm/h.
    pub average_min_precipitation_rate: Option<f64>,
    pub average_max_precipitation_rate: Option<f64>,
}

impl FeatureStatistics {
    pub fn new(summaries: &[TrackSummary], tracks: &[Track], nodes: &NodeTable) -> Self {
        let count = summaries.len();

        let longest = summaries.iter().map(|s| s.lifetime).max();
        let shortest = summaries.iter().map(|s| s.lifetime).min();
        let average_duration = if count > 0 {
            let total: i64 = summaries.iter().map(|s| s.lifetime.num_seconds()).sum();
            Some(Duration::seconds(total / count as i64))
        } else {
            None
        };

        let areas: Vec<f64> = tracks
            .iter()
            .flat_map(|t| t.nodes.iter())
            .filter_map(|id| nodes.get(*id))
            .map(|ce| ce.area_km2)
            .collect();
        let average_area_km2 = mean(areas);

        let average_max_area_km2 = mean(summaries.iter().map(|s| s.peak_area_km2));

        let speeds: Vec<f64> = summaries.iter().filter_map(|s| s.mean_speed_kmh).collect();
        let average_speed_kmh = mean(speeds.iter().copied());
        let max_speed_kmh = speeds.iter().copied().reduce(f64::max);
        let min_speed_kmh = speeds.iter().copied().reduce(f64::min);

        let total_precipitation = summaries
            .iter()
            .filter_map(|s| s.total_precipitation)
            .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v));

        let average_precipitation_area_km2 =
            mean(summaries.iter().filter_map(|s| s.mean_raining_area_km2));
        let mature_precipitation_area_percent = mean(
            summaries
                .iter()
                .filter_map(|s| s.mature_raining_fraction)
                .map(|v| v * 100.0),
        );
        let average_min_precipitation_rate =
            mean(summaries.iter().filter_map(|s| s.min_precipitation_rate));
        let average_max_precipitation_rate =
            mean(summaries.iter().filter_map(|s| s.max_precipitation_rate));

        FeatureStatistics {
            count,
            longest,
            shortest,
            average_duration,
            average_area_km2,
            average_max_area_km2,
            average_speed_kmh,
            max_speed_kmh,
            min_speed_kmh,
            total_precipitation,
            average_precipitation_area_km2,
            mature_precipitation_area_percent,
            average_min_precipitation_rate,
            average_max_precipitation_rate,
        }
    }
}

fn fmt_hours(val: Option<Duration>) -> String {
    match val {
        Some(val) => format!("{:.1} h", val.num_minutes() as f64 / 60.0),
        None => "n/a".to_owned(),
    }
}

impl Display for FeatureStatistics {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "                Number of tracks: {}", self.count)?;
        writeln!(f, "                Longest duration: {}", fmt_hours(self.longest))?;
        writeln!(f, "               Shortest duration: {}", fmt_hours(self.shortest))?;
        writeln!(f, "                Average duration: {}", fmt_hours(self.average_duration))?;
        writeln!(f, "                    Average area: {} km^2", fmt_optional(self.average_area_km2, 0))?;
        writeln!(f, "            Average maximum area: {} km^2", fmt_optional(self.average_max_area_km2, 0))?;
        writeln!(f, "                   Average speed: {} km/h", fmt_optional(self.average_speed_kmh, 1))?;
        writeln!(f, "                   Maximum speed: {} km/h", fmt_optional(self.max_speed_kmh, 1))?;
        writeln!(f, "                   Minimum speed: {} km/h", fmt_optional(self.min_speed_kmh, 1))?;
        writeln!(f, "             Total precipitation: {} mm km^2", fmt_optional(self.total_precipitation, 1))?;
        writeln!(f, "      Average precipitation area: {} km^2",
            fmt_optional(self.average_precipitation_area_km2, 0))?;
        writeln!(f, "  Mature precipitation area pct.: {} %",
            fmt_optional(self.mature_precipitation_area_percent, 1))?;
        writeln!(f, "       Average min. rain rate: {} mm/h",
            fmt_optional(self.average_min_precipitation_rate, 2))?;
        writeln!(f, "       Average max. rain rate: {} mm/h",
            fmt_optional(self.average_max_precipitation_rate, 2))?;
        Ok(())
    }
}
