/*!
 * Stage A, load brightness temperature imagery into a time ordered cube.
 *
 * A data directory holds exactly one control file (see [control_file]) describing the binary
 * layout of every data file next to it. The valid time of each data file is parsed from its name.
 */
use crate::{
    error::InputFormatError,
    geo::BoundingBox,
    grid::{Grid, GridWindow},
    MccResult,
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

pub mod control_file;
mod timestamp;

use control_file::ControlFile;
pub use timestamp::find_start_time;

/**
 * A single gridded field at one valid time.
 *
 * Brightness temperature frames hold kelvin, precipitation frames hold mm/h. Pixels that were not
 * observed are flagged in the validity mask and hold NaN.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    time: DateTime<Utc>,
    values: Vec<f32>,
    valid: Vec<bool>,
}

impl Frame {
    pub fn new(time: DateTime<Utc>, values: Vec<f32>, valid: Vec<bool>) -> Self {
        debug_assert_eq!(values.len(), valid.len());
        Frame {
            time,
            values,
            valid,
        }
    }

    /// Build a frame where every non-finite value is treated as missing.
    pub fn from_values(time: DateTime<Utc>, values: Vec<f32>) -> Self {
        let valid = values.iter().map(|v| v.is_finite()).collect();
        Frame {
            time,
            values,
            valid,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn is_valid(&self, index: usize) -> bool {
        self.valid[index]
    }

    /// The value at a pixel if it was observed.
    #[inline]
    pub fn value(&self, index: usize) -> Option<f32> {
        if self.valid[index] {
            Some(self.values[index])
        } else {
            None
        }
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    fn clip(self, full_ncols: usize, window: GridWindow) -> Self {
        let mut values = Vec::with_capacity(window.nrows() * window.ncols());
        let mut valid = Vec::with_capacity(window.nrows() * window.ncols());

        for row in window.row_start..window.row_end {
            let start = row * full_ncols + window.col_start;
            let end = row * full_ncols + window.col_end;
            values.extend_from_slice(&self.values[start..end]);
            valid.extend_from_slice(&self.valid[start..end]);
        }

        Frame {
            time: self.time,
            values,
            valid,
        }
    }
}

/// Brightness temperature frames on a common grid at a uniform time interval.
#[derive(Debug, Clone)]
pub struct FrameCube {
    grid: Grid,
    frames: Vec<Frame>,
    interval: Duration,
}

impl FrameCube {
    /// Assemble a cube, checking that every frame covers the grid and the times are uniformly
    /// spaced by `interval`.
    pub fn new(grid: Grid, frames: Vec<Frame>, interval: Duration) -> MccResult<Self> {
        if frames.is_empty() {
            return Err("no frames in the cube".into());
        }

        if interval <= Duration::zero() {
            return Err("frame interval must be positive".into());
        }

        for frame in &frames {
            if frame.len() != grid.len() {
                return Err(format!(
                    "frame at {} has {} pixels, the grid has {}",
                    frame.time(),
                    frame.len(),
                    grid.len()
                )
                .into());
            }
        }

        for pair in frames.windows(2) {
            if pair[1].time() - pair[0].time() != interval {
                return Err(format!(
                    "frame at {} does not follow {} by {} minutes",
                    pair[1].time(),
                    pair[0].time(),
                    interval.num_minutes()
                )
                .into());
            }
        }

        Ok(FrameCube {
            grid,
            frames,
            interval,
        })
    }

    /// Replace the grid derived pixel area.
    pub fn with_cell_area(mut self, cell_area_km2: f64) -> Self {
        self.grid = self.grid.with_cell_area(cell_area_km2);
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time between consecutive frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The valid time of every frame.
    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.frames.iter().map(|f| f.time()).collect()
    }
}

/// Supplies precipitation co-registered with the brightness temperature frames.
pub trait PrecipitationSource {
    /// The precipitation frame for the brightness temperature frame at `time_index`, if there is
    /// one.
    fn precipitation(&self, time_index: usize) -> Option<Frame>;
}

/// A source with no precipitation at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrecipitation;

impl PrecipitationSource for NoPrecipitation {
    fn precipitation(&self, _time_index: usize) -> Option<Frame> {
        None
    }
}

impl<F> PrecipitationSource for F
where
    F: Fn(usize) -> Option<Frame>,
{
    fn precipitation(&self, time_index: usize) -> Option<Frame> {
        self(time_index)
    }
}

/// Precipitation already in memory, one optional frame per time index.
#[derive(Debug, Clone, Default)]
pub struct PrecipitationFrames(pub Vec<Option<Frame>>);

impl PrecipitationSource for PrecipitationFrames {
    fn precipitation(&self, time_index: usize) -> Option<Frame> {
        self.0.get(time_index).cloned().flatten()
    }
}

/**
 * Precipitation frames loaded from disk as they are requested.
 *
 * Precipitation archives are usually coarser in time than the imagery, so the frame used for an
 * image is the latest one at or before the image time that still covers it.
 */
#[derive(Debug)]
pub struct PrecipitationArchive {
    control: ControlFile,
    full_ncols: usize,
    window: Option<GridWindow>,
    /// Valid time, file, and frame within the file, sorted by time.
    entries: Vec<(DateTime<Utc>, PathBuf, usize)>,
    image_times: Vec<DateTime<Utc>>,
}

impl PrecipitationArchive {
    /// Number of precipitation frames available.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn load(&self, path: &Path, frame: usize, time: DateTime<Utc>) -> MccResult<Frame> {
        let frame_bytes = self.control.frame_bytes();
        let mut buf = vec![0u8; frame_bytes];

        let mut f = File::open(path)?;
        f.seek(SeekFrom::Start((frame * frame_bytes) as u64))?;
        f.read_exact(&mut buf)?;

        let (mut values, mut valid) = self.control.decode_frame(&buf);
        for (val, ok) in values.iter_mut().zip(valid.iter_mut()) {
            if *ok && *val < 0.0 {
                *val = f32::NAN;
                *ok = false;
            }
        }

        let frame = Frame::new(time, values, valid);
        Ok(match self.window {
            Some(window) => frame.clip(self.full_ncols, window),
            None => frame,
        })
    }
}

impl PrecipitationSource for PrecipitationArchive {
    fn precipitation(&self, time_index: usize) -> Option<Frame> {
        let time = *self.image_times.get(time_index)?;

        let pos = self.entries.partition_point(|(t, _, _)| *t <= time);
        if pos == 0 {
            debug!("no precipitation at or before {}", time);
            return None;
        }

        let (valid_time, path, frame) = &self.entries[pos - 1];
        if time - *valid_time >= self.control.step {
            debug!("no precipitation covering {}", time);
            return None;
        }

        match self.load(path, *frame, *valid_time) {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!("unable to load precipitation from {}: {}", path.display(), err);
                None
            }
        }
    }
}

/// The products of the Reader.
pub struct ReaderOutput {
    pub cube: FrameCube,
    pub precipitation: Box<dyn PrecipitationSource>,
}

/**
 * Load every brightness temperature frame in a directory.
 *
 * # Arguments
 * * ir_dir - directory with the control file and the brightness temperature files.
 * * precip_dir - optional directory with the control file and precipitation files on the same
 *   grid.
 * * domain - optional bounds, only grid points inside them are kept.
 *
 * # Returns
 * The cube and a precipitation source that always has the same shape as the cube frames. Every
 * error names the file that caused it.
 */
pub fn read_directory(
    ir_dir: &Path,
    precip_dir: Option<&Path>,
    domain: Option<BoundingBox>,
) -> MccResult<ReaderOutput> {
    let (ctl_path, files) = scan_directory(ir_dir)?;
    let ctl = ControlFile::open(&ctl_path)?;
    let full_grid = ctl
        .grid()
        .map_err(|err| InputFormatError::new(&ctl_path, err.to_string()))?;

    let window = match domain {
        Some(domain) => Some(full_grid.window(domain).ok_or_else(|| {
            InputFormatError::new(&ctl_path, "the domain does not overlap the grid")
        })?),
        None => None,
    };

    let grid = match window {
        Some(window) => full_grid.subgrid(window),
        None => full_grid.clone(),
    };

    let frame_bytes = ctl.frame_bytes();
    let expected_bytes = frame_bytes * ctl.frames_per_file;

    let mut frames: Vec<Frame> = Vec::with_capacity(files.len() * ctl.frames_per_file);
    for (file_time, path) in &files {
        let bytes = std::fs::read(path)
            .map_err(|err| InputFormatError::new(path, format!("unable to read: {}", err)))?;

        if bytes.len() != expected_bytes {
            return Err(InputFormatError::new(
                path,
                format!("expected {} bytes, found {}", expected_bytes, bytes.len()),
            )
            .into());
        }

        for (k, chunk) in bytes.chunks_exact(frame_bytes).enumerate() {
            let time = *file_time + ctl.step * k as i32;

            if let Some(prev) = frames.last() {
                if time - prev.time() != ctl.step {
                    return Err(InputFormatError::new(
                        path,
                        format!(
                            "frame at {} does not follow {} by {} minutes",
                            time,
                            prev.time(),
                            ctl.step.num_minutes()
                        ),
                    )
                    .into());
                }
            }

            let (values, valid) = ctl.decode_frame(chunk);
            let frame = Frame::new(time, values, valid);
            frames.push(match window {
                Some(window) => frame.clip(full_grid.ncols(), window),
                None => frame,
            });
        }
    }

    info!(
        "loaded {} frames from {} files in {}",
        frames.len(),
        files.len(),
        ir_dir.display()
    );

    let image_times: Vec<DateTime<Utc>> = frames.iter().map(|f| f.time()).collect();
    let cube = FrameCube::new(grid, frames, ctl.step)
        .map_err(|err| InputFormatError::new(ir_dir, err.to_string()))?;

    let precipitation: Box<dyn PrecipitationSource> = match precip_dir {
        Some(precip_dir) => Box::new(open_precipitation(
            precip_dir,
            &full_grid,
            window,
            image_times,
        )?),
        None => Box::new(NoPrecipitation),
    };

    Ok(ReaderOutput {
        cube,
        precipitation,
    })
}

fn open_precipitation(
    dir: &Path,
    image_grid: &Grid,
    window: Option<GridWindow>,
    image_times: Vec<DateTime<Utc>>,
) -> MccResult<PrecipitationArchive> {
    let (ctl_path, files) = scan_directory(dir)?;
    let control = ControlFile::open(&ctl_path)?;
    let grid = control
        .grid()
        .map_err(|err| InputFormatError::new(&ctl_path, err.to_string()))?;

    if !grid.same_points(image_grid, 1.0e-4) {
        return Err(InputFormatError::new(
            &ctl_path,
            "the precipitation grid does not match the brightness temperature grid",
        )
        .into());
    }

    let expected_bytes = (control.frame_bytes() * control.frames_per_file) as u64;
    let mut entries = Vec::with_capacity(files.len() * control.frames_per_file);
    for (file_time, path) in files {
        let size = std::fs::metadata(&path)
            .map_err(|err| InputFormatError::new(&path, format!("unable to read: {}", err)))?
            .len();

        if size != expected_bytes {
            return Err(InputFormatError::new(
                &path,
                format!("expected {} bytes, found {}", expected_bytes, size),
            )
            .into());
        }

        for k in 0..control.frames_per_file {
            entries.push((file_time + control.step * k as i32, path.clone(), k));
        }
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for pair in entries.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(
                InputFormatError::new(&pair[1].1, format!("duplicate time {}", pair[1].0)).into(),
            );
        }
    }

    info!(
        "found {} precipitation frames in {}",
        entries.len(),
        dir.display()
    );

    Ok(PrecipitationArchive {
        control,
        full_ncols: image_grid.ncols(),
        window,
        entries,
        image_times,
    })
}

/// Find the control file and the time stamped data files in a directory.
fn scan_directory(dir: &Path) -> MccResult<(PathBuf, Vec<(DateTime<Utc>, PathBuf)>)> {
    let mut control_files = vec![];
    let mut data_files = vec![];

    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| InputFormatError::new(dir, err.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let fname = match path.file_name().and_then(|f| f.to_str()) {
            Some(fname) => fname,
            None => continue,
        };

        if fname.starts_with('.') {
            continue;
        }

        let is_control = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("ctl"))
            .unwrap_or(false);

        if is_control {
            control_files.push(path);
        } else if let Some(time) = find_start_time(fname) {
            data_files.push((time, path));
        } else {
            warn!("skipping {}, no time in the file name", path.display());
        }
    }

    let ctl_path = match control_files.as_slice() {
        [ctl_path] => ctl_path.clone(),
        [] => return Err(InputFormatError::new(dir, "no control file").into()),
        _ => return Err(InputFormatError::new(dir, "more than one control file").into()),
    };

    if data_files.is_empty() {
        return Err(InputFormatError::new(dir, "no data files").into());
    }

    data_files.sort_by(|a, b| a.0.cmp(&b.0));

    Ok((ctl_path, data_files))
}
