/*!
 * A small subset of the GrADS data descriptor ("control file") format.
 *
 * Only the entries needed to decode a directory of flat binary grids are understood, everything
 * else is ignored so control files written for GrADS can be used as is.
 */
use crate::{error::InputFormatError, grid::Grid, MccResult};
use chrono::Duration;
use std::path::Path;

/// How values are stored in the data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Byte,
    Int16,
    Float32,
}

impl DataType {
    pub fn size(self) -> usize {
        match self {
            DataType::Byte => 1,
            DataType::Int16 => 2,
            DataType::Float32 => 4,
        }
    }
}

/// The decoded contents of a control file.
#[derive(Debug, Clone)]
pub struct ControlFile {
    /// Longitudes of the columns.
    pub lons: Vec<f64>,
    /// Latitudes of the rows in the order they are stored.
    pub lats: Vec<f64>,
    /// Number of frames stored back to back in each data file.
    pub frames_per_file: usize,
    /// Time between frames.
    pub step: Duration,
    /// Value (after scale and offset) that marks a missing pixel.
    pub undef: Option<f64>,
    /// Rows are stored north to south.
    pub yrev: bool,
    pub big_endian: bool,
    pub dtype: DataType,
    pub scale: f64,
    pub offset: f64,
}

impl ControlFile {
    /// Load and parse a control file.
    pub fn open<P: AsRef<Path>>(path: P) -> MccResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| InputFormatError::new(path, format!("unable to read: {}", err)))?;

        let ctl = Self::parse(&text).map_err(|msg| InputFormatError::new(path, msg))?;
        Ok(ctl)
    }

    /// Parse the text of a control file.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut lons: Option<Vec<f64>> = None;
        let mut lats: Option<Vec<f64>> = None;
        let mut tdef: Option<(usize, Duration)> = None;
        let mut undef = None;
        let mut yrev = false;
        let mut big_endian = false;
        let mut dtype = DataType::Byte;
        let mut scale = 1.0;
        let mut offset = 0.0;

        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('*'))
            .peekable();

        while let Some(line) = lines.next() {
            let mut tokens = line.split_whitespace();
            let keyword = match tokens.next() {
                Some(kw) => kw.to_ascii_uppercase(),
                None => continue,
            };
            let rest: Vec<&str> = tokens.collect();

            match keyword.as_str() {
                "XDEF" | "YDEF" => {
                    let mut values = parse_dimension(&keyword, &rest)?;

                    // LEVELS may continue onto the following lines.
                    let expected = parse_count(&keyword, &rest)?;
                    while values.len() < expected {
                        let next = match lines.peek() {
                            Some(next) if is_numeric_line(next) => lines.next().unwrap_or(""),
                            _ => break,
                        };
                        for token in next.split_whitespace() {
                            values.push(parse_f64(&keyword, token)?);
                        }
                    }

                    if values.len() != expected {
                        return Err(format!(
                            "{} declares {} values but {} were given",
                            keyword,
                            expected,
                            values.len()
                        ));
                    }

                    if keyword == "XDEF" {
                        lons = Some(values);
                    } else {
                        lats = Some(values);
                    }
                }
                "TDEF" => {
                    let count = parse_count(&keyword, &rest)?;
                    let step = rest
                        .last()
                        .ok_or_else(|| "TDEF is missing the time increment".to_owned())
                        .and_then(|tkn| parse_increment(tkn))?;
                    tdef = Some((count, step));
                }
                "UNDEF" => {
                    let val = rest
                        .first()
                        .ok_or_else(|| "UNDEF is missing a value".to_owned())?;
                    undef = Some(parse_f64(&keyword, val)?);
                }
                "OPTIONS" => {
                    for opt in rest {
                        match opt.to_ascii_lowercase().as_str() {
                            "yrev" => yrev = true,
                            "big_endian" => big_endian = true,
                            "little_endian" => big_endian = false,
                            _ => {}
                        }
                    }
                }
                "DTYPE" => {
                    let val = rest
                        .first()
                        .ok_or_else(|| "DTYPE is missing a value".to_owned())?;
                    dtype = match val.to_ascii_lowercase().as_str() {
                        "byte" | "uint8" => DataType::Byte,
                        "int16" | "short" => DataType::Int16,
                        "float32" | "float" => DataType::Float32,
                        other => return Err(format!("unsupported DTYPE {}", other)),
                    };
                }
                "SCALE" => {
                    let val = rest
                        .first()
                        .ok_or_else(|| "SCALE is missing a value".to_owned())?;
                    scale = parse_f64(&keyword, val)?;
                }
                "OFFSET" => {
                    let val = rest
                        .first()
                        .ok_or_else(|| "OFFSET is missing a value".to_owned())?;
                    offset = parse_f64(&keyword, val)?;
                }
                _ => {}
            }
        }

        let lons = lons.ok_or_else(|| "missing XDEF".to_owned())?;
        let lats = lats.ok_or_else(|| "missing YDEF".to_owned())?;
        let (frames_per_file, step) = tdef.ok_or_else(|| "missing TDEF".to_owned())?;

        if frames_per_file == 0 {
            return Err("TDEF must declare at least one frame per file".to_owned());
        }

        if step <= Duration::zero() {
            return Err("TDEF increment must be positive".to_owned());
        }

        Ok(ControlFile {
            lons,
            lats,
            frames_per_file,
            step,
            undef,
            yrev,
            big_endian,
            dtype,
            scale,
            offset,
        })
    }

    /// The grid described by this control file with latitudes in increasing order.
    pub fn grid(&self) -> MccResult<Grid> {
        let mut lats = self.lats.clone();
        if lats.len() > 1 && lats[0] > lats[lats.len() - 1] {
            lats.reverse();
        }
        Grid::new(lats, self.lons.clone())
    }

    /// Number of bytes in a single frame.
    pub fn frame_bytes(&self) -> usize {
        self.lats.len() * self.lons.len() * self.dtype.size()
    }

    /// Decode the frame starting at the beginning of `bytes`.
    ///
    /// Rows are returned south to north. Missing pixels are flagged `false` in the mask and
    /// given a value of NaN.
    pub fn decode_frame(&self, bytes: &[u8]) -> (Vec<f32>, Vec<bool>) {
        let nx = self.lons.len();
        let ny = self.lats.len();
        let size = self.dtype.size();

        let mut values = Vec::with_capacity(nx * ny);
        let mut valid = Vec::with_capacity(nx * ny);

        // Rows come out of the file in storage order, flip them if they were stored north first.
        let north_first = self.yrev || (ny > 1 && self.lats[0] > self.lats[ny - 1]);

        for out_row in 0..ny {
            let file_row = if north_first { ny - 1 - out_row } else { out_row };
            let row_start = file_row * nx * size;

            for col in 0..nx {
                let pos = row_start + col * size;
                let raw = self.decode_value(&bytes[pos..(pos + size)]);

                let val = raw * self.scale + self.offset;
                let is_missing = !val.is_finite()
                    || self
                        .undef
                        .map(|undef| self.matches_undef(raw, val, undef))
                        .unwrap_or(false);

                if is_missing {
                    values.push(f32::NAN);
                    valid.push(false);
                } else {
                    values.push(val as f32);
                    valid.push(true);
                }
            }
        }

        (values, valid)
    }

    /// Check a decoded value against the missing value marker.
    ///
    /// Float32 files can only hold the marker to single precision, so the comparison is done in
    /// `f32` for them. Integer types use a tolerance relative to the size of the marker.
    fn matches_undef(&self, raw: f64, val: f64, undef: f64) -> bool {
        match self.dtype {
            DataType::Float32 => {
                let scaled = (raw as f32) * (self.scale as f32) + (self.offset as f32);
                scaled == undef as f32 || val as f32 == undef as f32
            }
            DataType::Byte | DataType::Int16 => {
                (val - undef).abs() <= 1.0e-6 * undef.abs().max(1.0)
            }
        }
    }

    fn decode_value(&self, bytes: &[u8]) -> f64 {
        match self.dtype {
            DataType::Byte => bytes[0] as f64,
            DataType::Int16 => {
                let buf = [bytes[0], bytes[1]];
                if self.big_endian {
                    i16::from_be_bytes(buf) as f64
                } else {
                    i16::from_le_bytes(buf) as f64
                }
            }
            DataType::Float32 => {
                let buf = [bytes[0], bytes[1], bytes[2], bytes[3]];
                if self.big_endian {
                    f32::from_be_bytes(buf) as f64
                } else {
                    f32::from_le_bytes(buf) as f64
                }
            }
        }
    }
}

fn parse_count(keyword: &str, rest: &[&str]) -> Result<usize, String> {
    rest.first()
        .ok_or_else(|| format!("{} is missing its size", keyword))?
        .parse::<usize>()
        .map_err(|_| format!("{} has an invalid size", keyword))
}

fn parse_f64(keyword: &str, token: &str) -> Result<f64, String> {
    token
        .parse::<f64>()
        .map_err(|_| format!("{} has an invalid number: {}", keyword, token))
}

fn parse_dimension(keyword: &str, rest: &[&str]) -> Result<Vec<f64>, String> {
    let count = parse_count(keyword, rest)?;
    let mapping = rest
        .get(1)
        .ok_or_else(|| format!("{} is missing LINEAR or LEVELS", keyword))?
        .to_ascii_uppercase();

    match mapping.as_str() {
        "LINEAR" => {
            if rest.len() < 4 {
                return Err(format!("{} LINEAR needs a start and an increment", keyword));
            }
            let start = parse_f64(keyword, rest[2])?;
            let step = parse_f64(keyword, rest[3])?;
            Ok((0..count).map(|i| start + step * i as f64).collect())
        }
        "LEVELS" => rest[2..]
            .iter()
            .map(|tkn| parse_f64(keyword, tkn))
            .collect(),
        other => Err(format!("{} mapping {} is not supported", keyword, other)),
    }
}

fn is_numeric_line(line: &str) -> bool {
    line.split_whitespace().all(|tkn| tkn.parse::<f64>().is_ok())
}

/// Parse a GrADS time increment like `30mn`, `1hr`, `3hr` or `1dy`.
fn parse_increment(token: &str) -> Result<Duration, String> {
    let token = token.to_ascii_lowercase();
    let split = token
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("time increment {} has no units", token))?;

    let (num, units) = token.split_at(split);
    let num: i64 = num
        .parse()
        .map_err(|_| format!("invalid time increment {}", token))?;

    match units {
        "mn" => Ok(Duration::minutes(num)),
        "hr" => Ok(Duration::hours(num)),
        "dy" => Ok(Duration::days(num)),
        _ => Err(format!("unsupported time increment units {}", units)),
    }
}
