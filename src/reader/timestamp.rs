use chrono::{DateTime, NaiveDate, Utc};

/// Find the valid time encoded in a data file name.
///
/// The first run of at least 10 digits is read as `YYYYMMDDHH`, or as `YYYYMMDDHHMM` when the run
/// has 12 or more digits, e.g. `merg_2006091100_4km-pixel` or `3B42.200609110300.7A`.
pub fn find_start_time(fname: &str) -> Option<DateTime<Utc>> {
    let bytes = fname.as_bytes();

    let mut start = 0;
    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() {
            start += 1;
            continue;
        }

        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }

        if end - start >= 10 {
            // All ASCII digits, so the slice is on char boundaries.
            return parse_digits(&fname[start..end]);
        }

        start = end;
    }

    None
}

fn parse_digits(digits: &str) -> Option<DateTime<Utc>> {
    let year: i32 = digits[0..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    let day: u32 = digits[6..8].parse().ok()?;
    let hour: u32 = digits[8..10].parse().ok()?;
    let minute: u32 = if digits.len() >= 12 {
        digits[10..12].parse().ok()?
    } else {
        0
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(DateTime::<Utc>::from_utc(naive, Utc))
}
