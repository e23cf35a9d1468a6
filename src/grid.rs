/*!
 * The regular latitude-longitude grid shared by every frame.
 */
use crate::{
    geo::{BoundingBox, Coord, KM_PER_DEGREE},
    MccResult,
};

/**
 * A rectilinear geographic grid.
 *
 * Data on the grid is stored row major, row 0 is the southernmost latitude and column 0 is the
 * westernmost longitude. Pixels are referred to by their flat index `row * ncols + col`.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Strictly increasing latitudes of the rows in degrees.
    lats: Vec<f64>,
    /// Strictly increasing longitudes of the columns in degrees.
    lons: Vec<f64>,
    /// Nominal north-south size of a cell in km.
    cell_height_km: f64,
    /// Nominal east-west size of a cell in km.
    cell_width_km: f64,
    /// Nominal area of a cell in km^2.
    cell_area_km2: f64,
}

/// A rectangular block of rows and columns, end indexes are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl GridWindow {
    pub fn nrows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn ncols(&self) -> usize {
        self.col_end - self.col_start
    }
}

impl Grid {
    /// Build a grid from its coordinate vectors.
    ///
    /// The cell size is derived from the mean spacing of the coordinates, so each vector needs at
    /// least two values.
    pub fn new(lats: Vec<f64>, lons: Vec<f64>) -> MccResult<Self> {
        if lats.len() < 2 || lons.len() < 2 {
            return Err("grid needs at least two latitudes and two longitudes".into());
        }

        if !is_strictly_increasing(&lats) {
            return Err("grid latitudes are not strictly increasing".into());
        }

        if !is_strictly_increasing(&lons) {
            return Err("grid longitudes are not strictly increasing".into());
        }

        if lats.len().saturating_mul(lons.len()) > u32::MAX as usize {
            return Err("grid is too large to index".into());
        }

        let dlat = (lats[lats.len() - 1] - lats[0]) / (lats.len() - 1) as f64;
        let dlon = (lons[lons.len() - 1] - lons[0]) / (lons.len() - 1) as f64;

        let cell_height_km = dlat * KM_PER_DEGREE;
        let cell_width_km = dlon * KM_PER_DEGREE;

        Ok(Grid {
            lats,
            lons,
            cell_height_km,
            cell_width_km,
            cell_area_km2: cell_height_km * cell_width_km,
        })
    }

    /// Replace the grid derived pixel area with a fixed value.
    pub fn with_cell_area(mut self, cell_area_km2: f64) -> Self {
        self.cell_area_km2 = cell_area_km2;
        self
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn nrows(&self) -> usize {
        self.lats.len()
    }

    pub fn ncols(&self) -> usize {
        self.lons.len()
    }

    /// The number of pixels in the grid.
    pub fn len(&self) -> usize {
        self.lats.len() * self.lons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell_area_km2(&self) -> f64 {
        self.cell_area_km2
    }

    pub fn cell_height_km(&self) -> f64 {
        self.cell_height_km
    }

    pub fn cell_width_km(&self) -> f64 {
        self.cell_width_km
    }

    /// Flat index of a row and column.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.lons.len() + col
    }

    /// Row and column of a flat index.
    #[inline]
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.lons.len(), index % self.lons.len())
    }

    /// The coordinate of the center of a pixel.
    pub fn coord(&self, index: usize) -> Coord {
        let (row, col) = self.row_col(index);
        Coord {
            lat: self.lats[row],
            lon: self.lons[col],
        }
    }

    /// Check that another grid describes the same points to within `eps` degrees.
    pub fn same_points(&self, other: &Grid, eps: f64) -> bool {
        self.lats.len() == other.lats.len()
            && self.lons.len() == other.lons.len()
            && self
                .lats
                .iter()
                .zip(other.lats.iter())
                .all(|(a, b)| (a - b).abs() <= eps)
            && self
                .lons
                .iter()
                .zip(other.lons.iter())
                .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Find the rows and columns whose coordinates fall inside `domain`.
    ///
    /// Returns `None` if fewer than two rows or columns would remain.
    pub fn window(&self, domain: BoundingBox) -> Option<GridWindow> {
        let (row_start, row_end) = inside_range(&self.lats, domain.ll.lat, domain.ur.lat)?;
        let (col_start, col_end) = inside_range(&self.lons, domain.ll.lon, domain.ur.lon)?;

        Some(GridWindow {
            row_start,
            row_end,
            col_start,
            col_end,
        })
    }

    /// Build the grid covering a window of this one, keeping the cell size of this grid.
    pub fn subgrid(&self, window: GridWindow) -> Self {
        Grid {
            lats: self.lats[window.row_start..window.row_end].to_vec(),
            lons: self.lons[window.col_start..window.col_end].to_vec(),
            cell_height_km: self.cell_height_km,
            cell_width_km: self.cell_width_km,
            cell_area_km2: self.cell_area_km2,
        }
    }
}

fn is_strictly_increasing(vals: &[f64]) -> bool {
    vals.windows(2).all(|w| w[1] > w[0]) && vals.iter().all(|v| v.is_finite())
}

fn inside_range(vals: &[f64], min: f64, max: f64) -> Option<(usize, usize)> {
    let start = vals.iter().position(|&v| v >= min)?;
    let end = vals.iter().rposition(|&v| v <= max)? + 1;

    if end > start + 1 {
        Some((start, end))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn linear(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_grid_cell_size() {
        let grid = Grid::new(linear(0.0, 0.1, 11), linear(10.0, 0.2, 6)).unwrap();

        assert_eq!(grid.nrows(), 11);
        assert_eq!(grid.ncols(), 6);
        assert_eq!(grid.len(), 66);
        assert!((grid.cell_height_km() - 11.1).abs() < 1.0e-9);
        assert!((grid.cell_width_km() - 22.2).abs() < 1.0e-9);
        assert!((grid.cell_area_km2() - 11.1 * 22.2).abs() < 1.0e-9);

        let grid = grid.with_cell_area(16.0);
        assert_eq!(grid.cell_area_km2(), 16.0);
    }

    #[test]
    fn test_grid_rejects_bad_coordinates() {
        assert!(Grid::new(vec![0.0], linear(0.0, 1.0, 3)).is_err());
        assert!(Grid::new(vec![0.0, 1.0, 1.0], linear(0.0, 1.0, 3)).is_err());
        assert!(Grid::new(vec![2.0, 1.0, 0.0], linear(0.0, 1.0, 3)).is_err());
        assert!(Grid::new(linear(0.0, 1.0, 3), vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_grid_indexing() {
        let grid = Grid::new(linear(-5.0, 1.0, 4), linear(100.0, 0.5, 5)).unwrap();

        let idx = grid.index(2, 3);
        assert_eq!(idx, 13);
        assert_eq!(grid.row_col(idx), (2, 3));

        let coord = grid.coord(idx);
        assert_eq!(coord.lat, -3.0);
        assert_eq!(coord.lon, 101.5);
    }

    #[test]
    fn test_grid_window() {
        let grid = Grid::new(linear(0.0, 1.0, 20), linear(-10.0, 1.0, 21)).unwrap();

        let domain = BoundingBox {
            ll: Coord { lat: 4.5, lon: -5.0 },
            ur: Coord { lat: 10.0, lon: 5.0 },
        };

        let window = grid.window(domain).unwrap();
        assert_eq!(window.row_start, 5);
        assert_eq!(window.row_end, 11);
        assert_eq!(window.col_start, 5);
        assert_eq!(window.col_end, 16);

        let sub = grid.subgrid(window);
        assert_eq!(sub.nrows(), 6);
        assert_eq!(sub.ncols(), 11);
        assert_eq!(sub.lats()[0], 5.0);
        assert_eq!(sub.cell_area_km2(), grid.cell_area_km2());

        let outside = BoundingBox {
            ll: Coord { lat: 50.0, lon: 0.0 },
            ur: Coord { lat: 60.0, lon: 1.0 },
        };
        assert!(grid.window(outside).is_none());
    }
}
