use crate::config::Connectivity;

/**
 * Find the connected regions of a mask.
 *
 * # Arguments
 * * mask - row major grid, `true` pixels are candidates.
 * * nrows, ncols - shape of the grid.
 * * connectivity - which neighbors join pixels into one region.
 *
 * # Returns
 * One sorted list of flat indexes per region. Regions are ordered by their first pixel in
 * raster order, which is the order a classic two pass labeler assigns labels.
 */
pub fn label_components(
    mask: &[bool],
    nrows: usize,
    ncols: usize,
    connectivity: Connectivity,
) -> Vec<Vec<u32>> {
    debug_assert_eq!(mask.len(), nrows * ncols);

    const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
    const EIGHT: [(isize, isize); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];

    let offsets: &[(isize, isize)] = match connectivity {
        Connectivity::Four => &FOUR,
        Connectivity::Eight => &EIGHT,
    };

    let mut visited = vec![false; mask.len()];
    let mut stack: Vec<usize> = vec![];
    let mut components = vec![];

    for seed in 0..mask.len() {
        if !mask[seed] || visited[seed] {
            continue;
        }

        let mut pixels: Vec<u32> = vec![];
        visited[seed] = true;
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            pixels.push(idx as u32);

            let row = (idx / ncols) as isize;
            let col = (idx % ncols) as isize;

            for &(dr, dc) in offsets {
                let r = row + dr;
                let c = col + dc;
                if r < 0 || c < 0 || r >= nrows as isize || c >= ncols as isize {
                    continue;
                }

                let n = r as usize * ncols + c as usize;
                if mask[n] && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            }
        }

        pixels.sort_unstable();
        components.push(pixels);
    }

    components
}

#[cfg(test)]
mod test {
    use super::*;

    fn mask_from(rows: &[&str]) -> (Vec<bool>, usize, usize) {
        let nrows = rows.len();
        let ncols = rows[0].len();
        let mask = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        (mask, nrows, ncols)
    }

    #[test]
    fn test_diagonal_neighbors() {
        let (mask, nrows, ncols) = mask_from(&["#...", ".#..", "...#", "...#"]);

        let eight = label_components(&mask, nrows, ncols, Connectivity::Eight);
        assert_eq!(eight, vec![vec![0, 5], vec![11, 15]]);

        let four = label_components(&mask, nrows, ncols, Connectivity::Four);
        assert_eq!(four, vec![vec![0], vec![5], vec![11, 15]]);
    }

    #[test]
    fn test_raster_order_of_labels() {
        // The second region reaches further up, but starts later in raster order.
        let (mask, nrows, ncols) = mask_from(&["##...", "....#", "#...#", "#####"]);

        let comps = label_components(&mask, nrows, ncols, Connectivity::Four);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], vec![0, 1]);
        assert_eq!(comps[1], vec![9, 10, 14, 15, 16, 17, 18, 19]);
    }

    #[test]
    fn test_empty_mask() {
        let mask = vec![false; 12];
        assert!(label_components(&mask, 3, 4, Connectivity::Eight).is_empty());
    }
}
