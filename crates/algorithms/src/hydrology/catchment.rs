//! Catchment delineation for a wetland footprint
//!
//! Follows the D8 direction grid out of the wetland to find where it
//! drains, then traces upstream from that outlet and from the footprint
//! itself. The wetland's own footprint is always part of the catchment.

use std::collections::VecDeque;
use wetland_core::raster::{d8, Raster};
use wetland_core::{Error, Result};

/// A delineated catchment
#[derive(Debug, Clone)]
pub struct Catchment {
    /// Catchment mask (1 = in catchment, 0 = outside), aligned with the DEM
    pub mask: Raster<u8>,
    /// Outlet cell (row, col)
    pub outlet: (usize, usize),
    /// Elevation at the outlet
    pub outlet_elevation: f64,
    /// Number of cells in the mask
    pub cell_count: usize,
    /// Number of cells draining to the outlet, the outlet included
    pub upstream_cells: usize,
}

impl Catchment {
    /// Catchment area in hectares (grid units are metres)
    pub fn area_hectares(&self) -> f64 {
        self.cell_count as f64 * self.mask.cell_area() / 10_000.0
    }

    /// Whether (row, col) lies in the catchment
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.mask.get(row, col).map_or(false, |v| v != 0)
    }
}

/// Select the outlet cell for a footprint.
///
/// Candidates are the cells where flow leaves the footprint: the
/// downstream neighbour of every footprint cell that drains outside it,
/// plus footprint cells that are sinks. Candidates without a valid
/// elevation are skipped. The outlet is the lowest candidate; ties go to
/// the larger flow accumulation, then to the first candidate in row-major
/// order.
pub fn find_outlet(
    dem: &Raster<f64>,
    flow_dir: &Raster<u8>,
    accumulation: &Raster<f64>,
    footprint: &Raster<u8>,
) -> Result<(usize, usize)> {
    let (rows, cols) = dem.shape();
    let mut is_candidate = vec![false; rows * cols];
    let mut footprint_cells = 0usize;

    for row in 0..rows {
        for col in 0..cols {
            if unsafe { footprint.get_unchecked(row, col) } == 0 {
                continue;
            }
            footprint_cells += 1;

            let dir = unsafe { flow_dir.get_unchecked(row, col) };
            if dir == d8::NO_DATA {
                continue;
            }
            let downstream = if dir == d8::SINK || dir > 8 {
                None
            } else {
                let (dr, dc) = d8::OFFSETS[dir as usize];
                flow_dir.offset(row, col, dr, dc)
            };
            match downstream {
                // Still inside: that cell's own exit is examined in turn
                Some((nr, nc)) if unsafe { footprint.get_unchecked(nr, nc) } != 0 => {}
                Some((nr, nc)) => is_candidate[nr * cols + nc] = true,
                None => is_candidate[row * cols + col] = true,
            }
        }
    }

    if footprint_cells == 0 {
        return Err(Error::Algorithm(
            "wetland polygon does not overlap the elevation grid".into(),
        ));
    }

    let mut best: Option<((usize, usize), f64, f64)> = None;
    for row in 0..rows {
        for col in 0..cols {
            if !is_candidate[row * cols + col] {
                continue;
            }
            let z = unsafe { dem.get_unchecked(row, col) };
            if dem.is_nodata(z) {
                continue;
            }
            let acc = unsafe { accumulation.get_unchecked(row, col) };
            let acc = if acc.is_nan() { 0.0 } else { acc };

            let better = match best {
                None => true,
                Some((_, best_z, best_acc)) => z < best_z || (z == best_z && acc > best_acc),
            };
            if better {
                best = Some(((row, col), z, acc));
            }
        }
    }

    best.map(|(cell, _, _)| cell).ok_or_else(|| {
        Error::Algorithm("no valid elevation where the wetland polygon drains".into())
    })
}

/// Mark every unmarked cell whose flow reaches a queued cell.
///
/// A neighbour flows INTO (row, col) if its direction is the opposite of
/// the direction from (row, col) to it. Returns the number of cells added.
fn trace_upstream(
    flow_dir: &Raster<u8>,
    mask: &mut Raster<u8>,
    queue: &mut VecDeque<(usize, usize)>,
) -> usize {
    let mut added = 0usize;
    while let Some((row, col)) = queue.pop_front() {
        for code in 1..=8u8 {
            let (dr, dc) = d8::OFFSETS[code as usize];
            let Some((nr, nc)) = flow_dir.offset(row, col, dr, dc) else {
                continue;
            };
            if mask.data()[(nr, nc)] != 0 {
                continue;
            }
            if unsafe { flow_dir.get_unchecked(nr, nc) } == d8::opposite(code) {
                mask.data_mut()[(nr, nc)] = 1;
                added += 1;
                queue.push_back((nr, nc));
            }
        }
    }
    added
}

/// Delineate the catchment draining through a wetland footprint.
///
/// Reverse breadth-first search from the outlet, then from every footprint
/// cell not yet reached, so land draining into the wetland through a
/// second exit is still counted.
pub fn delineate_catchment(
    dem: &Raster<f64>,
    flow_dir: &Raster<u8>,
    accumulation: &Raster<f64>,
    footprint: &Raster<u8>,
) -> Result<Catchment> {
    if dem.shape() != flow_dir.shape()
        || dem.shape() != accumulation.shape()
        || dem.shape() != footprint.shape()
    {
        let (er, ec) = dem.shape();
        let (ar, ac) = footprint.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let outlet = find_outlet(dem, flow_dir, accumulation, footprint)?;

    let mut mask = dem.like(0u8);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    mask.data_mut()[outlet] = 1;
    queue.push_back(outlet);
    let upstream_cells = 1 + trace_upstream(flow_dir, &mut mask, &mut queue);

    let (rows, cols) = footprint.shape();
    for row in 0..rows {
        for col in 0..cols {
            if unsafe { footprint.get_unchecked(row, col) } != 0 && mask.data()[(row, col)] == 0 {
                mask.data_mut()[(row, col)] = 1;
                queue.push_back((row, col));
            }
        }
    }
    trace_upstream(flow_dir, &mut mask, &mut queue);

    let cell_count = mask.data().iter().filter(|&&v| v != 0).count();

    Ok(Catchment {
        outlet_elevation: dem.get(outlet.0, outlet.1)?,
        mask,
        outlet,
        cell_count,
        upstream_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::{flow_accumulation, flow_direction, FlowDirectionParams};
    use wetland_core::GeoTransform;

    /// Plane sloping south, 1 m per 10 m row
    fn south_plane(rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, 100.0 - row as f64).unwrap();
            }
        }
        dem
    }

    fn footprint_of(dem: &Raster<f64>, cells: &[(usize, usize)]) -> Raster<u8> {
        let mut fp = dem.like(0u8);
        for &(r, c) in cells {
            fp.set(r, c, 1).unwrap();
        }
        fp
    }

    fn route(dem: &Raster<f64>) -> (Raster<u8>, Raster<f64>) {
        let fdir = flow_direction(dem, FlowDirectionParams::default()).unwrap();
        let acc = flow_accumulation(&fdir).unwrap();
        (fdir, acc)
    }

    #[test]
    fn test_outlet_is_where_the_footprint_drains() {
        let mut dem = south_plane(8, 6);
        // A lower cell downslope that the footprint does not flow into
        dem.set(5, 4, 90.0).unwrap();
        let (fdir, acc) = route(&dem);
        let fp = footprint_of(&dem, &[(3, 2), (3, 3)]);

        // Both footprint cells drain south into row 4, which ties on
        // elevation and accumulation: first in row-major wins. The
        // diagonal neighbours (4, 1) and (4, 4) are just as low but
        // receive nothing from the wetland.
        let outlet = find_outlet(&dem, &fdir, &acc, &fp).unwrap();
        assert_eq!(outlet, (4, 2));

        let catchment = delineate_catchment(&dem, &fdir, &acc, &fp).unwrap();
        assert_eq!(catchment.outlet, (4, 2));
        assert_eq!(catchment.outlet_elevation, 96.0);
        // Column 2 down to the outlet
        assert_eq!(catchment.upstream_cells, 5);
        // plus column 3 down to the footprint
        assert_eq!(catchment.cell_count, 9);
        assert!(catchment.contains(0, 2));
        assert!(catchment.contains(0, 3));
        assert!(catchment.contains(3, 3));
        assert!(!catchment.contains(0, 1));
        assert!(!catchment.contains(0, 4));
        assert!(!catchment.contains(4, 3));
    }

    #[test]
    fn test_every_cell_draining_through_the_footprint_is_included() {
        let dem = south_plane(12, 10);
        let (fdir, acc) = route(&dem);
        let cells = [(5, 4), (5, 5), (6, 4), (6, 5)];
        let fp = footprint_of(&dem, &cells);

        let catchment = delineate_catchment(&dem, &fdir, &acc, &fp).unwrap();
        assert_eq!(catchment.outlet, (7, 4));

        // Every cell flows south, so columns 4 and 5 above row 7 pass
        // through the footprint
        for row in 0..7 {
            for col in [4, 5] {
                assert!(catchment.contains(row, col), "({}, {})", row, col);
            }
        }
        assert_eq!(catchment.cell_count, 15);
        assert!(!catchment.contains(0, 3));
        assert!(!catchment.contains(0, 6));
        assert!(!catchment.contains(7, 5));
        assert!(!catchment.contains(8, 4));
    }

    #[test]
    fn test_sink_in_footprint_is_its_own_outlet() {
        // Bottom row of a plane has no lower neighbour
        let dem = south_plane(8, 6);
        let (fdir, acc) = route(&dem);
        assert_eq!(fdir.get(7, 2).unwrap(), d8::SINK);
        let fp = footprint_of(&dem, &[(7, 2)]);

        let catchment = delineate_catchment(&dem, &fdir, &acc, &fp).unwrap();
        assert_eq!(catchment.outlet, (7, 2));
        assert_eq!(catchment.cell_count, 8);
        assert_eq!(catchment.upstream_cells, 8);
    }

    #[test]
    fn test_accumulation_breaks_elevation_ties() {
        // Two equally low footprint cells; the eastern half of the grid
        // is larger, so (2, 2) collects more flow than (2, 1)
        let values = [
            [9.0, 9.0, 9.0, 9.0, 9.0],
            [9.0, 5.0, 5.0, 9.0, 9.0],
            [9.0, 3.0, 3.0, 9.0, 9.0],
            [9.0, 9.0, 9.0, 9.0, 9.0],
        ];
        let mut dem = Raster::new(4, 5);
        dem.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        for (r, line) in values.iter().enumerate() {
            for (c, &v) in line.iter().enumerate() {
                dem.set(r, c, v).unwrap();
            }
        }
        let (fdir, acc) = route(&dem);
        let fp = footprint_of(&dem, &[(2, 1), (2, 2)]);

        // Both are pits, so each is its own exit
        assert_eq!(fdir.get(2, 1).unwrap(), d8::SINK);
        assert!(acc.get(2, 2).unwrap() > acc.get(2, 1).unwrap());
        assert_eq!(find_outlet(&dem, &fdir, &acc, &fp).unwrap(), (2, 2));
    }

    #[test]
    fn test_footprint_always_included() {
        let dem = south_plane(6, 6);
        let (fdir, acc) = route(&dem);
        let cells = [(1, 1), (1, 2), (2, 1), (2, 2)];
        let fp = footprint_of(&dem, &cells);

        let catchment = delineate_catchment(&dem, &fdir, &acc, &fp).unwrap();
        for &(r, c) in &cells {
            assert!(catchment.contains(r, c));
        }
        assert!(catchment.cell_count >= cells.len());
        assert!(catchment.area_hectares() >= cells.len() as f64 * 100.0 / 10_000.0);
    }

    #[test]
    fn test_empty_footprint_is_an_error() {
        let dem = south_plane(4, 4);
        let (fdir, acc) = route(&dem);
        let fp = dem.like(0u8);
        let err = delineate_catchment(&dem, &fdir, &acc, &fp).unwrap_err();
        assert!(err.to_string().contains("does not overlap"));
    }

    #[test]
    fn test_all_nodata_candidates_is_an_error() {
        let mut dem = south_plane(4, 4);
        dem.set_nodata(Some(-9999.0));
        for row in 0..4 {
            for col in 0..4 {
                dem.set(row, col, -9999.0).unwrap();
            }
        }
        let (fdir, acc) = route(&dem);
        let fp = footprint_of(&dem, &[(1, 1)]);
        assert!(find_outlet(&dem, &fdir, &acc, &fp).is_err());
    }
}
