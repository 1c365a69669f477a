//! D8 neighborhood conventions shared by slope, routing and delineation

/// D8 flow directions (standard encoding)
///
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
pub mod d8 {
    /// Cell has no downslope outlet (pit or unresolved flat)
    pub const SINK: u8 = 0;

    /// Cell has no elevation
    pub const NO_DATA: u8 = 255;

    /// Direction offsets: (row_offset, col_offset)
    /// Indexed by direction code (1-8), 0 is unused
    pub const OFFSETS: [(isize, isize); 9] = [
        (0, 0),   // 0: sink
        (0, 1),   // 1: E
        (-1, 1),  // 2: NE
        (-1, 0),  // 3: N
        (-1, -1), // 4: NW
        (0, -1),  // 5: W
        (1, -1),  // 6: SW
        (1, 0),   // 7: S
        (1, 1),   // 8: SE
    ];

    /// Distance multipliers for each direction
    /// Cardinal directions = 1.0, diagonal = sqrt(2)
    pub const DISTANCES: [f64; 9] = [
        0.0,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
    ];

    /// Order in which directions are examined. An earlier direction wins
    /// every exact tie: cardinals before diagonals, anticlockwise from east.
    pub const PRIORITY: [u8; 8] = [1, 3, 5, 7, 2, 4, 6, 8];

    /// Get the opposite direction
    pub fn opposite(dir: u8) -> u8 {
        if dir == SINK || dir > 8 {
            dir
        } else {
            ((dir - 1 + 4) % 8) + 1
        }
    }

    /// Whether `dir` points at a neighbor
    pub fn is_flowing(dir: u8) -> bool {
        (1..=8).contains(&dir)
    }

    /// Direction code pointing from a cell to its neighbor at `(dr, dc)`
    pub fn code_for(dr: isize, dc: isize) -> Option<u8> {
        OFFSETS
            .iter()
            .skip(1)
            .position(|&o| o == (dr, dc))
            .map(|i| (i + 1) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::d8;

    #[test]
    fn test_d8_opposite() {
        assert_eq!(d8::opposite(1), 5); // E -> W
        assert_eq!(d8::opposite(3), 7); // N -> S
        assert_eq!(d8::opposite(2), 6); // NE -> SW
        assert_eq!(d8::opposite(d8::SINK), d8::SINK);
        assert_eq!(d8::opposite(d8::NO_DATA), d8::NO_DATA);
    }

    #[test]
    fn test_priority_covers_every_direction_once() {
        let mut seen = d8::PRIORITY.to_vec();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(d8::PRIORITY[..4]
            .iter()
            .all(|&d| d8::DISTANCES[d as usize] == 1.0));
    }

    #[test]
    fn test_code_for_offsets() {
        assert_eq!(d8::code_for(0, 1), Some(1));
        assert_eq!(d8::code_for(1, 1), Some(8));
        assert_eq!(d8::code_for(0, 0), None);
    }
}
