//! Life-like rules and the 4x4 base case of the recursion.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Neighbourhood of the cell in bit 5 of a row-major 4x4 window, i.e. the
/// bits of its eight neighbours when the window is shifted so that the cell
/// sits at row 2, column 2 counted from the least significant end.
const NEIGHBOURHOOD_MASK: u16 = 0x757;
const CENTRE_MASK: u16 = 0x20;

/// Population counts of every 11-bit value up to [`NEIGHBOURHOOD_MASK`].
pub(crate) const BIT_COUNTS: [u8; NEIGHBOURHOOD_MASK as usize + 1] = {
    const NIBBLE: [u8; 16] = [0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4];
    let mut table = [0u8; NEIGHBOURHOOD_MASK as usize + 1];
    let mut i = 0;
    while i < table.len() {
        table[i] = NIBBLE[i & 0xF] + NIBBLE[(i >> 4) & 0xF] + NIBBLE[(i >> 8) & 0xF];
        i += 1;
    }
    table
};

/// Birth and survival conditions of a two-state outer-totalistic rule.
///
/// Bit `n` of `birth` (`survival`) is set if a dead (live) cell with `n` live
/// neighbours is alive in the next generation.
///
/// See: https://conwaylife.com/wiki/Rulestring
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    birth: u16,
    survival: u16,
}

/// Conway's Game of Life.
pub const B3S23: Rule = Rule {
    birth: 1 << 3,
    survival: 1 << 2 | 1 << 3,
};

impl Default for Rule {
    fn default() -> Self {
        B3S23
    }
}

impl Rule {
    /// Builds a rule from neighbour-count bitmasks; bits past the 8th are rejected,
    /// as is birth on zero neighbours, which would light up the whole plane.
    pub fn new(birth: u16, survival: u16) -> Result<Self> {
        if birth > 0x1FF || survival > 0x1FF || birth & 1 != 0 {
            return Err(Error::InvalidRule(format!("B{birth:#x}/S{survival:#x}")));
        }
        Ok(Self { birth, survival })
    }

    pub fn birth(&self) -> u16 {
        self.birth
    }

    pub fn survival(&self) -> u16 {
        self.survival
    }

    /// Next state of the cell in bit 5 of `bitmask`, whose neighbours occupy
    /// the bits of [`NEIGHBOURHOOD_MASK`].
    #[inline]
    pub(crate) fn eval_mask(&self, bitmask: u16) -> u16 {
        let rule = if bitmask & CENTRE_MASK != 0 {
            self.survival
        } else {
            self.birth
        };
        (rule >> BIT_COUNTS[(bitmask & NEIGHBOURHOOD_MASK) as usize]) & 1
    }

    /// Advances the inner 2x2 cells of a 4x4 window by one generation.
    ///
    /// `cells` is row-major with the top-left cell in bit 15. The result holds
    /// the new nw, ne, sw and se cells in bits 0, 1, 2 and 3.
    #[inline]
    pub(crate) fn next_inner_2x2(&self, cells: u16) -> u8 {
        (self.eval_mask(cells >> 5)
            | self.eval_mask(cells >> 4) << 1
            | self.eval_mask(cells >> 1) << 2
            | self.eval_mask(cells) << 3) as u8
    }
}

impl FromStr for Rule {
    type Err = Error;

    /// Accepts `B3/S23` in any order and case, and the older `S/B` form `23/3`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidRule(s.to_owned());
        let digits = |part: &str| -> Result<u16> {
            part.chars().try_fold(0u16, |mask, c| match c.to_digit(10) {
                Some(d) if d <= 8 => Ok(mask | 1 << d),
                _ => Err(invalid()),
            })
        };

        let normalized = s.trim().to_ascii_uppercase();
        let (first, second) = normalized.split_once('/').ok_or_else(invalid)?;
        let (birth, survival) = match (first.strip_prefix('B'), second.strip_prefix('S')) {
            (Some(b), Some(s)) => (digits(b)?, digits(s)?),
            _ => match (first.strip_prefix('S'), second.strip_prefix('B')) {
                (Some(s), Some(b)) => (digits(b)?, digits(s)?),
                _ => (digits(second)?, digits(first)?),
            },
        };
        Rule::new(birth, survival).map_err(|_| invalid())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |mask: u16| -> String {
            (0..=8)
                .filter(|n| mask >> n & 1 != 0)
                .map(|n| char::from(b'0' + n as u8))
                .collect()
        };
        write!(f, "B{}/S{}", list(self.birth), list(self.survival))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packs a 4x4 window given as four rows of `'.'`/`'*'`.
    fn window(rows: [&str; 4]) -> u16 {
        let mut cells = 0;
        for row in rows {
            for c in row.chars() {
                cells = cells << 1 | u16::from(c == '*');
            }
        }
        cells
    }

    #[test]
    fn test_bit_counts() {
        for (i, &count) in BIT_COUNTS.iter().enumerate() {
            assert_eq!(count as u32, (i as u32).count_ones());
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("B3/S23".parse::<Rule>().unwrap(), B3S23);
        assert_eq!("b3/s23".parse::<Rule>().unwrap(), B3S23);
        assert_eq!("S23/B3".parse::<Rule>().unwrap(), B3S23);
        assert_eq!("23/3".parse::<Rule>().unwrap(), B3S23);
        let highlife: Rule = "B36/S23".parse().unwrap();
        assert_eq!(highlife.to_string(), "B36/S23");
        assert_eq!("B/S".parse::<Rule>().unwrap().to_string(), "B/S");
    }

    #[test]
    fn test_parse_rejects() {
        for bad in ["", "B3", "B9/S23", "B3/Sx", "B03/S23"] {
            assert!(bad.parse::<Rule>().is_err(), "{bad:?} should be rejected");
        }
        assert!(Rule::new(1 << 9, 0).is_err());
    }

    #[test]
    fn test_block_is_still() {
        let cells = window(["....", ".**.", ".**.", "...."]);
        assert_eq!(B3S23.next_inner_2x2(cells), 0b1111);
    }

    #[test]
    fn test_blinker_rotates() {
        // vertical blinker in column 1, rows 0..3
        let cells = window([".*..", ".*..", ".*..", "...."]);
        // (1, 1) survives and (2, 1) is born, (1, 2) dies of loneliness
        assert_eq!(B3S23.next_inner_2x2(cells), 0b0011);
    }

    #[test]
    fn test_lonely_cell_dies() {
        let cells = window(["....", ".*..", "....", "...."]);
        assert_eq!(B3S23.next_inner_2x2(cells), 0);
    }
}
