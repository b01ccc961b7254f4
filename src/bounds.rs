use crate::Number;

/// Inclusive rectangle in world coordinates; `y` grows downward.
///
/// A default (all-zero) value is what an empty universe reports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub top: Number,
    pub left: Number,
    pub bottom: Number,
    pub right: Number,
}

impl Bounds {
    pub fn new(top: Number, left: Number, bottom: Number, right: Number) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Tight box around a non-empty list of cells, `None` for an empty one.
    pub fn from_cells(field_x: &[i32], field_y: &[i32]) -> Option<Self> {
        let min_max = |v: &[i32]| Some((*v.iter().min()?, *v.iter().max()?));
        let (left, right) = min_max(field_x)?;
        let (top, bottom) = min_max(field_y)?;
        Some(Self::new(
            top.into(),
            left.into(),
            bottom.into(),
            right.into(),
        ))
    }

    pub fn width(&self) -> Number {
        &self.right - &self.left + Number::ONE
    }

    pub fn height(&self) -> Number {
        &self.bottom - &self.top + Number::ONE
    }

    /// Smallest quadtree level whose root, centered at the origin, still
    /// contains every corner of the box.
    ///
    /// A root of level `L` spans `[-2^(L-1), 2^(L-1))`, so a coordinate `c`
    /// needs `2^(L-1) >= c + 1` when non-negative and `2^(L-1) >= -c` otherwise.
    pub fn level(&self) -> u32 {
        let mut extent = Number::ONE;
        for c in [&self.top, &self.left, &self.bottom, &self.right] {
            let needed = if c.is_negative() {
                -c
            } else {
                c + &Number::ONE
            };
            extent = extent.max(needed);
        }
        let mut level = 1;
        while Number::pow2(level - 1) < extent {
            level += 1;
        }
        level
    }

    pub fn contains(&self, x: &Number, y: &Number) -> bool {
        &self.left <= x && x <= &self.right && &self.top <= y && y <= &self.bottom
    }
}
