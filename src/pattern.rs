use crate::Rule;
use rand::{Rng, SeedableRng};

/// Live cells of a pattern as two parallel coordinate lists, plus the rule
/// it is meant to run under.
///
/// This is the shape a pattern-file reader hands over to
/// [`Universe::load_pattern`](crate::Universe::load_pattern).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    pub width: u32,
    pub height: u32,
    pub field_x: Vec<i32>,
    pub field_y: Vec<i32>,
    pub rule: Rule,
}

impl Pattern {
    /// Pattern with the given live cells under [`B3S23`](crate::B3S23);
    /// `width` and `height` span the cells' bounding box.
    pub fn from_cells(cells: &[(i32, i32)]) -> Self {
        let (field_x, field_y): (Vec<i32>, Vec<i32>) = cells.iter().copied().unzip();
        let span = |v: &[i32]| match (v.iter().min(), v.iter().max()) {
            (Some(&lo), Some(&hi)) => (hi as i64 - lo as i64 + 1) as u32,
            _ => 0,
        };
        Self {
            width: span(&field_x),
            height: span(&field_y),
            field_x,
            field_y,
            rule: Rule::default(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    /// Creates a random soup of the given size, centred at the origin.
    ///
    /// # Arguments
    ///
    /// * `density` - Probability of a cell being alive, clamped to `[0, 1]`.
    /// * `seed` - Optional seed for the random number generator.
    ///   If None, seeds from the OS.
    pub fn random(width: u32, height: u32, density: f64, seed: Option<u64>) -> Self {
        let mut rng = if let Some(x) = seed {
            rand_chacha::ChaCha8Rng::seed_from_u64(x)
        } else {
            rand_chacha::ChaCha8Rng::from_os_rng()
        };
        let density = if density.is_nan() {
            0.0
        } else {
            density.clamp(0.0, 1.0)
        };
        let (x0, y0) = ((width / 2) as i64, (height / 2) as i64);

        let (mut field_x, mut field_y) = (vec![], vec![]);
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                if rng.random_bool(density) {
                    field_x.push((x - x0) as i32);
                    field_y.push((y - y0) as i32);
                }
            }
        }
        Self {
            width,
            height,
            field_x,
            field_y,
            rule: Rule::default(),
        }
    }

    pub fn population(&self) -> usize {
        self.field_x.len()
    }
}
