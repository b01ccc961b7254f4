//! HashLife on a canonical quadtree.
//!
//! Every distinct square of cells is stored once in a hash-consing table
//! and identified by a [`NodeId`]; the evolution of a square is memoized in
//! the node itself, so repeating structures are computed only once.

mod blank;
mod gc;
mod memory;
mod node;
mod stepper;
mod universe;

use blank::BlankNodes;
use gc::Relocator;
use memory::NodeStore;
use stepper::Stepper;

pub use node::{Node, NodeId};
pub use universe::Universe;

/// Freshly loaded and cleared universes start at this level.
pub const MIN_ROOT_LEVEL: u32 = 4;
