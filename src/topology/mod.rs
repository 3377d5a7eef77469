//! Grid topology: index ranges, periodic carts, partitioned grids and the
//! distributed partition hash used to resolve owning ranks.

pub mod cart;
pub mod grid;
pub mod indexer;
pub mod partition_hash;
pub mod range;

pub use cart::{Cart, PeriodicStorage};
pub use grid::{Grid, GridId, GridInfo, GridNeighbor};
pub use indexer::{ArrayLayout, RangeIndexer};
pub use partition_hash::{PartitionBin, PartitionHash};
pub use range::{MAX_DIMS, Range, Tuple};
