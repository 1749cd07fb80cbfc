//! Facility management
//!
//! The facility pool holds the capacity-limited destinations that secondary
//! stops are placed on, together with the nearest-neighbour index used by the
//! discretization step.
//!
//! # Usage Example
//!
//! ```rust
//! use activity_chain_locator::facility::*;
//! use activity_chain_locator::types::*;
//!
//! let mut pool = FacilityPool::new(vec![
//!     FacilityRecord::new("shop-1", Point::new(100.0, 0.0), 1),
//!     FacilityRecord::new("shop-2", Point::new(400.0, 0.0), 5),
//! ]);
//!
//! let index = pool.nearest(Point::ORIGIN).unwrap();
//! assert_eq!(pool.consume(index).unwrap(), 0);
//! pool.update(index).unwrap();
//! assert_eq!(pool.len(), 1);
//! ```

pub mod pool;

pub use pool::{FacilityIndex, FacilityPool, FacilityRecord};
