//! Copy capability implementations
//!
//! This module provides concrete implementations of the `MirrorSystem` trait:
//! - `SkopeoSystem`: delegates each copy to an external `skopeo` process
//! - `MockSystem`: records copies in memory for testing (in tests module)

mod skopeo;

pub use skopeo::SkopeoSystem;

#[cfg(test)]
pub mod mock;

#[cfg(test)]
pub use mock::MockSystem;
