//! ms-core: shared foundation for the motor simulation crates.
//!
//! Contains:
//! - units (uom SI types + constructors for the electromechanical quantities)
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use units::*;
