//! Speed controller plugin implementations.

pub mod curve;
pub mod fixed;

pub use curve::{CurvePoint, CurveSpeedController, CurveSpeedControllerConfig};
pub use fixed::{FixedSpeedController, FixedSpeedControllerConfig};
