//! Controller protocol drivers.

pub mod riing;
