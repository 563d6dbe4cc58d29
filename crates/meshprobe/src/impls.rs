//! Implementations of the service seams defined in [`core`](crate::core).

pub use meshprobe_impls::*;
