//! Utilities for node lists, command files and deployment configuration.

pub use meshprobe_utils::*;
