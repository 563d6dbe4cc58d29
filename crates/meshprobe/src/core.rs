//! Core meshprobe data structures, traits, and routines. The most common entry points are
//! [`Generator::generate`] and [`Dispatcher::run`].

pub use meshprobe_core::*;
