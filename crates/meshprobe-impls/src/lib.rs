//! This crate contains implementations of the
//! [`MeasurementService`](meshprobe_core::MeasurementService) and
//! [`ResponseDecoder`](meshprobe_core::ResponseDecoder) traits. The types here bridge meshprobe
//! and the remote measurement service.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

pub mod decode;
pub mod http;

pub use crate::decode::{CsvDecoder, Decoder, JsonDecoder};
pub use crate::http::{HttpOpts, HttpService};
