//! Tuku Processing Library
//!
//! Content sniffing, decoding and the ordered upload validation pipeline.

pub mod inspect;
pub mod validator;

pub use inspect::{decode_dimensions, sniff, DecodeFailure, SniffedFormat};
pub use validator::{ImageValidator, ValidationError};
