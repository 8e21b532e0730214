//! Aspect detection.
//!
//! This module finds the geometric aspects formed between pairs of
//! celestial bodies.

pub mod detector;

pub use detector::*;
