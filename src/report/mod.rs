//! Result shaping: the CSV datasets written into the output directory.

pub mod dataset;
