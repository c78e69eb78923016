//! The Java pipelines. `java` pushes REST search candidates through a cumulative filter chain (bug issues,
//! Java files, lines of code) and measures the accepted ones with the CK static-analysis tool;
//! `java-classes` keeps CK's per-class rows of the most starred Java repositories.

pub mod archive;
pub mod ck;
pub mod class_metrics;
pub mod clone;
pub mod filter_chain;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod source_scan;
pub mod staging;
