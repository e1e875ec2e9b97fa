// Inkmark: watermark compositing engine and scan-submission pipeline

pub mod config;
pub mod logging;
pub mod submission;
pub mod watermark;
