pub mod archive;
pub mod file_ops;
pub mod parallel;
pub mod rename;
pub mod reporting;
