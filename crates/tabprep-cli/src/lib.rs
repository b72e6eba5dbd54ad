//! CLI library components for tabprep.

pub mod logging;
