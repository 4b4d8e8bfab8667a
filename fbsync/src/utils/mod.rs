//! Utility modules for fbsync

pub mod logging;
