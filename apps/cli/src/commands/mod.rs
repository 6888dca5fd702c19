//! Command implementations for the RLFlow CLI.

pub mod published;
pub mod ranges;
pub mod train;
