//! Platform implementations

pub mod linux;
