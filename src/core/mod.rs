//! Shared types.

pub mod tool;
