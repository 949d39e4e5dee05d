//! Core types and errors shared by every module

pub mod error;
pub mod types;
