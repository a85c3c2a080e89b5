//! Integration testing module
//!
//! End-to-end tests for the packer:
//! - Pass-through of sample data across irregular input chunking
//! - Fixed output frame size and gap-free timestamps
//! - Raw PCM files driven through the full pipeline

pub mod e2e;
pub mod fixtures;
