//! # Cardex Domain Models
//!
//! Shared data shapes for the business-card extraction service.
//!
//! ## Key Models
//!
//! - **ExtractedRow**: one normalized business-card record with 16 canonical fields
//! - **FileDescriptor**: an input image, either a local path or a remote handle
//! - **FileError**: a non-fatal failure scoped to one input file
//! - **BatchRequest / BatchResponse**: the batch endpoint contract, validated with the validator crate

pub mod batch;
pub mod file;
pub mod health;
pub mod row;


pub use batch::*;
pub use file::*;
pub use health::*;
pub use row::*;
