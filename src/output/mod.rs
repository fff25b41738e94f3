//! Result reporting
//!
//! - **text**: the per-size console report
//! - **json**: machine-readable results written to a file

pub mod json;
pub mod text;
