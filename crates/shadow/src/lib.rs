//! Offline comparison of the native and legacy Python pipeline outputs.
//! Used during migration to prove the two produce the same triage,
//! analysis, and approval decisions on golden fixtures.

pub mod comparator;
pub mod native;
pub mod python;

use thiserror::Error;

use finops_core::errors::ApplicationError;

pub use comparator::{ComparisonResult, PhaseComparison, compare};
pub use native::NativeRunner;
pub use python::PythonRunner;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShadowError {
    #[error(transparent)]
    Native(#[from] ApplicationError),
    #[error("python pipeline: {0}")]
    Python(String),
    #[error("parse {side} output: {message}")]
    Parse { side: &'static str, message: String },
    #[error("encode output: {0}")]
    Encode(String),
}
