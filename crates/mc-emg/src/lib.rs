//! EMG signal conditioning for myoclip: Butterworth design, zero-phase
//! filtering and the two armband preprocessing pipelines.

pub mod error;
pub mod filter;
pub mod preprocess;

pub use error::EmgError;
pub use filter::ButterworthLowpass;
pub use preprocess::{EmgPreprocessor, Preprocessed};
