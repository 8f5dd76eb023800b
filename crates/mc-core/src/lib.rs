//! Configuration, records, tables and shared traits for myoclip.
//!
//! This crate holds every type the sampling, EMG and dataset crates agree on:
//! the immutable [`Record`], persisted table rows and their uid join, the
//! sampling policy, and the [`Dataset`] contract.

pub mod config;
pub mod error;
pub mod frame;
pub mod modality;
pub mod policy;
pub mod record;
pub mod sample;
pub mod table;
pub mod template;
pub mod traits;

pub use config::{DatasetConfig, Mode, PreprocessMode};
pub use error::CoreError;
pub use frame::Frame;
pub use modality::Modality;
pub use policy::SamplingPolicy;
pub use record::{EmgReadings, Record};
pub use sample::{Sample, SampleInfo};
pub use template::FrameTemplate;
pub use traits::{Dataset, FrameLoader, FrameTransform};
