pub mod classifier;
pub mod config;
pub mod job;
pub mod mask;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod volume;

mod error;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::{
        Error, Result,
        classifier::{Classifier, HeadlessClassifier},
        job::{JobContext, JobStatus, LogReporter, MemoryReporter, StatusReporter},
        mask::{Connectivity, LabelExtractor, LabelGenerator, extract_labels},
        store::{DataStore, LocalDataStore, WorkDirs},
    };
}
