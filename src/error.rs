use std::{path::PathBuf, process::ExitStatus};

use crate::job::JobStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// the volume does not carry the expected channel axis
    #[error("invalid volume shape: {0}")]
    InvalidShape(String),

    #[error("volume has an empty spatial dimension: {shape:?}")]
    EmptyVolume { shape: Vec<usize> },

    /// more objects than a 16-bit label volume can address
    #[error("found {count} objects, more than the {max} labels a 16-bit mask can hold", max = u16::MAX)]
    CapacityExceeded { count: usize },

    #[error("classifier exited unsuccessfully ({status})")]
    ClassifierFailed { status: ExitStatus },

    #[error("job is already {from:?} and cannot move to {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("no input images found in {0:?}")]
    NoInputImages(PathBuf),

    #[error("unsupported tiff sample format in {0:?}")]
    UnsupportedSampleFormat(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tiff error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;
