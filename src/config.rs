use std::path::PathBuf;

use clap::Parser;

use crate::{
    classifier::HeadlessClassifier,
    mask::{Connectivity, LabelExtractor},
    pipeline::Workflow,
    store::{LocalDataStore, WorkDirs},
};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(author, version, about, long_about = None)]
pub struct JobConfig {
    /// Probabilities at or above this value are foreground.
    #[arg(long, default_value_t = 0.9)]
    pub probability_threshold: f32,

    /// Channel of the probability map holding the foreground class, as defined by the project.
    #[arg(long)]
    pub foreground_channel: usize,

    /// Which neighbouring voxels are part of the same object.
    #[arg(long, value_enum, default_value_t = Connectivity::Face)]
    pub connectivity: Connectivity,

    /// Objects with fewer voxels are dropped. 0 keeps everything.
    #[arg(long, default_value_t = 0)]
    pub min_object_size: usize,

    /// Channels per plane when the probability map stores one channel per page.
    #[arg(long, default_value_t = 2)]
    pub channels: usize,

    /// Launcher of the headless pixel classifier.
    #[arg(long, default_value = "/app/ilastik/run_ilastik.sh")]
    pub classifier: PathBuf,

    /// Trained pixel classification project.
    #[arg(long, default_value = "/app/PixelClassification3D.ilp")]
    pub project: PathBuf,

    /// The directory containing the input images.
    #[arg(long)]
    pub source_dir: PathBuf,

    /// The directory containing ground truth masks named like the inputs.
    #[arg(long)]
    pub ground_truth_dir: Option<PathBuf>,

    /// The directory receiving the masks and metrics.
    #[arg(long)]
    pub results_dir: PathBuf,

    /// Base of the job working directories, defaults to $HOME.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Name of the job working directory.
    #[arg(long, default_value = "local")]
    pub job_name: String,

    /// Also save a png projection of every mask.
    #[arg(long, default_value_t = false)]
    pub preview: bool,
}

impl JobConfig {
    pub fn extractor(&self) -> LabelExtractor {
        LabelExtractor::new(self.probability_threshold)
            .with_foreground_channel(self.foreground_channel)
            .with_connectivity(self.connectivity)
            .with_min_object_size(self.min_object_size)
    }

    pub fn classifier(&self) -> HeadlessClassifier {
        HeadlessClassifier {
            executable: self.classifier.clone(),
            project: self.project.clone(),
        }
    }

    pub fn data_store(&self) -> LocalDataStore {
        LocalDataStore {
            source: self.source_dir.clone(),
            ground_truth: self.ground_truth_dir.clone(),
            results: self.results_dir.clone(),
        }
    }

    pub fn workflow(&self) -> Workflow {
        let base = self
            .base_dir
            .clone()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        Workflow {
            dirs: WorkDirs::new(&base, &self.job_name),
            channels: self.channels,
            preview: self.preview,
        }
    }
}
