//! data exchange with the store that holds job inputs, ground truth and results

use std::{
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;

use crate::{
    error::{Error, Result},
    job::{JobContext, ProgressMonitor, StatusReporter},
    metrics::{self, ImageMetrics},
    volume,
};

/// name of the metrics table written next to the uploaded masks
pub const METRICS_FILENAME: &str = "metrics.csv";

/// per-job working directories, laid out as `<base>/data/<job>/{in,ground_truth,out,tmp}`
#[derive(Debug, Clone, PartialEq)]
pub struct WorkDirs {
    pub input: PathBuf,
    pub ground_truth: PathBuf,
    pub output: PathBuf,
    pub tmp: PathBuf,
}

impl WorkDirs {
    pub fn new(base: &Path, job_name: &str) -> Self {
        let root = base.join("data").join(job_name);
        Self {
            input: root.join("in"),
            ground_truth: root.join("ground_truth"),
            output: root.join("out"),
            tmp: root.join("tmp"),
        }
    }

    pub fn create(&self) -> Result<()> {
        for dir in [&self.input, &self.ground_truth, &self.output, &self.tmp] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputImage {
    pub filename: String,
    /// local copy inside [`WorkDirs::input`]
    pub path: PathBuf,
    /// local copy inside [`WorkDirs::ground_truth`], if the store has one
    pub ground_truth: Option<PathBuf>,
}

impl InputImage {
    /// the mask written for this image keeps the original filename
    pub fn mask_path(&self, dirs: &WorkDirs) -> PathBuf {
        dirs.output.join(&self.filename)
    }

    pub fn preview_path(&self, dirs: &WorkDirs) -> PathBuf {
        let stem = Path::new(&self.filename)
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy();
        dirs.output.join(format!("{}_preview.png", stem))
    }
}

pub trait DataStore {
    /// makes the inputs (and ground truth) available under `dirs`
    fn prepare(&self, dirs: &WorkDirs) -> Result<Vec<InputImage>>;

    /// publishes the masks found in [`WorkDirs::output`]
    fn upload_masks<R: StatusReporter>(
        &self,
        ctx: &mut JobContext<R>,
        images: &[InputImage],
        dirs: &WorkDirs,
        monitor: &ProgressMonitor,
    ) -> Result<()>;

    /// computes and publishes the evaluation metrics of every mask
    fn upload_metrics<R: StatusReporter>(
        &self,
        ctx: &mut JobContext<R>,
        images: &[InputImage],
        dirs: &WorkDirs,
    ) -> Result<()>;
}

/// a store backed by local directories
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDataStore {
    pub source: PathBuf,
    pub ground_truth: Option<PathBuf>,
    pub results: PathBuf,
}

fn is_volume_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| matches!(extension, "tif" | "tiff"))
}

/// copies `from` to `to` unless both already name the same file, which a plain copy would
/// truncate to nothing.
fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() && fs::canonicalize(from)? == fs::canonicalize(to)? {
        log::debug!("{:?} is already in place", to);
        return Ok(());
    }
    fs::copy(from, to)?;
    Ok(())
}

impl DataStore for LocalDataStore {
    fn prepare(&self, dirs: &WorkDirs) -> Result<Vec<InputImage>> {
        dirs.create()?;

        let sources: Vec<_> = fs::read_dir(&self.source)?
            .filter_map(|entry| Some(entry.ok()?.path()))
            .filter(|path| is_volume_image(path))
            .sorted()
            .collect();

        if sources.is_empty() {
            return Err(Error::NoInputImages(self.source.clone()));
        }

        log::info!("Found {} input images in {:?}", sources.len(), self.source);

        let mut images = Vec::with_capacity(sources.len());
        for source in sources {
            let Some(filename) = source.file_name() else {
                continue;
            };
            let filename = filename.to_string_lossy().into_owned();

            let path = dirs.input.join(&filename);
            copy_file(&source, &path)?;

            let ground_truth = match &self.ground_truth {
                Some(dir) if dir.join(&filename).is_file() => {
                    let local = dirs.ground_truth.join(&filename);
                    copy_file(&dir.join(&filename), &local)?;
                    Some(local)
                }
                Some(_) => {
                    log::warn!("No ground truth for {}", filename);
                    None
                }
                None => None,
            };

            images.push(InputImage {
                filename,
                path,
                ground_truth,
            });
        }

        Ok(images)
    }

    fn upload_masks<R: StatusReporter>(
        &self,
        ctx: &mut JobContext<R>,
        images: &[InputImage],
        dirs: &WorkDirs,
        monitor: &ProgressMonitor,
    ) -> Result<()> {
        fs::create_dir_all(&self.results)?;

        for (index, image) in images.iter().enumerate() {
            let mask = image.mask_path(dirs);
            copy_file(&mask, &self.results.join(&image.filename))?;

            let preview = image.preview_path(dirs);
            if let Some(name) = preview.file_name().filter(|_| preview.is_file()) {
                copy_file(&preview, &self.results.join(name))?;
            }

            log::debug!("Uploaded {:?}", mask);
            monitor.report(ctx, index + 1, images.len())?;
        }

        Ok(())
    }

    fn upload_metrics<R: StatusReporter>(
        &self,
        _ctx: &mut JobContext<R>,
        images: &[InputImage],
        dirs: &WorkDirs,
    ) -> Result<()> {
        let rows = images
            .iter()
            .map(|image| -> Result<ImageMetrics> {
                let prediction = volume::read_label_volume(&image.mask_path(dirs))?;
                let truth = image
                    .ground_truth
                    .as_deref()
                    .map(volume::read_label_volume)
                    .transpose()?;
                let truth_view = truth.as_ref().map(|truth| truth.view());
                metrics::measure(&image.filename, &prediction.view(), truth_view.as_ref())
            })
            .collect::<Result<Vec<_>>>()?;

        fs::create_dir_all(&self.results)?;
        metrics::write_csv(&self.results.join(METRICS_FILENAME), &rows)
    }
}
