//! the object segmentation workflow, stage by stage

use std::{fs, path::PathBuf};

use crate::{
    classifier::Classifier,
    error::{Error, Result},
    job::{JobContext, JobStatus, ProgressMonitor, StatusReporter},
    mask::LabelGenerator,
    store::{DataStore, InputImage, WorkDirs},
    volume,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    pub dirs: WorkDirs,
    /// channels per plane when the classifier writes one channel per page
    pub channels: usize,
    /// also write a png projection of every mask
    pub preview: bool,
}

/// runs every stage of the workflow, moving the job to `Failed` if any of them fails.
pub fn run<R, S, C, G>(
    ctx: &mut JobContext<R>,
    workflow: &Workflow,
    store: &S,
    classifier: &C,
    generator: &G,
) -> Result<()>
where
    R: StatusReporter,
    S: DataStore,
    C: Classifier,
    G: LabelGenerator,
{
    let result = run_stages(ctx, workflow, store, classifier, generator);

    if let Err(e) = &result {
        log::error!("Workflow failed: {}", e);
        if !ctx.status().is_final() {
            if let Err(report_error) = ctx.fail(e.to_string()) {
                log::warn!("Could not report the failure: {}", report_error);
            }
        }
    }

    result
}

fn run_stages<R, S, C, G>(
    ctx: &mut JobContext<R>,
    workflow: &Workflow,
    store: &S,
    classifier: &C,
    generator: &G,
) -> Result<()>
where
    R: StatusReporter,
    S: DataStore,
    C: Classifier,
    G: LabelGenerator,
{
    ctx.update(JobStatus::Running, 0, "Initialisation...")?;
    let images = store.prepare(&workflow.dirs)?;

    ctx.set_progress(25, "Launching workflow...")?;
    let inputs: Vec<PathBuf> = images.iter().map(|image| image.path.clone()).collect();
    let probabilities = classifier.classify(&inputs, &workflow.dirs.tmp)?;

    label_images(ctx, workflow, generator, &images, &probabilities)?;

    let upload = ProgressMonitor::new(60, 90, "Extracting and uploading polygons from masks");
    store.upload_masks(ctx, &images, &workflow.dirs, &upload)?;

    ctx.set_progress(90, "Computing and uploading metrics...")?;
    store.upload_metrics(ctx, &images, &workflow.dirs)?;

    ctx.update(JobStatus::Terminated, 100, "Finished.")
}

/// turns the probability map of every image into a label mask named after the image.
pub fn label_images<R, G>(
    ctx: &mut JobContext<R>,
    workflow: &Workflow,
    generator: &G,
    images: &[InputImage],
    probabilities: &[PathBuf],
) -> Result<()>
where
    R: StatusReporter,
    G: LabelGenerator,
{
    if images.len() != probabilities.len() {
        return Err(Error::InvalidShape(format!(
            "{} probability maps for {} images",
            probabilities.len(),
            images.len()
        )));
    }

    let monitor = ProgressMonitor::new(25, 60, "Thresholding probabilities");
    for (index, (image, probability)) in images.iter().zip(probabilities).enumerate() {
        log::info!("Extracting objects of {}", image.filename);

        let probability_map = volume::read_probability_volume(probability, workflow.channels)?;
        let labels = generator.labels(probability_map.view().into_dyn())?;

        let mask_path = image.mask_path(&workflow.dirs);
        volume::write_label_volume(&mask_path, &labels.view())?;
        log::info!("Saved mask to {:?}", mask_path);

        let preview_path = image.preview_path(&workflow.dirs);
        if workflow.preview {
            volume::save_preview(&preview_path, &labels.view())?;
        } else if preview_path.is_file() {
            // left over from an earlier run in the same work dir
            fs::remove_file(&preview_path)?;
        }

        monitor.report(ctx, index + 1, images.len())?;
    }

    Ok(())
}
