mod common;

use std::{fs, path::Path};

use ndarray::Array3;
use objseg::{
    pipeline::{self, Workflow},
    prelude::*,
    volume,
};
use tempfile::TempDir;
use tiff::encoder::{TiffEncoder, colortype};

use common::{CopyClassifier, cubes, two_class_volume, write_probability_tiff};

struct Fixture {
    workspace: TempDir,
    store: LocalDataStore,
    workflow: Workflow,
}

impl Fixture {
    fn new(with_ground_truth: bool) -> Self {
        let workspace = tempfile::tempdir().unwrap();
        let source = workspace.path().join("source");
        let truth = workspace.path().join("truth");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&truth).unwrap();

        let store = LocalDataStore {
            source,
            ground_truth: with_ground_truth.then_some(truth),
            results: workspace.path().join("results"),
        };
        let workflow = Workflow {
            dirs: WorkDirs::new(workspace.path(), "job"),
            channels: 2,
            preview: true,
        };

        Self {
            workspace,
            store,
            workflow,
        }
    }

    fn add_image(&self, filename: &str, foreground: &Array3<f32>) {
        write_probability_tiff(
            &self.store.source.join(filename),
            &two_class_volume(foreground),
        );
    }

    fn add_ground_truth(&self, filename: &str, mask: &Array3<u16>) {
        let (_, height, width) = mask.dim();
        let samples: Vec<u16> = mask.iter().copied().collect();
        let path = self.workspace.path().join("truth").join(filename);

        let mut file = fs::File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(&mut file).unwrap();
        for page in samples.chunks(height * width) {
            encoder
                .write_image::<colortype::Gray16>(width as u32, height as u32, page)
                .unwrap();
        }
    }
}

#[test]
fn test_full_run() {
    let fixture = Fixture::new(true);

    let two_cubes = cubes((4, 6, 6), &[(0, 0, 0), (2, 3, 3)], 2);
    let one_cube = cubes((4, 6, 6), &[(1, 1, 1)], 3);
    fixture.add_image("a.tif", &two_cubes);
    fixture.add_image("b.tif", &one_cube);
    fixture.add_ground_truth("a.tif", &two_cubes.mapv(|p| p as u16));

    let mut ctx = JobContext::new(MemoryReporter::default());
    pipeline::run(
        &mut ctx,
        &fixture.workflow,
        &fixture.store,
        &CopyClassifier,
        &LabelExtractor::new(0.5),
    )
    .unwrap();

    assert_eq!(ctx.status(), JobStatus::Terminated);
    assert_eq!(ctx.progress(), 100);

    let mask = volume::read_label_volume(&fixture.store.results.join("a.tif")).unwrap();
    assert_eq!(mask.dim(), (4, 6, 6));
    assert_eq!(mask[[0, 0, 0]], 1);
    assert_eq!(mask[[3, 4, 4]], 2);
    assert_eq!(mask[[0, 5, 5]], 0);

    assert!(fixture.store.results.join("b_preview.png").is_file());

    let metrics = fs::read_to_string(fixture.store.results.join("metrics.csv")).unwrap();
    let rows: Vec<&str> = metrics.lines().collect();
    assert_eq!(rows[1], "a.tif,2,16,1.000000");
    assert_eq!(rows[2], "b.tif,1,27,");

    // progress never goes backwards
    let updates = &ctx.reporter().updates;
    assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress));
    assert_eq!(updates.first().unwrap().comment, "Initialisation...");
    assert_eq!(updates.last().unwrap().comment, "Finished.");
}

#[test]
fn test_invalid_volume_fails_job() {
    let fixture = Fixture::new(false);
    fixture.add_image("a.tif", &cubes((2, 4, 4), &[(0, 0, 0)], 1));

    // three single-sample pages per plane do not divide the four pages in the file
    let workflow = Workflow {
        channels: 3,
        ..fixture.workflow.clone()
    };

    let mut ctx = JobContext::new(MemoryReporter::default());
    let result = pipeline::run(
        &mut ctx,
        &workflow,
        &fixture.store,
        &CopyClassifier,
        &LabelExtractor::new(0.5),
    );

    assert!(matches!(result, Err(Error::InvalidShape(_))));
    assert_eq!(ctx.status(), JobStatus::Failed);
    assert!(!fixture.store.results.exists());
}

#[cfg(unix)]
#[test]
fn test_classifier_failure_fails_job() {
    let fixture = Fixture::new(false);
    fixture.add_image("a.tif", &cubes((1, 4, 4), &[(0, 0, 0)], 1));

    let classifier = HeadlessClassifier {
        executable: "false".into(),
        project: Path::new("/app/PixelClassification3D.ilp").to_path_buf(),
    };

    let mut ctx = JobContext::new(MemoryReporter::default());
    let result = pipeline::run(
        &mut ctx,
        &fixture.workflow,
        &fixture.store,
        &classifier,
        &LabelExtractor::new(0.5),
    );

    assert!(matches!(result, Err(Error::ClassifierFailed { .. })));
    assert_eq!(ctx.status(), JobStatus::Failed);
    assert_eq!(ctx.progress(), 25);
}

#[test]
fn test_disabled_preview_drops_stale_preview() {
    let fixture = Fixture::new(false);
    fixture.add_image("a.tif", &cubes((2, 4, 4), &[(0, 0, 0)], 2));

    let stale = fixture.workflow.dirs.output.join("a_preview.png");
    fs::create_dir_all(&fixture.workflow.dirs.output).unwrap();
    fs::write(&stale, b"previous run").unwrap();

    let workflow = Workflow {
        preview: false,
        ..fixture.workflow.clone()
    };

    let mut ctx = JobContext::new(MemoryReporter::default());
    pipeline::run(
        &mut ctx,
        &workflow,
        &fixture.store,
        &CopyClassifier,
        &LabelExtractor::new(0.5),
    )
    .unwrap();

    assert!(fixture.store.results.join("a.tif").is_file());
    assert!(!fixture.store.results.join("a_preview.png").exists());
    assert!(!stale.exists());
}

#[test]
fn test_results_in_work_dir() {
    let fixture = Fixture::new(false);
    fixture.add_image("a.tif", &cubes((2, 4, 4), &[(0, 0, 0)], 2));

    let store = LocalDataStore {
        results: fixture.workflow.dirs.output.clone(),
        ..fixture.store.clone()
    };

    let mut ctx = JobContext::new(MemoryReporter::default());
    pipeline::run(
        &mut ctx,
        &fixture.workflow,
        &store,
        &CopyClassifier,
        &LabelExtractor::new(0.5),
    )
    .unwrap();

    assert_eq!(ctx.status(), JobStatus::Terminated);
    let mask = volume::read_label_volume(&store.results.join("a.tif")).unwrap();
    assert_eq!(mask.iter().filter(|&&label| label == 1).count(), 8);

    let metrics = fs::read_to_string(store.results.join("metrics.csv")).unwrap();
    assert_eq!(metrics.lines().nth(1), Some("a.tif,1,8,"));
}
