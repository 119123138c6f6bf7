//! invocation of the external pixel classifier

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};

use crate::error::{Error, Result};

pub trait Classifier {
    /// classifies every input and returns the probability map of each, in input order.
    fn classify(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// where the classifier exports the probabilities of `input`: `<output_dir>/<input stem>.tiff`
pub fn probability_path(output_dir: &Path, input: &Path) -> PathBuf {
    let mut nickname = input.file_stem().unwrap_or_default().to_os_string();
    nickname.push(".tiff");
    output_dir.join(nickname)
}

/// runs a headless pixel classification project (ilastik) as a subprocess.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessClassifier {
    /// launcher script of the classifier
    pub executable: PathBuf,
    /// trained pixel classification project
    pub project: PathBuf,
}

impl HeadlessClassifier {
    pub fn arguments(&self, inputs: &[PathBuf], output_dir: &Path) -> Vec<OsString> {
        let mut project = OsString::from("--project=");
        project.push(&self.project);

        let mut filename_format = OsString::from("--output_filename_format=");
        filename_format.push(output_dir.join("{nickname}.tiff"));

        let mut arguments = vec![
            OsString::from("--headless"),
            project,
            OsString::from("--export_source=Probabilities"),
            OsString::from("--output_format=multipage tiff"),
            filename_format,
        ];
        arguments.extend(inputs.iter().map(|input| input.as_os_str().to_os_string()));
        arguments
    }
}

impl Classifier for HeadlessClassifier {
    fn classify(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<Vec<PathBuf>> {
        log::info!(
            "Running {:?} with project {:?} on {} images",
            self.executable,
            self.project,
            inputs.len()
        );

        let status = Command::new(&self.executable)
            .args(self.arguments(inputs, output_dir))
            .status()?;

        if !status.success() {
            log::error!("Classifier exited with {}", status);
            return Err(Error::ClassifierFailed { status });
        }

        Ok(inputs
            .iter()
            .map(|input| probability_path(output_dir, input))
            .collect())
    }
}
