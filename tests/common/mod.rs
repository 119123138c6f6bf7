//! Shared fixtures for the objseg integration tests

#![allow(dead_code)]

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use ndarray::{Array3, Array4};
use objseg::{
    Result,
    classifier::{Classifier, probability_path},
};
use tiff::encoder::{TiffEncoder, colortype};

/// a two-class `[z, channel, y, x]` volume whose channel 1 is `foreground`
pub fn two_class_volume(foreground: &Array3<f32>) -> Array4<f32> {
    let (depth, height, width) = foreground.dim();
    Array4::from_shape_fn((depth, 2, height, width), |(z, c, y, x)| {
        let p = foreground[[z, y, x]];
        if c == 1 { p } else { 1.0 - p }
    })
}

/// writes a volume the way the classifier exports it: one float page per (z, channel)
pub fn write_probability_tiff(path: &Path, volume: &Array4<f32>) {
    let (_, _, height, width) = volume.dim();
    let samples: Vec<f32> = volume.iter().copied().collect();

    let mut file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(&mut file).unwrap();
    for page in samples.chunks(height * width) {
        encoder
            .write_image::<colortype::Gray32Float>(width as u32, height as u32, page)
            .unwrap();
    }
}

/// a foreground map with cubes of probability 1.0 at the given (z, y, x) corners
pub fn cubes(
    shape: (usize, usize, usize),
    corners: &[(usize, usize, usize)],
    side: usize,
) -> Array3<f32> {
    let mut foreground = Array3::zeros(shape);
    for &(z, y, x) in corners {
        foreground
            .slice_mut(ndarray::s![z..z + side, y..y + side, x..x + side])
            .fill(1.0);
    }
    foreground
}

/// stands in for the external classifier: the inputs already are probability maps, so they are
/// copied to where the classifier would export them.
pub struct CopyClassifier;

impl Classifier for CopyClassifier {
    fn classify(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<Vec<PathBuf>> {
        inputs
            .iter()
            .map(|input| -> Result<PathBuf> {
                let output = probability_path(output_dir, input);
                fs::copy(input, &output)?;
                Ok(output)
            })
            .collect()
    }
}
