//! per-image segmentation metrics

use std::{fs, path::Path};

use itertools::Itertools;
use ndarray::ArrayView3;

use crate::{
    error::{Error, Result},
    mask::BACKGROUND,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetrics {
    pub filename: String,
    pub object_count: usize,
    pub foreground_voxels: usize,
    /// foreground overlap with the ground truth, `None` without ground truth
    pub dice: Option<f64>,
}

pub fn object_count(labels: &ArrayView3<'_, u16>) -> usize {
    labels
        .iter()
        .filter(|&&label| label != BACKGROUND)
        .unique()
        .count()
}

/// Dice coefficient of the foreground (any non-zero label) of both masks. two empty masks agree
/// perfectly.
pub fn dice(prediction: &ArrayView3<'_, u16>, truth: &ArrayView3<'_, u16>) -> Result<f64> {
    if prediction.shape() != truth.shape() {
        return Err(Error::InvalidShape(format!(
            "prediction {:?} and ground truth {:?} differ in shape",
            prediction.shape(),
            truth.shape()
        )));
    }

    let (mut overlap, mut predicted, mut expected) = (0usize, 0usize, 0usize);
    for (&p, &t) in prediction.iter().zip(truth.iter()) {
        let (p, t) = (p != BACKGROUND, t != BACKGROUND);
        overlap += (p && t) as usize;
        predicted += p as usize;
        expected += t as usize;
    }

    if predicted + expected == 0 {
        return Ok(1.0);
    }
    Ok(2.0 * overlap as f64 / (predicted + expected) as f64)
}

pub fn measure(
    filename: &str,
    prediction: &ArrayView3<'_, u16>,
    truth: Option<&ArrayView3<'_, u16>>,
) -> Result<ImageMetrics> {
    let dice = truth.map(|truth| dice(prediction, truth)).transpose()?;

    Ok(ImageMetrics {
        filename: filename.to_string(),
        object_count: object_count(prediction),
        foreground_voxels: prediction
            .iter()
            .filter(|&&label| label != BACKGROUND)
            .count(),
        dice,
    })
}

/// quotes a csv field holding a separator, a quote or a line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// writes one csv row per image, leaving the dice column empty where no ground truth exists.
pub fn write_csv(path: &Path, rows: &[ImageMetrics]) -> Result<()> {
    let mut csv = String::from("filename,object_count,foreground_voxels,dice\n");
    for row in rows {
        let dice = row.dice.map(|d| format!("{:.6}", d)).unwrap_or_default();
        csv.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&row.filename),
            row.object_count,
            row.foreground_voxels,
            dice
        ));
    }

    fs::write(path, csv)?;
    log::info!("Saved metrics of {} images to {:?}", rows.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_object_count_ignores_background() {
        let labels = Array3::from_shape_vec((1, 2, 3), vec![0, 1, 1, 3, 0, 3]).unwrap();
        assert_eq!(object_count(&labels.view()), 2);
    }

    #[test]
    fn test_dice() {
        let prediction = Array3::from_shape_vec((1, 1, 4), vec![1, 1, 0, 0]).unwrap();
        let truth = Array3::from_shape_vec((1, 1, 4), vec![0, 5, 5, 0]).unwrap();
        assert_eq!(dice(&prediction.view(), &truth.view()).unwrap(), 0.5);
    }

    #[test]
    fn test_dice_both_empty() {
        let empty = Array3::<u16>::zeros((2, 2, 2));
        assert_eq!(dice(&empty.view(), &empty.view()).unwrap(), 1.0);
    }

    #[test]
    fn test_dice_shape_mismatch() {
        let a = Array3::<u16>::zeros((1, 2, 2));
        let b = Array3::<u16>::zeros((2, 2, 2));
        assert!(matches!(
            dice(&a.view(), &b.view()),
            Err(Error::InvalidShape(_))
        ));
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        let rows = vec![
            ImageMetrics {
                filename: "a.tif".into(),
                object_count: 2,
                foreground_voxels: 10,
                dice: Some(0.75),
            },
            ImageMetrics {
                filename: "b.tif".into(),
                object_count: 0,
                foreground_voxels: 0,
                dice: None,
            },
        ];
        write_csv(&path, &rows).unwrap();

        let csv = fs::read_to_string(&path).unwrap();
        assert_eq!(
            csv,
            "filename,object_count,foreground_voxels,dice\na.tif,2,10,0.750000\nb.tif,0,0,\n"
        );
    }

    #[test]
    fn test_write_csv_quotes_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        let rows = vec![
            ImageMetrics {
                filename: "cells,01.tif".into(),
                object_count: 1,
                foreground_voxels: 8,
                dice: None,
            },
            ImageMetrics {
                filename: "say \"hi\".tif".into(),
                object_count: 0,
                foreground_voxels: 0,
                dice: None,
            },
        ];
        write_csv(&path, &rows).unwrap();

        let csv = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "\"cells,01.tif\",1,8,");
        assert_eq!(lines[2], "\"say \"\"hi\"\".tif\",0,0,");
    }
}
