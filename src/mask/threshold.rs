use ndarray::{ArrayD, ArrayViewD, Axis};

use crate::{
    error::{Error, Result},
    mask::{
        CHANNEL_AXIS, Connectivity, DEFAULT_FOREGROUND_CHANNEL, LabelGenerator, MAX_LABEL,
        connected_components, remove_small_objects,
    },
};

/// constructs an object label volume via the following method:
/// 1. select the foreground probability channel and drop the channel axis
/// 1. binarize the channel against the threshold, ties counting as foreground
/// 1. label the connected components of the binary volume
/// 1. optionally drop components smaller than `min_object_size` voxels
#[derive(Debug, Clone, PartialEq)]
pub struct LabelExtractor {
    /// index along the channel axis holding the foreground class probability. this is fixed by
    /// the classifier project and cannot be discovered from the volume itself.
    pub foreground_channel: usize,

    /// probabilities at or above this value are foreground
    pub threshold: f32,

    pub connectivity: Connectivity,

    /// objects with fewer voxels are turned into background. 0 and 1 keep everything.
    pub min_object_size: usize,
}

impl LabelExtractor {
    pub fn new(threshold: f32) -> Self {
        Self {
            foreground_channel: DEFAULT_FOREGROUND_CHANNEL,
            threshold,
            connectivity: Connectivity::default(),
            min_object_size: 0,
        }
    }

    pub fn with_foreground_channel(mut self, foreground_channel: usize) -> Self {
        self.foreground_channel = foreground_channel;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_min_object_size(mut self, min_object_size: usize) -> Self {
        self.min_object_size = min_object_size;
        self
    }

    /// validates the volume layout and returns a view of the foreground channel with the
    /// channel axis removed.
    pub fn foreground<'a>(&self, volume: ArrayViewD<'a, f32>) -> Result<ArrayViewD<'a, f32>> {
        let shape = volume.shape();

        if shape.len() <= CHANNEL_AXIS {
            return Err(Error::InvalidShape(format!(
                "expected a channel axis at index {}, got shape {:?}",
                CHANNEL_AXIS, shape
            )));
        }

        let channels = shape[CHANNEL_AXIS];
        if channels < 2 {
            return Err(Error::InvalidShape(format!(
                "expected at least 2 probability channels, got shape {:?}",
                shape
            )));
        }
        if self.foreground_channel >= channels {
            return Err(Error::InvalidShape(format!(
                "foreground channel {} is out of range for {} channels",
                self.foreground_channel, channels
            )));
        }

        let spatial_shape: Vec<usize> = shape
            .iter()
            .enumerate()
            .filter_map(|(axis, &len)| (axis != CHANNEL_AXIS).then_some(len))
            .collect();
        if spatial_shape.contains(&0) {
            return Err(Error::EmptyVolume {
                shape: spatial_shape,
            });
        }

        Ok(volume.index_axis_move(Axis(CHANNEL_AXIS), self.foreground_channel))
    }
}

impl LabelGenerator for LabelExtractor {
    fn labels(&self, volume: ArrayViewD<'_, f32>) -> Result<ArrayD<u16>> {
        let probabilities = self.foreground(volume)?;

        log::debug!(
            "Binarizing channel {} of {:?} at threshold {}",
            self.foreground_channel,
            probabilities.shape(),
            self.threshold
        );
        let binary = binarize(&probabilities, self.threshold);

        log::debug!("Labeling Connected Components");
        let mut labeling = connected_components(&binary.view(), self.connectivity)?;

        if self.min_object_size > 1 {
            labeling = remove_small_objects(labeling, self.min_object_size);
        }

        log::trace!("objects: {}", labeling.count);

        if labeling.count > MAX_LABEL as usize {
            return Err(Error::CapacityExceeded {
                count: labeling.count,
            });
        }

        // SAFETY: every label is at most `count`, checked above to fit 16 bits
        Ok(labeling.labels.mapv(|label| label as u16))
    }
}

/// thresholds into a freshly allocated volume, leaving the probabilities untouched. NaN is
/// background.
pub fn binarize(probabilities: &ArrayViewD<'_, f32>, threshold: f32) -> ArrayD<bool> {
    probabilities.mapv(|probability| probability >= threshold)
}

/// labels the objects of a probability volume using channel 1 as foreground and orthogonal
/// connectivity.
pub fn extract_labels(volume: ArrayViewD<'_, f32>, threshold: f32) -> Result<ArrayD<u16>> {
    LabelExtractor::new(threshold).labels(volume)
}
