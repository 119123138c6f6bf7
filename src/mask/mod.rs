//! object label extraction from classifier probability maps

pub mod connected;
pub mod threshold;

use ndarray::{ArrayD, ArrayViewD};

pub use connected::{Connectivity, Labeling, connected_components, remove_small_objects};
pub use threshold::{LabelExtractor, binarize, extract_labels};

/// label value of background voxels
pub const BACKGROUND: u16 = 0;
/// largest label a 16-bit mask can hold
pub const MAX_LABEL: u16 = u16::MAX;

/// axis of the probability volume holding one plane per class
pub const CHANNEL_AXIS: usize = 1;
/// foreground class of a two-class pixel classification project
pub const DEFAULT_FOREGROUND_CHANNEL: usize = 1;

pub trait LabelGenerator {
    /// turns a probability volume with a channel axis at [`CHANNEL_AXIS`] into a label volume
    /// with that axis removed.
    fn labels(&self, volume: ArrayViewD<'_, f32>) -> crate::error::Result<ArrayD<u16>>;
}
