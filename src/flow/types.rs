use super::preprocess::InputPadder;
use crate::error::Result;
use image::RgbImage;
use ndarray::{Array3, Array4};

/// Dense optical flow: shape `(height, width, 2)`, channel 0 = dx, 1 = dy
pub type FlowField = Array3<f32>;

/// Trait for dense optical-flow networks
/// Allows swapping the production network for deterministic stand-ins
pub trait FlowModel {
    /// Estimate flow from `image_a` to `image_b`
    ///
    /// # Arguments
    /// * `image_a`, `image_b` - NCHW tensors `[1, 3, H, W]` with raw `[0, 255]`
    ///   values, already padded to [`FlowModel::divisor`]
    /// * `iterations` - Refinement iterations for recurrent models
    ///
    /// # Returns
    /// * Flow at the input resolution, `(H, W, 2)`
    fn estimate(
        &mut self,
        image_a: &Array4<f32>,
        image_b: &Array4<f32>,
        iterations: usize,
    ) -> Result<FlowField>;

    /// Spatial size inputs must be a multiple of
    fn divisor(&self) -> usize {
        8
    }

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Output of one forward/backward estimation over a frame pair
#[derive(Debug, Clone)]
pub struct FlowEstimate {
    /// Flow from frame A to frame B, at padded resolution
    pub forward: FlowField,
    /// Flow from frame B to frame A, at padded resolution
    pub backward: FlowField,
    /// `|forward + backward|` repeated over 3 channels
    pub occlusion: Array3<f32>,
    /// Frame A as fed to the model (background removed when requested)
    pub frame_a: RgbImage,
    /// Frame B as fed to the model
    pub frame_b: RgbImage,
    /// Padding applied before inference; use it to crop flow back
    pub padder: InputPadder,
}
