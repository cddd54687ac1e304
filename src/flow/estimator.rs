use super::preprocess::{InputPadder, Preprocessor};
use super::types::{FlowEstimate, FlowField, FlowModel};
use crate::background::{subtract_background, BackgroundSubtractor};
use crate::config::RAFT_ITERATIONS;
use crate::error::{FlowError, Result};
use crate::imgproc::broadcast_channels;
use image::RgbImage;
use ndarray::{Array2, Axis, Zip};

#[cfg(feature = "onnx")]
use crate::config::FlowConfig;

/// Runs a flow model forward and backward over frame pairs
///
/// The estimator owns its model for its whole lifetime. Build a new one to
/// change device or weights.
pub struct FlowEstimator {
    model: Box<dyn FlowModel>,
    iterations: usize,
}

impl FlowEstimator {
    pub fn new(model: Box<dyn FlowModel>) -> Self {
        Self {
            model,
            iterations: RAFT_ITERATIONS,
        }
    }

    /// Load the default RAFT model described by `config`
    #[cfg(feature = "onnx")]
    pub fn from_config(config: &FlowConfig) -> Result<Self> {
        let model = super::create_default_model(config)?;
        Ok(Self::new(model).with_iterations(config.iterations))
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Estimate forward and backward flow between two frames
    ///
    /// # Arguments
    /// * `frame_a`, `frame_b` - Consecutive frames of identical size
    /// * `background` - When given, both frames are masked by the
    ///   background model first (frame A, then frame B), updating it
    ///
    /// Returns flow at the model's padded resolution together with the
    /// frames actually fed to the model.
    pub fn estimate(
        &mut self,
        frame_a: &RgbImage,
        frame_b: &RgbImage,
        background: Option<&mut dyn BackgroundSubtractor>,
    ) -> Result<FlowEstimate> {
        let _span = tracing::debug_span!("estimate_flow", model = self.model.name()).entered();

        if frame_a.dimensions() != frame_b.dimensions() {
            return Err(FlowError::shape(
                "frame pair (width, height)",
                frame_a.dimensions(),
                frame_b.dimensions(),
            ));
        }

        let (frame_a, frame_b) = match background {
            Some(subtractor) => {
                let a = subtract_background(subtractor, frame_a);
                let b = subtract_background(subtractor, frame_b);
                (a, b)
            }
            None => (frame_a.clone(), frame_b.clone()),
        };

        let (width, height) = frame_a.dimensions();
        let padder = InputPadder::new(height as usize, width as usize, self.model.divisor());

        let image_a = padder.pad(&Preprocessor::to_tensor(&frame_a))?;
        let image_b = padder.pad(&Preprocessor::to_tensor(&frame_b))?;

        tracing::debug!(
            "Estimating flow at {:?} (frame {}x{})",
            padder.padded_size(),
            width,
            height
        );

        let forward = self.model.estimate(&image_a, &image_b, self.iterations)?;
        let backward = self.model.estimate(&image_b, &image_a, self.iterations)?;

        if forward.dim() != backward.dim() {
            return Err(FlowError::Inference(format!(
                "forward flow {:?} and backward flow {:?} differ in shape",
                forward.dim(),
                backward.dim()
            )));
        }

        let occlusion = broadcast_channels(&flow_disagreement(&forward, &backward)?, 3);

        Ok(FlowEstimate {
            forward,
            backward,
            occlusion,
            frame_a,
            frame_b,
            padder,
        })
    }
}

/// Per-pixel `|forward + backward|`
///
/// Consistent flow pairs cancel out; large values flag occlusions and
/// motion boundaries.
pub fn flow_disagreement(forward: &FlowField, backward: &FlowField) -> Result<Array2<f32>> {
    let (height, width, channels) = forward.dim();
    if channels != 2 || forward.dim() != backward.dim() {
        return Err(FlowError::ShapeMismatch {
            what: "flow pair (width, height)",
            expected: (width, height),
            actual: (backward.dim().1, backward.dim().0),
        });
    }

    let mut norm = Array2::<f32>::zeros((height, width));
    Zip::from(&mut norm)
        .and(forward.lanes(Axis(2)))
        .and(backward.lanes(Axis(2)))
        .for_each(|out, f, b| {
            let dx = f[0] + b[0];
            let dy = f[1] + b[1];
            *out = (dx * dx + dy * dy).sqrt();
        });

    Ok(norm)
}
