use super::types::FlowField;
use crate::error::{FlowError, Result};
use image::RgbImage;
use ndarray::{s, Array4, ArrayViewD, Axis, Ix4};

/// Conversions between frames and the tensors flow networks consume
pub struct Preprocessor;

impl Preprocessor {
    /// Convert an RGB frame into an NCHW tensor
    ///
    /// RAFT normalizes internally, so values stay in `[0, 255]`.
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn to_tensor(image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32;
            }
        }

        tensor
    }

    /// Convert a `[1, 2, H, W]` network output into an `(H, W, 2)` flow field
    pub fn flow_from_output(output: ArrayViewD<'_, f32>) -> Result<FlowField> {
        let shape = output.shape().to_vec();
        let output = output
            .into_dimensionality::<Ix4>()
            .map_err(|_| {
                FlowError::Inference(format!("expected 4D flow output, got shape {:?}", shape))
            })?;

        if shape[0] != 1 || shape[1] != 2 {
            return Err(FlowError::Inference(format!(
                "expected flow output [1, 2, H, W], got {:?}",
                shape
            )));
        }

        let flow = output
            .index_axis_move(Axis(0), 0)
            .permuted_axes([1, 2, 0])
            .as_standard_layout()
            .into_owned();

        Ok(flow)
    }
}

/// Pads NCHW tensors so height and width are multiples of a divisor
///
/// Padding is split evenly with the odd pixel at the end, and edge pixels are
/// replicated into it. The padder remembers the split so flow computed at
/// the padded size can be cropped back to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPadder {
    height: usize,
    width: usize,
    left: usize,
    right: usize,
    top: usize,
    bottom: usize,
}

impl InputPadder {
    pub fn new(height: usize, width: usize, divisor: usize) -> Self {
        let divisor = divisor.max(1);
        let pad_ht = ((height / divisor + 1) * divisor - height) % divisor;
        let pad_wd = ((width / divisor + 1) * divisor - width) % divisor;

        Self {
            height,
            width,
            left: pad_wd / 2,
            right: pad_wd - pad_wd / 2,
            top: pad_ht / 2,
            bottom: pad_ht - pad_ht / 2,
        }
    }

    /// (left, right, top, bottom)
    pub fn padding(&self) -> (usize, usize, usize, usize) {
        (self.left, self.right, self.top, self.bottom)
    }

    /// Size after padding as (height, width)
    pub fn padded_size(&self) -> (usize, usize) {
        (
            self.height + self.top + self.bottom,
            self.width + self.left + self.right,
        )
    }

    pub fn pad(&self, tensor: &Array4<f32>) -> Result<Array4<f32>> {
        let (batch, channels, height, width) = tensor.dim();
        if (height, width) != (self.height, self.width) {
            return Err(FlowError::ShapeMismatch {
                what: "padder input (width, height)",
                expected: (self.width, self.height),
                actual: (width, height),
            });
        }

        if self.padded_size() == (height, width) {
            return Ok(tensor.clone());
        }

        let (padded_height, padded_width) = self.padded_size();
        let shape = (batch, channels, padded_height, padded_width);
        let padded = Array4::from_shape_fn(shape, |(n, c, y, x)| {
            let sy = (y as isize - self.top as isize).clamp(0, height as isize - 1) as usize;
            let sx = (x as isize - self.left as isize).clamp(0, width as isize - 1) as usize;
            tensor[[n, c, sy, sx]]
        });

        Ok(padded)
    }

    /// Crop a flow field computed at the padded size back to the original size
    pub fn unpad(&self, flow: &FlowField) -> Result<FlowField> {
        let (height, width, _) = flow.dim();
        let (padded_height, padded_width) = self.padded_size();
        if (height, width) != (padded_height, padded_width) {
            return Err(FlowError::ShapeMismatch {
                what: "flow at padded size (width, height)",
                expected: (padded_width, padded_height),
                actual: (width, height),
            });
        }

        Ok(flow
            .slice(s![
                self.top..height - self.bottom,
                self.left..width - self.right,
                ..
            ])
            .to_owned())
    }
}
