use super::types::{FlowField, FlowModel};
use crate::error::{FlowError, Result};
use ndarray::{Array3, Array4};

/// Deterministic stand-in for a flow network
///
/// Returns the same `(dx, dy)` for every pixel in both directions, so
/// `ConstantFlow::new(0.0, 0.0)` models a static scene and a non-zero
/// vector models a forward/backward pair that fails to cancel.
#[derive(Debug, Clone, Default)]
pub struct ConstantFlow {
    dx: f32,
    dy: f32,
    calls: usize,
    last_iterations: Option<usize>,
}

impl ConstantFlow {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self {
            dx,
            dy,
            ..Self::default()
        }
    }

    /// Number of `estimate` calls so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn last_iterations(&self) -> Option<usize> {
        self.last_iterations
    }
}

impl FlowModel for ConstantFlow {
    fn estimate(
        &mut self,
        image_a: &Array4<f32>,
        image_b: &Array4<f32>,
        iterations: usize,
    ) -> Result<FlowField> {
        let (_, _, height, width) = image_a.dim();
        let (_, _, height_b, width_b) = image_b.dim();
        if (height, width) != (height_b, width_b) {
            return Err(FlowError::Inference(format!(
                "input images differ in size: {}x{} vs {}x{}",
                width, height, width_b, height_b
            )));
        }

        self.calls += 1;
        self.last_iterations = Some(iterations);

        Ok(Array3::from_shape_fn((height, width, 2), |(_, _, c)| {
            if c == 0 {
                self.dx
            } else {
                self.dy
            }
        }))
    }

    fn name(&self) -> &str {
        "constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_flow_fills_every_pixel() {
        let mut model = ConstantFlow::new(1.5, -2.0);
        let image = Array4::<f32>::zeros((1, 3, 4, 6));
        let flow = model.estimate(&image, &image, 20).unwrap();

        assert_eq!(flow.dim(), (4, 6, 2));
        assert!(flow.lanes(ndarray::Axis(2)).into_iter().all(|v| v[0] == 1.5 && v[1] == -2.0));
        assert_eq!(model.calls(), 1);
        assert_eq!(model.last_iterations(), Some(20));
    }

    #[test]
    fn test_constant_flow_rejects_mismatched_inputs() {
        let mut model = ConstantFlow::new(0.0, 0.0);
        let a = Array4::<f32>::zeros((1, 3, 4, 6));
        let b = Array4::<f32>::zeros((1, 3, 4, 5));
        assert!(model.estimate(&a, &b, 20).is_err());
        assert_eq!(model.calls(), 0);
    }
}
