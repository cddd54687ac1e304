use super::preprocess::Preprocessor;
use super::types::{FlowField, FlowModel};
use crate::config::{Device, FlowConfig};
use crate::error::{FlowError, Result};
use ndarray::{Array1, Array4};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};

/// RAFT optical-flow network exported to ONNX
///
/// The export takes two `[1, 3, H, W]` images in `[0, 255]` and returns
/// `(flow_low, flow_up)`; only the upsampled flow (last output) is used.
/// Exports that keep the iteration count dynamic expose it as a third
/// `int64` input; otherwise the count baked into the graph applies.
pub struct OnnxRaft {
    session: Session,
    flow_output: String,
    takes_iterations: bool,
}

impl OnnxRaft {
    /// Load RAFT from an ONNX file onto the configured device
    ///
    /// # Errors
    /// * `ModelLoad` - the file is missing or is not a usable graph
    /// * `Device` - the requested device cannot be initialized
    pub fn new(config: &FlowConfig) -> Result<Self> {
        let path = config.model_path.as_path();

        tracing::info!("Loading RAFT model from {} on {}", path.display(), config.device);

        if !path.is_file() {
            return Err(FlowError::ModelLoad {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        let builder = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(config.intra_threads))
            .map_err(|e| load_error(path, e))?;

        let builder = configure_device(builder, config.device)?;

        let session = builder
            .commit_from_file(path)
            .map_err(|e| load_error(path, e))?;

        if session.inputs.len() < 2 {
            return Err(FlowError::ModelLoad {
                path: path.to_path_buf(),
                reason: format!("expected two image inputs, graph has {}", session.inputs.len()),
            });
        }

        let flow_output = session
            .outputs
            .last()
            .map(|o| o.name.clone())
            .ok_or_else(|| FlowError::ModelLoad {
                path: path.to_path_buf(),
                reason: "graph has no outputs".to_string(),
            })?;

        let takes_iterations = session.inputs.len() > 2;

        tracing::info!("RAFT model loaded successfully");
        tracing::debug!(
            "RAFT inputs: {:?}, flow output: {}, dynamic iterations: {}",
            session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            flow_output,
            takes_iterations
        );

        Ok(Self {
            session,
            flow_output,
            takes_iterations,
        })
    }
}

fn load_error(path: &Path, e: ort::Error) -> FlowError {
    FlowError::ModelLoad {
        path: PathBuf::from(path),
        reason: e.to_string(),
    }
}

fn configure_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder> {
    let device_error = |reason: String| FlowError::Device { device, reason };

    match device {
        Device::Cpu => builder
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| device_error(e.to_string())),
        Device::Cuda(index) => {
            let cuda = CUDAExecutionProvider::default().with_device_id(index as i32);
            let available = cuda.is_available().map_err(|e| device_error(e.to_string()))?;
            if !available {
                return Err(device_error("CUDA execution provider not available".to_string()));
            }

            builder
                .with_execution_providers([cuda.build().error_on_failure()])
                .map_err(|e| device_error(e.to_string()))
        }
    }
}

impl FlowModel for OnnxRaft {
    fn estimate(
        &mut self,
        image_a: &Array4<f32>,
        image_b: &Array4<f32>,
        iterations: usize,
    ) -> Result<FlowField> {
        let _span = tracing::debug_span!("raft_estimate", iterations).entered();

        let inference_error = |e: ort::Error| FlowError::Inference(e.to_string());

        let tensor_a = Tensor::from_array(image_a.clone()).map_err(inference_error)?;
        let tensor_b = Tensor::from_array(image_b.clone()).map_err(inference_error)?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = if self.takes_iterations {
            let iters = Tensor::from_array(Array1::from_elem(1, iterations as i64))
                .map_err(inference_error)?;
            self.session
                .run(ort::inputs![tensor_a, tensor_b, iters])
                .map_err(inference_error)?
        } else {
            self.session
                .run(ort::inputs![tensor_a, tensor_b])
                .map_err(inference_error)?
        };
        drop(_infer_span);

        let flow = outputs
            .get(self.flow_output.as_str())
            .ok_or_else(|| {
                FlowError::Inference(format!("output '{}' not found", self.flow_output))
            })?
            .try_extract_array::<f32>()
            .map_err(inference_error)?;

        Preprocessor::flow_from_output(flow)
    }

    fn name(&self) -> &str {
        "raft"
    }
}
