mod estimator;
mod preprocess;
#[cfg(feature = "onnx")]
mod raft;
mod synthetic;
pub mod types;

pub use estimator::{flow_disagreement, FlowEstimator};
pub use preprocess::{InputPadder, Preprocessor};
#[cfg(feature = "onnx")]
pub use raft::OnnxRaft;
pub use synthetic::ConstantFlow;
pub use types::{FlowEstimate, FlowField, FlowModel};

#[cfg(feature = "onnx")]
use crate::config::FlowConfig;
#[cfg(feature = "onnx")]
use crate::error::Result;

/// Create the default flow model (RAFT over ONNX Runtime)
#[cfg(feature = "onnx")]
pub fn create_default_model(config: &FlowConfig) -> Result<Box<dyn FlowModel>> {
    let model = OnnxRaft::new(config)?;
    Ok(Box::new(model))
}
