use std::fmt;
use std::path::{Path, PathBuf};

/// Refinement iterations RAFT runs per flow estimate
pub const RAFT_ITERATIONS: usize = 20;

/// Default location of the exported RAFT weights
pub const DEFAULT_MODEL_PATH: &str = "models/raft-things.onnx";

/// Compute device for flow inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    /// CUDA GPU with the given device index
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(index) => write!(f, "cuda:{}", index),
        }
    }
}

/// Configuration for loading the flow model
///
/// Everything here is consumed once, when the model is built. To move to
/// another device or weight file, build a new estimator.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Path to the RAFT ONNX export
    pub model_path: PathBuf,
    pub device: Device,
    /// Refinement iterations per estimate
    pub iterations: usize,
    /// Intra-op threads for the inference session
    pub intra_threads: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            device: Device::Cpu,
            iterations: RAFT_ITERATIONS,
            intra_threads: 4,
        }
    }
}

impl FlowConfig {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self
    }
}

/// Parameters of the running background model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundConfig {
    /// Number of frames the learning rate settles to (rate = 1 / history)
    pub history: usize,
    /// Squared Mahalanobis distance below which a pixel is background
    pub var_threshold: f32,
    /// Mark darker copies of the background as shadow (127) instead of foreground
    pub detect_shadows: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            detect_shadows: true,
        }
    }
}

impl BackgroundConfig {
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    pub fn with_var_threshold(mut self, var_threshold: f32) -> Self {
        self.var_threshold = var_threshold;
        self
    }

    pub fn with_detect_shadows(mut self, detect_shadows: bool) -> Self {
        self.detect_shadows = detect_shadows;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_config_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.iterations, 20);
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.model_path, PathBuf::from("models/raft-things.onnx"));
    }

    #[test]
    fn test_flow_config_builder() {
        let config = FlowConfig::new("weights/raft-small.onnx")
            .with_device(Device::Cuda(1))
            .with_iterations(12);
        assert_eq!(config.device, Device::Cuda(1));
        assert_eq!(config.iterations, 12);
        assert_eq!(config.device.to_string(), "cuda:1");
    }

    #[test]
    fn test_background_config_defaults() {
        let config = BackgroundConfig::default();
        assert_eq!(config.history, 500);
        assert_eq!(config.var_threshold, 16.0);
        assert!(config.detect_shadows);
    }
}
