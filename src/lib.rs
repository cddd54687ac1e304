//! Optical flow and temporal-consistency masks for video stylization.
//!
//! A frame loop drives two pieces per frame pair:
//!
//! 1. [`FlowEstimator`] runs a flow network (RAFT by default) forward and
//!    backward, optionally after removing background with a caller-owned
//!    [`BackgroundSubtractor`].
//! 2. [`compute_diff_map`] turns that flow plus the previous raw, current
//!    raw and previous stylized frames into an alpha mask and the warped
//!    previous stylization, ready for [`blend`].
//!
//! ```rust,ignore
//! use flowblend::{blend, compute_diff_map, FlowConfig, FlowEstimator, RunningGaussian};
//!
//! let mut estimator = FlowEstimator::from_config(&FlowConfig::new("models/raft-things.onnx"))?;
//! let mut background = RunningGaussian::default();
//!
//! let estimate = estimator.estimate(&prev, &cur, Some(&mut background))?;
//! let diff = compute_diff_map(&estimate.forward, &estimate.backward, &prev, &cur, &prev_styled)?;
//! let output = blend(&cur_styled, &diff.warped_styled, &diff.alpha)?;
//! ```

pub mod background;
pub mod config;
pub mod diff_map;
pub mod error;
pub mod flow;
pub mod imgproc;
pub mod norm;

pub use background::{subtract_background, BackgroundSubtractor, RunningGaussian};
pub use config::{BackgroundConfig, Device, FlowConfig, RAFT_ITERATIONS};
pub use diff_map::{blend, compute_diff_map, compute_diff_map_with, DiffMap, DiffMapParams};
pub use error::{FlowError, Result};
#[cfg(feature = "onnx")]
pub use flow::{create_default_model, OnnxRaft};
pub use flow::{ConstantFlow, FlowEstimate, FlowEstimator, FlowField, FlowModel, InputPadder};
