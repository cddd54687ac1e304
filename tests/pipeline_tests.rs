//! End-to-end tests driving the estimator and diff map the way a frame loop does.

use anyhow::Result;
use flowblend::{blend, compute_diff_map, ConstantFlow, FlowError, FlowEstimator, RunningGaussian};
use image::{Rgb, RgbImage};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn solid(width: u32, height: u32, value: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(value))
}

#[test]
fn test_solid_frames_with_zero_flow() -> Result<()> {
    init_logging();

    let prev = solid(4, 4, [30, 60, 90]);
    let cur = solid(4, 4, [30, 60, 90]);
    let prev_styled = prev.clone();

    let mut estimator = FlowEstimator::new(Box::new(ConstantFlow::new(0.0, 0.0)));
    let estimate = estimator.estimate(&prev, &cur, None)?;

    // Padded to 8x8, but the diff map resizes back to the frame
    assert_eq!(estimate.forward.dim(), (8, 8, 2));

    let diff = compute_diff_map(&estimate.forward, &estimate.backward, &prev, &cur, &prev_styled)?;

    assert_eq!(diff.alpha.dim(), (4, 4, 3));
    assert!(diff.alpha.iter().all(|v| *v < 1e-6));
    assert_eq!(diff.warped_styled, prev_styled);
    Ok(())
}

#[test]
fn test_static_scene_reuses_previous_stylization() -> Result<()> {
    init_logging();

    let frame = RgbImage::from_fn(24, 16, |x, y| Rgb([(x * 7) as u8, (y * 9) as u8, 120]));
    let prev_styled = RgbImage::from_fn(24, 16, |x, y| Rgb([(x * 7) as u8, (y * 9) as u8, 121]));
    let cur_styled = solid(24, 16, [255, 0, 0]);

    let mut estimator = FlowEstimator::new(Box::new(ConstantFlow::new(0.0, 0.0)));
    let estimate = estimator.estimate(&frame, &frame, None)?;
    let diff =
        compute_diff_map(&estimate.forward, &estimate.backward, &frame, &frame, &prev_styled)?;

    // A one-level styling difference barely registers
    assert!(diff.alpha.iter().all(|v| *v < 0.01));

    let output = blend(&cur_styled, &diff.warped_styled, &diff.alpha)?;
    for (out, prev) in output.pixels().zip(prev_styled.pixels()) {
        for c in 0..3 {
            assert!((out[c] as i16 - prev[c] as i16).abs() <= 3);
        }
    }
    Ok(())
}

#[test]
fn test_inconsistent_flow_prefers_fresh_stylization() -> Result<()> {
    init_logging();

    let frame = solid(16, 16, [80, 80, 80]);
    let cur_styled = solid(16, 16, [10, 200, 30]);

    // Forward and backward point the same way: nothing cancels
    let mut estimator = FlowEstimator::new(Box::new(ConstantFlow::new(5.0, 5.0)));
    let estimate = estimator.estimate(&frame, &frame, None)?;
    let magnitude = (10.0f32 * 10.0 * 2.0).sqrt();
    assert!(estimate.occlusion.iter().all(|v| (v - magnitude).abs() < 1e-4));

    let diff = compute_diff_map(&estimate.forward, &estimate.backward, &frame, &frame, &frame)?;
    assert!(diff.alpha.iter().all(|v| (v - 1.0).abs() < 1e-5));

    let output = blend(&cur_styled, &diff.warped_styled, &diff.alpha)?;
    assert_eq!(output, cur_styled);
    Ok(())
}

#[test]
fn test_background_model_threads_through_sequence() -> Result<()> {
    init_logging();

    let mut estimator = FlowEstimator::new(Box::new(ConstantFlow::new(0.0, 0.0)));
    let mut background = RunningGaussian::default();

    let still = solid(16, 16, [100, 100, 100]);
    for _ in 0..5 {
        estimator.estimate(&still, &still, Some(&mut background))?;
    }
    assert_eq!(background.frames_seen(), 10);

    let moved = RgbImage::from_fn(16, 16, |x, _| {
        if x < 4 {
            Rgb([250, 250, 250])
        } else {
            Rgb([100, 100, 100])
        }
    });
    let estimate = estimator.estimate(&still, &moved, Some(&mut background))?;

    assert_eq!(*estimate.frame_a.get_pixel(10, 10), Rgb([0, 0, 0]));
    assert_eq!(*estimate.frame_b.get_pixel(1, 1), Rgb([250, 250, 250]));
    assert_eq!(*estimate.frame_b.get_pixel(10, 10), Rgb([0, 0, 0]));
    Ok(())
}

#[test]
fn test_mismatched_frames_fail() {
    let zero = ndarray::Array3::<f32>::zeros((8, 8, 2));
    let result = compute_diff_map(
        &zero,
        &zero,
        &solid(8, 8, [0, 0, 0]),
        &solid(8, 8, [0, 0, 0]),
        &solid(6, 8, [0, 0, 0]),
    );
    assert!(matches!(result, Err(FlowError::ShapeMismatch { .. })));
}

#[cfg(feature = "onnx")]
#[test]
fn test_missing_weights_fail_to_load() {
    let config = flowblend::FlowConfig::new("does/not/exist/raft.onnx");
    let result = FlowEstimator::from_config(&config);
    assert!(matches!(result, Err(FlowError::ModelLoad { .. })));
}
