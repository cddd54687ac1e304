//! Temporal-consistency blending masks.
//!
//! The previous frame (raw and stylized) is pulled into alignment with the
//! current frame along the backward flow. Where the warp fails, because the
//! flow pair disagrees or the warped pixels no longer match the current
//! frame, the mask rises towards 1 and the fresh stylization wins; elsewhere
//! the warped previous stylization is reused.

use crate::error::{FlowError, Result};
use crate::flow::{flow_disagreement, FlowField};
use crate::imgproc::{
    broadcast_channels, gaussian_blur, remap_nearest, resize_flow, BorderMode,
};
use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3, Zip};

/// Flow components below this magnitude are treated as noise
pub const NOISE_THRESHOLD: f32 = 3.0;

/// Weights and smoothing for the alpha mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffMapParams {
    /// Flow components with `|v|` below this are zeroed
    pub noise_threshold: f32,
    /// Weight of the forward/backward disagreement
    pub occlusion_weight: f32,
    /// Weight of the warped-raw vs current-raw difference
    pub frame_diff_weight: f32,
    /// Weight of the warped-stylized vs current-raw difference
    pub styled_diff_weight: f32,
    /// Gaussian kernel size (odd)
    pub blur_size: usize,
    pub blur_sigma: f32,
}

impl Default for DiffMapParams {
    fn default() -> Self {
        Self {
            noise_threshold: NOISE_THRESHOLD,
            occlusion_weight: 0.3,
            frame_diff_weight: 4.0,
            styled_diff_weight: 2.0,
            blur_size: 51,
            blur_sigma: 5.0,
        }
    }
}

/// Alpha mask plus the previous stylized frame warped onto the current one
#[derive(Debug, Clone)]
pub struct DiffMap {
    /// `(H, W, 3)` in `[0, 1]`; 1 keeps the current stylized frame
    pub alpha: Array3<f32>,
    pub warped_styled: RgbImage,
}

/// Build the blending mask for the current frame with default parameters
///
/// See [`compute_diff_map_with`].
pub fn compute_diff_map(
    flow_forward: &FlowField,
    flow_backward: &FlowField,
    frame_prev: &RgbImage,
    frame_cur: &RgbImage,
    frame_prev_styled: &RgbImage,
) -> Result<DiffMap> {
    compute_diff_map_with(
        &DiffMapParams::default(),
        flow_forward,
        flow_backward,
        frame_prev,
        frame_cur,
        frame_prev_styled,
    )
}

/// Build the blending mask for the current frame
///
/// # Arguments
/// * `flow_forward`, `flow_backward` - Flow at any resolution; both are
///   resized to the current frame
/// * `frame_prev` - Previous raw frame
/// * `frame_cur` - Current raw frame, defines the output size
/// * `frame_prev_styled` - Previous stylized frame
///
/// # Errors
/// * `ShapeMismatch` - a frame differs in size from `frame_cur`, or a flow
///   field is not 2-channel
pub fn compute_diff_map_with(
    params: &DiffMapParams,
    flow_forward: &FlowField,
    flow_backward: &FlowField,
    frame_prev: &RgbImage,
    frame_cur: &RgbImage,
    frame_prev_styled: &RgbImage,
) -> Result<DiffMap> {
    let _span = tracing::debug_span!("compute_diff_map").entered();

    let (width, height) = frame_cur.dimensions();
    if frame_prev_styled.dimensions() != (width, height) {
        return Err(FlowError::shape(
            "previous stylized frame (width, height)",
            (width, height),
            frame_prev_styled.dimensions(),
        ));
    }
    if frame_prev.dimensions() != (width, height) {
        return Err(FlowError::shape(
            "previous frame (width, height)",
            (width, height),
            frame_prev.dimensions(),
        ));
    }
    check_flow("forward flow", flow_forward, width, height)?;
    check_flow("backward flow", flow_backward, width, height)?;

    let (width, height) = (width as usize, height as usize);

    tracing::debug!(
        "Resizing flow from {:?} to {}x{}",
        flow_forward.dim(),
        width,
        height
    );
    let mut forward = resize_flow(flow_forward, width, height);
    let mut backward = resize_flow(flow_backward, width, height);

    denoise_flow(&mut forward, params.noise_threshold);
    denoise_flow(&mut backward, params.noise_threshold);

    // Remap pulls source pixels, so the current->previous flow is the one to follow
    let map = sampling_map(&backward);
    let warped = remap_nearest(frame_prev, &map, BorderMode::Reflect);
    let warped_styled = remap_nearest(frame_prev_styled, &map, BorderMode::Reflect);

    let occlusion = flow_disagreement(&forward, &backward)?;
    let diff_org = frame_difference(&warped, frame_cur);
    let diff_stl = frame_difference(&warped_styled, frame_cur);

    let fused = fuse_signals(params, &occlusion, &diff_org, &diff_stl);

    let mut alpha = gaussian_blur(&fused, params.blur_size, params.blur_sigma, BorderMode::Reflect);
    alpha.mapv_inplace(|v| v.clamp(0.0, 1.0));

    Ok(DiffMap {
        alpha: broadcast_channels(&alpha, 3),
        warped_styled,
    })
}

fn check_flow(what: &'static str, flow: &FlowField, width: u32, height: u32) -> Result<()> {
    let (flow_height, flow_width, channels) = flow.dim();
    let empty = flow_height == 0 || flow_width == 0;
    if channels != 2 || (empty && width > 0 && height > 0) {
        return Err(FlowError::ShapeMismatch {
            what,
            expected: (width as usize, height as usize),
            actual: (flow_width, flow_height),
        });
    }
    Ok(())
}

/// Zero every flow component whose magnitude is below `threshold`
pub fn denoise_flow(flow: &mut FlowField, threshold: f32) {
    flow.mapv_inplace(|v| if v.abs() < threshold { 0.0 } else { v });
}

/// Absolute sampling coordinates: identity grid plus the flow
pub fn sampling_map(flow: &FlowField) -> Array3<f32> {
    let mut map = flow.clone();
    for ((y, x, c), v) in map.indexed_iter_mut() {
        *v += if c == 0 { x as f32 } else { y as f32 };
    }
    map
}

/// Warp `frame` along `backward` flow into the current frame's alignment
pub fn warp_frame(frame: &RgbImage, backward: &FlowField) -> RgbImage {
    remap_nearest(frame, &sampling_map(backward), BorderMode::Reflect)
}

/// Per-pixel maximum over channels of `|a - b| / 255`
pub fn frame_difference(a: &RgbImage, b: &RgbImage) -> Array2<f32> {
    let (width, height) = a.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let pa = a.get_pixel(x as u32, y as u32);
        let pb = b.get_pixel(x as u32, y as u32);
        (0..3)
            .map(|c| (pa[c] as f32 - pb[c] as f32).abs() / 255.0)
            .fold(0.0f32, f32::max)
    })
}

/// Element-wise maximum of the three weighted signals
pub fn fuse_signals(
    params: &DiffMapParams,
    occlusion: &Array2<f32>,
    diff_org: &Array2<f32>,
    diff_stl: &Array2<f32>,
) -> Array2<f32> {
    let mut fused = Array2::<f32>::zeros(occlusion.dim());
    Zip::from(&mut fused)
        .and(occlusion)
        .and(diff_org)
        .and(diff_stl)
        .for_each(|out, &o, &d_org, &d_stl| {
            *out = (o * params.occlusion_weight)
                .max(d_org * params.frame_diff_weight)
                .max(d_stl * params.styled_diff_weight);
        });
    fused
}

/// Blend `cur_styled * alpha + warped_styled * (1 - alpha)`
pub fn blend(
    cur_styled: &RgbImage,
    warped_styled: &RgbImage,
    alpha: &Array3<f32>,
) -> Result<RgbImage> {
    let (width, height) = cur_styled.dimensions();
    if warped_styled.dimensions() != (width, height) {
        return Err(FlowError::shape(
            "warped stylized frame (width, height)",
            (width, height),
            warped_styled.dimensions(),
        ));
    }
    let (alpha_height, alpha_width, channels) = alpha.dim();
    if (alpha_width, alpha_height) != (width as usize, height as usize) || channels != 3 {
        return Err(FlowError::ShapeMismatch {
            what: "alpha mask (width, height)",
            expected: (width as usize, height as usize),
            actual: (alpha_width, alpha_height),
        });
    }

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let cur = cur_styled.get_pixel(x, y);
        let warped = warped_styled.get_pixel(x, y);
        let mut out = [0u8; 3];
        for c in 0..3 {
            let a = alpha[[y as usize, x as usize, c]];
            let v = cur[c] as f32 * a + warped[c] as f32 * (1.0 - a);
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    }))
}
