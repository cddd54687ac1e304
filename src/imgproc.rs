//! Small image-processing primitives the diff map is built from.
//!
//! Frames stay `RgbImage`; float planes (flow, masks) are `ndarray` arrays
//! laid out `(height, width[, channels])`.

use image::{imageops, ImageBuffer, Luma, RgbImage};
use ndarray::{Array2, Array3, Axis};

/// Extrapolation for coordinates that fall outside the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
    /// `fedcba|abcdefgh|hgfedcb`
    Reflect,
    /// `gfedcb|abcdefgh|gfedcba`
    Reflect101,
}

/// Map a possibly out-of-range coordinate into `0..len`
///
/// `len` must be non-zero.
pub fn map_coord(coord: isize, len: usize, mode: BorderMode) -> usize {
    let n = len as isize;
    if n <= 1 {
        return 0;
    }

    match mode {
        BorderMode::Replicate => coord.clamp(0, n - 1) as usize,
        BorderMode::Reflect => {
            let period = 2 * n;
            let mut c = coord % period;
            if c < 0 {
                c += period;
            }
            if c >= n {
                c = period - c - 1;
            }
            c as usize
        }
        BorderMode::Reflect101 => {
            let period = 2 * n - 2;
            let mut c = coord % period;
            if c < 0 {
                c += period;
            }
            if c >= n {
                c = period - c;
            }
            c as usize
        }
    }
}

/// Normalized 1-D Gaussian kernel of `size` taps (odd sizes keep it centred)
pub fn gaussian_kernel_1d(sigma: f32, size: usize) -> Vec<f32> {
    let center = (size / 2) as isize;
    let sigma2 = sigma * sigma;

    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let x = (i as isize - center) as f32;
            (-(x * x) / (2.0 * sigma2)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    if sum != 0.0 {
        for v in &mut kernel {
            *v /= sum;
        }
    }

    kernel
}

/// Separable Gaussian blur of a single float plane
pub fn gaussian_blur(
    plane: &Array2<f32>,
    size: usize,
    sigma: f32,
    border: BorderMode,
) -> Array2<f32> {
    let _span = tracing::debug_span!("gaussian_blur", size, sigma).entered();

    let (height, width) = plane.dim();
    if height == 0 || width == 0 || size == 0 {
        return plane.clone();
    }

    let kernel = gaussian_kernel_1d(sigma, size);
    let radius = (size / 2) as isize;

    // Horizontal pass
    let mut horizontal = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = map_coord(x as isize + k as isize - radius, width, border);
                acc += weight * plane[[y, sx]];
            }
            horizontal[[y, x]] = acc;
        }
    }

    // Vertical pass
    let mut output = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for (k, weight) in kernel.iter().enumerate() {
            let sy = map_coord(y as isize + k as isize - radius, height, border);
            let source = horizontal.row(sy);
            let mut target = output.row_mut(y);
            target.scaled_add(*weight, &source);
        }
    }

    output
}

/// Resize an `(H, W, C)` float array such as a flow field
///
/// Each channel goes through `imageops::resize` with a triangle filter, so
/// upscaling is bilinear and downscaling averages. A same-size resize is the
/// identity. Values are resampled, not rescaled.
pub fn resize_flow(source: &Array3<f32>, width: usize, height: usize) -> Array3<f32> {
    let _span = tracing::debug_span!("resize_flow", width, height).entered();

    let (src_height, src_width, channels) = source.dim();
    if (src_width, src_height) == (width, height) {
        return source.clone();
    }

    let mut output = Array3::<f32>::zeros((height, width, channels));
    if src_width == 0 || src_height == 0 || width == 0 || height == 0 {
        return output;
    }

    for (plane, mut lane) in source.axis_iter(Axis(2)).zip(output.axis_iter_mut(Axis(2))) {
        let (low, high) = plane
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let span = high - low;
        if span == 0.0 || !span.is_finite() {
            lane.fill(if low.is_finite() { low } else { 0.0 });
            continue;
        }

        // imageops clamps float samples to [0, 1]
        let image = ImageBuffer::<Luma<f32>, Vec<f32>>::from_fn(
            src_width as u32,
            src_height as u32,
            |x, y| Luma([(plane[[y as usize, x as usize]] - low) / span]),
        );

        let resized = imageops::resize(
            &image,
            width as u32,
            height as u32,
            imageops::FilterType::Triangle,
        );

        for ((y, x), v) in lane.indexed_iter_mut() {
            *v = resized.get_pixel(x as u32, y as u32)[0] * span + low;
        }
    }

    output
}

/// Nearest-neighbour remap
///
/// `map` is `(H, W, 2)` holding absolute source coordinates `(x, y)` for
/// every destination pixel; the output takes the map's size.
pub fn remap_nearest(source: &RgbImage, map: &Array3<f32>, border: BorderMode) -> RgbImage {
    let (height, width, _) = map.dim();
    let (src_width, src_height) = source.dimensions();

    if src_width == 0 || src_height == 0 {
        return RgbImage::new(width as u32, height as u32);
    }

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let sx = map[[y as usize, x as usize, 0]].round() as isize;
        let sy = map[[y as usize, x as usize, 1]].round() as isize;

        let ix = map_coord(sx, src_width as usize, border);
        let iy = map_coord(sy, src_height as usize, border);

        *source.get_pixel(ix as u32, iy as u32)
    })
}

/// Repeat a single plane across `channels` trailing channels
pub fn broadcast_channels(plane: &Array2<f32>, channels: usize) -> Array3<f32> {
    let (height, width) = plane.dim();
    let mut output = Array3::<f32>::zeros((height, width, channels));
    for mut lane in output.axis_iter_mut(Axis(2)) {
        lane.assign(plane);
    }
    output
}
