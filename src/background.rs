use crate::config::BackgroundConfig;
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Mask value for pixels that differ from the background model
pub const FOREGROUND: u8 = 255;

/// Mask value for pixels that look like a shadow cast on the background
pub const SHADOW: u8 = 127;

const VAR_INIT: f32 = 15.0;
const VAR_MIN: f32 = 4.0;
const VAR_MAX: f32 = 5.0 * VAR_INIT;

// Lowest brightness ratio still treated as a shadow
const SHADOW_TAU: f32 = 0.5;

/// Trait for stateful background models
///
/// Implementations learn from every frame they see, so frames must be fed
/// in chronological order and the model reset between unrelated sequences.
pub trait BackgroundSubtractor {
    /// Classify the frame against the model and update the model with it
    ///
    /// Returns a mask of the frame's size: 0 for background, [`SHADOW`] or
    /// [`FOREGROUND`] otherwise.
    fn apply(&mut self, frame: &RgbImage) -> GrayImage;

    /// Forget everything learned so far
    fn reset(&mut self);
}

/// Black out the background of `frame`, keeping pixels the mask marks non-zero
pub fn subtract_background(
    subtractor: &mut dyn BackgroundSubtractor,
    frame: &RgbImage,
) -> RgbImage {
    let _span = tracing::debug_span!("subtract_background").entered();

    let mask = subtractor.apply(frame);
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        if mask.get_pixel(x, y)[0] != 0 {
            *frame.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Per-pixel running Gaussian background model
///
/// Each pixel keeps an RGB mean and one isotropic variance. The learning
/// rate starts high and settles at `1 / history`, the same schedule MOG2
/// uses, so the model adapts quickly on the first frames of a sequence.
pub struct RunningGaussian {
    config: BackgroundConfig,
    mean: Vec<[f32; 3]>,
    variance: Vec<f32>,
    width: u32,
    height: u32,
    frames_seen: usize,
}

impl RunningGaussian {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            config,
            mean: Vec::new(),
            variance: Vec::new(),
            width: 0,
            height: 0,
            frames_seen: 0,
        }
    }

    pub fn config(&self) -> &BackgroundConfig {
        &self.config
    }

    /// Number of frames folded into the model since the last reset
    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    fn init_model(&mut self, frame: &RgbImage) {
        let (width, height) = frame.dimensions();
        tracing::debug!("Initializing background model at {}x{}", width, height);

        self.width = width;
        self.height = height;
        self.mean = frame
            .pixels()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        self.variance = vec![VAR_INIT; self.mean.len()];
        self.frames_seen = 1;
    }

    fn learning_rate(&self) -> f32 {
        let window = (2 * self.frames_seen).min(self.config.history).max(1);
        1.0 / window as f32
    }

    fn classify(&self, pixel: [f32; 3], mean: [f32; 3], variance: f32, dist2: f32) -> u8 {
        let threshold = self.config.var_threshold * variance;
        if dist2 < threshold {
            return 0;
        }

        if self.config.detect_shadows {
            let numerator: f32 = (0..3).map(|c| pixel[c] * mean[c]).sum();
            let denominator: f32 = (0..3).map(|c| mean[c] * mean[c]).sum();

            if denominator > 0.0 {
                let ratio = numerator / denominator;
                if (SHADOW_TAU..=1.0).contains(&ratio) {
                    let dist2_scaled: f32 = (0..3)
                        .map(|c| {
                            let d = ratio * mean[c] - pixel[c];
                            d * d
                        })
                        .sum();
                    if dist2_scaled < threshold * ratio * ratio {
                        return SHADOW;
                    }
                }
            }
        }

        FOREGROUND
    }
}

impl Default for RunningGaussian {
    fn default() -> Self {
        Self::new(BackgroundConfig::default())
    }
}

impl BackgroundSubtractor for RunningGaussian {
    fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        let (width, height) = frame.dimensions();

        // A fresh model has nothing to compare against
        if self.mean.is_empty() || (width, height) != (self.width, self.height) {
            self.init_model(frame);
            return GrayImage::from_pixel(width, height, Luma([FOREGROUND]));
        }

        self.frames_seen += 1;
        let alpha = self.learning_rate();

        let mut mask = GrayImage::new(width, height);
        for (idx, (pixel, out)) in frame.pixels().zip(mask.pixels_mut()).enumerate() {
            let pixel = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
            let mean = self.mean[idx];
            let variance = self.variance[idx];

            let diff = [pixel[0] - mean[0], pixel[1] - mean[1], pixel[2] - mean[2]];
            let dist2 = diff.iter().map(|d| d * d).sum::<f32>();

            *out = Luma([self.classify(pixel, mean, variance, dist2)]);

            for c in 0..3 {
                self.mean[idx][c] += alpha * diff[c];
            }
            self.variance[idx] = (variance + alpha * (dist2 - variance)).clamp(VAR_MIN, VAR_MAX);
        }

        mask
    }

    fn reset(&mut self) {
        tracing::info!("Resetting background model");
        self.mean.clear();
        self.variance.clear();
        self.width = 0;
        self.height = 0;
        self.frames_seen = 0;
    }
}
