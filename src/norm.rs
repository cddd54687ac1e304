//! Range conversions between natural pixel/flow units and network-friendly ranges.
//!
//! All of these are plain affine maps with exact inverses and no clipping.
//! Apply them to arrays with `mapv`, e.g. `occlusion.mapv(occl_norm)`.

/// `[0, 255]` frame values to `[-1, 1]`
pub fn frames_norm(x: f32) -> f32 {
    x / 127.5 - 1.0
}

/// Inverse of [`frames_norm`]
pub fn frames_renorm(x: f32) -> f32 {
    (x + 1.0) * 127.5
}

/// `[0, 255]` occlusion magnitude to `[-1, 1]`
pub fn occl_norm(x: f32) -> f32 {
    x / 127.5 - 1.0
}

/// Inverse of [`occl_norm`]
pub fn occl_renorm(x: f32) -> f32 {
    (x + 1.0) * 127.5
}

/// Scale a flow component down by 255
pub fn flow_norm(x: f32) -> f32 {
    x / 255.0
}

/// Inverse of [`flow_norm`]
pub fn flow_renorm(x: f32) -> f32 {
    x * 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn test_occlusion_round_trip() {
        for i in 0..=510 {
            let x = i as f32 * 0.5;
            assert_relative_eq!(occl_renorm(occl_norm(x)), x, epsilon = 1e-4);
            assert_relative_eq!(frames_renorm(frames_norm(x)), x, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_flow_round_trip() {
        for i in 0..=510 {
            let x = i as f32 * 0.5;
            assert_relative_eq!(flow_renorm(flow_norm(x)), x, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_ranges() {
        assert_relative_eq!(occl_norm(0.0), -1.0);
        assert_relative_eq!(occl_norm(255.0), 1.0);
        assert_relative_eq!(flow_norm(255.0), 1.0);
    }

    #[test]
    fn test_no_clipping_outside_range() {
        assert_relative_eq!(occl_norm(510.0), 3.0);
        assert_relative_eq!(occl_renorm(-3.0), -255.0);
        assert_relative_eq!(flow_norm(-255.0), -1.0);
    }

    #[test]
    fn test_mapv_over_arrays() {
        let flow = Array2::from_shape_fn((2, 3), |(y, x)| (y * 3 + x) as f32 * 10.0);
        let restored = flow.mapv(flow_norm).mapv(flow_renorm);
        for (a, b) in flow.iter().zip(restored.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-4);
        }
    }
}
