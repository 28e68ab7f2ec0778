// src/threshold.rs
//
// Terrain classification over the rectified frame: three independent
// per-pixel classifiers producing binary masks (1 = class member).
//
//   navigable: all RGB channels above the bright-ground cutoff
//   obstacle:  all RGB channels below a separate, lower cutoff
//   rock:      HSV yellow band (samples are yellow rocks)

/// Convert RGB to HSV on OpenCV's 8-bit scales: H 0-180 (degrees / 2),
/// S 0-255, V 0-255. The rock band thresholds are expressed on these
/// scales, so the conversion must match them exactly.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r_n = r as f32 / 255.0;
    let g_n = g as f32 / 255.0;
    let b_n = b as f32 / 255.0;

    let max = r_n.max(g_n).max(b_n);
    let min = r_n.min(g_n).min(b_n);
    let delta = max - min;

    let h = if delta < 1e-6 {
        0.0
    } else if (max - r_n).abs() < 1e-6 {
        60.0 * (((g_n - b_n) / delta) % 6.0)
    } else if (max - g_n).abs() < 1e-6 {
        60.0 * (((b_n - r_n) / delta) + 2.0)
    } else {
        60.0 * (((r_n - g_n) / delta) + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let s = if max < 1e-6 { 0.0 } else { delta / max };

    (
        (h / 2.0).round() as u8,
        (s * 255.0).round() as u8,
        (max * 255.0).round() as u8,
    )
}

/// Pixels whose channels are all strictly above the threshold. 160 across
/// the board identifies the bright navigable ground.
pub fn navigable_mask(rgb: &[u8], width: usize, height: usize, thresh: [u8; 3]) -> Vec<u8> {
    let mut mask = vec![0u8; width * height];
    for (i, px) in rgb.chunks_exact(3).enumerate() {
        if px[0] > thresh[0] && px[1] > thresh[1] && px[2] > thresh[2] {
            mask[i] = 1;
        }
    }
    mask
}

/// Pixels whose channels are all strictly below the threshold. 140 is
/// deliberately lower than the navigable cutoff so the two classes cannot
/// overlap and the gap between them stays unclassified.
pub fn obstacle_mask(rgb: &[u8], width: usize, height: usize, thresh: [u8; 3]) -> Vec<u8> {
    let mut mask = vec![0u8; width * height];
    for (i, px) in rgb.chunks_exact(3).enumerate() {
        if px[0] < thresh[0] && px[1] < thresh[1] && px[2] < thresh[2] {
            mask[i] = 1;
        }
    }
    mask
}

/// Pixels inside the yellow HSV band, bounds inclusive on every channel.
pub fn rock_mask(
    rgb: &[u8],
    width: usize,
    height: usize,
    lower: [u8; 3],
    upper: [u8; 3],
) -> Vec<u8> {
    let mut mask = vec![0u8; width * height];
    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
        if h >= lower[0]
            && h <= upper[0]
            && s >= lower[1]
            && s <= upper[1]
            && v >= lower[2]
            && v <= upper[2]
        {
            mask[i] = 1;
        }
    }
    mask
}
