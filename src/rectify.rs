// src/rectify.rs
//
// Perspective rectification: warps the raw camera frame into a top-down,
// metrically scaled view through a fixed homography derived from four
// calibration point correspondences.

use anyhow::{anyhow, Result};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::types::{Frame, PerceptionConfig};

/// A 3x3 projective transform between two image planes.
#[derive(Debug, Clone)]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    /// Compute the homography mapping 4 source points onto 4 destination
    /// points. With exactly four correspondences the system is determined,
    /// so h33 is fixed at 1 and the remaining 8 coefficients come from an
    /// 8x8 LU solve. Returns `None` for degenerate input (collinear or
    /// coincident points).
    pub fn between(src: &[[f32; 2]; 4], dst: &[[f32; 2]; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for i in 0..4 {
            let sx = src[i][0] as f64;
            let sy = src[i][1] as f64;
            let dx = dst[i][0] as f64;
            let dy = dst[i][1] as f64;

            a[(i * 2, 0)] = sx;
            a[(i * 2, 1)] = sy;
            a[(i * 2, 2)] = 1.0;
            a[(i * 2, 6)] = -sx * dx;
            a[(i * 2, 7)] = -sy * dx;
            b[i * 2] = dx;

            a[(i * 2 + 1, 3)] = sx;
            a[(i * 2 + 1, 4)] = sy;
            a[(i * 2 + 1, 5)] = 1.0;
            a[(i * 2 + 1, 6)] = -sx * dy;
            a[(i * 2 + 1, 7)] = -sy * dy;
            b[i * 2 + 1] = dy;
        }

        let h = a.lu().solve(&b)?;
        Some(Self {
            m: Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0),
        })
    }

    pub fn inverse(&self) -> Option<Self> {
        self.m.try_inverse().map(|m| Self { m })
    }

    /// Project a point through the transform (homogeneous divide).
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let p = self.m * Vector3::new(x as f64, y as f64, 1.0);
        ((p.x / p.z) as f32, (p.y / p.z) as f32)
    }
}

/// Fixed warp derived once from the perception config: the calibration quad
/// in the raw image against a square centred at the bottom of the frame,
/// offset for the camera mount sitting ahead of the ground contact point.
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Destination-to-source mapping used by the warp.
    warp: Homography,
    /// Rover-space pixels per world unit (2 * dst_size).
    pub scale: f32,
}

impl Calibration {
    pub fn new(cfg: &PerceptionConfig) -> Result<Self> {
        let w = cfg.frame_width as f32;
        let h = cfg.frame_height as f32;
        let d = cfg.dst_size;
        let off = cfg.bottom_offset;

        let dst = [
            [w / 2.0 - d, h - off],
            [w / 2.0 + d, h - off],
            [w / 2.0 + d, h - 2.0 * d - off],
            [w / 2.0 - d, h - 2.0 * d - off],
        ];

        let forward = Homography::between(&cfg.src_quad, &dst)
            .ok_or_else(|| anyhow!("calibration quad is degenerate"))?;
        let warp = forward
            .inverse()
            .ok_or_else(|| anyhow!("calibration homography is not invertible"))?;

        Ok(Self {
            warp,
            scale: 2.0 * d,
        })
    }
}

/// Resample a frame through the calibration warp, producing a rectified
/// frame of identical dimensions. Inverse mapping with bilinear sampling;
/// destination pixels that map outside the source stay black.
pub fn warp_perspective(frame: &Frame, cal: &Calibration) -> Vec<u8> {
    let w = frame.width;
    let h = frame.height;
    let mut dst = vec![0u8; w * h * 3];

    for dy in 0..h {
        for dx in 0..w {
            let (sx, sy) = cal.warp.project(dx as f32, dy as f32);
            if sx < 0.0 || sy < 0.0 || sx > (w - 1) as f32 || sy > (h - 1) as f32 {
                continue;
            }

            let sx0 = sx.floor() as usize;
            let sy0 = sy.floor() as usize;
            let sx1 = (sx0 + 1).min(w - 1);
            let sy1 = (sy0 + 1).min(h - 1);

            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = frame.data[(sy0 * w + sx0) * 3 + c] as f32;
                let p10 = frame.data[(sy0 * w + sx1) * 3 + c] as f32;
                let p01 = frame.data[(sy1 * w + sx0) * 3 + c] as f32;
                let p11 = frame.data[(sy1 * w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * w + dx) * 3 + c] = val.round() as u8;
            }
        }
    }

    dst
}
