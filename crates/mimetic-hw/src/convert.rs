//! Pixel conversions for captured frames.

use crate::CameraError;

/// Convert packed YUYV 4:2:2 to RGB8 (BT.601, limited range).
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CameraError> {
    let pixels = width as usize * height as usize;
    if yuyv.len() < pixels * 2 {
        return Err(CameraError::Decode(format!(
            "short YUYV frame: {} bytes for {width}x{height}",
            yuyv.len()
        )));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

/// Flip an RGB8 frame horizontally in place.
pub fn mirror_rgb(rgb: &mut [u8], width: u32) {
    let row_len = width as usize * 3;
    if row_len == 0 {
        return;
    }
    for row in rgb.chunks_exact_mut(row_len) {
        let (mut left, mut right) = (0, width as usize - 1);
        while left < right {
            for c in 0..3 {
                row.swap(left * 3 + c, right * 3 + c);
            }
            left += 1;
            right -= 1;
        }
    }
}
