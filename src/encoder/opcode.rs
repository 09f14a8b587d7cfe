//! Match opcode encoding.
//!
//! A match opcode starts with a control byte whose top three bits hold the
//! (biased) length, `7` meaning "continued in extra bytes". Bit 4 selects the
//! pixel-distance tier and the low nibble holds the low pixel-distance bits:
//!
//! ```text
//! ctrl       LLLT PPPP      L=len (7: extended), T=far tier, P=pix bits 0..3
//! [len ext]  255* rest      only when L == 7
//! pix        PPPP PPPP      pix bits 4..11
//! short tier (T=0, pix < 2^12):
//!   image    FF II IIII     F=extra image bytes (0..3), I=image bits 0..5
//!   [image]  bits 6.., 8 per byte
//! far tier (T=1):
//!   image    FF X PPPPP     F=image bytes (0..3), X=pix >= 2^17, P=pix bits 12..16
//!   [image]  bits 0.., 8 per byte
//!   [pix]    pix bits 17..24, only when X
//! ```

use crate::config::{
    FAR_PIX_IMAGE_DIST_LEVEL_1, FAR_PIX_IMAGE_DIST_LEVEL_2, MAX_PIXEL_MEDIUM_DISTANCE,
    MAX_PIXEL_SHORT_DISTANCE, SHORT_PIX_IMAGE_DIST_LEVEL_1, SHORT_PIX_IMAGE_DIST_LEVEL_2,
    SHORT_PIX_IMAGE_DIST_LEVEL_3,
};
use crate::error::GlzError;

use super::io::OutputCursor;

/// Encoded size of a match opcode without its length-extension bytes.
pub(crate) fn encode_ref_size(image_distance: u64, pixel_distance: u64) -> usize {
    if pixel_distance < MAX_PIXEL_SHORT_DISTANCE {
        if image_distance < SHORT_PIX_IMAGE_DIST_LEVEL_1 {
            3
        } else if image_distance < SHORT_PIX_IMAGE_DIST_LEVEL_2 {
            4
        } else if image_distance < SHORT_PIX_IMAGE_DIST_LEVEL_3 {
            5
        } else {
            6
        }
    } else {
        let base = if image_distance == 0 {
            3
        } else if image_distance < FAR_PIX_IMAGE_DIST_LEVEL_1 {
            4
        } else if image_distance < FAR_PIX_IMAGE_DIST_LEVEL_2 {
            5
        } else {
            6
        };
        if pixel_distance < MAX_PIXEL_MEDIUM_DISTANCE {
            base
        } else {
            base + 1
        }
    }
}

/// Writes one match opcode. `len` is already reduced by the format's length
/// bias; `pixel_distance` by one for matches inside the same image.
pub(crate) fn encode_match(
    out: &mut OutputCursor<'_>,
    image_distance: u64,
    pixel_distance: u64,
    len: usize,
) -> Result<(), GlzError> {
    let far = pixel_distance >= MAX_PIXEL_SHORT_DISTANCE;
    let tier = if far { 16u8 } else { 0 };
    let low = (pixel_distance & 0x0f) as u8;

    if len < 7 {
        out.encode(((len as u8) << 5) + tier + low)?;
    } else {
        out.encode((7 << 5) + tier + low)?;
        let mut rest = len - 7;
        while rest >= 255 {
            out.encode(255)?;
            rest -= 255;
        }
        out.encode(rest as u8)?;
    }
    out.encode(((pixel_distance >> 4) & 255) as u8)?;

    if !far {
        let id = image_distance;
        if id < SHORT_PIX_IMAGE_DIST_LEVEL_1 {
            out.encode((id & 0x3f) as u8)?;
        } else if id < SHORT_PIX_IMAGE_DIST_LEVEL_2 {
            out.encode((1 << 6) + (id & 0x3f) as u8)?;
            out.encode(((id >> 6) & 255) as u8)?;
        } else if id < SHORT_PIX_IMAGE_DIST_LEVEL_3 {
            out.encode((2 << 6) + (id & 0x3f) as u8)?;
            out.encode(((id >> 6) & 255) as u8)?;
            out.encode(((id >> 14) & 255) as u8)?;
        } else {
            out.encode((3 << 6) + (id & 0x3f) as u8)?;
            out.encode(((id >> 6) & 255) as u8)?;
            out.encode(((id >> 14) & 255) as u8)?;
            out.encode(((id >> 22) & 255) as u8)?;
        }
    } else {
        let long = pixel_distance >= MAX_PIXEL_MEDIUM_DISTANCE;
        let ldc: u8 = if long { 32 } else { 0 };
        let mid = ((pixel_distance >> 12) & 31) as u8;
        let id = image_distance;
        if id == 0 {
            out.encode(ldc + mid)?;
        } else if id < FAR_PIX_IMAGE_DIST_LEVEL_1 {
            out.encode(ldc + (1 << 6) + mid)?;
            out.encode((id & 255) as u8)?;
        } else if id < FAR_PIX_IMAGE_DIST_LEVEL_2 {
            out.encode(ldc + (2 << 6) + mid)?;
            out.encode((id & 255) as u8)?;
            out.encode(((id >> 8) & 255) as u8)?;
        } else {
            out.encode(ldc + (3 << 6) + mid)?;
            out.encode((id & 255) as u8)?;
            out.encode(((id >> 8) & 255) as u8)?;
            out.encode(((id >> 16) & 255) as u8)?;
        }
        if long {
            out.encode(((pixel_distance >> 17) & 255) as u8)?;
        }
    }
    Ok(())
}
