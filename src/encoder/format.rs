//! Per-format pixel access for the generic compress loop.
//!
//! Each format defines what a compression unit is, when two units count as
//! equal, how a literal unit is written and how three units hash.

use crate::error::GlzError;

use super::io::OutputCursor;

pub(crate) trait PixelFormat {
    type Pixel: Copy;

    /// Scanline bytes one unit occupies.
    const UNIT_BYTES: usize;
    /// Units that must match before a reference is considered.
    const MIN_REF_ENCODE_SIZE: usize;
    /// Longer matches are always taken, whatever their opcode costs.
    const MAX_REF_ENCODE_SIZE: usize;
    /// Divides the opcode size when weighing it against the match length.
    const ENCODE_SIZE_DIVISOR: usize;
    /// Subtracted from match lengths before encoding.
    const LEN_BIAS: usize;

    fn pixel(data: &[u8], i: usize) -> Self::Pixel;

    fn same(a: Self::Pixel, b: Self::Pixel) -> bool;

    fn encode_pixel(out: &mut OutputCursor<'_>, p: Self::Pixel) -> Result<(), GlzError>;

    /// Hash of units `i`, `i + 1` and `i + 2`.
    fn hash(data: &[u8], i: usize) -> u32;
}

// djb2, xor flavour
const HASH_SEED: u32 = 5381;

#[inline]
fn hash_step(h: u32, c: u8) -> u32 {
    (h << 5).wrapping_add(h) ^ c as u32
}

// ─────────────────────────────────────────────────────────────────────────────
// Palette: one byte per unit, whatever the pixel depth
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct Plt;

impl PixelFormat for Plt {
    type Pixel = u8;

    const UNIT_BYTES: usize = 1;
    const MIN_REF_ENCODE_SIZE: usize = 4;
    const MAX_REF_ENCODE_SIZE: usize = 7;
    const ENCODE_SIZE_DIVISOR: usize = 1;
    const LEN_BIAS: usize = 2;

    #[inline]
    fn pixel(data: &[u8], i: usize) -> u8 {
        data[i]
    }

    #[inline]
    fn same(a: u8, b: u8) -> bool {
        a == b
    }

    #[inline]
    fn encode_pixel(out: &mut OutputCursor<'_>, p: u8) -> Result<(), GlzError> {
        out.encode(p)
    }

    #[inline]
    fn hash(data: &[u8], i: usize) -> u32 {
        data[i..i + 3].iter().fold(HASH_SEED, |h, &c| hash_step(h, c))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Alpha: the fourth byte of RGBA pixels
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct Alpha;

impl PixelFormat for Alpha {
    type Pixel = u8;

    const UNIT_BYTES: usize = 4;
    const MIN_REF_ENCODE_SIZE: usize = 4;
    const MAX_REF_ENCODE_SIZE: usize = 7;
    const ENCODE_SIZE_DIVISOR: usize = 1;
    const LEN_BIAS: usize = 2;

    #[inline]
    fn pixel(data: &[u8], i: usize) -> u8 {
        data[i * 4 + 3]
    }

    #[inline]
    fn same(a: u8, b: u8) -> bool {
        a == b
    }

    #[inline]
    fn encode_pixel(out: &mut OutputCursor<'_>, p: u8) -> Result<(), GlzError> {
        out.encode(p)
    }

    #[inline]
    fn hash(data: &[u8], i: usize) -> u32 {
        (i..i + 3).fold(HASH_SEED, |h, k| hash_step(h, Self::pixel(data, k)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RGB16: x1r5g5b5, little-endian in the scanline
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct Rgb16;

impl PixelFormat for Rgb16 {
    type Pixel = u16;

    const UNIT_BYTES: usize = 2;
    const MIN_REF_ENCODE_SIZE: usize = 2;
    const MAX_REF_ENCODE_SIZE: usize = 3;
    const ENCODE_SIZE_DIVISOR: usize = 2;
    const LEN_BIAS: usize = 1;

    #[inline]
    fn pixel(data: &[u8], i: usize) -> u16 {
        u16::from_le_bytes([data[i * 2], data[i * 2 + 1]])
    }

    /// Equal when the 5-bit channels are; the top bit is padding.
    #[inline]
    fn same(a: u16, b: u16) -> bool {
        (a & 0x7fff) == (b & 0x7fff)
    }

    #[inline]
    fn encode_pixel(out: &mut OutputCursor<'_>, p: u16) -> Result<(), GlzError> {
        out.encode((p >> 8) as u8)?;
        out.encode(p as u8)
    }

    #[inline]
    fn hash(data: &[u8], i: usize) -> u32 {
        (i..i + 3).fold(HASH_SEED, |h, k| {
            let p = Self::pixel(data, k);
            hash_step(hash_step(h, p as u8), ((p >> 8) & 0x7f) as u8)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RGB24 / RGB32: b, g, r bytes; RGB32 carries an ignored fourth byte
// ─────────────────────────────────────────────────────────────────────────────

/// A pixel as `[b, g, r]`.
pub(crate) type Bgr = [u8; 3];

#[inline]
fn encode_bgr(out: &mut OutputCursor<'_>, p: Bgr) -> Result<(), GlzError> {
    out.encode(p[0])?;
    out.encode(p[1])?;
    out.encode(p[2])
}

/// Hashes r, g, b of three consecutive pixels.
#[inline]
fn hash_bgr(pixels: [Bgr; 3]) -> u32 {
    pixels.iter().fold(HASH_SEED, |h, p| hash_step(hash_step(hash_step(h, p[2]), p[1]), p[0]))
}

pub(crate) struct Rgb24;

impl PixelFormat for Rgb24 {
    type Pixel = Bgr;

    const UNIT_BYTES: usize = 3;
    const MIN_REF_ENCODE_SIZE: usize = 2;
    const MAX_REF_ENCODE_SIZE: usize = 2;
    const ENCODE_SIZE_DIVISOR: usize = 3;
    const LEN_BIAS: usize = 0;

    #[inline]
    fn pixel(data: &[u8], i: usize) -> Bgr {
        [data[i * 3], data[i * 3 + 1], data[i * 3 + 2]]
    }

    #[inline]
    fn same(a: Bgr, b: Bgr) -> bool {
        a == b
    }

    #[inline]
    fn encode_pixel(out: &mut OutputCursor<'_>, p: Bgr) -> Result<(), GlzError> {
        encode_bgr(out, p)
    }

    #[inline]
    fn hash(data: &[u8], i: usize) -> u32 {
        hash_bgr([Self::pixel(data, i), Self::pixel(data, i + 1), Self::pixel(data, i + 2)])
    }
}

pub(crate) struct Rgb32;

impl PixelFormat for Rgb32 {
    type Pixel = Bgr;

    const UNIT_BYTES: usize = 4;
    const MIN_REF_ENCODE_SIZE: usize = 2;
    const MAX_REF_ENCODE_SIZE: usize = 2;
    const ENCODE_SIZE_DIVISOR: usize = 3;
    const LEN_BIAS: usize = 0;

    #[inline]
    fn pixel(data: &[u8], i: usize) -> Bgr {
        [data[i * 4], data[i * 4 + 1], data[i * 4 + 2]]
    }

    #[inline]
    fn same(a: Bgr, b: Bgr) -> bool {
        a == b
    }

    #[inline]
    fn encode_pixel(out: &mut OutputCursor<'_>, p: Bgr) -> Result<(), GlzError> {
        encode_bgr(out, p)
    }

    #[inline]
    fn hash(data: &[u8], i: usize) -> u32 {
        hash_bgr([Self::pixel(data, i), Self::pixel(data, i + 1), Self::pixel(data, i + 2)])
    }
}
