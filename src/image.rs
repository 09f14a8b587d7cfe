//! Image types, header constants and pixel accounting.
//!
//! Palette images are handled as byte streams: a PLT1 byte carries eight
//! pixels, a PLT4 byte two, a PLT8 byte one. RGB images are handled pixel by
//! pixel and must not carry row padding.

use crate::error::GlzError;

// ─────────────────────────────────────────────────────────────────────────────
// Header constants
// ─────────────────────────────────────────────────────────────────────────────

/// Stream magic, the bytes `"LZ  "` read as a little-endian word and written
/// big-endian like every other header field.
pub const LZ_MAGIC: u32 = 0x2020_5A4C;

pub const LZ_VERSION_MAJOR: u32 = 1;
pub const LZ_VERSION_MINOR: u32 = 1;
pub const LZ_VERSION: u32 = (LZ_VERSION_MAJOR << 16) | (LZ_VERSION_MINOR & 0xffff);

/// Low nibble of the type byte holds the image type.
pub const LZ_IMAGE_TYPE_MASK: u8 = 0x0f;
/// The top-down flag sits right above the type nibble.
pub const LZ_IMAGE_TYPE_LOG: u8 = 4;

/// Size of the per-image header in bytes.
pub const HEADER_SIZE: usize = 4 + 4 + 1 + 4 + 4 + 4 + 8 + 4;

// ─────────────────────────────────────────────────────────────────────────────
// Image type
// ─────────────────────────────────────────────────────────────────────────────

/// Pixel representation of an image. Discriminants are the wire values.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum ImageType {
    Plt1Le = 1,
    Plt1Be = 2,
    Plt4Le = 3,
    Plt4Be = 4,
    Plt8 = 5,
    Rgb16 = 6,
    Rgb24 = 7,
    Rgb32 = 8,
    /// RGB32 with a meaningful fourth byte, compressed in a second pass.
    Rgba = 9,
}

impl TryFrom<u8> for ImageType {
    type Error = GlzError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            1 => ImageType::Plt1Le,
            2 => ImageType::Plt1Be,
            3 => ImageType::Plt4Le,
            4 => ImageType::Plt4Be,
            5 => ImageType::Plt8,
            6 => ImageType::Rgb16,
            7 => ImageType::Rgb24,
            8 => ImageType::Rgb32,
            9 => ImageType::Rgba,
            other => return Err(GlzError::UnsupportedImageType(other)),
        })
    }
}

impl ImageType {
    #[inline]
    pub fn is_plt(self) -> bool {
        matches!(
            self,
            ImageType::Plt1Le
                | ImageType::Plt1Be
                | ImageType::Plt4Le
                | ImageType::Plt4Be
                | ImageType::Plt8
        )
    }

    #[inline]
    pub fn is_rgb(self) -> bool {
        !self.is_plt()
    }

    /// Pixels packed in one byte of a palette image; 1 for RGB types.
    #[inline]
    pub fn pixels_per_byte(self) -> u32 {
        match self {
            ImageType::Plt1Le | ImageType::Plt1Be => 8,
            ImageType::Plt4Le | ImageType::Plt4Be => 2,
            _ => 1,
        }
    }

    /// Bytes one pixel occupies in a scanline; 1 for palette types, whose
    /// compression unit is the byte.
    #[inline]
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            ImageType::Rgb16 => 2,
            ImageType::Rgb24 => 3,
            ImageType::Rgb32 | ImageType::Rgba => 4,
            _ => 1,
        }
    }

    /// Bytes each literal unit takes in the compressed stream.
    #[inline]
    pub fn encoded_bytes_per_unit(self) -> usize {
        match self {
            ImageType::Rgb16 => 2,
            ImageType::Rgb24 | ImageType::Rgb32 | ImageType::Rgba => 3,
            _ => 1,
        }
    }

    /// Number of pixels held by `num_lines` scanlines of `stride` bytes.
    #[inline]
    pub fn pixels_num(self, num_lines: u32, stride: u32) -> u64 {
        let bytes = num_lines as u64 * stride as u64;
        if self.is_rgb() {
            bytes / self.bytes_per_pixel() as u64
        } else {
            bytes * self.pixels_per_byte() as u64
        }
    }

    /// Checks that `stride` describes tightly packed rows for this type.
    ///
    /// RGB rows must be exactly `width * bytes_per_pixel` bytes. Palette rows
    /// may carry a single padding byte, and only when `width` does not end on
    /// a byte boundary.
    pub fn validate_stride(self, width: u32, stride: u32) -> Result<(), GlzError> {
        if stride == 0 {
            return Err(GlzError::InvalidStride { image_type: self, width, stride });
        }
        if self.is_plt() {
            let ppb = self.pixels_per_byte();
            let packed = width / ppb;
            if stride > packed && (width % ppb == 0 || stride - packed > 1) {
                return Err(GlzError::InvalidStride { image_type: self, width, stride });
            }
        } else if stride as u64 != width as u64 * self.bytes_per_pixel() as u64 {
            return Err(GlzError::InvalidStride { image_type: self, width, stride });
        }
        Ok(())
    }

    /// The header type byte, with the top-down flag folded in.
    #[inline]
    pub fn header_byte(self, top_down: bool) -> u8 {
        let t = (self as u8) & LZ_IMAGE_TYPE_MASK;
        if top_down {
            t | (1 << LZ_IMAGE_TYPE_LOG)
        } else {
            t
        }
    }
}
