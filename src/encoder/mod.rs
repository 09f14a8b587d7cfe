//! Encoder: turns one image into a GLZ stream while inserting it into the
//! shared dictionary.
//!
//! Stream layout (all header words big-endian):
//!
//! ```text
//! magic u32 | version u32 | type u8 (type | top_down << 4)
//! width u32 | height u32 | stride u32 | image id u64 | head distance u32
//! body: literal runs and match opcodes; RGBA repeats the body for alpha
//! ```

mod compress;
mod format;
mod io;
mod opcode;

use std::sync::Arc;

use crate::dictionary::{DictImage, EncodeLease, SharedDictionary};
use crate::error::GlzError;
use crate::image::{ImageType, HEADER_SIZE, LZ_MAGIC, LZ_VERSION};
use crate::usr::{fatal, EncoderUsr, ImageToken, LineChunk};

use compress::compress;
use format::{Alpha, Plt, Rgb16, Rgb24, Rgb32};
use io::OutputCursor;

/// One image to encode.
#[derive(Clone, Debug)]
pub struct EncodeRequest {
    pub image_type: ImageType,
    pub width: u32,
    pub height: u32,
    /// Bytes per scanline.
    pub stride: u32,
    /// Rows are handed over top to bottom.
    pub top_down: bool,
    /// First scanlines; the rest come from [`EncoderUsr::more_lines`].
    pub lines: LineChunk,
    /// Handed back through [`EncoderUsr::free_image`] on eviction.
    pub usr_context: ImageToken,
}

impl EncodeRequest {
    /// Request for an image whose scanlines all sit in `data`.
    pub fn new(image_type: ImageType, width: u32, height: u32, stride: u32, data: impl Into<Arc<[u8]>>) -> Self {
        EncodeRequest {
            image_type,
            width,
            height,
            stride,
            top_down: true,
            lines: LineChunk::new(data, height),
            usr_context: ImageToken::default(),
        }
    }

    pub fn with_top_down(mut self, top_down: bool) -> Self {
        self.top_down = top_down;
        self
    }

    pub fn with_context(mut self, usr_context: ImageToken) -> Self {
        self.usr_context = usr_context;
        self
    }

    /// Replaces the scanlines handed over up front; rows past them are
    /// pulled through [`EncoderUsr::more_lines`].
    pub fn with_first_lines(mut self, lines: LineChunk) -> Self {
        self.lines = lines;
        self
    }
}

/// Result of a successful encode.
#[derive(Clone, Debug)]
pub struct Encoded {
    /// Bytes appended to the output buffer.
    pub bytes: usize,
    pub image: DictImage,
    /// Images between the window head and this image at insertion time.
    pub window_head_distance: u32,
}

/// Upper bound on the stream size of one image, header included. Passing at
/// least this budget to [`Encoder::encode`] never triggers
/// [`EncoderUsr::more_space`].
pub fn max_encoded_size(image_type: ImageType, height: u32, stride: u32) -> usize {
    let bytes = height as usize * stride as usize;
    let units = bytes / image_type.bytes_per_pixel() as usize;
    // One count byte per MAX_COPY literals and a few per segment, since any
    // line may start one. Runs of exactly four units are the worst case for
    // one-byte units: five output bytes per four units.
    let overhead = units / 4 + units / 32 + 4 * height as usize + 8;
    let pass = units * image_type.encoded_bytes_per_unit() + overhead;
    let passes = if image_type == ImageType::Rgba { pass + units + overhead } else { pass };
    HEADER_SIZE + passes
}

pub struct Encoder<U: EncoderUsr> {
    id: u8,
    dict: Arc<SharedDictionary>,
    usr: U,
}

impl<U: EncoderUsr> Encoder<U> {
    /// Creates encoder `id` on `dict`. Ids must be unique among the encoders
    /// sharing a dictionary and below its `max_encoders`.
    pub fn create(id: u8, dict: Arc<SharedDictionary>, mut usr: U) -> Result<Self, GlzError> {
        if id as u32 >= dict.max_encoders() {
            return fatal(&mut usr, GlzError::EncoderIdOutOfRange { id: id as u32, max_encoders: dict.max_encoders() });
        }
        Ok(Encoder { id, dict, usr })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn dictionary(&self) -> &Arc<SharedDictionary> {
        &self.dict
    }

    pub fn usr(&self) -> &U {
        &self.usr
    }

    pub fn usr_mut(&mut self) -> &mut U {
        &mut self.usr
    }

    pub fn into_usr(self) -> U {
        self.usr
    }

    /// Encodes `req`, appending the stream to `out`.
    ///
    /// At most `budget` bytes are appended before
    /// [`EncoderUsr::more_space`] is asked for more. The image enters the
    /// dictionary before compression starts; on error it stays there, and
    /// whatever was appended to `out` must be discarded. After
    /// [`GlzError::OutputExhausted`] the peer's dictionary no longer mirrors
    /// this one, so callers should reset both.
    pub fn encode(&mut self, req: EncodeRequest, out: &mut Vec<u8>, budget: usize) -> Result<Encoded, GlzError> {
        let usr: &mut dyn EncoderUsr = &mut self.usr;
        if let Err(e) = req.image_type.validate_stride(req.width, req.stride) {
            return fatal(usr, e);
        }

        let lease = self.dict.pre_encode(
            self.id,
            usr,
            req.image_type,
            req.width,
            req.height,
            req.stride,
            req.lines,
            req.usr_context,
        )?;
        let image = lease.image();
        let window_head_distance = lease.window_head_distance();

        let header = Header {
            image_type: req.image_type,
            top_down: req.top_down,
            width: req.width,
            height: req.height,
            stride: req.stride,
        };
        let written = compress_image(&lease, usr, &header, out, budget);
        self.dict.post_encode(lease, usr);

        let bytes = written?;
        log::trace!("encoder {}: image {} -> {bytes} bytes", self.id, image.id());
        Ok(Encoded { bytes, image, window_head_distance })
    }
}

struct Header {
    image_type: ImageType,
    top_down: bool,
    width: u32,
    height: u32,
    stride: u32,
}

fn compress_image(
    lease: &EncodeLease<'_>,
    usr: &mut dyn EncoderUsr,
    header: &Header,
    out: &mut Vec<u8>,
    budget: usize,
) -> Result<usize, GlzError> {
    let mut cursor = OutputCursor::new(out, budget, usr);
    cursor.encode_32(LZ_MAGIC)?;
    cursor.encode_32(LZ_VERSION)?;
    cursor.encode(header.image_type.header_byte(header.top_down))?;
    cursor.encode_32(header.width)?;
    cursor.encode_32(header.height)?;
    cursor.encode_32(header.stride)?;
    cursor.encode_64(lease.image_id())?;
    cursor.encode_32(lease.window_head_distance())?;

    let ppb = header.image_type.pixels_per_byte() as u64;
    match header.image_type {
        ImageType::Plt1Le | ImageType::Plt1Be | ImageType::Plt4Le | ImageType::Plt4Be | ImageType::Plt8 => {
            compress::<Plt>(lease, &mut cursor, ppb)?
        }
        ImageType::Rgb16 => compress::<Rgb16>(lease, &mut cursor, ppb)?,
        ImageType::Rgb24 => compress::<Rgb24>(lease, &mut cursor, ppb)?,
        ImageType::Rgb32 => compress::<Rgb32>(lease, &mut cursor, ppb)?,
        ImageType::Rgba => {
            compress::<Rgb32>(lease, &mut cursor, ppb)?;
            compress::<Alpha>(lease, &mut cursor, ppb)?;
        }
    }
    Ok(cursor.written())
}
