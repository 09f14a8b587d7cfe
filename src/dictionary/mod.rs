//! Shared dictionary: the sliding window of recently encoded images that
//! several encoders reference and extend concurrently.
//!
//! Locking:
//! - the window mutex guards image bookkeeping, encoder heads and the free
//!   segment list; it is held only inside `pre_encode`, `post_encode`,
//!   `reset`, `remove_image` and the read-only accessors;
//! - the segment arena sits behind an `RwLock`. Every encoder holds a read
//!   lease from `pre_encode` until `post_encode`; growing the arena takes the
//!   write side, and only ever while also holding the window mutex;
//! - the hash index is lock-free (see [`hash`]).
//!
//! An encode therefore looks like:
//!
//! ```text
//! pre_encode  ── lock window, evict, insert image, set encoder head, unlock
//! compress    ── read segments through the lease, probe/update hash
//! post_encode ── drop lease, lock window, clear head, evict, unlock
//! ```

pub mod hash;
mod window;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use crate::config::{HASH_CHAIN_SIZE, INIT_IMAGE_SEGS_NUM, LZ_MAX_WINDOW_SIZE, MAX_ENCODERS};
use crate::error::GlzError;
use crate::image::ImageType;
use crate::usr::{fatal, EncoderUsr, ImageToken, LineChunk};

use hash::{HashEntry, HashTable};
use window::{lock_slot, new_slots, EncoderHead, SegLines, SegSlot, Window};
pub(crate) use window::{WindowImage, WindowSegment};

// ─────────────────────────────────────────────────────────────────────────────
// Public handles
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to rebuild a dictionary that continues an existing
/// image-id sequence, e.g. after a client reconnects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestoreData {
    pub size: u32,
    pub max_encoders: u32,
    pub last_image_id: u64,
}

/// Handle to an image inserted by an encode.
///
/// The handle stays valid after the image leaves the window; operations on
/// an evicted image are no-ops.
#[derive(Clone)]
pub struct DictImage(Arc<WindowImage>);

impl DictImage {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn token(&self) -> ImageToken {
        self.0.usr_context
    }

    pub fn pixels(&self) -> u64 {
        self.0.size
    }

    /// False once the image was removed by the caller or evicted.
    pub fn is_alive(&self) -> bool {
        self.0.is_alive()
    }
}

impl fmt::Debug for DictImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictImage")
            .field("id", &self.0.id)
            .field("pixels", &self.0.size)
            .field("alive", &self.0.is_alive())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dictionary
// ─────────────────────────────────────────────────────────────────────────────

pub struct SharedDictionary {
    window: Mutex<Window>,
    segs: RwLock<Vec<SegSlot>>,
    hash: HashTable,
    max_encoders: u32,
}

impl fmt::Debug for SharedDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDictionary")
            .field("size", &self.get_size())
            .field("max_encoders", &self.max_encoders)
            .finish_non_exhaustive()
    }
}

impl SharedDictionary {
    /// Creates an empty dictionary holding at most `size` pixels, shared by
    /// up to `max_encoders` encoders.
    pub fn create(size: u32, max_encoders: u32, usr: &mut dyn EncoderUsr) -> Result<Arc<Self>, GlzError> {
        if size > LZ_MAX_WINDOW_SIZE {
            return fatal(usr, GlzError::WindowTooLarge(size));
        }
        if max_encoders == 0 || max_encoders > MAX_ENCODERS {
            return fatal(usr, GlzError::InvalidEncoderCount(max_encoders));
        }
        log::debug!(
            "dictionary created: {size} pixels, {max_encoders} encoders, {HASH_CHAIN_SIZE}-way hash"
        );
        Ok(Arc::new(SharedDictionary {
            window: Mutex::new(Window::new(size, max_encoders)),
            segs: RwLock::new(new_slots(INIT_IMAGE_SEGS_NUM)),
            hash: HashTable::new(),
            max_encoders,
        }))
    }

    /// Creates an empty dictionary whose next image id follows
    /// `data.last_image_id`.
    pub fn restore(data: &RestoreData, usr: &mut dyn EncoderUsr) -> Result<Arc<Self>, GlzError> {
        let dict = Self::create(data.size, data.max_encoders, usr)?;
        dict.lock_window().last_image_id = data.last_image_id;
        Ok(dict)
    }

    pub fn get_restore_data(&self) -> RestoreData {
        let win = self.lock_window();
        RestoreData { size: win.size_limit, max_encoders: self.max_encoders, last_image_id: win.last_image_id }
    }

    /// Window capacity in pixels.
    pub fn get_size(&self) -> u32 {
        self.lock_window().size_limit
    }

    pub fn max_encoders(&self) -> u32 {
        self.max_encoders
    }

    /// Id the next inserted image will get.
    pub fn last_image_id(&self) -> u64 {
        self.lock_window().last_image_id
    }

    /// Pixels spanned from the window head to the newest image.
    pub fn window_size(&self) -> u64 {
        self.lock_window().logical_size()
    }

    /// Pixels of every image still resident, including images kept only
    /// because an active encoder may reference them.
    pub fn resident_size(&self) -> u64 {
        self.lock_window().resident_size()
    }

    pub fn image_count(&self) -> usize {
        self.lock_window().image_count()
    }

    /// Empties the window, notifying `usr` of every live image, and restarts
    /// image ids at zero. Fails while any encoder is between `pre_encode`
    /// and `post_encode`.
    pub fn reset(&self, usr: &mut dyn EncoderUsr) -> Result<(), GlzError> {
        let mut win = self.lock_window();
        if let Some(busy) = win.encoders_heads.iter().position(Option::is_some) {
            return fatal(usr, GlzError::EncoderBusy(busy as u32));
        }
        let segs = self.read_segs();
        win.reset(&segs, usr);
        self.hash.reset();
        log::debug!("dictionary reset");
        Ok(())
    }

    /// Releases every image, notifying `usr` of the live ones.
    pub fn destroy(self: Arc<Self>, usr: &mut dyn EncoderUsr) -> Result<(), GlzError> {
        self.reset(usr)
    }

    /// Marks `image` dead: it stays in the window but is never referenced
    /// again, and `usr` is not told when it is evicted. Handles of images
    /// that already left the window are ignored.
    pub fn remove_image(&self, image: &DictImage, usr: &mut dyn EncoderUsr) {
        let win = self.lock_window();
        match win.find(image.0.id) {
            Some(resident) if Arc::ptr_eq(resident, &image.0) => {
                resident.kill();
                log::debug!("image {} removed by caller", image.0.id);
            }
            _ => usr.warn(&format!("image {} is no longer in the window", image.0.id)),
        }
    }

    /// Reserves the window for one encode and inserts the image.
    ///
    /// All scanlines are gathered first: `first_lines`, then
    /// [`EncoderUsr::more_lines`] until `height` rows are covered. Then, under
    /// the window lock, room is made for the image, its segments are
    /// inserted and the encoder's head is set to the window head. The
    /// returned lease must be handed back to [`post_encode`](Self::post_encode).
    #[allow(clippy::too_many_arguments)]
    pub fn pre_encode<'d>(
        &'d self,
        encoder_id: u8,
        usr: &mut dyn EncoderUsr,
        image_type: ImageType,
        width: u32,
        height: u32,
        stride: u32,
        first_lines: LineChunk,
        usr_context: ImageToken,
    ) -> Result<EncodeLease<'d>, GlzError> {
        if encoder_id as u32 >= self.max_encoders {
            return fatal(usr, GlzError::EncoderIdOutOfRange { id: encoder_id as u32, max_encoders: self.max_encoders });
        }
        if width == 0 || height == 0 {
            return fatal(usr, GlzError::EmptyImage);
        }
        let chunks = collect_lines(usr, first_lines, height, stride)?;
        let image_size = image_type.pixels_num(height, stride);

        let mut win = self.lock_window();
        if win.encoders_heads[encoder_id as usize].is_some() {
            return fatal(usr, GlzError::EncoderBusy(encoder_id as u32));
        }
        let new_head = match win.new_head(image_size) {
            Ok(h) => h,
            Err(e) => return fatal(usr, e),
        };
        if !win.is_in_use() {
            let segs = self.read_segs();
            win.evict_until(new_head, &segs, usr);
        }
        if let Err(e) = self.reserve_segs(&mut win, chunks.len(), usr) {
            return fatal(usr, e);
        }

        let segs = self.read_segs();
        let (image, segments) = match win.add_image(&segs, image_type, stride, chunks, usr_context) {
            Ok(added) => added,
            Err(e) => return fatal(usr, e),
        };
        win.set_logical_head(new_head.unwrap_or(image.id));
        let head = win.head_mark().unwrap_or(EncoderHead { image_id: image.id, pixels_so_far: image.first_pixel });
        win.encoders_heads[encoder_id as usize] = Some(head);
        drop(win);

        let window_head_distance = (image.id - head.image_id) as u32;
        log::trace!("encoder {encoder_id}: image {} {width}x{height}, head distance {window_head_distance}", image.id);
        Ok(EncodeLease { dict: self, segs, encoder_id, image, segments, head, window_head_distance })
    }

    /// Ends the encode started by the matching `pre_encode`: releases the
    /// lease, clears the encoder's head and evicts images that were kept
    /// only for this encoder.
    pub fn post_encode(&self, lease: EncodeLease<'_>, usr: &mut dyn EncoderUsr) {
        debug_assert!(std::ptr::eq(lease.dict, self));
        let encoder_id = lease.encoder_id as usize;
        drop(lease);
        let mut win = self.lock_window();
        let segs = self.read_segs();
        win.release_encoder(encoder_id, &segs, usr);
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn lock_window(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_segs(&self) -> RwLockReadGuard<'_, Vec<SegSlot>> {
        self.segs.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grows the slot arena until `needed` slots are free. Waits for every
    /// outstanding lease, since growth may move the arena.
    fn reserve_segs(&self, win: &mut Window, needed: usize, usr: &mut dyn EncoderUsr) -> Result<(), GlzError> {
        if win.free_segs_len() >= needed {
            return Ok(());
        }
        let mut segs = self.segs.write().unwrap_or_else(PoisonError::into_inner);
        win.grow(&mut segs, needed)?;
        usr.info(&format!("segment window grown to {} slots", win.segs_quota));
        Ok(())
    }
}

/// Gathers `height` rows from `first` and [`EncoderUsr::more_lines`]. The
/// chunk that completes the image is cut down to the rows still missing.
fn collect_lines(
    usr: &mut dyn EncoderUsr,
    first: LineChunk,
    height: u32,
    stride: u32,
) -> Result<Vec<SegLines>, GlzError> {
    let mut chunks = Vec::new();
    let mut rows = 0u32;
    let mut next = Some(first).filter(|c| c.num_lines > 0);
    while rows < height {
        let chunk = match next.take().or_else(|| usr.more_lines()).filter(|c| c.num_lines > 0) {
            Some(c) => c,
            None => return fatal(usr, GlzError::MoreLinesFailed { rows, height }),
        };
        let num_lines = chunk.num_lines.min(height - rows);
        if (chunk.data.len() as u64) < num_lines as u64 * stride as u64 {
            return fatal(usr, GlzError::ShortLines { len: chunk.data.len(), num_lines, stride });
        }
        chunks.push(SegLines { data: chunk.data, num_lines });
        rows += num_lines;
    }
    Ok(chunks)
}

// ─────────────────────────────────────────────────────────────────────────────
// Encode lease
// ─────────────────────────────────────────────────────────────────────────────

/// Read access to the window for the duration of one encode.
///
/// Holds the shared side of the segment arena lock, the new image and its
/// segments. Must be returned through [`SharedDictionary::post_encode`];
/// dropping it otherwise leaves the encoder marked busy.
pub struct EncodeLease<'d> {
    dict: &'d SharedDictionary,
    segs: RwLockReadGuard<'d, Vec<SegSlot>>,
    encoder_id: u8,
    image: Arc<WindowImage>,
    segments: Vec<(u32, Arc<WindowSegment>)>,
    head: EncoderHead,
    window_head_distance: u32,
}

impl fmt::Debug for EncodeLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeLease")
            .field("encoder_id", &self.encoder_id)
            .field("image_id", &self.image.id)
            .field("window_head_distance", &self.window_head_distance)
            .finish_non_exhaustive()
    }
}

impl<'d> EncodeLease<'d> {
    pub fn image(&self) -> DictImage {
        DictImage(Arc::clone(&self.image))
    }

    pub fn image_id(&self) -> u64 {
        self.image.id
    }

    /// Images between the window head and the new image.
    pub fn window_head_distance(&self) -> u32 {
        self.window_head_distance
    }

    pub fn encoder_id(&self) -> u8 {
        self.encoder_id
    }

    /// The new image's segments with their slot indices, in image order.
    pub(crate) fn segments(&self) -> &[(u32, Arc<WindowSegment>)] {
        &self.segments
    }

    #[inline]
    pub(crate) fn update_hash(&self, hval: u32, seg_idx: u32, pix_idx: u32) {
        self.dict.hash.update(hval, seg_idx, pix_idx);
    }

    #[inline]
    pub(crate) fn hash_bucket(&self, hval: u32) -> [HashEntry; HASH_CHAIN_SIZE] {
        self.dict.hash.bucket(hval)
    }

    /// Resolves a hash candidate to a segment this encode may reference.
    ///
    /// The candidate must be the segment being compressed, or a segment of a
    /// live image of the same type that lies between this encoder's head and
    /// the segment being compressed.
    pub(crate) fn ref_segment(
        &self,
        ref_idx: u32,
        src_idx: u32,
        src: &Arc<WindowSegment>,
    ) -> Option<Arc<WindowSegment>> {
        if ref_idx == src_idx {
            return Some(Arc::clone(src));
        }
        let seg = lock_slot(self.segs.get(ref_idx as usize)?).clone()?;
        let usable = seg.image.is_alive()
            && seg.image.image_type == src.image.image_type
            && seg.pixels_so_far <= src.pixels_so_far
            && self.head.pixels_so_far <= seg.pixels_so_far;
        usable.then_some(seg)
    }
}
