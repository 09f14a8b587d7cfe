//! Window bookkeeping: resident images, their segments and eviction order.
//!
//! Everything in [`Window`] is guarded by the dictionary mutex. Segment
//! contents live in slots outside of it so encoders can read them while other
//! encoders insert or evict; see `SegSlot`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{INIT_IMAGE_SEGS_NUM, MAX_IMAGE_SEGS_NUM};
use crate::error::GlzError;
use crate::image::ImageType;
use crate::usr::{EncoderUsr, ImageToken};

// ─────────────────────────────────────────────────────────────────────────────
// Images and segments
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct WindowImage {
    pub(crate) id: u64,
    pub(crate) image_type: ImageType,
    /// Pixel count of the whole image.
    pub(crate) size: u64,
    /// Global pixel position of the image's first pixel.
    pub(crate) first_pixel: u64,
    /// Segment slots in image order.
    pub(crate) segs: Vec<u32>,
    pub(crate) usr_context: ImageToken,
    alive: AtomicBool,
}

impl WindowImage {
    #[inline]
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Marks the image dead; returns whether it was alive before.
    #[inline]
    pub(crate) fn kill(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }
}

/// A contiguous run of scanlines of one image, as handed over by the caller.
pub(crate) struct WindowSegment {
    pub(crate) image: Arc<WindowImage>,
    lines: Arc<[u8]>,
    len: usize,
    /// Global pixel position of the segment's first pixel.
    pub(crate) pixels_so_far: u64,
}

impl WindowSegment {
    /// Scanline bytes covered by this segment.
    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.lines[..self.len]
    }
}

/// One segment slot. A slot holds `None` while it is on the free list.
pub(crate) type SegSlot = Mutex<Option<Arc<WindowSegment>>>;

#[inline]
pub(crate) fn lock_slot(slot: &SegSlot) -> MutexGuard<'_, Option<Arc<WindowSegment>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn new_slots(n: u32) -> Vec<SegSlot> {
    (0..n).map(|_| Mutex::new(None)).collect()
}

/// Scanlines of one segment about to be inserted.
pub(crate) struct SegLines {
    pub(crate) data: Arc<[u8]>,
    pub(crate) num_lines: u32,
}

/// Oldest position an active encoder may still reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EncoderHead {
    pub(crate) image_id: u64,
    pub(crate) pixels_so_far: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Window
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct Window {
    pub(crate) size_limit: u32,
    /// Resident images, oldest first. Ids strictly increase front to back.
    images: VecDeque<Arc<WindowImage>>,
    /// First image new encodes may reference. Images in front of it stay
    /// resident only while an active encoder's head still points at them.
    logical_head: Option<u64>,
    free_segs: Vec<u32>,
    pub(crate) segs_quota: u32,
    pub(crate) encoders_heads: Vec<Option<EncoderHead>>,
    pixels_so_far: u64,
    pub(crate) last_image_id: u64,
}

impl Window {
    pub(crate) fn new(size_limit: u32, max_encoders: u32) -> Self {
        Window {
            size_limit,
            images: VecDeque::new(),
            logical_head: None,
            free_segs: (0..INIT_IMAGE_SEGS_NUM).rev().collect(),
            segs_quota: INIT_IMAGE_SEGS_NUM,
            encoders_heads: vec![None; max_encoders as usize],
            pixels_so_far: 0,
            last_image_id: 0,
        }
    }

    #[inline]
    fn position(&self, image_id: u64) -> Option<usize> {
        self.images.binary_search_by_key(&image_id, |img| img.id).ok()
    }

    pub(crate) fn find(&self, image_id: u64) -> Option<&Arc<WindowImage>> {
        self.position(image_id).map(|i| &self.images[i])
    }

    pub(crate) fn image_count(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn free_segs_len(&self) -> usize {
        self.free_segs.len()
    }

    pub(crate) fn is_in_use(&self) -> bool {
        self.encoders_heads.iter().any(Option::is_some)
    }

    fn logical_head_index(&self) -> Option<usize> {
        let id = self.logical_head?;
        Some(self.position(id).unwrap_or(0))
    }

    /// Pixels spanned from the logical head to the newest image.
    pub(crate) fn logical_size(&self) -> u64 {
        match (self.logical_head_index(), self.images.back()) {
            (Some(i), Some(tail)) => tail.first_pixel + tail.size - self.images[i].first_pixel,
            _ => 0,
        }
    }

    /// Pixels held by every resident image, pinned ones included.
    pub(crate) fn resident_size(&self) -> u64 {
        self.images.iter().map(|img| img.size).sum()
    }

    /// The logical head after making room for `image_size` more pixels.
    ///
    /// `None` means no current image survives: the window is empty or every
    /// image has to go.
    pub(crate) fn new_head(&self, image_size: u64) -> Result<Option<u64>, GlzError> {
        if image_size > self.size_limit as u64 {
            return Err(GlzError::ImageTooLarge { image_size, size_limit: self.size_limit });
        }
        let Some(mut idx) = self.logical_head_index() else {
            return Ok(None);
        };
        let mut cur = self.logical_size();
        while cur + image_size > self.size_limit as u64 {
            cur -= self.images[idx].size;
            idx += 1;
        }
        Ok(self.images.get(idx).map(|img| img.id))
    }

    pub(crate) fn set_logical_head(&mut self, image_id: u64) {
        self.logical_head = Some(image_id);
    }

    /// Encoder head pointing at the current logical head.
    pub(crate) fn head_mark(&self) -> Option<EncoderHead> {
        let img = self.find(self.logical_head?)?;
        Some(EncoderHead { image_id: img.id, pixels_so_far: img.first_pixel })
    }

    /// Drops resident images older than `end`, or all of them for `None`.
    pub(crate) fn evict_until(&mut self, end: Option<u64>, segs: &[SegSlot], usr: &mut dyn EncoderUsr) {
        while let Some(front) = self.images.front() {
            if end.is_some_and(|end| front.id >= end) {
                break;
            }
            if let Some(img) = self.images.pop_front() {
                self.release_image(&img, segs, usr);
            }
        }
        if self.images.is_empty() {
            self.logical_head = None;
        }
    }

    fn release_image(&mut self, img: &WindowImage, segs: &[SegSlot], usr: &mut dyn EncoderUsr) {
        log::debug!("evicting image {} ({} pixels, {} segments)", img.id, img.size, img.segs.len());
        for &idx in &img.segs {
            *lock_slot(&segs[idx as usize]) = None;
            self.free_segs.push(idx);
        }
        if img.kill() {
            usr.free_image(img.usr_context);
        }
    }

    /// Doubles the slot arena until `needed` slots are free.
    pub(crate) fn grow(&mut self, segs: &mut Vec<SegSlot>, needed: usize) -> Result<(), GlzError> {
        while self.free_segs.len() < needed {
            if self.segs_quota >= MAX_IMAGE_SEGS_NUM {
                return Err(GlzError::SegmentsOverflow);
            }
            let old = self.segs_quota;
            let new = (old as u64 * 2).min(MAX_IMAGE_SEGS_NUM as u64) as u32;
            segs.extend((old..new).map(|_| Mutex::new(None)));
            self.free_segs.extend((old..new).rev());
            self.segs_quota = new;
        }
        Ok(())
    }

    /// Inserts a new image made of `chunks`. The caller has reserved enough
    /// free slots.
    pub(crate) fn add_image(
        &mut self,
        segs: &[SegSlot],
        image_type: ImageType,
        stride: u32,
        chunks: Vec<SegLines>,
        usr_context: ImageToken,
    ) -> Result<(Arc<WindowImage>, Vec<(u32, Arc<WindowSegment>)>), GlzError> {
        let ids = (0..chunks.len())
            .map(|_| self.free_segs.pop())
            .collect::<Option<Vec<u32>>>()
            .ok_or(GlzError::SegmentsOverflow)?;

        let first_pixel = self.pixels_so_far;
        let size: u64 = chunks.iter().map(|c| image_type.pixels_num(c.num_lines, stride)).sum();
        let image = Arc::new(WindowImage {
            id: self.last_image_id,
            image_type,
            size,
            first_pixel,
            segs: ids.clone(),
            usr_context,
            alive: AtomicBool::new(true),
        });
        self.last_image_id += 1;

        let mut segments = Vec::with_capacity(chunks.len());
        for (idx, chunk) in ids.into_iter().zip(chunks) {
            let seg = Arc::new(WindowSegment {
                image: Arc::clone(&image),
                len: chunk.num_lines as usize * stride as usize,
                lines: chunk.data,
                pixels_so_far: self.pixels_so_far,
            });
            self.pixels_so_far += image_type.pixels_num(chunk.num_lines, stride);
            *lock_slot(&segs[idx as usize]) = Some(Arc::clone(&seg));
            segments.push((idx, seg));
        }

        log::trace!(
            "image {} added: {:?}, {} pixels in {} segments",
            image.id,
            image_type,
            size,
            segments.len()
        );
        self.images.push_back(Arc::clone(&image));
        Ok((image, segments))
    }

    /// Clears `encoder_id`'s head and evicts images no one can reference
    /// any more.
    pub(crate) fn release_encoder(&mut self, encoder_id: usize, segs: &[SegSlot], usr: &mut dyn EncoderUsr) {
        let Some(mine) = self.encoders_heads[encoder_id].take() else {
            return;
        };
        let others = self.encoders_heads.iter().flatten().map(|h| h.image_id).min();
        let early = match (others, self.logical_head) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(early) = early {
            if mine.image_id < early {
                self.evict_until(Some(early), segs, usr);
            }
        }
    }

    /// Empties the window and restarts image ids at zero.
    pub(crate) fn reset(&mut self, segs: &[SegSlot], usr: &mut dyn EncoderUsr) {
        self.evict_until(None, segs, usr);
        self.free_segs = (0..self.segs_quota).rev().collect();
        self.encoders_heads.iter_mut().for_each(|h| *h = None);
        self.last_image_id = 0;
    }
}
