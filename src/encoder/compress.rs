//! The compress loop, generic over the pixel format.
//!
//! Output is a sequence of literal runs and match opcodes. A literal run is
//! a count byte `n - 1` (`n <= MAX_COPY`) followed by `n` encoded units. The
//! loop always keeps a count byte open ahead of the literals it may write and
//! retracts it when a match follows immediately.
//!
//! Matches are found through the shared hash index and may point anywhere in
//! the window: earlier in the same segment, in an earlier segment of the same
//! image, or in an earlier image of the same type.

use std::sync::Arc;

use crate::config::{BOUND_OFFSET, LIMIT_OFFSET, MAX_COPY, MAX_IMAGE_DIST, MAX_PIXEL_LONG_DISTANCE, MIN_SEG_UNITS};
use crate::dictionary::{EncodeLease, WindowSegment};
use crate::error::GlzError;

use super::format::PixelFormat;
use super::io::OutputCursor;
use super::opcode::{encode_match, encode_ref_size};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Match {
    len: usize,
    image_distance: u64,
    pixel_distance: u64,
}

/// Compresses every segment of the lease's image.
///
/// `ppb` is the number of pixels per unit: 8, 2 or 1 for palette images,
/// 1 for RGB.
pub(crate) fn compress<F: PixelFormat>(
    lease: &EncodeLease<'_>,
    out: &mut OutputCursor<'_>,
    ppb: u64,
) -> Result<(), GlzError> {
    let segments = lease.segments();

    // leading segments too short to seed the hash go out as plain literals
    let mut first = 0;
    while let Some((_, seg)) = segments.get(first) {
        let data = seg.bytes();
        let units = data.len() / F::UNIT_BYTES;
        if units >= MIN_SEG_UNITS {
            break;
        }
        if units > 0 {
            out.encode_copy_count((units - 1) as u8)?;
            for i in 0..units {
                F::encode_pixel(out, F::pixel(data, i))?;
            }
        }
        first += 1;
    }

    let Some((seg_idx, seg)) = segments.get(first) else {
        return Ok(());
    };
    let data = seg.bytes();
    out.encode_copy_count((MAX_COPY - 1) as u8)?;
    lease.update_hash(F::hash(data, 0), *seg_idx, 0);
    F::encode_pixel(out, F::pixel(data, 0))?;
    F::encode_pixel(out, F::pixel(data, 1))?;
    compress_seg::<F>(lease, out, ppb, *seg_idx, seg, 2, 2)?;

    for (seg_idx, seg) in &segments[first + 1..] {
        compress_seg::<F>(lease, out, ppb, *seg_idx, seg, 0, 0)?;
    }
    Ok(())
}

/// Compresses one segment from unit `from`, with `copied` literals already
/// in the open run.
fn compress_seg<F: PixelFormat>(
    lease: &EncodeLease<'_>,
    out: &mut OutputCursor<'_>,
    ppb: u64,
    seg_idx: u32,
    seg: &Arc<WindowSegment>,
    from: usize,
    copied: usize,
) -> Result<(), GlzError> {
    let data = seg.bytes();
    let units = data.len() / F::UNIT_BYTES;
    let ip_bound = units.saturating_sub(BOUND_OFFSET);
    let ip_limit = units.saturating_sub(LIMIT_OFFSET);

    let mut ip = from;
    let mut copy = copied;
    if copy == 0 {
        out.encode_copy_count((MAX_COPY - 1) as u8)?;
    }

    while ip < ip_limit {
        let anchor = ip;

        let found = if ip > 0
            && F::same(F::pixel(data, ip - 1), F::pixel(data, ip))
            && F::same(F::pixel(data, ip), F::pixel(data, ip + 1))
            && F::same(F::pixel(data, ip + 1), F::pixel(data, ip + 2))
        {
            // run of the previous unit
            let x = F::pixel(data, ip + 2);
            let mut len = 3;
            ip += 3;
            while ip < ip_bound && F::same(F::pixel(data, ip), x) {
                ip += 1;
                len += 1;
            }
            Some(Match { len, image_distance: 0, pixel_distance: 1 })
        } else {
            let hval = F::hash(data, ip);
            let best = find_match::<F>(lease, ppb, hval, seg_idx, seg, ip, ip_bound);
            lease.update_hash(hval, seg_idx, anchor as u32);
            best
        };

        let Some(m) = found else {
            F::encode_pixel(out, F::pixel(data, anchor))?;
            ip = anchor + 1;
            copy += 1;
            if copy == MAX_COPY {
                copy = 0;
                out.encode_copy_count((MAX_COPY - 1) as u8)?;
            }
            continue;
        };

        let pixel_distance = if m.image_distance == 0 { m.pixel_distance - 1 } else { m.pixel_distance };
        if copy > 0 {
            out.update_copy_count((copy - 1) as u8);
        } else {
            out.output_prev();
        }
        copy = 0;

        // the last two matched units stay hashable starting points
        ip = anchor + m.len - 2;
        encode_match(out, m.image_distance, pixel_distance, m.len - F::LEN_BIAS)?;
        if ip > anchor {
            lease.update_hash(F::hash(data, ip), seg_idx, ip as u32);
        }
        ip += 1;
        lease.update_hash(F::hash(data, ip), seg_idx, ip as u32);
        ip += 1;

        out.encode_copy_count((MAX_COPY - 1) as u8)?;
    }

    while ip < units {
        F::encode_pixel(out, F::pixel(data, ip))?;
        ip += 1;
        copy += 1;
        if copy == MAX_COPY {
            copy = 0;
            out.encode_copy_count((MAX_COPY - 1) as u8)?;
        }
    }

    if copy > 0 {
        out.update_copy_count((copy - 1) as u8);
    } else {
        out.output_prev();
    }
    Ok(())
}

/// Longest usable match among the hash candidates for unit `ip`. Ties go to
/// the candidate seen first.
fn find_match<F: PixelFormat>(
    lease: &EncodeLease<'_>,
    ppb: u64,
    hval: u32,
    seg_idx: u32,
    seg: &Arc<WindowSegment>,
    ip: usize,
    ip_bound: usize,
) -> Option<Match> {
    let mut best: Option<Match> = None;
    for entry in lease.hash_bucket(hval) {
        let Some(ref_seg) = lease.ref_segment(entry.image_seg_idx, seg_idx, seg) else {
            continue;
        };
        let Some(m) = do_match::<F>(&ref_seg, entry.ref_pix_idx as usize, seg, ip, ip_bound, ppb) else {
            continue;
        };
        if best.map_or(true, |b| m.len > b.len) {
            best = Some(m);
        }
    }
    best
}

/// Measures the match between `src[ip..]` and `reference[ref_pos..]`.
///
/// Returns `None` when the units differ early, when the reference does not
/// lie strictly before `ip`, when a distance does not fit the opcode, or
/// when the opcode would cost more than the literals it replaces.
fn do_match<F: PixelFormat>(
    reference: &WindowSegment,
    ref_pos: usize,
    src: &WindowSegment,
    ip: usize,
    ip_bound: usize,
    ppb: u64,
) -> Option<Match> {
    let ref_data = reference.bytes();
    let ref_units = ref_data.len() / F::UNIT_BYTES;
    if ref_pos + F::MIN_REF_ENCODE_SIZE > ref_units {
        return None;
    }
    let src_data = src.bytes();
    for k in 0..F::MIN_REF_ENCODE_SIZE {
        if !F::same(F::pixel(ref_data, ref_pos + k), F::pixel(src_data, ip + k)) {
            return None;
        }
    }

    let image_distance = src.image.id.checked_sub(reference.image.id)?;
    let ref_pixel = ref_pos as u64 * ppb + reference.pixels_so_far;
    let pixel_distance = if image_distance == 0 {
        let src_pixel = ip as u64 * ppb + src.pixels_so_far;
        src_pixel.checked_sub(ref_pixel)? / ppb
    } else {
        (ref_pixel - reference.image.first_pixel) / ppb
    };
    if pixel_distance == 0
        || pixel_distance >= MAX_PIXEL_LONG_DISTANCE
        || image_distance > MAX_IMAGE_DIST
    {
        return None;
    }

    let mut t_ip = ip + F::MIN_REF_ENCODE_SIZE;
    let mut t_ref = ref_pos + F::MIN_REF_ENCODE_SIZE;
    while t_ip < ip_bound && t_ref < ref_units && F::same(F::pixel(ref_data, t_ref), F::pixel(src_data, t_ip)) {
        t_ip += 1;
        t_ref += 1;
    }
    let len = t_ip - ip;

    if len > F::MAX_REF_ENCODE_SIZE
        || len >= encode_ref_size(image_distance, pixel_distance) / F::ENCODE_SIZE_DIVISOR + 1
    {
        Some(Match { len, image_distance, pixel_distance })
    } else {
        None
    }
}
