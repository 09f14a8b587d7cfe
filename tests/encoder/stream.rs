// Unit tests for the encoded stream layout (encoder/mod.rs, encoder/compress.rs)
//
// Coverage:
//   - header fields, byte order and the top-down flag
//   - image ids increase per encode and keep all 64 bits
//   - a solid image compresses to an exact, known byte sequence
//   - images without any repetition cost header + count bytes + literals
//   - a repeated image is encoded as references into the previous one
//   - output never exceeds max_encoded_size
//   - no match opcode costs more than the literals it replaces
//   - hash candidate choice: newest only by default, longest of the chain
//     with the chained-hash feature

use glz::image::HEADER_SIZE;
use glz::{EncodeRequest, Encoder, ImageType, NullUsr, RestoreData, SharedDictionary};
use proptest::prelude::*;

use crate::common::decoder::{parse_header, Decoder};
use crate::common::images::{distinct_rgb32, noise, screen_like, solid_rgb32};
use crate::common::{encode_all, new_dict};

// ─────────────────────────────────────────────────────────────────────────────
// Header
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn header_fields_are_big_endian() {
    let dict = new_dict(1 << 16, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let data = solid_rgb32(4, 2, [1, 2, 3]);
    let mut out = Vec::new();
    let req = EncodeRequest::new(ImageType::Rgb32, 4, 2, 16, data).with_top_down(false);
    enc.encode(req, &mut out, 1024).unwrap();

    assert_eq!(&out[0..4], &[0x20, 0x20, 0x5A, 0x4C]);
    assert_eq!(&out[4..8], &[0, 1, 0, 1]);
    assert_eq!(out[8], 8);
    assert_eq!(&out[9..13], &[0, 0, 0, 4]);
    assert_eq!(&out[13..17], &[0, 0, 0, 2]);
    assert_eq!(&out[17..21], &[0, 0, 0, 16]);
    assert_eq!(&out[21..29], &[0; 8]);
    assert_eq!(&out[29..33], &[0; 4]);
}

#[test]
fn top_down_flag_sits_above_type_nibble() {
    let dict = new_dict(1 << 16, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let (data, stride) = screen_like(ImageType::Plt4Be, 10, 3, 1);
    let mut out = Vec::new();
    enc.encode(EncodeRequest::new(ImageType::Plt4Be, 10, 3, stride, data), &mut out, 4096).unwrap();
    assert_eq!(out[8], 0x14);
    assert!(parse_header(&out).top_down);
}

#[test]
fn image_ids_increase_per_encode() {
    let dict = new_dict(1 << 20, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let data = solid_rgb32(8, 8, [9, 9, 9]);
    for expected in 0..4u64 {
        let out = encode_all(&mut enc, ImageType::Rgb32, 8, 8, 32, &data);
        let h = parse_header(&out);
        assert_eq!(h.id, expected);
        assert_eq!(h.head_dist as u64, expected);
    }
}

#[test]
fn image_id_keeps_high_bits() {
    let restore = RestoreData { size: 1 << 16, max_encoders: 1, last_image_id: (1 << 40) + 3 };
    let dict = SharedDictionary::restore(&restore, &mut NullUsr).unwrap();
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let out = encode_all(&mut enc, ImageType::Rgb32, 4, 4, 16, &solid_rgb32(4, 4, [0, 0, 0]));
    assert_eq!(&out[21..29], &((1u64 << 40) + 3).to_be_bytes());
}

// ─────────────────────────────────────────────────────────────────────────────
// Body
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn solid_image_exact_bytes() {
    let dict = new_dict(1 << 16, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let p = [0x11, 0x22, 0x33];
    let out = encode_all(&mut enc, ImageType::Rgb32, 4, 4, 16, &solid_rgb32(4, 4, p));

    let mut expected = vec![1];
    expected.extend_from_slice(&p);
    expected.extend_from_slice(&p);
    // run of 12 pixels, distance 1 (written as 0), same image
    expected.extend_from_slice(&[0xE0, 5, 0, 0]);
    expected.push(1);
    expected.extend_from_slice(&p);
    expected.extend_from_slice(&p);
    assert_eq!(&out[HEADER_SIZE..], &expected[..]);
}

#[test]
fn literal_only_image_size() {
    let dict = new_dict(1 << 16, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let n = 100u32;
    let out = encode_all(&mut enc, ImageType::Rgb32, n, 1, 4 * n, &distinct_rgb32(n, 1));
    let count_bytes = (n as usize).div_ceil(32);
    assert_eq!(out.len(), HEADER_SIZE + count_bytes + 3 * n as usize);
}

#[test]
fn literal_only_palette_size_on_run_boundary() {
    let dict = new_dict(1 << 16, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let data: Vec<u8> = (0..64u8).collect();
    let out = encode_all(&mut enc, ImageType::Plt8, 64, 1, 64, &data);
    assert_eq!(out.len(), HEADER_SIZE + 2 + 64);
    assert_eq!(out[HEADER_SIZE], 31);
    assert_eq!(out[HEADER_SIZE + 33], 31);
}

#[test]
fn repeated_image_references_previous_one() {
    let dict = new_dict(1 << 20, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let (data, stride) = noise(ImageType::Rgb24, 64, 16, 7);
    let first = encode_all(&mut enc, ImageType::Rgb24, 64, 16, stride, &data);
    let second = encode_all(&mut enc, ImageType::Rgb24, 64, 16, stride, &data);

    assert!(first.len() > data.len());
    assert!(second.len() < 64, "second copy took {} bytes", second.len());

    let mut dec = Decoder::new();
    assert_eq!(dec.decode(&first).data, data);
    assert_eq!(dec.decode(&second).data, data);
}

#[test]
fn images_of_other_types_are_not_referenced() {
    let dict = new_dict(1 << 20, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let (data, _) = noise(ImageType::Plt8, 256, 4, 3);
    encode_all(&mut enc, ImageType::Plt8, 256, 4, 256, &data);
    // the same bytes as PLT4 pixels may not point back at the PLT8 image
    let out = encode_all(&mut enc, ImageType::Plt4Le, 512, 4, 256, &data);
    assert!(out.len() > data.len());
}

#[test]
fn matches_never_cost_more_than_literals() {
    let mut seen = 0usize;
    for image_type in [ImageType::Plt8, ImageType::Rgb16, ImageType::Rgb24, ImageType::Rgba] {
        let dict = new_dict(1 << 20, 1);
        let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
        let mut dec = Decoder::new();
        for seed in 0..12u64 {
            let (data, stride) = if seed % 3 == 0 {
                noise(image_type, 61, 17, seed)
            } else {
                screen_like(image_type, 61, 17, seed % 4)
            };
            let out = encode_all(&mut enc, image_type, 61, 17, stride, &data);
            let decoded = dec.decode(&out);
            assert_eq!(decoded.data, data);
            for m in &decoded.matches {
                assert!(
                    m.bytes <= m.units * m.literal_bytes,
                    "{image_type:?} seed {seed}: {} opcode bytes for {} units",
                    m.bytes,
                    m.units
                );
            }
            seen += decoded.matches.len();
        }
    }
    assert!(seen > 100, "only {seen} matches exercised");
}

/// Three one-row PLT8 images sharing a key at offset 2: the first and last
/// are identical, the middle one shares only four units of the key.
fn shared_key_images() -> [Vec<u8>; 3] {
    let key = [11u8, 12, 13, 14, 15, 16, 17, 18];
    let mut full = vec![1u8, 2];
    full.extend_from_slice(&key);
    full.extend(100..130u8);
    let mut short = vec![1u8, 2];
    short.extend_from_slice(&key[..4]);
    short.extend(160..194u8);
    [full.clone(), short, full]
}

fn first_match_of_last_image() -> crate::common::decoder::MatchOp {
    let dict = new_dict(1 << 16, 1);
    let mut enc = Encoder::create(0, dict, NullUsr).unwrap();
    let mut dec = Decoder::new();
    let mut last = None;
    for data in shared_key_images() {
        let out = encode_all(&mut enc, ImageType::Plt8, 40, 1, 40, &data);
        let decoded = dec.decode(&out);
        assert_eq!(decoded.data, data);
        last = decoded.matches.first().copied();
    }
    last.unwrap()
}

#[cfg(not(feature = "chained-hash"))]
#[test]
fn single_slot_hash_keeps_newest_candidate() {
    let m = first_match_of_last_image();
    assert_eq!(m.image_distance, 1);
    assert_eq!(m.units, 4);
}

#[cfg(feature = "chained-hash")]
#[test]
fn chained_hash_takes_longest_candidate() {
    let m = first_match_of_last_image();
    assert_eq!(m.image_distance, 2);
    assert_eq!(m.units, 36);
}

proptest! {
    #[test]
    fn output_within_bound(seed in any::<u64>(), w in 1u32..48, h in 1u32..24, t in 1u8..=9) {
        let image_type = ImageType::try_from(t).unwrap();
        let dict = new_dict(1 << 20, 1);
        let mut enc = Encoder::create(0, dict, crate::common::usr::RecordingUsr::new()).unwrap();
        let (data, stride) = if seed % 2 == 0 {
            noise(image_type, w, h, seed)
        } else {
            screen_like(image_type, w, h, seed)
        };
        let budget = glz::max_encoded_size(image_type, h, stride);
        let mut out = Vec::new();
        let req = EncodeRequest::new(image_type, w, h, stride, data.clone());
        enc.encode(req, &mut out, budget).unwrap();
        prop_assert!(out.len() <= budget);
        prop_assert_eq!(enc.usr().space_requests, 0);
        prop_assert_eq!(Decoder::new().decode(&out).data, data);
    }
}
