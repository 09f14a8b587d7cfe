// Unit tests for dictionary lifecycle (dictionary/mod.rs)
//
// Coverage:
//   - create validates window size and encoder count
//   - pre_encode rejects out-of-range and busy encoder ids
//   - leases print their encoder, image and head distance
//   - failed pre_encode leaves the dictionary untouched and reports the error
//   - reset empties the window, restarts ids and refuses while encoding
//   - restore data round-trips the image-id sequence
//   - remove_image kills an image without a later free_image callback
//   - destroy releases every live image

use glz::config::LZ_MAX_WINDOW_SIZE;
use glz::{GlzError, ImageToken, ImageType, LineChunk, NullUsr, RestoreData, SharedDictionary};

use crate::common::usr::{Events, RecordingUsr};
use crate::common::{insert_plt8, new_dict};

// ─────────────────────────────────────────────────────────────────────────────
// create
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn create_rejects_oversized_window() {
    let mut usr = RecordingUsr::new();
    let err = SharedDictionary::create(LZ_MAX_WINDOW_SIZE + 1, 1, &mut usr).unwrap_err();
    assert_eq!(err, GlzError::WindowTooLarge(LZ_MAX_WINDOW_SIZE + 1));
    assert_eq!(usr.events.errors(), vec![err]);
}

#[test]
fn create_rejects_bad_encoder_counts() {
    assert_eq!(
        SharedDictionary::create(100, 0, &mut NullUsr).unwrap_err(),
        GlzError::InvalidEncoderCount(0)
    );
    assert_eq!(
        SharedDictionary::create(100, 257, &mut NullUsr).unwrap_err(),
        GlzError::InvalidEncoderCount(257)
    );
    assert!(SharedDictionary::create(LZ_MAX_WINDOW_SIZE, 256, &mut NullUsr).is_ok());
}

#[test]
fn create_reports_its_parameters() {
    let dict = new_dict(1234, 3);
    assert_eq!(dict.get_size(), 1234);
    assert_eq!(dict.max_encoders(), 3);
    assert_eq!(dict.last_image_id(), 0);
    assert_eq!(dict.image_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// pre_encode failures
// ─────────────────────────────────────────────────────────────────────────────

fn plt8_lines(pixels: u32) -> LineChunk {
    LineChunk::new(vec![7u8; pixels as usize], 1)
}

#[test]
fn pre_encode_rejects_out_of_range_encoder() {
    let dict = new_dict(100, 2);
    let mut usr = RecordingUsr::new();
    let err = dict
        .pre_encode(2, &mut usr, ImageType::Plt8, 10, 1, 10, plt8_lines(10), ImageToken(0))
        .unwrap_err();
    assert_eq!(err, GlzError::EncoderIdOutOfRange { id: 2, max_encoders: 2 });
    assert_eq!(usr.events.errors(), vec![err]);
}

#[test]
fn pre_encode_rejects_busy_encoder() {
    let dict = new_dict(100, 1);
    let mut usr = RecordingUsr::new();
    let lease = dict
        .pre_encode(0, &mut usr, ImageType::Plt8, 10, 1, 10, plt8_lines(10), ImageToken(0))
        .unwrap();
    let err = dict
        .pre_encode(0, &mut usr, ImageType::Plt8, 10, 1, 10, plt8_lines(10), ImageToken(1))
        .unwrap_err();
    assert_eq!(err, GlzError::EncoderBusy(0));
    dict.post_encode(lease, &mut usr);
    assert_eq!(dict.image_count(), 1);
}

#[test]
fn lease_debug_names_encoder_and_image() {
    let dict = new_dict(100, 2);
    let mut usr = RecordingUsr::new();
    insert_plt8(&dict, 0, &mut usr, 10, 0);
    let lease = dict
        .pre_encode(1, &mut usr, ImageType::Plt8, 10, 1, 10, plt8_lines(10), ImageToken(1))
        .unwrap();
    let text = format!("{lease:?}");
    assert!(text.starts_with("EncodeLease"), "{text}");
    assert!(text.contains("encoder_id: 1"), "{text}");
    assert!(text.contains("image_id: 1"), "{text}");
    assert!(text.contains("window_head_distance: 1"), "{text}");
    dict.post_encode(lease, &mut usr);
}

#[test]
fn image_larger_than_window_is_rejected() {
    let dict = new_dict(100, 1);
    let mut usr = RecordingUsr::new();
    insert_plt8(&dict, 0, &mut usr, 50, 1);
    let err = dict
        .pre_encode(0, &mut usr, ImageType::Plt8, 101, 1, 101, plt8_lines(101), ImageToken(2))
        .unwrap_err();
    assert_eq!(err, GlzError::ImageTooLarge { image_size: 101, size_limit: 100 });
    assert_eq!(dict.image_count(), 1);
    assert_eq!(dict.last_image_id(), 1);
    assert!(usr.events.freed().is_empty());
}

#[test]
fn missing_lines_leave_dictionary_untouched() {
    let dict = new_dict(1000, 1);
    let mut usr = RecordingUsr::new();
    usr.lines.push_back(LineChunk::new(vec![1u8; 10], 1));
    let err = dict
        .pre_encode(0, &mut usr, ImageType::Plt8, 10, 4, 10, LineChunk::new(vec![0u8; 10], 1), ImageToken(0))
        .unwrap_err();
    assert_eq!(err, GlzError::MoreLinesFailed { rows: 2, height: 4 });
    assert_eq!(usr.events.errors(), vec![err]);
    assert_eq!(dict.image_count(), 0);
    assert_eq!(dict.last_image_id(), 0);

    // the encoder is not left busy
    assert!(dict.pre_encode(0, &mut usr, ImageType::Plt8, 10, 1, 10, plt8_lines(10), ImageToken(1)).is_ok());
}

#[test]
fn short_chunk_is_rejected() {
    let dict = new_dict(1000, 1);
    let mut usr = RecordingUsr::new();
    let err = dict
        .pre_encode(0, &mut usr, ImageType::Plt8, 10, 2, 10, LineChunk::new(vec![0u8; 15], 2), ImageToken(0))
        .unwrap_err();
    assert_eq!(err, GlzError::ShortLines { len: 15, num_lines: 2, stride: 10 });
}

#[test]
fn empty_image_is_rejected() {
    let dict = new_dict(1000, 1);
    let mut usr = RecordingUsr::new();
    let err = dict
        .pre_encode(0, &mut usr, ImageType::Plt8, 10, 0, 10, LineChunk::empty(), ImageToken(0))
        .unwrap_err();
    assert_eq!(err, GlzError::EmptyImage);
}

// ─────────────────────────────────────────────────────────────────────────────
// reset / restore / destroy
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn reset_empties_window_and_restarts_ids() {
    let dict = new_dict(1000, 1);
    let events = Events::default();
    let mut usr = RecordingUsr::with_events(events.clone());
    for token in 0..3 {
        insert_plt8(&dict, 0, &mut usr, 10, token);
    }
    assert_eq!(dict.last_image_id(), 3);

    dict.reset(&mut usr).unwrap();
    assert_eq!(dict.image_count(), 0);
    assert_eq!(dict.window_size(), 0);
    assert_eq!(dict.last_image_id(), 0);
    assert_eq!(events.freed(), vec![ImageToken(0), ImageToken(1), ImageToken(2)]);

    let image = insert_plt8(&dict, 0, &mut usr, 10, 9);
    assert_eq!(image.id(), 0);
}

#[test]
fn reset_refuses_while_an_encoder_is_active() {
    let dict = new_dict(1000, 2);
    let mut usr = RecordingUsr::new();
    let lease = dict
        .pre_encode(1, &mut usr, ImageType::Plt8, 10, 1, 10, plt8_lines(10), ImageToken(0))
        .unwrap();
    assert_eq!(dict.reset(&mut usr).unwrap_err(), GlzError::EncoderBusy(1));
    dict.post_encode(lease, &mut usr);
    assert!(dict.reset(&mut usr).is_ok());
}

#[test]
fn restore_continues_the_id_sequence() {
    let dict = new_dict(500, 4);
    let mut usr = RecordingUsr::new();
    for token in 0..5 {
        insert_plt8(&dict, 0, &mut usr, 10, token);
    }
    let data = dict.get_restore_data();
    assert_eq!(data, RestoreData { size: 500, max_encoders: 4, last_image_id: 5 });

    let restored = SharedDictionary::restore(&data, &mut usr).unwrap();
    assert_eq!(restored.get_size(), 500);
    assert_eq!(restored.max_encoders(), 4);
    assert_eq!(restored.image_count(), 0);
    let image = insert_plt8(&restored, 3, &mut usr, 10, 5);
    assert_eq!(image.id(), 5);
}

#[test]
fn destroy_releases_live_images() {
    let dict = new_dict(1000, 1);
    let events = Events::default();
    let mut usr = RecordingUsr::with_events(events.clone());
    let a = insert_plt8(&dict, 0, &mut usr, 10, 1);
    insert_plt8(&dict, 0, &mut usr, 10, 2);
    dict.remove_image(&a, &mut usr);
    dict.destroy(&mut usr).unwrap();
    assert_eq!(events.freed(), vec![ImageToken(2)]);
}

// ─────────────────────────────────────────────────────────────────────────────
// remove_image
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn removed_image_is_not_reported_on_eviction() {
    let dict = new_dict(100, 1);
    let events = Events::default();
    let mut usr = RecordingUsr::with_events(events.clone());
    let a = insert_plt8(&dict, 0, &mut usr, 60, 1);
    dict.remove_image(&a, &mut usr);
    assert!(!a.is_alive());
    assert_eq!(dict.image_count(), 1);

    insert_plt8(&dict, 0, &mut usr, 60, 2);
    assert_eq!(dict.image_count(), 1);
    assert!(events.freed().is_empty());
    assert!(events.warnings().is_empty());
}

#[test]
fn removing_an_evicted_image_is_ignored() {
    let dict = new_dict(100, 1);
    let events = Events::default();
    let mut usr = RecordingUsr::with_events(events.clone());
    let a = insert_plt8(&dict, 0, &mut usr, 60, 1);
    let b = insert_plt8(&dict, 0, &mut usr, 60, 2);
    assert!(!a.is_alive());

    dict.remove_image(&a, &mut usr);
    assert_eq!(events.warnings().len(), 1);
    assert!(b.is_alive());
}

#[test]
fn stale_handle_after_reset_does_not_touch_new_image() {
    let dict = new_dict(100, 1);
    let mut usr = RecordingUsr::new();
    let old = insert_plt8(&dict, 0, &mut usr, 10, 1);
    dict.reset(&mut usr).unwrap();
    let new = insert_plt8(&dict, 0, &mut usr, 10, 2);
    assert_eq!(old.id(), new.id());

    dict.remove_image(&old, &mut usr);
    assert!(new.is_alive());
}
