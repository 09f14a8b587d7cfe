// config.rs: Compile-time configuration constants.
//
// Window limits, hash-index geometry and opcode tier boundaries. Everything
// here is fixed by the wire format or by the shared-dictionary layout; runtime
// configuration is limited to the arguments of `SharedDictionary::create`.

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Largest window capacity, in pixels, a dictionary may be created with.
/// Pixel distances are encoded in at most 25 bits.
pub const LZ_MAX_WINDOW_SIZE: u32 = 1 << 25;

/// Number of segment slots allocated when a dictionary is created.
pub const INIT_IMAGE_SEGS_NUM: u32 = 1000;

/// Hard cap on segment slots; one value below the "no segment" sentinel.
pub const MAX_IMAGE_SEGS_NUM: u32 = u32::MAX - 1;

/// Sentinel segment index meaning "no segment".
pub const NULL_IMAGE_SEG_ID: u32 = u32::MAX;

/// Encoder ids are a single byte on the wire-facing API.
pub const MAX_ENCODERS: u32 = 256;

// ---------------------------------------------------------------------------
// Hash index
//
// The default index keeps one candidate per bucket over 2^20 buckets. The
// `chained-hash` feature switches to 2^16 buckets holding a 4-entry ring of
// candidates each.
// ---------------------------------------------------------------------------

#[cfg(not(feature = "chained-hash"))]
pub const HASH_SIZE_LOG: u32 = 20;
#[cfg(not(feature = "chained-hash"))]
pub const HASH_CHAIN_SIZE: usize = 1;

#[cfg(feature = "chained-hash")]
pub const HASH_SIZE_LOG: u32 = 16;
#[cfg(feature = "chained-hash")]
pub const HASH_CHAIN_SIZE: usize = 4;

pub const HASH_SIZE: usize = 1 << HASH_SIZE_LOG;
pub const HASH_MASK: u32 = (HASH_SIZE - 1) as u32;

// ---------------------------------------------------------------------------
// Compress loop
// ---------------------------------------------------------------------------

/// A literal run is closed once it holds this many pixels. Copy-count bytes
/// therefore stay below 32 and never collide with a match opcode, whose top
/// three bits are non-zero.
pub const MAX_COPY: usize = 32;

/// Pixels kept clear of the segment end by the RLE and match extension loops.
pub const BOUND_OFFSET: usize = 2;

/// Pixels kept clear of the segment end by the match search loop.
pub const LIMIT_OFFSET: usize = 6;

/// Leading segments shorter than this are emitted as plain literal runs.
pub const MIN_SEG_UNITS: usize = 4;

// ---------------------------------------------------------------------------
// Match distance tiers
// ---------------------------------------------------------------------------

pub const MAX_PIXEL_SHORT_DISTANCE: u64 = 1 << 12;
pub const MAX_PIXEL_MEDIUM_DISTANCE: u64 = 1 << 17;
pub const MAX_PIXEL_LONG_DISTANCE: u64 = 1 << 25;
pub const MAX_IMAGE_DIST: u64 = (1 << 24) - 1;

pub const SHORT_PIX_IMAGE_DIST_LEVEL_1: u64 = 1 << 6;
pub const SHORT_PIX_IMAGE_DIST_LEVEL_2: u64 = 1 << 14;
pub const SHORT_PIX_IMAGE_DIST_LEVEL_3: u64 = 1 << 22;
pub const FAR_PIX_IMAGE_DIST_LEVEL_1: u64 = 1 << 8;
pub const FAR_PIX_IMAGE_DIST_LEVEL_2: u64 = 1 << 16;
pub const FAR_PIX_IMAGE_DIST_LEVEL_3: u64 = 1 << 24;
