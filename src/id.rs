//! Client-side identifier generation.
//!
//! Entities created optimistically need an id before the server has assigned
//! one. Ids are v4-shaped (8-4-4-4-12 lowercase hex with the version and
//! variant nibbles in place) and the final group embeds the millisecond
//! clock, so ids minted in rapid succession from the same client stay
//! distinct.

use rand::Rng;

/// Generate a provisional entity id.
///
/// The last group is the low 40 bits of the Unix time in milliseconds
/// (10 hex digits) followed by 2 random hex digits. Uniqueness is
/// probabilistic, not guaranteed; callers treat generated ids as provisional.
pub fn generate_id() -> String {
    let mut rng = rand::rng();
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64 & 0xff_ffff_ffff;
    format!(
        "{:08x}-{:04x}-4{:03x}-{:x}{:03x}-{:010x}{:02x}",
        rng.random::<u32>(),
        rng.random::<u16>(),
        rng.random::<u16>() & 0x0fff,
        8 | rng.random_range(0u8..4),
        rng.random::<u16>() & 0x0fff,
        millis,
        rng.random::<u8>(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
