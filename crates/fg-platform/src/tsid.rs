//! TSID generator
//!
//! Time-sorted 64-bit identifiers rendered as 13 Crockford Base32 characters.
//! Layout: 42 bits of milliseconds since 2020-01-01 followed by 22 random
//! bits. Values are strictly increasing within a process, so string order
//! matches creation order.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const TSID_LEN: usize = 13;
const RANDOM_BITS: u32 = 22;
/// 2020-01-01T00:00:00Z
const TSID_EPOCH_MS: i64 = 1_577_836_800_000;

static LAST_VALUE: AtomicU64 = AtomicU64::new(0);

pub struct TsidGenerator;

impl TsidGenerator {
    pub fn generate() -> String {
        Self::encode(Self::next_value())
    }

    fn next_value() -> u64 {
        let millis = (Utc::now().timestamp_millis() - TSID_EPOCH_MS).max(0) as u64;
        let random: u64 = rand::thread_rng().gen_range(0..(1u64 << RANDOM_BITS));
        let candidate = (millis << RANDOM_BITS) | random;

        let mut last = LAST_VALUE.load(Ordering::Relaxed);
        loop {
            let next = if candidate > last { candidate } else { last + 1 };
            match LAST_VALUE.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    pub fn encode(value: u64) -> String {
        (0..TSID_LEN)
            .map(|i| {
                let shift = (TSID_LEN - 1 - i) * 5;
                ALPHABET[((value >> shift) & 0x1F) as usize] as char
            })
            .collect()
    }

    pub fn decode(tsid: &str) -> Option<u64> {
        if tsid.len() != TSID_LEN {
            return None;
        }
        let mut value: u64 = 0;
        for (i, c) in tsid.bytes().enumerate() {
            let digit = ALPHABET.iter().position(|&a| a == c.to_ascii_uppercase())? as u64;
            // The leading character only carries 4 bits
            if i == 0 && digit > 0x0F {
                return None;
            }
            value = (value << 5) | digit;
        }
        Some(value)
    }

    /// Creation time embedded in a TSID
    pub fn timestamp(tsid: &str) -> Option<DateTime<Utc>> {
        let value = Self::decode(tsid)?;
        let millis = (value >> RANDOM_BITS) as i64 + TSID_EPOCH_MS;
        DateTime::from_timestamp_millis(millis)
    }
}
