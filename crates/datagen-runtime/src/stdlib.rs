//! Seedable helpers for gen bodies.
//!
//! Every helper draws from one process-wide `ChaCha8Rng`; calling [`seed`] before generation
//! makes a run reproducible.

use std::sync::{Mutex, MutexGuard, OnceLock};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::record::lock;

const ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

static RNG: OnceLock<Mutex<ChaCha8Rng>> = OnceLock::new();

fn rng() -> MutexGuard<'static, ChaCha8Rng> {
    lock(RNG.get_or_init(|| Mutex::new(ChaCha8Rng::from_os_rng())))
}

pub fn seed(seed: u64) {
    *rng() = ChaCha8Rng::seed_from_u64(seed);
}

/// Uniform integer in `low..=high`; `low` when the range is empty.
pub fn int_between(low: i64, high: i64) -> i64 {
    if low >= high {
        return low;
    }
    rng().random_range(low..=high)
}

/// Uniform float in `low..high`; `low` when the range is empty.
pub fn float_between(low: f64, high: f64) -> f64 {
    if low.partial_cmp(&high) != Some(std::cmp::Ordering::Less) {
        return low;
    }
    rng().random_range(low..high)
}

pub fn bool_with(probability: f64) -> bool {
    let probability = if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    };
    rng().random_bool(probability)
}

pub fn pick<T: Clone>(items: &[T]) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let index = rng().random_range(0..items.len());
    Some(items[index].clone())
}

fn string_from(alphabet: &[u8], len: usize) -> String {
    let mut rng = rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

pub fn alpha_string(len: usize) -> String {
    string_from(ALPHA, len)
}

pub fn numeric_string(len: usize) -> String {
    string_from(DIGITS, len)
}

/// Random UUID with version 4 and RFC 4122 variant bits.
pub fn uuid_v4_like() -> String {
    let mut bytes = [0_u8; 16];
    rng().fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    uuid::Uuid::from_bytes(bytes).to_string()
}
