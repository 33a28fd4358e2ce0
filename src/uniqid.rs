//! Short random namespace tokens for components.

use rand::Rng;

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const MIN_LEN: usize = 6;
pub const MAX_LEN: usize = 7;

/// Generate a 6 or 7 letter token from the thread-local RNG.
pub fn uniqid() -> String {
    uniqid_with(&mut rand::thread_rng())
}

pub fn uniqid_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(MIN_LEN..=MAX_LEN);
    (0..len)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}
