//! Identifier helpers.

use uuid::Uuid;

const ALPHABET: &[u8; 57] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of a [`short_uuid`].
pub const SHORT_UUID_LEN: usize = 22;

/// Generate a 22-character base57 identifier from a random UUID.
///
/// The alphabet drops visually ambiguous characters (`0`, `1`, `I`, `O`, `l`),
/// so ids are safe to read aloud and paste into log queries.
#[must_use]
pub fn short_uuid() -> String {
    encode(Uuid::new_v4().as_u128())
}

fn encode(mut n: u128) -> String {
    let mut out = [b'2'; SHORT_UUID_LEN];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(n % 57) as usize];
        n /= 57;
    }
    out.iter().map(|&b| b as char).collect()
}
