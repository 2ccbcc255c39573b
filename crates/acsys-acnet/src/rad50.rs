//! RAD50 name packing used to address ACNET tasks and nodes.
//!
//! A name of up to six characters is packed into 32 bits: each half of three
//! characters is a base-40 number over the alphabet below, the first half in
//! the low 16 bits and the second half in the high 16 bits.

const ALPHABET: &[u8; 40] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ$.%0123456789";

/// Number of characters a packed name holds.
pub const NAME_LEN: usize = 6;

fn char_index(c: u8) -> u32 {
    match c {
        b'A'..=b'Z' => u32::from(c - b'A') + 1,
        b'a'..=b'z' => u32::from(c - b'a') + 1,
        b'$' => 27,
        b'.' => 28,
        b'%' => 29,
        b'0'..=b'9' => u32::from(c - b'0') + 30,
        _ => 0,
    }
}

/// Pack a name. Only the first six characters are used; unknown characters
/// pack as spaces.
pub fn encode(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut first = 0u32;
    let mut second = 0u32;

    for index in 0..NAME_LEN {
        let c = bytes.get(index).copied().unwrap_or(b' ');
        if index < NAME_LEN / 2 {
            first = first * 40 + char_index(c);
        } else {
            second = second * 40 + char_index(c);
        }
    }

    (second << 16) | first
}

/// Unpack a name. Always six characters, space padded.
pub fn decode(packed: u32) -> String {
    let mut out = [b' '; NAME_LEN];
    let mut first = packed & 0xffff;
    let mut second = (packed >> 16) & 0xffff;

    for index in 0..NAME_LEN / 2 {
        out[2 - index] = ALPHABET[(first % 40) as usize];
        first /= 40;
        out[5 - index] = ALPHABET[(second % 40) as usize];
        second /= 40;
    }

    out.iter().map(|&b| char::from(b)).collect()
}
