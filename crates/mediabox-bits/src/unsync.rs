//! ID3v2 unsynchronisation.
//!
//! Encoding inserts a zero byte after `0xFF` whenever the next byte is
//! `0x00` or `>= 0xE0`, so no false MPEG frame sync survives inside tag data.
//! Both directions run as two ordered passes and are exact inverses.

const ESCAPE: u8 = 0xFF;

/// Whether a byte following `0xFF` would read as a frame sync.
fn is_sync_tail(byte: u8) -> bool {
    byte >= 0xE0
}

/// Escape `data`.
pub fn encode(data: &[u8]) -> Vec<u8> {
    // Pass 1: FF 00 -> FF 00 00
    let mut first = Vec::with_capacity(data.len() + data.len() / 16);
    let mut i = 0;
    while i < data.len() {
        if data[i] == ESCAPE && data.get(i + 1) == Some(&0x00) {
            first.extend_from_slice(&[ESCAPE, 0x00, 0x00]);
            i += 2;
        } else {
            first.push(data[i]);
            i += 1;
        }
    }

    // Pass 2: FF followed by E0..=FF -> FF 00, lookahead byte not consumed
    let mut out = Vec::with_capacity(first.len() + first.len() / 16);
    for (i, &byte) in first.iter().enumerate() {
        out.push(byte);
        if byte == ESCAPE && first.get(i + 1).is_some_and(|&next| is_sync_tail(next)) {
            out.push(0x00);
        }
    }
    out
}

/// Undo [`encode`].
pub fn decode(data: &[u8]) -> Vec<u8> {
    // Pass 1: FF 00 followed by E0..=FF -> FF
    let mut first = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == ESCAPE
            && data.get(i + 1) == Some(&0x00)
            && data.get(i + 2).is_some_and(|&next| is_sync_tail(next))
        {
            first.push(ESCAPE);
            i += 2;
        } else {
            first.push(data[i]);
            i += 1;
        }
    }

    // Pass 2: FF 00 00 -> FF 00
    let mut out = Vec::with_capacity(first.len());
    let mut i = 0;
    while i < first.len() {
        if first[i..].starts_with(&[ESCAPE, 0x00, 0x00]) {
            out.extend_from_slice(&[ESCAPE, 0x00]);
            i += 3;
        } else {
            out.push(first[i]);
            i += 1;
        }
    }
    out
}

/// Whether [`encode`] would change `data`.
pub fn needs_unsynchronisation(data: &[u8]) -> bool {
    data.windows(2)
        .any(|pair| pair[0] == ESCAPE && (pair[1] == 0x00 || is_sync_tail(pair[1])))
}
