//! Packing of small fields into the 32-bit words clocked through the FPGA
//! shift registers, and the inverse.
//!
//! Streams are MSB-first: bit `i` of a stream lives in word `i / 32` at bit
//! position `31 - i % 32`. A stream shorter than its words is left-aligned,
//! with the unused low bits of the final word set to zero.

use bitreader::BitReader;

use crate::{
    ArgumentError,
    codec::MAX_PAYLOAD,
    units::{Bits, Words32},
};

pub const fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Write the low `width` bits of `value` into `words`, starting at stream
/// position `pos`. Bits already set in `words` are kept.
pub fn put_bits(words: &mut [u32], mut pos: usize, value: u32, width: u32) {
    let mut remaining = width;
    while remaining > 0 {
        let used = (pos % 32) as u32;
        let free = 32 - used;
        let take = remaining.min(free);
        let chunk = (value >> (remaining - take)) & mask(take);
        words[pos / 32] |= chunk << (free - take);
        pos += take as usize;
        remaining -= take;
    }
}

/// Copy the first `len` bits of the left-aligned `stream` into `dst`,
/// starting at stream position `start` of `dst`.
pub fn place(dst: &mut [u32], start: usize, stream: &[u32], len: Bits<u32>) {
    for (idx, &word) in stream.iter().take(len.words().0).enumerate() {
        let pos = idx * 32;
        let width = (len.0 as usize - pos).min(32) as u32;
        put_bits(dst, start + pos, word >> (32 - width), width);
    }
}

/// Copy `len` bits of `src`, starting at stream position `start`, out into a
/// new left-aligned stream.
pub fn extract(src: &[u32], start: usize, len: Bits<u32>) -> Vec<u32> {
    (0..len.words().0)
        .map(|idx| {
            let pos = idx * 32;
            let width = (len.0 as usize - pos).min(32) as u32;
            get_bits(src, start + pos, width) << (32 - width)
        })
        .collect()
}

/// Pack `args` MSB-first into left-aligned words. Every element is
/// `width / args.len()` bits wide.
pub fn merge(args: &[u32], width: Bits<u32>) -> Result<Vec<u32>, ArgumentError> {
    let count = args.len();
    if count == 0 {
        return Err(ArgumentError::Empty);
    }
    if width.0 % count as u32 != 0 {
        return Err(ArgumentError::UnevenWidth { width, count });
    }
    let element = width.0 / count as u32;
    if !(1..=32).contains(&element) {
        return Err(ArgumentError::ElementWidth(Bits(element)));
    }

    let mut words = vec![0; width.words().0];
    for (index, &value) in args.iter().enumerate() {
        if value & !mask(element) != 0 {
            return Err(ArgumentError::Overflow {
                index,
                value,
                width: Bits(element),
            });
        }
        put_bits(&mut words, index * element as usize, value, element);
    }
    Ok(words)
}

/// Split the first `width` bits of a left-aligned stream into
/// `element`-sized values, applying `element_mask` to each.
pub fn unpack(
    words: &[u32],
    element: Bits<u32>,
    element_mask: u32,
    width: Bits<u32>,
) -> Result<Vec<u32>, ArgumentError> {
    if !(1..=32).contains(&element.0) {
        return Err(ArgumentError::ElementWidth(element));
    }
    if words.len() < width.words().0 {
        return Err(ArgumentError::ShortStream {
            have: Words32(words.len()),
            need: width,
        });
    }

    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    let mut reader = BitReader::new(&bytes);
    let count = width.0 / element.0;
    (0..count)
        .map(|_| {
            reader
                .read_u32(element.0 as u8)
                .map(|v| v & element_mask)
                .map_err(|_| ArgumentError::ShortStream {
                    have: Words32(words.len()),
                    need: width,
                })
        })
        .collect()
}

/// Undo the extra clocked bit of a raw (not right-aligned) shift register
/// capture of `len` data bits.
///
/// The capture holds `len + 1` bits, left-aligned, the first of which is
/// not data. Every full word is shifted left by one with the top bit of the
/// next word carried in. The last word is right-justified instead: the raw
/// word is shifted right by `32 - (len + 1) % 32` and the bit already
/// carried into the previous word is masked away. When `len` is a multiple
/// of 32 that last raw word holds nothing but the carried bit and is
/// dropped.
///
/// ```text
/// len = 40, raw:  [x d0..d30] [d31..d39 0...]
///           out:  [d0..d31]   [0... d32..d39]
/// ```
pub fn reassemble(raw: &[u32], len: Bits<u32>) -> Result<Vec<u32>, ArgumentError> {
    if len > MAX_PAYLOAD {
        return Err(ArgumentError::TooLong(len));
    }
    let clocked = len + 1;
    let Words32(n) = clocked.words();
    if raw.len() < n {
        return Err(ArgumentError::ShortStream {
            have: Words32(raw.len()),
            need: clocked,
        });
    }
    let raw = &raw[..n];

    let mut out: Vec<u32> = (0..n)
        .map(|i| {
            let carry = raw.get(i + 1).map_or(0, |next| next >> 31);
            raw[i] << 1 | carry
        })
        .collect();

    let remainder = match clocked.tail() {
        0 => 32,
        r => r,
    };
    if remainder == 1 {
        out.pop();
    } else if let Some(last) = out.last_mut() {
        *last = (raw[n - 1] >> (32 - remainder)) & mask(remainder - 1);
    }
    Ok(out)
}

/// Turn a reassembled sequence (tail right-justified) back into a
/// left-aligned stream of `len` bits.
pub fn left_align_tail(mut words: Vec<u32>, len: Bits<u32>) -> Vec<u32> {
    let tail = len.tail();
    if let (1..32, Some(last)) = (tail, words.last_mut()) {
        *last <<= 32 - tail;
    }
    words
}

/// Read `width` bits starting at stream position `pos`. `width` is at most
/// 32.
pub fn get_bits(words: &[u32], pos: usize, width: u32) -> u32 {
    let mut value: u64 = 0;
    let mut remaining = width;
    let mut pos = pos;
    while remaining > 0 {
        let used = (pos % 32) as u32;
        let free = 32 - used;
        let take = remaining.min(free);
        let word = words.get(pos / 32).copied().unwrap_or(0);
        let chunk = (word >> (free - take)) & mask(take);
        value = value << take | u64::from(chunk);
        pos += take as usize;
        remaining -= take;
    }
    value as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(x: u64) -> [u32; 2] {
        [(x >> 32) as u32, x as u32]
    }

    #[test]
    fn test_merge_twelve_by_five() {
        let args: Vec<u32> = (0..12).map(|i| i + 17).collect();
        let words = merge(&args, Bits(60)).unwrap();
        assert_eq!(words.len(), 2);

        let expected = args.iter().fold(0u64, |acc, &a| acc << 5 | u64::from(a)) << 4;
        assert_eq!(words, split(expected));
        assert_eq!(words[1] & 0xf, 0, "tail must be zero padded");
    }

    #[test]
    fn test_merge_rejects_uneven_width() {
        assert_eq!(
            merge(&[1, 2, 3], Bits(10)),
            Err(ArgumentError::UnevenWidth {
                width: Bits(10),
                count: 3
            })
        );
    }

    #[test]
    fn test_merge_rejects_overflow() {
        assert_eq!(
            merge(&[1, 32], Bits(10)),
            Err(ArgumentError::Overflow {
                index: 1,
                value: 32,
                width: Bits(5)
            })
        );
        assert_eq!(merge(&[], Bits(0)), Err(ArgumentError::Empty));
    }

    #[test]
    fn test_unpack_inverts_merge() {
        let cases: [(Vec<u32>, u32); 4] = [
            ((0..12).map(|i| (i * 7) % 32).collect(), 60),
            ((0..24).map(|i| 1023 - i * 13).collect(), 240),
            ((0..128).map(|i| (i * 37) % 1024).collect(), 1280),
            (vec![0xdead_beef, 0x1234_5678, 0x0bad_f00d], 96),
        ];
        for (args, width) in cases {
            let element = width / args.len() as u32;
            let words = merge(&args, Bits(width)).unwrap();
            let back = unpack(&words, Bits(element), mask(element), Bits(width)).unwrap();
            assert_eq!(back, args, "width {width}");
        }
    }

    #[test]
    fn test_unpack_straddles_words() {
        // 10-bit elements: the fourth one occupies stream bits 30..40
        let words = [0b11, 0xff00_0000];
        let values = unpack(&words, Bits(10), mask(10), Bits(40)).unwrap();
        assert_eq!(values, [0, 0, 0, 0b11_1111_1111]);
    }

    #[test]
    fn test_unpack_applies_mask() {
        let values = unpack(&[0xffff_ffff], Bits(8), 0x0f, Bits(32)).unwrap();
        assert_eq!(values, [0x0f; 4]);
        assert!(matches!(
            unpack(&[0], Bits(8), 0xff, Bits(40)),
            Err(ArgumentError::ShortStream { .. })
        ));
    }

    #[test]
    fn test_reassemble_single_word() {
        // extra bit set, then 8 data bits
        let raw = [(1 << 31) | (0xab << 23)];
        assert_eq!(reassemble(&raw, Bits(8)).unwrap(), [0xab]);

        // len + 1 == 32: the whole word is clocked
        let raw = [(1 << 31) | 0x1234_5678];
        assert_eq!(reassemble(&raw, Bits(31)).unwrap(), [0x1234_5678]);
    }

    #[test]
    fn test_reassemble_undoes_extra_bit() {
        // a 63 bit value, captured behind one extra bit, fills two words
        let value: u64 = 0x5a5a_1234_9876_fedc >> 1;
        let raw = split(1 << 63 | value);
        let out = reassemble(&raw, Bits(63)).unwrap();
        assert_eq!(out, [(value >> 31) as u32, value as u32 & mask(31)]);
        assert_eq!(raw[0] << 1 | raw[1] >> 31, out[0]);
    }

    #[test]
    fn test_reassemble_drops_redundant_word() {
        let value: u32 = 0xcafe_babe;
        let raw = [(1 << 31) | value >> 1, value << 31];
        assert_eq!(reassemble(&raw, Bits(32)).unwrap(), [value]);

        let raw = [(1 << 31) | 0x0123_4567 >> 1, 0x0123_4567 << 31 | 0x89ab_cdef >> 1, 1 << 31];
        assert_eq!(reassemble(&raw, Bits(64)).unwrap(), [0x0123_4567, 0x89ab_cdef]);
    }

    #[test]
    fn test_reassemble_rejects_oversized_length() {
        assert_eq!(
            reassemble(&[0], Bits(u32::MAX)),
            Err(ArgumentError::TooLong(Bits(u32::MAX)))
        );
        let raw = vec![0; MAX_PAYLOAD.words().0 + 1];
        assert!(reassemble(&raw, MAX_PAYLOAD).is_ok());
    }

    #[test]
    fn test_reassemble_then_left_align() {
        let value: u64 = 0xab_cdef_0123; // 40 bits
        let stream = value << 24;
        let raw = split(1 << 63 | stream >> 1);
        let out = reassemble(&raw, Bits(40)).unwrap();
        assert_eq!(out, [0xabcd_ef01, 0x23]);
        assert_eq!(left_align_tail(out, Bits(40)), split(stream));
    }

    #[test]
    fn test_place_and_extract() {
        let stream = [0xabcd_ef01, 0x2300_0000];
        let mut dst = [0; 3];
        place(&mut dst, 20, &stream, Bits(40));
        assert_eq!(dst, [0x0000_0abc, 0xdef0_1230, 0]);
        assert_eq!(extract(&dst, 20, Bits(40)), stream);
        assert_eq!(extract(&dst, 20, Bits(0)), Vec::<u32>::new());
    }

    #[test]
    fn test_get_bits() {
        let words = [0x0000_0003, 0xc000_0000];
        assert_eq!(get_bits(&words, 30, 4), 0xf);
        assert_eq!(get_bits(&words, 0, 32), 3);
        assert_eq!(get_bits(&words, 64, 8), 0);
    }
}
