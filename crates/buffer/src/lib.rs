//! Bounds-checked primitive readers over little-endian byte buffers.
//!
//! Every reader follows the `winnow` calling convention (`&mut &[u8]` in, [`ModalResult`] out),
//! so it composes with `winnow` combinators such as `repeat`, `verify` or tuples.
//!
//! A read that would run past the end of the buffer fails with [`ErrMode::Incomplete`]
//! carrying the number of missing bytes. That is the only way these readers report truncation,
//! which lets callers tell a short buffer apart from a structurally invalid one.

pub mod errors;
pub mod interrupt;

use winnow::error::{ContextError, ErrMode, Needed};
use winnow::prelude::*;
use winnow::stream::ToUsize;

pub use errors::BufferError;
pub use interrupt::Interrupt;

#[inline(always)]
fn need(input: &[u8], len: usize) -> ModalResult<()> {
    if input.len() < len {
        return Err(ErrMode::Incomplete(Needed::new(len - input.len())));
    }

    Ok(())
}

/// Error used when bytes are present but describe something invalid
#[inline]
pub fn corrupt() -> ErrMode<ContextError> {
    ErrMode::Cut(ContextError::new())
}

#[inline]
pub fn u8(input: &mut &[u8]) -> ModalResult<u8> {
    need(input, 1)?;
    winnow::binary::u8.parse_next(input)
}

#[inline]
pub fn le_u16(input: &mut &[u8]) -> ModalResult<u16> {
    need(input, 2)?;
    winnow::binary::le_u16.parse_next(input)
}

#[inline]
pub fn le_u32(input: &mut &[u8]) -> ModalResult<u32> {
    need(input, 4)?;
    winnow::binary::le_u32.parse_next(input)
}

#[inline]
pub fn le_u64(input: &mut &[u8]) -> ModalResult<u64> {
    need(input, 8)?;
    winnow::binary::le_u64.parse_next(input)
}

/// Split `len` bytes off the front of `input` and advance past them
#[inline]
pub fn slice<'a>(input: &mut &'a [u8], len: usize) -> ModalResult<&'a [u8]> {
    need(input, len)?;

    let (head, rest) = input.split_at(len);
    *input = rest;

    Ok(head)
}

/// Parser form of [`slice`]
#[inline]
pub fn take<'a>(len: impl ToUsize) -> impl Parser<&'a [u8], &'a [u8], ErrMode<ContextError>> {
    let len = len.to_usize();
    move |input: &mut &'a [u8]| slice(input, len)
}

/// Reposition to `index` bytes from the start of `buf`
///
/// `index == buf.len()` is valid and yields an empty view.
#[inline]
pub fn position(buf: &[u8], index: usize) -> ModalResult<&[u8]> {
    buf.get(index..)
        .ok_or_else(|| ErrMode::Incomplete(Needed::new(index - buf.len())))
}

/// Fixed window `[offset, offset + len)` of `buf`
#[inline]
pub fn window(buf: &[u8], offset: usize, len: usize) -> ModalResult<&[u8]> {
    let mut input = position(buf, offset)?;
    slice(&mut input, len)
}

/// `u32` length followed by that many bytes
#[inline]
pub fn length_prefixed<'a>(input: &mut &'a [u8]) -> ModalResult<&'a [u8]> {
    let len = le_u32(input)?;
    slice(input, len as usize)
}

/// Fixed-size ASCII field, trimmed at the first NUL
pub fn ascii_fixed<'a>(len: usize) -> impl Parser<&'a [u8], String, ErrMode<ContextError>> {
    move |input: &mut &'a [u8]| {
        let raw = slice(input, len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());

        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

/// Fixed-size UTF-16LE field of `units` code units, trimmed at the first NUL
pub fn utf16_fixed<'a>(units: usize) -> impl Parser<&'a [u8], String, ErrMode<ContextError>> {
    move |input: &mut &'a [u8]| {
        let raw = slice(input, units.saturating_mul(2))?;
        Ok(decode_utf16(raw))
    }
}

/// UTF-16LE string terminated by a NUL code unit, the terminator is consumed
pub fn utf16_nul_terminated(input: &mut &[u8]) -> ModalResult<String> {
    let mut units = Vec::new();

    loop {
        match le_u16(input)? {
            0 => break,
            unit => units.push(unit),
        }
    }

    Ok(char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect())
}

/// Decode UTF-16LE code units until the first NUL, unpaired surrogates become U+FFFD
pub fn decode_utf16(raw: &[u8]) -> String {
    let units = raw
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .take_while(|&unit| unit != 0);

    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_primitives() {
        let data = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
            0x0f,
        ];
        let input = &mut &data[..];

        assert_eq!(u8(input).ok(), Some(0x01));
        assert_eq!(le_u16(input).ok(), Some(0x0302));
        assert_eq!(le_u32(input).ok(), Some(0x07060504));
        assert_eq!(le_u64(input).ok(), Some(0x0f0e0d0c0b0a0908));
        assert!(input.is_empty());
    }

    #[test]
    fn short_read_is_truncation() {
        let data = [0x01, 0x02, 0x03];
        let input = &mut &data[..];

        let err = le_u32(input).unwrap_err();
        assert_eq!(BufferError::from(err), BufferError::Truncated { needed: 1 });
        // a failed read does not move the cursor
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn slice_advances_parent() {
        let data = [1, 2, 3, 4, 5];
        let input = &mut &data[..];

        assert_eq!(slice(input, 2).ok(), Some(&[1u8, 2][..]));
        assert_eq!(*input, &[3u8, 4, 5][..]);
        assert!(slice(input, 4).is_err());
    }

    #[test]
    fn position_accepts_limit() {
        let data = [1, 2, 3];

        assert_eq!(position(&data, 3).ok(), Some(&[][..]));
        assert_eq!(position(&data, 1).ok(), Some(&[2u8, 3][..]));

        let err = position(&data, 5).unwrap_err();
        assert_eq!(BufferError::from(err), BufferError::Truncated { needed: 2 });
    }

    #[test]
    fn window_is_bounded() {
        let data = [0u8, 1, 2, 3, 4, 5];
        assert_eq!(window(&data, 2, 3).ok(), Some(&[2u8, 3, 4][..]));
        assert!(window(&data, 4, 3).is_err());

        let err = window(&data, 9, 1).unwrap_err();
        assert!(BufferError::from(err).is_truncated());
    }

    #[test]
    fn utf16_fixed_trims_nul() {
        let mut data = Vec::new();
        for unit in "com.app".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        data.resize(32, 0);

        let input = &mut &data[..];
        assert_eq!(utf16_fixed(16).parse_next(input).ok(), Some("com.app".to_owned()));
        assert!(input.is_empty());
    }

    #[test]
    fn utf16_nul_terminated_consumes_terminator() {
        let data = [b'h', 0, b'i', 0, 0, 0, 0xff];
        let input = &mut &data[..];

        assert_eq!(utf16_nul_terminated(input).ok(), Some("hi".to_owned()));
        assert_eq!(*input, &[0xffu8][..]);
    }

    #[test]
    fn utf16_without_terminator_is_truncated() {
        let data = [b'h', 0, b'i'];
        let err = utf16_nul_terminated(&mut &data[..]).unwrap_err();
        assert!(BufferError::from(err).is_truncated());
    }

    #[test]
    fn ascii_fixed_reads_magic() {
        let data = b"APK Sig Block 42tail";
        let input = &mut &data[..];

        assert_eq!(
            ascii_fixed(16).parse_next(input).ok(),
            Some("APK Sig Block 42".to_owned())
        );
        assert_eq!(*input, &b"tail"[..]);
    }

    #[test]
    fn length_prefixed_checks_bounds() {
        let data = [2, 0, 0, 0, 0xaa, 0xbb, 0xcc];
        let input = &mut &data[..];
        assert_eq!(length_prefixed(input).ok(), Some(&[0xaau8, 0xbb][..]));

        let data = [9, 0, 0, 0, 0xaa];
        assert!(length_prefixed(&mut &data[..]).is_err());
    }

    #[test]
    fn corrupt_is_not_truncation() {
        assert!(!BufferError::from(corrupt()).is_truncated());
    }
}
