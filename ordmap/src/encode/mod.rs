pub mod ser;

use bytes::{BufMut, BytesMut};

use crate::{Error, Result};

const HEX: &[u8; 16] = b"0123456789abcdef";

#[inline(always)]
fn encode_unicode_escape(unit: u16, buf: &mut BytesMut) {
    buf.put_slice(&[
        b'\\',
        b'u',
        HEX[(unit >> 12) as usize & 0xf],
        HEX[(unit >> 8) as usize & 0xf],
        HEX[(unit >> 4) as usize & 0xf],
        HEX[unit as usize & 0xf],
    ]);
}

/// Writes `s` as a quoted JSON string.
///
/// U+2028 and U+2029 are always written as unicode escapes. With
/// `escape_html`, so are `<`, `>` and `&`.
pub(crate) fn encode_str(s: &str, escape_html: bool, buf: &mut BytesMut) {
    let bytes = s.as_bytes();
    buf.put_u8(b'"');

    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let short: Option<u8> = match b {
            b'"' => Some(b'"'),
            b'\\' => Some(b'\\'),
            b'\n' => Some(b'n'),
            b'\r' => Some(b'r'),
            b'\t' => Some(b't'),
            0x08 => Some(b'b'),
            0x0c => Some(b'f'),
            _ => None,
        };
        let separator = b == 0xe2
            && bytes.get(i + 1) == Some(&0x80)
            && matches!(bytes.get(i + 2), Some(0xa8 | 0xa9));

        if let Some(c) = short {
            buf.put_slice(&bytes[start..i]);
            buf.put_slice(&[b'\\', c]);
            i += 1;
            start = i;
        } else if b < 0x20 || (escape_html && matches!(b, b'<' | b'>' | b'&')) {
            buf.put_slice(&bytes[start..i]);
            encode_unicode_escape(b as u16, buf);
            i += 1;
            start = i;
        } else if separator {
            buf.put_slice(&bytes[start..i]);
            let unit = if bytes[i + 2] == 0xa8 { 0x2028 } else { 0x2029 };
            encode_unicode_escape(unit, buf);
            i += 3;
            start = i;
        } else {
            i += 1;
        }
    }

    buf.put_slice(&bytes[start..]);
    buf.put_u8(b'"');
}

pub(crate) fn encode_i64(i: i64, buf: &mut BytesMut) {
    use lexical::{FormattedSize, ToLexical};
    let mut digits = [0; i64::FORMATTED_SIZE_DECIMAL];

    buf.put_slice(i.to_lexical(&mut digits));
}

pub(crate) fn encode_u64(u: u64, buf: &mut BytesMut) {
    use lexical::{FormattedSize, ToLexical};
    let mut digits = [0; u64::FORMATTED_SIZE_DECIMAL];

    buf.put_slice(u.to_lexical(&mut digits));
}

pub(crate) fn encode_i128(i: i128, buf: &mut BytesMut) {
    use lexical::{FormattedSize, ToLexical};
    let mut digits = [0; i128::FORMATTED_SIZE_DECIMAL];

    buf.put_slice(i.to_lexical(&mut digits));
}

pub(crate) fn encode_u128(u: u128, buf: &mut BytesMut) {
    use lexical::{FormattedSize, ToLexical};
    let mut digits = [0; u128::FORMATTED_SIZE_DECIMAL];

    buf.put_slice(u.to_lexical(&mut digits));
}

pub(crate) fn encode_f64(f: f64, buf: &mut BytesMut) -> Result<()> {
    use lexical::{FormattedSize, ToLexical};
    let mut digits = [0; f64::FORMATTED_SIZE_DECIMAL];

    if !f.is_finite() {
        return Err(Error::unsupported(format_args!("non-finite float {f}")));
    }
    // Written from the magnitude so negative zero keeps its sign.
    if f.is_sign_negative() {
        buf.put_u8(b'-');
    }
    buf.put_slice(f.abs().to_lexical(&mut digits));
    Ok(())
}

pub(crate) fn encode_f32(f: f32, buf: &mut BytesMut) -> Result<()> {
    use lexical::{FormattedSize, ToLexical};
    let mut digits = [0; f32::FORMATTED_SIZE_DECIMAL];

    if !f.is_finite() {
        return Err(Error::unsupported(format_args!("non-finite float {f}")));
    }
    if f.is_sign_negative() {
        buf.put_u8(b'-');
    }
    buf.put_slice(f.abs().to_lexical(&mut digits));
    Ok(())
}

#[inline(always)]
pub(crate) fn encode_bool(b: bool, buf: &mut BytesMut) {
    if b {
        buf.put_slice(b"true");
    } else {
        buf.put_slice(b"false");
    }
}

#[inline(always)]
pub(crate) fn encode_null(buf: &mut BytesMut) {
    buf.put_slice(b"null");
}
