//! STEP string literal codec (ISO 10303-21 string encoding).
//!
//! `decode` takes the raw bytes between the quotes of a literal; `encode`
//! produces a complete literal, quotes included.

use crate::error::{IfcError, Result};

/// Decode the body of a STEP string literal into a Rust string.
pub fn decode(raw: &[u8]) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    // Pending plain bytes, flushed as UTF-8 so non-conforming exporters that
    // write raw UTF-8 still round-trip.
    let mut plain: Vec<u8> = Vec::new();
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'\'' => {
                if raw.get(i + 1) != Some(&b'\'') {
                    return Err(IfcError::InvalidString("unescaped quote".into()));
                }
                plain.push(b'\'');
                i += 2;
            }
            b'\\' => {
                flush(&mut plain, &mut out);
                i = decode_directive(raw, i, &mut out)?;
            }
            b => {
                plain.push(b);
                i += 1;
            }
        }
    }
    flush(&mut plain, &mut out);
    Ok(out)
}

fn flush(plain: &mut Vec<u8>, out: &mut String) {
    if !plain.is_empty() {
        out.push_str(&String::from_utf8_lossy(plain));
        plain.clear();
    }
}

/// Decode one backslash directive starting at `i`; returns the index just
/// past it.
fn decode_directive(raw: &[u8], i: usize, out: &mut String) -> Result<usize> {
    let rest = &raw[i..];

    if rest.starts_with(b"\\\\") {
        out.push('\\');
        return Ok(i + 2);
    }
    // \S\c : high half of the current code page (Latin-1 assumed).
    if rest.starts_with(b"\\S\\") {
        let c = *rest
            .get(3)
            .ok_or_else(|| IfcError::InvalidString("truncated \\S\\ escape".into()))?;
        out.push(char::from(c.wrapping_add(0x80)));
        return Ok(i + 4);
    }
    // \PA\ .. \PI\ : code page switch.
    if rest.len() >= 4 && rest[1] == b'P' && rest[3] == b'\\' && rest[2].is_ascii_uppercase() {
        return Ok(i + 4);
    }
    if rest.starts_with(b"\\X2\\") {
        let (units, consumed) = hex_run(&rest[4..], 4)?;
        let decoded: std::result::Result<String, _> =
            char::decode_utf16(units.into_iter().map(|u| u as u16)).collect();
        out.push_str(
            &decoded.map_err(|_| IfcError::InvalidString("unpaired UTF-16 surrogate".into()))?,
        );
        return Ok(i + 4 + consumed);
    }
    if rest.starts_with(b"\\X4\\") {
        let (units, consumed) = hex_run(&rest[4..], 8)?;
        for u in units {
            let c = char::from_u32(u).ok_or_else(|| {
                IfcError::InvalidString(format!("invalid code point U+{u:X}"))
            })?;
            out.push(c);
        }
        return Ok(i + 4 + consumed);
    }
    if rest.starts_with(b"\\X\\") {
        let hex = rest
            .get(3..5)
            .ok_or_else(|| IfcError::InvalidString("truncated \\X\\ escape".into()))?;
        let byte = parse_hex(hex)?;
        out.push(char::from(byte as u8));
        return Ok(i + 5);
    }
    if rest.starts_with(b"\\N\\") {
        return Ok(i + 3);
    }

    // Unknown directive: keep the backslash literally.
    out.push('\\');
    Ok(i + 1)
}

/// Read fixed-width hex groups up to the `\X0\` terminator. Returns the values
/// and the number of bytes consumed including the terminator.
fn hex_run(raw: &[u8], width: usize) -> Result<(Vec<u32>, usize)> {
    let end = raw
        .windows(4)
        .position(|w| w == b"\\X0\\")
        .ok_or_else(|| IfcError::InvalidString("missing \\X0\\ terminator".into()))?;
    let body = &raw[..end];
    if body.len() % width != 0 {
        return Err(IfcError::InvalidString(format!(
            "hex run of {} digits is not a multiple of {width}",
            body.len()
        )));
    }
    let units = body
        .chunks(width)
        .map(parse_hex)
        .collect::<Result<Vec<_>>>()?;
    Ok((units, end + 4))
}

fn parse_hex(digits: &[u8]) -> Result<u32> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| u32::from_str_radix(s, 16).ok())
        .ok_or_else(|| {
            IfcError::InvalidString(format!(
                "bad hex digits '{}'",
                String::from_utf8_lossy(digits)
            ))
        })
}

/// Encode `value` as a complete STEP string literal, quotes included.
///
/// Printable ASCII is written verbatim (`'` and `\` doubled). Everything else
/// goes into `\X2\` runs, or `\X4\` runs for characters outside the BMP.
pub fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');

    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            ' '..='~' => out.push(c),
            _ => {
                let wide = u32::from(c) > 0xFFFF;
                out.push_str(if wide { "\\X4\\" } else { "\\X2\\" });
                push_hex(&mut out, c, wide);
                while let Some(&next) = chars.peek() {
                    if is_plain(next) || (u32::from(next) > 0xFFFF) != wide {
                        break;
                    }
                    push_hex(&mut out, next, wide);
                    chars.next();
                }
                out.push_str("\\X0\\");
            }
        }
    }

    out.push('\'');
    out
}

fn is_plain(c: char) -> bool {
    matches!(c, ' '..='~')
}

fn push_hex(out: &mut String, c: char, wide: bool) {
    use std::fmt::Write as _;
    if wide {
        let _ = write!(out, "{:08X}", u32::from(c));
    } else {
        let _ = write!(out, "{:04X}", u32::from(c));
    }
}
