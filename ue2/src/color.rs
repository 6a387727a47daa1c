//! Colorized text.
//!
//! Server names, map names, rule values and player names can carry inline
//! color changes: an escape byte followed by red, green and blue bytes. On
//! decode the escapes are lifted out of the text into [`ColorMarker`]s that
//! remember where in the plain text each color starts.

use crate::string::{check_length, latin1_to_string, wire_length};
use crate::{ensure_remaining, read_index, write_index, CodecError, CodecResult, Decode, Encode};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lead byte of an inline color change.
pub const COLOR_ESCAPE: u8 = 0x1b;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// `#rrggbb`
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

/// A color that takes effect at character `at` of the plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorMarker {
    pub at: usize,
    pub color: Rgb,
}

/// Plain text plus the color changes that were embedded in it.
///
/// Marker positions count characters of `text`, which is the same as bytes
/// of the single-byte wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorizedString {
    pub text: String,
    pub markers: Vec<ColorMarker>,
}

impl ColorizedString {
    pub fn new(text: impl Into<String>, markers: Vec<ColorMarker>) -> Self {
        Self {
            text: text.into(),
            markers,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.markers.is_empty()
    }

    /// Appends a color change at the current end of the text.
    pub fn push_color(&mut self, color: Rgb) -> &mut Self {
        self.markers.push(ColorMarker {
            at: self.text.chars().count(),
            color,
        });
        self
    }

    pub fn push_str(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    fn wire_body(&self) -> CodecResult<Vec<u8>> {
        let mut markers = self.markers.clone();
        markers.sort_by_key(|m| m.at);
        let mut pending = markers.iter().peekable();

        let mut body = Vec::with_capacity(self.text.len() + markers.len() * 4);
        let push_marker = |body: &mut Vec<u8>, marker: &ColorMarker| {
            body.extend_from_slice(&[
                COLOR_ESCAPE,
                marker.color.red,
                marker.color.green,
                marker.color.blue,
            ]);
        };

        for (position, ch) in self.text.chars().enumerate() {
            while let Some(marker) = pending.next_if(|m| m.at <= position) {
                push_marker(&mut body, marker);
            }

            let code = u32::from(ch);
            if code > 0xff {
                return Err(CodecError::Unencodable {
                    ch,
                    reason: "colorized text is Latin-1 only",
                });
            }
            if code == 0 || code == u32::from(COLOR_ESCAPE) {
                return Err(CodecError::Unencodable {
                    ch,
                    reason: "reserved byte in colorized text",
                });
            }
            body.push(code as u8);
        }

        // markers at or past the end of the text
        for marker in pending {
            push_marker(&mut body, marker);
        }

        Ok(body)
    }
}

impl fmt::Display for ColorizedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for ColorizedString {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

impl Encode for ColorizedString {
    fn encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        if self.is_empty() {
            return write_index(buf, 0);
        }

        let body = self.wire_body()?;
        write_index(buf, wire_length(body.len() + 1)?)?;
        buf.put_slice(&body);
        buf.put_u8(0);
        Ok(())
    }
}

impl Decode for ColorizedString {
    fn decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let length = read_index(buf)?;
        if length == 0 {
            return Ok(Self::default());
        }

        let units = check_length(length)?;

        if length < 0 {
            // wide strings cannot carry escapes
            ensure_remaining(buf, units * 2)?;
            let mut wide = Vec::with_capacity(units);
            for _ in 0..units {
                wide.push(buf.get_u16_le());
            }
            if wide.last() == Some(&0) {
                wide.pop();
            }
            return Ok(Self::plain(String::from_utf16_lossy(&wide)));
        }

        ensure_remaining(buf, units)?;
        let mut raw = vec![0u8; units];
        buf.copy_to_slice(&mut raw);

        // the final byte is the terminator
        let body = &raw[..raw.len() - 1];
        let mut plain = Vec::with_capacity(body.len());
        let mut markers = Vec::new();

        let mut i = 0;
        while i < body.len() {
            if body[i] == COLOR_ESCAPE {
                if i + 4 > body.len() {
                    return Err(CodecError::InvalidEscape { offset: i });
                }
                markers.push(ColorMarker {
                    at: plain.len(),
                    color: Rgb::new(body[i + 1], body[i + 2], body[i + 3]),
                });
                i += 4;
                continue;
            }

            plain.push(body[i]);
            i += 1;
        }

        Ok(Self {
            text: latin1_to_string(&plain),
            markers,
        })
    }
}

/// Removes inline color escapes (the escape character and the three that
/// follow it) from raw engine text.
pub fn strip_colors(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch == char::from(COLOR_ESCAPE) {
            chars.by_ref().take(3).for_each(drop);
            continue;
        }
        out.push(ch);
    }

    out
}
