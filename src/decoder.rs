//! The thin byte-to-`str` seam the core parser sits behind.
//!
//! The byte-to-character transcoding layer itself is out of scope for this
//! crate; what lives here is only enough to let the tokenizer treat its
//! input as UTF-8 text uniformly, whether that text started out as UTF-8 or
//! was transcoded from a declared encoding. This mirrors the teacher's own
//! `Decoder`/`EncodingRef` pair almost unchanged.
//!
//! Line-end normalization (CR, CRLF → LF) is a separate, stateful concern —
//! it has to remember a trailing bare `\r` across a chunk boundary — so it
//! lives on [`crate::tokenizer::Tokenizer`] itself alongside its other
//! resume-buffer state, rather than here; this module only ever sees bytes
//! already carved into complete tokens.

use std::borrow::Cow;
use std::str::from_utf8;

#[cfg(feature = "encoding")]
use encoding_rs::{Encoding, UTF_8};

use crate::errors::{Error, Result};

/// A reference to an encoding together with how confidently it was chosen,
/// so later, stronger evidence (a BOM, then an `encoding="..."` XML
/// declaration) can override a weaker guess but never the reverse.
///
/// ```text
/// Implicit    -- from_str       --> Explicit
/// Implicit    -- BOM            --> BomDetected
/// Implicit    -- "encoding=..." --> XmlDetected
/// BomDetected -- "encoding=..." --> XmlDetected
/// ```
#[cfg(feature = "encoding")]
#[derive(Clone, Copy)]
pub enum EncodingRef {
    /// Assumed, and may still be refined by a BOM or declaration.
    Implicit(&'static Encoding),
    /// Fixed by the caller (e.g. input is known to already be `&str`); can
    /// never be refined.
    Explicit(&'static Encoding),
    /// Detected from a byte order mark; may still be refined by a
    /// declaration.
    BomDetected(&'static Encoding),
    /// Detected from `<?xml encoding="..."?>`; final.
    XmlDetected(&'static Encoding),
}

#[cfg(feature = "encoding")]
impl EncodingRef {
    /// The encoding currently in effect.
    pub fn encoding(&self) -> &'static Encoding {
        match self {
            Self::Implicit(e) => e,
            Self::Explicit(e) => e,
            Self::BomDetected(e) => e,
            Self::XmlDetected(e) => e,
        }
    }

    /// Whether later evidence is still allowed to change this encoding.
    pub fn can_be_refined(&self) -> bool {
        match self {
            Self::Implicit(_) | Self::BomDetected(_) => true,
            Self::Explicit(_) | Self::XmlDetected(_) => false,
        }
    }
}

/// Decodes raw document bytes to `str`, using whichever encoding was
/// settled on for this document.
#[derive(Clone, Copy)]
pub struct Decoder {
    #[cfg(feature = "encoding")]
    pub(crate) encoding: &'static Encoding,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder {
            #[cfg(feature = "encoding")]
            encoding: UTF_8,
        }
    }
}

#[cfg(not(feature = "encoding"))]
impl Decoder {
    /// Decodes a UTF-8 slice, ignoring a leading BOM if present.
    ///
    /// Returns an error if `bytes` is not valid UTF-8. Enable the
    /// `encoding` feature to honor a declared non-UTF-8 encoding instead.
    pub fn decode<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        Ok(Cow::Borrowed(from_utf8(bytes).map_err(|e| Error::NonDecodable(Some(e)))?))
    }

    /// As [`Self::decode`], first stripping a UTF-8 BOM if present.
    pub fn decode_with_bom_removal<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        self.decode(Self::strip_bom(bytes))
    }

    fn strip_bom(bytes: &[u8]) -> &[u8] {
        if bytes.starts_with(b"\xEF\xBB\xBF") {
            &bytes[3..]
        } else {
            bytes
        }
    }
}

#[cfg(feature = "encoding")]
impl Decoder {
    /// The encoding this decoder currently uses.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Decodes `bytes` using the declared or assumed encoding, without
    /// stripping a BOM.
    pub fn decode<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        match self
            .encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
        {
            None => Err(Error::NonDecodable(None)),
            Some(s) => Ok(s),
        }
    }

    /// As [`Self::decode`], first stripping a matching BOM if present.
    pub fn decode_with_bom_removal<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        let bytes = self.remove_bom(bytes);
        self.decode(bytes)
    }

    fn remove_bom<'b>(&self, bytes: &'b [u8]) -> &'b [u8] {
        if bytes.starts_with(b"\xEF\xBB\xBF") && self.encoding == UTF_8 {
            &bytes[3..]
        } else {
            bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_utf8() {
        let d = Decoder::default();
        assert_eq!(d.decode(b"hello").unwrap(), "hello");
    }

    #[test]
    fn strips_utf8_bom() {
        let d = Decoder::default();
        assert_eq!(
            d.decode_with_bom_removal(b"\xEF\xBB\xBFhello").unwrap(),
            "hello"
        );
    }
}
