//! Low level byte scanners for each markup construct.
//!
//! These mirror the teacher's `BangType`/`ReadElementState` scanners almost
//! exactly, generalized to report "not enough bytes yet" (`None`) rather
//! than treating scan failure as end-of-input, since the tokenizer that
//! drives them is fed in arbitrary-sized chunks rather than a `BufRead`.

use memchr::{memchr2_iter, memchr_iter, memchr3_iter};

/// What a markup construct turned out to be, decided from its first few
/// bytes after `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BangType {
    /// `<![CDATA[...]]>`
    CData,
    /// `<!--...-->`
    Comment,
    /// `<!DOCTYPE ...>`
    DocType,
}

impl BangType {
    /// Byte length of the introducer this bang type was recognized from
    /// (`<!--`, `<![CDATA[`, `<!DOCTYPE`).
    pub fn prefix_len(&self) -> usize {
        match self {
            BangType::Comment => 4,
            BangType::CData => 9,
            BangType::DocType => 9,
        }
    }

    /// Attempts to recognize which bang construct `buffer` (which starts
    /// with `<!`) is, returning `None` if more bytes are needed before the
    /// introducer can be disambiguated and `Some(Err(..))` if it can never
    /// match any recognized introducer.
    pub fn recognize(buffer: &[u8]) -> Option<Result<BangType, u8>> {
        debug_assert!(buffer.starts_with(b"<!"));
        const COMMENT: &[u8] = b"<!--";
        const CDATA: &[u8] = b"<![CDATA[";
        const DOCTYPE: &[u8] = b"<!DOCTYPE";

        if buffer.len() >= COMMENT.len() && buffer.starts_with(COMMENT) {
            return Some(Ok(BangType::Comment));
        }
        if buffer.len() >= CDATA.len() && buffer.starts_with(CDATA) {
            return Some(Ok(BangType::CData));
        }
        if buffer.len() >= DOCTYPE.len() && eq_ignore_ascii_case(&buffer[..9], DOCTYPE) {
            return Some(Ok(BangType::DocType));
        }
        // Still ambiguous: any of the three could still match with more bytes.
        let max_prefix = DOCTYPE.len().max(CDATA.len());
        if buffer.len() < max_prefix
            && COMMENT.starts_with(buffer)
                | CDATA.starts_with(&buffer[..buffer.len().min(CDATA.len())])
        {
            return None;
        }
        if buffer.len() >= 3 {
            return Some(Err(buffer[2]));
        }
        None
    }

    /// If the construct is complete within `chunk` (the bytes immediately
    /// after the introducer), returns its content (excluding the closing
    /// delimiter) and the number of bytes of `chunk` consumed, including
    /// the trailing `>`.
    pub fn parse<'b>(&self, chunk: &'b [u8]) -> Option<(&'b [u8], usize)> {
        for i in memchr_iter(b'>', chunk) {
            match self {
                BangType::Comment => {
                    if chunk[..i].ends_with(b"--") {
                        return Some((&chunk[..i], i + 1));
                    }
                }
                BangType::CData => {
                    if chunk[..i].ends_with(b"]]") {
                        return Some((&chunk[..i - 2], i + 1));
                    }
                }
                BangType::DocType => {
                    let content = &chunk[..i];
                    let balance = memchr2_iter(b'<', b'>', content)
                        .map(|p| if content[p] == b'<' { 1i32 } else { -1 })
                        .sum::<i32>();
                    if balance == 0 {
                        return Some((content, i + 1));
                    }
                }
            }
        }
        None
    }
}

fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// State for scanning a start or end tag's raw content, tracking whether a
/// `>` seen so far is inside a quoted attribute value.
#[derive(Clone, Copy, Debug)]
pub enum TagScanState {
    /// Outside of any attribute value.
    Elem,
    /// Inside a `'...'` attribute value.
    SingleQuoted,
    /// Inside a `"..."` attribute value.
    DoubleQuoted,
}

impl Default for TagScanState {
    fn default() -> Self {
        TagScanState::Elem
    }
}

impl TagScanState {
    /// Scans `chunk`, returning the tag's content and bytes consumed
    /// (including the closing `>`) once an unquoted `>` is found.
    pub fn scan<'b>(&mut self, chunk: &'b [u8]) -> Option<(&'b [u8], usize)> {
        for i in memchr3_iter(b'>', b'\'', b'"', chunk) {
            *self = match (*self, chunk[i]) {
                (TagScanState::Elem, b'>') => return Some((&chunk[..i], i + 1)),
                (TagScanState::Elem, b'\'') => TagScanState::SingleQuoted,
                (TagScanState::Elem, b'"') => TagScanState::DoubleQuoted,
                (TagScanState::SingleQuoted, b'\'') | (TagScanState::DoubleQuoted, b'"') => {
                    TagScanState::Elem
                }
                _ => *self,
            };
        }
        None
    }
}

/// Finds the end of a processing instruction's content (`?>`), given the
/// bytes after `<?`.
pub fn scan_pi(chunk: &[u8]) -> Option<(&[u8], usize)> {
    for i in memchr_iter(b'>', chunk) {
        if i > 0 && chunk[i - 1] == b'?' {
            return Some((&chunk[..i - 1], i + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_complete_introducers() {
        assert_eq!(BangType::recognize(b"<!--"), Some(Ok(BangType::Comment)));
        assert_eq!(BangType::recognize(b"<![CDATA["), Some(Ok(BangType::CData)));
        assert_eq!(BangType::recognize(b"<!DOCTYPE"), Some(Ok(BangType::DocType)));
    }

    #[test]
    fn ambiguous_prefix_needs_more_bytes() {
        assert_eq!(BangType::recognize(b"<!-"), None);
        assert_eq!(BangType::recognize(b"<!["), None);
    }

    #[test]
    fn unknown_bang_rejected_once_unambiguous() {
        assert_eq!(BangType::recognize(b"<!X"), Some(Err(b'X')));
    }

    #[test]
    fn comment_parse_respects_double_dash_terminator() {
        let bt = BangType::Comment;
        let (content, consumed) = bt.parse(b" hi --> rest").unwrap();
        assert_eq!(content, b" hi ");
        assert_eq!(consumed, 7);
    }

    #[test]
    fn tag_scan_skips_quoted_gt() {
        let mut st = TagScanState::default();
        let (content, consumed) = st.scan(br#"a b="1>2">rest"#).unwrap();
        assert_eq!(content, br#"a b="1>2""#);
        assert_eq!(consumed, 10);
    }

    #[test]
    fn pi_scan_requires_question_before_gt() {
        let (content, consumed) = scan_pi(b"xml version=\"1.0\"?>rest").unwrap();
        assert_eq!(content, b"xml version=\"1.0\"");
        assert_eq!(consumed, 19);
    }
}
