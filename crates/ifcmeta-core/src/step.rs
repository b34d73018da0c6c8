//! Span-based scanner for ISO 10303-21 exchange files.
//!
//! The scanner never builds a value tree. It records where each instance
//! record and its argument list live in the source buffer, which is all that
//! is needed to read single attributes and splice replacements back in.

use crate::error::{IfcError, Result};
use std::ops::Range;

pub const MAGIC: &str = "ISO-10303-21";
pub const END_MAGIC: &str = "END-ISO-10303-21";

/// One `#id = KEYWORD(args);` record from a DATA section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: u64,
    /// Keyword span; empty for complex (multi-leaf) instances.
    pub keyword: Range<usize>,
    /// Span strictly inside the outer parentheses.
    pub args: Range<usize>,
}

impl Record {
    pub fn is_complex(&self) -> bool {
        self.keyword.is_empty()
    }
}

/// Result of scanning a whole file.
#[derive(Debug, Default)]
pub struct Scan {
    pub header: Vec<HeaderEntry>,
    pub records: Vec<Record>,
}

/// A header section entity such as `FILE_SCHEMA(('IFC4'));`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub keyword: Range<usize>,
    pub args: Range<usize>,
}

/// Scan a complete exchange file.
pub fn scan(buf: &[u8]) -> Result<Scan> {
    sniff_container(buf)?;

    let mut cur = Cursor::new(buf);
    cur.skip_trivia()?;
    let magic = cur.keyword()?;
    if &buf[magic] != MAGIC.as_bytes() {
        return Err(IfcError::NotStepFile(format!("file does not start with {MAGIC};")));
    }
    cur.expect(b';')?;

    let mut scan = Scan::default();
    loop {
        cur.skip_trivia()?;
        if cur.at_end() {
            return Err(cur.error(format!("missing {END_MAGIC};")));
        }
        let kw = cur.keyword()?;
        match &buf[kw] {
            b"HEADER" => {
                cur.expect(b';')?;
                scan_header(&mut cur, &mut scan.header)?;
            }
            b"DATA" => {
                cur.skip_trivia()?;
                if cur.peek() == Some(b'(') {
                    cur.group()?;
                }
                cur.expect(b';')?;
                scan_data(&mut cur, &mut scan.records)?;
            }
            b"END-ISO-10303-21" => {
                cur.expect(b';')?;
                break;
            }
            // ANCHOR, REFERENCE, SIGNATURE and friends carry nothing we need.
            _ => skip_section(&mut cur)?,
        }
    }

    tracing::debug!(records = scan.records.len(), "scanned exchange file");
    Ok(scan)
}

/// Reject the other IFC containers up front with a clearer message than a
/// syntax error would give.
fn sniff_container(buf: &[u8]) -> Result<()> {
    if buf.starts_with(b"PK\x03\x04") {
        return Err(IfcError::UnsupportedFormat("ifcZIP"));
    }
    let first = buf
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|i| buf[i]);
    match first {
        None => Err(IfcError::NotStepFile("file is empty".into())),
        Some(b'<') => Err(IfcError::UnsupportedFormat("ifcXML")),
        Some(_) => Ok(()),
    }
}

fn scan_header(cur: &mut Cursor<'_>, out: &mut Vec<HeaderEntry>) -> Result<()> {
    loop {
        cur.skip_trivia()?;
        let keyword = cur.keyword()?;
        if &cur.buf[keyword.clone()] == b"ENDSEC" {
            return cur.expect(b';');
        }
        cur.skip_trivia()?;
        let args = cur.group()?;
        cur.expect(b';')?;
        out.push(HeaderEntry { keyword, args });
    }
}

fn scan_data(cur: &mut Cursor<'_>, out: &mut Vec<Record>) -> Result<()> {
    loop {
        cur.skip_trivia()?;
        if cur.peek() != Some(b'#') {
            let kw = cur.keyword()?;
            if &cur.buf[kw] != b"ENDSEC" {
                return Err(cur.error("expected instance or ENDSEC".into()));
            }
            return cur.expect(b';');
        }

        let id = cur.instance_name()?;
        cur.expect(b'=')?;
        cur.skip_trivia()?;
        let (keyword, args) = if cur.peek() == Some(b'(') {
            let start = cur.pos;
            cur.group()?;
            (start..start, start + 1..cur.pos - 1)
        } else {
            let kw = cur.keyword()?;
            cur.skip_trivia()?;
            (kw, cur.group()?)
        };
        cur.expect(b';')?;
        out.push(Record { id, keyword, args });
    }
}

fn skip_section(cur: &mut Cursor<'_>) -> Result<()> {
    loop {
        cur.skip_trivia()?;
        match cur.peek() {
            None => return Err(cur.error("unterminated section".into())),
            Some(b'\'') => cur.string()?,
            Some(b'"') => cur.binary()?,
            Some(b) if is_keyword_start(b) => {
                let kw = cur.keyword()?;
                if &cur.buf[kw] == b"ENDSEC" {
                    return cur.expect(b';');
                }
            }
            Some(_) => cur.pos += 1,
        }
    }
}

/// Split an argument span into top-level parameter spans, whitespace trimmed.
pub fn split_params(buf: &[u8], args: Range<usize>) -> Result<Vec<Range<usize>>> {
    let mut cur = Cursor::new(buf);
    cur.pos = args.start;
    let mut params = Vec::new();
    let mut start = args.start;
    let mut depth = 0usize;

    while cur.pos < args.end {
        match buf[cur.pos] {
            b'\'' => cur.string()?,
            b'"' => cur.binary()?,
            b'/' if buf.get(cur.pos + 1) == Some(&b'*') => cur.skip_trivia()?,
            b'(' => {
                depth += 1;
                cur.pos += 1;
            }
            b')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| cur.error("unbalanced ')'".into()))?;
                cur.pos += 1;
            }
            b',' if depth == 0 => {
                params.push(trim(buf, start..cur.pos));
                cur.pos += 1;
                start = cur.pos;
            }
            _ => cur.pos += 1,
        }
    }

    let last = trim(buf, start..args.end);
    if !last.is_empty() || !params.is_empty() {
        params.push(last);
    }
    Ok(params)
}

fn trim(buf: &[u8], mut r: Range<usize>) -> Range<usize> {
    while r.start < r.end && buf[r.start].is_ascii_whitespace() {
        r.start += 1;
    }
    while r.end > r.start && buf[r.end - 1].is_ascii_whitespace() {
        r.end -= 1;
    }
    r
}

fn is_keyword_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'!'
}

fn is_keyword_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'!'
}

/// 1-based line number of a byte offset.
pub fn line_of(buf: &[u8], offset: usize) -> usize {
    buf[..offset.min(buf.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn error(&self, message: String) -> IfcError {
        IfcError::Syntax {
            line: line_of(self.buf, self.pos),
            message,
        }
    }

    /// Skip whitespace and `/* ... */` comments.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                self.pos += 1;
            }
            if self.buf[self.pos..].starts_with(b"/*") {
                let close = self.buf[self.pos + 2..]
                    .windows(2)
                    .position(|w| w == b"*/")
                    .ok_or_else(|| self.error("unterminated comment".into()))?;
                self.pos += 2 + close + 2;
                continue;
            }
            return Ok(());
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        self.skip_trivia()?;
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            let found = self
                .peek()
                .map_or_else(|| "end of file".to_string(), |b| format!("'{}'", char::from(b)));
            Err(self.error(format!("expected '{}', found {found}", char::from(byte))))
        }
    }

    fn keyword(&mut self) -> Result<Range<usize>> {
        let start = self.pos;
        if !self.peek().is_some_and(is_keyword_start) {
            return Err(self.error("expected keyword".into()));
        }
        while self.peek().is_some_and(is_keyword_char) {
            self.pos += 1;
        }
        Ok(start..self.pos)
    }

    /// `#123` → 123.
    fn instance_name(&mut self) -> Result<u64> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.buf[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("malformed instance name".into()))
    }

    /// Skip a `'...'` literal with `''` escapes.
    fn string(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => {
                    self.pos = start;
                    return Err(self.error("unterminated string".into()));
                }
                Some(b'\'') if self.buf.get(self.pos + 1) == Some(&b'\'') => self.pos += 2,
                Some(b'\'') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Skip a `"..."` binary literal.
    fn binary(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        match self.buf[self.pos..].iter().position(|&b| b == b'"') {
            Some(n) => {
                self.pos += n + 1;
                Ok(())
            }
            None => {
                self.pos = start;
                Err(self.error("unterminated binary literal".into()))
            }
        }
    }

    /// Consume a balanced `( ... )` group; returns the span inside it.
    fn group(&mut self) -> Result<Range<usize>> {
        let open = self.pos;
        if self.peek() != Some(b'(') {
            return Err(self.error("expected '('".into()));
        }
        self.pos += 1;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => {
                    self.pos = open;
                    return Err(self.error("unbalanced '('".into()));
                }
                Some(b'\'') => self.string()?,
                Some(b'"') => self.binary()?,
                Some(b'/') if self.buf.get(self.pos + 1) == Some(&b'*') => self.skip_trivia()?,
                Some(b'(') => {
                    depth += 1;
                    self.pos += 1;
                }
                Some(b')') => {
                    depth -= 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        Ok(open + 1..self.pos - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('small.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Proyecto; (A)',$,$,$,$,(#2),$);
/* a comment; with ( parens */
#2 = IFCSITE('2',$,'It''s',$,$,$,$,$,.ELEMENT.,$,$,$,$,$);
#3=(IFCA()IFCB(1));
ENDSEC;
END-ISO-10303-21;
";

    fn kw<'a>(buf: &'a [u8], r: &Record) -> &'a str {
        std::str::from_utf8(&buf[r.keyword.clone()]).unwrap()
    }

    #[test]
    fn scan_finds_records_and_header() {
        let buf = SMALL.as_bytes();
        let scan = scan(buf).unwrap();
        assert_eq!(scan.header.len(), 3);
        assert_eq!(scan.records.len(), 3);
        assert_eq!(scan.records[0].id, 1);
        assert_eq!(kw(buf, &scan.records[0]), "IFCPROJECT");
        assert_eq!(kw(buf, &scan.records[1]), "IFCSITE");
        assert!(scan.records[2].is_complex());
    }

    #[test]
    fn split_params_respects_strings_and_nesting() {
        let buf = SMALL.as_bytes();
        let scan = scan(buf).unwrap();
        let params = split_params(buf, scan.records[0].args.clone()).unwrap();
        assert_eq!(params.len(), 9);
        assert_eq!(&buf[params[2].clone()], b"'Proyecto; (A)'");
        assert_eq!(&buf[params[7].clone()], b"(#2)");
    }

    #[test]
    fn split_params_handles_empty_args() {
        let buf = b"()";
        assert!(split_params(buf, 1..1).unwrap().is_empty());
    }

    #[test]
    fn split_params_keeps_trailing_empty_param() {
        let buf = b"1,";
        assert_eq!(split_params(buf, 0..2).unwrap().len(), 2);
    }

    #[test]
    fn scan_rejects_non_step_input() {
        let err = scan(b"hello world").unwrap_err();
        assert!(matches!(err, IfcError::NotStepFile(_)));
    }

    #[test]
    fn scan_rejects_empty_input() {
        assert!(matches!(scan(b"  \n").unwrap_err(), IfcError::NotStepFile(_)));
    }

    #[test]
    fn scan_identifies_other_containers() {
        assert!(matches!(
            scan(b"PK\x03\x04rest").unwrap_err(),
            IfcError::UnsupportedFormat("ifcZIP")
        ));
        assert!(matches!(
            scan(b"<?xml version=\"1.0\"?>").unwrap_err(),
            IfcError::UnsupportedFormat("ifcXML")
        ));
    }

    #[test]
    fn scan_reports_line_of_unterminated_string() {
        let text = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n#1=IFCPROJECT('oops,$);\n";
        match scan(text.as_bytes()).unwrap_err() {
            IfcError::Syntax { line, message } => {
                assert_eq!(line, 5);
                assert!(message.contains("unterminated string"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn scan_requires_end_marker() {
        let text = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\nENDSEC;\n";
        assert!(matches!(scan(text.as_bytes()).unwrap_err(), IfcError::Syntax { .. }));
    }

    #[test]
    fn scan_skips_unknown_sections() {
        let text = "ISO-10303-21;\nHEADER;\nENDSEC;\nANCHOR;\n<a>=#1;\nENDSEC;\nDATA;\n#1=IFCWALL('x');\nENDSEC;\nEND-ISO-10303-21;\n";
        let scan = scan(text.as_bytes()).unwrap();
        assert_eq!(scan.records.len(), 1);
    }

    #[test]
    fn scan_accepts_multiple_data_sections() {
        let text = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n#1=IFCA(1);\nENDSEC;\nDATA('s2',('IFC4'));\n#2=IFCB(2);\nENDSEC;\nEND-ISO-10303-21;\n";
        let scan = scan(text.as_bytes()).unwrap();
        assert_eq!(scan.records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn line_of_counts_newlines() {
        assert_eq!(line_of(b"a\nb\nc", 0), 1);
        assert_eq!(line_of(b"a\nb\nc", 4), 3);
    }
}
