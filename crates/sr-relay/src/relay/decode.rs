//! Shell output to terminal text
//!
//! Bare `\n` line breaks become `\n\r` for the display; breaks that already
//! carry a `\r` on either side are left alone, so the transform is idempotent.
//! Both the line-break state and partial UTF-8 sequences are carried across
//! chunk boundaries.

/// Rewrites bare line feeds, one chunk at a time
#[derive(Debug, Default)]
pub struct LineBreaks {
    /// Last byte seen was `\r`
    prev_cr: bool,
    /// A `\r` was inserted after a chunk-final `\n`; drop a real one that follows
    skip_cr: bool,
}

impl LineBreaks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + chunk.len() / 8);

        for (i, &byte) in chunk.iter().enumerate() {
            if std::mem::take(&mut self.skip_cr) && byte == b'\r' {
                self.prev_cr = true;
                continue;
            }

            out.push(byte);
            if byte == b'\n' {
                let followed_by_cr = chunk.get(i + 1) == Some(&b'\r');
                if !self.prev_cr && !followed_by_cr {
                    out.push(b'\r');
                    self.skip_cr = i + 1 == chunk.len();
                }
                self.prev_cr = false;
            } else {
                self.prev_cr = byte == b'\r';
            }
        }

        out
    }
}

/// Normalize a complete buffer in one go
pub fn normalize_line_breaks(input: &[u8]) -> Vec<u8> {
    LineBreaks::new().push(input)
}

/// Incremental UTF-8 decoding that never splits a code point
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much as possible, holding back an incomplete trailing sequence.
    /// Invalid bytes become U+FFFD.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        let mut pending = std::mem::take(&mut self.carry);
        pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(pending.len());
        let mut rest: &[u8] = &pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            rest = tail;
                            break;
                        }
                    }
                }
            }
        }

        self.carry = rest.to_vec();
        out
    }

    /// Flush whatever is still held back
    pub fn finish(&mut self) -> String {
        let carry = std::mem::take(&mut self.carry);
        String::from_utf8_lossy(&carry).into_owned()
    }
}

/// Line-break normalization followed by UTF-8 decoding
#[derive(Debug, Default)]
pub struct TerminalDecoder {
    line_breaks: LineBreaks,
    utf8: Utf8Decoder,
}

impl TerminalDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> String {
        let normalized = self.line_breaks.push(chunk);
        self.utf8.push(&normalized)
    }

    pub fn finish(&mut self) -> String {
        self.utf8.finish()
    }
}
