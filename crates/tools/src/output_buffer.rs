//! Boundary-safe char-capped output buffer, reused verbatim from the
//! process manager's approach to captured subprocess output: keep the most
//! recent `max_chars`, never split a multi-byte character when trimming.

pub struct OutputBuffer {
    combined: String,
    max_chars: usize,
}

impl OutputBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            combined: String::new(),
            max_chars,
        }
    }

    pub fn push(&mut self, text: &str) {
        self.combined.push_str(text);
        if self.combined.len() > self.max_chars {
            let keep = self.max_chars * 3 / 4;
            let drain_count = self.combined.len() - keep;
            let mut boundary = drain_count;
            while boundary < self.combined.len() && !self.combined.is_char_boundary(boundary) {
                boundary += 1;
            }
            self.combined.drain(..boundary);
        }
    }

    pub fn into_string(self) -> String {
        self.combined
    }

    pub fn as_str(&self) -> &str {
        &self.combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_to_max_chars_on_char_boundary() {
        let mut buf = OutputBuffer::new(8);
        buf.push("0123456789");
        assert!(buf.as_str().len() <= 8);
    }

    #[test]
    fn never_splits_multibyte_char() {
        let mut buf = OutputBuffer::new(4);
        buf.push("aé€b");
        assert!(buf.as_str().is_char_boundary(0));
        assert!(String::from_utf8(buf.as_str().as_bytes().to_vec()).is_ok());
    }
}
