//! Word-addressed result buffer.
//!
//! Execution results travel back to the client as a word-addressed data
//! buffer (the INFO block, command output text, register contents). Words
//! are stored host-order in memory and rendered network byte order by
//! [`DataBuffer::as_bytes`] when the response is flattened for transport.

/// Word-addressed output container filled by `execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataBuffer {
    words: Vec<u32>,
}

impl DataBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to `len` words, zero-filling new words.
    pub fn set_word_length(&mut self, len: usize) {
        self.words.resize(len, 0);
    }

    pub fn word_length(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Read word `index`; out-of-range reads return 0, matching the
    /// zero-fill write semantics.
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    /// Write word `index`, growing the buffer if needed.
    pub fn set_word(&mut self, index: usize, value: u32) {
        if index >= self.words.len() {
            self.words.resize(index + 1, 0);
        }
        self.words[index] = value;
    }

    /// Append text as word-packed ASCII, zero-padding the final word.
    pub fn insert_ascii(&mut self, text: &str) {
        for chunk in text.as_bytes().chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.words.push(u32::from_be_bytes(word));
        }
    }

    /// Recover the ASCII content written by [`insert_ascii`], stopping at
    /// the first NUL pad byte.
    pub fn ascii(&self) -> String {
        let bytes: Vec<u8> = self
            .words
            .iter()
            .flat_map(|w| w.to_be_bytes())
            .take_while(|&b| b != 0)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Render the buffer as network-byte-order bytes.
    pub fn as_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }
}
