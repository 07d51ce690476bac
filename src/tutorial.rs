//! Tutorial accumulator: folds decoded chunks into one growing document.
//!
//! Overview and section chunks land in the same append-only buffer in the
//! order they arrive. Once the stream ends the buffer is frozen and further
//! chunks are ignored.

use crate::api::TutorialChunk;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TutorialBuffer {
    text: String,
    fragments: usize,
    frozen: bool,
}

impl TutorialBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tutorial so far, as one string.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of chunks folded in.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Append a chunk's text. Returns false if the buffer is frozen.
    pub fn apply(&mut self, chunk: &TutorialChunk) -> bool {
        if self.frozen {
            return false;
        }
        self.text.push_str(chunk.text());
        self.fragments += 1;
        true
    }

    /// Stop accepting chunks.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}

/// Pure form of [`TutorialBuffer::apply`].
pub fn fold(mut buffer: TutorialBuffer, chunk: &TutorialChunk) -> TutorialBuffer {
    buffer.apply(chunk);
    buffer
}

/// Fold a whole chunk sequence into a fresh buffer.
pub fn accumulate<'a, I>(chunks: I) -> TutorialBuffer
where
    I: IntoIterator<Item = &'a TutorialChunk>,
{
    chunks.into_iter().fold(TutorialBuffer::new(), fold)
}
