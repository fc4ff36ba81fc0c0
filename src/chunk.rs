//! Splitting of oversized research answers into bounded chunks.
//!
//! Token counts are estimated from character counts (4 characters per
//! token by default). Concatenating the chunks of a text in order always
//! reproduces the text exactly; boundary preference only moves cut points
//! earlier within a short look-back window.

pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;
pub const DEFAULT_MAX_CHUNK_TOKENS: usize = 15_000;

/// Separators to cut after, most preferred first.
const BOUNDARIES: [&str; 3] = ["\n\n", "\n", ". "];

/// Size limits for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    /// Threshold above which a text is chunked, and the budget per chunk.
    pub max_chunk_tokens: usize,
    pub chars_per_token: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            max_chunk_tokens: DEFAULT_MAX_CHUNK_TOKENS,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl ChunkPolicy {
    pub fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token.max(1))
    }

    pub fn needs_chunking(&self, text: &str) -> bool {
        self.estimate_tokens(text) > self.max_chunk_tokens
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_tokens
            .saturating_mul(self.chars_per_token)
            .max(1)
    }

    /// Chunks for `text`, or `None` if it fits in a single message.
    pub fn split(&self, text: &str) -> Option<Vec<String>> {
        if self.needs_chunking(text) {
            Some(split_text(text, self.max_chunk_chars()))
        } else {
            None
        }
    }
}

/// Split `text` into contiguous slices of at most `max_chars` characters.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let lookback = max_chars / 50;
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some((hard_end, _)) = rest.char_indices().nth(max_chars) else {
            chunks.push(rest.to_string());
            break;
        };

        let window_start = if lookback == 0 {
            hard_end
        } else {
            rest.char_indices()
                .nth(max_chars - lookback)
                .map(|(i, _)| i)
                .unwrap_or(hard_end)
        };

        let cut = preferred_cut(&rest[window_start..hard_end])
            .map(|offset| window_start + offset)
            .unwrap_or(hard_end);

        let (head, tail) = rest.split_at(cut);
        chunks.push(head.to_string());
        rest = tail;
    }

    chunks
}

/// Byte offset just past the best boundary in `window`.
fn preferred_cut(window: &str) -> Option<usize> {
    BOUNDARIES
        .iter()
        .find_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
}
