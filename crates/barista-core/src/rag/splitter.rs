use std::collections::VecDeque;

/// Recursive character splitter for breaking documents into overlapping chunks.
///
/// Text is split on the coarsest separator first (paragraphs, then lines, then
/// words) and pieces are packed into chunks of at most `chunk_size`
/// characters. Consecutive chunks share trailing pieces totalling at most
/// `chunk_overlap` characters. A piece longer than a chunk falls through to the
/// next finer separator, ending with a hard cut on character boundaries.
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                "".to_string(),
            ],
        }
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }

        self.recursive_split(text, &self.separators)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    fn recursive_split(&self, text: &str, separators: &[String]) -> Vec<String> {
        let Some((separator, finer)) = separators.split_first() else {
            return self.split_by_length(text);
        };
        if separator.is_empty() {
            return self.split_by_length(text);
        }

        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        // pieces of the chunk being built, and its length including separators
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut window_len = 0;

        for piece in text.split(separator.as_str()) {
            let piece_len = char_len(piece);

            if piece_len > self.chunk_size {
                if !window.is_empty() {
                    chunks.push(join(&window, separator));
                    window.clear();
                    window_len = 0;
                }
                chunks.extend(self.recursive_split(piece, finer));
                continue;
            }

            if !window.is_empty() && window_len + sep_len + piece_len > self.chunk_size {
                chunks.push(join(&window, separator));
                // keep the trailing pieces that fit in the overlap
                while let Some(front) = window.front() {
                    let fits_overlap = window_len <= self.chunk_overlap;
                    let fits_next = window_len + sep_len + piece_len <= self.chunk_size;
                    if fits_overlap && fits_next {
                        break;
                    }
                    let front_len = char_len(front);
                    window.pop_front();
                    window_len = if window.is_empty() {
                        0
                    } else {
                        window_len - front_len - sep_len
                    };
                }
            }

            window_len = if window.is_empty() {
                piece_len
            } else {
                window_len + sep_len + piece_len
            };
            window.push_back(piece);
        }

        if !window.is_empty() {
            chunks.push(join(&window, separator));
        }
        chunks
    }

    fn split_by_length(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join(pieces: &VecDeque<&str>, separator: &str) -> String {
    pieces.iter().copied().collect::<Vec<&str>>().join(separator)
}
