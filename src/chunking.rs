use crate::document::Document;

/// Character budget for a single chunk
pub const CHUNK_SIZE: usize = 500;
/// Characters a chunk shares with the tail of its predecessor
pub const CHUNK_OVERLAP: usize = 50;

/// Boundary preference when splitting: paragraphs, then lines, then
/// sentences, then words. Text without any of these gets hard character cuts.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Represents a text chunk with metadata
#[derive(Debug, Clone)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// File name of the document this chunk belongs to
    pub source: String,
    /// Page number inherited from the document, when known
    pub page: Option<u32>,
}

/// Split a sequence of documents into chunks, inheriting each document's
/// metadata.
pub fn chunk_documents(documents: &[Document]) -> Vec<TextChunk> {
    documents
        .iter()
        .flat_map(|document| {
            split_text(&document.content, CHUNK_SIZE, CHUNK_OVERLAP)
                .into_iter()
                .map(|text| TextChunk {
                    text,
                    source: document.source.clone(),
                    page: document.page,
                })
        })
        .collect()
}

/// Split text into windows of at most `max_chars` characters where
/// consecutive windows share roughly `overlap` trailing characters.
pub fn split_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    split_with(text, max_chars, overlap, &SEPARATORS)
}

fn split_with(text: &str, max_chars: usize, overlap: usize, separators: &[&str]) -> Vec<String> {
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    // Pick the coarsest separator that actually occurs in this text
    let Some(position) = separators.iter().position(|s| text.contains(s)) else {
        return hard_cut(text, max_chars, overlap);
    };
    let separator = separators[position];
    let finer = &separators[position + 1..];

    let mut pieces = Vec::new();
    for part in text.split(separator) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if char_len(part) > max_chars {
            pieces.extend(split_with(part, max_chars, overlap, finer));
        } else {
            pieces.push(part.to_string());
        }
    }

    merge_pieces(pieces, separator, max_chars, overlap)
}

/// Greedily pack pieces into chunks of at most `max_chars`, seeding each new
/// chunk with the tail of the previous one.
fn merge_pieces(pieces: Vec<String>, separator: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for piece in pieces {
        let piece_len = char_len(&piece);

        if !buffer.is_empty() && char_len(&buffer) + separator_len + piece_len > max_chars {
            let flushed = std::mem::take(&mut buffer);

            // Shrink the carried overlap when the incoming piece leaves no
            // room for it within the chunk budget
            let budget = max_chars.saturating_sub(piece_len + separator_len);
            let keep = overlap.min(budget);
            buffer = tail_chars(&flushed, keep).trim_start().to_string();

            chunks.push(flushed);
        }

        if !buffer.is_empty() {
            buffer.push_str(separator);
        }
        buffer.push_str(&piece);
    }

    if !buffer.trim().is_empty() {
        chunks.push(buffer);
    }

    chunks
}

/// Fixed-size windows for text with no usable boundaries
fn hard_cut(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = max_chars.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + max_chars).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of a string
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let len = char_len(text);
    if n >= len {
        return text;
    }

    let start = text
        .char_indices()
        .nth(len - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}
