use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;

/// Metadata carried by every document, node, and chunk derived from one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMeta {
  /// Top-level file name: the file itself, or the archive that contained it.
  pub source: String,
  pub fingerprint: String,
  /// Entry name within an archive; absent for loose files.
  pub filename: Option<String>,
}

/// Unstructured text read from one file or archive entry, tagged with its
/// source identity. Produced by the file parser, consumed by the splitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  pub text: String,
  pub meta: SourceMeta,
}

impl Document {
  pub fn new(text: String, source: impl Into<String>, fingerprint: &Fingerprint, filename: Option<String>) -> Self {
    Self {
      text,
      meta: SourceMeta {
        source: source.into(),
        fingerprint: fingerprint.as_str().to_string(),
        filename,
      },
    }
  }
}

/// A token-bounded slice of a [`Document`], before it is embedded into a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
  pub node_id: String,
  pub text: String,
  pub meta: SourceMeta,
}

/// Parameters for the token-based splitter.
#[derive(Debug, Clone)]
pub struct ChunkParams {
  /// Target node size in whitespace-delimited tokens.
  pub chunk_size: usize,
  /// Trailing tokens from a flushed node carried into the next one.
  pub overlap: usize,
}

impl Default for ChunkParams {
  fn default() -> Self {
    Self {
      chunk_size: 1024,
      overlap: 128,
    }
  }
}

fn split_sentences(text: &str) -> Vec<&str> {
  let mut sentences = Vec::new();
  let mut current_start = 0;
  let chars: Vec<char> = text.chars().collect();

  let mut i = 0;
  while i < chars.len() {
    if matches!(chars[i], '.' | '!' | '?') {
      let next_idx = i + 1;
      if next_idx >= chars.len() || chars[next_idx].is_whitespace() {
        let is_abbreviation = i > 0 && i < chars.len() - 1 && chars[i] == '.' && {
          let prev = chars[i - 1];
          let next_after_space = chars.get(i + 2);
          (prev.is_uppercase() && (i < 2 || !chars[i - 2].is_alphabetic()))
            || (next_after_space.is_some_and(|&c| c.is_lowercase()))
        };

        if !is_abbreviation {
          let byte_pos = text.char_indices().nth(next_idx).map(|(b, _)| b).unwrap_or(text.len());
          let start_byte = text.char_indices().nth(current_start).map(|(b, _)| b).unwrap_or(0);

          let sentence = &text[start_byte..byte_pos];
          if !sentence.trim().is_empty() {
            sentences.push(sentence.trim());
          }
          current_start = next_idx;
          while current_start < chars.len() && chars[current_start].is_whitespace() {
            current_start += 1;
          }
        }
      }
    }
    i += 1;
  }

  if current_start < chars.len() {
    let start_byte = text.char_indices().nth(current_start).map(|(b, _)| b).unwrap_or(0);
    let remainder = &text[start_byte..];
    if !remainder.trim().is_empty() {
      sentences.push(remainder.trim());
    }
  }

  sentences
}

fn split_paragraphs(text: &str) -> Vec<&str> {
  text
    .split("\n\n")
    .flat_map(|p| p.split("\r\n\r\n"))
    .map(|p| p.trim())
    .filter(|p| !p.is_empty())
    .collect()
}

fn token_count(s: &str) -> usize {
  s.split_whitespace().count()
}

/// Take the trailing `n` whitespace-delimited tokens of `s`, joined back with
/// single spaces, to seed the overlap of the next node.
fn trailing_tokens(s: &str, n: usize) -> String {
  if n == 0 {
    return String::new();
  }
  let words: Vec<&str> = s.split_whitespace().collect();
  let start = words.len().saturating_sub(n);
  words[start..].join(" ")
}

/// Last-resort split for a sentence with no internal punctuation to break on:
/// slide a `chunk_size`-token window forward by `chunk_size - overlap` tokens
/// at a time.
fn split_tokens(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
  let words: Vec<&str> = text.split_whitespace().collect();
  if words.is_empty() {
    return Vec::new();
  }

  let stride = chunk_size.saturating_sub(overlap).max(1);
  let mut pieces = Vec::new();
  let mut start = 0;
  while start < words.len() {
    let end = (start + chunk_size).min(words.len());
    pieces.push(words[start..end].join(" "));
    if end == words.len() {
      break;
    }
    start += stride;
  }
  pieces
}

/// Split text into overlapping, token-bounded nodes, preferring paragraph and
/// sentence boundaries over mid-sentence cuts.
///
/// Mirrors the paragraph-then-sentence accumulation strategy used elsewhere in
/// this codebase for character-bounded chunking, but measures node size in
/// whitespace-delimited tokens instead of characters, per [`ChunkParams`].
pub fn split_into_nodes(text: &str, params: &ChunkParams) -> Vec<String> {
  let mut nodes = Vec::new();

  if text.trim().is_empty() {
    return nodes;
  }

  if token_count(text) <= params.chunk_size {
    nodes.push(text.trim().to_string());
    return nodes;
  }

  let paragraphs = split_paragraphs(text);
  let mut current = String::new();

  let flush = |current: &mut String, nodes: &mut Vec<String>| {
    if !current.trim().is_empty() {
      nodes.push(current.trim().to_string());
      let tail = trailing_tokens(current, params.overlap);
      *current = tail;
    }
  };

  for paragraph in paragraphs {
    if token_count(paragraph) > params.chunk_size {
      flush(&mut current, &mut nodes);

      for sentence in split_sentences(paragraph) {
        if token_count(sentence) > params.chunk_size {
          flush(&mut current, &mut nodes);
          for piece in split_tokens(sentence, params.chunk_size, params.overlap) {
            nodes.push(piece);
          }
          continue;
        }

        if token_count(&current) + token_count(sentence) > params.chunk_size && !current.is_empty() {
          flush(&mut current, &mut nodes);
        }
        if !current.is_empty() && !current.ends_with(' ') && !current.ends_with('\n') {
          current.push(' ');
        }
        current.push_str(sentence);
      }
    } else {
      if token_count(&current) + token_count(paragraph) > params.chunk_size && !current.is_empty() {
        flush(&mut current, &mut nodes);
      }
      if !current.is_empty() {
        current.push_str("\n\n");
      }
      current.push_str(paragraph);
    }
  }

  if !current.trim().is_empty() {
    nodes.push(current.trim().to_string());
  }

  nodes.retain(|s| !s.is_empty());
  nodes
}

/// Split a document into [`Node`]s, minting a fresh locally-unique id per node.
/// Node order equals the splitter's output order, which equals input order for
/// any single document.
pub fn split_document(doc: &Document, params: &ChunkParams) -> Vec<Node> {
  split_into_nodes(&doc.text, params)
    .into_iter()
    .map(|text| Node {
      node_id: Uuid::new_v4().to_string(),
      text,
      meta: doc.meta.clone(),
    })
    .collect()
}
