use tracing::debug;

use crate::Result;
use crate::chunker::Chunk;
use crate::clusters::EmbeddedChunk;
use crate::error::{Error, UpstreamError};

/// Source of raw caption markup.
///
/// Implementations decide how `source` is interpreted (a video URL, a file path, a cache key)
/// and how the markup is acquired. Failures should surface as [`Error::Upstream`].
pub trait TextSupplier {
    fn fetch_transcript(&self, source: &str) -> Result<String>;
}

/// Source of fixed-dimension embedding vectors.
pub trait EmbeddingSupplier {
    /// Embed `texts`, returning one vector per input in the same order.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

impl<T: TextSupplier + ?Sized> TextSupplier for &T {
    fn fetch_transcript(&self, source: &str) -> Result<String> {
        (**self).fetch_transcript(source)
    }
}

impl<E: EmbeddingSupplier + ?Sized> EmbeddingSupplier for &E {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts)
    }
}

/// Symbols stripped from chunk text before embedding.
///
/// Auto-generated captions mark music with `♪`; the remaining entries are the characters that
/// symbol decodes to when UTF-8 is misread as Windows-1252.
const NON_TEXT_SYMBOLS: &[char] = &['♪', 'â', '™', 'ª'];

/// Remove non-text symbols from a chunk's text and trim the result.
pub fn clean_embedding_text(text: &str) -> String {
    text.chars()
        .filter(|c| !NON_TEXT_SYMBOLS.contains(c))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Embed `chunks` with `supplier` and attach each vector to its chunk.
///
/// The supplier is called once with the cleaned texts. A response whose length differs from
/// the input fails with [`UpstreamError::LengthMismatch`].
pub fn embed_chunks<E>(supplier: &E, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>>
where
    E: EmbeddingSupplier + ?Sized,
{
    if chunks.is_empty() {
        return Err(Error::EmptyInput("no chunks provided"));
    }

    let cleaned: Vec<String> = chunks
        .iter()
        .map(|c| clean_embedding_text(&c.text))
        .collect();
    let inputs: Vec<&str> = cleaned.iter().map(String::as_str).collect();

    let vectors = supplier.embed(&inputs)?;
    if vectors.len() != chunks.len() {
        return Err(UpstreamError::LengthMismatch {
            expected: chunks.len(),
            actual: vectors.len(),
        }
        .into());
    }

    debug!(
        chunks = chunks.len(),
        dims = vectors.first().map_or(0, Vec::len),
        "embedded chunks"
    );

    Ok(chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, embedding)| EmbeddedChunk::new(chunk, embedding))
        .collect())
}
