mod embedding;
mod index;
mod matcher;

pub use embedding::{EmbeddingProvider, FastEmbedProvider, FASTEMBED_MODELS};
pub use index::{cosine_distance, similarity_from_distance, AliasIndex, IndexHit};
pub use matcher::{SimilarMatch, SimilarityMatcher};
