pub mod approval;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod resolver;
pub mod service;
pub mod storage;
pub mod translate;
pub mod types;
pub mod vector;

pub use approval::ApprovalWorkflow;
pub use error::{ErrorKind, Result, ResultExt, TagError};
pub use merge::{MergeEngine, MergeOutcome};
pub use normalize::{normalize, slugify, validate_tag_text, MAX_TAG_CHARS};
pub use resolver::{
    parse_legacy_json, BackfillReport, EmbeddingOutcome, ImportReport, LegacyTagRecord,
    Providers, Resolution, ResolutionLayer, ResolverConfig, TagResolver, TranslationOutcome,
};
pub use service::{ServiceStats, TagService};
pub use storage::{
    AliasWrite, CanonicalFilter, RedbTagStore, SeedWrite, StoreStats, TagStore,
    CURRENT_SCHEMA_VERSION,
};
pub use translate::TranslationProvider;
pub use types::*;
pub use vector::{
    cosine_distance, similarity_from_distance, AliasIndex, EmbeddingProvider, FastEmbedProvider,
    IndexHit, SimilarMatch, SimilarityMatcher, FASTEMBED_MODELS,
};
