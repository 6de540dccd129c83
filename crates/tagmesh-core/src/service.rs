use crate::approval::ApprovalWorkflow;
use crate::error::{Result, ResultExt, TagError};
use crate::merge::{MergeEngine, MergeOutcome};
use crate::resolver::{
    BackfillReport, ImportReport, LegacyTagRecord, Providers, Resolution, ResolverConfig,
    TagResolver,
};
use crate::storage::{RedbTagStore, StoreStats, TagStore};
use crate::types::{CanonicalId, CanonicalTag, CanonicalWithAliases, TagRef, VideoId};
use crate::vector::SimilarityMatcher;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Store counters plus in-memory index state.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    #[serde(flatten)]
    pub store: StoreStats,
    pub indexed_vectors: usize,
    pub embedding_dimension: Option<usize>,
}

/// Everything the tag API needs, wired over one store.
///
/// # Example
/// ```rust,no_run
/// use tagmesh_core::{Providers, ResolverConfig, TagService};
///
/// # async fn demo() -> tagmesh_core::Result<()> {
/// let config = ResolverConfig::default();
/// let providers = Providers::none(config.provider_timeout);
/// let tags = TagService::open("./tags.redb", providers, config)?;
/// let resolution = tags.resolve("Machine Learning").await?;
/// println!("{} (new: {})", resolution.canonical.display_name, resolution.is_new);
/// # Ok(())
/// # }
/// ```
pub struct TagService<S: TagStore = RedbTagStore> {
    store: Arc<S>,
    resolver: TagResolver<S>,
    merge: MergeEngine<S>,
    approval: ApprovalWorkflow<S>,
}

impl TagService<RedbTagStore> {
    /// Open (or create) a redb database and load its similarity index.
    pub fn open(
        path: impl AsRef<Path>,
        providers: Providers,
        config: ResolverConfig,
    ) -> Result<Self> {
        let store = Arc::new(RedbTagStore::open(path.as_ref())?);
        Self::new(store, providers, config)
    }
}

impl<S: TagStore> TagService<S> {
    pub fn new(store: Arc<S>, providers: Providers, config: ResolverConfig) -> Result<Self> {
        let matcher = Arc::new(SimilarityMatcher::load(store.clone())?);
        let resolver = TagResolver::new(store.clone(), matcher, providers, config)?;
        Ok(Self {
            merge: MergeEngine::new(store.clone()),
            approval: ApprovalWorkflow::new(store.clone()),
            store,
            resolver,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn resolver(&self) -> &TagResolver<S> {
        &self.resolver
    }

    pub async fn resolve(&self, text: &str) -> Result<Resolution> {
        self.resolver.resolve(text).await
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        approved_only: bool,
    ) -> Result<Vec<CanonicalTag>> {
        self.resolver.search(query, limit, approved_only).await
    }

    pub fn get_canonical(&self, id: CanonicalId) -> Result<CanonicalWithAliases> {
        let tag = self
            .store
            .get_canonical(id)
            .context("get tag")?
            .ok_or(TagError::CanonicalNotFound(id))?;
        let aliases = self.store.aliases_for(id).context("get tag: aliases")?;
        Ok(CanonicalWithAliases { tag, aliases })
    }

    pub fn set_approval(&self, id: CanonicalId, approved: bool) -> Result<CanonicalTag> {
        self.approval.set_approval(id, approved)
    }

    pub fn rename(&self, id: CanonicalId, display_name: &str) -> Result<CanonicalTag> {
        self.approval.rename(id, display_name)
    }

    pub fn merge(&self, source: CanonicalId, target: CanonicalId) -> Result<MergeOutcome> {
        self.merge.merge(source, target)
    }

    /// Attach a tag to a video. Names are resolved first, so this may create
    /// a canonical tag. Attaching twice is a no-op.
    pub async fn add_tag_to_video(&self, video: VideoId, tag: TagRef) -> Result<CanonicalTag> {
        let canonical = match tag {
            TagRef::Id(id) => self
                .store
                .get_canonical(id)
                .context("add video tag: load tag")?
                .ok_or(TagError::CanonicalNotFound(id))?,
            TagRef::Name(name) => self.resolver.resolve(&name).await?.canonical,
        };

        if self
            .store
            .link_video(video, canonical.id)
            .context("add video tag: link")?
        {
            log::debug!("Linked {} to video {}", canonical.display_name, video);
        }
        Ok(canonical)
    }

    pub fn remove_tag_from_video(&self, video: VideoId, tag: CanonicalId) -> Result<()> {
        self.store
            .unlink_video(video, tag)
            .context("remove video tag")
    }

    /// Tags on a video, ordered by display name.
    pub fn video_tags(&self, video: VideoId) -> Result<Vec<CanonicalTag>> {
        self.store.canonicals_for_video(video).context("list video tags")
    }

    pub async fn backfill_embeddings(&self, limit: usize) -> Result<BackfillReport> {
        self.resolver.backfill_embeddings(limit).await
    }

    pub async fn import_legacy(&self, records: Vec<LegacyTagRecord>) -> Result<ImportReport> {
        self.resolver.import_legacy(records).await
    }

    pub fn stats(&self) -> Result<ServiceStats> {
        Ok(ServiceStats {
            store: self.store.stats()?,
            indexed_vectors: self.resolver.matcher().len(),
            embedding_dimension: self.resolver.matcher().dimension(),
        })
    }
}
