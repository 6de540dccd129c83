use crate::error::{Result, TagError};
use crate::normalize::normalize;
use crate::storage::filters::{CanonicalFilter, StoreStats};
use crate::storage::traits::{AliasWrite, SeedWrite, TagStore};
use crate::types::{AliasId, CanonicalId, CanonicalTag, Embedding, TagAlias, VideoId};
use redb::{
    Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

// Table definitions
const CANONICALS: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("canonical_tags");
const ALIASES: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("tag_aliases");

// Unique indexes
const ALIAS_BY_NORMALIZED: TableDefinition<&str, &[u8; 16]> =
    TableDefinition::new("alias_by_normalized");
const CANONICAL_BY_SLUG: TableDefinition<&str, &[u8; 16]> =
    TableDefinition::new("canonical_by_slug");

// Secondary indexes
const ALIASES_BY_CANONICAL: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("aliases_by_canonical");
const VIDEO_TAGS: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("video_canonical_tags");
const TAG_VIDEOS: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("canonical_tag_videos");

// Metadata table
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Points inside the merge transaction where a test can force a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeStep {
    AliasesMoved,
    VideosRelinked,
}

/// Redb-based tag store
pub struct RedbTagStore {
    db: Arc<Database>,
    path: PathBuf,
    #[cfg(test)]
    merge_failpoint: std::sync::Mutex<Option<MergeStep>>,
}

impl RedbTagStore {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TagError::Validation(format!("Failed to create directory: {}", e))
            })?;
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        if !is_new {
            Self::check_schema_version(&db)?;
        }

        // Ensure tables exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CANONICALS)?;
            let _ = write_txn.open_table(ALIASES)?;
            let _ = write_txn.open_table(ALIAS_BY_NORMALIZED)?;
            let _ = write_txn.open_table(CANONICAL_BY_SLUG)?;
            let _ = write_txn.open_multimap_table(ALIASES_BY_CANONICAL)?;
            let _ = write_txn.open_multimap_table(VIDEO_TAGS)?;
            let _ = write_txn.open_multimap_table(TAG_VIDEOS)?;
            let mut meta = write_txn.open_table(META)?;
            if is_new {
                meta.insert(SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string().as_bytes())?;
            }
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            path,
            #[cfg(test)]
            merge_failpoint: std::sync::Mutex::new(None),
        })
    }

    /// Check schema version. Returns error if the file was written by another version.
    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = {
            let table = read_txn.open_table(META).ok();
            table
                .and_then(|t| {
                    t.get(SCHEMA_VERSION_KEY).ok().flatten().and_then(|v| {
                        std::str::from_utf8(v.value())
                            .ok()
                            .and_then(|s| s.parse::<u32>().ok())
                    })
                })
                .unwrap_or(CURRENT_SCHEMA_VERSION)
        };

        match version.cmp(&CURRENT_SCHEMA_VERSION) {
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Less => Err(TagError::Validation(format!(
                "Database schema v{} is older than current v{}.",
                version, CURRENT_SCHEMA_VERSION
            ))),
            std::cmp::Ordering::Greater => Err(TagError::Validation(format!(
                "Database schema v{} is newer than this binary v{}. Upgrade tagmesh.",
                version, CURRENT_SCHEMA_VERSION
            ))),
        }
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bytes_to_uuid(bytes: &[u8; 16]) -> Uuid {
        Uuid::from_bytes(*bytes)
    }

    fn load_canonical(
        table: &impl ReadableTable<&'static [u8; 16], &'static [u8]>,
        id: &CanonicalId,
    ) -> Result<Option<CanonicalTag>> {
        match table.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn load_alias(
        table: &impl ReadableTable<&'static [u8; 16], &'static [u8]>,
        id: &AliasId,
    ) -> Result<Option<TagAlias>> {
        match table.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn lookup_id(
        table: &impl ReadableTable<&'static str, &'static [u8; 16]>,
        key: &str,
    ) -> Result<Option<Uuid>> {
        Ok(table.get(key)?.map(|guard| Self::bytes_to_uuid(guard.value())))
    }

    fn multimap_ids(
        table: &impl ReadableMultimapTable<&'static [u8; 16], &'static [u8; 16]>,
        key: &Uuid,
    ) -> Result<Vec<Uuid>> {
        table
            .get(key.as_bytes())?
            .map(|result| {
                result
                    .map(|guard| Self::bytes_to_uuid(guard.value()))
                    .map_err(TagError::from)
            })
            .collect()
    }

    /// First free slug derived from `base`. A slug already owned by `owner` counts as free.
    fn unique_slug(
        slugs: &impl ReadableTable<&'static str, &'static [u8; 16]>,
        base: &str,
        owner: CanonicalId,
    ) -> Result<String> {
        let mut candidate = base.to_string();
        let mut suffix = 2u32;
        loop {
            match Self::lookup_id(slugs, &candidate)? {
                None => return Ok(candidate),
                Some(id) if id == owner => return Ok(candidate),
                Some(_) => {
                    candidate = format!("{}-{}", base, suffix);
                    suffix += 1;
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn inject_merge_failure(&self, step: MergeStep) {
        *self.merge_failpoint.lock().unwrap() = Some(step);
    }

    #[cfg(test)]
    fn failpoint(&self, step: MergeStep) -> Result<()> {
        if *self.merge_failpoint.lock().unwrap() == Some(step) {
            return Err(TagError::Validation(format!("injected failure at {:?}", step)));
        }
        Ok(())
    }

    #[cfg(not(test))]
    #[inline(always)]
    fn failpoint(&self, _step: MergeStep) -> Result<()> {
        Ok(())
    }
}

impl TagStore for RedbTagStore {
    fn get_canonical(&self, id: CanonicalId) -> Result<Option<CanonicalTag>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CANONICALS)?;
        Self::load_canonical(&table, &id)
    }

    fn create_canonical_with_seed(
        &self,
        canonical: &CanonicalTag,
        seed: &TagAlias,
    ) -> Result<SeedWrite> {
        if seed.canonical_tag_id != canonical.id {
            return Err(TagError::Validation(
                "seed alias must reference the canonical tag it is created with".to_string(),
            ));
        }

        let write_txn = self.db.begin_write()?;

        // Re-check the key inside the writer: a concurrent resolve may have won.
        let existing_alias = {
            let by_normalized = write_txn.open_table(ALIAS_BY_NORMALIZED)?;
            Self::lookup_id(&by_normalized, &seed.normalized_text)?
        };
        if let Some(alias_id) = existing_alias {
            let owner = {
                let aliases = write_txn.open_table(ALIASES)?;
                let alias = Self::load_alias(&aliases, &alias_id)?
                    .ok_or(TagError::AliasNotFound(alias_id))?;
                let canonicals = write_txn.open_table(CANONICALS)?;
                Self::load_canonical(&canonicals, &alias.canonical_tag_id)?
                    .ok_or(TagError::CanonicalNotFound(alias.canonical_tag_id))?
            };
            write_txn.abort()?;
            return Ok(SeedWrite::Existing(owner));
        }

        let mut stored = canonical.clone();
        {
            let mut canonicals = write_txn.open_table(CANONICALS)?;
            if canonicals.get(canonical.id.as_bytes())?.is_some() {
                return Err(TagError::Validation(format!(
                    "canonical tag {} already exists",
                    canonical.id
                )));
            }

            let mut slugs = write_txn.open_table(CANONICAL_BY_SLUG)?;
            stored.slug = Self::unique_slug(&slugs, &canonical.slug, canonical.id)?;
            slugs.insert(stored.slug.as_str(), canonical.id.as_bytes())?;

            let bytes = bincode::serialize(&stored)?;
            canonicals.insert(canonical.id.as_bytes(), bytes.as_slice())?;
        }
        {
            let mut aliases = write_txn.open_table(ALIASES)?;
            let bytes = bincode::serialize(seed)?;
            aliases.insert(seed.id.as_bytes(), bytes.as_slice())?;

            let mut by_normalized = write_txn.open_table(ALIAS_BY_NORMALIZED)?;
            by_normalized.insert(seed.normalized_text.as_str(), seed.id.as_bytes())?;

            let mut by_canonical = write_txn.open_multimap_table(ALIASES_BY_CANONICAL)?;
            by_canonical.insert(canonical.id.as_bytes(), seed.id.as_bytes())?;
        }
        write_txn.commit()?;

        Ok(SeedWrite::Created(stored))
    }

    fn update_canonical(&self, canonical: &CanonicalTag) -> Result<CanonicalTag> {
        let write_txn = self.db.begin_write()?;
        let mut stored = canonical.clone();
        {
            let mut canonicals = write_txn.open_table(CANONICALS)?;
            let old = Self::load_canonical(&canonicals, &canonical.id)?
                .ok_or(TagError::CanonicalNotFound(canonical.id))?;

            let mut slugs = write_txn.open_table(CANONICAL_BY_SLUG)?;
            if old.slug != canonical.slug {
                stored.slug = Self::unique_slug(&slugs, &canonical.slug, canonical.id)?;
                if stored.slug != old.slug {
                    slugs.remove(old.slug.as_str())?;
                    slugs.insert(stored.slug.as_str(), canonical.id.as_bytes())?;
                }
            }

            let bytes = bincode::serialize(&stored)?;
            canonicals.insert(canonical.id.as_bytes(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(stored)
    }

    fn list_canonicals(&self, filter: CanonicalFilter) -> Result<Vec<CanonicalTag>> {
        let read_txn = self.db.begin_read()?;
        let canonicals = read_txn.open_table(CANONICALS)?;

        let needle = filter.contains.as_deref().map(normalize);

        // Owners of aliases whose key contains the needle
        let alias_hits: HashSet<CanonicalId> = match needle.as_deref() {
            Some(needle) => {
                let by_normalized = read_txn.open_table(ALIAS_BY_NORMALIZED)?;
                let aliases = read_txn.open_table(ALIASES)?;
                let mut owners = HashSet::new();
                for item in by_normalized.iter()? {
                    let (key, value) = item?;
                    if key.value().contains(needle) {
                        let alias_id = Self::bytes_to_uuid(value.value());
                        if let Some(alias) = Self::load_alias(&aliases, &alias_id)? {
                            owners.insert(alias.canonical_tag_id);
                        }
                    }
                }
                owners
            }
            None => HashSet::new(),
        };

        let mut tags = Vec::new();
        for item in canonicals.iter()? {
            let (_, value) = item?;
            let tag: CanonicalTag = bincode::deserialize(value.value())?;

            if filter.approved_only && !tag.is_approved {
                continue;
            }
            if let Some(needle) = needle.as_deref() {
                if !normalize(&tag.display_name).contains(needle) && !alias_hits.contains(&tag.id) {
                    continue;
                }
            }
            tags.push(tag);
        }

        tags.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(tags.into_iter().skip(offset).take(limit).collect())
    }

    fn alias_by_normalized(&self, normalized_text: &str) -> Result<Option<TagAlias>> {
        let read_txn = self.db.begin_read()?;
        let by_normalized = read_txn.open_table(ALIAS_BY_NORMALIZED)?;
        let Some(alias_id) = Self::lookup_id(&by_normalized, normalized_text)? else {
            return Ok(None);
        };
        let aliases = read_txn.open_table(ALIASES)?;
        Self::load_alias(&aliases, &alias_id)
    }

    fn canonical_by_normalized(&self, normalized_text: &str) -> Result<Option<CanonicalTag>> {
        let read_txn = self.db.begin_read()?;
        let by_normalized = read_txn.open_table(ALIAS_BY_NORMALIZED)?;
        let Some(alias_id) = Self::lookup_id(&by_normalized, normalized_text)? else {
            return Ok(None);
        };

        let aliases = read_txn.open_table(ALIASES)?;
        let alias = Self::load_alias(&aliases, &alias_id)?
            .ok_or(TagError::AliasNotFound(alias_id))?;

        let canonicals = read_txn.open_table(CANONICALS)?;
        let canonical = Self::load_canonical(&canonicals, &alias.canonical_tag_id)?
            .ok_or(TagError::CanonicalNotFound(alias.canonical_tag_id))?;
        Ok(Some(canonical))
    }

    fn get_alias(&self, id: AliasId) -> Result<Option<TagAlias>> {
        let read_txn = self.db.begin_read()?;
        let aliases = read_txn.open_table(ALIASES)?;
        Self::load_alias(&aliases, &id)
    }

    fn insert_alias(&self, alias: &TagAlias) -> Result<AliasWrite> {
        let write_txn = self.db.begin_write()?;

        let existing = {
            let by_normalized = write_txn.open_table(ALIAS_BY_NORMALIZED)?;
            Self::lookup_id(&by_normalized, &alias.normalized_text)?
        };
        if let Some(existing_id) = existing {
            let current = {
                let aliases = write_txn.open_table(ALIASES)?;
                Self::load_alias(&aliases, &existing_id)?
                    .ok_or(TagError::AliasNotFound(existing_id))?
            };
            write_txn.abort()?;
            return Ok(AliasWrite::Existing(current));
        }

        {
            // The owner may have been merged away since the caller looked it up
            let canonicals = write_txn.open_table(CANONICALS)?;
            if canonicals.get(alias.canonical_tag_id.as_bytes())?.is_none() {
                return Err(TagError::CanonicalNotFound(alias.canonical_tag_id));
            }
        }
        {
            let mut aliases = write_txn.open_table(ALIASES)?;
            let bytes = bincode::serialize(alias)?;
            aliases.insert(alias.id.as_bytes(), bytes.as_slice())?;

            let mut by_normalized = write_txn.open_table(ALIAS_BY_NORMALIZED)?;
            by_normalized.insert(alias.normalized_text.as_str(), alias.id.as_bytes())?;

            let mut by_canonical = write_txn.open_multimap_table(ALIASES_BY_CANONICAL)?;
            by_canonical.insert(alias.canonical_tag_id.as_bytes(), alias.id.as_bytes())?;
        }
        write_txn.commit()?;

        Ok(AliasWrite::Inserted(alias.clone()))
    }

    fn aliases_for(&self, canonical_id: CanonicalId) -> Result<Vec<TagAlias>> {
        let read_txn = self.db.begin_read()?;
        let by_canonical = read_txn.open_multimap_table(ALIASES_BY_CANONICAL)?;
        let aliases = read_txn.open_table(ALIASES)?;

        // Multimap values come back in key order; UUIDv7 keys sort by creation time.
        let mut out = Vec::new();
        for alias_id in Self::multimap_ids(&by_canonical, &canonical_id)? {
            if let Some(alias) = Self::load_alias(&aliases, &alias_id)? {
                out.push(alias);
            }
        }
        Ok(out)
    }

    fn embedded_aliases(&self) -> Result<Vec<TagAlias>> {
        let read_txn = self.db.begin_read()?;
        let aliases = read_txn.open_table(ALIASES)?;

        let mut out = Vec::new();
        for item in aliases.iter()? {
            let (_, value) = item?;
            let alias: TagAlias = bincode::deserialize(value.value())?;
            if alias.embedding.is_some() {
                out.push(alias);
            }
        }
        Ok(out)
    }

    fn aliases_pending_backfill(&self, limit: usize) -> Result<Vec<TagAlias>> {
        let read_txn = self.db.begin_read()?;
        let aliases = read_txn.open_table(ALIASES)?;

        let mut out = Vec::new();
        for item in aliases.iter()? {
            if out.len() >= limit {
                break;
            }
            let (_, value) = item?;
            let alias: TagAlias = bincode::deserialize(value.value())?;
            if alias.needs_backfill() {
                out.push(alias);
            }
        }
        Ok(out)
    }

    fn set_alias_embedding(&self, id: AliasId, embedding: &Embedding) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut aliases = write_txn.open_table(ALIASES)?;
            let mut alias =
                Self::load_alias(&aliases, &id)?.ok_or(TagError::AliasNotFound(id))?;
            alias.embedding = Some(embedding.clone());
            let bytes = bincode::serialize(&alias)?;
            aliases.insert(id.as_bytes(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn merge_canonical(&self, source: CanonicalId, target: CanonicalId) -> Result<usize> {
        if source == target {
            return Err(TagError::InvalidInput(
                "source and target tags must be different".to_string(),
            ));
        }

        // Any early return drops the transaction, which aborts it.
        let write_txn = self.db.begin_write()?;

        let source_tag = {
            let canonicals = write_txn.open_table(CANONICALS)?;
            if canonicals.get(target.as_bytes())?.is_none() {
                return Err(TagError::CanonicalNotFound(target));
            }
            Self::load_canonical(&canonicals, &source)?
                .ok_or(TagError::CanonicalNotFound(source))?
        };

        // 1. Re-point aliases
        let moved = {
            let mut by_canonical = write_txn.open_multimap_table(ALIASES_BY_CANONICAL)?;
            let alias_ids = Self::multimap_ids(&by_canonical, &source)?;

            let mut aliases = write_txn.open_table(ALIASES)?;
            for alias_id in &alias_ids {
                let mut alias = Self::load_alias(&aliases, alias_id)?
                    .ok_or(TagError::AliasNotFound(*alias_id))?;
                alias.canonical_tag_id = target;
                let bytes = bincode::serialize(&alias)?;
                aliases.insert(alias_id.as_bytes(), bytes.as_slice())?;
                by_canonical.insert(target.as_bytes(), alias_id.as_bytes())?;
            }
            by_canonical.remove_all(source.as_bytes())?;
            alias_ids.len()
        };
        self.failpoint(MergeStep::AliasesMoved)?;

        // 2. Move video links; a video already tagged with target keeps one link
        {
            let mut tag_videos = write_txn.open_multimap_table(TAG_VIDEOS)?;
            let videos = Self::multimap_ids(&tag_videos, &source)?;

            let mut video_tags = write_txn.open_multimap_table(VIDEO_TAGS)?;
            for video in &videos {
                video_tags.remove(video.as_bytes(), source.as_bytes())?;
                video_tags.insert(video.as_bytes(), target.as_bytes())?;
                tag_videos.insert(target.as_bytes(), video.as_bytes())?;
            }
            tag_videos.remove_all(source.as_bytes())?;
        }
        self.failpoint(MergeStep::VideosRelinked)?;

        // 3. Delete source
        {
            let mut canonicals = write_txn.open_table(CANONICALS)?;
            canonicals.remove(source.as_bytes())?;

            let mut slugs = write_txn.open_table(CANONICAL_BY_SLUG)?;
            if Self::lookup_id(&slugs, &source_tag.slug)? == Some(source) {
                slugs.remove(source_tag.slug.as_str())?;
            }
        }

        write_txn.commit()?;
        Ok(moved)
    }

    fn link_video(&self, video: VideoId, canonical: CanonicalId) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let already_linked = {
            let canonicals = write_txn.open_table(CANONICALS)?;
            if canonicals.get(canonical.as_bytes())?.is_none() {
                return Err(TagError::CanonicalNotFound(canonical));
            }

            let mut video_tags = write_txn.open_multimap_table(VIDEO_TAGS)?;
            let existed = video_tags.insert(video.as_bytes(), canonical.as_bytes())?;
            let mut tag_videos = write_txn.open_multimap_table(TAG_VIDEOS)?;
            tag_videos.insert(canonical.as_bytes(), video.as_bytes())?;
            existed
        };
        write_txn.commit()?;
        Ok(!already_linked)
    }

    fn unlink_video(&self, video: VideoId, canonical: CanonicalId) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut video_tags = write_txn.open_multimap_table(VIDEO_TAGS)?;
            if !video_tags.remove(video.as_bytes(), canonical.as_bytes())? {
                return Err(TagError::VideoTagNotFound {
                    video,
                    tag: canonical,
                });
            }
            let mut tag_videos = write_txn.open_multimap_table(TAG_VIDEOS)?;
            tag_videos.remove(canonical.as_bytes(), video.as_bytes())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn canonicals_for_video(&self, video: VideoId) -> Result<Vec<CanonicalTag>> {
        let read_txn = self.db.begin_read()?;
        let video_tags = read_txn.open_multimap_table(VIDEO_TAGS)?;
        let canonicals = read_txn.open_table(CANONICALS)?;

        let mut tags = Vec::new();
        for id in Self::multimap_ids(&video_tags, &video)? {
            if let Some(tag) = Self::load_canonical(&canonicals, &id)? {
                tags.push(tag);
            }
        }
        tags.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        Ok(tags)
    }

    fn videos_for_canonical(&self, canonical: CanonicalId) -> Result<Vec<VideoId>> {
        let read_txn = self.db.begin_read()?;
        let tag_videos = read_txn.open_multimap_table(TAG_VIDEOS)?;
        Self::multimap_ids(&tag_videos, &canonical)
    }

    fn stats(&self) -> Result<StoreStats> {
        let read_txn = self.db.begin_read()?;
        let canonicals = read_txn.open_table(CANONICALS)?;
        let aliases = read_txn.open_table(ALIASES)?;
        let video_tags = read_txn.open_multimap_table(VIDEO_TAGS)?;

        let mut stats = StoreStats::default();

        for item in canonicals.iter()? {
            let (_, value) = item?;
            let tag: CanonicalTag = bincode::deserialize(value.value())?;
            stats.canonical_count += 1;
            if tag.is_approved {
                stats.approved_count += 1;
            }
        }

        for item in aliases.iter()? {
            let (_, value) = item?;
            let alias: TagAlias = bincode::deserialize(value.value())?;
            stats.alias_count += 1;
            if alias.needs_backfill() {
                stats.pending_backfill_count += 1;
            }
        }

        for item in video_tags.iter()? {
            let (_, values) = item?;
            stats.video_link_count += values.count() as u64;
        }

        stats.db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbTagStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let store = RedbTagStore::open(&db_path).unwrap();
        (store, temp_dir)
    }

    fn create_tag(store: &RedbTagStore, text: &str, embedding: Option<Embedding>) -> CanonicalTag {
        let canonical = CanonicalTag::new(text).unwrap();
        let seed = TagAlias::seed(&canonical, text, embedding).unwrap();
        match store.create_canonical_with_seed(&canonical, &seed).unwrap() {
            SeedWrite::Created(tag) => tag,
            SeedWrite::Existing(_) => panic!("{} already existed", text),
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let (store, _temp) = create_test_store();
        let tag = create_tag(&store, "Money", Some(vec![1.0, 0.0]));

        let found = store.canonical_by_normalized("money").unwrap().unwrap();
        assert_eq!(found, tag);

        let aliases = store.aliases_for(tag.id).unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].similarity_score, 1.0);
        assert!(store.canonical_by_normalized("tiền").unwrap().is_none());
    }

    #[test]
    fn test_seed_conflict_returns_existing_owner() {
        let (store, _temp) = create_test_store();
        let first = create_tag(&store, "money", None);

        let dup = CanonicalTag::new("MONEY ").unwrap();
        let seed = TagAlias::seed(&dup, "MONEY ", None).unwrap();
        let outcome = store.create_canonical_with_seed(&dup, &seed).unwrap();

        assert_eq!(outcome, SeedWrite::Existing(first.clone()));
        assert!(store.get_canonical(dup.id).unwrap().is_none());
        assert_eq!(store.stats().unwrap().canonical_count, 1);
    }

    #[test]
    fn test_slug_collision_suffix() {
        let (store, _temp) = create_test_store();
        let a = create_tag(&store, "Money & Finance", None);
        let b = create_tag(&store, "money finance", None);
        let c = create_tag(&store, "Money-Finance!", None);

        assert_eq!(a.slug, "money-finance");
        assert_eq!(b.slug, "money-finance-2");
        assert_eq!(c.slug, "money-finance-3");
    }

    #[test]
    fn test_insert_alias_upsert_on_conflict() {
        let (store, _temp) = create_test_store();
        let money = create_tag(&store, "money", None);
        let cash = create_tag(&store, "cash", None);

        let alias = TagAlias::new("tiền", money.id, None, 0.9).unwrap();
        let first = store.insert_alias(&alias).unwrap();
        assert!(matches!(first, AliasWrite::Inserted(_)));

        // Same key pointed elsewhere: first writer wins
        let other = TagAlias::new("Tiền", cash.id, None, 0.8).unwrap();
        match store.insert_alias(&other).unwrap() {
            AliasWrite::Existing(existing) => assert_eq!(existing.canonical_tag_id, money.id),
            AliasWrite::Inserted(_) => panic!("duplicate normalized text inserted"),
        }
        assert_eq!(store.aliases_for(cash.id).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_alias_for_missing_canonical() {
        let (store, _temp) = create_test_store();
        let alias = TagAlias::new("orphan", Uuid::now_v7(), None, 0.9).unwrap();
        assert!(store.insert_alias(&alias).unwrap_err().is_not_found());
        assert!(store.alias_by_normalized("orphan").unwrap().is_none());
    }

    #[test]
    fn test_backfill_queue() {
        let (store, _temp) = create_test_store();
        create_tag(&store, "money", Some(vec![1.0, 0.0]));
        let pending = create_tag(&store, "cash", None);

        let queue = store.aliases_pending_backfill(10).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].canonical_tag_id, pending.id);
        assert_eq!(store.embedded_aliases().unwrap().len(), 1);

        store.set_alias_embedding(queue[0].id, &vec![0.0, 1.0]).unwrap();
        assert!(store.aliases_pending_backfill(10).unwrap().is_empty());
        assert_eq!(store.embedded_aliases().unwrap().len(), 2);
    }

    #[test]
    fn test_update_canonical_reslugs() {
        let (store, _temp) = create_test_store();
        create_tag(&store, "finance", None);
        let mut money = create_tag(&store, "money", None);

        money.display_name = "Finance".to_string();
        money.slug = crate::normalize::slugify("Finance");
        let stored = store.update_canonical(&money).unwrap();
        assert_eq!(stored.slug, "finance-2");

        // The old slug is free again
        let again = create_tag(&store, "Money!", None);
        assert_eq!(again.slug, "money");
    }

    #[test]
    fn test_video_links_idempotent() {
        let (store, _temp) = create_test_store();
        let tag = create_tag(&store, "money", None);
        let video = Uuid::now_v7();

        assert!(store.link_video(video, tag.id).unwrap());
        assert!(!store.link_video(video, tag.id).unwrap());
        assert_eq!(store.canonicals_for_video(video).unwrap(), vec![tag.clone()]);
        assert_eq!(store.videos_for_canonical(tag.id).unwrap(), vec![video]);

        store.unlink_video(video, tag.id).unwrap();
        assert!(store.unlink_video(video, tag.id).unwrap_err().is_not_found());
        assert!(store.link_video(video, Uuid::now_v7()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_merge_moves_everything() {
        let (store, _temp) = create_test_store();
        let source = create_tag(&store, "tiền", None);
        store
            .insert_alias(&TagAlias::new("money money", source.id, None, 0.9).unwrap())
            .unwrap();
        let target = create_tag(&store, "money", None);

        let shared = Uuid::now_v7();
        let only_source = Uuid::now_v7();
        store.link_video(shared, source.id).unwrap();
        store.link_video(shared, target.id).unwrap();
        store.link_video(only_source, source.id).unwrap();

        let moved = store.merge_canonical(source.id, target.id).unwrap();
        assert_eq!(moved, 2);

        assert!(store.get_canonical(source.id).unwrap().is_none());
        assert_eq!(store.aliases_for(target.id).unwrap().len(), 3);
        assert!(store.aliases_for(source.id).unwrap().is_empty());
        assert_eq!(store.canonical_by_normalized("tiền").unwrap().unwrap().id, target.id);

        assert_eq!(store.canonicals_for_video(shared).unwrap(), vec![target.clone()]);
        assert_eq!(store.canonicals_for_video(only_source).unwrap(), vec![target.clone()]);
        let mut videos = store.videos_for_canonical(target.id).unwrap();
        videos.sort();
        let mut expected = vec![shared, only_source];
        expected.sort();
        assert_eq!(videos, expected);
        assert!(store.videos_for_canonical(source.id).unwrap().is_empty());
        assert_eq!(store.stats().unwrap().video_link_count, 2);
    }

    #[test]
    fn test_merge_preconditions() {
        let (store, _temp) = create_test_store();
        let tag = create_tag(&store, "money", None);

        assert!(store.merge_canonical(tag.id, tag.id).unwrap_err().is_invalid_input());
        assert!(store.merge_canonical(Uuid::now_v7(), tag.id).unwrap_err().is_not_found());
        assert!(store.merge_canonical(tag.id, Uuid::now_v7()).unwrap_err().is_not_found());
        assert!(store.get_canonical(tag.id).unwrap().is_some());
    }

    #[test]
    fn test_merge_failure_rolls_back() {
        for step in [MergeStep::AliasesMoved, MergeStep::VideosRelinked] {
            let (store, _temp) = create_test_store();
            let source = create_tag(&store, "tiền", None);
            let target = create_tag(&store, "money", None);
            let video = Uuid::now_v7();
            store.link_video(video, source.id).unwrap();

            let before = store.stats().unwrap();
            store.inject_merge_failure(step);
            assert!(store.merge_canonical(source.id, target.id).is_err());

            assert_eq!(store.get_canonical(source.id).unwrap(), Some(source.clone()));
            assert_eq!(store.get_canonical(target.id).unwrap(), Some(target.clone()));
            assert_eq!(store.aliases_for(source.id).unwrap().len(), 1);
            assert_eq!(store.aliases_for(target.id).unwrap().len(), 1);
            assert_eq!(
                store.canonical_by_normalized("tiền").unwrap().unwrap().id,
                source.id
            );
            assert_eq!(store.canonicals_for_video(video).unwrap(), vec![source.clone()]);
            assert!(store.videos_for_canonical(target.id).unwrap().is_empty());

            let after = store.stats().unwrap();
            assert_eq!(before.canonical_count, after.canonical_count);
            assert_eq!(before.alias_count, after.alias_count);
            assert_eq!(before.video_link_count, after.video_link_count);
        }
    }

    #[test]
    fn test_list_canonicals_filters() {
        let (store, _temp) = create_test_store();
        let mut money = create_tag(&store, "Money", None);
        create_tag(&store, "banking", None);
        store
            .insert_alias(&TagAlias::new("tiền bạc", money.id, None, 0.9).unwrap())
            .unwrap();

        money.is_approved = true;
        store.update_canonical(&money).unwrap();

        let all = store.list_canonicals(CanonicalFilter::new()).unwrap();
        assert_eq!(
            all.iter().map(|t| t.display_name.as_str()).collect::<Vec<_>>(),
            vec!["banking", "Money"]
        );

        let approved = store.list_canonicals(CanonicalFilter::new().approved_only(true)).unwrap();
        assert_eq!(approved.len(), 1);

        let by_alias = store.list_canonicals(CanonicalFilter::new().containing("TIỀN")).unwrap();
        assert_eq!(by_alias.len(), 1);
        assert_eq!(by_alias[0].id, money.id);

        let paged = store
            .list_canonicals(CanonicalFilter::new().with_offset(1).with_limit(5))
            .unwrap();
        assert_eq!(paged.len(), 1);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("reopen.redb");
        let id = {
            let store = RedbTagStore::open(&db_path).unwrap();
            create_tag(&store, "money", Some(vec![0.5, 0.5])).id
        };

        let store = RedbTagStore::open(&db_path).unwrap();
        let found = store.canonical_by_normalized("money").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(store.embedded_aliases().unwrap().len(), 1);
    }
}
