use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hearth_core::{
    document::{
        COLLECTION_PROPERTIES, COLLECTION_TAGS, COLLECTION_WORKSPACES, Document,
        FIELD_MEMBER_USER_IDS, FIELD_NAME,
    },
    error::{SyncError, SyncResult},
    ids::{DocumentId, TagId, WorkspaceId},
    property::{PropertyInput, PropertyRecord},
    rating::{PropertyKind, Rating},
    store::{DocumentStoreRef, QueryFilter, WriteBatch},
    tag::{TagInput, TagRecord},
    workspace::WorkspaceRecord,
};

use crate::writes::MembershipWriteService;

pub const EXPORT_VERSION: &str = "1.0";

/// Portable snapshot of a workspace's listings. Tags are inlined by value so
/// the document is self-contained; ids never travel with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableExportDocument {
    pub version: String,
    pub export_date: String,
    pub listings: Vec<PortableListing>,
}

impl PortableExportDocument {
    pub fn to_json_pretty(&self) -> SyncResult<String> {
        let json = serde_json::to_string_pretty(self)
            .context("failed to serialize export document")?;
        Ok(json)
    }

    /// Parses and validates a portable document. Malformed JSON and an
    /// unparseable export date are hard failures; an unexpected version is
    /// only logged.
    pub fn from_json(raw: &str) -> SyncResult<Self> {
        let doc: Self = serde_json::from_str(raw)
            .map_err(|err| SyncError::validation(format!("invalid export document: {err}")))?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.version != EXPORT_VERSION {
            warn!(
                version = %self.version,
                supported = EXPORT_VERSION,
                "export document version differs from the supported one"
            );
        }
        parse_export_date(&self.export_date)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableListing {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_contact: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    #[serde(default, rename = "type")]
    pub kind: PropertyKind,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub tags: Vec<PortableTag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortableTag {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: Rating,
}

/// Outcome of an import: per-listing failures are accumulated here instead
/// of aborting the remaining listings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub success: bool,
    pub imported_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<String>,
}

/// Moves listing sets between workspaces through the portable JSON format.
/// Import deduplicates tags by exact name against the whole tag collection,
/// so a tag shared across export files ends up as one document.
pub struct MergeImportExportService {
    store: DocumentStoreRef,
    writes: MembershipWriteService,
}

impl MergeImportExportService {
    pub fn new(store: DocumentStoreRef, writes: MembershipWriteService) -> Self {
        Self { store, writes }
    }

    /// Snapshots every property owned by the workspace, tags inlined by
    /// value and listings sorted by title for deterministic output.
    pub async fn export(&self, workspace_id: &WorkspaceId) -> SyncResult<PortableExportDocument> {
        let workspace = self.load_workspace(workspace_id).await?;

        let mut properties = Vec::new();
        for doc in self.owned_property_docs(&workspace).await? {
            match PropertyRecord::from_document(&doc) {
                Ok(record) => properties.push(record),
                Err(err) => {
                    warn!(
                        doc_id = %doc.id,
                        error = %err,
                        "skipping undecodable property during export"
                    );
                }
            }
        }
        properties.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

        let mut tag_cache: HashMap<TagId, Option<TagRecord>> = HashMap::new();
        let mut listings = Vec::with_capacity(properties.len());
        for property in &properties {
            let mut tags = Vec::new();
            for tag_id in &property.tag_ids {
                if let Some(tag) = self.resolve_export_tag(&mut tag_cache, tag_id).await? {
                    tags.push(PortableTag {
                        name: tag.name.clone(),
                        rating: tag.rating,
                    });
                }
            }
            listings.push(to_portable_listing(property, tags));
        }

        debug!(
            workspace_id = %workspace_id,
            listings = listings.len(),
            "exported workspace listings"
        );
        Ok(PortableExportDocument {
            version: EXPORT_VERSION.to_owned(),
            export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            listings,
        })
    }

    /// Imports a portable document into the target workspace. Listings that
    /// fail to import are reported and skipped; the rest still land. With
    /// `replace_existing` the target's current properties are deleted first,
    /// which is not atomic with the inserts: a crash in between leaves the
    /// workspace empty.
    pub async fn import(
        &self,
        doc: &PortableExportDocument,
        target: &WorkspaceId,
        replace_existing: bool,
    ) -> SyncResult<ImportResult> {
        doc.validate()?;
        let workspace = self.load_workspace(target).await?;

        if replace_existing {
            for existing in self.owned_property_docs(&workspace).await? {
                self.store.delete(COLLECTION_PROPERTIES, &existing.id).await?;
            }
        }

        let mut imported_count = 0;
        let mut skipped_count = 0;
        let mut errors = Vec::new();
        for listing in &doc.listings {
            match self.import_listing(listing, &workspace).await {
                Ok(()) => imported_count += 1,
                Err(err) => {
                    warn!(title = %listing.title, error = %err, "skipping listing during import");
                    errors.push(format!("{}: {err}", listing.title));
                    skipped_count += 1;
                }
            }
        }

        info!(
            workspace_id = %target,
            imported = imported_count,
            skipped = skipped_count,
            "import finished"
        );
        Ok(ImportResult {
            success: errors.is_empty(),
            imported_count,
            skipped_count,
            errors,
        })
    }

    async fn import_listing(
        &self,
        listing: &PortableListing,
        workspace: &WorkspaceRecord,
    ) -> SyncResult<()> {
        let mut tag_ids = Vec::with_capacity(listing.tags.len());
        for tag in &listing.tags {
            tag_ids.push(self.resolve_import_tag(tag, workspace).await?);
        }

        let input = PropertyInput {
            title: listing.title.clone(),
            location: listing.location.clone(),
            link: listing.link.clone(),
            agent_contact: listing.agent_contact.clone(),
            price: listing.price,
            size: listing.size,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            kind: listing.kind,
            rating: listing.rating,
            tag_ids,
        };
        self.writes.save_property(None, &input, workspace).await?;
        Ok(())
    }

    /// Finds a tag by exact name in the whole tag collection, or creates it
    /// under the target workspace. A reused tag is extended with the target
    /// members it is missing, so it keeps sharing the membership of the
    /// properties that reference it.
    async fn resolve_import_tag(
        &self,
        tag: &PortableTag,
        workspace: &WorkspaceRecord,
    ) -> SyncResult<TagId> {
        let filter = QueryFilter::field_equals(FIELD_NAME, tag.name.as_str());
        let matches = self.store.query(COLLECTION_TAGS, &filter).await?;
        let Some(existing) = matches.first() else {
            return self
                .writes
                .save_tag(None, &TagInput::new(tag.name.clone(), tag.rating), workspace)
                .await;
        };

        let members = existing.member_user_ids();
        let missing: Vec<String> = workspace
            .member_user_ids
            .iter()
            .map(ToString::to_string)
            .filter(|member| !members.contains(member))
            .collect();
        if !missing.is_empty() {
            let mut batch = WriteBatch::new();
            batch.array_union(
                COLLECTION_TAGS,
                existing.id.clone(),
                FIELD_MEMBER_USER_IDS,
                missing,
            );
            self.store.commit(batch).await?;
        }
        Ok(TagId::from(existing.id.clone()))
    }

    async fn resolve_export_tag(
        &self,
        cache: &mut HashMap<TagId, Option<TagRecord>>,
        tag_id: &TagId,
    ) -> SyncResult<Option<TagRecord>> {
        if let Some(cached) = cache.get(tag_id) {
            return Ok(cached.clone());
        }

        let fetched = self
            .store
            .fetch(COLLECTION_TAGS, &DocumentId::new(tag_id.as_str()))
            .await?;
        let resolved = match fetched {
            Some(doc) => match TagRecord::from_document(&doc) {
                Ok(tag) => Some(tag),
                Err(err) => {
                    warn!(tag_id = %tag_id, error = %err, "skipping undecodable tag during export");
                    None
                }
            },
            None => {
                debug!(tag_id = %tag_id, "skipping dangling tag reference during export");
                None
            }
        };
        cache.insert(tag_id.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Properties owned by the workspace: the union of array-contains
    /// queries over its members, deduplicated by document id.
    async fn owned_property_docs(&self, workspace: &WorkspaceRecord) -> SyncResult<Vec<Document>> {
        let mut seen = HashSet::new();
        let mut docs = Vec::new();
        for member in &workspace.member_user_ids {
            let filter = QueryFilter::array_contains(FIELD_MEMBER_USER_IDS, member.as_str());
            for doc in self.store.query(COLLECTION_PROPERTIES, &filter).await? {
                if seen.insert(doc.id.clone()) {
                    docs.push(doc);
                }
            }
        }
        Ok(docs)
    }

    async fn load_workspace(&self, id: &WorkspaceId) -> SyncResult<WorkspaceRecord> {
        let Some(doc) = self
            .store
            .fetch(COLLECTION_WORKSPACES, &DocumentId::new(id.as_str()))
            .await?
        else {
            return Err(SyncError::workspace_not_found(id));
        };
        Ok(WorkspaceRecord::from_document(&doc)?)
    }
}

fn to_portable_listing(property: &PropertyRecord, tags: Vec<PortableTag>) -> PortableListing {
    PortableListing {
        title: property.title.clone(),
        location: property.location.clone(),
        link: property.link.clone(),
        agent_contact: property.agent_contact.clone(),
        price: property.price,
        size: property.size,
        bedrooms: property.bedrooms,
        bathrooms: property.bathrooms,
        kind: property.kind,
        rating: property.rating,
        tags,
    }
}

/// Export timestamps are accepted with or without a zone designator and with
/// or without sub-second fractions.
pub fn parse_export_date(raw: &str) -> SyncResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(parsed.and_utc());
    }
    Err(SyncError::validation(format!("unparseable export date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use chrono::Timelike;
    use hearth_core::document::FieldMap;
    use serde_json::json;

    fn service(store: DocumentStoreRef) -> MergeImportExportService {
        MergeImportExportService::new(store.clone(), MembershipWriteService::new(store))
    }

    fn listing(title: &str) -> PropertyInput {
        PropertyInput {
            title: title.to_owned(),
            ..PropertyInput::default()
        }
    }

    async fn owned_titles(store: &DocumentStoreRef, member: &str) -> Vec<String> {
        let filter = QueryFilter::array_contains(FIELD_MEMBER_USER_IDS, member);
        let mut titles: Vec<String> = store
            .query(COLLECTION_PROPERTIES, &filter)
            .await
            .expect("query")
            .iter()
            .filter_map(|doc| doc.string_field("title").map(str::to_owned))
            .collect();
        titles.sort();
        titles
    }

    #[test]
    fn export_dates_parse_with_and_without_fractions() {
        let plain = parse_export_date("2024-01-02T03:04:05Z").expect("zoned");
        let fractional = parse_export_date("2024-01-02T03:04:05.123456Z").expect("zoned fraction");
        let zoneless = parse_export_date("2024-01-02T03:04:05").expect("zoneless");
        let zoneless_fraction =
            parse_export_date("2024-01-02T03:04:05.123456").expect("zoneless fraction");

        assert_eq!(plain.second(), 5);
        assert_eq!(fractional.with_nanosecond(0), zoneless_fraction.with_nanosecond(0));
        assert_eq!(plain, zoneless);

        let err = parse_export_date("yesterday").expect_err("garbage date");
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn from_json_hard_fails_on_bad_dates_but_tolerates_old_versions() {
        let old_version = r#"{"version":"0.9","exportDate":"2024-01-02T03:04:05Z","listings":[]}"#;
        let doc = PortableExportDocument::from_json(old_version).expect("old version");
        assert_eq!(doc.version, "0.9");

        let bad_date = r#"{"version":"1.0","exportDate":"yesterday","listings":[]}"#;
        let err = PortableExportDocument::from_json(bad_date).expect_err("bad date");
        assert!(matches!(err, SyncError::Validation(_)));

        let not_json = "listings: none";
        let err = PortableExportDocument::from_json(not_json).expect_err("not json");
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn export_sorts_listings_and_inlines_tags() {
        let (_memory, store) = test_support::memory_store();
        let workspace = test_support::seed_workspace_record(&store, &["u1"]).await;
        let writes = MembershipWriteService::new(store.clone());

        let garden = writes
            .save_tag(None, &TagInput::new("garden", Rating::Positive), &workspace)
            .await
            .expect("tag");
        let mut villa = listing("Villa B");
        villa.tag_ids = vec![garden.clone()];
        writes
            .save_property(None, &villa, &workspace)
            .await
            .expect("property");
        writes
            .save_property(None, &listing("Apartment A"), &workspace)
            .await
            .expect("property");

        let exported = service(store).export(&workspace.id).await.expect("export");

        assert_eq!(exported.version, EXPORT_VERSION);
        parse_export_date(&exported.export_date).expect("export date");
        let titles: Vec<&str> = exported
            .listings
            .iter()
            .map(|listing| listing.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Apartment A", "Villa B"]);
        assert_eq!(
            exported.listings[1].tags,
            vec![PortableTag {
                name: "garden".to_owned(),
                rating: Rating::Positive,
            }]
        );
    }

    #[tokio::test]
    async fn export_skips_dangling_tag_references() {
        let (_memory, store) = test_support::memory_store();
        let workspace = test_support::seed_workspace_record(&store, &["u1"]).await;
        let writes = MembershipWriteService::new(store.clone());

        let mut orphaned = listing("Villa X");
        orphaned.tag_ids = vec![TagId::new("ghost")];
        writes
            .save_property(None, &orphaned, &workspace)
            .await
            .expect("property");

        let exported = service(store).export(&workspace.id).await.expect("export");
        assert_eq!(exported.listings.len(), 1);
        assert!(exported.listings[0].tags.is_empty());
    }

    #[tokio::test]
    async fn round_trip_moves_listings_between_workspaces() {
        let (_memory, store) = test_support::memory_store();
        let source = test_support::seed_workspace_record(&store, &["u1"]).await;
        let target = test_support::seed_workspace_record(&store, &["u2"]).await;
        let writes = MembershipWriteService::new(store.clone());

        let sea_view = writes
            .save_tag(None, &TagInput::new("sea view", Rating::Positive), &source)
            .await
            .expect("tag");
        let mut villa = listing("Villa B");
        villa.tag_ids = vec![sea_view];
        writes
            .save_property(None, &villa, &source)
            .await
            .expect("property");
        writes
            .save_property(None, &listing("Apartment A"), &source)
            .await
            .expect("property");

        let transfer = service(store.clone());
        let exported = transfer.export(&source.id).await.expect("export");
        let result = transfer
            .import(&exported, &target.id, false)
            .await
            .expect("import");

        assert_eq!(result.imported_count, 2);
        assert_eq!(result.skipped_count, 0);
        assert!(result.success);
        assert_eq!(
            owned_titles(&store, "u2").await,
            vec!["Apartment A".to_owned(), "Villa B".to_owned()]
        );

        // The shared tag name resolves to the one existing document, now
        // carrying both workspaces' members.
        let tags = store
            .query(
                COLLECTION_TAGS,
                &QueryFilter::field_equals(FIELD_NAME, "sea view"),
            )
            .await
            .expect("query");
        assert_eq!(tags.len(), 1);
        assert_eq!(
            tags[0].member_user_ids(),
            vec!["u1".to_owned(), "u2".to_owned()]
        );
    }

    #[tokio::test]
    async fn importing_two_listings_with_the_same_tag_creates_it_once() {
        let (_memory, store) = test_support::memory_store();
        let target = test_support::seed_workspace_record(&store, &["u1"]).await;

        let doc = PortableExportDocument {
            version: EXPORT_VERSION.to_owned(),
            export_date: "2024-01-02T03:04:05Z".to_owned(),
            listings: vec![
                PortableListing {
                    title: "Villa B".to_owned(),
                    tags: vec![PortableTag {
                        name: "garden".to_owned(),
                        rating: Rating::Positive,
                    }],
                    ..PortableListing::default()
                },
                PortableListing {
                    title: "Apartment A".to_owned(),
                    tags: vec![PortableTag {
                        name: "garden".to_owned(),
                        rating: Rating::Neutral,
                    }],
                    ..PortableListing::default()
                },
            ],
        };

        let result = service(store.clone())
            .import(&doc, &target.id, false)
            .await
            .expect("import");
        assert_eq!(result.imported_count, 2);

        let tags = store
            .query(
                COLLECTION_TAGS,
                &QueryFilter::field_equals(FIELD_NAME, "garden"),
            )
            .await
            .expect("query");
        assert_eq!(tags.len(), 1);
        let tag_id = tags[0].id.to_string();

        let properties = store
            .query(
                COLLECTION_PROPERTIES,
                &QueryFilter::array_contains(FIELD_MEMBER_USER_IDS, "u1"),
            )
            .await
            .expect("query");
        assert_eq!(properties.len(), 2);
        for doc in &properties {
            let record = PropertyRecord::from_document(doc).expect("decode");
            assert_eq!(record.tag_ids, vec![TagId::new(tag_id.as_str())]);
        }
    }

    #[tokio::test]
    async fn exported_villa_lands_in_the_second_workspace() {
        let (_memory, store) = test_support::memory_store();
        let first = test_support::seed_workspace_record(&store, &["u1"]).await;
        let second = test_support::seed_workspace_record(&store, &["u2"]).await;
        let writes = MembershipWriteService::new(store.clone());

        let mut villa = listing("Villa X");
        villa.price = 500_000.0;
        writes
            .save_property(None, &villa, &first)
            .await
            .expect("property");

        let transfer = service(store.clone());
        let exported = transfer.export(&first.id).await.expect("export");
        assert_eq!(exported.listings.len(), 1);
        assert_eq!(exported.listings[0].title, "Villa X");

        let result = transfer
            .import(&exported, &second.id, false)
            .await
            .expect("import");
        assert!(result.success);
        assert_eq!(result.imported_count, 1);
        assert_eq!(result.skipped_count, 0);

        let landed = store
            .query(
                COLLECTION_PROPERTIES,
                &QueryFilter::array_contains(FIELD_MEMBER_USER_IDS, "u2"),
            )
            .await
            .expect("query");
        assert_eq!(landed.len(), 1);
        let record = PropertyRecord::from_document(&landed[0]).expect("decode");
        assert_eq!(record.title, "Villa X");
        assert_eq!(record.price, 500_000.0);
    }

    #[tokio::test]
    async fn replace_existing_clears_the_previous_listings() {
        let (_memory, store) = test_support::memory_store();
        let target = test_support::seed_workspace_record(&store, &["u1"]).await;
        let writes = MembershipWriteService::new(store.clone());
        writes
            .save_property(None, &listing("Old Cabin"), &target)
            .await
            .expect("property");

        let doc = PortableExportDocument {
            version: EXPORT_VERSION.to_owned(),
            export_date: "2024-01-02T03:04:05Z".to_owned(),
            listings: vec![PortableListing {
                title: "New Villa".to_owned(),
                ..PortableListing::default()
            }],
        };
        let result = service(store.clone())
            .import(&doc, &target.id, true)
            .await
            .expect("import");

        assert_eq!(result.imported_count, 1);
        assert_eq!(owned_titles(&store, "u1").await, vec!["New Villa".to_owned()]);
    }

    #[tokio::test]
    async fn failed_listings_are_reported_without_aborting_the_rest() {
        let (memory, store) = test_support::memory_store();
        let target = test_support::seed_workspace_record(&store, &["u2"]).await;

        // A tag the first listing reuses; extending its membership to the
        // target needs a commit, which is made to fail.
        let mut fields = FieldMap::new();
        fields.insert("name".to_owned(), json!("garden"));
        fields.insert("rating".to_owned(), json!("neutral"));
        fields.insert(FIELD_MEMBER_USER_IDS.to_owned(), json!(["u9"]));
        store
            .insert(COLLECTION_TAGS, fields)
            .await
            .expect("seed tag");

        let doc = PortableExportDocument {
            version: EXPORT_VERSION.to_owned(),
            export_date: "2024-01-02T03:04:05Z".to_owned(),
            listings: vec![
                PortableListing {
                    title: "Villa X".to_owned(),
                    tags: vec![PortableTag {
                        name: "garden".to_owned(),
                        rating: Rating::Neutral,
                    }],
                    ..PortableListing::default()
                },
                PortableListing {
                    title: "Valid Villa".to_owned(),
                    ..PortableListing::default()
                },
            ],
        };

        memory.fail_next_commit_after(0);
        let result = service(store.clone())
            .import(&doc, &target.id, false)
            .await
            .expect("import");

        assert!(!result.success);
        assert_eq!(result.imported_count, 1);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Villa X:"));
        assert_eq!(owned_titles(&store, "u2").await, vec!["Valid Villa".to_owned()]);
    }

    #[tokio::test]
    async fn titleless_listings_import_with_defaults() {
        let (_memory, store) = test_support::memory_store();
        let target = test_support::seed_workspace_record(&store, &["u2"]).await;

        // A listing with no title is valid wire input; the scalar defaults.
        let raw =
            r#"{"version":"1.0","exportDate":"2024-01-02T03:04:05Z","listings":[{"price":1200.0,"bedrooms":2}]}"#;
        let doc = PortableExportDocument::from_json(raw).expect("parse");
        let result = service(store.clone())
            .import(&doc, &target.id, false)
            .await
            .expect("import");

        assert!(result.success);
        assert_eq!(result.imported_count, 1);
        assert_eq!(result.skipped_count, 0);

        let landed = store
            .query(
                COLLECTION_PROPERTIES,
                &QueryFilter::array_contains(FIELD_MEMBER_USER_IDS, "u2"),
            )
            .await
            .expect("query");
        assert_eq!(landed.len(), 1);
        let record = PropertyRecord::from_document(&landed[0]).expect("decode");
        assert_eq!(record.title, "");
        assert_eq!(record.price, 1200.0);
        assert_eq!(record.bedrooms, 2);
    }

    #[tokio::test]
    async fn importing_into_a_missing_workspace_fails() {
        let (_memory, store) = test_support::memory_store();
        let doc = PortableExportDocument {
            version: EXPORT_VERSION.to_owned(),
            export_date: "2024-01-02T03:04:05Z".to_owned(),
            listings: Vec::new(),
        };

        let err = service(store)
            .import(&doc, &WorkspaceId::new("ghost"), false)
            .await
            .expect_err("missing workspace");
        assert!(matches!(err, SyncError::NotFound { kind: "workspace", .. }));
    }

    #[tokio::test]
    async fn portable_documents_round_trip_through_json() {
        let doc = PortableExportDocument {
            version: EXPORT_VERSION.to_owned(),
            export_date: "2024-01-02T03:04:05Z".to_owned(),
            listings: vec![PortableListing {
                title: "Villa X".to_owned(),
                price: 500_000.0,
                kind: PropertyKind::House,
                tags: vec![PortableTag {
                    name: "garden".to_owned(),
                    rating: Rating::Positive,
                }],
                ..PortableListing::default()
            }],
        };

        let json = doc.to_json_pretty().expect("serialize");
        assert!(json.contains("\"exportDate\""));
        assert!(json.contains("\"type\": \"house\""));
        let parsed = PortableExportDocument::from_json(&json).expect("parse");
        assert_eq!(parsed, doc);
    }
}
