//! Store, per spec §4.7. Persists Projects, Sources, Documents and
//! CrawlStats with the uniqueness/indexing guarantees of §3/§4.7, and
//! maintains a `tantivy` inverted index over `cleaned_text`, grounded on
//! `koumoutsas-search_engine`'s `SearchEngine` (schema, writer-behind-mutex,
//! `ReloadPolicy::OnCommit` reader).
//!
//! Backed by in-memory maps rather than MongoDB: spec §6 names Mongo
//! collections as the persisted layout (`projects`, `sources`, `documents`,
//! `crawl_stats`) but the wire format, not the backing engine, is what
//! external collaborators depend on, and this crate's scope (§1) excludes
//! the persistence driver itself.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Schema, FAST, STORED, STRING, TEXT};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tempfile::TempDir;

use crate::error::CoreError;
use crate::model::{
    ContentType, CrawlStats, Document, GlobalStats, Id, Project, SearchQuery, SearchResult, Source,
    SourceStatus,
};

const SNIPPET_MAX_LENGTH: usize = 200;

struct TextIndex {
    _index_dir: TempDir,
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    doc_id_field: tantivy::schema::Field,
    body_field: tantivy::schema::Field,
    crawled_at_field: tantivy::schema::Field,
}

impl TextIndex {
    fn new() -> Self {
        let index_dir = TempDir::new().expect("unable to create tantivy index dir");
        let mut schema_builder = Schema::builder();
        let doc_id_field = schema_builder.add_text_field("doc_id", STRING | STORED);
        let body_field = schema_builder.add_text_field("body", TEXT);
        let crawled_at_field = schema_builder.add_i64_field("crawled_at", FAST | STORED);
        let schema = schema_builder.build();

        let index = Index::create_in_dir(&index_dir, schema).expect("unable to create tantivy index");
        let writer = index.writer(50_000_000).expect("unable to create tantivy writer");
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommit)
            .try_into()
            .expect("unable to create tantivy reader");

        Self { _index_dir: index_dir, index, writer: Mutex::new(writer), reader, doc_id_field, body_field, crawled_at_field }
    }

    fn index_document(&self, doc_id: &str, cleaned_text: &str, crawled_at: chrono::DateTime<Utc>) {
        let mut guard = self.writer.lock().unwrap();
        let _ = guard.add_document(tantivy::doc!(
            self.doc_id_field => doc_id,
            self.body_field => cleaned_text,
            self.crawled_at_field => crawled_at.timestamp(),
        ));
        let _ = guard.commit();
    }

    /// Returns `(doc_id, score)` pairs ranked by text score, per spec §4.7.
    /// `boolean_or` rewrites the query by joining terms with `OR`.
    fn search(&self, keywords: &str, boolean_or: bool, limit: usize) -> Result<Vec<(String, f32)>, CoreError> {
        let searcher = self.reader.searcher();
        let mut query_parser = QueryParser::for_index(&self.index, vec![self.body_field]);

        let query_text = if boolean_or {
            keywords.split_whitespace().collect::<Vec<_>>().join(" OR ")
        } else {
            query_parser.set_conjunction_by_default();
            keywords.to_string()
        };

        let query = query_parser
            .parse_query(&query_text)
            .map_err(|e| CoreError::storage_error(format!("invalid search query: {e}")))?;

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| CoreError::storage_error(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let retrieved: TantivyDocument =
                searcher.doc(address).map_err(|e| CoreError::storage_error(e.to_string()))?;
            if let Some(doc_id) = retrieved.get_first(self.doc_id_field).and_then(|v| v.as_str()) {
                results.push((doc_id.to_string(), score));
            }
        }
        Ok(results)
    }
}

/// In-process store, per spec §4.7. All maps are guarded independently;
/// callers needing cross-entity consistency (e.g. project deletion cascading
/// to sources and documents) must rely on the helper methods below rather
/// than raw map access.
pub struct Store {
    projects: RwLock<HashMap<Id, Project>>,
    sources: RwLock<HashMap<Id, Source>>,
    documents: RwLock<HashMap<Id, Document>>,
    crawl_stats: RwLock<HashMap<Id, CrawlStats>>,
    text_index: TextIndex,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            sources: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            crawl_stats: RwLock::new(HashMap::new()),
            text_index: TextIndex::new(),
        }
    }

    // --- Projects -----------------------------------------------------

    pub fn insert_project(&self, project: Project) -> Result<(), CoreError> {
        self.projects.write().unwrap().insert(project.id.clone(), project);
        Ok(())
    }

    pub fn get_project(&self, id: &str) -> Result<Project, CoreError> {
        self.projects
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("project {id}")))
    }

    /// Deletes a Project and cascades to its Sources and their Documents
    /// and CrawlStats, per spec §3's ownership rule.
    pub fn delete_project(&self, id: &str) -> Result<(), CoreError> {
        self.projects
            .write()
            .unwrap()
            .remove(id)
            .ok_or_else(|| CoreError::not_found(format!("project {id}")))?;

        let owned_source_ids: Vec<Id> = self
            .sources
            .read()
            .unwrap()
            .values()
            .filter(|s| s.project_id.as_deref() == Some(id))
            .map(|s| s.id.clone())
            .collect();

        for source_id in owned_source_ids {
            self.delete_source(&source_id)?;
        }
        Ok(())
    }

    // --- Sources --------------------------------------------------------

    /// Enforces `sources.url` uniqueness, per spec §4.7.
    pub fn insert_source(&self, source: Source) -> Result<(), CoreError> {
        let mut sources = self.sources.write().unwrap();
        if sources.values().any(|s| s.url == source.url) {
            return Err(CoreError::duplicate_source(source.url));
        }
        sources.insert(source.id.clone(), source);
        Ok(())
    }

    pub fn get_source(&self, id: &str) -> Result<Source, CoreError> {
        self.sources
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("source {id}")))
    }

    pub fn update_source(&self, source: Source) -> Result<(), CoreError> {
        let mut sources = self.sources.write().unwrap();
        if !sources.contains_key(&source.id) {
            return Err(CoreError::not_found(format!("source {}", source.id)));
        }
        sources.insert(source.id.clone(), source);
        Ok(())
    }

    pub fn delete_source(&self, id: &str) -> Result<(), CoreError> {
        self.sources
            .write()
            .unwrap()
            .remove(id)
            .ok_or_else(|| CoreError::not_found(format!("source {id}")))?;

        let owned_doc_ids: Vec<Id> = self
            .documents
            .read()
            .unwrap()
            .values()
            .filter(|d| d.source_id == id)
            .map(|d| d.id.clone())
            .collect();
        let mut documents = self.documents.write().unwrap();
        for doc_id in owned_doc_ids {
            documents.remove(&doc_id);
        }

        let mut crawl_stats = self.crawl_stats.write().unwrap();
        crawl_stats.retain(|_, stats| stats.source_id != id);
        Ok(())
    }

    /// Sources by `status` index, per spec §4.7.
    pub fn sources_by_status(&self, status: SourceStatus) -> Vec<Source> {
        self.sources.read().unwrap().values().filter(|s| s.status == status).cloned().collect()
    }

    /// Sources ordered by `created_at desc`, per spec §4.7.
    pub fn list_sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.sources.read().unwrap().values().cloned().collect();
        sources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sources
    }

    /// Reconciles sources stuck `running` from a crashed process, per spec
    /// §9's startup-sweep design note.
    pub fn reconcile_stale_running(&self) -> usize {
        let mut sources = self.sources.write().unwrap();
        let mut reconciled = 0;
        for source in sources.values_mut() {
            if source.status == SourceStatus::Running {
                source.status = SourceStatus::Failed;
                source.last_error = Some("reconciled: process restarted mid-run".to_string());
                source.updated_at = Utc::now();
                reconciled += 1;
            }
        }
        reconciled
    }

    // --- Documents --------------------------------------------------------

    /// Enforces `(url, source_id)` uniqueness, per spec §3/§4.7. A duplicate
    /// is a no-op, not an error: returns `Ok(None)`.
    pub fn insert_document(&self, document: Document) -> Result<Option<Id>, CoreError> {
        let mut documents = self.documents.write().unwrap();
        let duplicate = documents
            .values()
            .any(|d| d.url == document.url && d.source_id == document.source_id);
        if duplicate {
            return Ok(None);
        }

        self.text_index.index_document(&document.id, &document.cleaned_text, document.crawled_at);
        let id = document.id.clone();
        documents.insert(id.clone(), document);
        Ok(Some(id))
    }

    pub fn get_document(&self, id: &str) -> Result<Document, CoreError> {
        self.documents
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("document {id}")))
    }

    /// Documents by `source_id`, `crawled_at desc`, optional `content_type`
    /// filter, per spec §4.7.
    pub fn documents_for_source(&self, source_id: &str, content_type: Option<ContentType>) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .read()
            .unwrap()
            .values()
            .filter(|d| d.source_id == source_id)
            .filter(|d| content_type.is_none_or(|ct| d.content_type == ct))
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.crawled_at.cmp(&a.crawled_at));
        docs
    }

    pub fn count_documents(&self, source_id: Option<&str>) -> usize {
        let documents = self.documents.read().unwrap();
        match source_id {
            Some(id) => documents.values().filter(|d| d.source_id == id).count(),
            None => documents.len(),
        }
    }

    // --- CrawlStats -------------------------------------------------------

    pub fn save_crawl_stats(&self, stats: CrawlStats) -> Result<(), CoreError> {
        self.crawl_stats.write().unwrap().insert(stats.id.clone(), stats);
        Ok(())
    }

    /// CrawlStats by `(source_id, started_at desc)`, per spec §4.7.
    pub fn get_source_stats(&self, source_id: &str) -> Vec<CrawlStats> {
        let mut stats: Vec<CrawlStats> = self
            .crawl_stats
            .read()
            .unwrap()
            .values()
            .filter(|s| s.source_id == source_id)
            .cloned()
            .collect();
        stats.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        stats
    }

    // --- Search -------------------------------------------------------

    /// `search(query) -> [SearchResult]`, per spec §4.7. Ranks by the
    /// index's text score, applies source/content-type/date filters, and
    /// paginates with `limit`/`offset`.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, CoreError> {
        // Over-fetch before filtering/pagination since the index has no
        // knowledge of source_id/content_type/date filters.
        let candidate_limit = (query.limit + query.offset).max(query.limit) * 4 + 50;
        let hits = self.text_index.search(&query.keywords, query.boolean_or, candidate_limit)?;

        let documents = self.documents.read().unwrap();
        let mut results = Vec::new();
        for (doc_id, score) in hits {
            let Some(document) = documents.get(&doc_id) else { continue };

            if let Some(source_id) = &query.source_id {
                if &document.source_id != source_id {
                    continue;
                }
            }
            if let Some(content_type) = query.content_type {
                if document.content_type != content_type {
                    continue;
                }
            }
            if let Some(from) = query.date_from {
                if document.crawled_at < from {
                    continue;
                }
            }
            if let Some(to) = query.date_to {
                if document.crawled_at > to {
                    continue;
                }
            }

            let snippet = build_snippet(&document.cleaned_text, &query.keywords, SNIPPET_MAX_LENGTH);
            results.push(SearchResult {
                document_id: document.id.clone(),
                url: document.url.clone(),
                source_id: document.source_id.clone(),
                title: document.metadata.title.clone(),
                score,
                snippet,
            });
        }

        Ok(results.into_iter().skip(query.offset).take(query.limit).collect())
    }

    // --- Aggregates -------------------------------------------------------

    /// Global stats, per spec §4.7: total sources, total documents, counts
    /// per content_type, top 10 sources by document count.
    pub fn global_stats(&self) -> GlobalStats {
        let sources = self.sources.read().unwrap();
        let documents = self.documents.read().unwrap();

        let mut by_content_type: HashMap<ContentType, usize> = HashMap::new();
        let mut by_source: HashMap<Id, u64> = HashMap::new();
        for document in documents.values() {
            *by_content_type.entry(document.content_type).or_insert(0) += 1;
            *by_source.entry(document.source_id.clone()).or_insert(0) += 1;
        }

        let mut top_sources: Vec<(Id, u64)> = by_source.into_iter().collect();
        top_sources.sort_by(|a, b| b.1.cmp(&a.1));
        top_sources.truncate(10);

        GlobalStats {
            total_sources: sources.len(),
            total_documents: documents.len(),
            documents_by_content_type: by_content_type,
            top_sources_by_document_count: top_sources,
        }
    }
}

/// Snippet generation, per spec §4.7/GLOSSARY: locate the earliest
/// occurrence of any query term (case-insensitive), extract a window of
/// `max_length` chars centred on it, ellipsising if truncated. Falls back
/// to the head of the text when no term is found.
fn build_snippet(cleaned_text: &str, keywords: &str, max_length: usize) -> String {
    let lower_text = cleaned_text.to_lowercase();
    let terms: Vec<String> = keywords.split_whitespace().map(|t| t.to_lowercase()).collect();

    let earliest = terms
        .iter()
        .filter_map(|term| lower_text.find(term.as_str()))
        .min();

    let Some(position) = earliest else {
        return truncate_with_ellipsis(cleaned_text, max_length, false);
    };

    let half = max_length / 2;
    let start = position.saturating_sub(half);
    let end = (position + half).min(cleaned_text.len());

    let start = char_boundary_at_or_after(cleaned_text, start);
    let end = char_boundary_at_or_before(cleaned_text, end);

    let window = &cleaned_text[start..end];
    let prefix = if start > 0 { "…" } else { "" };
    let suffix = if end < cleaned_text.len() { "…" } else { "" };
    format!("{prefix}{window}{suffix}")
}

fn truncate_with_ellipsis(text: &str, max_length: usize, _force: bool) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }
    let end = char_boundary_at_or_before(text, max_length);
    format!("{}…", &text[..end])
}

fn char_boundary_at_or_after(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

fn char_boundary_at_or_before(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType, CrawlConfig, DocumentMetadata, SourceType};

    fn sample_document(url: &str, source_id: &str, text: &str) -> Document {
        Document::new(
            url,
            source_id.to_string(),
            ContentType::Html,
            text.to_string(),
            text.to_string(),
            DocumentMetadata::default(),
            CrawlConfig::default(),
        )
    }

    #[test]
    fn duplicate_document_insert_is_a_noop() {
        let store = Store::new();
        let doc = sample_document("https://x.test/a", "s1", "python is great");
        let doc_copy = Document { id: "different-id".to_string(), ..doc.clone() };

        assert!(store.insert_document(doc).unwrap().is_some());
        assert!(store.insert_document(doc_copy).unwrap().is_none());
        assert_eq!(store.count_documents(None), 1);
    }

    #[test]
    fn source_url_uniqueness_enforced() {
        let store = Store::new();
        let source = Source::new("Site", "https://x.test", SourceType::Website, ContentType::Html).unwrap();
        let duplicate = Source::new("Site 2", "https://x.test", SourceType::Website, ContentType::Html).unwrap();

        store.insert_source(source).unwrap();
        assert!(store.insert_source(duplicate).is_err());
    }

    #[test]
    fn deleting_project_cascades_to_sources_and_documents() {
        let store = Store::new();
        let project = Project::new("Proj", "example.com");
        let mut source = Source::new("Site", "https://x.test/a", SourceType::Website, ContentType::Html).unwrap();
        source.project_id = Some(project.id.clone());
        let source_id = source.id.clone();

        store.insert_project(project.clone()).unwrap();
        store.insert_source(source).unwrap();
        store.insert_document(sample_document("https://x.test/a", &source_id, "hello")).unwrap();

        store.delete_project(&project.id).unwrap();

        assert!(store.get_source(&source_id).is_err());
        assert_eq!(store.count_documents(Some(&source_id)), 0);
    }

    #[test]
    fn search_finds_documents_containing_term() {
        let store = Store::new();
        store.insert_document(sample_document("https://x.test/a", "s1", "python is a great language")).unwrap();
        store.insert_document(sample_document("https://x.test/b", "s1", "rust is also great")).unwrap();
        store.insert_document(sample_document("https://x.test/c", "s1", "totally unrelated text")).unwrap();

        let query = SearchQuery::new("python");
        let results = store.search(&query).unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].snippet.to_lowercase().contains("python"));
    }

    #[test]
    fn default_search_is_conjunctive_while_boolean_or_is_disjunctive() {
        let store = Store::new();
        store.insert_document(sample_document("https://x.test/a", "s1", "rust and python both")).unwrap();
        store.insert_document(sample_document("https://x.test/b", "s1", "only rust here")).unwrap();
        store.insert_document(sample_document("https://x.test/c", "s1", "only python here")).unwrap();

        let mut query = SearchQuery::new("rust python");
        query.boolean_or = false;
        let and_results = store.search(&query).unwrap();
        assert_eq!(and_results.len(), 1);
        assert_eq!(and_results[0].url, "https://x.test/a");

        query.boolean_or = true;
        let or_results = store.search(&query).unwrap();
        assert_eq!(or_results.len(), 3);
    }

    #[test]
    fn snippet_falls_back_to_head_when_term_absent() {
        let snippet = build_snippet("some unrelated passage of text", "python", 200);
        assert_eq!(snippet, "some unrelated passage of text");
    }

    #[test]
    fn reconcile_stale_running_transitions_to_failed() {
        let store = Store::new();
        let mut source = Source::new("Site", "https://x.test", SourceType::Website, ContentType::Html).unwrap();
        source.status = SourceStatus::Running;
        let id = source.id.clone();
        store.insert_source(source).unwrap();

        let count = store.reconcile_stale_running();
        assert_eq!(count, 1);
        assert_eq!(store.get_source(&id).unwrap().status, SourceStatus::Failed);
    }
}
