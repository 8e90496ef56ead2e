//! Search engine, per spec §4.7's "Search"/"Boolean mode" bullets and the
//! data-flow note in §2 ("the Search engine reads from the Store"). A thin
//! façade over [`Store`]'s index so query construction and the Store's
//! persistence concerns stay decoupled, in the spirit of
//! `koumoutsas-search_engine`'s `Reader`/`Writer` trait split (this crate's
//! Store plays both roles; this module is the `Reader` side).

use std::sync::Arc;

use crate::error::CoreError;
use crate::model::{ContentType, SearchQuery, SearchResult};
use crate::store::Store;

pub struct SearchEngine {
    store: Arc<Store>,
}

impl SearchEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Translates a query (terms, filters, boolean mode) into an index
    /// lookup and returns ranked, paginated, snippeted results, per spec
    /// §4.7.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, CoreError> {
        self.store.search(query)
    }

    /// Convenience builder for the common case: plain keyword search with
    /// AND semantics and default pagination.
    pub fn search_keywords(&self, keywords: &str) -> Result<Vec<SearchResult>, CoreError> {
        self.search(&SearchQuery::new(keywords))
    }

    /// As [`Self::search`], but rewrites the query with `OR` semantics
    /// between terms, per spec §4.7's "Boolean mode" bullet.
    pub fn search_any_term(&self, keywords: &str) -> Result<Vec<SearchResult>, CoreError> {
        let mut query = SearchQuery::new(keywords);
        query.boolean_or = true;
        self.search(&query)
    }

    pub fn search_within_source(&self, keywords: &str, source_id: impl Into<String>) -> Result<Vec<SearchResult>, CoreError> {
        let mut query = SearchQuery::new(keywords);
        query.source_id = Some(source_id.into());
        self.search(&query)
    }

    pub fn search_by_content_type(&self, keywords: &str, content_type: ContentType) -> Result<Vec<SearchResult>, CoreError> {
        let mut query = SearchQuery::new(keywords);
        query.content_type = Some(content_type);
        self.search(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType as CT, CrawlConfig, Document, DocumentMetadata};

    fn doc(url: &str, source_id: &str, text: &str, content_type: CT) -> Document {
        Document::new(
            url,
            source_id.to_string(),
            content_type,
            text.to_string(),
            text.to_string(),
            DocumentMetadata::default(),
            CrawlConfig::default(),
        )
    }

    #[test]
    fn and_mode_requires_all_terms_present_in_index_query() {
        let store = Arc::new(Store::new());
        store.insert_document(doc("https://x.test/a", "s1", "python programming language", CT::Html)).unwrap();
        store.insert_document(doc("https://x.test/b", "s1", "python only", CT::Html)).unwrap();
        let engine = SearchEngine::new(store);

        let results = engine.search_keywords("python programming").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://x.test/a");
    }

    #[test]
    fn or_mode_matches_either_term() {
        let store = Arc::new(Store::new());
        store.insert_document(doc("https://x.test/a", "s1", "rust systems programming", CT::Html)).unwrap();
        store.insert_document(doc("https://x.test/b", "s1", "python scripting", CT::Html)).unwrap();
        let engine = SearchEngine::new(store);

        let results = engine.search_any_term("rust python").unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn content_type_filter_excludes_non_matching_documents() {
        let store = Arc::new(Store::new());
        store.insert_document(doc("https://x.test/a", "s1", "python article", CT::Html)).unwrap();
        store.insert_document(doc("https://x.test/b.pdf", "s1", "python manual", CT::Pdf)).unwrap();
        let engine = SearchEngine::new(store);

        let results = engine.search_by_content_type("python", CT::Pdf).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://x.test/b.pdf");
    }
}
