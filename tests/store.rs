//! Store integration tests, per spec §4.7/§8's concrete scenarios.

use crawlcore::model::{ContentType, CrawlConfig, Document, DocumentMetadata, Project, SearchQuery, Source, SourceType};
use crawlcore::Store;

fn doc(url: &str, source_id: &str, text: &str) -> Document {
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
fn search_for_python_with_and_returns_only_matching_documents() {
    // Spec §8 scenario 5.
    let store = Store::new();
    store.insert_document(doc("https://x.test/a", "s1", "python is a great language")).unwrap();
    store.insert_document(doc("https://x.test/b", "s1", "python powers many servers")).unwrap();
    store.insert_document(doc("https://x.test/c", "s1", "completely unrelated content")).unwrap();

    let results = store.search(&SearchQuery::new("python")).unwrap();

    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.snippet.to_lowercase().contains("python"));
    }
}

#[test]
fn deleting_project_removes_its_sources_and_documents() {
    // Spec §8 scenario 6.
    let store = Store::new();
    let project = Project::new("Research", "example.com");

    let mut s1 = Source::new("S1", "https://x.test/s1", SourceType::Website, ContentType::Html).unwrap();
    s1.project_id = Some(project.id.clone());
    let mut s2 = Source::new("S2", "https://x.test/s2", SourceType::Website, ContentType::Html).unwrap();
    s2.project_id = Some(project.id.clone());
    let (s1_id, s2_id) = (s1.id.clone(), s2.id.clone());

    store.insert_project(project.clone()).unwrap();
    store.insert_source(s1).unwrap();
    store.insert_source(s2).unwrap();
    store.insert_document(doc("https://x.test/s1", &s1_id, "doc one")).unwrap();
    store.insert_document(doc("https://x.test/s2", &s2_id, "doc two")).unwrap();

    store.delete_project(&project.id).unwrap();

    assert!(store.get_source(&s1_id).is_err());
    assert!(store.get_source(&s2_id).is_err());
    assert_eq!(store.count_documents(Some(&s1_id)), 0);
    assert_eq!(store.count_documents(Some(&s2_id)), 0);
}

#[test]
fn document_uniqueness_is_per_url_and_source() {
    let store = Store::new();
    let first = doc("https://x.test/a", "s1", "hello world");
    let second_source_same_url = doc("https://x.test/a", "s2", "hello world again");
    let duplicate = Document { id: "another-id".to_string(), ..first.clone() };

    assert!(store.insert_document(first).unwrap().is_some());
    assert!(store.insert_document(second_source_same_url).unwrap().is_some());
    assert!(store.insert_document(duplicate).unwrap().is_none());
    assert_eq!(store.count_documents(None), 2);
}

#[test]
fn global_stats_report_totals_and_top_sources() {
    let store = Store::new();
    let source = Source::new("S1", "https://x.test/s1", SourceType::Website, ContentType::Html).unwrap();
    let source_id = source.id.clone();
    store.insert_source(source).unwrap();
    store.insert_document(doc("https://x.test/a", &source_id, "one")).unwrap();
    store.insert_document(doc("https://x.test/b", &source_id, "two")).unwrap();

    let stats = store.global_stats();

    assert_eq!(stats.total_sources, 1);
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.top_sources_by_document_count[0], (source_id, 2));
}
