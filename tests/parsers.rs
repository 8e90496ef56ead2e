//! Parser integration tests, per spec §8's concrete scenarios 1 and 2.

use crawlcore::parsers::{FeedParser, HtmlParser, Parser};

#[tokio::test]
async fn html_scenario_title_and_welcome_text() {
    // Spec §8 scenario 1.
    let html = br#"<html><head><title>Test Page</title></head>
        <body><article>Welcome to our site, glad to have you here.</article></body></html>"#;

    let parser = HtmlParser;
    let results = parser.parse(html, "https://example.com/").await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title.as_deref(), Some("Test Page"));
    assert!(results[0].cleaned_text.contains("Welcome"));
}

#[tokio::test]
async fn rss_scenario_two_items_yield_two_results() {
    // Spec §8 scenario 2.
    let rss = br#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
<item><title>First</title><link>https://example.com/1</link><description>one</description></item>
<item><title>Second</title><link>https://example.com/2</link><description>two</description></item>
</channel></rss>"#;

    let parser = FeedParser;
    let results = parser.parse(rss, "https://example.com/feed").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title.as_deref(), Some("First"));
    assert_eq!(results[1].title.as_deref(), Some("Second"));
}
