//! Text cleaner / keyword extractor, per spec §4.4: a regex-based cleaning
//! pass plus a frequency/TF-IDF/RAKE/bigram weighted keyword ranking.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

const FREQUENCY_WEIGHT: f64 = 1.0;
const TFIDF_WEIGHT: f64 = 2.0 * 100.0;
const RAKE_WEIGHT: f64 = 1.5;
const BIGRAM_WEIGHT: f64 = 1.2;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s.,!?;:\-']").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static EXCESS_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.,!?;:]{2,}").unwrap());
static WORD_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-zA-Z]+\b").unwrap());

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // English
        "the", "is", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "up", "down", "about", "over", "under", "which", "that", "this", "these",
        "those", "them", "they", "their", "there", "where", "when", "why", "how", "what", "who",
        "whom", "it", "its", "be", "been", "being", "am", "are", "was", "were", "will", "would",
        "should", "could", "can", "may", "might", "must", "have", "has", "had", "do", "does",
        "did", "done", "doing", "a", "an", "as", "if", "than", "then", "so", "such", "out",
        "into", "not", "only", "own", "same", "just",
        // French
        "le", "la", "les", "un", "une", "des", "de", "du", "au", "aux", "ce", "se", "ces", "ses",
        "son", "sa", "leur", "leurs", "mon", "ma", "ton", "ta", "mes", "tes", "notre", "votre",
        "nos", "vos", "il", "elle", "ils", "elles", "on", "nous", "vous", "je", "tu", "et", "ou",
        "mais", "donc", "car", "ni", "que", "qui", "quoi", "dont", "comment", "pourquoi", "quand",
        "combien", "dans", "sur", "sous", "avec", "sans", "pour", "par", "en", "etre", "avoir",
        "faire", "dire", "aller", "voir", "savoir", "pouvoir", "vouloir", "devoir", "falloir",
        "mettre", "prendre",
        // Web noise
        "wa", "http", "https", "www", "com", "org", "net", "html",
    ]
    .into_iter()
    .collect()
});

/// `clean(text) -> text`, per spec §4.4: strip HTML remnants, URLs, emails;
/// replace non-word/non-basic-punctuation characters with spaces; collapse
/// whitespace; collapse runs of punctuation to a period.
pub fn clean(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");
    let text = URL_PATTERN.replace_all(&text, "");
    let text = EMAIL_PATTERN.replace_all(&text, "");
    let text = NON_WORD.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = EXCESS_PUNCTUATION.replace_all(&text, ".");
    text.trim().to_string()
}

fn is_valid_word(word: &str, min_length: usize) -> bool {
    word.graphemes(true).count() >= min_length
        && !STOPWORDS.contains(word)
        && word.chars().all(|c| c.is_ascii_alphabetic())
}

fn tokenize(text: &str) -> Vec<String> {
    WORD_TOKEN.find_iter(&text.to_lowercase()).map(|m| m.as_str().to_string()).collect()
}

fn filtered_tokens(text: &str) -> Vec<String> {
    tokenize(text).into_iter().filter(|w| is_valid_word(w, 3)).collect()
}

/// Frequency strategy: lowercase tokens of >=3 alphabetic characters, not a
/// stopword. No lemmatiser is wired in, so tokens pass through unchanged
/// (one of the "optional NLP dependencies" spec §9 allows dropping).
fn frequency_scores(text: &str) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in filtered_tokens(text) {
        *counts.entry(token).or_insert(0.0) += 1.0;
    }
    counts
}

/// Bigram strategy: frequency-ranked collocations of filtered tokens.
fn bigram_scores(text: &str) -> HashMap<String, f64> {
    let tokens = filtered_tokens(text);
    let mut counts: HashMap<String, f64> = HashMap::new();
    for pair in tokens.windows(2) {
        let phrase = format!("{} {}", pair[0], pair[1]);
        *counts.entry(phrase).or_insert(0.0) += 1.0;
    }
    counts
}

/// TF-IDF strategy over the supplied document corpus. `min_df=2, max_df=0.8`,
/// unigrams and bigrams. Requires at least 2 documents to compute a document
/// frequency; returns empty when the corpus is too small to support it,
/// which is the "supporting resource" spec §4.4/§9 says may be unavailable.
fn tfidf_scores(text: &str, documents: &[String]) -> HashMap<String, f64> {
    if documents.len() < 2 {
        return HashMap::new();
    }

    let doc_tokens: Vec<Vec<String>> = documents
        .iter()
        .map(|d| {
            let unigrams = filtered_tokens(d);
            let mut terms = unigrams.clone();
            terms.extend(unigrams.windows(2).map(|p| format!("{} {}", p[0], p[1])));
            terms
        })
        .collect();

    let n_docs = doc_tokens.len() as f64;
    let max_df = 0.8;
    let min_df = 2usize;

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for terms in &doc_tokens {
        let unique: HashSet<&str> = terms.iter().map(|s| s.as_str()).collect();
        for term in unique {
            *doc_freq.entry(term).or_insert(0) += 1;
        }
    }

    let this_unigrams = filtered_tokens(text);
    let mut this_terms = this_unigrams.clone();
    this_terms.extend(this_unigrams.windows(2).map(|p| format!("{} {}", p[0], p[1])));

    let mut term_counts: HashMap<String, f64> = HashMap::new();
    for term in &this_terms {
        *term_counts.entry(term.clone()).or_insert(0.0) += 1.0;
    }
    let total_terms = this_terms.len().max(1) as f64;

    let mut scores = HashMap::new();
    for (term, count) in term_counts {
        let df = *doc_freq.get(term.as_str()).unwrap_or(&0);
        if df < min_df || (df as f64 / n_docs) > max_df {
            continue;
        }
        let tf = count / total_terms;
        let idf = (n_docs / df as f64).ln() + 1.0;
        scores.insert(term, tf * idf);
    }
    scores
}

/// RAKE strategy: ranks 1-3 word phrases by a word-degree/word-frequency
/// score, the way RAKE splits on stopwords/punctuation to form candidate
/// phrases and scores each word by `degree(word) / frequency(word)`.
fn rake_scores(text: &str) -> HashMap<String, f64> {
    let lower = text.to_lowercase();
    let phrases: Vec<Vec<String>> = lower
        .split(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .fold(vec![Vec::new()], |mut acc, tok| {
            if tok.is_empty() || STOPWORDS.contains(tok) || !tok.chars().all(|c| c.is_ascii_alphabetic()) {
                if !acc.last().unwrap().is_empty() {
                    acc.push(Vec::new());
                }
            } else {
                acc.last_mut().unwrap().push(tok.to_string());
            }
            acc
        })
        .into_iter()
        .filter(|phrase| !phrase.is_empty() && phrase.len() <= 3)
        .collect();

    let mut word_freq: HashMap<&str, f64> = HashMap::new();
    let mut word_degree: HashMap<&str, f64> = HashMap::new();

    for phrase in &phrases {
        let degree = (phrase.len() - 1) as f64;
        for word in phrase {
            *word_freq.entry(word.as_str()).or_insert(0.0) += 1.0;
            *word_degree.entry(word.as_str()).or_insert(0.0) += degree;
        }
    }
    for (word, freq) in &word_freq {
        *word_degree.entry(word).or_insert(0.0) += *freq;
    }

    let mut scores = HashMap::new();
    for phrase in &phrases {
        let phrase_key = phrase.join(" ");
        let score: f64 = phrase
            .iter()
            .map(|w| word_degree.get(w.as_str()).unwrap_or(&0.0) / word_freq.get(w.as_str()).unwrap_or(&1.0))
            .sum();
        scores.insert(phrase_key, score);
    }
    scores
}

/// `extract_keywords(text, top_n)`, per spec §4.4: combines frequency,
/// TF-IDF (when a corpus is supplied), RAKE and bigram strategies, summing
/// each surface form's weighted scores, descending.
pub fn extract_keywords(text: &str, top_n: usize, documents: &[String]) -> Vec<String> {
    let mut combined: HashMap<String, f64> = HashMap::new();

    for (word, score) in frequency_scores(text) {
        *combined.entry(word).or_insert(0.0) += score * FREQUENCY_WEIGHT;
    }
    for (word, score) in tfidf_scores(text, documents) {
        *combined.entry(word).or_insert(0.0) += score * TFIDF_WEIGHT;
    }
    for (phrase, score) in rake_scores(text) {
        *combined.entry(phrase).or_insert(0.0) += score * RAKE_WEIGHT;
    }
    for (phrase, score) in bigram_scores(text) {
        *combined.entry(phrase).or_insert(0.0) += score * BIGRAM_WEIGHT;
    }

    let mut ranked: Vec<(String, f64)> = combined.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.into_iter().take(top_n).map(|(word, _)| word).collect()
}
