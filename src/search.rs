use crate::post::{Post, SearchIndex};

/// Most results rendered for one query; the rest are only counted.
pub const MAX_RESULTS: usize = 8;

/// A trimmed, lower-cased, non-empty query and its whitespace-delimited terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    normalized: String,
    terms: Vec<String>,
}

impl Query {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        let terms = normalized.split_whitespace().map(str::to_string).collect();
        Some(Self { normalized, terms })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    fn matches(&self, post: &Post) -> bool {
        let title = post.title.to_lowercase();
        let summary = post.summary.as_deref().map(str::to_lowercase);
        let tags: Vec<String> = post.tags.iter().map(|t| t.to_lowercase()).collect();

        self.terms.iter().all(|term| {
            title.contains(term.as_str())
                || summary.as_deref().is_some_and(|s| s.contains(term.as_str()))
                || tags.iter().any(|t| t.contains(term.as_str()))
        })
    }

    fn title_contains_full(&self, post: &Post) -> bool {
        post.title.to_lowercase().contains(&self.normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage<'a> {
    pub query: Query,
    pub shown: Vec<&'a Post>,
    /// Matches beyond [`MAX_RESULTS`].
    pub remaining: usize,
}

impl ResultPage<'_> {
    pub fn total(&self) -> usize {
        self.shown.len() + self.remaining
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<'a> {
    /// Blank query: the results region should be emptied and hidden.
    Hidden,
    /// Possibly empty; an empty page still renders "No posts found.".
    Matches(ResultPage<'a>),
}

pub fn search<'a>(index: &'a SearchIndex, raw_query: &str) -> SearchOutcome<'a> {
    let Some(query) = Query::parse(raw_query) else {
        return SearchOutcome::Hidden;
    };

    let mut shown = ranked_matches(index, &query);
    let remaining = shown.len().saturating_sub(MAX_RESULTS);
    shown.truncate(MAX_RESULTS);

    SearchOutcome::Matches(ResultPage {
        query,
        shown,
        remaining,
    })
}

/// Every matching post, full-title hits first, index order otherwise.
pub fn ranked_matches<'a>(index: &'a SearchIndex, query: &Query) -> Vec<&'a Post> {
    let mut hits: Vec<&Post> = index.posts().iter().filter(|p| query.matches(p)).collect();
    // sort_by_key is stable
    hits.sort_by_key(|p| !query.title_contains_full(p));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, summary: Option<&str>, url: &str, tags: &[&str]) -> Post {
        Post {
            title: title.to_string(),
            summary: summary.map(str::to_string),
            url: url.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            date: None,
        }
    }

    fn urls(outcome: &SearchOutcome<'_>) -> Vec<String> {
        match outcome {
            SearchOutcome::Hidden => panic!("expected matches"),
            SearchOutcome::Matches(page) => page.shown.iter().map(|p| p.url.clone()).collect(),
        }
    }

    #[test]
    fn blank_query_hides_results() {
        let index = SearchIndex::new(vec![post("Rust", None, "/a", &[])]);
        assert_eq!(search(&index, ""), SearchOutcome::Hidden);
        assert_eq!(search(&index, "   \t\n"), SearchOutcome::Hidden);
    }

    #[test]
    fn title_hits_rank_before_summary_hits() {
        let index = SearchIndex::new(vec![
            post("Go basics", Some("rust comparison"), "/b", &[]),
            post("Rust basics", Some("intro"), "/a", &[]),
        ]);
        assert_eq!(urls(&search(&index, "rust")), vec!["/a", "/b"]);
    }

    #[test]
    fn spec_example_order() {
        let index = SearchIndex::new(vec![
            post("Rust basics", Some("intro"), "/a", &[]),
            post("Go basics", Some("rust comparison"), "/b", &[]),
        ]);
        assert_eq!(urls(&search(&index, "Rust")), vec!["/a", "/b"]);
    }

    #[test]
    fn every_term_must_match_somewhere() {
        let index = SearchIndex::new(vec![
            post("Go Concurrency Patterns", None, "/gcp", &[]),
            post("Go basics", None, "/go", &[]),
            post("Channels", Some("how go does it"), "/ch", &["concurrency"]),
        ]);
        assert_eq!(urls(&search(&index, "go concurrency")), vec!["/gcp", "/ch"]);
    }

    #[test]
    fn tags_are_searched_case_insensitively() {
        let index = SearchIndex::new(vec![post("Untitled", None, "/u", &["WebAssembly"])]);
        assert_eq!(urls(&search(&index, "wasm")), Vec::<String>::new());
        assert_eq!(urls(&search(&index, "assembly")), vec!["/u"]);
    }

    #[test]
    fn no_match_is_distinct_from_hidden() {
        let index = SearchIndex::new(vec![post("Rust", None, "/a", &[])]);
        let SearchOutcome::Matches(page) = search(&index, "python") else {
            panic!("expected an empty page");
        };
        assert!(page.shown.is_empty());
        assert_eq!(page.remaining, 0);
    }

    #[test]
    fn truncates_and_counts_remaining() {
        let posts = (0..11)
            .map(|i| post(&format!("Note {i}"), None, &format!("/{i}"), &[]))
            .collect();
        let index = SearchIndex::new(posts);
        let SearchOutcome::Matches(page) = search(&index, "note") else {
            panic!("expected matches");
        };
        assert_eq!(page.shown.len(), MAX_RESULTS);
        assert_eq!(page.remaining, 3);
        assert_eq!(page.total(), 11);
        assert_eq!(page.shown[0].url, "/0");
        assert_eq!(page.shown[7].url, "/7");
    }

    #[test]
    fn ranking_is_stable_within_each_tier() {
        let index = SearchIndex::new(vec![
            post("Tagged one", None, "/t1", &["async rust"]),
            post("Async Rust", None, "/r1", &[]),
            post("Tagged two", Some("async rust notes"), "/t2", &[]),
            post("More async rust", None, "/r2", &[]),
        ]);
        assert_eq!(
            urls(&search(&index, "async rust")),
            vec!["/r1", "/r2", "/t1", "/t2"]
        );
    }

    #[test]
    fn repeated_queries_are_identical() {
        let index = SearchIndex::new(vec![
            post("Rust basics", Some("intro"), "/a", &[]),
            post("Go basics", Some("rust comparison"), "/b", &[]),
        ]);
        assert_eq!(search(&index, "rust"), search(&index, "rust"));
    }
}
