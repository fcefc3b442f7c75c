//! Search session: query state plus the driver that runs rankings.
//!
//! [`SessionState`] is a plain value with pure transitions. Each transition
//! consumes the state and returns the next one, so a front end can hold a
//! single state value and replace it wholesale.
//!
//! Rankings are asynchronous. Every non-blank query issues a [`Ticket`]
//! carrying a sequence number; [`SessionState::with_results`] only accepts
//! the outcome for the latest ticket, so a slow response for an old query
//! can never overwrite a newer one.
//!
//! [`SearchSession`] ties a state to a shared [`Corpus`] and a [`Ranker`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::corpus::{Corpus, CorpusPost};
use crate::error::SearchError;
use crate::rank::{RankedPost, Ranker};
use crate::tags::{has_all_tags, normalize_tag, TagSet};

/// Receipt for an in-flight ranking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    query: String,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Snapshot of a search session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    query: String,
    tags: TagSet,
    /// `None` while the query is blank: the listing is the whole corpus.
    results: Option<Vec<RankedPost>>,
    selected: Option<String>,
    error: Option<String>,
    searching: bool,
    latest: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query text.
    ///
    /// A blank query resets to the unranked listing immediately and returns
    /// no ticket. Any other query marks the state as searching and returns
    /// the ticket its results must be delivered with. Either way, tickets
    /// issued earlier become stale.
    pub fn with_query(mut self, query: &str) -> (Self, Option<Ticket>) {
        self.latest += 1;
        self.query = query.to_string();

        if query.trim().is_empty() {
            self.results = None;
            self.searching = false;
            self.error = None;
            return (self, None);
        }

        self.searching = true;
        let ticket = Ticket {
            seq: self.latest,
            query: self.query.clone(),
        };
        (self, Some(ticket))
    }

    /// Deliver a ranking outcome.
    ///
    /// Outcomes for stale tickets are ignored. A failure keeps the previous
    /// results visible and records the error.
    pub fn with_results(
        mut self,
        ticket: &Ticket,
        outcome: Result<Vec<RankedPost>, SearchError>,
    ) -> Self {
        if ticket.seq != self.latest {
            tracing::debug!(
                stale = ticket.seq,
                latest = self.latest,
                "discarding stale search results"
            );
            return self;
        }

        self.searching = false;
        match outcome {
            Ok(results) => {
                self.results = Some(results);
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(query = %ticket.query, error = %e, "search failed");
                self.error = Some(e.to_string());
            }
        }
        self
    }

    /// Replace the tag selection.
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// Add the tag if absent, remove it if present.
    pub fn toggle_tag(mut self, tag: &str) -> Self {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            return self;
        }
        if !self.tags.remove(&tag) {
            self.tags.insert(tag);
        }
        self
    }

    /// Select a post by filename, or clear the selection.
    ///
    /// Filenames the corpus does not contain clear the selection.
    pub fn with_selection(mut self, corpus: &Corpus, filename: Option<&str>) -> Self {
        self.selected = filename
            .filter(|f| corpus.position(f).is_some())
            .map(str::to_string);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Latest ranked results, `None` while the query is blank.
    pub fn results(&self) -> Option<&[RankedPost]> {
        self.results.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Posts to display: the ranked list (or the whole corpus for a blank
    /// query) narrowed by the tag selection.
    pub fn visible<'a>(&'a self, corpus: &'a Corpus) -> Vec<Listing<'a>> {
        let listing: Vec<Listing<'a>> = match &self.results {
            Some(results) => results
                .iter()
                .filter_map(|r| {
                    corpus.posts().get(r.index).map(|post| Listing {
                        post,
                        rank: Some(r),
                    })
                })
                .collect(),
            None => corpus
                .posts()
                .iter()
                .map(|post| Listing { post, rank: None })
                .collect(),
        };
        listing
            .into_iter()
            .filter(|l| has_all_tags(l.post, &self.tags))
            .collect()
    }
}

/// One displayed post with its ranking, if the query was ranked.
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    pub post: &'a CorpusPost,
    pub rank: Option<&'a RankedPost>,
}

/// A corpus, a ranking strategy, and the current state.
pub struct SearchSession {
    corpus: Arc<Corpus>,
    ranker: Arc<dyn Ranker>,
    state: SessionState,
}

impl SearchSession {
    pub fn new(corpus: Arc<Corpus>, ranker: Arc<dyn Ranker>) -> Self {
        Self {
            corpus,
            ranker,
            state: SessionState::new(),
        }
    }

    /// Load an artifact file and start a session over it.
    pub fn open(path: &Path, ranker: Arc<dyn Ranker>) -> Result<Self, SearchError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| SearchError::ArtifactFetch(format!("{}: {}", path.display(), e)))?;
        let corpus = Corpus::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            posts = corpus.len(),
            mode = %corpus.mode(),
            "artifact loaded"
        );
        Ok(Self::new(Arc::new(corpus), ranker))
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn ranker(&self) -> &dyn Ranker {
        self.ranker.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Currently displayed posts.
    pub fn visible(&self) -> Vec<Listing<'_>> {
        self.state.visible(&self.corpus)
    }

    /// Set the query and issue a ticket when ranking is needed.
    pub fn begin_search(&mut self, query: &str) -> Option<Ticket> {
        let (state, ticket) = std::mem::take(&mut self.state).with_query(query);
        self.state = state;
        ticket
    }

    /// Ranking work for a ticket, independent of the session borrow.
    pub fn rank_for(
        &self,
        ticket: &Ticket,
    ) -> impl Future<Output = Result<Vec<RankedPost>, SearchError>> + Send + 'static {
        let corpus = Arc::clone(&self.corpus);
        let ranker = Arc::clone(&self.ranker);
        let query = ticket.query.clone();
        async move { ranker.rank(&query, &corpus).await }
    }

    /// Deliver the outcome for a ticket.
    pub fn finish_search(&mut self, ticket: &Ticket, outcome: Result<Vec<RankedPost>, SearchError>) {
        self.state = std::mem::take(&mut self.state).with_results(ticket, outcome);
    }

    /// Run a query to completion.
    pub async fn search(&mut self, query: &str) -> &SessionState {
        if let Some(ticket) = self.begin_search(query) {
            let outcome = self.rank_for(&ticket).await;
            self.finish_search(&ticket, outcome);
        }
        &self.state
    }

    /// Toggle a tag and re-run the current query.
    pub async fn toggle_tag(&mut self, tag: &str) -> &SessionState {
        self.state = std::mem::take(&mut self.state).toggle_tag(tag);
        self.rerun().await
    }

    /// Replace the tag selection and re-run the current query.
    pub async fn set_tags(&mut self, tags: TagSet) -> &SessionState {
        self.state = std::mem::take(&mut self.state).with_tags(tags);
        self.rerun().await
    }

    async fn rerun(&mut self) -> &SessionState {
        let query = self.state.query.clone();
        self.search(&query).await
    }

    /// Select a post by filename.
    pub fn select(&mut self, filename: &str) -> Result<&CorpusPost, SearchError> {
        let Some(index) = self.corpus.position(filename) else {
            self.state = std::mem::take(&mut self.state).with_selection(&self.corpus, None);
            return Err(SearchError::UnknownPost(filename.to_string()));
        };
        self.state = std::mem::take(&mut self.state).with_selection(&self.corpus, Some(filename));
        Ok(&self.corpus.posts()[index])
    }

    /// Drop the query, keeping the tag selection.
    pub async fn clear(&mut self) -> &SessionState {
        self.search("").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artifact, EmbeddedPost, PostMeta, PostRecord};
    use crate::rank::LexicalRanker;
    use crate::tags::tag_set;
    use async_trait::async_trait;

    fn corpus() -> Arc<Corpus> {
        let post = |filename: &str, date: &str, title: &str, tags: &[&str]| EmbeddedPost {
            post: PostRecord {
                filename: filename.into(),
                meta: PostMeta {
                    date: date.into(),
                    title: title.into(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    ..Default::default()
                },
                content: String::new(),
            },
            embedding: vec![],
        };
        Arc::new(Corpus::from_artifact(Artifact::Embedded(vec![
            post("a.md", "2024-03-01", "Async Rust internals", &["rust"]),
            post("b.md", "2024-02-01", "Go concurrency patterns", &["go"]),
            post("c.md", "2024-01-01", "Comparing Rust and Go", &["rust", "go"]),
        ])))
    }

    fn ranked(filenames: &[(&str, usize)]) -> Vec<RankedPost> {
        filenames
            .iter()
            .map(|(f, i)| RankedPost {
                index: *i,
                filename: f.to_string(),
                score: 1.0,
                explain: None,
            })
            .collect()
    }

    struct BrokenRanker;

    #[async_trait]
    impl Ranker for BrokenRanker {
        fn name(&self) -> &str {
            "broken"
        }
        async fn rank(&self, _query: &str, _corpus: &Corpus) -> Result<Vec<RankedPost>, SearchError> {
            Err(SearchError::Embedding("backend offline".into()))
        }
    }

    #[test]
    fn test_stale_ticket_discarded() {
        let state = SessionState::new();
        let (state, first) = state.with_query("rust");
        let (state, second) = state.with_query("go");
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(second.seq() > first.seq());

        let state = state.with_results(&second, Ok(ranked(&[("b.md", 1)])));
        let state = state.with_results(&first, Ok(ranked(&[("a.md", 0)])));

        assert_eq!(state.query(), "go");
        assert_eq!(state.results().unwrap()[0].filename, "b.md");
        assert!(!state.is_searching());
    }

    #[test]
    fn test_blank_query_invalidates_inflight() {
        let (state, ticket) = SessionState::new().with_query("rust");
        let (state, none) = state.with_query("  ");
        assert!(none.is_none());
        assert!(!state.is_searching());

        let state = state.with_results(&ticket.unwrap(), Ok(ranked(&[("a.md", 0)])));
        assert!(state.results().is_none());
    }

    #[test]
    fn test_error_keeps_previous_results() {
        let (state, t1) = SessionState::new().with_query("rust");
        let state = state.with_results(&t1.unwrap(), Ok(ranked(&[("a.md", 0)])));
        let (state, t2) = state.with_query("go");
        let state = state.with_results(&t2.unwrap(), Err(SearchError::Embedding("boom".into())));

        assert_eq!(state.results().unwrap()[0].filename, "a.md");
        assert!(state.error().unwrap().contains("boom"));
        assert!(!state.is_searching());
    }

    #[test]
    fn test_visible_applies_tags_to_ranked_and_unranked() {
        let corpus = corpus();
        let state = SessionState::new().toggle_tag("Go");
        let files: Vec<&str> = state.visible(&corpus).iter().map(|l| l.post.filename()).collect();
        assert_eq!(files, vec!["b.md", "c.md"]);

        let (state, t) = state.with_query("rust");
        let state = state.with_results(&t.unwrap(), Ok(ranked(&[("c.md", 2), ("a.md", 0)])));
        let visible = state.visible(&corpus);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].post.filename(), "c.md");
        assert!(visible[0].rank.is_some());
    }

    #[test]
    fn test_toggle_tag_twice_removes() {
        let state = SessionState::new().toggle_tag("rust").toggle_tag("RUST");
        assert!(state.tags().is_empty());
    }

    #[test]
    fn test_selection_of_unknown_post_clears() {
        let corpus = corpus();
        let state = SessionState::new().with_selection(&corpus, Some("a.md"));
        assert_eq!(state.selected(), Some("a.md"));
        let state = state.with_selection(&corpus, Some("missing.md"));
        assert_eq!(state.selected(), None);
    }

    #[tokio::test]
    async fn test_session_search_and_tag_rerun() {
        let mut session = SearchSession::new(corpus(), Arc::new(LexicalRanker));
        session.search("rust").await;
        let files: Vec<&str> = session.visible().iter().map(|l| l.post.filename()).collect();
        assert_eq!(files, vec!["a.md", "c.md"]);

        session.toggle_tag("go").await;
        let files: Vec<&str> = session.visible().iter().map(|l| l.post.filename()).collect();
        assert_eq!(files, vec!["c.md"]);

        session.clear().await;
        assert_eq!(session.visible().len(), 2);
        session.set_tags(tag_set(Vec::<String>::new())).await;
        assert_eq!(session.visible().len(), 3);
    }

    #[tokio::test]
    async fn test_session_out_of_order_completion() {
        let mut session = SearchSession::new(corpus(), Arc::new(LexicalRanker));
        let slow = session.begin_search("rust").unwrap();
        let slow_work = session.rank_for(&slow);
        let fast = session.begin_search("go").unwrap();
        let fast_outcome = session.rank_for(&fast).await;
        session.finish_search(&fast, fast_outcome);
        let slow_outcome = slow_work.await;
        session.finish_search(&slow, slow_outcome);

        assert_eq!(session.state().query(), "go");
        let first = &session.state().results().unwrap()[0];
        assert_eq!(first.filename, "b.md");
    }

    #[tokio::test]
    async fn test_session_ranker_failure_is_state() {
        let mut session = SearchSession::new(corpus(), Arc::new(BrokenRanker));
        let state = session.search("rust").await;
        assert!(state.error().unwrap().contains("backend offline"));
        assert!(state.results().is_none());
        assert_eq!(session.visible().len(), 3);
    }

    #[test]
    fn test_select() {
        let mut session = SearchSession::new(corpus(), Arc::new(LexicalRanker));
        assert_eq!(session.select("b.md").unwrap().record.meta.title, "Go concurrency patterns");
        assert_eq!(session.state().selected(), Some("b.md"));
        assert!(matches!(session.select("nope.md"), Err(SearchError::UnknownPost(_))));
        assert_eq!(session.state().selected(), None);
    }

    #[test]
    fn test_open_missing_artifact() {
        let err = SearchSession::open(Path::new("/nonexistent/blog.json"), Arc::new(LexicalRanker))
            .err()
            .unwrap();
        assert!(matches!(err, SearchError::ArtifactFetch(_)));
    }
}
