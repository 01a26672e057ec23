//! Per-page controller.
//!
//! A [`Page`] owns every piece of UI state the blog script would otherwise
//! keep in globals: the theme, the loaded index, the current query and the
//! `#search-results` region, plus the navigation controls. Event handlers
//! become method calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::copy::{ButtonState, CodeBlocks};
use crate::debounce::{Debounced, debounce};
use crate::index::{IndexClient, IndexState, RETRY_DELAY};
use crate::nav::{NavMenu, ScrollTop};
use crate::post::SearchIndex;
use crate::render::{render_results, render_unavailable};
use crate::search::{Query, SearchOutcome, search};
use crate::theme::{Theme, ThemeStore};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Contents and visibility of `#search-results`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsRegion {
    pub html: String,
    pub visible: bool,
}

impl ResultsRegion {
    fn hidden() -> Self {
        Self::default()
    }

    fn shown(html: String) -> Self {
        Self {
            html,
            visible: true,
        }
    }
}

struct SearchState {
    index: IndexState,
    query: String,
}

struct Shared {
    state: Mutex<SearchState>,
    region: watch::Sender<ResultsRegion>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One filter pass over the current index for `query`.
    fn run_pass(&self, query: &str) {
        let region = {
            let state = self.state();
            match &state.index {
                // blank input hides the region whatever the index is doing
                _ if Query::parse(query).is_none() => ResultsRegion::hidden(),
                IndexState::Unavailable => ResultsRegion::shown(render_unavailable()),
                IndexState::Ready(index) => region_for(index, query),
                // not loaded yet: behaves like an empty index
                IndexState::Loading => region_for(&SearchIndex::default(), query),
            }
        };
        self.region.send_replace(region);
    }

    fn mark_unavailable(&self) {
        self.state().index = IndexState::Unavailable;
        self.region
            .send_replace(ResultsRegion::shown(render_unavailable()));
    }

    fn install(&self, index: SearchIndex) {
        let query = {
            let mut state = self.state();
            state.index = IndexState::Ready(Arc::new(index));
            state.query.clone()
        };
        if query.trim().is_empty() {
            self.region.send_replace(ResultsRegion::hidden());
        } else {
            self.run_pass(&query);
        }
    }
}

fn region_for(index: &SearchIndex, query: &str) -> ResultsRegion {
    match search(index, query) {
        SearchOutcome::Hidden => ResultsRegion::hidden(),
        SearchOutcome::Matches(page) => ResultsRegion::shown(render_results(&page)),
    }
}

/// Search input + results region. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SearchBox {
    shared: Arc<Shared>,
    trigger: Debounced<String>,
}

impl SearchBox {
    pub fn new(delay: Duration) -> Self {
        let (region, _) = watch::channel(ResultsRegion::hidden());
        let shared = Arc::new(Shared {
            state: Mutex::new(SearchState {
                index: IndexState::Loading,
                query: String::new(),
            }),
            region,
        });

        let trigger = {
            let shared = Arc::clone(&shared);
            debounce(move |query: String| shared.run_pass(&query), delay)
        };

        Self { shared, trigger }
    }

    /// Loads the index, showing the unavailable message while the single
    /// retry is pending.
    pub async fn load(&self, client: &IndexClient, retry_delay: Duration) -> IndexState {
        let shared = Arc::clone(&self.shared);
        match client
            .load_with_retry(retry_delay, |_| shared.mark_unavailable())
            .await
        {
            Ok(index) => self.shared.install(index),
            Err(_) => self.shared.mark_unavailable(),
        }
        self.index_state()
    }

    /// Input event: records the query and schedules a debounced pass.
    pub fn input(&self, query: &str) {
        self.shared.state().query = query.to_string();
        self.trigger.call(query.to_string());
    }

    /// Records the query and filters immediately.
    pub fn submit(&self, query: &str) {
        self.trigger.cancel();
        self.shared.state().query = query.to_string();
        self.shared.run_pass(query);
    }

    /// A click landed outside both the input and the results region.
    pub fn click_outside(&self) {
        self.shared.region.send_modify(|region| region.visible = false);
    }

    pub fn query(&self) -> String {
        self.shared.state().query.clone()
    }

    pub fn index_state(&self) -> IndexState {
        self.shared.state().index.clone()
    }

    pub fn results(&self) -> ResultsRegion {
        self.shared.region.borrow().clone()
    }

    /// Notified after every completed pass or index state change.
    pub fn subscribe(&self) -> watch::Receiver<ResultsRegion> {
        self.shared.region.subscribe()
    }
}

pub struct Page {
    theme: ThemeStore,
    client: IndexClient,
    retry_delay: Duration,
    search: SearchBox,
    menu: NavMenu,
    scroll_top: ScrollTop,
    code: CodeBlocks,
}

impl Page {
    pub fn new(theme: ThemeStore, client: IndexClient) -> Self {
        Self {
            theme,
            client,
            retry_delay: RETRY_DELAY,
            search: SearchBox::new(SEARCH_DEBOUNCE),
            menu: NavMenu::default(),
            scroll_top: ScrollTop::default(),
            code: CodeBlocks::default(),
        }
    }

    pub fn with_timings(mut self, debounce_delay: Duration, retry_delay: Duration) -> Self {
        self.search = SearchBox::new(debounce_delay);
        self.retry_delay = retry_delay;
        self
    }

    /// Kicks off the index load in the background.
    pub fn start(&self) -> JoinHandle<IndexState> {
        let search = self.search.clone();
        let client = self.client.clone();
        let retry_delay = self.retry_delay;
        tokio::spawn(async move { search.load(&client, retry_delay).await })
    }

    pub fn search(&self) -> &SearchBox {
        &self.search
    }

    pub fn theme(&self) -> Theme {
        self.theme.current()
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme.toggle()
    }

    pub fn menu(&self) -> &NavMenu {
        &self.menu
    }

    pub fn toggle_menu(&mut self) -> bool {
        self.menu.toggle()
    }

    pub fn navigate(&mut self) {
        self.menu.on_navigate();
    }

    pub fn resize(&mut self, viewport_width: u32) {
        self.menu.on_resize(viewport_width);
    }

    pub fn on_scroll(&mut self, offset: u32) -> bool {
        self.scroll_top.on_scroll(offset)
    }

    pub fn scroll_to_top(&mut self) -> u32 {
        self.scroll_top.activate()
    }

    pub fn attach_code_blocks(&mut self, blocks: CodeBlocks) {
        self.code = blocks;
    }

    pub fn code_blocks(&self) -> &CodeBlocks {
        &self.code
    }

    pub fn copy_code(&self, index: usize) -> Option<ButtonState> {
        self.code.click(index)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;
    use crate::fetcher::Fetcher;
    use crate::index::IndexSource;
    use crate::render::UNAVAILABLE_MESSAGE;

    const INDEX: &str = r#"[
        {"title": "Rust basics", "summary": "intro", "url": "/a"},
        {"title": "Go basics", "summary": "rust comparison", "url": "/b"}
    ]"#;

    fn page(dir: &Path) -> Page {
        let client = IndexClient::new(
            IndexSource::Local(dir.join("search_index.json")),
            Fetcher::new("test-agent").unwrap(),
        );
        Page::new(ThemeStore::open(&dir.join("prefs.json"), false), client)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn typing_burst_filters_once() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("search_index.json"), INDEX).unwrap();
        let page = page(tmp.path());
        assert!(matches!(page.start().await.unwrap(), IndexState::Ready(_)));

        let mut rx = page.search().subscribe();
        for q in ["r", "ru", "rus", "rust", "rust "] {
            page.search().input(q);
            sleep_ms(10).await;
        }
        assert!(!rx.has_changed().unwrap());

        sleep_ms(300).await;
        assert!(rx.has_changed().unwrap());
        let region = rx.borrow_and_update().clone();
        assert!(region.visible);
        let a = region.html.find("href=\"/a\"").unwrap();
        let b = region.html.find("href=\"/b\"").unwrap();
        assert!(a < b);
        assert_eq!(page.search().query(), "rust ");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_query_hides_region() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("search_index.json"), INDEX).unwrap();
        let page = page(tmp.path());
        page.start().await.unwrap();

        page.search().submit("rust");
        assert!(page.search().results().visible);

        page.search().submit("   ");
        assert_eq!(page.search().results(), ResultsRegion::default());
    }

    #[tokio::test(start_paused = true)]
    async fn click_outside_hides_without_clearing() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("search_index.json"), INDEX).unwrap();
        let page = page(tmp.path());
        page.start().await.unwrap();

        page.search().submit("go");
        page.search().click_outside();
        let region = page.search().results();
        assert!(!region.visible);
        assert!(region.html.contains("/b"));
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_then_recovers_on_retry() {
        let tmp = tempdir().unwrap();
        let page = page(tmp.path());
        let load = page.start();

        sleep_ms(1000).await;
        assert!(matches!(page.search().index_state(), IndexState::Unavailable));
        let region = page.search().results();
        assert!(region.visible);
        assert!(region.html.contains(UNAVAILABLE_MESSAGE));

        page.search().input("go");
        std::fs::write(tmp.path().join("search_index.json"), INDEX).unwrap();

        let state = load.await.unwrap();
        assert!(matches!(state, IndexState::Ready(_)));
        // the pending query is re-run against the fresh index
        let region = page.search().results();
        assert!(region.visible);
        assert!(region.html.contains("href=\"/b\""));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_one_retry() {
        let tmp = tempdir().unwrap();
        let page = page(tmp.path());

        let state = page.start().await.unwrap();
        assert!(matches!(state, IndexState::Unavailable));
        assert!(page.search().results().html.contains(UNAVAILABLE_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_query_hides_unavailable_message() {
        let tmp = tempdir().unwrap();
        let page = page(tmp.path());
        assert!(matches!(page.start().await.unwrap(), IndexState::Unavailable));

        page.search().submit("rust");
        assert!(page.search().results().html.contains(UNAVAILABLE_MESSAGE));

        page.search().submit("   ");
        assert_eq!(page.search().results(), ResultsRegion::default());

        page.search().input("");
        sleep_ms(400).await;
        assert!(!page.search().results().visible);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_fires_ten_seconds_after_failure() {
        let tmp = tempdir().unwrap();
        let page = page(tmp.path());
        let load = page.start();

        sleep_ms(1).await;
        assert!(matches!(page.search().index_state(), IndexState::Unavailable));
        std::fs::write(tmp.path().join("search_index.json"), INDEX).unwrap();

        sleep_ms(9_898).await;
        assert!(matches!(page.search().index_state(), IndexState::Unavailable));
        assert!(!load.is_finished());

        sleep_ms(102).await;
        let state = page.search().index_state();
        assert_eq!(state.index().map(|index| index.len()), Some(2));
        assert!(matches!(load.await.unwrap(), IndexState::Ready(_)));
        // nothing typed, so the unavailable message is cleared
        assert_eq!(page.search().results(), ResultsRegion::default());
    }

    #[tokio::test(start_paused = true)]
    async fn theme_and_nav_controls() {
        let tmp = tempdir().unwrap();
        let mut page = page(tmp.path());

        assert_eq!(page.theme(), Theme::Light);
        assert_eq!(page.toggle_theme(), Theme::Dark);
        assert_eq!(ThemeStore::open(&tmp.path().join("prefs.json"), false).current(), Theme::Dark);

        assert!(page.toggle_menu());
        page.navigate();
        assert!(!page.menu().is_open());

        assert!(page.on_scroll(1200));
        assert_eq!(page.scroll_to_top(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn copy_buttons_on_page_code() {
        let tmp = tempdir().unwrap();
        let mut page = page(tmp.path());
        assert_eq!(page.copy_code(0), None);

        let html = r#"<div class="post-content">
            <div class="highlight"><pre>cargo build</pre></div>
            <div class="highlight"><pre>cargo test</pre></div>
        </div>"#;
        let clipboard = Arc::new(crate::copy::BufferClipboard::default());
        page.attach_code_blocks(CodeBlocks::attach(
            crate::enhance::code_blocks(html),
            clipboard.clone(),
            clipboard.clone(),
        ));
        assert_eq!(page.code_blocks().len(), 2);

        let state = page.copy_code(1).unwrap();
        assert_eq!(state.label, crate::copy::COPIED_LABEL);
        assert_eq!(state.class(), Some("copied"));
        assert_eq!(clipboard.take().as_deref(), Some("cargo test"));

        sleep_ms(2001).await;
        assert_eq!(
            page.code_blocks().state(1).map(|s| s.label),
            Some(crate::copy::COPY_LABEL)
        );
    }
}
