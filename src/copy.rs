use std::io::{IsTerminal as _, Write as _};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::Engine as _;

pub const COPY_LABEL: &str = "Copy";
pub const COPIED_LABEL: &str = "Copied!";
pub const ERROR_LABEL: &str = "Error";
pub const COPIED_CLASS: &str = "copied";

pub const COPY_RESET_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, thiserror::Error)]
#[error("clipboard write failed: {0}")]
pub struct ClipboardError(pub String);

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// System clipboard via the OSC 52 terminal escape on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct Osc52Clipboard;

impl Clipboard for Osc52Clipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut stderr = std::io::stderr();
        if !stderr.is_terminal() {
            return Err(ClipboardError("stderr is not a terminal".to_string()));
        }
        let payload = base64::engine::general_purpose::STANDARD.encode(text);
        write!(stderr, "\x1b]52;c;{payload}\x07")
            .and_then(|()| stderr.flush())
            .map_err(|err| ClipboardError(err.to_string()))
    }
}

/// Holds the last copied text until it is taken.
#[derive(Debug, Default)]
pub struct BufferClipboard {
    text: Mutex<Option<String>>,
}

impl BufferClipboard {
    pub fn take(&self) -> Option<String> {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Clipboard for BufferClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonState {
    pub label: &'static str,
    pub copied: bool,
}

impl ButtonState {
    /// Extra class on the button while the copied label shows.
    pub fn class(&self) -> Option<&'static str> {
        self.copied.then_some(COPIED_CLASS)
    }

    const IDLE: Self = Self {
        label: COPY_LABEL,
        copied: false,
    };
}

struct Shared {
    state: ButtonState,
    // bumps on every click so a stale reset timer leaves a newer label alone
    generation: u64,
}

/// The copy control attached to one code block.
#[derive(Clone)]
pub struct CopyButton {
    primary: Arc<dyn Clipboard>,
    fallback: Arc<dyn Clipboard>,
    reset_delay: Duration,
    shared: Arc<Mutex<Shared>>,
}

fn lock(m: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CopyButton {
    pub fn new(primary: Arc<dyn Clipboard>, fallback: Arc<dyn Clipboard>) -> Self {
        Self::with_reset_delay(primary, fallback, COPY_RESET_DELAY)
    }

    pub fn with_reset_delay(
        primary: Arc<dyn Clipboard>,
        fallback: Arc<dyn Clipboard>,
        reset_delay: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            reset_delay,
            shared: Arc::new(Mutex::new(Shared {
                state: ButtonState::IDLE,
                generation: 0,
            })),
        }
    }

    pub fn state(&self) -> ButtonState {
        lock(&self.shared).state
    }

    /// Copies `text` and schedules the label to revert. Never fails.
    pub fn click(&self, text: &str) -> ButtonState {
        let state = match self.copy(text) {
            Ok(()) => ButtonState {
                label: COPIED_LABEL,
                copied: true,
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to copy code");
                ButtonState {
                    label: ERROR_LABEL,
                    copied: false,
                }
            }
        };

        let generation = {
            let mut shared = lock(&self.shared);
            shared.state = state;
            shared.generation += 1;
            shared.generation
        };

        let shared = Arc::clone(&self.shared);
        let delay = self.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut shared = lock(&shared);
            if shared.generation == generation {
                shared.state = ButtonState::IDLE;
            }
        });

        state
    }

    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        match self.primary.write_text(text) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, "clipboard unavailable; trying legacy copy");
                self.fallback.write_text(text)
            }
        }
    }
}

/// One copy button per code block of a page, in document order.
#[derive(Clone, Default)]
pub struct CodeBlocks {
    blocks: Vec<(String, CopyButton)>,
}

impl CodeBlocks {
    pub fn attach(
        codes: Vec<String>,
        primary: Arc<dyn Clipboard>,
        fallback: Arc<dyn Clipboard>,
    ) -> Self {
        let blocks = codes
            .into_iter()
            .map(|code| {
                let button = CopyButton::new(Arc::clone(&primary), Arc::clone(&fallback));
                (code, button)
            })
            .collect();
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Clicks the button of block `index`; `None` if there is no such block.
    pub fn click(&self, index: usize) -> Option<ButtonState> {
        let (code, button) = self.blocks.get(index)?;
        Some(button.click(code))
    }

    pub fn state(&self, index: usize) -> Option<ButtonState> {
        self.blocks.get(index).map(|(_, button)| button.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeClipboard {
        fail: bool,
        written: Mutex<Vec<String>>,
    }

    impl FakeClipboard {
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::default()
            })
        }

        fn working() -> Arc<Self> {
            Arc::new(Self::default())
        }
    }

    impl Clipboard for FakeClipboard {
        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            if self.fail {
                return Err(ClipboardError("denied".to_string()));
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn copied_label_lasts_reset_delay() {
        let primary = FakeClipboard::working();
        let button = CopyButton::new(primary.clone(), FakeClipboard::failing());
        assert_eq!(button.state().label, COPY_LABEL);

        let state = button.click("fn main() {}");
        assert_eq!(state.label, COPIED_LABEL);
        assert_eq!(state.class(), Some("copied"));
        assert_eq!(*primary.written.lock().unwrap(), vec!["fn main() {}"]);

        sleep_ms(1999).await;
        assert_eq!(button.state().label, COPIED_LABEL);

        sleep_ms(2).await;
        assert_eq!(button.state(), ButtonState::IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_legacy_copy() {
        let fallback = FakeClipboard::working();
        let button = CopyButton::new(FakeClipboard::failing(), fallback.clone());

        assert_eq!(button.click("x").label, COPIED_LABEL);
        assert_eq!(*fallback.written.lock().unwrap(), vec!["x"]);
    }

    #[tokio::test(start_paused = true)]
    async fn double_failure_shows_error_then_reverts() {
        let button = CopyButton::new(FakeClipboard::failing(), FakeClipboard::failing());

        let state = button.click("x");
        assert_eq!(state.label, ERROR_LABEL);
        assert!(!state.copied);

        sleep_ms(2001).await;
        assert_eq!(button.state().label, COPY_LABEL);
    }

    #[tokio::test(start_paused = true)]
    async fn each_block_copies_its_own_code() {
        let fallback = Arc::new(BufferClipboard::default());
        let blocks = CodeBlocks::attach(
            vec!["let a = 1;".to_string(), "let b = 2;".to_string()],
            FakeClipboard::failing(),
            fallback.clone(),
        );
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks.click(1).map(|s| s.label), Some(COPIED_LABEL));
        assert_eq!(fallback.take().as_deref(), Some("let b = 2;"));
        assert_eq!(blocks.state(0).map(|s| s.label), Some(COPY_LABEL));
        assert_eq!(blocks.click(2), None);

        sleep_ms(2001).await;
        assert_eq!(blocks.state(1), Some(ButtonState::IDLE));
    }

    #[tokio::test(start_paused = true)]
    async fn newer_click_keeps_its_own_timer() {
        let button = CopyButton::new(FakeClipboard::working(), FakeClipboard::failing());

        button.click("a");
        sleep_ms(1500).await;
        button.click("b");

        // first timer expires at 2000 but must not revert the second click
        sleep_ms(600).await;
        assert_eq!(button.state().label, COPIED_LABEL);

        // second click reverts at 3500
        sleep_ms(1399).await;
        assert_eq!(button.state().label, COPIED_LABEL);

        sleep_ms(2).await;
        assert_eq!(button.state().label, COPY_LABEL);
    }
}
