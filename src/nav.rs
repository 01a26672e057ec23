/// Widths at or below this are treated as the mobile layout.
pub const MOBILE_BREAKPOINT_PX: u32 = 768;

/// Scroll offset past which the scroll-to-top control shows.
pub const SCROLL_TOP_THRESHOLD_PX: u32 = 300;

/// `.main-nav` open state, mirrored as `aria-expanded` on `#menu-toggle`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NavMenu {
    open: bool,
}

impl NavMenu {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn aria_expanded(&self) -> &'static str {
        if self.open { "true" } else { "false" }
    }

    pub fn toggle(&mut self) -> bool {
        self.open = !self.open;
        self.open
    }

    /// A link inside the menu was followed.
    pub fn on_navigate(&mut self) {
        self.open = false;
    }

    pub fn on_resize(&mut self, viewport_width: u32) {
        if viewport_width > MOBILE_BREAKPOINT_PX && self.open {
            tracing::debug!(viewport_width, "left mobile layout; closing menu");
            self.open = false;
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrollTop {
    visible: bool,
}

impl ScrollTop {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn on_scroll(&mut self, offset: u32) -> bool {
        self.visible = offset > SCROLL_TOP_THRESHOLD_PX;
        self.visible
    }

    /// Target offset for the activation.
    pub fn activate(&mut self) -> u32 {
        self.visible = false;
        0
    }
}
