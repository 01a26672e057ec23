use anyhow::Context as _;
use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink as _;
use maud::{Markup, html};
use url::Url;

use crate::copy::COPY_LABEL;
use crate::theme::{DARK_MODE_CLASS, Theme};

pub const EXTERNAL_LINK_CLASS: &str = "external-link";

/// Elements the page script attaches to; each missing one disables a feature.
const ATTACHMENT_POINTS: [(&str, &str); 5] = [
    ("#theme-toggle", "theme toggle"),
    ("#search-input", "search"),
    ("#search-results", "search"),
    ("#menu-toggle", "mobile navigation"),
    (".main-nav", "mobile navigation"),
];

pub struct EnhanceOptions<'a> {
    pub base_url: &'a Url,
    pub theme: Option<Theme>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnhanceReport {
    pub copy_buttons: usize,
    pub external_links: usize,
    pub missing: Vec<&'static str>,
}

pub fn enhance_page(
    page: &str,
    opts: &EnhanceOptions<'_>,
) -> anyhow::Result<(String, EnhanceReport)> {
    let document = kuchiki::parse_html().one(page);
    let mut report = EnhanceReport::default();

    for (selector, feature) in ATTACHMENT_POINTS {
        if document.select_first(selector).is_err() {
            tracing::warn!(selector, feature, "element not found; feature skipped");
            report.missing.push(selector);
        }
    }

    if let Some(theme) = opts.theme {
        apply_theme(&document, theme);
    }

    report.copy_buttons = add_copy_buttons(&document);
    report.external_links = annotate_external_links(&document, opts.base_url);

    if let Ok(toggle) = document.select_first("#menu-toggle") {
        toggle
            .attributes
            .borrow_mut()
            .insert("aria-expanded", "false".to_string());
    }
    add_scroll_top(&document);

    tracing::info!(
        copy_buttons = report.copy_buttons,
        external_links = report.external_links,
        missing = report.missing.len(),
        "page enhanced"
    );

    let mut out = Vec::new();
    document.serialize(&mut out).context("serialize page")?;
    let html = String::from_utf8(out).context("page html not utf-8")?;
    Ok((html, report))
}

/// Text of every code block that gets a copy button, in document order.
pub fn code_blocks(page: &str) -> Vec<String> {
    let document = kuchiki::parse_html().one(page);
    let Ok(blocks) = document.select("div.highlight") else {
        return Vec::new();
    };
    blocks
        .filter_map(|block| block.as_node().select_first("pre").ok())
        .map(|pre| pre.text_contents())
        .collect()
}

fn apply_theme(document: &NodeRef, theme: Theme) {
    let Ok(root) = document.select_first("html") else {
        return;
    };
    let mut attrs = root.attributes.borrow_mut();
    let classes: Vec<String> = attrs
        .get("class")
        .unwrap_or("")
        .split_whitespace()
        .filter(|c| *c != DARK_MODE_CLASS)
        .map(str::to_string)
        .chain(theme.root_class().map(str::to_string))
        .collect();
    if classes.is_empty() {
        attrs.remove("class");
    } else {
        attrs.insert("class", classes.join(" "));
    }
}

fn add_copy_buttons(document: &NodeRef) -> usize {
    let Ok(blocks) = document.select("div.highlight") else {
        return 0;
    };
    let blocks: Vec<_> = blocks.collect();

    let mut added = 0;
    for block in blocks {
        let node = block.as_node();
        if node.select_first("pre").is_err() {
            continue;
        }
        if node.select_first("button.code-copy-button").is_ok() {
            continue;
        }
        let button = html! { button class="code-copy-button" type="button" { (COPY_LABEL) } };
        if let Some(el) = fragment_element(button, "button") {
            node.append(el);
            added += 1;
        }
    }
    added
}

fn annotate_external_links(document: &NodeRef, base_url: &Url) -> usize {
    let Ok(links) = document.select(".post-content a[href], .page-content a[href]") else {
        return 0;
    };

    let mut annotated = 0;
    for link in links {
        let mut attrs = link.attributes.borrow_mut();
        let Some(href) = attrs.get("href").map(str::to_string) else {
            continue;
        };
        if !is_external(&href, base_url) {
            continue;
        }

        attrs.insert("target", "_blank".to_string());
        attrs.insert("rel", "noopener noreferrer".to_string());
        let class = attrs.get("class").unwrap_or("").to_string();
        if !class.split_whitespace().any(|c| c == EXTERNAL_LINK_CLASS) {
            let joined = if class.trim().is_empty() {
                EXTERNAL_LINK_CLASS.to_string()
            } else {
                format!("{} {}", class.trim(), EXTERNAL_LINK_CLASS)
            };
            attrs.insert("class", joined);
        }
        annotated += 1;
    }
    annotated
}

/// Resolved the way a browser resolves the anchor, so `//host/path` counts.
fn is_external(href: &str, base_url: &Url) -> bool {
    let Ok(url) = base_url.join(href.trim()) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https") && url.host_str() != base_url.host_str()
}

fn add_scroll_top(document: &NodeRef) {
    if document.select_first("#scroll-to-top").is_ok() {
        return;
    }
    let Ok(body) = document.select_first("body") else {
        return;
    };
    let button = html! {
        button id="scroll-to-top" class="scroll-to-top" type="button" aria-label="Scroll to top" hidden { "↑" }
    };
    if let Some(el) = fragment_element(button, "button") {
        body.as_node().append(el);
    }
}

fn fragment_element(markup: Markup, selector: &str) -> Option<NodeRef> {
    let doc = kuchiki::parse_html().one(markup.into_string());
    let node = doc.select_first(selector).ok()?.as_node().clone();
    node.detach();
    Some(node)
}
