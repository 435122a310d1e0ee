//! DOM helpers and ordered fallback strategies.
//!
//! Sites drift, so a field is rarely found with one selector. Instead each
//! field gets an ordered list of [`Strategy`] values; [`first_success`] runs
//! them in order and keeps the first one that yields something.

use crate::utils::collapse_whitespace;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// One way of pulling a value of type `T` out of an element.
pub trait Strategy<T> {
    fn apply(&self, el: ElementRef<'_>) -> Option<T>;
}

/// Run `strategies` in order and return the first value produced.
pub fn first_success<T>(el: ElementRef<'_>, strategies: &[Box<dyn Strategy<T>>]) -> Option<T> {
    strategies.iter().find_map(|s| s.apply(el))
}

/// Parse a CSS selector, treating an invalid one as "matches nothing".
pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// All elements in `doc` matching `css`, in document order.
pub fn select_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => doc.select(&sel).collect(),
        None => Vec::new(),
    }
}

/// All descendants of `el` matching `css`, in document order.
pub fn select_within<'a>(el: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => el.select(&sel).collect(),
        None => Vec::new(),
    }
}

/// First descendant of `el` matching `css`.
pub fn select_first<'a>(el: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    el.select(&sel).next()
}

/// Rendered-ish text of an element: all text nodes, whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Resolve `href` against `base`, falling back to the raw value when it
/// cannot be joined.
pub fn resolve_href(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Text of the first element matching the selector, if non-empty.
pub struct TextOf(pub &'static str);

impl Strategy<String> for TextOf {
    fn apply(&self, el: ElementRef<'_>) -> Option<String> {
        select_first(el, self.0).map(element_text).and_then(non_empty)
    }
}

/// First match of `pattern` in the text of the parent of the first element
/// matching the selector. Used where a label sits next to its value.
pub struct ParentCapture {
    pub css: &'static str,
    pub pattern: &'static Regex,
}

impl Strategy<String> for ParentCapture {
    fn apply(&self, el: ElementRef<'_>) -> Option<String> {
        let found = select_first(el, self.css)?;
        let parent = found.parent().and_then(ElementRef::wrap)?;
        self.pattern
            .find(&element_text(parent))
            .map(|m| m.as_str().to_string())
    }
}

/// Text and resolved `href` of the first anchor matching the selector; both
/// must be non-empty.
pub struct AnchorOf {
    pub css: &'static str,
    pub base: Url,
}

impl Strategy<(String, String)> for AnchorOf {
    fn apply(&self, el: ElementRef<'_>) -> Option<(String, String)> {
        let anchor = select_first(el, self.css)?;
        let text = element_text(anchor);
        let href = anchor.value().attr("href").map(str::trim).unwrap_or("");
        if text.is_empty() || href.is_empty() {
            return None;
        }
        Some((text, resolve_href(&self.base, href)))
    }
}

/// Resolved value of `attr` on the first element matching the selector.
pub struct AttrOf {
    pub css: &'static str,
    pub attr: &'static str,
    pub base: Url,
}

impl Strategy<String> for AttrOf {
    fn apply(&self, el: ElementRef<'_>) -> Option<String> {
        let found = select_first(el, self.css)?;
        let value = found.value().attr(self.attr).map(str::trim)?;
        if value.is_empty() {
            return None;
        }
        Some(resolve_href(&self.base, value))
    }
}
