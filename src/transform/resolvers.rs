//! Collaborator interfaces
//!
//! Link resolution, markdown rendering, HTML processing and cross-reference
//! lookup belong to the host. The transformer only sees these traits; all
//! calls are synchronous from its point of view.

use std::sync::Arc;

use crate::diagnostics::{ContentError, SourceLocation};

/// Resolves a raw `href` relative to the file it appears in
pub trait LinkResolver: Send + Sync {
    fn resolve_link(&self, href: &str, file: &str, location: &SourceLocation) -> (Option<ContentError>, String);
}

/// Renders markdown to HTML; `inline` renders without block elements
pub trait MarkdownRenderer: Send + Sync {
    fn render_markdown(&self, markdown: &str, file: &str, inline: bool) -> (Vec<ContentError>, String);
}

/// Rewrites and cleans HTML fragments
pub trait HtmlProcessor: Send + Sync {
    /// Replace every hyperlink target in `html` with `on_link(target)`
    fn rewrite_links(&self, html: &str, on_link: &mut dyn FnMut(&str) -> String) -> String;

    fn sanitize(&self, html: &str) -> String;
}

/// Resolves a cross-reference uid to a link
pub trait XrefResolver: Send + Sync {
    fn resolve_xref(&self, uid: &str, file: &str) -> (Option<ContentError>, String);
}

/// The collaborator bundle a transformer works with
#[derive(Clone)]
pub struct Resolvers {
    pub link: Arc<dyn LinkResolver>,
    pub markdown: Arc<dyn MarkdownRenderer>,
    pub html: Arc<dyn HtmlProcessor>,
    pub xref: Arc<dyn XrefResolver>,
}

impl Resolvers {
    /// Collaborators that return every value unchanged
    pub fn passthrough() -> Self {
        let passthrough = Arc::new(Passthrough);
        Self {
            link: passthrough.clone(),
            markdown: passthrough.clone(),
            html: passthrough.clone(),
            xref: passthrough,
        }
    }

    pub fn with_link(mut self, link: Arc<dyn LinkResolver>) -> Self {
        self.link = link;
        self
    }

    pub fn with_markdown(mut self, markdown: Arc<dyn MarkdownRenderer>) -> Self {
        self.markdown = markdown;
        self
    }

    pub fn with_html(mut self, html: Arc<dyn HtmlProcessor>) -> Self {
        self.html = html;
        self
    }

    pub fn with_xref(mut self, xref: Arc<dyn XrefResolver>) -> Self {
        self.xref = xref;
        self
    }
}

impl Default for Resolvers {
    fn default() -> Self {
        Self::passthrough()
    }
}

impl std::fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolvers").finish_non_exhaustive()
    }
}

/// Identity collaborator
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl LinkResolver for Passthrough {
    fn resolve_link(&self, href: &str, _file: &str, _location: &SourceLocation) -> (Option<ContentError>, String) {
        (None, href.to_string())
    }
}

impl MarkdownRenderer for Passthrough {
    fn render_markdown(&self, markdown: &str, _file: &str, _inline: bool) -> (Vec<ContentError>, String) {
        (Vec::new(), markdown.to_string())
    }
}

impl HtmlProcessor for Passthrough {
    fn rewrite_links(&self, html: &str, _on_link: &mut dyn FnMut(&str) -> String) -> String {
        html.to_string()
    }

    fn sanitize(&self, html: &str) -> String {
        html.to_string()
    }
}

impl XrefResolver for Passthrough {
    fn resolve_xref(&self, uid: &str, _file: &str) -> (Option<ContentError>, String) {
        (None, uid.to_string())
    }
}
