use pulldown_cmark::{html, Options, Parser};
use std::sync::Arc;

use crate::error::Error;

/// Shown while a job is running
pub const LOADING_MESSAGE: &str = "Loading - this can take several minutes, so please be patient...";

/// Markdown to (untrusted) HTML
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// Strips anything executable from rendered HTML
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

/// Where results, errors and alerts end up
pub trait ResultView: Send + Sync {
    fn show_status(&self, text: &str);

    fn show_html(&self, html: &str);

    /// Error text, shown verbatim
    fn show_error(&self, text: &str);

    /// Blocking notice raised before anything is sent
    fn alert(&self, text: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkRenderer;

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let parser = Parser::new_ext(markdown, options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AmmoniaSanitizer;

impl HtmlSanitizer for AmmoniaSanitizer {
    fn sanitize(&self, html: &str) -> String {
        ammonia::clean(html)
    }
}

/// Turns the outcome of a submission into exactly one view update
pub struct ResultPresenter {
    renderer: Arc<dyn MarkdownRenderer>,
    sanitizer: Arc<dyn HtmlSanitizer>,
    view: Arc<dyn ResultView>,
}

impl ResultPresenter {
    pub fn new(
        renderer: Arc<dyn MarkdownRenderer>,
        sanitizer: Arc<dyn HtmlSanitizer>,
        view: Arc<dyn ResultView>,
    ) -> Self {
        Self {
            renderer,
            sanitizer,
            view,
        }
    }

    /// Default markdown renderer and sanitizer
    pub fn with_view(view: Arc<dyn ResultView>) -> Self {
        Self::new(Arc::new(CmarkRenderer), Arc::new(AmmoniaSanitizer), view)
    }

    /// Render, then sanitize. Model output is never shown unsanitized.
    pub fn to_safe_html(&self, markdown: &str) -> String {
        let rendered = self.renderer.render(markdown);
        self.sanitizer.sanitize(&rendered)
    }

    pub fn present(&self, markdown: &str) {
        let html = self.to_safe_html(markdown);
        self.view.show_html(&html);
    }

    pub fn present_error(&self, err: &Error) {
        self.view.show_error(&err.to_string());
    }

    pub fn present_outcome(&self, outcome: &Result<String, Error>) {
        match outcome {
            Ok(markdown) => self.present(markdown),
            Err(err) => self.present_error(err),
        }
    }

    pub fn loading(&self) {
        self.view.show_status(LOADING_MESSAGE);
    }

    pub fn alert(&self, text: &str) {
        self.view.alert(text);
    }
}
