//! [`RewriteEngine`] backed by the `lol_html` streaming HTML rewriter.

use std::string::FromUtf8Error;

use ::lol_html::errors::RewritingError;
use ::lol_html::{HtmlRewriter, OutputSink as LolOutputSink, Settings};
use thiserror::Error;

use crate::engine::{OutputSink, RewriteEngine, RewriteSession};

#[derive(Debug, Error)]
pub enum LolHtmlError {
    #[error(transparent)]
    Rewriting(#[from] RewritingError),
    #[error("rewritten document is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("rewriter already ended")]
    Ended,
}

/// Builds a fresh `lol_html` rewriter per session from a settings factory.
///
/// `lol_html::Settings` owns its handlers and cannot be cloned, so the factory is called once per
/// session and once per full-buffer transform.
pub struct LolHtmlEngine<F> {
    settings: F,
}

impl<F> LolHtmlEngine<F>
where
    F: Fn() -> Settings<'static, 'static>,
{
    pub fn new(settings: F) -> Self {
        Self { settings }
    }
}

struct SinkBridge<S>(S);

impl<S: OutputSink> LolOutputSink for SinkBridge<S> {
    fn handle_chunk(&mut self, chunk: &[u8]) {
        self.0.handle_chunk(chunk);
    }
}

pub struct LolHtmlSession<S: OutputSink> {
    rewriter: Option<HtmlRewriter<'static, SinkBridge<S>>>,
}

impl<S: OutputSink> RewriteSession for LolHtmlSession<S> {
    type Error = LolHtmlError;

    fn write(&mut self, chunk: &[u8]) -> Result<(), LolHtmlError> {
        match self.rewriter.as_mut() {
            Some(rewriter) => Ok(rewriter.write(chunk)?),
            // `end` consumed the rewriter.
            None => Err(LolHtmlError::Ended),
        }
    }

    fn end(&mut self) -> Result<(), LolHtmlError> {
        match self.rewriter.take() {
            Some(rewriter) => Ok(rewriter.end()?),
            None => Ok(()),
        }
    }
}

impl<F> RewriteEngine for LolHtmlEngine<F>
where
    F: Fn() -> Settings<'static, 'static>,
{
    type Error = LolHtmlError;
    type Session<S: OutputSink> = LolHtmlSession<S>;

    fn new_session<S: OutputSink>(&self, sink: S) -> Result<LolHtmlSession<S>, LolHtmlError> {
        Ok(LolHtmlSession {
            rewriter: Some(HtmlRewriter::new((self.settings)(), SinkBridge(sink))),
        })
    }

    fn transform_full(&self, input: &str) -> Result<String, LolHtmlError> {
        let mut out = Vec::with_capacity(input.len());
        let mut rewriter = HtmlRewriter::new((self.settings)(), |chunk: &[u8]| {
            out.extend_from_slice(chunk)
        });
        rewriter.write(input.as_bytes())?;
        rewriter.end()?;
        Ok(String::from_utf8(out)?)
    }
}
