//! Lazy, bounded sequence of raw payloads.

use std::collections::VecDeque;

use crate::entity::source::Model as SourceModel;
use crate::model::{MaxResults, RawPayload};

use super::SourceAdapter;
use super::errors::FetchError;
use super::types::{FetchOptions, PageRequest};

/// Pulls pages from an adapter on demand.
///
/// Nothing is requested until [`PayloadStream::next`] is called, and no page is
/// requested once `max_results` payloads have been handed out, so a bounded
/// run never fetches more pages than it consumes.
pub struct PayloadStream<'a> {
    adapter: &'a dyn SourceAdapter,
    source: &'a SourceModel,
    max_results: MaxResults,
    buffer: VecDeque<RawPayload>,
    next_token: Option<String>,
    exhausted: bool,
    consumed: usize,
    pages_fetched: u32,
}

impl<'a> PayloadStream<'a> {
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        source: &'a SourceModel,
        options: &FetchOptions,
    ) -> Self {
        Self {
            adapter,
            source,
            max_results: options.max_results,
            buffer: VecDeque::new(),
            next_token: None,
            exhausted: false,
            consumed: 0,
            pages_fetched: 0,
        }
    }

    /// Next payload, newest first. `Ok(None)` once the listing or the bound
    /// is exhausted.
    pub async fn next(&mut self) -> Result<Option<RawPayload>, FetchError> {
        if !self.max_results.allows(self.consumed) {
            return Ok(None);
        }

        if self.buffer.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            self.fill().await?;
        }

        let next = self.buffer.pop_front();
        if next.is_some() {
            self.consumed += 1;
        }
        Ok(next)
    }

    async fn fill(&mut self) -> Result<(), FetchError> {
        let page_size = match self.max_results.remaining(self.consumed) {
            Some(remaining) => remaining.min(self.adapter.max_page_size()),
            None => self.adapter.max_page_size(),
        };

        let page = self
            .adapter
            .fetch_page(
                self.source,
                PageRequest {
                    token: self.next_token.take(),
                    page_size,
                },
            )
            .await?;
        self.pages_fetched += 1;

        tracing::debug!(
            source_id = %self.source.id,
            page = self.pages_fetched,
            payloads = page.payloads.len(),
            has_next = page.next_token.is_some(),
            "Fetched page"
        );

        // An empty page ends the listing even if the platform hands out a token.
        self.exhausted = page.next_token.is_none() || page.payloads.is_empty();
        self.next_token = page.next_token;
        self.buffer.extend(page.payloads);
        Ok(())
    }

    /// Payloads handed out so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Upstream pages requested so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }
}
