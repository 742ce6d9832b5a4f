//! Request orchestration: wires the stages together and gates each transition.

use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use crate::mail::MailClient;
use crate::types::RequestState;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::assemble::{ArchiveFile, ArchiveSummary, spawn_assembler};
use super::context::{HarvestContext, StageStats};
use super::enumerate::enumerate_ids;
use super::extract::spawn_attachment_extractor;
use super::fetch::spawn_content_fetcher;

/// Runs harvest requests with a fixed pipeline configuration.
#[derive(Clone, Debug)]
pub struct Harvester {
    config: HarvestConfig,
}

/// A finalised archive ready to be served.
///
/// Dropping this value deletes the archive from disk.
#[derive(Debug)]
pub struct HarvestedArchive {
    /// Random token identifying the request
    pub request_id: String,
    /// The archive file guard
    pub archive: ArchiveFile,
    /// Entries written by the assembler
    pub summary: ArchiveSummary,
    /// Messages fetched by the content stage
    pub messages: usize,
}

impl HarvestedArchive {
    /// Number of entries in the archive
    pub fn entry_count(&self) -> usize {
        self.summary.entries.len()
    }
}

impl Harvester {
    /// Create a harvester.
    pub fn new(config: HarvestConfig) -> Self {
        Self { config }
    }

    /// Pipeline settings in use
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Collect every attachment sent by `sender` into a fresh archive.
    ///
    /// Returns the first stage failure, if any; in that case no archive is
    /// left on disk. Dropping the returned future cancels every stage.
    pub async fn harvest(
        &self,
        client: Arc<dyn MailClient>,
        sender: &str,
    ) -> Result<HarvestedArchive> {
        let ctx = HarvestContext::new(&self.config);
        // Fires when the request future is dropped, e.g. on client disconnect.
        let _cancel_on_drop = ctx.cancel.clone().drop_guard();
        let mut lifecycle = Lifecycle::new(&ctx.request_id);

        tracing::info!(request_id = %ctx.request_id, sender = %sender, "Starting harvest");

        let result = self.run(&ctx, &mut lifecycle, client, sender).await;
        match &result {
            Ok(archive) => {
                lifecycle.advance(RequestState::Served);
                tracing::info!(
                    request_id = %ctx.request_id,
                    messages = archive.messages,
                    entries = archive.entry_count(),
                    "Harvest complete"
                );
            }
            Err(e) => lifecycle.fail(e),
        }
        tracing::debug!(request_id = %ctx.request_id, states = ?lifecycle.history(), "Harvest lifecycle");
        result
    }

    async fn run(
        &self,
        ctx: &HarvestContext,
        lifecycle: &mut Lifecycle,
        client: Arc<dyn MailClient>,
        sender: &str,
    ) -> Result<HarvestedArchive> {
        let archive = ArchiveFile::new_in(&self.config.archive_dir, &ctx.request_id);

        let ids = enumerate_ids(ctx, Arc::clone(&client), sender).await?;
        lifecycle.advance(RequestState::EnumerationDone);

        let (messages, fetch) = spawn_content_fetcher(ctx, Arc::clone(&client), ids);
        let (attachments, extract) = spawn_attachment_extractor(ctx, client, messages);
        let assemble = spawn_assembler(ctx, archive.path().to_path_buf(), attachments);
        let mut stages = StageHandles {
            fetch: Some(fetch),
            extract: Some(extract),
            assemble: Some(assemble),
        };

        let outcome = stages.await_in_order(ctx, lifecycle).await;
        if outcome.is_err() {
            // Every remaining stage observes the cancelled token and exits promptly.
            ctx.cancel.cancel();
            stages.settle().await;
        }
        let (fetch_stats, summary) = outcome?;

        Ok(HarvestedArchive {
            request_id: ctx.request_id.clone(),
            archive,
            summary,
            messages: fetch_stats.emitted,
        })
    }
}

struct StageHandles {
    fetch: Option<JoinHandle<StageStats>>,
    extract: Option<JoinHandle<StageStats>>,
    assemble: Option<JoinHandle<Option<ArchiveSummary>>>,
}

impl StageHandles {
    async fn await_in_order(
        &mut self,
        ctx: &HarvestContext,
        lifecycle: &mut Lifecycle,
    ) -> Result<(StageStats, ArchiveSummary)> {
        let fetch_stats = join_stage("fetch", self.fetch.take()).await?;
        gate(ctx)?;
        lifecycle.advance(RequestState::ContentFetched);

        join_stage("extract", self.extract.take()).await?;
        gate(ctx)?;
        lifecycle.advance(RequestState::AttachmentsFetched);

        lifecycle.advance(RequestState::Assembling);
        let summary = join_stage("assemble", self.assemble.take()).await?;
        gate(ctx)?;

        match summary {
            Some(summary) => Ok((fetch_stats, summary)),
            None => Err(Error::Other("harvest request was cancelled".to_string())),
        }
    }

    async fn settle(&mut self) {
        if let Some(handle) = self.fetch.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.extract.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.assemble.take() {
            let _ = handle.await;
        }
    }
}

async fn join_stage<T>(name: &str, handle: Option<JoinHandle<T>>) -> Result<T> {
    let handle =
        handle.ok_or_else(|| Error::Other(format!("{name} stage was already joined")))?;
    handle
        .await
        .map_err(|e| Error::Other(format!("{name} stage task failed: {e}")))
}

/// Fail the request if any stage has reported an error.
fn gate(ctx: &HarvestContext) -> Result<()> {
    match ctx.failures.first() {
        Some(failure) => Err(Error::Pipeline(failure)),
        None => Ok(()),
    }
}

/// Tracks and logs the per-request state machine.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    request_id: String,
    state: RequestState,
    history: Vec<RequestState>,
}

impl Lifecycle {
    pub(crate) fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            state: RequestState::AuthExtracted,
            history: vec![RequestState::AuthExtracted],
        }
    }

    pub(crate) fn history(&self) -> &[RequestState] {
        &self.history
    }

    pub(crate) fn advance(&mut self, next: RequestState) {
        debug_assert!(
            is_valid_transition(self.state, next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(request_id = %self.request_id, from = ?self.state, to = ?next, "Harvest state transition");
        self.state = next;
        self.history.push(next);
    }

    pub(crate) fn fail(&mut self, error: &Error) {
        if self.state.is_terminal() {
            return;
        }
        tracing::warn!(request_id = %self.request_id, state = ?self.state, error = %error, "Harvest failed");
        self.state = RequestState::Error;
        self.history.push(RequestState::Error);
    }
}

pub(crate) fn is_valid_transition(from: RequestState, to: RequestState) -> bool {
    matches!(
        (from, to),
        (RequestState::AuthExtracted, RequestState::EnumerationDone)
            | (RequestState::EnumerationDone, RequestState::ContentFetched)
            | (RequestState::ContentFetched, RequestState::AttachmentsFetched)
            | (RequestState::AttachmentsFetched, RequestState::Assembling)
            | (RequestState::Assembling, RequestState::Served)
    ) || (to == RequestState::Error && !from.is_terminal())
}
