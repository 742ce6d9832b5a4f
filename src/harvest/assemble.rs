//! Archive assembly: a single blocking task owns the zip writer.

use crate::error::PipelineError;
use crate::types::{Attachment, Stage};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use super::HarvestContext;

const CREATE_LABEL: &str = "Unable to create a file";
const ENTRY_LABEL: &str = "Unable to add an archive entry";
const WRITE_LABEL: &str = "Unable to write a file to the disk";
const FINALIZE_LABEL: &str = "Unable to finalize the archive";
pub(crate) const DECODE_LABEL: &str = "Unable to decode Attachment";

/// Base64url, accepting payloads with or without padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url attachment payload.
pub fn decode_payload(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    PAYLOAD_ENGINE.decode(data.trim_end())
}

/// Request-scoped archive location that is removed when dropped.
///
/// The owner of this guard decides the archive's lifetime: the orchestrator
/// while the request runs, then the HTTP response body while it streams.
#[derive(Debug)]
pub struct ArchiveFile {
    path: PathBuf,
    file_name: String,
}

impl ArchiveFile {
    /// Reserve `attachments-<unixtime>-<token>.zip` under `dir`.
    pub fn new_in(dir: &Path, token: &str) -> Self {
        let file_name = format!(
            "attachments-{}-{}.zip",
            chrono::Utc::now().timestamp(),
            token
        );
        Self {
            path: dir.join(&file_name),
            file_name,
        }
    }

    /// Full path of the archive
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used in `Content-Disposition`
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl Drop for ArchiveFile {
    fn drop(&mut self) {
        remove_archive(&self.path);
    }
}

fn remove_archive(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed archive"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove archive"),
    }
}

/// What the assembler wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entry names in write order
    pub entries: Vec<String>,
    /// Total decoded bytes written across entries
    pub bytes_written: u64,
}

/// Spawn the archive assembler.
///
/// The task creates `archive_path`, writes one entry per attachment and
/// finalises the archive once the channel closes. Resolves to `None` when the
/// request failed or was cancelled; in that case the partial file is removed.
pub fn spawn_assembler(
    ctx: &HarvestContext,
    archive_path: PathBuf,
    attachments: mpsc::Receiver<Attachment>,
) -> JoinHandle<Option<ArchiveSummary>> {
    let ctx = ctx.clone();
    tokio::task::spawn_blocking(move || {
        match write_archive(&ctx, &archive_path, attachments) {
            Ok(Some(summary)) => {
                tracing::info!(
                    request_id = %ctx.request_id,
                    entries = summary.entries.len(),
                    bytes = summary.bytes_written,
                    "Archive finalised"
                );
                Some(summary)
            }
            Ok(None) => {
                tracing::debug!(request_id = %ctx.request_id, "Assembly abandoned after cancellation");
                remove_archive(&archive_path);
                None
            }
            Err(e) => {
                ctx.failures.record(e);
                remove_archive(&archive_path);
                None
            }
        }
    })
}

/// `Ok(None)` means the request was cancelled before the archive was finalised.
fn write_archive(
    ctx: &HarvestContext,
    archive_path: &Path,
    mut attachments: mpsc::Receiver<Attachment>,
) -> Result<Option<ArchiveSummary>, PipelineError> {
    if ctx.cancel.is_cancelled() {
        return Ok(None);
    }

    let file = File::create(archive_path)
        .map_err(|e| PipelineError::new(Stage::Assemble, CREATE_LABEL, e))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated);

    let mut names = EntryNames::default();
    let mut summary = ArchiveSummary {
        entries: Vec::new(),
        bytes_written: 0,
    };

    while let Some(attachment) = attachments.blocking_recv() {
        if ctx.cancel.is_cancelled() {
            return Ok(None);
        }

        let bytes = decode_payload(&attachment.data).map_err(|e| {
            tracing::warn!(
                request_id = %ctx.request_id,
                message_id = %attachment.message_id,
                filename = %attachment.filename,
                error = %e,
                "Attachment payload is not valid base64url"
            );
            PipelineError::new(Stage::FetchAttachment, DECODE_LABEL, e)
        })?;

        let name = names.claim(&attachment.filename);
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| PipelineError::new(Stage::Assemble, ENTRY_LABEL, e))?;
        writer
            .write_all(&bytes)
            .map_err(|e| PipelineError::new(Stage::Assemble, WRITE_LABEL, e))?;

        summary.bytes_written += bytes.len() as u64;
        summary.entries.push(name);
    }

    // Upstream stages close their channels on cancellation as well.
    if ctx.cancel.is_cancelled() {
        return Ok(None);
    }

    let mut file = writer
        .finish()
        .map_err(|e| PipelineError::new(Stage::Assemble, FINALIZE_LABEL, e))?;
    file.flush()
        .map_err(|e| PipelineError::new(Stage::Assemble, FINALIZE_LABEL, e))?;

    Ok(Some(summary))
}

/// Hands out unique, path-free archive entry names.
#[derive(Debug, Default)]
pub(crate) struct EntryNames {
    used: HashSet<String>,
}

impl EntryNames {
    /// Sanitise `raw` and, if already taken, append ` (1)`, ` (2)`, ... before the extension.
    pub(crate) fn claim(&mut self, raw: &str) -> String {
        let clean = sanitize_entry_name(raw);
        if self.used.insert(clean.clone()) {
            return clean;
        }

        let (stem, extension) = match clean.rfind('.') {
            Some(dot) if dot > 0 => (&clean[..dot], Some(&clean[dot + 1..])),
            _ => (clean.as_str(), None),
        };

        let mut i = 1u64;
        loop {
            let candidate = match extension {
                Some(ext) => format!("{stem} ({i}).{ext}"),
                None => format!("{stem} ({i})"),
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            i += 1;
        }
    }
}

/// Strip path separators so an entry can never escape the archive root.
pub(crate) fn sanitize_entry_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "attachment".to_string(),
        trimmed => trimmed.to_string(),
    }
}
