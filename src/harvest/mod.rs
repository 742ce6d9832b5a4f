//! Attachment harvesting pipeline
//!
//! One request flows through four stages connected by bounded channels:
//!
//! 1. [`enumerate_ids`] lists every message from the sender (all pages first)
//! 2. [`spawn_content_fetcher`] fetches each message, bounded fan-out
//! 3. [`spawn_attachment_extractor`] fetches the payload of every named part
//! 4. [`spawn_assembler`] writes a zip archive from a single blocking task
//!
//! Every stage reports failures into a shared [`FirstFailure`] slot. The first
//! failure cancels the request, and [`Harvester::harvest`] checks the slot
//! before accepting each stage as done.

mod assemble;
mod context;
mod enumerate;
mod extract;
mod failure;
mod fetch;
mod orchestrator;

pub use assemble::{ArchiveFile, ArchiveSummary, decode_payload, spawn_assembler};
pub use context::{HarvestContext, StageStats};
pub use enumerate::{enumerate_ids, sender_query};
pub use extract::{display_filename, spawn_attachment_extractor};
pub use failure::FirstFailure;
pub use fetch::spawn_content_fetcher;
pub use orchestrator::{HarvestedArchive, Harvester};
