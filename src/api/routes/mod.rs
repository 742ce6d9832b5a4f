//! Route handlers for the REST API
//!
//! - `harvest`: attachment download
//! - `system`: health, OpenAPI

use serde::{Deserialize, Serialize};

mod harvest;
mod system;

pub use harvest::*;
pub use system::*;

/// Parameters for `/download/attachment`, from the query string or a form body
#[derive(Debug, Default, Clone, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HarvestParams {
    /// Address whose attachments are collected; empty when absent
    #[serde(rename = "emailThatSentAttach", default)]
    pub email_that_sent_attach: String,
}
