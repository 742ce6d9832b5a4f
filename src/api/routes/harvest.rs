//! Attachment download handlers.

use super::HarvestParams;
use crate::api::AppState;
use crate::auth::extract_bearer;
use crate::error::{Result, ToHttpStatus};
use crate::harvest::HarvestedArchive;
use axum::{
    body::Body,
    extract::{Form, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tokio_util::io::ReaderStream;

/// GET /download/attachment - Download every attachment from a sender as a zip archive
#[utoipa::path(
    get,
    path = "/download/attachment",
    tag = "harvest",
    params(HarvestParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Zip archive (application/zip) of every attachment"),
        (status = 400, description = "Malformed bearer token or a mail service stage failed", body = crate::error::ApiError),
        (status = 500, description = "The archive could not be written", body = crate::error::ApiError)
    )
)]
pub async fn download_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HarvestParams>,
) -> Response {
    respond(&state, &headers, params.email_that_sent_attach).await
}

/// POST /download/attachment - Same as GET; the sender may also come from a form body
#[utoipa::path(
    post,
    path = "/download/attachment",
    tag = "harvest",
    params(HarvestParams),
    request_body(content = HarvestParams, content_type = "application/x-www-form-urlencoded"),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Zip archive (application/zip) of every attachment"),
        (status = 400, description = "Malformed bearer token or a mail service stage failed", body = crate::error::ApiError),
        (status = 500, description = "The archive could not be written", body = crate::error::ApiError)
    )
)]
pub async fn download_attachment_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HarvestParams>,
    form: Option<Form<HarvestParams>>,
) -> Response {
    // A non-empty form value wins over the query string.
    let sender = match form {
        Some(Form(body)) if !body.email_that_sent_attach.is_empty() => body.email_that_sent_attach,
        _ => query.email_that_sent_attach,
    };
    respond(&state, &headers, sender).await
}

async fn respond(state: &AppState, headers: &HeaderMap, sender: String) -> Response {
    match run_harvest(state, headers, &sender).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                status = e.status_code(),
                code = e.error_code(),
                error = %e,
                "Attachment download failed"
            );
            e.into_response()
        }
    }
}

async fn run_harvest(state: &AppState, headers: &HeaderMap, sender: &str) -> Result<Response> {
    let token = extract_bearer(headers)?;
    let credential = state.resolver.resolve(&token).await?;
    let client = state.connector.connect(&credential);

    let harvested = state.harvester.harvest(client, sender).await?;
    archive_response(harvested).await
}

/// Stream the archive back; the file is deleted once the body is dropped.
async fn archive_response(harvested: HarvestedArchive) -> Result<Response> {
    let file = tokio::fs::File::open(harvested.archive.path()).await?;
    let length = file.metadata().await?.len();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        harvested.archive.file_name()
    );

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _archive = &harvested;
        chunk
    });

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (header::CONTENT_DISPOSITION, disposition),
        (header::CONTENT_LENGTH, length.to_string()),
    ];
    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}
