//! Request handlers

use super::error::ApiError;
use super::state::AppState;
use crate::agent::FinalAnswer;
use crate::sandbox::Attachment;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use tracing::{info, warn};

pub const USAGE_HINT: &str =
    "POST multipart: questions.txt (required) + optional files; returns the answer in the requested format.";

const QUESTION_SUFFIX: &str = "questions.txt";

pub async fn usage() -> &'static str {
    USAGE_HINT
}

pub async fn answer(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut question: Option<Bytes> = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        if question.is_none() && filename.to_lowercase().ends_with(QUESTION_SUFFIX) {
            question = Some(data);
        } else {
            attachments.push(Attachment::new(&filename, data));
        }
    }

    let question =
        question.ok_or_else(|| ApiError::BadRequest("questions.txt is required".to_string()))?;

    info!(
        question_bytes = question.len(),
        attachments = attachments.len(),
        "Received question"
    );

    let result = tokio::time::timeout(
        state.agent_timeout,
        state.analyst.answer(&question, &attachments),
    )
    .await;

    match result {
        Ok(Ok(FinalAnswer::Json(value))) => Ok(Json(value).into_response()),
        Ok(Ok(FinalAnswer::Text(text))) => Ok(text.into_response()),
        Ok(Err(e)) => {
            warn!(error = %e, "Analysis failed");
            Err(e.into())
        }
        Err(_) => {
            warn!(
                timeout_secs = state.agent_timeout.as_secs(),
                "Analysis timed out"
            );
            Err(ApiError::Timeout)
        }
    }
}
