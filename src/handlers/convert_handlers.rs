//! `POST /convert`: re-encode a file from the conversion directory.

use crate::{errors::AppError, services::convert_service::AudioFormat, state::AppState};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub filename: Option<String>,
    pub target: Option<String>,
}

#[derive(Serialize)]
pub struct ConvertResponse {
    message: &'static str,
    output: String,
}

pub async fn convert(
    State(state): State<AppState>,
    body: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, AppError> {
    let Json(req) = body?;
    let (Some(filename), Some(target)) = (req.filename, req.target) else {
        return Err(AppError::validation("filename and target are required"));
    };
    let target: AudioFormat = target
        .parse()
        .map_err(|_| AppError::validation("target must be mp3 or wav"))?;

    let output = state.converter.convert(&filename, Some(target)).await?;
    Ok(Json(ConvertResponse {
        message: "converted",
        output: output.display().to_string(),
    }))
}
