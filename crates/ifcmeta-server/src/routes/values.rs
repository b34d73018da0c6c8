use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use ifcmeta_core::{IfcModel, ModelNames};

use crate::deadline::{self, Deadline};
use crate::error::AppError;
use crate::routes::header_str;
use crate::state::AppState;
use crate::upload;

pub const ANALYSIS_MODE_HEADER: &str = "x-analysis-mode";

/// POST /get_ifc_values: project, site and building names of an uploaded
/// model.
pub async fn get_ifc_values(
    State(app): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ModelNames>, AppError> {
    let deadline = Deadline::start(deadline::ANALYSIS.resolve(&headers), "analyze");
    let mode = header_str(&headers, ANALYSIS_MODE_HEADER).unwrap_or("fast");
    tracing::info!(mode, timeout_secs = deadline.budget().as_secs(), "analyzing IFC values");

    let form = deadline
        .run(upload::read_form(multipart?, app.upload_dir()))
        .await?;
    let upload = form
        .file
        .ok_or_else(|| AppError::bad_request("No file provided"))?;

    let path = upload.path().to_path_buf();
    let names = deadline
        .run_blocking(move || {
            let model = IfcModel::open(&path)?;
            ModelNames::read(&model)
        })
        .await?;

    tracing::info!(
        filename = upload.filename(),
        size = upload.size(),
        project = %names.project,
        site = %names.site,
        building = %names.building,
        "IFC values extracted"
    );
    Ok(Json(names))
}
