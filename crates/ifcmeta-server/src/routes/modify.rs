use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use ifcmeta_core::{paths, IfcModel, NameUpdate};

use crate::deadline::{self, Deadline};
use crate::error::AppError;
use crate::routes::header_str;
use crate::state::AppState;
use crate::upload;

pub const PROJECT_FIELD: &str = "ifcProjectValue";
pub const SITE_FIELD: &str = "ifcSiteValue";
pub const BUILDING_FIELD: &str = "ifcBuildingValue";
pub const SAVE_FIELD: &str = "saveToFolder";

pub const FILE_SIZE_HEADER: &str = "x-file-size";
pub const PROCESSING_MODE_HEADER: &str = "x-processing-mode";
/// Set on the response when the modified file was kept in the output
/// directory; carries its filename.
pub const SAVED_FILE_HEADER: &str = "x-saved-file";

const LARGE_FILE_BYTES: u64 = 100 * 1024 * 1024;

/// POST /modify_ifc: rewrite project, site and building names and return
/// the modified file as a download.
pub async fn modify_ifc(
    State(app): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let deadline = Deadline::start(deadline::PROCESSING.resolve(&headers), "process");
    let mode = header_str(&headers, PROCESSING_MODE_HEADER).unwrap_or("complete");
    let declared_size = header_str(&headers, FILE_SIZE_HEADER)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    tracing::info!(
        size_mb = %format!("{:.2}", declared_size as f64 / (1024.0 * 1024.0)),
        mode,
        timeout_secs = deadline.budget().as_secs(),
        "processing IFC file"
    );
    if declared_size > LARGE_FILE_BYTES {
        tracing::info!(declared_size, "large file detected");
    }

    let form = deadline
        .run(upload::read_form(multipart?, app.upload_dir()))
        .await?;
    let save_to_folder = form.field(SAVE_FIELD).is_some_and(is_truthy);
    let update = NameUpdate {
        project: form.field(PROJECT_FIELD).map(str::to_owned),
        site: form.field(SITE_FIELD).map(str::to_owned),
        building: form.field(BUILDING_FIELD).map(str::to_owned),
    };
    let Some(upload) = form.file else {
        return Err(AppError::bad_request("No file provided"));
    };

    let download_name = paths::modified_filename(upload.filename());
    let saved_path = save_to_folder.then(|| app.output_dir().join(&download_name));
    let input = upload.path().to_path_buf();
    let target = saved_path.clone();
    let bytes = deadline
        .run_blocking(move || {
            let mut model = IfcModel::open(&input)?;
            update.apply(&mut model)?;
            // Atomic: a failed write leaves any earlier copy in place.
            if let Some(target) = &target {
                model.write(target)?;
            }
            Ok(model.to_bytes())
        })
        .await?;

    tracing::info!(
        filename = upload.filename(),
        size = upload.size(),
        bytes = bytes.len(),
        saved = ?saved_path,
        "IFC file modified"
    );

    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{download_name}\""),
            ),
        ],
        bytes,
    )
        .into_response();

    if saved_path.is_some() {
        response
            .headers_mut()
            .insert(SAVED_FILE_HEADER, HeaderValue::from_str(&download_name)?);
    }
    Ok(response)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
