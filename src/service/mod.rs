//service/mod.rs
pub mod file_service;
pub mod request;

use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use log::{debug, info};
use serde_json::json;
use std::convert::TryFrom;
use std::sync::Arc;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::render;
use crate::service::request::{
    ColumnStatsRequest, FileOperationRequest, MultipartFields, RawForm, SliceRequest, TokenRequest, UploadRequest,
    VisualizationRequest,
};
use crate::tabular::DataFrame;

/// Rows returned by the head endpoint
pub const HEAD_ROWS: usize = 5;

/// Values copied into the log MDC for the duration of a request
#[derive(Debug, Clone)]
struct LogTags {
    token: String,
    file: String,
}

impl LogTags {
    fn new(token: &str, file: Option<&str>) -> Self {
        Self {
            token: token.to_string(),
            file: file.unwrap_or("-").to_string(),
        }
    }

    fn for_file(request: &FileOperationRequest) -> Self {
        Self::new(&request.token, Some(&request.file_name))
    }

    /// Tag the current thread until the guard drops
    fn apply(&self) -> MdcGuard {
        log_mdc::insert("token", self.token.as_str());
        log_mdc::insert("file", self.file.as_str());
        MdcGuard
    }
}

struct MdcGuard;

impl Drop for MdcGuard {
    fn drop(&mut self) {
        log_mdc::clear();
    }
}

/// Run filesystem work on the blocking pool with the request's MDC tags.
/// Async workers interleave requests, so only the blocking thread is tagged.
async fn blocking<T, F>(tags: LogTags, work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    web::block(move || {
        let _tagged = tags.apply();
        work()
    })
    .await?
}

/// Authorize and load the file named in `request`, then hand the frame to `work`
async fn with_frame<T, F>(state: &AppState, request: FileOperationRequest, work: F) -> Result<T, AppError>
where
    F: FnOnce(DataFrame) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(&state.file_service);
    blocking(LogTags::for_file(&request), move || {
        let frame = service.load_frame(&request.token, &request.file_name)?;
        work(frame)
    })
    .await
}

fn too_large(limit: u64) -> AppError {
    AppError::Validation(format!("Upload exceeds the maximum size of {} bytes", limit))
}

/// Collect a raw request body, refusing anything over `limit` bytes
async fn read_body(mut payload: web::Payload, limit: u64) -> Result<Bytes, AppError> {
    let mut bytes = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::Validation(format!("Failed to read upload body: {}", e)))?;
        if (bytes.len() + chunk.len()) as u64 > limit {
            return Err(too_large(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes.freeze())
}

/// Collect the `token` and `file` parts of a multipart upload; other parts are skipped
async fn read_multipart(req: &HttpRequest, payload: web::Payload, limit: u64) -> Result<MultipartFields, AppError> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut fields = MultipartFields::default();
    let mut received: u64 = 0;

    while let Some(field) = multipart.next().await {
        let mut field = field.map_err(|e| AppError::Validation(format!("Failed to process multipart: {}", e)))?;
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut bytes = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::Validation(format!("Failed to read file chunk: {}", e)))?;
            received += chunk.len() as u64;
            if received > limit {
                return Err(too_large(limit));
            }
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => {
                fields.file_name = file_name;
                fields.data = Some(bytes.freeze());
            }
            "token" => {
                let token = String::from_utf8(bytes.to_vec())
                    .map_err(|_| AppError::Validation("Invalid token field".to_string()))?;
                fields.token = Some(token);
            }
            other => debug!("Skipping multipart field {:?}", other),
        }
    }
    Ok(fields)
}

pub async fn upload_service(
    req: HttpRequest,
    payload: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let limit = app_state.config.server.max_payload_size;

    let request = if request::is_multipart(&req) {
        UploadRequest::try_from(read_multipart(&req, payload, limit).await?)?
    } else {
        let body = read_body(payload, limit).await?;
        UploadRequest::try_from((&req, body))?
    };
    info!("Received {} bytes for {}", request.data.len(), request.original_name);

    let service = Arc::clone(&app_state.file_service);
    let receipt = blocking(LogTags::new(&request.token, None), move || service.upload(&request)).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn remove_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let request = FileOperationRequest::try_from(form.into_inner())?;
    let service = Arc::clone(&app_state.file_service);
    let tags = LogTags::for_file(&request);
    blocking(tags, move || service.remove(&request.token, &request.file_name)).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "File deleted successfully" })))
}

pub async fn list_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let request = TokenRequest::try_from(form.into_inner())?;
    let service = Arc::clone(&app_state.file_service);
    let tags = LogTags::new(&request.token, None);
    let files = blocking(tags, move || service.list(&request.token)).await?;
    debug!("Listed {} files", files.len());
    Ok(HttpResponse::Ok().json(json!({ "files": files })))
}

pub async fn meta_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let request = FileOperationRequest::try_from(form.into_inner())?;
    let service = Arc::clone(&app_state.file_service);
    let tags = LogTags::for_file(&request);
    let info = blocking(tags, move || service.info(&request.token, &request.file_name)).await?;
    Ok(HttpResponse::Ok().json(info))
}

pub async fn describe_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let request = FileOperationRequest::try_from(form.into_inner())?;
    let summary = with_frame(&app_state, request, |frame| Ok(frame.describe()?)).await?;
    Ok(HttpResponse::Ok().json(summary))
}

pub async fn head_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let request = FileOperationRequest::try_from(form.into_inner())?;
    let rows = with_frame(&app_state, request, |frame| Ok(frame.head(HEAD_ROWS))).await?;
    Ok(HttpResponse::Ok().json(rows))
}

pub async fn columns_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let request = FileOperationRequest::try_from(form.into_inner())?;
    let columns = with_frame(&app_state, request, |frame| Ok(frame.column_names())).await?;
    Ok(HttpResponse::Ok().json(json!({ "columns": columns })))
}

pub async fn shape_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let request = FileOperationRequest::try_from(form.into_inner())?;
    let shape = with_frame(&app_state, request, |frame| Ok(frame.shape())).await?;
    Ok(HttpResponse::Ok().json(json!({ "shape": shape })))
}

pub async fn slice_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let SliceRequest { file, number, is_column, range_end } = SliceRequest::try_from(form.into_inner())?;
    let selected = with_frame(&app_state, file, move |frame| Ok(frame.select(number, is_column, range_end)?)).await?;
    Ok(HttpResponse::Ok().json(selected))
}

pub async fn column_stats_service(
    form: web::Form<RawForm>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let ColumnStatsRequest { file, column } = ColumnStatsRequest::try_from(form.into_inner())?;
    let stats = with_frame(&app_state, file, move |frame| Ok(frame.column_stats(&column)?)).await?;
    Ok(HttpResponse::Ok().json(stats))
}

pub async fn aggregate_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let request = FileOperationRequest::try_from(form.into_inner())?;
    let aggregate = with_frame(&app_state, request, |frame| {
        Ok(json!({
            "describe": frame.describe()?,
            "head": frame.head(HEAD_ROWS),
            "columns": frame.column_names(),
            "shape": frame.shape(),
        }))
    })
    .await?;
    Ok(HttpResponse::Ok().json(aggregate))
}

pub async fn visualize_service(form: web::Form<RawForm>, app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let VisualizationRequest { file, plot } = VisualizationRequest::try_from(form.into_inner())?;
    let image = with_frame(&app_state, file, move |frame| Ok(render::render(&frame, &plot)?)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "image": image,
        "format": render::IMAGE_FORMAT,
        "media_type": render::MEDIA_TYPE,
    })))
}
