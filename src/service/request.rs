//! Request structures for the HTTP handlers
//!
//! Form bodies are decoded into [`RawForm`] with every field optional, then
//! converted into the validated request for each endpoint. Conversion is the
//! only place a missing or malformed field is detected.

use crate::error::AppError;
use crate::render::{PlotRequest, PlotType};
use actix_web::http::header;
use actix_web::HttpRequest;
use bytes::Bytes;
use serde::Deserialize;
use std::convert::TryFrom;

/// Every form field any endpoint accepts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawForm {
    pub token: Option<String>,
    pub file_name: Option<String>,
    pub number: Option<String>,
    pub is_column: Option<String>,
    pub range_end: Option<String>,
    pub column: Option<String>,
    pub plot_type: Option<String>,
    pub column_x: Option<String>,
    pub column_y: Option<String>,
    pub column_z: Option<String>,
    pub filter_data: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("Missing required field: {}", field))),
    }
}

/// Blank optional fields count as absent
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_int(value: &str, field: &str) -> Result<i64, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid integer for {}: {}", field, value)))
}

/// Token only
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub token: String,
}

impl TryFrom<RawForm> for TokenRequest {
    type Error = AppError;

    fn try_from(form: RawForm) -> Result<Self, Self::Error> {
        Ok(Self { token: required(form.token, "token")? })
    }
}

/// Token plus the opaque name of one stored file
#[derive(Debug, Clone, PartialEq)]
pub struct FileOperationRequest {
    pub token: String,
    pub file_name: String,
}

impl FileOperationRequest {
    fn take(form: &mut RawForm) -> Result<Self, AppError> {
        Ok(Self {
            token: required(form.token.take(), "token")?,
            file_name: required(form.file_name.take(), "file_name")?,
        })
    }
}

impl TryFrom<RawForm> for FileOperationRequest {
    type Error = AppError;

    fn try_from(mut form: RawForm) -> Result<Self, Self::Error> {
        Self::take(&mut form)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceRequest {
    pub file: FileOperationRequest,
    pub number: i64,
    pub is_column: bool,
    pub range_end: Option<i64>,
}

impl TryFrom<RawForm> for SliceRequest {
    type Error = AppError;

    fn try_from(mut form: RawForm) -> Result<Self, Self::Error> {
        let file = FileOperationRequest::take(&mut form)?;
        let number = required(form.number.take(), "number")?;
        let is_column = required(form.is_column.take(), "is_column")?;
        let range_end = optional(form.range_end.take());

        let is_column = match is_column.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(AppError::Validation(format!(
                    "Invalid value for is_column: {} (expected true or false)",
                    other
                )))
            }
        };

        Ok(Self {
            number: parse_int(&number, "number")?,
            is_column,
            range_end: range_end.map(|v| parse_int(&v, "range_end")).transpose()?,
            file,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStatsRequest {
    pub file: FileOperationRequest,
    pub column: String,
}

impl TryFrom<RawForm> for ColumnStatsRequest {
    type Error = AppError;

    fn try_from(mut form: RawForm) -> Result<Self, Self::Error> {
        let file = FileOperationRequest::take(&mut form)?;
        let column = required(form.column.take(), "column")?;
        Ok(Self { file, column })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationRequest {
    pub file: FileOperationRequest,
    pub plot: PlotRequest,
}

impl TryFrom<RawForm> for VisualizationRequest {
    type Error = AppError;

    fn try_from(mut form: RawForm) -> Result<Self, Self::Error> {
        let file = FileOperationRequest::take(&mut form)?;
        let plot_type: PlotType = required(form.plot_type.take(), "plot_type")?.parse()?;
        let plot = PlotRequest {
            plot_type,
            column_x: optional(form.column_x.take()),
            column_y: optional(form.column_y.take()),
            column_z: optional(form.column_z.take()),
            filter: optional(form.filter_data.take()),
        };
        Ok(Self { file, plot })
    }
}

/// Upload in either encoding: raw bytes with `Token`/`File-Name` headers, or a
/// multipart form with `token` and `file` fields
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub token: String,
    pub original_name: String,
    pub data: Bytes,
}

fn header_value(req: &HttpRequest, name: &str, field: &str) -> Result<String, AppError> {
    let value = match req.headers().get(name) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AppError::Validation(format!("Invalid {} header value", name)))?
                .to_string(),
        ),
        None => None,
    };
    required(value, field)
}

impl TryFrom<(&HttpRequest, Bytes)> for UploadRequest {
    type Error = AppError;

    fn try_from((req, data): (&HttpRequest, Bytes)) -> Result<Self, Self::Error> {
        let token = header_value(req, "Token", "token")?;
        let original_name = header_value(req, "File-Name", "file")?;
        if data.is_empty() {
            return Err(AppError::Validation("No data was uploaded".to_string()));
        }
        Ok(Self { token, original_name, data })
    }
}

pub fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Parts collected from a multipart upload
#[derive(Debug, Clone, Default)]
pub struct MultipartFields {
    pub token: Option<String>,
    /// Filename from the `file` part's content disposition
    pub file_name: Option<String>,
    pub data: Option<Bytes>,
}

impl TryFrom<MultipartFields> for UploadRequest {
    type Error = AppError;

    fn try_from(fields: MultipartFields) -> Result<Self, Self::Error> {
        let token = required(fields.token, "token")?;
        let data = fields
            .data
            .ok_or_else(|| AppError::Validation("Missing required field: file".to_string()))?;
        let original_name = required(fields.file_name, "file")?;
        if data.is_empty() {
            return Err(AppError::Validation("No data was uploaded".to_string()));
        }
        Ok(Self { token, original_name, data })
    }
}
