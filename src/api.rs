//! Route table
//!
//! Every endpoint accepts POST only; any other method gets a 405 with the
//! usual JSON error body.

use actix_web::{error, web, HttpResponse};
use log::warn;

use crate::error::AppError;
use crate::service::{
    aggregate_service, column_stats_service, columns_service, describe_service, head_service, list_service,
    meta_service, remove_service, shape_service, slice_service, upload_service, visualize_service,
};

pub async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}

/// Form bodies that fail to decode are client errors
pub fn form_config() -> web::FormConfig {
    web::FormConfig::default().error_handler(|err, _req| {
        warn!("Rejected form body: {}", err);
        error::Error::from(AppError::Validation(format!("Invalid form data: {}", err)))
    })
}

macro_rules! post_only {
    ($cfg:expr, $path:expr, $handler:expr) => {
        $cfg.service(
            web::resource($path)
                .route(web::post().to($handler))
                .default_service(web::to(method_not_allowed)),
        )
    };
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(form_config());

    post_only!(cfg, "/file/upload/", upload_service);
    post_only!(cfg, "/file/remove/", remove_service);
    post_only!(cfg, "/file/", list_service);
    post_only!(cfg, "/file/meta/", meta_service);

    post_only!(cfg, "/file_info/describe/", describe_service);
    post_only!(cfg, "/file_info/head/", head_service);
    post_only!(cfg, "/file_info/columns/", columns_service);
    post_only!(cfg, "/file_info/shape/", shape_service);
    post_only!(cfg, "/file_info/get_rows_or_columns/", slice_service);
    post_only!(cfg, "/file_info/column_stats/", column_stats_service);
    post_only!(cfg, "/file_info/aggregate_info/", aggregate_service);

    post_only!(cfg, "/data_analytics/visualize/", visualize_service);
}
