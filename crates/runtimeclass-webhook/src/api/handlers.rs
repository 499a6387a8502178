use axum::{
    body::Bytes,
    extract,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error, warn, Span};

use crate::api::{
    admission_review::{
        AdmissionRequest, AdmissionResponse, AdmissionReviewRequest, AdmissionReviewResponse,
    },
    api_error::ApiError,
    service,
    state::ApiServerState,
};

#[tracing::instrument(
    name = "mutate",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        kind=tracing::field::Empty,
        resource=tracing::field::Empty,
        allowed=tracing::field::Empty,
        mutated=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Decide whether the object under admission must be given the default
/// runtime class of its namespace.
pub(crate) async fn mutate_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdmissionReviewResponse>, ApiError> {
    if !has_json_content_type(&headers) {
        warn!("invalid content type");
        return Err(ApiError::bad_request("application/json content only"));
    }

    let admission_review: AdmissionReviewRequest =
        serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, "invalid admission review");
            ApiError::bad_request(format!("failed to decode request: {e}"))
        })?;
    let adm_req = admission_review.request.ok_or_else(|| {
        warn!("admission review without request");
        ApiError::bad_request("bad admission review")
    })?;

    populate_span_with_admission_request_data(&adm_req);

    let verdict = service::mutate(&state.engine, &adm_req).await;
    debug!(verdict = ?verdict, "mutation decided");

    let response = AdmissionResponse::from_verdict(adm_req.uid, &verdict).map_err(|e| {
        error!(error = %e, "cannot serialize JSON patch");
        ApiError::internal_server_error(format!("could not serialize JSON patch: {e}"))
    })?;

    populate_span_with_mutation_results(&response);

    Ok(Json(AdmissionReviewResponse::new(response)))
}

pub(crate) async fn healthz_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .is_some_and(|content_type| {
            content_type.essence_str() == mime::APPLICATION_JSON.essence_str()
        })
}

fn populate_span_with_admission_request_data(adm_req: &AdmissionRequest) {
    Span::current().record("kind", adm_req.kind.kind.as_str());
    Span::current().record("name", adm_req.name.clone().unwrap_or_default().as_str());
    Span::current().record(
        "namespace",
        adm_req.namespace.clone().unwrap_or_default().as_str(),
    );
    Span::current().record("operation", adm_req.operation.as_str());
    Span::current().record("request_uid", adm_req.uid.as_str());
    Span::current().record("resource", adm_req.requested_resource());
}

fn populate_span_with_mutation_results(response: &AdmissionResponse) {
    Span::current().record("allowed", response.allowed);
    Span::current().record("mutated", response.patch.is_some());
    if let Some(message) = response
        .status
        .as_ref()
        .and_then(|status| status.message.as_ref())
    {
        Span::current().record("response_message", message.as_str());
    }
}
