use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::mutation::verdict::Verdict;

const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// The admission.k8s.io/v1 AdmissionReview sent by the API server.
///
/// `request` is optional so that a review without it can be told apart
/// from a review that cannot be decoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
}

/// The subset of the admission/v1/AdmissionRequest this webhook looks at.
///
/// `object` is kept as raw JSON: it is decoded only once its kind is known.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    #[serde(default)]
    pub kind: GroupVersionKind,
    #[serde(default)]
    pub resource: GroupVersionResource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_resource: Option<GroupVersionResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<RawValue>>,
}

impl AdmissionRequest {
    /// The resource originally requested by the user, falling back to the
    /// resource being admitted when the API server did not convert it
    pub fn requested_resource(&self) -> &str {
        self.request_resource
            .as_ref()
            .map(|r| r.resource.as_str())
            .unwrap_or(self.resource.resource.as_str())
    }

    pub fn is_create(&self) -> bool {
        self.operation == "CREATE"
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    pub response: AdmissionResponse,
}

impl AdmissionReviewResponse {
    pub fn new(response: AdmissionResponse) -> Self {
        AdmissionReviewResponse {
            api_version: Some(String::from(ADMISSION_API_VERSION)),
            kind: Some(String::from(ADMISSION_REVIEW_KIND)),
            response,
        }
    }
}

/// This models the admission/v1/AdmissionResponse object of Kubernetes
/// See https://pkg.go.dev/k8s.io/kubernetes/pkg/apis/admission#AdmissionResponse
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    /// UID is an identifier for the individual request/response.
    /// This must be copied over from the corresponding AdmissionRequest.
    pub uid: String,

    /// Allowed indicates whether or not the admission request was permitted.
    pub allowed: bool,

    /// The type of Patch. Currently we only allow "JSONPatch".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,

    /// The base64 encoded patch body, a RFC 6902 JSON Patch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionResponseStatus>,
}

/// PatchType is the type of patch being used to represent the mutated object
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    #[default]
    JSONPatch,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct AdmissionResponseStatus {
    /// A human-readable description of the status of this operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AdmissionResponse {
    /// Build the response carrying the given verdict.
    ///
    /// The patches, if any, are encoded as a base64 JSON Patch document.
    pub fn from_verdict(uid: String, verdict: &Verdict) -> serde_json::Result<AdmissionResponse> {
        let patch = verdict
            .json_patch()?
            .map(|patch| general_purpose::STANDARD.encode(patch));
        let patch_type = patch.as_ref().map(|_| PatchType::JSONPatch);

        Ok(AdmissionResponse {
            uid,
            allowed: verdict.allowed,
            patch_type,
            patch,
            status: verdict
                .message
                .as_ref()
                .map(|message| AdmissionResponseStatus {
                    message: Some(message.clone()),
                }),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mutation::verdict::PatchOperation;
    use serde_json::json;

    pub(crate) fn build_admission_review() -> AdmissionReviewRequest {
        let input = r#"
            {
                "apiVersion": "admission.k8s.io/v1",
                "kind": "AdmissionReview",
                "request": {
                    "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                    "kind": {"group":"apps","version":"v1","kind":"Deployment"},
                    "resource": {"group":"apps","version":"v1","resource":"deployments"},
                    "requestKind": {"group":"apps","version":"v1","kind":"Deployment"},
                    "requestResource": {"group":"apps","version":"v1","resource":"deployments"},
                    "name": "web",
                    "namespace": "team-a",
                    "operation": "CREATE",
                    "userInfo": {
                      "username": "admin",
                      "uid": "014fbff9a07c",
                      "groups": ["system:authenticated"]
                    },
                    "object": {"apiVersion":"apps/v1","kind":"Deployment","metadata":{"name":"web"}},
                    "oldObject": null,
                    "options": {"apiVersion":"meta.k8s.io/v1","kind":"CreateOptions"},
                    "dryRun": false
                }
            }
        "#;

        serde_json::from_str(input).expect("deserialization should work")
    }

    #[test]
    fn good_input() {
        let ar = build_admission_review();
        let request = ar.request.expect("request should be set");

        assert_eq!(request.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(request.name.as_deref(), Some("web"));
        assert_eq!(request.namespace.as_deref(), Some("team-a"));
        assert!(request.is_create());
        assert_eq!(request.kind.kind, "Deployment");
        assert_eq!(request.requested_resource(), "deployments");

        let object: serde_json::Value =
            serde_json::from_str(request.object.expect("object should be set").get()).unwrap();
        assert_eq!(object["metadata"]["name"], "web");
    }

    #[test]
    fn requested_resource_falls_back_to_resource() {
        let request: AdmissionRequest = serde_json::from_value(json!({
            "uid": "1",
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "operation": "CREATE"
        }))
        .unwrap();

        assert_eq!(request.requested_resource(), "pods");
        assert!(request.object.is_none());
    }

    #[test]
    fn review_without_request() {
        let ar: AdmissionReviewRequest =
            serde_json::from_str(r#"{"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"}"#)
                .unwrap();

        assert!(ar.request.is_none());
    }

    #[test]
    fn response_without_patch() {
        let response = AdmissionResponse::from_verdict("uid".to_owned(), &Verdict::allow()).unwrap();
        let review = serde_json::to_value(AdmissionReviewResponse::new(response)).unwrap();

        assert_eq!(
            review,
            json!({
                "apiVersion": "admission.k8s.io/v1",
                "kind": "AdmissionReview",
                "response": {"uid": "uid", "allowed": true}
            })
        );
    }

    #[test]
    fn response_with_patch() {
        let verdict = Verdict::patch(PatchOperation::add("/spec/runtimeClassName", "gvisor"));
        let response = AdmissionResponse::from_verdict("uid".to_owned(), &verdict).unwrap();

        assert!(response.allowed);
        assert_eq!(response.patch_type, Some(PatchType::JSONPatch));
        assert!(response.status.is_none());

        let patch = general_purpose::STANDARD
            .decode(response.patch.as_deref().expect("patch should be set"))
            .unwrap();
        let patch: serde_json::Value = serde_json::from_slice(&patch).unwrap();
        assert_eq!(
            patch,
            json!([{"op": "add", "path": "/spec/runtimeClassName", "value": "gvisor"}])
        );

        let review = serde_json::to_value(AdmissionReviewResponse::new(response)).unwrap();
        assert_eq!(review["response"]["patchType"], "JSONPatch");
    }

    #[test]
    fn response_with_message() {
        let verdict = Verdict::allow_with_message("namespace team-a not found");
        let response = AdmissionResponse::from_verdict("uid".to_owned(), &verdict).unwrap();

        assert!(response.allowed);
        assert!(response.patch.is_none());
        assert!(response.patch_type.is_none());
        assert_eq!(
            response.status,
            Some(AdmissionResponseStatus {
                message: Some("namespace team-a not found".to_owned()),
            })
        );
    }
}
