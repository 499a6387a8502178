use tracing::debug;

use crate::{
    api::admission_review::AdmissionRequest,
    mutation::{verdict::Verdict, PatchDecisionEngine},
};

/// Run the admission request through the decision engine.
///
/// Only object creations are considered: any other operation, a request on a
/// subresource (`pods/binding`, `pods/eviction`,...) or a request without an
/// object is allowed unchanged.
pub(crate) async fn mutate(engine: &PatchDecisionEngine, adm_req: &AdmissionRequest) -> Verdict {
    if !adm_req.is_create() {
        debug!(operation = adm_req.operation.as_str(), "not a creation, skipping");
        return Verdict::allow();
    }

    if let Some(sub_resource) = &adm_req.sub_resource {
        debug!(sub_resource = sub_resource.as_str(), "subresource request, skipping");
        return Verdict::allow();
    }

    let object = match &adm_req.object {
        Some(object) => object,
        None => {
            debug!("request without object, skipping");
            return Verdict::allow();
        }
    };

    engine
        .decide(
            adm_req.requested_resource(),
            object.get().as_bytes(),
            adm_req.namespace.as_deref(),
        )
        .await
}
