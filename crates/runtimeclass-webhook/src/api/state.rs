use crate::mutation::PatchDecisionEngine;

pub(crate) struct ApiServerState {
    pub(crate) engine: PatchDecisionEngine,
}
