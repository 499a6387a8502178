use serde::Serialize;

/// The JSON Patch operations this webhook can emit.
///
/// The runtime class field is only patched when it is absent from the
/// submitted object, hence `add` is the only operation ever needed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
}

/// A single RFC 6902 patch operation.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PatchOperation {
    pub op: PatchOp,
    /// JSON Pointer of the field to set
    pub path: String,
    pub value: String,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: impl Into<String>) -> Self {
        PatchOperation {
            op: PatchOp::Add,
            path: path.into(),
            value: value.into(),
        }
    }
}

/// The outcome of a mutation decision.
///
/// `allowed` is always `true`: the webhook never blocks admission.
/// `message` is set only when something went wrong while deciding.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub patches: Vec<PatchOperation>,
}

impl Verdict {
    /// Allow the request untouched
    pub fn allow() -> Self {
        Verdict {
            allowed: true,
            message: None,
            patches: Vec::new(),
        }
    }

    /// Allow the request untouched, reporting why no decision could be taken
    pub fn allow_with_message(message: impl Into<String>) -> Self {
        Verdict {
            message: Some(message.into()),
            ..Verdict::allow()
        }
    }

    /// Allow the request, applying the given patch
    pub fn patch(operation: PatchOperation) -> Self {
        Verdict {
            patches: vec![operation],
            ..Verdict::allow()
        }
    }

    pub fn is_mutating(&self) -> bool {
        !self.patches.is_empty()
    }

    /// Serialize the patches into a RFC 6902 JSON Patch document.
    ///
    /// Returns `None` when there is nothing to patch.
    pub fn json_patch(&self) -> serde_json::Result<Option<Vec<u8>>> {
        if self.patches.is_empty() {
            return Ok(None);
        }
        serde_json::to_vec(&self.patches).map(Some)
    }
}
