//! Requests submitted through a throwaway form and frame pair, letting the
//! server stream command batches back over one long-lived response.

use chrono::Utc;
use dom::{Document, DomError, NodeId};
use serde_json::Value;
use shared::protocol::RequestPayload;
use tracing::{debug, info};

use crate::config::ClientConfig;

/// A submitted comet request: the frame its response streams into and the
/// form the embedding host posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CometRequest {
    pub frame_id: String,
    pub form_id: String,
    pub action: String,
    pub fields: Vec<(String, String)>,
    frame: NodeId,
    form: NodeId,
}

impl CometRequest {
    /// Frame and form are named after the function and the submit time.
    pub fn element_ids(function: &str, millis: i64) -> (String, String) {
        (
            format!("frame4_{function}_{millis}"),
            format!("form4_{function}_{millis}"),
        )
    }

    pub fn target(&self) -> &str {
        &self.frame_id
    }

    pub fn frame_node(&self) -> NodeId {
        self.frame
    }

    pub fn form_node(&self) -> NodeId {
        self.form
    }

    /// Tears down the frame and form once the frame has finished loading.
    pub fn complete<D: Document + ?Sized>(&self, document: &mut D) -> Result<(), DomError> {
        document.remove(self.frame)?;
        document.remove(self.form)?;
        debug!(form_id = %self.form_id, "comet: request elements removed");
        Ok(())
    }
}

pub fn comet_request<D: Document + ?Sized>(
    document: &mut D,
    function: &str,
    args: Vec<Value>,
    config: &ClientConfig,
) -> Result<CometRequest, DomError> {
    let (frame_id, form_id) = CometRequest::element_ids(function, Utc::now().timestamp_millis());
    let body = match document.select("body")?.first() {
        Some(body) => *body,
        None => document.root(),
    };

    let frame = document.create_element(
        body,
        "iframe",
        &[
            ("id", frame_id.as_str()),
            ("name", frame_id.as_str()),
            ("style", "display: none;"),
        ],
    )?;
    let form = document.create_element(
        body,
        "form",
        &[
            ("id", form_id.as_str()),
            ("name", form_id.as_str()),
            ("method", "post"),
            ("action", config.request_uri.as_str()),
            ("target", frame_id.as_str()),
        ],
    )?;

    let payload = RequestPayload::new(function, args);
    let mut fields = Vec::new();
    for (name, value) in payload.form_fields() {
        document.create_element(
            form,
            "input",
            &[("type", "hidden"), ("name", name), ("value", value.as_str())],
        )?;
        fields.push((name.to_owned(), value));
    }

    info!(function, frame_id = %frame_id, "comet: request prepared");
    Ok(CometRequest {
        frame_id,
        form_id,
        action: config.request_uri.clone(),
        fields,
        frame,
        form,
    })
}

#[cfg(test)]
#[path = "tests/comet_tests.rs"]
mod tests;
