//! Forms that submit through a hidden frame, so file inputs reach the server.

use dom::{Document, DomError, NodeId};
use serde_json::Value;
use shared::protocol::{PARAM_ARGS, PARAM_REQUEST};
use thiserror::Error;
use tracing::info;

use crate::{
    config::ClientConfig,
    dispatcher::{CommandDispatcher, DispatchError, DispatchReport},
    frame_response::{FrameError, FrameResponseDecoder},
};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload form `{form_id}` not found")]
    FormNotFound { form_id: String },
    #[error("upload form `{form_id}` was never registered")]
    NotRegistered { form_id: String },
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

pub fn frame_id(form_id: &str) -> String {
    format!("sjxUpload_iframe_{form_id}")
}

/// Name the server registers the upload handler for `form_id` under.
pub fn callback_name(form_id: &str) -> String {
    format!("{form_id}_upload")
}

pub(crate) fn id_selector(id: &str) -> String {
    format!("[id=\"{id}\"]")
}

fn find_form<D: Document + ?Sized>(document: &D, form_id: &str) -> Result<NodeId, UploadError> {
    document
        .select(&format!("form{}", id_selector(form_id)))?
        .into_iter()
        .next()
        .ok_or_else(|| UploadError::FormNotFound {
            form_id: form_id.to_owned(),
        })
}

fn hidden_field<D: Document + ?Sized>(
    document: &D,
    form: NodeId,
    name: &str,
) -> Result<Option<NodeId>, DomError> {
    Ok(document
        .select_within(form, &format!("input[name=\"{name}\"]"))?
        .into_iter()
        .next())
}

/// Adds the hidden target frame to the form, then prepares it.
pub fn register_form<D: Document + ?Sized>(
    document: &mut D,
    form_id: &str,
    callback: &str,
    config: &ClientConfig,
) -> Result<NodeId, UploadError> {
    let form = find_form(document, form_id)?;
    let frame_id = frame_id(form_id);
    let frame = document.create_element(
        form,
        "iframe",
        &[
            ("id", frame_id.as_str()),
            ("name", frame_id.as_str()),
            ("style", "display: none"),
        ],
    )?;
    prepare_form(document, form_id, callback, config)?;
    info!(form_id, callback, "upload: form registered");
    Ok(frame)
}

/// Points the form at its frame and writes the request fields.
///
/// An explicit `action` is kept. The hidden fields are created once and
/// refreshed on later calls.
pub fn prepare_form<D: Document + ?Sized>(
    document: &mut D,
    form_id: &str,
    callback: &str,
    config: &ClientConfig,
) -> Result<(), UploadError> {
    let form = find_form(document, form_id)?;
    let args = Value::Array(vec![Value::String(form_id.to_owned())]).to_string();

    document.set_property(form, "target", &frame_id(form_id))?;
    document.set_property(form, "method", "post")?;
    document.set_property(form, "enctype", "multipart/form-data")?;
    if document
        .property(form, "action")?
        .map_or(true, |action| action.is_empty())
    {
        document.set_property(form, "action", &config.request_uri)?;
    }

    for (name, value) in [(PARAM_REQUEST, callback), (PARAM_ARGS, args.as_str())] {
        match hidden_field(document, form, name)? {
            Some(field) => document.set_property(field, "value", value)?,
            None => {
                document.create_element(
                    form,
                    "input",
                    &[("type", "hidden"), ("name", name), ("value", value)],
                )?;
            }
        }
    }
    Ok(())
}

/// Restores the form's controls, then prepares it again for the same callback.
pub fn reset_form<D: Document + ?Sized>(
    document: &mut D,
    form_id: &str,
    config: &ClientConfig,
) -> Result<(), UploadError> {
    let form = find_form(document, form_id)?;
    let field = hidden_field(document, form, PARAM_REQUEST)?.ok_or_else(|| {
        UploadError::NotRegistered {
            form_id: form_id.to_owned(),
        }
    })?;
    let callback = document.property(field, "value")?.unwrap_or_default();
    document.reset_controls(form)?;
    prepare_form(document, form_id, &callback, config)
}

/// Dispatches every batch in the frame body the upload produced.
pub fn process_response<D: Document + ?Sized>(
    dispatcher: &CommandDispatcher,
    document: &mut D,
    form_id: &str,
    body: &str,
) -> Result<DispatchReport, UploadError> {
    let batches = FrameResponseDecoder::decode_all(body)?;
    info!(form_id, batches = batches.len(), "upload: processing response");
    Ok(dispatcher.dispatch_all(document, &batches)?)
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
