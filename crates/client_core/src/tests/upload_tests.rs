use dom::MemoryDocument;
use serde_json::json;
use shared::protocol::CommandBatch;

use super::*;

const PAGE: &str = r#"<body><form id="avatar" action=""><input type="file" name="pic"><input name="caption" value="me"></form></body>"#;

fn config() -> ClientConfig {
    ClientConfig::default().with_request_uri("/upload-endpoint")
}

fn form_attr(document: &MemoryDocument, name: &str) -> Option<String> {
    let form = document.first("#avatar").expect("selector").expect("form");
    document
        .attribute(form, name)
        .expect("attribute")
        .map(str::to_owned)
}

fn hidden_value(document: &MemoryDocument, name: &str) -> Vec<String> {
    document
        .select(&format!("#avatar input[name={name}]"))
        .expect("select")
        .into_iter()
        .map(|node| {
            document
                .property(node, "value")
                .expect("value")
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn ids_follow_the_form_id() {
    assert_eq!(frame_id("avatar"), "sjxUpload_iframe_avatar");
    assert_eq!(callback_name("avatar"), "avatar_upload");
}

#[test]
fn register_adds_hidden_frame_and_prepares_form() {
    let mut document = MemoryDocument::parse(PAGE);
    let frame = register_form(&mut document, "avatar", "avatar_upload", &config())
        .expect("register");

    assert_eq!(
        document.attribute(frame, "name").expect("attr"),
        Some("sjxUpload_iframe_avatar")
    );
    assert_eq!(
        document.attribute(frame, "style").expect("attr"),
        Some("display: none")
    );
    assert_eq!(form_attr(&document, "target").as_deref(), Some("sjxUpload_iframe_avatar"));
    assert_eq!(form_attr(&document, "method").as_deref(), Some("post"));
    assert_eq!(
        form_attr(&document, "enctype").as_deref(),
        Some("multipart/form-data")
    );
    assert_eq!(form_attr(&document, "action").as_deref(), Some("/upload-endpoint"));
    assert_eq!(hidden_value(&document, "sijax_rq"), vec!["avatar_upload"]);
    assert_eq!(hidden_value(&document, "sijax_args"), vec![r#"["avatar"]"#]);
}

#[test]
fn explicit_action_is_kept() {
    let mut document = MemoryDocument::parse(r#"<form id="avatar" action="/custom"></form>"#);
    prepare_form(&mut document, "avatar", "cb", &config()).expect("prepare");
    assert_eq!(form_attr(&document, "action").as_deref(), Some("/custom"));
}

#[test]
fn preparing_again_refreshes_fields_without_duplicating() {
    let mut document = MemoryDocument::parse(PAGE);
    prepare_form(&mut document, "avatar", "first", &config()).expect("prepare");
    prepare_form(&mut document, "avatar", "second", &config()).expect("prepare again");
    assert_eq!(hidden_value(&document, "sijax_rq"), vec!["second"]);
    assert_eq!(hidden_value(&document, "sijax_args").len(), 1);
}

#[test]
fn reset_restores_controls_and_keeps_callback() {
    let mut document = MemoryDocument::parse(PAGE);
    register_form(&mut document, "avatar", "avatar_upload", &config()).expect("register");
    let caption = document
        .first("#avatar input[name=caption]")
        .expect("selector")
        .expect("caption");
    document.set_value(caption, "changed").expect("edit");

    reset_form(&mut document, "avatar", &config()).expect("reset");

    assert_eq!(
        document.property(caption, "value").expect("value").as_deref(),
        Some("me")
    );
    assert_eq!(hidden_value(&document, "sijax_rq"), vec!["avatar_upload"]);
}

#[test]
fn reset_of_unregistered_form_fails() {
    let mut document = MemoryDocument::parse(PAGE);
    let err = reset_form(&mut document, "avatar", &config()).expect_err("not registered");
    assert!(matches!(err, UploadError::NotRegistered { .. }));
}

#[test]
fn missing_form_is_reported() {
    let mut document = MemoryDocument::parse(PAGE);
    let err = register_form(&mut document, "ghost", "cb", &config()).expect_err("missing");
    assert!(matches!(err, UploadError::FormNotFound { form_id } if form_id == "ghost"));
}

#[test]
fn process_response_dispatches_every_flushed_batch() {
    let mut document = MemoryDocument::parse(r#"<div id="status"></div>"#);
    let mut first = CommandBatch::new();
    first.html("#status", "uploading");
    let mut second = CommandBatch::new();
    second.html_append("#status", " done").attr("#status", "class", json!("ok"));
    let body = format!(
        "<script>window.parent.Sijax.processCommands({});</script><script>window.parent.Sijax.processCommands({});</script>",
        first.to_json(),
        second.to_json()
    );

    let report = process_response(&CommandDispatcher::new(), &mut document, "avatar", &body)
        .expect("process");

    assert_eq!(report.executed, 3);
    assert_eq!(
        document.to_html(),
        r#"<div id="status" class="ok">uploading done</div>"#
    );
}
