use super::*;
use serde_json::json;

#[test]
fn decodes_html_command_with_camel_case_set_type() {
    let command = Command::from_value(json!({
        "type": "html",
        "selector": "#target",
        "setType": "replace",
        "html": "<b>x</b>",
    }))
    .expect("decode");

    assert_eq!(
        command,
        Command::Html {
            selector: "#target".into(),
            set_type: SetType::Replace,
            html: "<b>x</b>".into(),
        }
    );
}

#[test]
fn unrecognised_or_missing_set_type_means_prepend() {
    let odd = Command::from_value(json!({
        "type": "html", "selector": "p", "setType": "sideways", "html": "x"
    }))
    .expect("decode");
    let missing = Command::from_value(json!({ "type": "html", "selector": "p", "html": "x" }))
        .expect("decode");
    let null = Command::from_value(json!({
        "type": "html", "selector": "p", "setType": null, "html": "x"
    }))
    .expect("decode");
    let numeric = Command::from_value(json!({
        "type": "html", "selector": "p", "setType": 3, "html": "x"
    }))
    .expect("decode");

    for command in [odd, missing, null, numeric] {
        let Command::Html { set_type, .. } = command else {
            panic!("expected html command");
        };
        assert_eq!(set_type, SetType::Prepend);
    }
}

#[test]
fn scalar_html_and_alert_are_rendered_as_text() {
    let html = Command::from_value(json!({
        "type": "html", "selector": "#n", "setType": "replace", "html": 5
    }))
    .expect("numeric html");
    assert!(matches!(html, Command::Html { ref html, .. } if html == "5"));

    let alert = Command::from_value(json!({ "type": "alert", "alert": true })).expect("bool alert");
    assert_eq!(alert, Command::Alert { alert: "true".into() });
}

#[test]
fn unknown_type_is_reported_by_name() {
    let err = Command::from_value(json!({ "type": "teleport", "to": "#moon" }))
        .expect_err("unknown type");
    assert!(matches!(
        &err,
        CommandError::UnknownCommandType { command_type } if command_type == "teleport"
    ));
    assert_eq!(err.command_type(), Some("teleport"));
}

#[test]
fn missing_type_and_bad_fields_are_distinct_errors() {
    let err = Command::from_value(json!({ "selector": "#x" })).expect_err("no type");
    assert!(matches!(err, CommandError::MissingType));

    let err = Command::from_value(json!({ "type": "remove" })).expect_err("no selector");
    assert!(matches!(err, CommandError::Malformed { ref command_type, .. } if command_type == "remove"));
}

#[test]
fn batch_keeps_order_and_isolates_bad_entries() {
    let batch = CommandBatch::from_json(
        r##"[
            {"type": "alert", "alert": "hi"},
            {"type": "bogus"},
            {"type": "call", "call": "myApp.onDone", "params": [1, 2]}
        ]"##,
    )
    .expect("batch json");

    let decoded: Vec<_> = batch.iter().collect();
    assert_eq!(decoded.len(), 3);
    assert!(matches!(decoded[0], Ok(Command::Alert { ref alert }) if alert == "hi"));
    assert!(decoded[1].is_err());
    assert!(matches!(
        decoded[2],
        Ok(Command::Call { ref call, ref params }) if call == "myApp.onDone" && params == &vec![json!(1), json!(2)]
    ));
}

#[test]
fn call_without_params_defaults_to_empty_list() {
    let command = Command::from_value(json!({ "type": "call", "call": "refresh" })).expect("call");
    assert_eq!(
        command,
        Command::Call {
            call: "refresh".into(),
            params: vec![]
        }
    );
}

#[test]
fn builder_emits_wire_format() {
    let mut batch = CommandBatch::new();
    batch
        .alert("Saved")
        .html_append("#log", "<li>one</li>")
        .attr_append("#x", "class", " active")
        .css("#x", "backgroundColor", "red")
        .remove("#banner")
        .call("myApp.onDone", vec![json!(1)]);

    let wire: serde_json::Value = serde_json::from_str(&batch.to_json()).expect("json");
    assert_eq!(
        wire,
        json!([
            { "type": "alert", "alert": "Saved" },
            { "type": "html", "selector": "#log", "setType": "append", "html": "<li>one</li>" },
            { "type": "attr", "selector": "#x", "key": "class", "value": " active", "setType": "append" },
            { "type": "css", "selector": "#x", "key": "backgroundColor", "value": "red" },
            { "type": "remove", "remove": "#banner" },
            { "type": "call", "call": "myApp.onDone", "params": [1] },
        ])
    );
}

#[test]
fn redirect_is_a_script_with_json_escaped_uri() {
    let mut batch = CommandBatch::new();
    batch.redirect("http://example.com/?q=\"x\"");

    let commands: Vec<_> = batch.iter().collect::<Result<_, _>>().expect("decode");
    assert_eq!(
        commands,
        vec![Command::Script {
            script: r#"window.location = "http://example.com/?q=\"x\"";"#.into()
        }]
    );
}

#[test]
fn clear_drops_buffered_commands() {
    let mut batch = CommandBatch::new();
    batch.alert("first").clear().alert("second");
    assert_eq!(batch.len(), 1);
}

#[test]
fn builder_and_decoded_batches_serialize_identically() {
    let mut built = CommandBatch::new();
    built.html("#target", "<b>x</b>");
    let decoded = CommandBatch::from_json(&built.to_json()).expect("reparse");

    assert_eq!(
        serde_json::to_value(&built).expect("built"),
        serde_json::to_value(&decoded).expect("decoded")
    );
}

#[test]
fn render_scalar_concatenates_like_a_page_would() {
    assert_eq!(render_scalar(&json!("box")), "box");
    assert_eq!(render_scalar(&json!(500)), "500");
    assert_eq!(render_scalar(&json!(true)), "true");
    assert_eq!(render_scalar(&serde_json::Value::Null), "");
}

#[test]
fn request_payload_encodes_args_as_json_array() {
    let payload = RequestPayload::new("save_user", vec![json!({ "name": "" }), json!(3)]);
    let [(rq_key, rq), (args_key, args)] = payload.form_fields();

    assert_eq!(rq_key, PARAM_REQUEST);
    assert_eq!(rq, "save_user");
    assert_eq!(args_key, PARAM_ARGS);
    assert_eq!(args, r#"[{"name":""},3]"#);
}
