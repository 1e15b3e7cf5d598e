use super::*;
use serde_json::json;

fn build(fields: &[(&str, &str)]) -> FormValue {
    let mut values = FormValue::default();
    for (name, value) in fields {
        let field = FieldName::parse(name).expect("field name");
        values.insert(&field, FormValue::text(*value)).expect("insert");
    }
    values
}

#[test]
fn plain_name_is_a_single_segment() {
    let field = FieldName::parse("email").expect("parse");
    assert_eq!(field.segments(), ["email"]);
    assert!(!field.is_list_append());
}

#[test]
fn bracketed_name_splits_into_segments() {
    let field = FieldName::parse("a[b][c]").expect("parse");
    assert_eq!(field.segments(), ["a", "b", "c"]);
    assert_eq!(field.split_leaf(), ("c", &["a".to_owned(), "b".to_owned()][..]));
}

#[test]
fn trailing_empty_brackets_mark_list_append() {
    let list = FieldName::parse("tags[]").expect("parse");
    assert_eq!(list.segments(), ["tags", ""]);
    assert!(list.is_list_append());

    let nested = FieldName::parse("a[b][]").expect("parse");
    assert_eq!(nested.segments(), ["a", "b", ""]);
    assert!(nested.is_list_append());
}

#[test]
fn malformed_names_are_rejected() {
    for name in ["[a]", "a[b", "a-b[c]", "a[b]x", "a b[c]"] {
        assert!(
            matches!(FieldName::parse(name), Err(FieldNameError::Malformed { .. })),
            "{name} should be malformed"
        );
    }
    assert_eq!(FieldName::parse(""), Err(FieldNameError::Empty));
}

#[test]
fn names_without_brackets_are_taken_verbatim() {
    let field = FieldName::parse("first-name").expect("parse");
    assert_eq!(field.segments(), ["first-name"]);
}

#[test]
fn nested_keys_build_nested_maps() {
    let values = build(&[("a[b][c]", "v")]);
    assert_eq!(values.to_json(), json!({ "a": { "b": { "c": "v" } } }));
}

#[test]
fn list_targets_accumulate_in_insertion_order() {
    let values = build(&[("a[]", "1"), ("a[]", "2"), ("x[y][]", "3"), ("x[y][]", "4")]);
    assert_eq!(
        values.to_json(),
        json!({ "a": ["1", "2"], "x": { "y": ["3", "4"] } })
    );
}

#[test]
fn duplicate_scalar_names_keep_the_last_value() {
    let values = build(&[("user[email]", "old@b.com"), ("user[email]", "a@b.com")]);
    assert_eq!(values.to_json(), json!({ "user": { "email": "a@b.com" } }));
}

#[test]
fn descending_through_a_scalar_is_a_conflict() {
    let mut values = build(&[("a", "scalar")]);
    let err = values
        .insert(&FieldName::parse("a[b]").expect("parse"), "v".into())
        .expect_err("conflict");
    assert_eq!(err.name, "a[b]");
    assert_eq!(values.to_json(), json!({ "a": "scalar" }));
}

#[test]
fn appending_onto_a_map_is_a_conflict() {
    let mut values = build(&[("a[b]", "1")]);
    assert!(values
        .insert(&FieldName::parse("a[]").expect("parse"), "2".into())
        .is_err());
}

#[test]
fn empty_text_survives_json_encoding_as_empty_string() {
    let values = build(&[("note", ""), ("user[nick]", "")]);
    let encoded = serde_json::to_string(&values).expect("encode");
    assert_eq!(encoded, r#"{"note":"","user":{"nick":""}}"#);

    let decoded: serde_json::Value = serde_json::from_str(&encoded).expect("decode");
    assert_eq!(decoded["note"], json!(""));
    assert!(!decoded["note"].is_null());
}

#[test]
fn decodes_back_into_form_value() {
    let values = build(&[("tags[]", "x"), ("user[email]", "a@b.com")]);
    let encoded = serde_json::to_string(&values).expect("encode");
    let decoded: FormValue = serde_json::from_str(&encoded).expect("decode");
    assert_eq!(decoded, values);
}
