/// `backgroundColor` -> `background-color`; already-dashed names pass through.
pub(crate) fn css_property_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.trim().chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub(crate) fn parse_declarations(style: Option<&str>) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    let Some(style) = style else {
        return out;
    };

    let mut start = 0;
    let mut parens = 0usize;
    let mut quote: Option<char> = None;
    for (idx, ch) in style.char_indices() {
        match (quote, ch) {
            (Some(q), _) if ch == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => parens += 1,
            (None, ')') => parens = parens.saturating_sub(1),
            (None, ';') if parens == 0 => {
                push_declaration(&style[start..idx], &mut out);
                start = idx + 1;
            }
            _ => {}
        }
    }
    push_declaration(&style[start..], &mut out);
    out
}

fn push_declaration(raw: &str, out: &mut Vec<(String, String)>) {
    let Some((name, value)) = raw.split_once(':') else {
        return;
    };
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return;
    }
    let value = value.trim().to_owned();
    match out.iter_mut().find(|(existing, _)| existing == &name) {
        Some(slot) => slot.1 = value,
        None => out.push((name, value)),
    }
}

pub(crate) fn serialize_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sets one declaration, removing it when `value` is empty.
///
/// Returns `None` once no declarations remain.
pub(crate) fn apply(style: Option<&str>, key: &str, value: &str) -> Option<String> {
    let name = css_property_name(key);
    let mut decls = parse_declarations(style);
    let value = value.trim();
    match decls.iter().position(|(existing, _)| existing == &name) {
        Some(pos) if value.is_empty() => {
            decls.remove(pos);
        }
        Some(pos) => decls[pos].1 = value.to_owned(),
        None if value.is_empty() => {}
        None => decls.push((name, value.to_owned())),
    }
    (!decls.is_empty()).then(|| serialize_declarations(&decls))
}
