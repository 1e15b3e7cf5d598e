//! Lenient HTML fragment parsing and serialization.
//!
//! Good enough for server-rendered fragments: unknown constructs become text,
//! stray end tags are dropped and open elements close at end of input.

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<Fragment>,
    },
    Text(String),
}

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Fragment>,
}

pub(crate) fn parse_fragment(html: &str) -> Vec<Fragment> {
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut roots: Vec<Fragment> = Vec::new();
    let mut rest = html;

    fn push(stack: &mut [OpenElement], roots: &mut Vec<Fragment>, node: Fragment) {
        match stack.last_mut() {
            Some(open) => open.children.push(node),
            None => roots.push(node),
        }
    }

    fn close_top(stack: &mut Vec<OpenElement>, roots: &mut Vec<Fragment>) {
        if let Some(open) = stack.pop() {
            let node = Fragment::Element {
                tag: open.tag,
                attrs: open.attrs,
                children: open.children,
            };
            push(stack, roots, node);
        }
    }

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            push(&mut stack, &mut roots, Fragment::Text(decode_entities(rest)));
            break;
        };
        if lt > 0 {
            push(
                &mut stack,
                &mut roots,
                Fragment::Text(decode_entities(&rest[..lt])),
            );
            rest = &rest[lt..];
        }

        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            rest = rest.find('>').map_or("", |end| &rest[end + 1..]);
            continue;
        }
        if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').unwrap_or(after.len());
            let tag = after[..end].trim().to_ascii_lowercase();
            rest = after.get(end + 1..).unwrap_or("");
            if let Some(depth) = stack.iter().rposition(|open| open.tag == tag) {
                while stack.len() > depth {
                    close_top(&mut stack, &mut roots);
                }
            }
            continue;
        }

        let Some((tag, attrs, self_closing, consumed)) = parse_start_tag(rest) else {
            push(&mut stack, &mut roots, Fragment::Text("<".to_owned()));
            rest = &rest[1..];
            continue;
        };
        rest = &rest[consumed..];

        if is_void(&tag) || self_closing {
            push(
                &mut stack,
                &mut roots,
                Fragment::Element {
                    tag,
                    attrs,
                    children: Vec::new(),
                },
            );
        } else if is_raw_text(&tag) {
            let close = format!("</{tag}");
            let end = find_ascii_case_insensitive(rest, &close).unwrap_or(rest.len());
            let body = &rest[..end];
            let children = if body.is_empty() {
                Vec::new()
            } else if tag == "textarea" || tag == "title" {
                vec![Fragment::Text(decode_entities(body))]
            } else {
                vec![Fragment::Text(body.to_owned())]
            };
            push(
                &mut stack,
                &mut roots,
                Fragment::Element {
                    tag,
                    attrs,
                    children,
                },
            );
            rest = &rest[end..];
            rest = rest.find('>').map_or("", |gt| &rest[gt + 1..]);
        } else {
            stack.push(OpenElement {
                tag,
                attrs,
                children: Vec::new(),
            });
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }
    roots
}

/// Parses `<tag attr=...>` at the start of `input`.
///
/// Returns the lowercased tag, attributes, whether it was self-closing and
/// the number of bytes consumed.
fn parse_start_tag(input: &str) -> Option<(String, Vec<(String, String)>, bool, usize)> {
    let bytes = input.as_bytes();
    let mut i = 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    if i == 1 || !bytes[1].is_ascii_alphabetic() {
        return None;
    }
    let tag = input[1..i].to_ascii_lowercase();
    let mut attrs: Vec<(String, String)> = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            None => return Some((tag, attrs, false, i)),
            Some(b'>') => return Some((tag, attrs, false, i + 1)),
            Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                return Some((tag, attrs, true, i + 2));
            }
            Some(b'/') => {
                i += 1;
                continue;
            }
            Some(_) => {}
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = input[name_start..i].to_ascii_lowercase();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                Some(&(quote @ (b'"' | b'\''))) => {
                    let start = i + 1;
                    let end = input[start..]
                        .find(quote as char)
                        .map_or(input.len(), |offset| start + offset);
                    value = decode_entities(&input[start..end]);
                    i = (end + 1).min(input.len());
                }
                _ => {
                    let start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = decode_entities(&input[start..i]);
                }
            }
        }

        if !name.is_empty() && !attrs.iter().any(|(existing, _)| existing == &name) {
            attrs.push((name, value));
        }
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(|ch: char| ch == 'x' || ch == 'X') {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            ch.map(|ch| (ch, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub(crate) fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
    out
}

pub(crate) fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
    out
}
