//! The CSS selector subset commands address elements with.
//!
//! Supported: `*`, type, `#id`, `.class`, `[attr]`, `[attr=value]`,
//! `[attr^=value]`, `[attr$=value]`, `[attr*=value]`, `[attr~=value]`,
//! `:checked`, `:disabled`, `:enabled`, `:first-child`, `:last-child`,
//! descendant and child (`>`) combinators and `,` selector lists.

use crate::DomError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrMatch {
    pub name: String,
    pub op: AttrOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pseudo {
    Checked,
    Disabled,
    Enabled,
    FirstChild,
    LastChild,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrMatch>,
    pub pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

/// `parts[i]` and `parts[i + 1]` are joined by `combinators[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Complex {
    pub parts: Vec<Compound>,
    pub combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList(pub Vec<Complex>);

pub(crate) fn parse(selector: &str) -> Result<SelectorList, DomError> {
    let invalid = |reason: &str| DomError::InvalidSelector {
        selector: selector.to_owned(),
        reason: reason.to_owned(),
    };

    let mut list = Vec::new();
    for group in split_top_level(selector, ',') {
        let group = group.trim();
        if group.is_empty() {
            return Err(invalid("empty selector"));
        }
        list.push(parse_complex(group).map_err(|reason| invalid(reason.as_str()))?);
    }
    Ok(SelectorList(list))
}

/// Splits on `sep` outside of `[...]` and quotes.
fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), _) if ch == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                out.push(&input[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&input[start..]);
    out
}

fn parse_complex(input: &str) -> Result<Complex, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut parts = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            if !parts.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            i += 1;
            continue;
        }
        if ch == '>' {
            if parts.is_empty() || pending == Some(Combinator::Child) {
                return Err("dangling `>` combinator".into());
            }
            pending = Some(Combinator::Child);
            i += 1;
            continue;
        }

        let (compound, next) = parse_compound(&chars, i)?;
        if !parts.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        pending = None;
        parts.push(compound);
        i = next;
    }

    if parts.is_empty() {
        return Err("empty selector".into());
    }
    if pending == Some(Combinator::Child) {
        return Err("selector ends with `>`".into());
    }
    Ok(Complex { parts, combinators })
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '-' | '_')
}

fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_ident_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_compound(chars: &[char], mut i: usize) -> Result<(Compound, usize), String> {
    let mut compound = Compound::default();
    let start = i;

    if chars[i] == '*' {
        i += 1;
    } else if is_ident_char(chars[i]) {
        let (tag, next) = read_ident(chars, i);
        compound.tag = Some(tag.to_ascii_lowercase());
        i = next;
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (id, next) = read_ident(chars, i + 1);
                if id.is_empty() {
                    return Err("empty id selector".into());
                }
                compound.id = Some(id);
                i = next;
            }
            '.' => {
                let (class, next) = read_ident(chars, i + 1);
                if class.is_empty() {
                    return Err("empty class selector".into());
                }
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let (attr, next) = parse_attr(chars, i + 1)?;
                compound.attrs.push(attr);
                i = next;
            }
            ':' => {
                let (name, next) = read_ident(chars, i + 1);
                let pseudo = match name.as_str() {
                    "checked" => Pseudo::Checked,
                    "disabled" => Pseudo::Disabled,
                    "enabled" => Pseudo::Enabled,
                    "first-child" => Pseudo::FirstChild,
                    "last-child" => Pseudo::LastChild,
                    other => return Err(format!("unsupported pseudo-class `:{other}`")),
                };
                compound.pseudos.push(pseudo);
                i = next;
            }
            ch if ch.is_whitespace() || ch == '>' => break,
            other => return Err(format!("unexpected `{other}`")),
        }
    }

    if i == start {
        return Err(format!("unexpected `{}`", chars[start]));
    }
    Ok((compound, i))
}

fn parse_attr(chars: &[char], mut i: usize) -> Result<(AttrMatch, usize), String> {
    let skip_ws = |mut i: usize| {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        i
    };

    i = skip_ws(i);
    let (name, next) = read_ident(chars, i);
    if name.is_empty() {
        return Err("attribute selector without a name".into());
    }
    i = skip_ws(next);

    let op_char = match chars.get(i) {
        Some(']') => {
            return Ok((
                AttrMatch {
                    name: name.to_ascii_lowercase(),
                    op: AttrOp::Exists,
                },
                i + 1,
            ));
        }
        Some('=') => {
            i += 1;
            '='
        }
        Some(&(ch @ ('^' | '$' | '*' | '~'))) if chars.get(i + 1) == Some(&'=') => {
            i += 2;
            ch
        }
        _ => return Err("malformed attribute selector".into()),
    };

    i = skip_ws(i);
    let value: String = match chars.get(i) {
        Some(&(quote @ ('"' | '\''))) => {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|ch| *ch == quote)
                .map(|offset| start + offset)
                .ok_or("unterminated attribute value")?;
            i = end + 1;
            chars[start..end].iter().collect()
        }
        _ => {
            let start = i;
            while i < chars.len() && chars[i] != ']' && !chars[i].is_whitespace() {
                i += 1;
            }
            chars[start..i].iter().collect()
        }
    };

    i = skip_ws(i);
    if chars.get(i) != Some(&']') {
        return Err("unterminated attribute selector".into());
    }

    let op = match op_char {
        '^' => AttrOp::Prefix(value),
        '$' => AttrOp::Suffix(value),
        '*' => AttrOp::Contains(value),
        '~' => AttrOp::Word(value),
        _ => AttrOp::Equals(value),
    };
    Ok((
        AttrMatch {
            name: name.to_ascii_lowercase(),
            op,
        },
        i + 1,
    ))
}

impl AttrOp {
    pub(crate) fn matches(&self, actual: &str) -> bool {
        match self {
            Self::Exists => true,
            Self::Equals(expected) => actual == expected,
            Self::Prefix(expected) => !expected.is_empty() && actual.starts_with(expected.as_str()),
            Self::Suffix(expected) => !expected.is_empty() && actual.ends_with(expected.as_str()),
            Self::Contains(expected) => !expected.is_empty() && actual.contains(expected.as_str()),
            Self::Word(expected) => actual.split_ascii_whitespace().any(|word| word == expected),
        }
    }
}

#[cfg(test)]
#[path = "tests/selector_tests.rs"]
mod tests;
