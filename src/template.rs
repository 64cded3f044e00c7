//! Placeholder substitution for prompt templates.
//!
//! `{name}` is replaced by the value bound to `name`; `{{` and `}}` stand for
//! literal braces. Values are inserted verbatim, so they may contain braces
//! of their own.

use anyhow::{Result, bail};

pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if chars.next_if(|&(_, next)| next == '{').is_some() {
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    match next {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => bail!("nested '{{' in placeholder starting at byte {}", pos),
                        other => name.push(other),
                    }
                }
                if !closed {
                    bail!("unclosed '{{' at byte {}", pos);
                }
                let name = name.trim();
                if name.is_empty() {
                    bail!("empty placeholder at byte {}", pos);
                }
                match vars.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => out.push_str(value),
                    None => bail!("unknown placeholder {{{}}} at byte {}", name, pos),
                }
            }
            '}' => {
                if chars.next_if(|&(_, next)| next == '}').is_none() {
                    bail!("single '}}' at byte {}; write '}}}}' for a literal brace", pos);
                }
                out.push('}');
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Placeholder names used by `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        if let Some(stripped) = after.strip_prefix('{') {
            rest = stripped;
            continue;
        }
        match after.find('}') {
            Some(end) => {
                let name = after[..end].trim().to_string();
                if !name.is_empty() && !name.contains('{') && !names.contains(&name) {
                    names.push(name);
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}
