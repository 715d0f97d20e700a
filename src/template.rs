// src/template.rs

//! Minimal `{{ .Key }}` interpolation used for commands, variables and
//! working directories.
//!
//! Two expression forms are supported inside `{{ }}`:
//!
//! - `.Key` (dotted paths such as `.Tasks.Build.Output` resolve against the
//!   flat variable map by their full dotted name)
//! - `default "fallback" .Key` — yields the fallback when the key is absent
//!   or empty
//!
//! A reference to a missing key without a `default` is an error, so typos
//! fail loudly at compile time rather than silently producing empty strings.

use indexmap::IndexMap;

use crate::errors::{Result, TaskctlError};

/// Render `tmpl` against `vars`, interpolating every `{{ ... }}` expression.
pub fn render(tmpl: &str, vars: &IndexMap<String, String>) -> Result<String> {
    if !tmpl.contains("{{") {
        return Ok(tmpl.to_string());
    }

    let mut out = String::with_capacity(tmpl.len());
    let mut rest = tmpl;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            TaskctlError::Template(format!("unclosed {{{{ in template: {tmpl:?}"))
        })?;

        let expr = after[..end].trim();
        out.push_str(&eval_expr(expr, vars)?);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn eval_expr(expr: &str, vars: &IndexMap<String, String>) -> Result<String> {
    if expr.is_empty() {
        return Err(TaskctlError::Template("empty template expression".into()));
    }

    if let Some(key) = expr.strip_prefix('.') {
        return match lookup(key, vars) {
            Some(v) => Ok(v),
            None => Err(TaskctlError::Template(format!(
                "map has no entry for key {key:?}"
            ))),
        };
    }

    if let Some(args) = expr.strip_prefix("default ") {
        return eval_default(args.trim(), vars);
    }

    Err(TaskctlError::Template(format!(
        "unsupported template expression {expr:?}"
    )))
}

/// `default <literal> .Key` — the literal wins when the key is absent or
/// resolves to an empty string.
fn eval_default(args: &str, vars: &IndexMap<String, String>) -> Result<String> {
    let (literal, rest) = parse_literal(args)?;
    let key = rest.trim().strip_prefix('.').ok_or_else(|| {
        TaskctlError::Template(format!(
            "default expects a .Key reference, got {rest:?}"
        ))
    })?;

    match lookup(key, vars) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Ok(literal),
    }
}

fn parse_literal(args: &str) -> Result<(String, &str)> {
    let mut chars = args.char_indices();
    match chars.next() {
        Some((_, quote @ ('"' | '\''))) => {
            for (i, c) in chars {
                if c == quote {
                    return Ok((args[1..i].to_string(), &args[i + 1..]));
                }
            }
            Err(TaskctlError::Template(format!(
                "unterminated string literal in {args:?}"
            )))
        }
        Some(_) => {
            let end = args.find(char::is_whitespace).unwrap_or(args.len());
            Ok((args[..end].to_string(), &args[end..]))
        }
        None => Err(TaskctlError::Template(
            "default requires a fallback value".into(),
        )),
    }
}

fn lookup(key: &str, vars: &IndexMap<String, String>) -> Option<String> {
    vars.get(key).cloned()
}
