//! Heroku-style Procfile: one `name: command` per line.

use super::{ParseContext, PartialIr};
use crate::error::Result;
use crate::model::ProcessComponent;
use crate::types::ProcessKind;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

pub fn kind_for(name: &str) -> ProcessKind {
    match name {
        "web" => ProcessKind::Web,
        "release" => ProcessKind::Release,
        _ => ProcessKind::Worker,
    }
}

pub fn parse(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let mut fragment = ctx.fragment();
    let mut seen = BTreeSet::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, command)) = line.split_once(':') else {
            return Err(ctx.error(Some(line_no), "expected 'name: command'"));
        };
        let name = name.trim();
        let command = command.trim();
        if !name_re().is_match(name) {
            return Err(ctx.error(
                Some(line_no),
                format!("invalid process name '{name}' (letters, digits, '_' and '-' only)"),
            ));
        }
        if command.is_empty() {
            return Err(ctx.error(Some(line_no), format!("process '{name}' has no command")));
        }
        if !seen.insert(name.to_string()) {
            return Err(ctx.error(Some(line_no), format!("process '{name}' is declared twice")));
        }
        fragment
            .processes
            .push(ProcessComponent::new(name, kind_for(name), ctx.origin()).with_command(command));
    }

    Ok(fragment)
}
