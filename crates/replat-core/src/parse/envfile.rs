//! Env templates (`.env.example` and friends): `KEY=value` per line.

use super::{ParseContext, PartialIr};
use crate::error::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

pub fn parse(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    let mut fragment = ctx.fragment();
    let mut seen = BTreeSet::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        let key = key.trim();
        if !key_re().is_match(key) {
            return Err(ctx.error(Some(idx + 1), format!("invalid variable name '{key}'")));
        }
        if !seen.insert(key.to_string()) {
            continue;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        fragment.env_vars.push(ctx.env(key, !value.is_empty()));
    }

    Ok(fragment)
}
