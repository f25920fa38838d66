//! Dockerfile metadata. Only the final stage's `EXPOSE` and `CMD` are read;
//! the build graph is not interpreted.

use super::{parse_port, CommandSpec, DockerfileMeta, ParseContext, PartialIr};
use crate::error::Result;
use crate::paths;

/// Join `\`-continued lines, keeping the number of the first physical line.
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut current: Option<(usize, String)> = None;
    for (idx, raw) in content.lines().enumerate() {
        let trimmed = raw.trim();
        if current.is_none() && (trimmed.is_empty() || trimmed.starts_with('#')) {
            continue;
        }
        let (start, mut text) = current.take().unwrap_or((idx + 1, String::new()));
        if let Some(body) = trimmed.strip_suffix('\\') {
            text.push_str(body);
            text.push(' ');
            current = Some((start, text));
        } else {
            text.push_str(trimmed);
            out.push((start, text));
        }
    }
    if let Some(rest) = current {
        out.push(rest);
    }
    out
}

pub fn parse(ctx: &ParseContext, content: &str) -> Result<PartialIr> {
    ctx.require_content(content)?;
    let mut saw_from = false;
    let mut expose = None;
    let mut command = None;

    for (line_no, line) in logical_lines(content) {
        let (instruction, args) = line.split_once(char::is_whitespace).unwrap_or((line.as_str(), ""));
        let args = args.trim();
        match instruction.to_ascii_uppercase().as_str() {
            "FROM" => {
                saw_from = true;
                expose = None;
                command = None;
            }
            "EXPOSE" if expose.is_none() => {
                expose = args
                    .split_whitespace()
                    .find_map(|p| parse_port(p.split('/').next().unwrap_or(p)));
            }
            "CMD" => {
                let rendered = if args.starts_with('[') {
                    let argv: Vec<String> = serde_json::from_str(args)
                        .map_err(|e| ctx.error(Some(line_no), format!("CMD is not a JSON array: {e}")))?;
                    CommandSpec::Argv(argv).render()
                } else {
                    args.to_string()
                };
                command = Some(rendered).filter(|c| !c.is_empty());
            }
            "ARG" | "ENV" | "RUN" | "COPY" | "ADD" | "WORKDIR" | "USER" | "LABEL" | "ENTRYPOINT" | "EXPOSE"
            | "VOLUME" | "HEALTHCHECK" | "SHELL" | "STOPSIGNAL" | "ONBUILD" | "MAINTAINER" => {}
            other => {
                return Err(ctx.error(Some(line_no), format!("unknown instruction '{other}'")));
            }
        }
    }

    if !saw_from {
        return Err(ctx.error(None, "no FROM instruction"));
    }

    let mut fragment = ctx.fragment();
    fragment.dockerfile = Some(DockerfileMeta {
        source_dir: paths::source_dir_of(&ctx.path),
        expose,
        command,
    });
    Ok(fragment)
}
