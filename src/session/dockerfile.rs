//! Dockerfile reconstruction.
//!
//! Derives a Dockerfile from what the session record knows: the base image,
//! the downloaded resource and the files written through the server. It never
//! asks the runtime, so anything changed by executed commands is missing and
//! the emitted text says so.

use crate::env::container::WORKSPACE_ROOT;
use crate::env::workspace_path;
use crate::session::types::Session;

const LIMITATION_NOTE: [&str; 5] = [
    "# NOTE: best-effort approximation of the session environment.",
    "# It only replays what the sandbox server itself placed in the workspace",
    "# (the initial download and files created through the server). Packages",
    "# installed, files edited or other changes made by executed commands are",
    "# NOT captured; add those steps manually below.",
];

const PLACEHOLDER: [&str; 4] = [
    "# Add any additional steps needed:",
    "# RUN pip install <packages>",
    "# COPY <src> <dest>",
    "# etc.",
];

/// Render the Dockerfile for `session`.
pub fn synthesize(session: &Session) -> String {
    let mut lines = vec![format!(
        "# Reconstructed from sandbox session {}",
        session.handle
    )];
    lines.push("#".to_string());
    lines.extend(LIMITATION_NOTE.iter().map(|line| line.to_string()));
    lines.push(format!("FROM {}", session.image));
    lines.push(format!("WORKDIR {}", WORKSPACE_ROOT));

    if let Some(download) = &session.download {
        lines.push(instruction("ADD", &download.url, &workspace_path(&download.file_name)));
    }

    for path in session.created_files.iter() {
        lines.push(instruction("COPY", path, &workspace_path(path)));
    }

    lines.push(String::new());
    lines.extend(PLACEHOLDER.iter().map(|line| line.to_string()));

    let mut dockerfile = lines.join("\n");
    dockerfile.push('\n');
    dockerfile
}

/// Shell form when both operands are plain, JSON form otherwise.
fn instruction(keyword: &str, source: &str, target: &str) -> String {
    let plain = |s: &str| !s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if plain(source) && plain(target) {
        format!("{keyword} {source} {target}")
    } else {
        let quoted = serde_json::to_string(&[source, target])
            .unwrap_or_else(|_| format!("[\"{source}\", \"{target}\"]"));
        format!("{keyword} {quoted}")
    }
}
