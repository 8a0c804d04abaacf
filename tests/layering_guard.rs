//! Layering guardrails for the shared vocabulary crate.
//!
//! `framerunner_core` holds plain data shared with discovery collaborators and hosts. It must not pick up the
//! scheduler's runtime stack (logging, CLI, JSON). This test scans its `Cargo.toml` and fails if any of those crates
//! appear in `[dependencies]`.

const FORBIDDEN: &[&str] = &["tracing", "tracing-subscriber", "clap", "serde_json", "framerunner"];

#[test]
fn core_does_not_depend_on_runtime_stack() {
    let manifest = include_str!("../crates/framerunner_core/Cargo.toml");
    let mut in_dependencies = false;

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Strip inline comments for robustness.
        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        let name = line_no_comment.split(['=', ' ']).next().unwrap_or("").trim();
        if FORBIDDEN.contains(&name) {
            panic!("`{name}` must not appear in framerunner_core's [dependencies]");
        }
    }
}
