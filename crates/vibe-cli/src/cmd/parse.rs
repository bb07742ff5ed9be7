use std::path::Path;

use serde_json::json;
use vibe_core::directive;

use crate::output::{line_of, print_json, print_table, read_input};

pub fn run(file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let text = read_input(file)?;
    let items: Vec<_> = directive::parse(&text).collect();

    if json {
        let rows: Vec<_> = items
            .iter()
            .map(|item| match item {
                Ok(d) => json!({
                    "status": "ok",
                    "line": line_of(&text, d.span.start),
                    "directive": d.directive,
                }),
                Err(m) => json!({
                    "status": "malformed",
                    "line": line_of(&text, m.span.start),
                    "reason": m.reason.to_string(),
                    "raw": m.raw,
                }),
            })
            .collect();
        return print_json(&rows);
    }

    if items.is_empty() {
        println!("No directives found.");
        return Ok(());
    }

    let rows = items
        .iter()
        .map(|item| match item {
            Ok(d) => vec![
                line_of(&text, d.span.start).to_string(),
                d.directive.kind().to_string(),
                d.directive.target(),
                detail(&d.directive),
            ],
            Err(m) => vec![
                line_of(&text, m.span.start).to_string(),
                "MALFORMED".to_string(),
                m.raw.lines().next().unwrap_or_default().trim().to_string(),
                m.reason.to_string(),
            ],
        })
        .collect();
    print_table(&["LINE", "KIND", "TARGET", "DETAIL"], rows);
    Ok(())
}

fn detail(d: &directive::Directive) -> String {
    match d {
        directive::Directive::Write { content, .. } => {
            format!("{} line(s), {} bytes", content.lines().count(), content.len())
        }
        directive::Directive::Create {
            options: Some(opts),
            ..
        } => opts.clone(),
        _ => String::new(),
    }
}
