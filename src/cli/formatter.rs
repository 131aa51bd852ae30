//! Prints cluster responses for a terminal: JSON bodies are re-indented,
//! anything else is printed as trimmed text.

use std::io::Write;

use anyhow::{Context, Result};
use http::StatusCode;
use http::header::CONTENT_TYPE;
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct FormatOptions<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub verbose: bool,
    pub interactive: bool,
}

pub async fn format_response<W: Write>(
    res: reqwest::Response,
    opts: FormatOptions<'_>,
    out: &mut W,
) -> Result<()> {
    let status = res.status();
    let content_type = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = res.bytes().await.context("failed to read response body")?;

    render(&body, status, &content_type, opts, out).context("failed to write response")
}

fn render<W: Write>(
    body: &[u8],
    status: StatusCode,
    content_type: &str,
    opts: FormatOptions<'_>,
    out: &mut W,
) -> std::io::Result<()> {
    let is_head = opts.method.eq_ignore_ascii_case("HEAD");

    if opts.interactive || opts.verbose {
        writeln!(out, "Method:       {}", opts.method.to_ascii_uppercase())?;
        writeln!(out, "URL:          {}", opts.path)?;
        if !opts.verbose {
            writeln!(out)?;
        }
    }
    if opts.verbose || is_head {
        writeln!(out, "Response:     {status}")?;
        writeln!(out, "Content-Type: {content_type}\n")?;
    }
    if is_head {
        return Ok(());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(json) => {
            let pretty = serde_json::to_string_pretty(&json).map_err(std::io::Error::other)?;
            writeln!(out, "{pretty}")
        }
        Err(_) => writeln!(out, "{}", String::from_utf8_lossy(body).trim()),
    }
}
