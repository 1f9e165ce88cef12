//! YAML front matter parsing and rendering for note content.

use crate::constants::FRONT_MATTER_FENCE;
use crate::error::AppError;
use crate::models::FrontMatter;

fn strip_opening_fence(content: &[u8]) -> Option<&[u8]> {
    let rest = content.strip_prefix(FRONT_MATTER_FENCE.as_bytes())?;
    rest.strip_prefix(b"\n")
        .or_else(|| rest.strip_prefix(b"\r\n"))
}

fn strip_one_newline(body: &[u8]) -> &[u8] {
    body.strip_prefix(b"\n")
        .or_else(|| body.strip_prefix(b"\r\n"))
        .unwrap_or(body)
}

fn parse_yaml(raw: &[u8]) -> Result<FrontMatter, AppError> {
    let raw = String::from_utf8_lossy(raw);
    if raw.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    Ok(serde_yaml::from_str(&raw)?)
}

/// Split note content into its front matter and body.
///
/// Content without a leading `---` fence, or with an unterminated one, has
/// default front matter and is returned whole as the body. The single blank
/// line written after the closing fence by [`render_with_front_matter`] is not
/// part of the body.
///
/// # Errors
/// Returns [`AppError::FrontMatter`] when the fenced block is not valid YAML.
pub fn split_front_matter(content: &[u8]) -> Result<(FrontMatter, &[u8]), AppError> {
    let Some(block) = strip_opening_fence(content) else {
        return Ok((FrontMatter::default(), content));
    };

    let mut offset = 0;
    while offset < block.len() {
        let rest = &block[offset..];
        let (line, next) = match rest.iter().position(|b| *b == b'\n') {
            Some(idx) => (&rest[..idx], offset + idx + 1),
            None => (rest, block.len()),
        };
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line == FRONT_MATTER_FENCE.as_bytes() {
            let front_matter = parse_yaml(&block[..offset])?;
            return Ok((front_matter, strip_one_newline(&block[next..])));
        }
        offset = next;
    }

    Ok((FrontMatter::default(), content))
}

/// Render a front matter block followed by `body`.
///
/// # Errors
/// Returns [`AppError::FrontMatter`] if YAML encoding fails.
pub fn render_with_front_matter(front_matter: &FrontMatter, body: &[u8]) -> Result<Vec<u8>, AppError> {
    let yaml = serde_yaml::to_string(front_matter)?;
    let mut out = Vec::with_capacity(yaml.len() + body.len() + 16);
    out.extend_from_slice(FRONT_MATTER_FENCE.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(yaml.as_bytes());
    out.extend_from_slice(FRONT_MATTER_FENCE.as_bytes());
    out.extend_from_slice(b"\n\n");
    out.extend_from_slice(body);
    Ok(out)
}
