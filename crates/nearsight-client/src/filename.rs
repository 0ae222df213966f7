//! Filename recovery for downloaded originals.

use nearsight_core::{AssetId, Error, Result};

/// Extension given to generated filenames.
const FALLBACK_EXTENSION: &str = "bin";
/// Stem used when the asset id has no usable characters.
const FALLBACK_STEM: &str = "download";

/// Extracts the filename from a `Content-Disposition` header value.
///
/// The value is split on `;` and the second segment must read `filename=<value>`.
/// Everything after the first `=` is the filename, with surrounding whitespace and
/// one pair of enclosing double quotes removed.
///
/// # Errors
/// Returns [`Error::Parse`] if the header does not have that shape or the value is empty.
pub fn parse_content_disposition(header: &str) -> Result<String> {
    let parameter = header
        .split(';')
        .nth(1)
        .map(str::trim)
        .ok_or_else(|| Error::Parse(format!("no parameters in {header:?}")))?;

    let (key, value) = parameter
        .split_once('=')
        .ok_or_else(|| Error::Parse(format!("parameter {parameter:?} has no value")))?;

    if !key.trim().eq_ignore_ascii_case("filename") {
        return Err(Error::Parse(format!(
            "expected filename parameter, found {key:?}"
        )));
    }

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value);

    if value.is_empty() {
        return Err(Error::Parse("empty filename".to_owned()));
    }
    Ok(value.to_owned())
}

/// Deterministic filename for an asset whose download carried no usable name.
pub fn fallback_filename(id: &AssetId) -> String {
    let stem: String = id
        .as_str()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    if stem.chars().all(|ch| ch == '_') {
        format!("{FALLBACK_STEM}.{FALLBACK_EXTENSION}")
    } else {
        format!("{stem}.{FALLBACK_EXTENSION}")
    }
}

/// Reduces a server-supplied name to a single safe path component.
///
/// Directory parts are dropped and control characters removed; `None` means
/// nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last.chars().filter(|ch| !ch.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_owned())
    }
}
