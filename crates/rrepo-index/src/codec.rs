//! `PACKAGES` stanza encoding and decoding.
//!
//! A document is a sequence of RFC822-style stanzas, each a run of
//! `Key: Value` lines terminated by a blank line. Field order within a stanza
//! is Package, Version, Depends, Imports, Suggests, License, NeedsCompilation;
//! absent fields are omitted. Multi-line values are folded onto indented
//! continuation lines.

use crate::document::IndexEntry;
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use rrepo_core::error::{RepoError, Result};
use rrepo_core::types::Attributes;
use std::io::{Read, Write};
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const CONTINUATION_INDENT: &str = "        ";

fn write_field(out: &mut String, key: &str, value: &str) {
    let mut lines = value.lines().map(str::trim).filter(|line| !line.is_empty());

    out.push_str(key);
    out.push_str(": ");
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push('\n');
        out.push_str(CONTINUATION_INDENT);
        out.push_str(line);
    }
    out.push('\n');
}

/// Append one stanza, including its terminating blank line.
pub fn write_stanza(out: &mut String, entry: &IndexEntry) {
    write_field(out, "Package", &entry.package);
    write_field(out, "Version", &entry.version);
    for (key, value) in entry.attributes.fields() {
        if let Some(value) = value {
            write_field(out, key, value);
        }
    }
    out.push('\n');
}

/// Plain-text document for a sequence of entries.
pub fn render_packages<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    let mut out = String::new();
    for entry in entries {
        write_stanza(&mut out, entry);
    }
    out
}

/// Gzip-compressed document for a sequence of entries.
///
/// The gzip header carries no timestamp or file name, so equal input always
/// yields identical bytes. No entries still yields a valid gzip stream.
pub fn encode_packages<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    let text = render_packages(entries);

    let mut encoder = GzBuilder::new().mtime(0).write(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    let bytes = encoder.finish()?;

    Ok(bytes)
}

/// Parse a document, gzip-compressed or plain.
pub fn decode_packages(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    let text = if bytes.starts_with(&GZIP_MAGIC) {
        let mut text = String::new();
        GzDecoder::new(bytes).read_to_string(&mut text)?;
        text
    } else {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RepoError::internal(format!("PACKAGES is not valid UTF-8: {}", e)))?
    };

    Ok(parse_packages(&text))
}

/// Parse plain-text stanzas.
///
/// Stanzas without both Package and Version are skipped; fields other than
/// the index attributes are ignored.
pub fn parse_packages(text: &str) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_stanza(&mut fields, &mut entries);
        } else if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = fields.last_mut() {
                value.push('\n');
                value.push_str(line.trim());
            }
        } else if let Some((key, value)) = line.split_once(':') {
            fields.push((key.trim().to_string(), value.trim().to_string()));
        } else {
            debug!("Ignoring malformed PACKAGES line: {}", line);
        }
    }
    flush_stanza(&mut fields, &mut entries);

    entries
}

fn flush_stanza(fields: &mut Vec<(String, String)>, entries: &mut Vec<IndexEntry>) {
    if fields.is_empty() {
        return;
    }

    let mut package = None;
    let mut version = None;
    let mut attributes = Attributes::default();

    for (key, value) in fields.drain(..) {
        match key.as_str() {
            "Package" => package = Some(value),
            "Version" => version = Some(value),
            _ => {
                attributes.set(&key, value);
            }
        }
    }

    match (package, version) {
        (Some(package), Some(version)) => entries.push(IndexEntry::new(package, version, attributes)),
        (package, _) => debug!("Skipping PACKAGES stanza without name or version: {:?}", package),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> IndexEntry {
        IndexEntry::new(
            "agricolae",
            "1.3-1",
            Attributes {
                depends: Some("R (>= 2.10)".to_string()),
                imports: Some("MASS, nlme,\n   klaR".to_string()),
                license: Some("GPL".to_string()),
                needs_compilation: Some("no".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_stanza_field_order() {
        let text = render_packages([&entry()]);
        assert_eq!(
            text,
            "Package: agricolae\n\
             Version: 1.3-1\n\
             Depends: R (>= 2.10)\n\
             Imports: MASS, nlme,\n        klaR\n\
             License: GPL\n\
             NeedsCompilation: no\n\
             \n"
        );
    }

    #[test]
    fn test_empty_document_is_valid_gzip() {
        let bytes = encode_packages(std::iter::empty()).unwrap();
        assert!(bytes.starts_with(&GZIP_MAGIC));
        assert!(decode_packages(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_decode_folds_continuations() {
        let bytes = encode_packages([&entry()]).unwrap();
        let decoded = decode_packages(&bytes).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].attributes.imports.as_deref(), Some("MASS, nlme,\nklaR"));
        assert_eq!(decoded[0].attributes.suggests, None);
    }

    #[test]
    fn test_parse_plain_cran_document() {
        let text = "Package: A3\nVersion: 1.0.0\nDepends: R (>= 2.15.0), xtable, pbapply\n\
                    MD5sum: 027ebdd8affce8f0effaecfcd5f5ade2\nNeedsCompilation: no\n\n\
                    Package: abbyyR\nVersion: 0.5.5\nImports: httr, XML, curl, readr,\n    plyr, progress\n\n\
                    Title: orphan stanza\n";
        let entries = decode_packages(text.as_bytes()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].package, "A3");
        assert_eq!(entries[0].attributes.needs_compilation.as_deref(), Some("no"));
        assert_eq!(entries[1].attributes.imports.as_deref(), Some("httr, XML, curl, readr,\nplyr, progress"));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let e = entry();
        assert_eq!(encode_packages([&e]).unwrap(), encode_packages([&e]).unwrap());
    }
}
