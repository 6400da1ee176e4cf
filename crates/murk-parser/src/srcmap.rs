//! Source Map v3 emission.
//!
//! Converts the code generator's mapping list into the standard JSON format
//! with Base64 VLQ `mappings`. Original positions are resolved through a
//! [`LineIndex`] over the input source.

use crate::codegen::SourceMapping;
use crate::span::LineIndex;
use serde::Serialize;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// A serializable Source Map v3 document.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file: String,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Build a source map from codegen mappings.
///
/// `source_content` embeds the original source when provided (the
/// sources-content mode); otherwise only the source name is recorded.
pub fn build_source_map(
    mappings: &[SourceMapping],
    original: &str,
    source_name: &str,
    file: &str,
    source_content: bool,
) -> SourceMap {
    let index = LineIndex::new(original);

    let mut sorted: Vec<&SourceMapping> = mappings.iter().collect();
    sorted.sort_by_key(|m| (m.gen_line, m.gen_col));

    let mut encoded = String::new();
    let mut current_line = 0u32;
    let mut prev_gen_col = 0i64;
    let mut prev_src_line = 0i64;
    let mut prev_src_col = 0i64;
    let mut first_in_line = true;

    for mapping in sorted {
        while current_line < mapping.gen_line {
            encoded.push(';');
            current_line += 1;
            prev_gen_col = 0;
            first_in_line = true;
        }
        if !first_in_line {
            encoded.push(',');
        }
        first_in_line = false;

        let (src_line, src_col) = index.line_col(mapping.orig_offset);
        encode_vlq(&mut encoded, i64::from(mapping.gen_col) - prev_gen_col);
        encode_vlq(&mut encoded, 0); // single source
        encode_vlq(&mut encoded, i64::from(src_line) - prev_src_line);
        encode_vlq(&mut encoded, i64::from(src_col) - prev_src_col);

        prev_gen_col = i64::from(mapping.gen_col);
        prev_src_line = i64::from(src_line);
        prev_src_col = i64::from(src_col);
    }

    SourceMap {
        version: 3,
        file: file.to_string(),
        sources: vec![source_name.to_string()],
        sources_content: source_content.then(|| vec![original.to_string()]),
        names: Vec::new(),
        mappings: encoded,
    }
}

/// Base64 VLQ: signed value, sign bit in the lowest position, 5 data bits
/// per character with a continuation bit.
fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as u8;
        vlq >>= 5;
        if vlq != 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}
