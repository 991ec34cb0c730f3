//! Version 3 source maps with Base64 VLQ mappings

use serde::{Deserialize, Serialize};

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    pub version: u32,
    pub file: String,
    pub sources: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One generated position pointing back into a source file, all 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source: u32,
    pub original_line: u32,
    pub original_column: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMapBuilder {
    mappings: Vec<Mapping>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn build(mut self, file: &str, sources: &[String]) -> SourceMap {
        self.mappings
            .sort_by_key(|m| (m.generated_line, m.generated_column));

        SourceMap {
            version: 3,
            file: file.to_string(),
            sources: sources.to_vec(),
            names: Vec::new(),
            mappings: encode_mappings(&self.mappings),
        }
    }
}

/// Encode sorted mappings. Generated columns restart on every line; source
/// index and original position are deltas across the whole map.
pub fn encode_mappings(mappings: &[Mapping]) -> String {
    let mut out = String::new();
    let mut line = 0;
    let mut prev_column = 0i64;
    let mut prev_source = 0i64;
    let mut prev_orig_line = 0i64;
    let mut prev_orig_column = 0i64;
    let mut first_in_line = true;

    for m in mappings {
        while line < m.generated_line {
            out.push(';');
            line += 1;
            prev_column = 0;
            first_in_line = true;
        }
        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;

        encode_vlq(&mut out, m.generated_column as i64 - prev_column);
        encode_vlq(&mut out, m.source as i64 - prev_source);
        encode_vlq(&mut out, m.original_line as i64 - prev_orig_line);
        encode_vlq(&mut out, m.original_column as i64 - prev_orig_column);

        prev_column = m.generated_column as i64;
        prev_source = m.source as i64;
        prev_orig_line = m.original_line as i64;
        prev_orig_column = m.original_column as i64;
    }

    out
}

pub fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = (if value < 0 { ((-value) << 1) | 1 } else { value << 1 }) as u64;

    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}
