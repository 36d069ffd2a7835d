//! Recover the verification key from a generated verifier contract.
//!
//! The contract's `verifyingKey()` body assigns each key component on its own
//! line:
//!
//! ```text
//! vk.h = Pairing.G2Point([0x1, 0x2], [0x3, 0x4]);
//! vk.g_alpha = Pairing.G1Point(0x5, 0x6);
//! vk.query = new Pairing.G1Point[](2);
//! vk.query[0] = Pairing.G1Point(0x7, 0x8);
//! vk.query[1] = Pairing.G1Point(0x9, 0xa);
//! ```
//!
//! Component names are whatever the toolchain emits; they are carried through
//! verbatim and in contract order. A G1 point becomes `["x", "y"]`, a G2 point
//! `[["x0", "x1"], ["y0", "y1"]]`, an array a JSON array of points.

use crate::error::{BuildError, Result};
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::OnceLock;

/// Largest array a key may declare or index into.
pub const MAX_ARRAY_LEN: usize = 1 << 16;

const DECLARE_RE: &str = r"^vk\.(\w+)\s*=\s*new\s+Pairing\.G[12]Point\[\]\s*\(\s*(\d+)\s*\)";
const ASSIGN_RE: &str =
    r"^vk\.(\w+)(?:\[(\d+)\])?\s*=\s*Pairing\.G[12]Point\s*\((.*)\)\s*;?\s*$";

struct Patterns {
    declare: Regex,
    assign: Regex,
    group: Regex,
    number: Regex,
}

static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();

fn patterns() -> Option<&'static Patterns> {
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                declare: Regex::new(DECLARE_RE).ok()?,
                assign: Regex::new(ASSIGN_RE).ok()?,
                group: Regex::new(r"\[([^\]]*)\]").ok()?,
                number: Regex::new(r"\b(0x[0-9a-fA-F]+|[0-9]+)\b").ok()?,
            })
        })
        .as_ref()
}

fn parse_len(line: &str, digits: &str) -> std::result::Result<usize, String> {
    match digits.parse::<usize>() {
        Ok(n) if n <= MAX_ARRAY_LEN => Ok(n),
        _ => Err(format!("`{line}`: {digits} exceeds the {MAX_ARRAY_LEN} entry limit")),
    }
}

/// Structured verification key, fields in contract order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VerificationKey {
    fields: Vec<(String, Value)>,
}

impl VerificationKey {
    /// Parse contract source text.
    ///
    /// Fails if no `vk.` assignment is present, a point has no coordinates, an
    /// array length or index exceeds [`MAX_ARRAY_LEN`], an index falls outside
    /// the declared length, or a declared array slot is never assigned.
    pub fn parse(contract: &str) -> std::result::Result<Self, String> {
        let p = patterns().ok_or_else(|| "key patterns failed to compile".to_string())?;
        let mut vk = Self::default();
        let mut declared: Vec<(String, usize)> = Vec::new();

        for line in contract.lines().map(str::trim).filter(|l| l.starts_with("vk.")) {
            if let Some(c) = p.declare.captures(line) {
                let len = parse_len(line, &c[2])?;
                *vk.slot(&c[1]) = Value::Array(vec![Value::Null; len]);
                match declared.iter_mut().find(|(n, _)| n == &c[1]) {
                    Some(entry) => entry.1 = len,
                    None => declared.push((c[1].to_owned(), len)),
                }
            } else if let Some(c) = p.assign.captures(line) {
                let point =
                    parse_point(p, &c[3]).ok_or_else(|| format!("no coordinates in `{line}`"))?;
                let Some(idx) = c.get(2) else {
                    *vk.slot(&c[1]) = point;
                    continue;
                };
                let i = parse_len(line, idx.as_str())?;
                if let Some((_, len)) = declared.iter().find(|(n, _)| n == &c[1]) {
                    if i >= *len {
                        return Err(format!("`{line}`: index {i} outside declared length {len}"));
                    }
                }
                let slot = vk.slot(&c[1]);
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(items) = slot {
                    let Some(needed) = i.checked_add(1) else {
                        return Err(format!("`{line}`: index {i} out of range"));
                    };
                    if items.len() < needed {
                        items.resize(needed, Value::Null);
                    }
                    items[i] = point;
                }
            }
        }

        if vk.fields.is_empty() {
            return Err("no verifying key assignments found".into());
        }
        for (name, value) in &vk.fields {
            if let Value::Array(items) = value {
                if let Some(i) = items.iter().position(Value::is_null) {
                    return Err(format!("{name}[{i}] declared but never assigned"));
                }
            }
        }
        Ok(vk)
    }

    fn slot(&mut self, name: &str) -> &mut Value {
        let pos = match self.fields.iter().position(|(n, _)| n == name) {
            Some(pos) => pos,
            None => {
                self.fields.push((name.to_owned(), Value::Null));
                self.fields.len() - 1
            }
        };
        &mut self.fields[pos].1
    }

    /// Value of a named component.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Component names in contract order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for VerificationKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn numbers(p: &Patterns, s: &str) -> Vec<Value> {
    p.number
        .find_iter(s)
        .map(|m| Value::String(m.as_str().to_owned()))
        .collect()
}

fn parse_point(p: &Patterns, args: &str) -> Option<Value> {
    let groups: Vec<Value> = p
        .group
        .captures_iter(args)
        .map(|c| Value::Array(numbers(p, &c[1])))
        .collect();
    let point = if groups.is_empty() {
        numbers(p, args)
    } else {
        groups
    };
    (!point.is_empty()).then_some(Value::Array(point))
}

/// Parse `verifier` and write the key as pretty JSON to `out`.
pub fn extract_key_file(verifier: &Path, out: &Path) -> Result<VerificationKey> {
    let contract = std::fs::read_to_string(verifier).map_err(|e| BuildError::KeyExtraction {
        path: verifier.to_path_buf(),
        reason: e.to_string(),
    })?;
    let vk = VerificationKey::parse(&contract).map_err(|reason| BuildError::KeyExtraction {
        path: verifier.to_path_buf(),
        reason,
    })?;

    let f =
        File::create(out).map_err(|e| BuildError::io(format!("create {}", out.display()), e))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, &vk).map_err(|e| BuildError::KeyExtraction {
        path: verifier.to_path_buf(),
        reason: format!("serialize key: {e}"),
    })?;
    w.flush().map_err(|e| BuildError::io(format!("flush {}", out.display()), e))?;
    Ok(vk)
}
