//! `JSON.*` document storage: a recursive value tree plus dot/bracket path
//! addressing, hand-rolling a small recursive-descent matcher in the same
//! spirit as `glob_match` in `storage/engine.rs` rather than pulling in a
//! dedicated parsing crate.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::Kind;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A JSON document. Object keys use `BTreeMap` so `JSON.OBJKEYS` can return
/// them in sorted order without a separate pass.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<JsonValue>),
    Object(BTreeMap<String, JsonValue>),
}

impl JsonValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(_) => "number",
            JsonValue::Str(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }

    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    fn write_json(&self, out: &mut String) {
        match self {
            JsonValue::Null => out.push_str("null"),
            JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            JsonValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    let _ = write!(out, "{}", *n as i64);
                } else {
                    let _ = write!(out, "{}", n);
                }
            }
            JsonValue::Str(s) => {
                out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            JsonValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_json(out);
                }
                out.push(']');
            }
            JsonValue::Object(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    JsonValue::Str(k.clone()).write_json(out);
                    out.push(':');
                    v.write_json(out);
                }
                out.push('}');
            }
        }
    }

    /// Minimal JSON parser sufficient for `JSON.SET` payloads. Supports
    /// objects, arrays, strings, numbers, booleans, and null.
    pub fn parse(input: &str) -> Result<JsonValue, String> {
        let chars: Vec<char> = input.chars().collect();
        let mut pos = 0;
        let value = parse_value(&chars, &mut pos)?;
        skip_ws(&chars, &mut pos);
        if pos != chars.len() {
            return Err("trailing data after JSON value".to_string());
        }
        Ok(value)
    }
}

fn skip_ws(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

fn parse_value(chars: &[char], pos: &mut usize) -> Result<JsonValue, String> {
    skip_ws(chars, pos);
    if *pos >= chars.len() {
        return Err("unexpected end of input".to_string());
    }
    match chars[*pos] {
        '{' => parse_object(chars, pos),
        '[' => parse_array(chars, pos),
        '"' => parse_string(chars, pos).map(JsonValue::Str),
        't' => parse_literal(chars, pos, "true", JsonValue::Bool(true)),
        'f' => parse_literal(chars, pos, "false", JsonValue::Bool(false)),
        'n' => parse_literal(chars, pos, "null", JsonValue::Null),
        _ => parse_number(chars, pos),
    }
}

fn parse_literal(
    chars: &[char],
    pos: &mut usize,
    lit: &str,
    value: JsonValue,
) -> Result<JsonValue, String> {
    let lit_chars: Vec<char> = lit.chars().collect();
    if *pos + lit_chars.len() > chars.len() || chars[*pos..*pos + lit_chars.len()] != lit_chars[..]
    {
        return Err(format!("expected literal '{}'", lit));
    }
    *pos += lit_chars.len();
    Ok(value)
}

fn parse_number(chars: &[char], pos: &mut usize) -> Result<JsonValue, String> {
    let start = *pos;
    if *pos < chars.len() && (chars[*pos] == '-' || chars[*pos] == '+') {
        *pos += 1;
    }
    while *pos < chars.len()
        && (chars[*pos].is_ascii_digit()
            || chars[*pos] == '.'
            || chars[*pos] == 'e'
            || chars[*pos] == 'E'
            || chars[*pos] == '-'
            || chars[*pos] == '+')
    {
        *pos += 1;
    }
    let text: String = chars[start..*pos].iter().collect();
    text.parse::<f64>()
        .map(JsonValue::Number)
        .map_err(|_| format!("invalid number '{}'", text))
}

fn parse_string(chars: &[char], pos: &mut usize) -> Result<String, String> {
    if chars[*pos] != '"' {
        return Err("expected string".to_string());
    }
    *pos += 1;
    let mut out = String::new();
    while *pos < chars.len() && chars[*pos] != '"' {
        if chars[*pos] == '\\' && *pos + 1 < chars.len() {
            *pos += 1;
            match chars[*pos] {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                '/' => out.push('/'),
                c => out.push(c),
            }
        } else {
            out.push(chars[*pos]);
        }
        *pos += 1;
    }
    if *pos >= chars.len() {
        return Err("unterminated string".to_string());
    }
    *pos += 1;
    Ok(out)
}

fn parse_array(chars: &[char], pos: &mut usize) -> Result<JsonValue, String> {
    *pos += 1;
    let mut items = Vec::new();
    skip_ws(chars, pos);
    if *pos < chars.len() && chars[*pos] == ']' {
        *pos += 1;
        return Ok(JsonValue::Array(items));
    }
    loop {
        items.push(parse_value(chars, pos)?);
        skip_ws(chars, pos);
        match chars.get(*pos) {
            Some(',') => {
                *pos += 1;
            }
            Some(']') => {
                *pos += 1;
                break;
            }
            _ => return Err("expected ',' or ']' in array".to_string()),
        }
    }
    Ok(JsonValue::Array(items))
}

fn parse_object(chars: &[char], pos: &mut usize) -> Result<JsonValue, String> {
    *pos += 1;
    let mut map = BTreeMap::new();
    skip_ws(chars, pos);
    if *pos < chars.len() && chars[*pos] == '}' {
        *pos += 1;
        return Ok(JsonValue::Object(map));
    }
    loop {
        skip_ws(chars, pos);
        let key = parse_string(chars, pos)?;
        skip_ws(chars, pos);
        if chars.get(*pos) != Some(&':') {
            return Err("expected ':' in object".to_string());
        }
        *pos += 1;
        let value = parse_value(chars, pos)?;
        map.insert(key, value);
        skip_ws(chars, pos);
        match chars.get(*pos) {
            Some(',') => {
                *pos += 1;
            }
            Some('}') => {
                *pos += 1;
                break;
            }
            _ => return Err("expected ',' or '}' in object".to_string()),
        }
    }
    Ok(JsonValue::Object(map))
}

/// One path segment: either an object field or an array index.
#[derive(Debug, Clone)]
enum PathSegment {
    Field(String),
    Index(usize),
}

/// Parses a dot path like `.foo.bar[2].baz`. The root path `.` yields no
/// segments.
fn parse_path(path: &str) -> Result<Vec<PathSegment>, String> {
    let path = path.strip_prefix('.').unwrap_or(path);
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    for raw in path.split('.') {
        let mut rest = raw;
        loop {
            if let Some(bracket) = rest.find('[') {
                let (field, tail) = rest.split_at(bracket);
                if !field.is_empty() {
                    segments.push(PathSegment::Field(field.to_string()));
                }
                let close = tail
                    .find(']')
                    .ok_or_else(|| "unterminated '[' in path".to_string())?;
                let idx_str = &tail[1..close];
                let idx = idx_str
                    .parse::<usize>()
                    .map_err(|_| format!("invalid array index '{}'", idx_str))?;
                segments.push(PathSegment::Index(idx));
                rest = &tail[close + 1..];
                if rest.is_empty() {
                    break;
                }
            } else {
                if !rest.is_empty() {
                    segments.push(PathSegment::Field(rest.to_string()));
                }
                break;
            }
        }
    }
    Ok(segments)
}

/// Reads the value at `path`, returning `None` if any segment doesn't exist.
pub fn get_path<'a>(root: &'a JsonValue, path: &str) -> Result<Option<&'a JsonValue>, String> {
    let segments = parse_path(path)?;
    let mut cur = root;
    for seg in &segments {
        match (cur, seg) {
            (JsonValue::Object(map), PathSegment::Field(name)) => match map.get(name) {
                Some(v) => cur = v,
                None => return Ok(None),
            },
            (JsonValue::Array(items), PathSegment::Index(i)) => match items.get(*i) {
                Some(v) => cur = v,
                None => return Ok(None),
            },
            _ => return Ok(None),
        }
    }
    Ok(Some(cur))
}

/// Writes `value` at `path`, creating intermediate objects as needed.
/// Returns an error if a non-terminal segment traverses into a non-container.
pub fn set_path(root: &mut JsonValue, path: &str, value: JsonValue) -> Result<(), String> {
    let segments = parse_path(path)?;
    if segments.is_empty() {
        *root = value;
        return Ok(());
    }
    set_recursive(root, &segments, value)
}

fn set_recursive(cur: &mut JsonValue, segments: &[PathSegment], value: JsonValue) -> Result<(), String> {
    let (seg, rest) = segments.split_first().unwrap();
    match seg {
        PathSegment::Field(name) => {
            if !matches!(cur, JsonValue::Object(_)) {
                *cur = JsonValue::Object(BTreeMap::new());
            }
            let map = match cur {
                JsonValue::Object(m) => m,
                _ => unreachable!(),
            };
            if rest.is_empty() {
                map.insert(name.clone(), value);
                Ok(())
            } else {
                let entry = map
                    .entry(name.clone())
                    .or_insert(JsonValue::Object(BTreeMap::new()));
                set_recursive(entry, rest, value)
            }
        }
        PathSegment::Index(idx) => {
            if !matches!(cur, JsonValue::Array(_)) {
                *cur = JsonValue::Array(Vec::new());
            }
            let items = match cur {
                JsonValue::Array(v) => v,
                _ => unreachable!(),
            };
            while items.len() <= *idx {
                items.push(JsonValue::Null);
            }
            if rest.is_empty() {
                items[*idx] = value;
                Ok(())
            } else {
                set_recursive(&mut items[*idx], rest, value)
            }
        }
    }
}

/// Deletes the value at `path`. Returns whether something was removed.
pub fn del_path(root: &mut JsonValue, path: &str) -> Result<bool, String> {
    let segments = parse_path(path)?;
    if segments.is_empty() {
        return Ok(false);
    }
    let (last, prefix) = segments.split_last().unwrap();
    let mut cur = root;
    for seg in prefix {
        match (cur, seg) {
            (JsonValue::Object(map), PathSegment::Field(name)) => match map.get_mut(name) {
                Some(v) => cur = v,
                None => return Ok(false),
            },
            (JsonValue::Array(items), PathSegment::Index(i)) => match items.get_mut(*i) {
                Some(v) => cur = v,
                None => return Ok(false),
            },
            _ => return Ok(false),
        }
    }
    match (cur, last) {
        (JsonValue::Object(map), PathSegment::Field(name)) => Ok(map.remove(name).is_some()),
        (JsonValue::Array(items), PathSegment::Index(i)) => {
            if *i < items.len() {
                items.remove(*i);
                Ok(true)
            } else {
                Ok(false)
            }
        }
        _ => Ok(false),
    }
}

/// Recursive deep merge used by `JSON.MERGE`: objects merge key-by-key,
/// arrays and scalars are replaced wholesale by the incoming value.
pub fn deep_merge(base: &mut JsonValue, patch: JsonValue) {
    match (base, patch) {
        (JsonValue::Object(base_map), JsonValue::Object(patch_map)) => {
            for (k, v) in patch_map {
                if v == JsonValue::Null {
                    base_map.remove(&k);
                    continue;
                }
                match base_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value;
        }
    }
}

fn as_json(kind: &Kind) -> CoreResult<JsonValue> {
    match kind {
        Kind::Json(v) => Ok(v.clone()),
        _ => Err(CoreError::WrongType),
    }
}

impl KeyspaceEngine {
    pub fn json_set(&self, key: &Bytes, path: &str, raw: &str, nx: bool, xx: bool) -> CoreResult<bool> {
        let value = JsonValue::parse(raw).map_err(CoreError::generic)?;
        let existing_at_path = match self.with_read(key, as_json) {
            Some(Ok(doc)) => get_path(&doc, path).ok().flatten().cloned(),
            Some(Err(e)) => return Err(e),
            None => None,
        };
        if nx && existing_at_path.is_some() {
            return Ok(false);
        }
        if xx && existing_at_path.is_none() {
            return Ok(false);
        }
        self.with_write_or_insert(
            key,
            || Kind::Json(JsonValue::Object(BTreeMap::new())),
            |entry| match &mut entry.kind {
                Kind::Json(doc) => {
                    set_path(doc, path, value).map_err(CoreError::generic)?;
                    Ok(true)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn json_get(&self, key: &Bytes, path: &str) -> CoreResult<Option<String>> {
        match self.with_read(key, as_json) {
            Some(r) => r.map(|doc| get_path(&doc, path).ok().flatten().map(|v| v.to_json_string())),
            None => Ok(None),
        }
    }

    pub fn json_del(&self, key: &Bytes, path: &str) -> CoreResult<bool> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Json(doc) => del_path(doc, path).map_err(CoreError::generic),
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(false))
    }

    pub fn json_type(&self, key: &Bytes, path: &str) -> CoreResult<Option<&'static str>> {
        match self.with_read(key, as_json) {
            Some(r) => r.map(|doc| get_path(&doc, path).ok().flatten().map(|v| v.type_name())),
            None => Ok(None),
        }
    }

    pub fn json_numincrby(&self, key: &Bytes, path: &str, delta: f64) -> CoreResult<f64> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Json(doc) => {
                let current = match get_path(doc, path).map_err(CoreError::generic)? {
                    Some(JsonValue::Number(n)) => *n,
                    Some(_) => return Err(CoreError::generic("-ERR value at path is not a number")),
                    None => return Err(CoreError::NoSuchKey),
                };
                let new_value = current + delta;
                set_path(doc, path, JsonValue::Number(new_value)).map_err(CoreError::generic)?;
                Ok(new_value)
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Err(CoreError::NoSuchKey))
    }

    pub fn json_merge(&self, key: &Bytes, path: &str, raw: &str) -> CoreResult<()> {
        let patch = JsonValue::parse(raw).map_err(CoreError::generic)?;
        self.with_write_or_insert(
            key,
            || Kind::Json(JsonValue::Object(BTreeMap::new())),
            |entry| match &mut entry.kind {
                Kind::Json(doc) => {
                    if path.is_empty() || path == "." {
                        deep_merge(doc, patch.clone());
                        return Ok(());
                    }
                    let mut target = get_path(doc, path).ok().flatten().cloned().unwrap_or(JsonValue::Null);
                    deep_merge(&mut target, patch.clone());
                    set_path(doc, path, target).map_err(CoreError::generic)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn json_objkeys(&self, key: &Bytes, path: &str) -> CoreResult<Option<Vec<String>>> {
        match self.with_read(key, as_json) {
            Some(r) => r.map(|doc| match get_path(&doc, path).ok().flatten() {
                Some(JsonValue::Object(map)) => Some(map.keys().cloned().collect()),
                _ => None,
            }),
            None => Ok(None),
        }
    }

    pub fn json_arrappend(&self, key: &Bytes, path: &str, raws: &[String]) -> CoreResult<usize> {
        let values: Vec<JsonValue> = raws
            .iter()
            .map(|r| JsonValue::parse(r).map_err(CoreError::generic))
            .collect::<CoreResult<_>>()?;
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Json(doc) => {
                let mut array = match get_path(doc, path).map_err(CoreError::generic)? {
                    Some(JsonValue::Array(a)) => a.clone(),
                    Some(_) => return Err(CoreError::generic("-ERR path does not refer to an array")),
                    None => return Err(CoreError::NoSuchKey),
                };
                array.extend(values.clone());
                let len = array.len();
                set_path(doc, path, JsonValue::Array(array)).map_err(CoreError::generic)?;
                Ok(len)
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Err(CoreError::NoSuchKey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_serializes_roundtrip_shape() {
        let v = JsonValue::parse(r#"{"a":1,"b":[1,2,3],"c":{"d":"e"}}"#).unwrap();
        match &v {
            JsonValue::Object(map) => assert_eq!(map.len(), 3),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn get_set_del_path() {
        let mut v = JsonValue::parse(r#"{"a":{"b":[1,2,3]}}"#).unwrap();
        assert_eq!(
            get_path(&v, ".a.b[1]").unwrap(),
            Some(&JsonValue::Number(2.0))
        );
        set_path(&mut v, ".a.b[1]", JsonValue::Number(99.0)).unwrap();
        assert_eq!(
            get_path(&v, ".a.b[1]").unwrap(),
            Some(&JsonValue::Number(99.0))
        );
        assert!(del_path(&mut v, ".a.b[1]").unwrap());
        assert_eq!(get_path(&v, ".a.b[1]").unwrap(), Some(&JsonValue::Number(3.0)));
    }

    #[test]
    fn deep_merge_merges_objects_but_replaces_arrays() {
        let mut base = JsonValue::parse(r#"{"a":1,"b":{"x":1,"y":2},"c":[1,2]}"#).unwrap();
        let patch = JsonValue::parse(r#"{"b":{"y":3},"c":[9]}"#).unwrap();
        deep_merge(&mut base, patch);
        assert_eq!(get_path(&base, ".b.x").unwrap(), Some(&JsonValue::Number(1.0)));
        assert_eq!(get_path(&base, ".b.y").unwrap(), Some(&JsonValue::Number(3.0)));
        assert_eq!(get_path(&base, ".c").unwrap(), Some(&JsonValue::Array(vec![JsonValue::Number(9.0)])));
    }

    #[test]
    fn null_patch_value_deletes_key() {
        let mut base = JsonValue::parse(r#"{"a":1,"b":2}"#).unwrap();
        let patch = JsonValue::parse(r#"{"a":null}"#).unwrap();
        deep_merge(&mut base, patch);
        assert_eq!(get_path(&base, ".a").unwrap(), None);
    }

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn json_set_then_get_roundtrips() {
        let e = engine();
        let k = Bytes::from("doc");
        e.json_set(&k, ".", r#"{"a":1}"#, false, false).unwrap();
        assert_eq!(e.json_get(&k, ".a").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn json_set_nx_refuses_when_path_exists() {
        let e = engine();
        let k = Bytes::from("doc");
        e.json_set(&k, ".", r#"{"a":1}"#, false, false).unwrap();
        assert!(!e.json_set(&k, ".a", "2", true, false).unwrap());
        assert_eq!(e.json_get(&k, ".a").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn json_numincrby_increments_existing_number() {
        let e = engine();
        let k = Bytes::from("doc");
        e.json_set(&k, ".", r#"{"a":1}"#, false, false).unwrap();
        let result = e.json_numincrby(&k, ".a", 4.0).unwrap();
        assert_eq!(result, 5.0);
    }

    #[test]
    fn json_merge_deep_merges_into_existing_document() {
        let e = engine();
        let k = Bytes::from("doc");
        e.json_set(&k, ".", r#"{"a":{"x":1}}"#, false, false).unwrap();
        e.json_merge(&k, ".", r#"{"a":{"y":2}}"#).unwrap();
        assert_eq!(e.json_get(&k, ".a.x").unwrap(), Some("1".to_string()));
        assert_eq!(e.json_get(&k, ".a.y").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn json_arrappend_extends_array_at_path() {
        let e = engine();
        let k = Bytes::from("doc");
        e.json_set(&k, ".", r#"{"a":[1,2]}"#, false, false).unwrap();
        let len = e.json_arrappend(&k, ".a", &["3".to_string()]).unwrap();
        assert_eq!(len, 3);
    }
}
