//! Ready-made key maps and value codecs.
//!
//! Key maps: [`prefix`], [`suffix`], [`path_tuple`].
//! Value codecs: [`json`], [`json_text`], [`bincode`], [`utf8_text`].
//! Path templates provide further key maps, see
//! [`PathTemplate`](crate::paths::PathTemplate).

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::hooks::{KeyMap, ValueMap};

/// Prepend `prefix` to incoming keys and strip it from outgoing ids.
///
/// Ids that do not start with `prefix` fail with `KeyNotValid`.
pub fn prefix(prefix: impl Into<String>) -> KeyMap<String, String> {
    let prefix: String = prefix.into();
    let strip = prefix.clone();
    KeyMap::new(
        move |k: &String| Ok(format!("{prefix}{k}")),
        move |id: &String| {
            id.strip_prefix(strip.as_str())
                .map(str::to_string)
                .ok_or_else(|| StoreError::key_not_valid(id, format!("missing prefix {strip:?}")))
        },
    )
}

/// Append `suffix` (typically a file extension) to incoming keys and strip it
/// from outgoing ids.
pub fn suffix(suffix: impl Into<String>) -> KeyMap<String, String> {
    let suffix: String = suffix.into();
    let strip = suffix.clone();
    KeyMap::new(
        move |k: &String| Ok(format!("{k}{suffix}")),
        move |id: &String| {
            id.strip_suffix(strip.as_str())
                .map(str::to_string)
                .ok_or_else(|| StoreError::key_not_valid(id, format!("missing suffix {strip:?}")))
        },
    )
}

/// Convert between path tuples and `sep`-joined path strings.
///
/// Well-formed tuples are non-empty and their components are non-empty and
/// free of `sep`; on those the map is a bijection.
pub fn path_tuple(sep: impl Into<String>) -> KeyMap<Vec<String>, String> {
    let sep: String = sep.into();
    let split_sep = sep.clone();
    KeyMap::new(
        move |parts: &Vec<String>| {
            if parts.is_empty() {
                return Err(StoreError::key_not_valid(parts, "empty path"));
            }
            for part in parts {
                if part.is_empty() || part.contains(sep.as_str()) {
                    return Err(StoreError::key_not_valid(
                        parts,
                        format!("component {part:?} is empty or contains {sep:?}"),
                    ));
                }
            }
            Ok(parts.join(&sep))
        },
        move |path: &String| {
            let parts: Vec<String> = path.split(split_sep.as_str()).map(str::to_string).collect();
            if parts.iter().any(String::is_empty) {
                return Err(StoreError::key_not_valid(path, "empty path component"));
            }
            Ok(parts)
        },
    )
}

/// JSON bytes.
pub fn json<T>() -> ValueMap<T, Vec<u8>>
where
    T: Serialize + DeserializeOwned + 'static,
{
    ValueMap::new(
        |obj: T| serde_json::to_vec(&obj).map_err(|e| StoreError::Codec(format!("json encode: {e}"))),
        |data: Vec<u8>| {
            serde_json::from_slice(&data).map_err(|e| StoreError::Codec(format!("json decode: {e}")))
        },
    )
}

/// JSON text.
pub fn json_text<T>() -> ValueMap<T, String>
where
    T: Serialize + DeserializeOwned + 'static,
{
    ValueMap::new(
        |obj: T| {
            serde_json::to_string(&obj).map_err(|e| StoreError::Codec(format!("json encode: {e}")))
        },
        |data: String| {
            serde_json::from_str(&data).map_err(|e| StoreError::Codec(format!("json decode: {e}")))
        },
    )
}

/// Compact binary serde encoding for arbitrary Rust values.
pub fn bincode<T>() -> ValueMap<T, Vec<u8>>
where
    T: Serialize + DeserializeOwned + 'static,
{
    ValueMap::new(
        |obj: T| {
            ::bincode::serialize(&obj).map_err(|e| StoreError::Codec(format!("bincode encode: {e}")))
        },
        |data: Vec<u8>| {
            ::bincode::deserialize(&data)
                .map_err(|e| StoreError::Codec(format!("bincode decode: {e}")))
        },
    )
}

/// UTF-8 text stored as bytes.
pub fn utf8_text() -> ValueMap<String, Vec<u8>> {
    ValueMap::new(
        |text: String| Ok(text.into_bytes()),
        |data: Vec<u8>| {
            String::from_utf8(data).map_err(|e| StoreError::Codec(format!("invalid utf-8: {e}")))
        },
    )
}
