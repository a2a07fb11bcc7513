//! Serde helpers for paths that may not be valid UTF-8.
//!
//! A path that is valid UTF-8 is written as the plain string. Any other path
//! is written as a NUL-prefixed string in which `%` and every byte outside a
//! valid UTF-8 sequence are percent-escaped. NUL never occurs in a real path,
//! so the two forms cannot be confused. Outside unix, non-UTF-8 paths are
//! written lossily.
//!
//! Use with `#[serde(with = "path_serde")]` or one of the submodules.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const ESCAPED: char = '\0';

/// String form of `path`.
pub fn encode(path: &Path) -> String {
    match path.to_str() {
        Some(s) => s.to_string(),
        None => escape(path),
    }
}

/// Path for a string produced by [`encode`].
pub fn decode(s: &str) -> Result<PathBuf, String> {
    match s.strip_prefix(ESCAPED) {
        Some(escaped) => unescape(escaped),
        None => Ok(PathBuf::from(s)),
    }
}

fn push_escaped(out: &mut String, valid: &str) {
    for c in valid.chars() {
        if c == '%' {
            out.push_str("%25");
        } else {
            out.push(c);
        }
    }
}

#[cfg(unix)]
fn escape(path: &Path) -> String {
    use std::os::unix::ffi::OsStrExt;

    let mut out = String::from(ESCAPED);
    let mut rest = path.as_os_str().as_bytes();
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                push_escaped(&mut out, valid);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                push_escaped(&mut out, &String::from_utf8_lossy(valid));
                let bad = e.error_len().unwrap_or(after.len());
                for byte in &after[..bad] {
                    out.push_str(&format!("%{:02X}", byte));
                }
                rest = &after[bad..];
            }
        }
    }
    out
}

#[cfg(not(unix))]
fn escape(path: &Path) -> String {
    let mut out = String::from(ESCAPED);
    push_escaped(&mut out, &path.to_string_lossy());
    out
}

fn unescape_bytes(escaped: &str) -> Result<Vec<u8>, String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped
                .get(i + 1..i + 3)
                .ok_or_else(|| format!("truncated escape in path {:?}", escaped))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| format!("invalid escape %{} in path {:?}", hex, escaped))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(unix)]
fn unescape(escaped: &str) -> Result<PathBuf, String> {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    Ok(PathBuf::from(OsString::from_vec(unescape_bytes(escaped)?)))
}

#[cfg(not(unix))]
fn unescape(escaped: &str) -> Result<PathBuf, String> {
    let bytes = unescape_bytes(escaped)?;
    Ok(PathBuf::from(String::from_utf8_lossy(&bytes).into_owned()))
}

pub fn serialize<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode(path))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
    let s = String::deserialize(deserializer)?;
    decode(&s).map_err(D::Error::custom)
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        path: &Option<PathBuf>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        path.as_deref().map(encode).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<PathBuf>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| decode(&s).map_err(D::Error::custom))
            .transpose()
    }
}

pub mod set {
    use super::*;

    pub fn serialize<S: Serializer>(
        paths: &BTreeSet<PathBuf>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(paths.iter().map(|p| encode(p)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeSet<PathBuf>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| decode(s).map_err(D::Error::custom))
            .collect()
    }
}

struct MapRef<'a, V>(&'a BTreeMap<PathBuf, V>);

impl<V: Serialize> Serialize for MapRef<'_, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (encode(k), v)))
    }
}

fn decode_keys<V, E: DeError>(raw: BTreeMap<String, V>) -> Result<BTreeMap<PathBuf, V>, E> {
    raw.into_iter()
        .map(|(k, v)| decode(&k).map(|p| (p, v)).map_err(E::custom))
        .collect()
}

/// Maps keyed by path
pub mod map {
    use super::*;

    pub fn serialize<S: Serializer, V: Serialize>(
        map: &BTreeMap<PathBuf, V>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        MapRef(map).serialize(serializer)
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<PathBuf, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        decode_keys(BTreeMap::<String, V>::deserialize(deserializer)?)
    }
}

/// Optional maps keyed by path
pub mod option_map {
    use super::*;

    pub fn serialize<S: Serializer, V: Serialize>(
        map: &Option<BTreeMap<PathBuf, V>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        map.as_ref().map(MapRef).serialize(serializer)
    }

    pub fn deserialize<'de, D, V>(
        deserializer: D,
    ) -> Result<Option<BTreeMap<PathBuf, V>>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        Option::<BTreeMap<String, V>>::deserialize(deserializer)?
            .map(|raw| decode_keys(raw))
            .transpose()
    }
}
