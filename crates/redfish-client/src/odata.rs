//! # Type Annotations
//!
//! Resources declare their type with an annotation such as
//! `#Manager.v1_5_0.Manager`. This module parses those annotations into the
//! canonical comparison keys the dispatch registry is indexed by.

use crate::error::Error;

/// A parsed resource-type annotation.
///
/// The annotation `#Resource.Version.Term` splits into the resource family,
/// an optional version and the term name. Two canonical strings are derived
/// from it: the versioned key `Resource.Version.Term` and the unversioned
/// key `Resource..Term`, which deliberately keeps the empty version slot so
/// both forms stay unambiguous as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
    resource: String,
    version: String,
    term: String,
}

impl TypeKey {
    /// Parses `#Resource[.Version].Term`.
    ///
    /// Fails with [`Error::MalformedTypeAnnotation`] when the leading `#` is
    /// missing or fewer than two `.`-separated segments are present. Extra
    /// middle segments beyond the version are ignored.
    pub fn parse(annotation: &str) -> Result<Self, Error> {
        let Some(body) = annotation.strip_prefix('#') else {
            return Err(Error::MalformedTypeAnnotation(annotation.to_string()));
        };
        let segments: Vec<&str> = body.split('.').collect();
        if segments.len() < 2 || segments[0].is_empty() {
            return Err(Error::MalformedTypeAnnotation(annotation.to_string()));
        }
        let resource = segments[0].to_string();
        let term = segments[segments.len() - 1].to_string();
        let version = if segments.len() > 2 {
            segments[1].to_string()
        } else {
            String::new()
        };
        Ok(Self {
            resource,
            version,
            term,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// `Resource.Version.Term` — equals [`Self::unversioned`] when the
    /// annotation carried no version.
    pub fn versioned(&self) -> String {
        format!("{}.{}.{}", self.resource, self.version, self.term)
    }

    /// `Resource..Term`.
    pub fn unversioned(&self) -> String {
        format!("{}..{}", self.resource, self.term)
    }
}

/// Splits a type-context dispatch key `#Type[.Version].Term[/path]` into the
/// annotation and its relative path, defaulting the path to `/`.
pub fn split_detour(key: &str) -> (&str, &str) {
    match key.find('/') {
        Some(i) => (&key[..i], &key[i..]),
        None => (key, "/"),
    }
}

/// Joins a field name onto a `/`-rooted relative path.
pub fn join_path(base: &str, field: &str) -> String {
    if base == "/" {
        format!("/{field}")
    } else {
        format!("{base}/{field}")
    }
}
