//! Cache keys, key patterns for invalidation, and the keys each kind of
//! write invalidates.

use crate::api::types::{ListParams, Resource};

/// Which slice of a collection a key addresses
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyScope {
  /// One page of a (searched, filtered) list
  List(ListParams),
  /// A single record
  Detail(String),
}

/// Address of one cache entry: resource name plus query parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
  pub resource: &'static str,
  pub scope: KeyScope,
}

impl QueryKey {
  pub fn list<R: Resource>(params: ListParams) -> Self {
    Self {
      resource: R::NAME,
      scope: KeyScope::List(params),
    }
  }

  pub fn detail<R: Resource>(id: &str) -> Self {
    Self {
      resource: R::NAME,
      scope: KeyScope::Detail(id.to_string()),
    }
  }

  pub fn description(&self) -> String {
    match &self.scope {
      KeyScope::List(params) => {
        let mut out = format!("{} page {}", self.resource, params.page);
        if !params.search.is_empty() {
          out.push_str(&format!(" search {:?}", params.search));
        }
        for (name, value) in &params.filters {
          out.push_str(&format!(" {}={}", name, value));
        }
        out
      }
      KeyScope::Detail(id) => format!("{} {}", self.resource, id),
    }
  }
}

/// Set of keys selected for invalidation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMatch {
  Exact(QueryKey),
  /// Every key of a resource
  Resource(&'static str),
  /// Every list page of a resource, whatever its params
  Lists(&'static str),
  /// The detail key of one record
  Detail(&'static str, String),
}

impl KeyMatch {
  pub fn matches(&self, key: &QueryKey) -> bool {
    match self {
      KeyMatch::Exact(exact) => exact == key,
      KeyMatch::Resource(resource) => key.resource == *resource,
      KeyMatch::Lists(resource) => {
        key.resource == *resource && matches!(key.scope, KeyScope::List(_))
      }
      KeyMatch::Detail(resource, id) => {
        key.resource == *resource && key.scope == KeyScope::Detail(id.clone())
      }
    }
  }
}

/// A write against the backend, described by what it makes stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
  Create { resource: &'static str },
  Update { resource: &'static str, id: String },
  Delete { resource: &'static str, id: String },
}

impl Mutation {
  pub fn create<R: Resource>() -> Self {
    Mutation::Create { resource: R::NAME }
  }

  pub fn update<R: Resource>(id: &str) -> Self {
    Mutation::Update {
      resource: R::NAME,
      id: id.to_string(),
    }
  }

  pub fn delete<R: Resource>(id: &str) -> Self {
    Mutation::Delete {
      resource: R::NAME,
      id: id.to_string(),
    }
  }

  /// Keys to invalidate once the write succeeds: all list pages of the
  /// resource, plus the record's detail key for updates and deletes.
  pub fn invalidates(&self) -> Vec<KeyMatch> {
    match self {
      Mutation::Create { resource } => vec![KeyMatch::Lists(resource)],
      Mutation::Update { resource, id } | Mutation::Delete { resource, id } => vec![
        KeyMatch::Lists(resource),
        KeyMatch::Detail(resource, id.clone()),
      ],
    }
  }
}
