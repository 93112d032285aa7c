//! # Collections
//!
//! A collection resource lists its members as link stubs; [`Collection`]
//! wraps one and resolves members lazily, one at a time, in the order the
//! service returned them. Resolution is sequential by design — the
//! ordering guarantee depends on it.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::client::Client;
use crate::error::Error;
use crate::resource::ResourceRoot;
use crate::transport::ODATA_ID;

/// A typed handle constructible from a fetched root.
///
/// The collection element type; also implemented by the typed service
/// wrappers so they can be fetched directly.
#[async_trait]
pub trait ResourceKind: Sized + Send + Sync {
    fn from_root(root: ResourceRoot) -> Self;

    fn root(&self) -> &ResourceRoot;

    /// Fetches and wraps in one step.
    async fn fetch(client: &Client, identifier: &str) -> Result<Self, Error> {
        Ok(Self::from_root(ResourceRoot::fetch(client, identifier).await?))
    }
}

#[async_trait]
impl ResourceKind for ResourceRoot {
    fn from_root(root: ResourceRoot) -> Self {
        root
    }

    fn root(&self) -> &ResourceRoot {
        self
    }
}

/// An ordered link reference to a collection member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub identifier: String,
}

/// What to do when resolving a single member faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Skip members the service answers with an error envelope. Default.
    #[default]
    Skip,
    /// Propagate the first per-member fault.
    Strict,
}

/// Lazy, restartable view over a membership list.
pub struct Collection<T: ResourceKind> {
    root: ResourceRoot,
    stubs: Vec<MemberRef>,
    _element: PhantomData<fn() -> T>,
}

impl<T: ResourceKind> Collection<T> {
    /// Wraps a fetched collection resource, reading its member stubs.
    ///
    /// A missing `Members` array reads as an empty collection; the
    /// normalization layer guarantees well-formed collection payloads
    /// upstream.
    pub fn from_root(root: ResourceRoot) -> Self {
        let stubs = Self::read_stubs(root.value());
        Self {
            root,
            stubs,
            _element: PhantomData,
        }
    }

    /// Fetches the collection resource at `identifier`.
    pub async fn fetch(client: &Client, identifier: &str) -> Result<Self, Error> {
        Ok(Self::from_root(ResourceRoot::fetch(client, identifier).await?))
    }

    fn read_stubs(value: &Value) -> Vec<MemberRef> {
        value
            .get("Members")
            .and_then(Value::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|m| m.get(ODATA_ID).and_then(Value::as_str))
                    .map(|id| MemberRef {
                        identifier: id.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn root(&self) -> &ResourceRoot {
        &self.root
    }

    /// The member stubs, in protocol-returned order.
    pub fn members(&self) -> &[MemberRef] {
        &self.stubs
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// Starts a lazy member walk from the first stub with the default
    /// fault policy. Every call starts over from the beginning.
    pub fn list(&self) -> Members<'_, T> {
        self.list_with(FaultPolicy::default())
    }

    /// As [`Self::list`], with an explicit fault policy.
    pub fn list_with(&self, policy: FaultPolicy) -> Members<'_, T> {
        Members {
            collection: self,
            next: 0,
            policy,
        }
    }

    /// Resolves only the first member.
    pub async fn first(&self) -> Result<T, Error> {
        let stub = self
            .stubs
            .first()
            .ok_or_else(|| Error::NotFound("collection is empty".to_string()))?;
        T::fetch(self.root.client(), &stub.identifier).await
    }

    /// Resolves the member whose locator is this collection's own locator
    /// with `key` appended.
    pub async fn index(&self, key: &str) -> Result<T, Error> {
        let identifier = format!("{}/{key}", self.root.identifier()?);
        T::fetch(self.root.client(), &identifier).await
    }

    /// Re-fetches the owning resource and replaces the stubs wholesale.
    ///
    /// Previously materialized members are not touched.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        self.root.refresh().await?;
        self.stubs = Self::read_stubs(self.root.value());
        Ok(())
    }
}

/// One walk over a collection's members. Resolves sequentially; obtain a
/// fresh walk from [`Collection::list`] to start over.
pub struct Members<'c, T: ResourceKind> {
    collection: &'c Collection<T>,
    next: usize,
    policy: FaultPolicy,
}

impl<T: ResourceKind> Members<'_, T> {
    /// Resolves the next member, or `None` past the end.
    pub async fn try_next(&mut self) -> Result<Option<T>, Error> {
        while let Some(stub) = self.collection.stubs.get(self.next) {
            self.next += 1;
            match T::fetch(self.collection.root.client(), &stub.identifier).await {
                Ok(member) => return Ok(Some(member)),
                Err(Error::RemoteFault(envelope)) if self.policy == FaultPolicy::Skip => {
                    warn!(member = %stub.identifier, %envelope, "skipping faulted member");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Drains the remaining members into a vector.
    pub async fn collect(mut self) -> Result<Vec<T>, Error> {
        let mut members = Vec::new();
        while let Some(member) = self.try_next().await? {
            members.push(member);
        }
        Ok(members)
    }
}
