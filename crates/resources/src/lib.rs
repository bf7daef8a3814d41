//! ksq resources: the objects the list pipeline runs over, the scheme that
//! decides typed vs unstructured representation, and the per-kind override
//! registry.

#![forbid(unsafe_code)]

pub mod capability;
pub mod object;
pub mod overrides;
pub mod registry;
pub mod scheme;
pub mod source;

pub use capability::{ConditionTimes, PhaseStatus, ReplicaCounts, ReplicaStatus, WorkloadState};
pub use object::ResourceObject;
pub use registry::ListRegistry;
pub use scheme::{ResolvedResource, Scheme, TypedKind};
pub use source::{CacheError, CrdInfo, CrdLookup, ObjectCache};
