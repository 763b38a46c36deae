//! Resource reconciliation runtime
//!
//! This library provides:
//! - Region and zone scoped identifiers
//! - A polling waiter with deadline and cancellation
//! - The attribute model, schemas, and the codec between attributes and DTOs
//! - The plan engine and the resource registry driving lifecycle hooks
//! - Error classification and host diagnostics

pub mod codec;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod locality;
pub mod lookup;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod value;
pub mod version;
pub mod waiter;

pub use codec::Updated;
pub use config::{EngineConfig, Operation, Timeouts};
pub use data::ResourceData;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use diff::{AttributeChange, Plan, PlanAction, ResourceDiff};
pub use error::{ErrorClass, ProviderError, Result, VendorError};
pub use locality::{Locality, Region, ScopedId, Zone};
pub use registry::{ApplyRequest, ApplyResult, ResourceRegistry};
pub use resource::{DataSource, HookContext, Resource};
pub use schema::{AttrType, Attribute, Schema};
pub use value::{AttrPath, Block, Value};
pub use waiter::{StatusClass, WaitOutcome, Waiter};
