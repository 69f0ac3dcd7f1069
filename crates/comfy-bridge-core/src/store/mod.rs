pub mod workflow_registry;

pub use workflow_registry::{merge_defaults, WorkflowListing, WorkflowRegistry};
