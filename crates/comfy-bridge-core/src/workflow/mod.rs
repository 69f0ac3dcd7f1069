//! Workflow preparation - from a stored or inline definition to an
//! execution-ready prompt.
//!
//! ```text
//! WorkflowEntry / inline JSON ──► detect_format ──► resolve_api_prompt
//!                                                        │
//!                                  (graph) POST /workflow/convert
//!                                                        │
//!                                   apply_inputs ◄───────┘
//!                                        │
//!                                   API prompt ──► POST /prompt
//! ```

pub mod format;
pub mod inputs;

pub use format::{detect_format, resolve_api_prompt};
pub use inputs::apply_inputs;
