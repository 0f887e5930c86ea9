//! Cross-module tests for the spawner: resolution pipelines, the
//! compile/acknowledgment state machine, and the admission gate, driven
//! through mock host services.

pub mod support;

mod compile_flow;
