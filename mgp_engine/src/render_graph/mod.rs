//! Render graph module
//!
//! A render graph is a directed acyclic graph (DAG) describing how a frame
//! is rendered: which passes execute, which images they read and write, and
//! in what order. It is rebuilt every frame and emptied when recorded.

mod pass;
mod render_graph;

pub use pass::{ComputeTaskDefinition, OutputAttachment, PassResources, RenderPassDefinition};
pub use render_graph::{GraphContext, RecordSummary, RenderGraph};
