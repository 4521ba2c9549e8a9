/// Material-side pipeline state and render-target state
///
/// A graphics pipeline is fully determined by three things: the
/// [`ShaderProgram`](crate::pipeline::ShaderProgram), a [`PipelineDefinition`]
/// (fixed-function state chosen by the material) and a [`RenderInfo`]
/// (formats and sample count of the pass it is drawn in). Dynamic rendering
/// pipelines are specialized to attachment formats, so the same material
/// drawn into two differently formatted targets produces two pipelines.

use crate::device::{
    ColorBlendState, DepthStencilState, Format, PrimitiveTopology, RasterizationState, SampleCount, VertexLayout,
};

/// Fixed-function state of a material
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDefinition {
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    /// Blend state per colour attachment; missing entries use the default
    pub color_blend: Vec<ColorBlendState>,
    pub alpha_to_coverage: bool,
}

impl Default for PipelineDefinition {
    fn default() -> Self {
        Self {
            vertex_layout: VertexLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: DepthStencilState::default(),
            color_blend: Vec::new(),
            alpha_to_coverage: false,
        }
    }
}

impl PipelineDefinition {
    /// Blend states for exactly `count` attachments
    pub fn blend_states(&self, count: usize) -> Vec<ColorBlendState> {
        (0..count)
            .map(|i| self.color_blend.get(i).copied().unwrap_or_default())
            .collect()
    }
}

/// Attachment state of the pass a pipeline is used in
///
/// Built by the render graph from a pass's outputs and handed to its
/// closure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderInfo {
    pub width: u32,
    pub height: u32,
    pub samples: SampleCount,
    pub color_formats: Vec<Format>,
    pub depth_format: Option<Format>,
}

impl RenderInfo {
    /// Stencil format implied by the depth format
    pub fn stencil_format(&self) -> Option<Format> {
        self.depth_format.filter(|f| f.has_stencil())
    }
}
