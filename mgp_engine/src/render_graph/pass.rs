/// Pass and task declarations
///
/// A render pass declares the attachments it renders into, the attachments
/// and views it reads, and a closure recording its draws. A compute task
/// declares storage images it writes and views it samples. The graph derives
/// ordering and layout transitions from these declarations alone, so every
/// image a closure touches must be declared.

use crate::descriptor::{DescriptorLayoutCache, DescriptorPoolDynamic};
use crate::bindless::BindlessRegistry;
use crate::device::{ClearValue, LoadOp, StoreOp};
use crate::error::Result;
use crate::pipeline::{PipelineCache, RenderInfo};
use crate::resource::{ImageViewId, ResourceArena};
use crate::sync::CommandBuffer;

// ===== CLOSURE CONTEXT =====

/// Engine services handed to pass closures
pub struct PassResources<'r> {
    pub arena: &'r ResourceArena,
    pub pipelines: &'r mut PipelineCache,
    pub layouts: &'r mut DescriptorLayoutCache,
    pub bindless: &'r BindlessRegistry,
    /// Descriptor pool of the current frame slot, cleared when the slot is reused
    pub descriptors: &'r mut DescriptorPoolDynamic,
}

pub(crate) type RenderFn<'a> =
    Box<dyn FnOnce(&mut CommandBuffer, &RenderInfo, &mut PassResources<'_>) -> Result<()> + 'a>;

pub(crate) type ComputeFn<'a> = Box<dyn FnOnce(&mut CommandBuffer, &mut PassResources<'_>) -> Result<()> + 'a>;

// ===== ATTACHMENTS =====

/// A colour or depth attachment a pass renders into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputAttachment {
    pub view: ImageViewId,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear: ClearValue,
    /// Single-sample view the attachment resolves into
    pub resolve: Option<ImageViewId>,
}

impl OutputAttachment {
    /// Colour attachment cleared to `color`
    pub fn clear_color(view: ImageViewId, color: [f32; 4]) -> Self {
        Self {
            view,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear: ClearValue::Color(color),
            resolve: None,
        }
    }

    /// Depth attachment cleared to `depth`
    pub fn clear_depth(view: ImageViewId, depth: f32) -> Self {
        Self {
            view,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear: ClearValue::DepthStencil { depth, stencil: 0 },
            resolve: None,
        }
    }

    /// Attachment whose previous contents are kept and drawn over
    pub fn load(view: ImageViewId) -> Self {
        Self {
            view,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
            clear: ClearValue::Color([0.0; 4]),
            resolve: None,
        }
    }

    pub fn with_store(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    pub fn with_resolve(mut self, view: ImageViewId) -> Self {
        self.resolve = Some(view);
        self
    }

    /// True if the pass reads the previous contents
    pub fn reads_previous(&self) -> bool {
        self.load_op == LoadOp::Load
    }
}

// ===== RENDER PASS =====

/// Declaration of a graphics pass
pub struct RenderPassDefinition<'a> {
    pub(crate) name: String,
    pub(crate) outputs: Vec<OutputAttachment>,
    pub(crate) inputs: Vec<ImageViewId>,
    pub(crate) sampled: Vec<ImageViewId>,
    pub(crate) build: Option<RenderFn<'a>>,
}

impl<'a> RenderPassDefinition<'a> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outputs: Vec::new(),
            inputs: Vec::new(),
            sampled: Vec::new(),
            build: None,
        }
    }

    /// Add an attachment to render into
    ///
    /// The first output determines the pass extent and sample count.
    pub fn output(mut self, attachment: OutputAttachment) -> Self {
        self.outputs.push(attachment);
        self
    }

    /// Read an attachment produced by an earlier pass
    pub fn input(mut self, view: ImageViewId) -> Self {
        self.inputs.push(view);
        self
    }

    /// Sample a view that is not necessarily produced in this graph
    pub fn sampled(mut self, view: ImageViewId) -> Self {
        self.sampled.push(view);
        self
    }

    /// Closure recording the pass; runs between begin and end rendering
    pub fn build<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut CommandBuffer, &RenderInfo, &mut PassResources<'_>) -> Result<()> + 'a,
    {
        self.build = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outputs(&self) -> &[OutputAttachment] {
        &self.outputs
    }
}

// ===== COMPUTE TASK =====

/// Declaration of a compute task
pub struct ComputeTaskDefinition<'a> {
    pub(crate) name: String,
    pub(crate) storage: Vec<ImageViewId>,
    pub(crate) sampled: Vec<ImageViewId>,
    pub(crate) build: Option<ComputeFn<'a>>,
}

impl<'a> ComputeTaskDefinition<'a> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            storage: Vec::new(),
            sampled: Vec::new(),
            build: None,
        }
    }

    /// Storage image the task writes (transitioned to `General`)
    pub fn storage(mut self, view: ImageViewId) -> Self {
        self.storage.push(view);
        self
    }

    pub fn sampled(mut self, view: ImageViewId) -> Self {
        self.sampled.push(view);
        self
    }

    pub fn build<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut CommandBuffer, &mut PassResources<'_>) -> Result<()> + 'a,
    {
        self.build = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
