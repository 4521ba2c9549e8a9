/// Render graph - per-frame DAG of render passes and compute tasks
///
/// Passes are declared during the frame and consumed by `record`, which:
///
/// 1. resolves every declared view to its image,
/// 2. builds dependency edges from the declared reads and writes,
/// 3. sorts the nodes topologically (insertion order breaks ties),
/// 4. optionally culls nodes whose results nobody consumes,
/// 5. emits layout transitions, rendering scopes and the pass closures.
///
/// Reads bind to the latest writer declared before the reader. A read with
/// no earlier writer binds to the first later writer, which moves the writer
/// ahead of it. Writers of one image keep their insertion order, and a
/// writer follows every reader of the previous version.
///
/// The graph holds no state across frames: `record` empties it, also when
/// recording fails.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::bindless::BindlessRegistry;
use crate::descriptor::{DescriptorLayoutCache, DescriptorPoolDynamic};
use crate::device::{ImageLayout, RenderingAttachment, RenderingInfo};
use crate::error::{Error, Result};
use crate::pipeline::{PipelineCache, RenderInfo};
use crate::render_graph::{ComputeTaskDefinition, OutputAttachment, PassResources, RenderPassDefinition};
use crate::resource::{ImageId, ImageViewId, ResourceArena};
use crate::sync::CommandBuffer;
use crate::{engine_debug, engine_trace};

/// Everything `record` needs from the engine
pub struct GraphContext<'r> {
    pub arena: &'r mut ResourceArena,
    pub pipelines: &'r mut PipelineCache,
    pub layouts: &'r mut DescriptorLayoutCache,
    pub bindless: &'r BindlessRegistry,
    pub descriptors: &'r mut DescriptorPoolDynamic,
}

/// What a `record` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSummary {
    /// Names of the executed nodes, in execution order
    pub executed: Vec<String>,
    /// Names of the culled nodes, in insertion order
    pub culled: Vec<String>,
}

enum Node<'a> {
    Render(RenderPassDefinition<'a>),
    Compute(ComputeTaskDefinition<'a>),
}

impl Node<'_> {
    fn name(&self) -> &str {
        match self {
            Node::Render(pass) => &pass.name,
            Node::Compute(task) => &task.name,
        }
    }
}

/// Images a node reads and writes, deduplicated
#[derive(Default)]
struct Access {
    reads: Vec<ImageId>,
    writes: Vec<ImageId>,
}

fn push_unique(list: &mut Vec<ImageId>, image: ImageId) {
    if !list.contains(&image) {
        list.push(image);
    }
}

fn image_of(arena: &ResourceArena, view: ImageViewId) -> Result<ImageId> {
    Ok(arena.view(view)?.image())
}

fn access_of(node: &Node<'_>, arena: &ResourceArena) -> Result<Access> {
    let mut access = Access::default();
    match node {
        Node::Render(pass) => {
            for output in &pass.outputs {
                let image = image_of(arena, output.view)?;
                if output.reads_previous() {
                    push_unique(&mut access.reads, image);
                }
                push_unique(&mut access.writes, image);
                if let Some(resolve) = output.resolve {
                    push_unique(&mut access.writes, image_of(arena, resolve)?);
                }
            }
            for view in pass.inputs.iter().chain(&pass.sampled) {
                push_unique(&mut access.reads, image_of(arena, *view)?);
            }
        }
        Node::Compute(task) => {
            for view in &task.storage {
                push_unique(&mut access.writes, image_of(arena, *view)?);
            }
            for view in &task.sampled {
                push_unique(&mut access.reads, image_of(arena, *view)?);
            }
        }
    }
    Ok(access)
}

// ===== DEPENDENCY GRAPH =====

struct Dag {
    successors: Vec<Vec<usize>>,
    /// Writer -> reader edges only (who consumes what a node produced)
    consumers: Vec<Vec<usize>>,
}

impl Dag {
    fn new(count: usize) -> Self {
        Self {
            successors: vec![Vec::new(); count],
            consumers: vec![Vec::new(); count],
        }
    }

    fn edge(&mut self, from: usize, to: usize, data: bool) {
        if from == to {
            return;
        }
        if !self.successors[from].contains(&to) {
            self.successors[from].push(to);
        }
        if data && !self.consumers[from].contains(&to) {
            self.consumers[from].push(to);
        }
    }
}

#[derive(Default)]
struct ImageTrack {
    last_writer: Option<usize>,
    /// Readers of the current version
    readers: Vec<usize>,
    /// Readers declared before any writer
    early_readers: Vec<usize>,
}

fn build_dag(accesses: &[Access]) -> Dag {
    let mut dag = Dag::new(accesses.len());
    let mut tracks: FxHashMap<ImageId, ImageTrack> = FxHashMap::default();

    for (node, access) in accesses.iter().enumerate() {
        for image in &access.reads {
            let track = tracks.entry(*image).or_default();
            match track.last_writer {
                Some(writer) => {
                    dag.edge(writer, node, true);
                    track.readers.push(node);
                }
                None => track.early_readers.push(node),
            }
        }
        for image in &access.writes {
            let track = tracks.entry(*image).or_default();
            match track.last_writer {
                Some(writer) => {
                    dag.edge(writer, node, false);
                    for reader in std::mem::take(&mut track.readers) {
                        dag.edge(reader, node, false);
                    }
                }
                None => {
                    // Early readers bind to the first version and hold off the next writer
                    let early = std::mem::take(&mut track.early_readers);
                    for &reader in &early {
                        dag.edge(node, reader, true);
                    }
                    track.readers = early;
                }
            }
            track.last_writer = Some(node);
        }
    }
    dag
}

/// Kahn's algorithm, smallest insertion index first among ready nodes
fn topological_order(dag: &Dag, nodes: &[Node<'_>]) -> Result<Vec<usize>> {
    let count = dag.successors.len();
    let mut indegree = vec![0usize; count];
    for successors in &dag.successors {
        for &to in successors {
            indegree[to] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> =
        (0..count).filter(|&n| indegree[n] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &to in &dag.successors[node] {
            indegree[to] -= 1;
            if indegree[to] == 0 {
                ready.push(Reverse(to));
            }
        }
    }

    if order.len() != count {
        let stuck: Vec<&str> = (0..count)
            .filter(|&n| indegree[n] > 0)
            .map(|n| nodes[n].name())
            .collect();
        return Err(Error::InvalidRenderGraph(format!("dependency cycle among {:?}", stuck)));
    }
    Ok(order)
}

/// Nodes that produce something consumed or exported, walking back from the end
fn live_nodes(order: &[usize], dag: &Dag, accesses: &[Access], exported: &FxHashSet<ImageId>) -> Vec<bool> {
    let mut live = vec![false; accesses.len()];
    for &node in order.iter().rev() {
        let writes = &accesses[node].writes;
        live[node] = writes.is_empty()
            || writes.iter().any(|image| exported.contains(image))
            || dag.consumers[node].iter().any(|&consumer| live[consumer]);
    }
    live
}

/// Structural checks that need no dependency information
fn check_nodes(nodes: &[Node<'_>], accesses: &[Access], arena: &ResourceArena, imported: &FxHashSet<ImageId>) -> Result<()> {
    let written: FxHashSet<ImageId> = accesses.iter().flat_map(|a| a.writes.iter().copied()).collect();

    for node in nodes {
        let Node::Render(pass) = node else {
            continue;
        };
        let Some(first) = pass.outputs.first() else {
            return Err(Error::InvalidRenderGraph(format!("pass '{}' has no output attachment", pass.name)));
        };
        let extent = attachment_extent(arena, first.view)?;
        for output in &pass.outputs[1..] {
            if attachment_extent(arena, output.view)? != extent {
                return Err(Error::InvalidRenderGraph(format!(
                    "pass '{}' renders into attachments of different sizes",
                    pass.name
                )));
            }
        }

        let mut rendered_to: Vec<ImageId> = Vec::new();
        for output in &pass.outputs {
            rendered_to.push(image_of(arena, output.view)?);
        }
        for view in pass.inputs.iter().chain(&pass.sampled) {
            let image = image_of(arena, *view)?;
            if rendered_to.contains(&image) {
                return Err(Error::InvalidRenderGraph(format!(
                    "pass '{}' samples an image it renders into",
                    pass.name
                )));
            }
        }

        for view in &pass.inputs {
            let image_id = image_of(arena, *view)?;
            let image = arena.image(image_id)?;
            if !written.contains(&image_id)
                && !imported.contains(&image_id)
                && image.layout() == ImageLayout::Undefined
            {
                return Err(Error::InvalidRenderGraph(format!(
                    "pass '{}' reads '{}', which nothing has written",
                    pass.name,
                    image.name()
                )));
            }
        }
    }
    Ok(())
}

/// Width, height and layer count of the view's mip
fn attachment_extent(arena: &ResourceArena, view_id: ImageViewId) -> Result<(u32, u32, u32)> {
    let view = arena.view(view_id)?;
    let image = arena.image(view.image())?;
    let (width, height, _) = image.info().mip_extent(view.range().base_mip);
    Ok((width, height, view.range().layer_count))
}

fn attachment_layout(arena: &ResourceArena, view: ImageViewId) -> Result<ImageLayout> {
    Ok(if arena.view(view)?.format().is_depth() {
        ImageLayout::DepthStencilAttachment
    } else {
        ImageLayout::ColorAttachment
    })
}

fn read_layout(arena: &ResourceArena, view: ImageViewId) -> Result<ImageLayout> {
    Ok(if arena.view(view)?.format().is_depth() {
        ImageLayout::DepthStencilReadOnly
    } else {
        ImageLayout::ShaderReadOnly
    })
}

fn transition_view(cmd: &mut CommandBuffer, arena: &mut ResourceArena, view: ImageViewId, layout: ImageLayout) -> Result<()> {
    let image_id = image_of(arena, view)?;
    cmd.transition_image(arena.image_mut(image_id)?, layout)
}

// ===== GRAPH =====

pub struct RenderGraph<'a> {
    nodes: Vec<Node<'a>>,
    exports: Vec<ImageViewId>,
    imports: Vec<ImageViewId>,
    culling: bool,
}

impl<'a> Default for RenderGraph<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RenderGraph<'a> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            exports: Vec::new(),
            imports: Vec::new(),
            culling: false,
        }
    }

    pub fn add_pass(&mut self, pass: RenderPassDefinition<'a>) {
        self.nodes.push(Node::Render(pass));
    }

    pub fn add_task(&mut self, task: ComputeTaskDefinition<'a>) {
        self.nodes.push(Node::Compute(task));
    }

    /// Keep the passes writing this view's image when culling
    pub fn export(&mut self, view: ImageViewId) {
        self.exports.push(view);
    }

    /// Declare that this view's image holds valid contents from outside the graph
    pub fn import(&mut self, view: ImageViewId) {
        self.imports.push(view);
    }

    /// Drop nodes whose outputs are neither consumed nor exported (off by default)
    pub fn set_culling(&mut self, enabled: bool) {
        self.culling = enabled;
    }

    /// Number of queued passes and tasks
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn image_set(arena: &ResourceArena, views: &[ImageViewId]) -> Result<FxHashSet<ImageId>> {
        views.iter().map(|view| image_of(arena, *view)).collect()
    }

    /// Check the queued graph without recording it
    ///
    /// # Errors
    ///
    /// `Error::InvalidRenderGraph` for a dependency cycle, a pass without
    /// outputs or with mismatched output sizes, a pass sampling its own
    /// attachment, or an input that nothing has written.
    /// `Error::InvalidResource` for stale view ids.
    pub fn validate(&self, arena: &ResourceArena) -> Result<()> {
        let accesses = self
            .nodes
            .iter()
            .map(|node| access_of(node, arena))
            .collect::<Result<Vec<_>>>()?;
        let imported = Self::image_set(arena, &self.imports)?;
        check_nodes(&self.nodes, &accesses, arena, &imported)?;
        topological_order(&build_dag(&accesses), &self.nodes)?;
        Ok(())
    }

    /// Record every queued node into `cmd` and empty the graph
    pub fn record(&mut self, cmd: &mut CommandBuffer, ctx: &mut GraphContext<'_>) -> Result<RecordSummary> {
        let nodes = std::mem::take(&mut self.nodes);
        let exports = std::mem::take(&mut self.exports);
        let imports = std::mem::take(&mut self.imports);

        let accesses = nodes
            .iter()
            .map(|node| access_of(node, ctx.arena))
            .collect::<Result<Vec<_>>>()?;
        let imported = Self::image_set(ctx.arena, &imports)?;
        check_nodes(&nodes, &accesses, ctx.arena, &imported)?;

        let dag = build_dag(&accesses);
        let order = topological_order(&dag, &nodes)?;
        let live = if self.culling {
            let exported = Self::image_set(ctx.arena, &exports)?;
            live_nodes(&order, &dag, &accesses, &exported)
        } else {
            vec![true; nodes.len()]
        };

        let mut summary = RecordSummary::default();
        for (index, node) in nodes.iter().enumerate() {
            if !live[index] {
                engine_trace!("mgp::RenderGraph", "Culled '{}'", node.name());
                summary.culled.push(node.name().to_string());
            }
        }

        let mut slots: Vec<Option<Node<'a>>> = nodes.into_iter().map(Some).collect();
        for index in order {
            if !live[index] {
                continue;
            }
            let Some(node) = slots[index].take() else {
                continue;
            };
            summary.executed.push(node.name().to_string());
            match node {
                Node::Render(pass) => record_pass(pass, cmd, ctx)?,
                Node::Compute(task) => record_task(task, cmd, ctx)?,
            }
        }

        engine_debug!(
            "mgp::RenderGraph",
            "Recorded {} nodes ({} culled)",
            summary.executed.len(),
            summary.culled.len()
        );
        Ok(summary)
    }
}

fn rendering_attachment(arena: &ResourceArena, output: &OutputAttachment, layout: ImageLayout) -> Result<RenderingAttachment> {
    let resolve_view = match output.resolve {
        Some(view) => Some(arena.view(view)?.handle()),
        None => None,
    };
    Ok(RenderingAttachment {
        view: arena.view(output.view)?.handle(),
        layout,
        load_op: output.load_op,
        store_op: output.store_op,
        clear: output.clear,
        resolve_view,
        resolve_layout: ImageLayout::ColorAttachment,
    })
}

fn record_pass(pass: RenderPassDefinition<'_>, cmd: &mut CommandBuffer, ctx: &mut GraphContext<'_>) -> Result<()> {
    for output in &pass.outputs {
        let layout = attachment_layout(ctx.arena, output.view)?;
        transition_view(cmd, ctx.arena, output.view, layout)?;
        if let Some(resolve) = output.resolve {
            transition_view(cmd, ctx.arena, resolve, ImageLayout::ColorAttachment)?;
        }
    }
    for view in pass.inputs.iter().chain(&pass.sampled) {
        let layout = read_layout(ctx.arena, *view)?;
        transition_view(cmd, ctx.arena, *view, layout)?;
    }

    let arena: &ResourceArena = ctx.arena;
    let first = pass
        .outputs
        .first()
        .ok_or_else(|| Error::InvalidRenderGraph(format!("pass '{}' has no output attachment", pass.name)))?;
    let (width, height, layer_count) = attachment_extent(arena, first.view)?;
    let samples = arena.view_image(first.view)?.info().samples;

    let mut color_attachments = Vec::new();
    let mut color_formats = Vec::new();
    let mut depth_attachment = None;
    let mut depth_format = None;
    for output in &pass.outputs {
        let format = arena.view(output.view)?.format();
        if format.is_depth() {
            depth_attachment = Some(rendering_attachment(arena, output, ImageLayout::DepthStencilAttachment)?);
            depth_format = Some(format);
        } else {
            color_attachments.push(rendering_attachment(arena, output, ImageLayout::ColorAttachment)?);
            color_formats.push(format);
        }
    }

    let rendering = RenderingInfo {
        width,
        height,
        layer_count,
        color_attachments,
        depth_attachment,
    };
    let render_info = RenderInfo {
        width,
        height,
        samples,
        color_formats,
        depth_format,
    };

    cmd.begin_rendering(&rendering)?;
    cmd.set_viewport_and_scissor(width, height)?;
    let result = match pass.build {
        Some(build) => {
            let mut resources = PassResources {
                arena,
                pipelines: &mut *ctx.pipelines,
                layouts: &mut *ctx.layouts,
                bindless: ctx.bindless,
                descriptors: &mut *ctx.descriptors,
            };
            build(cmd, &render_info, &mut resources)
        }
        None => Ok(()),
    };
    cmd.end_rendering()?;
    result
}

fn record_task(task: ComputeTaskDefinition<'_>, cmd: &mut CommandBuffer, ctx: &mut GraphContext<'_>) -> Result<()> {
    for view in &task.storage {
        transition_view(cmd, ctx.arena, *view, ImageLayout::General)?;
    }
    for view in &task.sampled {
        let layout = read_layout(ctx.arena, *view)?;
        transition_view(cmd, ctx.arena, *view, layout)?;
    }
    match task.build {
        Some(build) => {
            let mut resources = PassResources {
                arena: ctx.arena,
                pipelines: &mut *ctx.pipelines,
                layouts: &mut *ctx.layouts,
                bindless: ctx.bindless,
                descriptors: &mut *ctx.descriptors,
            };
            build(cmd, &mut resources)
        }
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "render_graph_tests.rs"]
mod tests;
