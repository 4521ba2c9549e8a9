/// Images and image views tracked by the resource arena.
///
/// An `Image` records the layout of its last recorded transition. Only a
/// [`CommandBuffer`](crate::sync::CommandBuffer) (or the transfer queue, which
/// records its own barriers) updates it, so the tracked layout always matches
/// what the GPU will see once the recorded work executes.

use rustc_hash::FxHashMap;
use slotmap::new_key_type;
use crate::bindless::BindlessHandle;
use crate::device::{
    Format, ImageAspect, ImageHandle, ImageInfo, ImageLayout, ImageType, ImageViewHandle, ImageViewType,
};

// ===== SLOT MAP KEYS =====

new_key_type! {
    /// Generation-checked id of an image in a `ResourceArena`.
    ///
    /// Ids of destroyed images never resolve again, even if the slot is reused.
    pub struct ImageId;

    /// Generation-checked id of an image view in a `ResourceArena`.
    pub struct ImageViewId;
}

// ===== VIEW RANGE =====

/// Mip and layer range selected by a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewRange {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl ViewRange {
    /// `mip_count` mips starting at `base_mip`, single layer `base_layer`
    pub fn mips(mip_count: u32, base_mip: u32, base_layer: u32) -> Self {
        Self {
            base_mip,
            mip_count,
            base_layer,
            layer_count: 1,
        }
    }

    /// Every mip and layer of the image
    pub fn full(info: &ImageInfo) -> Self {
        Self {
            base_mip: 0,
            mip_count: info.mip_levels,
            base_layer: 0,
            layer_count: info.array_layers,
        }
    }

    /// True if the range lies inside the image
    pub fn fits(&self, info: &ImageInfo) -> bool {
        self.mip_count > 0
            && self.layer_count > 0
            && self.base_mip.checked_add(self.mip_count).is_some_and(|end| end <= info.mip_levels)
            && self.base_layer.checked_add(self.layer_count).is_some_and(|end| end <= info.array_layers)
    }

    /// View type a range of `info` is viewed as
    pub fn view_type(&self, info: &ImageInfo) -> ImageViewType {
        match info.image_type {
            ImageType::Tex1D => ImageViewType::Tex1D,
            ImageType::Tex3D => ImageViewType::Tex3D,
            ImageType::Cube if self.layer_count == 6 => ImageViewType::Cube,
            _ if self.layer_count > 1 => ImageViewType::Tex2DArray,
            _ => ImageViewType::Tex2D,
        }
    }
}

// ===== IMAGE =====

/// A GPU image and its tracked layout
#[derive(Debug)]
pub struct Image {
    pub(crate) handle: ImageHandle,
    pub(crate) info: ImageInfo,
    pub(crate) layout: ImageLayout,
    /// False for images owned elsewhere (swapchain images)
    pub(crate) owned: bool,
    /// Views created so far, one per distinct range
    pub(crate) views: FxHashMap<ViewRange, ImageViewId>,
    pub(crate) name: String,
}

impl Image {
    pub fn handle(&self) -> ImageHandle {
        self.handle
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn format(&self) -> Format {
        self.info.format
    }

    /// Layout after the last recorded transition
    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    pub(crate) fn set_layout(&mut self, layout: ImageLayout) {
        self.layout = layout;
    }

    pub fn aspect(&self) -> ImageAspect {
        self.info.format.aspect()
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// ===== IMAGE VIEW =====

/// A view of a range of an image
///
/// Holds the id of its image rather than a reference: once the image is
/// destroyed the view is destroyed with it and its id stops resolving.
#[derive(Debug)]
pub struct ImageView {
    pub(crate) image: ImageId,
    pub(crate) handle: ImageViewHandle,
    pub(crate) range: ViewRange,
    pub(crate) view_type: ImageViewType,
    pub(crate) format: Format,
    pub(crate) bindless: Option<BindlessHandle>,
}

impl ImageView {
    /// The image this view looks at
    pub fn image(&self) -> ImageId {
        self.image
    }

    pub fn handle(&self) -> ImageViewHandle {
        self.handle
    }

    pub fn range(&self) -> ViewRange {
        self.range
    }

    pub fn view_type(&self) -> ImageViewType {
        self.view_type
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Bindless slot, if the view was registered at construction
    pub fn bindless(&self) -> Option<BindlessHandle> {
        self.bindless
    }
}
