/// Samplers tracked by the resource arena.

use slotmap::new_key_type;
use crate::bindless::BindlessHandle;
use crate::device::{SamplerHandle, SamplerInfo};

new_key_type! {
    /// Generation-checked id of a sampler in a `ResourceArena`.
    pub struct SamplerId;
}

/// An immutable sampler, always registered in the bindless set
#[derive(Debug)]
pub struct Sampler {
    pub(crate) handle: SamplerHandle,
    pub(crate) info: SamplerInfo,
    pub(crate) bindless: BindlessHandle,
}

impl Sampler {
    pub fn handle(&self) -> SamplerHandle {
        self.handle
    }

    pub fn info(&self) -> &SamplerInfo {
        &self.info
    }

    pub fn bindless(&self) -> BindlessHandle {
        self.bindless
    }
}
