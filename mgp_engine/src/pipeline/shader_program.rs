/// Shader programs
///
/// A `ShaderProgram` is the contract between shaders and the pipeline cache:
/// its stage modules, the descriptor set layouts the stages declare and
/// the push constant range. How the stage modules were compiled and
/// reflected is the backend's business; the core only consumes
/// [`ShaderStageReflection`] records.

use std::collections::BTreeMap;
use crate::descriptor::DescriptorLayoutCache;
use crate::device::{
    DescriptorBindingFlags, DescriptorSetLayoutBinding, DescriptorSetLayoutHandle, DescriptorSetLayoutInfo,
    DescriptorType, Device, ShaderModuleHandle, ShaderStage, ShaderStageModule, ShaderStages,
};
use crate::error::{Error, Result};
use crate::engine_debug;

// ===== REFLECTION =====

/// One descriptor binding declared by a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array size; 0 for runtime-sized arrays
    pub count: u32,
}

/// Interface of one compiled stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageReflection {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub bindings: Vec<ReflectedBinding>,
    /// Bytes of push constants the stage reads (0 = none)
    pub push_constant_size: u32,
}

// ===== PROGRAM =====

/// Linked set of shader stages with their layouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    stages: Vec<ShaderStageModule>,
    set_layouts: Vec<DescriptorSetLayoutHandle>,
    push_constant_size: u32,
    push_constant_stages: ShaderStages,
}

impl ShaderProgram {
    /// Link stages into a program
    ///
    /// Bindings with the same (set, binding) in several stages are merged,
    /// their stage flags combined. Set indices no stage uses get an empty
    /// layout. `overrides` replaces the reflected layout of a set; the
    /// bindless set is passed this way, since its runtime-sized arrays cannot
    /// be sized from reflection.
    ///
    /// # Errors
    ///
    /// Fails if no stage is given, a compute stage is mixed with graphics
    /// stages, a stage appears twice, two stages declare
    /// one binding with different types, or a runtime-sized array is declared
    /// in a set that is not overridden.
    pub fn new(
        stages: Vec<(ShaderModuleHandle, ShaderStageReflection)>,
        layouts: &mut DescriptorLayoutCache,
        overrides: &[(u32, DescriptorSetLayoutHandle)],
    ) -> Result<Self> {
        if stages.is_empty() {
            return Err(Error::InvalidResource("shader program without stages".to_string()));
        }
        let has_compute = stages.iter().any(|(_, r)| r.stage == ShaderStage::Compute);
        if has_compute && stages.len() > 1 {
            return Err(Error::InvalidResource(
                "compute stage linked together with graphics stages".to_string(),
            ));
        }

        let mut sets: BTreeMap<u32, BTreeMap<u32, DescriptorSetLayoutBinding>> = BTreeMap::new();
        let mut push_constant_size = 0;
        let mut push_constant_stages = ShaderStages::empty();
        let mut modules: Vec<ShaderStageModule> = Vec::with_capacity(stages.len());

        for (module, reflection) in stages {
            if modules.iter().any(|m| m.stage == reflection.stage) {
                return Err(Error::InvalidResource(format!("{:?} stage given twice", reflection.stage)));
            }
            let flag = reflection.stage.flag();

            if reflection.push_constant_size > 0 {
                push_constant_size = push_constant_size.max(reflection.push_constant_size);
                push_constant_stages |= flag;
            }

            for reflected in &reflection.bindings {
                if overrides.iter().any(|(set, _)| *set == reflected.set) {
                    continue;
                }
                if reflected.count == 0 {
                    return Err(Error::InvalidResource(format!(
                        "runtime-sized array at set {} binding {} needs a layout override",
                        reflected.set, reflected.binding
                    )));
                }
                let set = sets.entry(reflected.set).or_default();
                match set.get_mut(&reflected.binding) {
                    Some(existing) if existing.descriptor_type != reflected.descriptor_type => {
                        return Err(Error::InvalidResource(format!(
                            "set {} binding {} declared as {:?} and {:?}",
                            reflected.set, reflected.binding, existing.descriptor_type, reflected.descriptor_type
                        )));
                    }
                    Some(existing) => {
                        existing.stages |= flag;
                        existing.count = existing.count.max(reflected.count);
                    }
                    None => {
                        set.insert(
                            reflected.binding,
                            DescriptorSetLayoutBinding {
                                binding: reflected.binding,
                                descriptor_type: reflected.descriptor_type,
                                count: reflected.count,
                                stages: flag,
                                flags: DescriptorBindingFlags::empty(),
                            },
                        );
                    }
                }
            }

            modules.push(ShaderStageModule {
                stage: reflection.stage,
                module,
                entry_point: reflection.entry_point,
            });
        }
        modules.sort_by_key(|m| m.stage);

        let set_count = sets
            .keys()
            .chain(overrides.iter().map(|(set, _)| set))
            .max()
            .map_or(0, |max| max + 1);

        let mut set_layouts = Vec::with_capacity(set_count as usize);
        for index in 0..set_count {
            let layout = match overrides.iter().find(|(set, _)| *set == index) {
                Some((_, layout)) => *layout,
                None => match sets.remove(&index) {
                    Some(bindings) => layouts.fetch(&DescriptorSetLayoutInfo::new(bindings.into_values().collect()))?,
                    None => layouts.empty()?,
                },
            };
            set_layouts.push(layout);
        }

        engine_debug!(
            "mgp::ShaderProgram",
            "Linked {} stages, {} sets, {} push constant bytes",
            modules.len(),
            set_layouts.len(),
            push_constant_size
        );
        Ok(Self {
            stages: modules,
            set_layouts,
            push_constant_size,
            push_constant_stages,
        })
    }

    /// Stage modules, ordered vertex, fragment, compute
    pub fn stages(&self) -> &[ShaderStageModule] {
        &self.stages
    }

    pub fn set_layouts(&self) -> &[DescriptorSetLayoutHandle] {
        &self.set_layouts
    }

    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }

    pub fn push_constant_stages(&self) -> ShaderStages {
        self.push_constant_stages
    }

    /// True if the program is a single compute stage
    pub fn is_compute(&self) -> bool {
        self.stages.len() == 1 && self.stages[0].stage == ShaderStage::Compute
    }

    pub fn uses_module(&self, module: ShaderModuleHandle) -> bool {
        self.stages.iter().any(|s| s.module == module)
    }

    /// Destroy the stage modules right away
    ///
    /// Only valid once no pipeline built from the program can run; prefer
    /// [`PipelineCache::release_program`](crate::pipeline::PipelineCache::release_program).
    pub fn destroy_modules(self, device: &dyn Device) {
        for stage in self.stages {
            device.destroy_shader_module(stage.module);
        }
    }
}

#[cfg(test)]
#[path = "shader_program_tests.rs"]
mod tests;
