/// SPIR-V reflection - builds the stage interface the core links programs from

use mgp_engine::mgp::Result;
use mgp_engine::mgp::render::{DescriptorType, ReflectedBinding, ShaderStage, ShaderStageReflection};
use mgp_engine::{engine_bail, engine_err, engine_trace};

/// Reflect one stage of a SPIR-V module
///
/// The entry point named `entry_point` is used; when the module has a single
/// entry point its name does not need to match. Runtime-sized descriptor
/// arrays are reported with `count == 0`.
///
/// # Errors
///
/// Fails if the words are not valid SPIR-V, the entry point is missing, or a
/// binding uses a descriptor type the engine does not support.
pub fn reflect_spirv(code: &[u32], stage: ShaderStage, entry_point: &str) -> Result<ShaderStageReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("mgp::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let entry = match entry_points.iter().find(|ep| ep.name == entry_point) {
        Some(entry) => entry,
        None if entry_points.len() == 1 => &entry_points[0],
        None => {
            engine_bail!(
                "mgp::vulkan",
                "SPIR-V module has no entry point '{}' ({} entry points)",
                entry_point,
                entry_points.len()
            );
        }
    };

    let mut bindings = Vec::new();
    let mut push_constant_size = 0u32;
    for var in entry.vars.iter() {
        match var {
            spirq::var::Variable::Descriptor { desc_bind, desc_ty, nbind, .. } => {
                bindings.push(ReflectedBinding {
                    set: desc_bind.set(),
                    binding: desc_bind.bind(),
                    descriptor_type: descriptor_type_from_spirq(desc_ty)?,
                    count: *nbind,
                });
            }
            spirq::var::Variable::PushConstant { ty, .. } => {
                let size = ty.nbyte().unwrap_or(0) as u32;
                push_constant_size = push_constant_size.max(size);
            }
            _ => {}
        }
    }
    bindings.sort_by_key(|b| (b.set, b.binding));

    engine_trace!(
        "mgp::vulkan",
        "Reflected {:?} stage '{}': {} bindings, {} push constant bytes",
        stage,
        entry.name,
        bindings.len(),
        push_constant_size
    );

    Ok(ShaderStageReflection {
        stage,
        entry_point: entry.name.clone(),
        bindings,
        push_constant_size,
    })
}

fn descriptor_type_from_spirq(desc_ty: &spirq::ty::DescriptorType) -> Result<DescriptorType> {
    use spirq::ty::DescriptorType as Spirq;
    match desc_ty {
        Spirq::UniformBuffer() => Ok(DescriptorType::UniformBuffer),
        Spirq::StorageBuffer(..) => Ok(DescriptorType::StorageBuffer),
        Spirq::CombinedImageSampler() => Ok(DescriptorType::CombinedImageSampler),
        Spirq::SampledImage() => Ok(DescriptorType::SampledImage),
        Spirq::StorageImage(..) => Ok(DescriptorType::StorageImage),
        Spirq::Sampler() => Ok(DescriptorType::Sampler),
        other => {
            engine_bail!("mgp::vulkan", "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
