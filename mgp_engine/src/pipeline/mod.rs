/// Pipeline module - shader programs, pipeline definitions and the pipeline cache

pub mod shader_program;
pub mod pipeline_definition;
pub mod pipeline_cache;

pub use shader_program::{ReflectedBinding, ShaderProgram, ShaderStageReflection};
pub use pipeline_definition::{PipelineDefinition, RenderInfo};
pub use pipeline_cache::{CacheStats, PipelineBinding, PipelineCache};
