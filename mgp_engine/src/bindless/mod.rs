/// Bindless module - the global update-after-bind descriptor set

pub mod bindless_registry;

pub use bindless_registry::{BindlessClass, BindlessHandle, BindlessRegistry};
