/// Shader stages, reflection data and bytecode resolution

use std::path::{Path, PathBuf};
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::gi_warn;

/// Graphics shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
}

impl ShaderStage {
    /// Canonical iteration order used wherever stages are walked
    pub const GRAPHICS_ORDER: [ShaderStage; 5] = [
        ShaderStage::Vertex,
        ShaderStage::TessellationControl,
        ShaderStage::TessellationEvaluation,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
    ];

    /// Visibility bit of this stage
    pub fn flag(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::TessellationControl => ShaderStageFlags::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => ShaderStageFlags::TESSELLATION_EVALUATION,
            ShaderStage::Geometry => ShaderStageFlags::GEOMETRY,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
        }
    }
}

bitflags! {
    /// Set of stages a binding or constant range is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const TESSELLATION_CONTROL = 1 << 1;
        const TESSELLATION_EVALUATION = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
    }
}

/// Kind of a shader-visible resource binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
}

/// One resource binding declared by a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    /// Variable name, empty when stripped
    pub name: String,
    /// Binding group (descriptor set) index
    pub group: u32,
    /// Binding slot inside the group
    pub slot: u32,
    pub kind: BindingKind,
    /// Array element count, 1 for non-arrays
    pub count: u32,
}

/// Push-constant block declared by a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedPushConstant {
    pub name: String,
    /// Smallest member offset in bytes
    pub offset: u32,
    /// Declared struct size minus `offset`
    pub size: u32,
}

/// Everything a pipeline needs to know about one compiled stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderReflection {
    pub stage: ShaderStage,
    pub entry_point: String,
    /// Bindings in declaration order
    pub bindings: Vec<ReflectedBinding>,
    pub push_constants: Vec<ReflectedPushConstant>,
}

impl ShaderReflection {
    pub fn new(stage: ShaderStage, entry_point: impl Into<String>) -> Self {
        Self {
            stage,
            entry_point: entry_point.into(),
            bindings: Vec::new(),
            push_constants: Vec::new(),
        }
    }
}

/// Produces missing shader bytecode
///
/// Invoked at most once per shader module creation, synchronously.
pub trait BytecodeProvider {
    /// Compile `source` into `bytecode`
    fn produce(&self, source: &Path, bytecode: &Path) -> Result<()>;
}

/// Path of the compiled bytecode for `source`: `<source>.<extension>`
pub fn bytecode_path(source: &Path, extension: &str) -> PathBuf {
    let mut path = source.as_os_str().to_os_string();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Locate the bytecode of `source`, asking `provider` to produce it if absent
///
/// A provider failure is logged and the file re-checked anyway: the compiler
/// may report errors yet still write output.
pub fn resolve_bytecode(
    source: &Path,
    extension: &str,
    provider: &dyn BytecodeProvider,
) -> Result<PathBuf> {
    let bytecode = bytecode_path(source, extension);
    if bytecode.is_file() {
        return Ok(bytecode);
    }

    if let Err(e) = provider.produce(source, &bytecode) {
        gi_warn!("asgi::shader", "Bytecode provider failed for '{}': {}", source.display(), e);
    }

    if bytecode.is_file() {
        Ok(bytecode)
    } else {
        Err(Error::NotFound(format!(
            "shader bytecode '{}' is missing and could not be produced",
            bytecode.display()
        )))
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
