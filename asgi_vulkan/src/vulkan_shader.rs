/// Shader modules - SPIR-V loading, spirq reflection and the glslang bytecode provider

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use ash::vk;
use rustc_hash::{FxHashMap, FxHashSet};
use spirq::spirv::ExecutionModel;
use spirq::ty::{DescriptorType, Type};
use spirq::var::Variable;
use asgi::gi::device::{BindingKind, BytecodeProvider, ReflectedBinding, ReflectedPushConstant, ShaderReflection, ShaderStage};
use asgi::gi::{Error, Result, ShaderCompilerConfig};
use asgi::{gi_bail, gi_bail_warn, gi_debug, gi_err};

/// Vulkan shader module with its reflection
pub(crate) struct ShaderModule {
    pub module: vk::ShaderModule,
    pub reflection: ShaderReflection,
}

impl ShaderModule {
    /// Load SPIR-V from `bytecode`, reflect it and create the native module
    pub fn load(device: &ash::Device, bytecode: &Path) -> Result<Self> {
        let bytes = std::fs::read(bytecode).map_err(|e| {
            Error::NotFound(format!("cannot read shader bytecode '{}': {}", bytecode.display(), e))
        })?;
        let words = ash::util::read_spv(&mut std::io::Cursor::new(bytes))
            .map_err(|e| gi_err!("asgi::vulkan", "Invalid SPIR-V in '{}': {}", bytecode.display(), e))?;

        let reflection = reflect_spirv(&words)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to create shader module: {:?}", e))?
        };

        gi_debug!("asgi::vulkan", "Loaded {:?} shader '{}' ({} binding(s), {} push constant block(s))",
            reflection.stage, bytecode.display(), reflection.bindings.len(), reflection.push_constants.len());
        Ok(Self { module, reflection })
    }

    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_shader_module(self.module, None);
        }
    }
}

// ===== REFLECTION =====

/// Graphics stage of a SPIR-V execution model
pub(crate) fn stage_from_exec_model(model: ExecutionModel) -> Option<ShaderStage> {
    match model {
        ExecutionModel::Vertex => Some(ShaderStage::Vertex),
        ExecutionModel::TessellationControl => Some(ShaderStage::TessellationControl),
        ExecutionModel::TessellationEvaluation => Some(ShaderStage::TessellationEvaluation),
        ExecutionModel::Geometry => Some(ShaderStage::Geometry),
        ExecutionModel::Fragment => Some(ShaderStage::Fragment),
        _ => None,
    }
}

pub(crate) fn binding_kind(desc_ty: &DescriptorType) -> Result<BindingKind> {
    match desc_ty {
        DescriptorType::UniformBuffer() => Ok(BindingKind::UniformBuffer),
        DescriptorType::StorageBuffer(..) => Ok(BindingKind::StorageBuffer),
        DescriptorType::CombinedImageSampler() => Ok(BindingKind::CombinedImageSampler),
        other => {
            gi_bail_warn!("asgi::vulkan", "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    }
}

// SPIR-V opcodes and operands read by the push-constant scan
const OP_CONSTANT: u32 = 43;
const OP_VARIABLE: u32 = 59;
const OP_LOAD: u32 = 61;
const OP_COPY_MEMORY: u32 = 63;
const OP_ACCESS_CHAIN: u32 = 65;
const OP_IN_BOUNDS_ACCESS_CHAIN: u32 = 66;
const STORAGE_CLASS_PUSH_CONSTANT: u32 = 9;
const SPIRV_HEADER_WORDS: usize = 5;

/// How the code of a module reads its push-constant block
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PushConstantUse {
    /// Declared but never read
    Unused,
    /// Loaded or copied as a whole
    Whole,
    /// Member indices reached through access chains
    Members(BTreeSet<u32>),
}

/// Scan the instructions for reads of push-constant variables
///
/// The first access chain index into a struct is always a constant, so the
/// accessed member is known statically.
pub(crate) fn push_constant_use(words: &[u32]) -> PushConstantUse {
    let mut variables = FxHashSet::default();
    let mut constants = FxHashMap::default();
    let mut chains = Vec::new();
    let mut whole = Vec::new();

    let mut index = SPIRV_HEADER_WORDS;
    while index < words.len() {
        let count = (words[index] >> 16) as usize;
        let opcode = words[index] & 0xFFFF;
        if count == 0 || index + count > words.len() {
            break;
        }
        let operands = &words[index + 1..index + count];
        match opcode {
            OP_CONSTANT if operands.len() >= 3 => {
                constants.insert(operands[1], operands[2]);
            }
            OP_VARIABLE if operands.len() >= 3 && operands[2] == STORAGE_CLASS_PUSH_CONSTANT => {
                variables.insert(operands[1]);
            }
            OP_ACCESS_CHAIN | OP_IN_BOUNDS_ACCESS_CHAIN if operands.len() >= 4 => {
                chains.push((operands[2], operands[3]));
            }
            OP_LOAD if operands.len() >= 3 => whole.push(operands[2]),
            OP_COPY_MEMORY if operands.len() >= 2 => whole.push(operands[1]),
            _ => {}
        }
        index += count;
    }

    if whole.iter().any(|pointer| variables.contains(pointer)) {
        return PushConstantUse::Whole;
    }
    let mut members = BTreeSet::new();
    for (base, member) in chains {
        if variables.contains(&base) {
            match constants.get(&member) {
                Some(&member) => {
                    members.insert(member);
                }
                None => return PushConstantUse::Whole,
            }
        }
    }
    if members.is_empty() {
        PushConstantUse::Unused
    } else {
        PushConstantUse::Members(members)
    }
}

/// Push-constant block: lowest offset the code reads, declared size minus that offset
///
/// A block that is loaded whole or never read starts at its lowest declared
/// member offset.
fn push_constant(name: &Option<String>, ty: &Type, usage: &PushConstantUse) -> ReflectedPushConstant {
    let offset = match ty {
        Type::Struct(st) => {
            let declared = st.members.iter().filter_map(|m| m.offset).min();
            let active = match usage {
                PushConstantUse::Members(members) => members
                    .iter()
                    .filter_map(|&member| st.members.get(member as usize).and_then(|m| m.offset))
                    .min(),
                PushConstantUse::Whole | PushConstantUse::Unused => None,
            };
            active.or(declared).unwrap_or(0)
        }
        _ => 0,
    };
    let total = ty.nbyte().unwrap_or(offset);
    ReflectedPushConstant {
        name: name.clone().unwrap_or_default(),
        offset: offset as u32,
        size: total.saturating_sub(offset) as u32,
    }
}

/// Reflect a SPIR-V module holding exactly one graphics entry point
pub(crate) fn reflect_spirv(words: &[u32]) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| gi_err!("asgi::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let mut graphics = entry_points
        .iter()
        .filter_map(|ep| stage_from_exec_model(ep.exec_model).map(|stage| (stage, ep)));
    let (stage, entry_point) = match (graphics.next(), graphics.next()) {
        (Some(found), None) => found,
        (None, _) => gi_bail!("asgi::vulkan", "SPIR-V module has no graphics entry point"),
        (Some(_), Some(_)) => gi_bail!("asgi::vulkan", "SPIR-V module has several graphics entry points"),
    };

    // A Vulkan entry point has at most one push-constant block
    let usage = push_constant_use(words);
    let mut reflection = ShaderReflection::new(stage, entry_point.name.clone());
    for var in entry_point.vars.iter() {
        match var {
            Variable::Descriptor { name, desc_bind, desc_ty, nbind, .. } => {
                reflection.bindings.push(ReflectedBinding {
                    name: name.clone().unwrap_or_default(),
                    group: desc_bind.set(),
                    slot: desc_bind.bind(),
                    kind: binding_kind(desc_ty)?,
                    count: (*nbind).max(1),
                });
            }
            Variable::PushConstant { name, ty } => {
                reflection.push_constants.push(push_constant(name, ty, &usage));
            }
            _ => {}
        }
    }
    Ok(reflection)
}

// ===== BYTECODE PROVIDER =====

/// Runs glslangValidator to compile a GLSL source into SPIR-V
pub struct GlslangCompiler {
    compiler_path: PathBuf,
}

impl GlslangCompiler {
    pub fn new(config: &ShaderCompilerConfig) -> Self {
        Self {
            compiler_path: config.compiler_path(),
        }
    }

    pub fn compiler_path(&self) -> &Path {
        &self.compiler_path
    }
}

impl BytecodeProvider for GlslangCompiler {
    fn produce(&self, source: &Path, bytecode: &Path) -> Result<()> {
        gi_debug!("asgi::vulkan", "Compiling '{}' with {}", source.display(), self.compiler_path.display());
        let output = Command::new(&self.compiler_path)
            .arg("-V")
            .arg(source)
            .arg("-o")
            .arg(bytecode)
            .output()
            .map_err(|e| Error::NotFound(format!("cannot run '{}': {}", self.compiler_path.display(), e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::BackendError(format!(
                "'{}' failed on '{}': {}",
                self.compiler_path.display(),
                source.display(),
                String::from_utf8_lossy(&output.stdout).trim()
            )))
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
