/// Binding-group layout synthesis from shader reflection
///
/// The layout of a pipeline is derived entirely from the reflection of its
/// active stages: no caller-supplied descriptor layouts.

use crate::device::{BindingKind, ShaderReflection, ShaderStageFlags};
use crate::error::Result;
use crate::gi_bail_warn;

/// One binding of a binding group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingEntry {
    pub slot: u32,
    pub kind: BindingKind,
    pub count: u32,
    /// Union of the stages declaring this binding
    pub visibility: ShaderStageFlags,
}

/// Layout of one binding group (descriptor set)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingGroupLayoutDesc {
    /// Entries in first-discovery order
    pub entries: Vec<BindingEntry>,
}

impl BindingGroupLayoutDesc {
    pub fn entry(&self, slot: u32) -> Option<&BindingEntry> {
        self.entries.iter().find(|e| e.slot == slot)
    }
}

/// Push-constant range visible to one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineConstantRange {
    pub offset: u32,
    pub size: u32,
    pub visibility: ShaderStageFlags,
}

/// Complete binding layout of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineLayoutDesc {
    /// Indexed by group number, `0..=max observed`; unused groups are empty
    pub binding_groups: Vec<BindingGroupLayoutDesc>,
    pub push_constant_ranges: Vec<InlineConstantRange>,
}

impl PipelineLayoutDesc {
    /// Merge the reflection of every active stage
    ///
    /// `stages` must be in canonical stage order. The same group/slot declared
    /// by several stages becomes one entry whose visibility is the union of
    /// those stages; declaring it with a different kind or count is an error.
    pub fn synthesize(stages: &[&ShaderReflection]) -> Result<Self> {
        let mut binding_groups: Vec<BindingGroupLayoutDesc> = Vec::new();
        let mut push_constant_ranges = Vec::new();

        for reflection in stages {
            let stage_flag = reflection.stage.flag();

            for binding in &reflection.bindings {
                let group_index = binding.group as usize;
                if binding_groups.len() <= group_index {
                    binding_groups.resize_with(group_index + 1, BindingGroupLayoutDesc::default);
                }
                let group = &mut binding_groups[group_index];

                match group.entries.iter_mut().find(|e| e.slot == binding.slot) {
                    Some(existing) => {
                        if existing.kind != binding.kind || existing.count != binding.count {
                            gi_bail_warn!("asgi::pipeline",
                                "Binding '{}' (group={}, slot={}) declared as {:?}[{}] in {:?} conflicts with {:?}[{}]",
                                binding.name, binding.group, binding.slot,
                                binding.kind, binding.count, reflection.stage,
                                existing.kind, existing.count);
                        }
                        existing.visibility |= stage_flag;
                    }
                    None => group.entries.push(BindingEntry {
                        slot: binding.slot,
                        kind: binding.kind,
                        count: binding.count,
                        visibility: stage_flag,
                    }),
                }
            }

            if let Some(range) = stage_push_constant_range(reflection) {
                push_constant_ranges.push(range);
            }
        }

        Ok(Self { binding_groups, push_constant_ranges })
    }

    /// Total number of binding entries across all groups
    pub fn binding_count(&self) -> usize {
        self.binding_groups.iter().map(|g| g.entries.len()).sum()
    }
}

/// Single range covering every push-constant block of one stage
fn stage_push_constant_range(reflection: &ShaderReflection) -> Option<InlineConstantRange> {
    let offset = reflection.push_constants.iter().map(|p| p.offset).min()?;
    let end = reflection
        .push_constants
        .iter()
        .map(|p| p.offset + p.size)
        .max()?;
    Some(InlineConstantRange {
        offset,
        size: end - offset,
        visibility: reflection.stage.flag(),
    })
}

#[cfg(test)]
#[path = "pipeline_layout_tests.rs"]
mod tests;
