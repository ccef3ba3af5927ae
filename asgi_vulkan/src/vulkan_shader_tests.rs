use super::*;

#[test]
fn test_graphics_execution_models() {
    assert_eq!(stage_from_exec_model(ExecutionModel::Vertex), Some(ShaderStage::Vertex));
    assert_eq!(stage_from_exec_model(ExecutionModel::Fragment), Some(ShaderStage::Fragment));
    assert_eq!(stage_from_exec_model(ExecutionModel::Geometry), Some(ShaderStage::Geometry));
    assert_eq!(
        stage_from_exec_model(ExecutionModel::TessellationEvaluation),
        Some(ShaderStage::TessellationEvaluation)
    );
}

#[test]
fn test_compute_is_not_a_graphics_stage() {
    assert_eq!(stage_from_exec_model(ExecutionModel::GLCompute), None);
}

#[test]
fn test_supported_descriptor_kinds() {
    assert_eq!(binding_kind(&DescriptorType::UniformBuffer()).unwrap(), BindingKind::UniformBuffer);
    assert_eq!(
        binding_kind(&DescriptorType::CombinedImageSampler()).unwrap(),
        BindingKind::CombinedImageSampler
    );
}

#[test]
fn test_unsupported_descriptor_kind_rejected() {
    assert!(matches!(
        binding_kind(&DescriptorType::Sampler()),
        Err(Error::InvalidResource(_))
    ));
}

#[test]
fn test_garbage_bytecode_fails_reflection() {
    let words = [0xDEADBEEFu32, 0, 0, 0, 0];
    assert!(reflect_spirv(&words).is_err());
}

#[test]
fn test_missing_compiler_reports_not_found() {
    let config = ShaderCompilerConfig {
        compiler_dir: Some(std::env::temp_dir().join("asgi_no_such_dir")),
        ..ShaderCompilerConfig::default()
    };
    let compiler = GlslangCompiler::new(&config);
    assert!(compiler.compiler_path().ends_with(&config.compiler_name));

    let result = compiler.produce(Path::new("shader.vert"), Path::new("shader.vert.spv"));
    assert!(matches!(result, Err(Error::NotFound(_))));
}

// ============================================================================
// Reflection of real modules
// ============================================================================

use asgi::gi::device::{PipelineLayoutDesc, ShaderStageFlags};

fn fixture_words(bytes: &[u8]) -> Vec<u32> {
    ash::util::read_spv(&mut std::io::Cursor::new(bytes)).unwrap()
}

fn textured_vertex() -> Vec<u32> {
    fixture_words(include_bytes!("../tests/shaders/textured.vert.spv"))
}

fn textured_fragment() -> Vec<u32> {
    fixture_words(include_bytes!("../tests/shaders/textured.frag.spv"))
}

#[test]
fn test_reflect_vertex_module() {
    let reflection = reflect_spirv(&textured_vertex()).unwrap();
    assert_eq!(reflection.stage, ShaderStage::Vertex);
    assert_eq!(reflection.entry_point, "main");

    assert_eq!(reflection.bindings.len(), 1);
    let camera = &reflection.bindings[0];
    assert_eq!((camera.group, camera.slot), (0, 0));
    assert_eq!(camera.kind, BindingKind::UniformBuffer);
    assert_eq!(camera.count, 1);

    // Only `model` (offset 0) is read; the block is 80 bytes
    assert_eq!(reflection.push_constants.len(), 1);
    assert_eq!(reflection.push_constants[0].offset, 0);
    assert_eq!(reflection.push_constants[0].size, 80);
}

#[test]
fn test_reflect_fragment_module() {
    let reflection = reflect_spirv(&textured_fragment()).unwrap();
    assert_eq!(reflection.stage, ShaderStage::Fragment);

    assert_eq!(reflection.bindings.len(), 1);
    let albedo = &reflection.bindings[0];
    assert_eq!((albedo.group, albedo.slot), (1, 0));
    assert_eq!(albedo.kind, BindingKind::CombinedImageSampler);
    assert_eq!(albedo.count, 1);

    // Only `tint` (offset 64) is read
    assert_eq!(reflection.push_constants.len(), 1);
    assert_eq!(reflection.push_constants[0].offset, 64);
    assert_eq!(reflection.push_constants[0].size, 16);
}

#[test]
fn test_push_constant_members_read_by_fixtures() {
    assert_eq!(push_constant_use(&textured_vertex()), PushConstantUse::Members([0].into()));
    assert_eq!(push_constant_use(&textured_fragment()), PushConstantUse::Members([1].into()));
}

#[test]
fn test_fixture_pair_layout() {
    let vertex = reflect_spirv(&textured_vertex()).unwrap();
    let fragment = reflect_spirv(&textured_fragment()).unwrap();
    let layout = PipelineLayoutDesc::synthesize(&[&vertex, &fragment]).unwrap();

    assert_eq!(layout.binding_groups.len(), 2);
    let camera = layout.binding_groups[0].entry(0).unwrap();
    assert_eq!(camera.visibility, ShaderStageFlags::VERTEX);
    let albedo = layout.binding_groups[1].entry(0).unwrap();
    assert_eq!(albedo.visibility, ShaderStageFlags::FRAGMENT);

    let ranges: Vec<(u32, u32, ShaderStageFlags)> = layout
        .push_constant_ranges
        .iter()
        .map(|r| (r.offset, r.size, r.visibility))
        .collect();
    assert_eq!(ranges, vec![(0, 80, ShaderStageFlags::VERTEX), (64, 16, ShaderStageFlags::FRAGMENT)]);
}

// ============================================================================
// Push-constant scan on hand-built instruction streams
// ============================================================================

const HEADER: [u32; 5] = [0x0723_0203, 0x0001_0000, 0, 64, 0];

fn instruction(opcode: u32, operands: &[u32]) -> Vec<u32> {
    let mut words = vec![((operands.len() as u32 + 1) << 16) | opcode];
    words.extend_from_slice(operands);
    words
}

fn module(instructions: &[Vec<u32>]) -> Vec<u32> {
    let mut words = HEADER.to_vec();
    for inst in instructions {
        words.extend_from_slice(inst);
    }
    words
}

#[test]
fn test_whole_block_load() {
    let words = module(&[
        instruction(OP_VARIABLE, &[20, 10, STORAGE_CLASS_PUSH_CONSTANT]),
        instruction(OP_LOAD, &[30, 11, 10]),
    ]);
    assert_eq!(push_constant_use(&words), PushConstantUse::Whole);
}

#[test]
fn test_unread_block() {
    let words = module(&[instruction(OP_VARIABLE, &[20, 10, STORAGE_CLASS_PUSH_CONSTANT])]);
    assert_eq!(push_constant_use(&words), PushConstantUse::Unused);
}

#[test]
fn test_chains_on_other_variables_ignored() {
    let uniform_storage_class = 2;
    let words = module(&[
        instruction(OP_CONSTANT, &[5, 6, 3]),
        instruction(OP_VARIABLE, &[20, 10, STORAGE_CLASS_PUSH_CONSTANT]),
        instruction(OP_VARIABLE, &[21, 12, uniform_storage_class]),
        instruction(OP_ACCESS_CHAIN, &[22, 13, 12, 6]),
        instruction(OP_IN_BOUNDS_ACCESS_CHAIN, &[22, 14, 10, 6]),
    ]);
    assert_eq!(push_constant_use(&words), PushConstantUse::Members([3].into()));
}

#[test]
fn test_truncated_stream_stops_scan() {
    let mut words = module(&[instruction(OP_VARIABLE, &[20, 10, STORAGE_CLASS_PUSH_CONSTANT])]);
    words.push((9 << 16) | OP_LOAD);
    assert_eq!(push_constant_use(&words), PushConstantUse::Unused);
}
