/// Mock backend for unit tests (no GPU required)
///
/// Memory is plain `Vec<u8>`. Transfers are recorded and replayed on submit,
/// so tests observe exactly what a real queue would have done. Counters and
/// failure switches let tests check staging lifetimes and rollback.

use std::path::{Path, PathBuf};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::config::GiType;
use crate::device::{
    image_aspect, BufferHandle, BufferInfo, BufferUsageFlags, ClearValue, FrameBufferDesc,
    FrameBufferHandle, GraphicsInterface, GraphicsPipelineDesc, Image2DDesc, ImageAspectFlags,
    ImageHandle, ImageInfo, ImageRegion, ImageViewHandle, ImageViewInfo, PipelineHandle,
    PipelineLayoutDesc, RenderPassDesc, RenderPassHandle, SamplerDesc, SamplerHandle,
    ShaderModuleHandle, ShaderReflection, validate_stage_reflection,
};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::image_layout::{ImageLayoutState, ImageLayoutTracker, LayoutTransition};
use crate::memory::{AllocationRequest, MemoryAllocation, MemoryAllocator, MemoryUsage};
use crate::upload::{self, BufferUpdateBatch, ImageUpdateBatch, TransferDevice};
use crate::gi_error;

// ============================================================================
// Mock Allocator
// ============================================================================

/// Bump allocator over a virtual address space
pub struct MockAllocator {
    next_offset: u64,
    outstanding: usize,
    /// Allocations left before `OutOfMemory`; `None` never fails
    pub fail_after: Option<usize>,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self {
            next_offset: 0,
            outstanding: 0,
            fail_after: None,
        }
    }
}

impl MemoryAllocator for MockAllocator {
    type Allocation = MemoryAllocation;

    fn allocate(&mut self, request: &AllocationRequest) -> Result<MemoryAllocation> {
        if let Some(remaining) = self.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(Error::OutOfMemory);
            }
            *remaining -= 1;
        }

        let alignment = request.alignment.max(1);
        let offset = self.next_offset.div_ceil(alignment) * alignment;
        self.next_offset = offset + request.size;
        self.outstanding += 1;

        let host_visible = request.usage.is_host_visible();
        Ok(MemoryAllocation {
            usage: request.usage,
            memory_type_index: if host_visible { 1 } else { 0 },
            offset,
            size: request.size,
            host_visible,
            // Readback memory is cached but not coherent
            host_coherent: matches!(request.usage, MemoryUsage::CpuOnly | MemoryUsage::CpuToGpu),
        })
    }

    fn free(&mut self, _allocation: MemoryAllocation) -> Result<()> {
        if self.outstanding == 0 {
            return Err(Error::BackendError("free without allocation".to_string()));
        }
        self.outstanding -= 1;
        Ok(())
    }

    fn outstanding_allocations(&self) -> usize {
        self.outstanding
    }
}

// ============================================================================
// Mock Resources
// ============================================================================

pub struct MockBuffer {
    pub info: BufferInfo,
    pub bytes: Vec<u8>,
}

pub struct MockImage {
    pub info: ImageInfo,
    pub tracker: ImageLayoutTracker,
    /// Tightly packed texels, one vector per mip level
    pub levels: Vec<Vec<u8>>,
    pub origin_view: ImageViewHandle,
}

impl MockImage {
    /// Texels of `region`, row by row
    pub fn read_region(&self, region: &ImageRegion) -> Vec<u8> {
        let texel = self.info.format.size_bytes() as usize;
        let (level_width, _) = self.info.mip_extent(region.level);
        let level = &self.levels[region.level as usize];
        let mut out = Vec::with_capacity(region.width as usize * region.height as usize * texel);
        for row in 0..region.height as usize {
            let start = ((region.y as usize + row) * level_width as usize + region.x as usize) * texel;
            out.extend_from_slice(&level[start..start + region.width as usize * texel]);
        }
        out
    }

    fn write_region(&mut self, region: &ImageRegion, data: &[u8]) {
        let texel = self.info.format.size_bytes() as usize;
        let (level_width, _) = self.info.mip_extent(region.level);
        let row_len = region.width as usize * texel;
        let level = &mut self.levels[region.level as usize];
        for (row, src) in data.chunks(row_len).enumerate() {
            let start = ((region.y as usize + row) * level_width as usize + region.x as usize) * texel;
            level[start..start + row_len].copy_from_slice(src);
        }
    }
}

/// Staging buffer of the mock
pub struct MockStaging {
    pub bytes: Vec<u8>,
    allocation: MemoryAllocation,
}

enum RecordedCommand {
    BufferCopy { bytes: Vec<u8>, buffer: BufferHandle, offset: u64 },
    ImageCopy { bytes: Vec<u8>, image: ImageHandle, region: ImageRegion },
    Barrier { image: ImageHandle, transition: LayoutTransition },
}

/// What the mock observed
#[derive(Debug, Default, Clone)]
pub struct MockStats {
    pub submissions: usize,
    pub aborted_transfers: usize,
    pub stagings_created: usize,
    pub stagings_destroyed: usize,
    pub direct_writes: usize,
    pub flushes: usize,
    /// Barriers of every successful submission, in record order
    pub barriers: Vec<(ImageHandle, ImageAspectFlags, LayoutTransition)>,
}

// ============================================================================
// Mock GI
// ============================================================================

pub struct MockGi {
    pub allocator: MockAllocator,
    pub buffers: SlotMap<BufferHandle, MockBuffer>,
    pub images: SlotMap<ImageHandle, MockImage>,
    pub views: SlotMap<ImageViewHandle, ImageViewInfo>,
    pub samplers: SlotMap<SamplerHandle, SamplerDesc>,
    pub shaders: SlotMap<ShaderModuleHandle, ShaderReflection>,
    pub pipelines: SlotMap<PipelineHandle, PipelineLayoutDesc>,
    pub render_passes: SlotMap<RenderPassHandle, RenderPassDesc>,
    pub frame_buffers: SlotMap<FrameBufferHandle, (FrameBufferDesc, Vec<ClearValue>)>,
    /// Reflection returned for a shader path, standing in for bytecode on disk
    known_shaders: FxHashMap<PathBuf, ShaderReflection>,
    recording: Option<Vec<RecordedCommand>>,
    pub stats: MockStats,
    /// Staging buffers created before `create_staging` fails
    pub fail_staging_after: Option<usize>,
    pub fail_submit: bool,
    pub fail_image_copy: bool,
}

impl MockGi {
    pub fn new() -> Self {
        Self {
            allocator: MockAllocator::new(),
            buffers: SlotMap::with_key(),
            images: SlotMap::with_key(),
            views: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            render_passes: SlotMap::with_key(),
            frame_buffers: SlotMap::with_key(),
            known_shaders: FxHashMap::default(),
            recording: None,
            stats: MockStats::default(),
            fail_staging_after: None,
            fail_submit: false,
            fail_image_copy: false,
        }
    }

    /// Make `create_shader_module(path)` succeed with `reflection`
    pub fn register_shader(&mut self, path: impl Into<PathBuf>, reflection: ShaderReflection) {
        self.known_shaders.insert(path.into(), reflection);
    }

    fn buffer(&self, buffer: BufferHandle) -> Result<&MockBuffer> {
        self.buffers
            .get(buffer)
            .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))
    }

    fn image(&self, image: ImageHandle) -> Result<&MockImage> {
        self.images
            .get(image)
            .ok_or_else(|| Error::InvalidResource("stale image handle".to_string()))
    }

    fn recording(&mut self) -> Result<&mut Vec<RecordedCommand>> {
        self.recording
            .as_mut()
            .ok_or_else(|| Error::BackendError("transfer not begun".to_string()))
    }
}

// ============================================================================
// TransferDevice
// ============================================================================

impl TransferDevice for MockGi {
    type Staging = MockStaging;

    fn destination_buffer(&self, buffer: BufferHandle) -> Result<BufferInfo> {
        Ok(self.buffer(buffer)?.info)
    }

    fn write_buffer_mapped(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let target = self
            .buffers
            .get_mut(buffer)
            .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))?;
        if !target.info.memory.host_visible {
            return Err(Error::BackendError("buffer memory is not mappable".to_string()));
        }
        let start = offset as usize;
        target.bytes[start..start + data.len()].copy_from_slice(data);
        self.stats.direct_writes += 1;
        if !target.info.memory.host_coherent {
            self.stats.flushes += 1;
        }
        Ok(())
    }

    fn create_staging(&mut self, data: &[u8]) -> Result<MockStaging> {
        if let Some(remaining) = self.fail_staging_after.as_mut() {
            if *remaining == 0 {
                return Err(Error::OutOfMemory);
            }
            *remaining -= 1;
        }
        let allocation = self.allocator.allocate(&AllocationRequest {
            name: "staging",
            usage: MemoryUsage::CpuOnly,
            size: data.len() as u64,
            alignment: 4,
            memory_type_bits: u32::MAX,
            linear: true,
        })?;
        self.stats.stagings_created += 1;
        Ok(MockStaging { bytes: data.to_vec(), allocation })
    }

    fn destroy_staging(&mut self, staging: MockStaging) {
        if let Err(e) = self.allocator.free(staging.allocation) {
            gi_error!("asgi::mock", "Failed to free staging memory: {}", e);
        }
        self.stats.stagings_destroyed += 1;
    }

    fn begin_transfer(&mut self) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::BackendError("transfer already recording".to_string()));
        }
        self.recording = Some(Vec::new());
        Ok(())
    }

    fn record_buffer_copy(&mut self, staging: &MockStaging, buffer: BufferHandle, offset: u64, size: u64) -> Result<()> {
        let bytes = staging.bytes[..size as usize].to_vec();
        self.recording()?.push(RecordedCommand::BufferCopy { bytes, buffer, offset });
        Ok(())
    }

    fn record_image_barrier(&mut self, image: ImageHandle, _aspect: ImageAspectFlags, transition: &LayoutTransition) -> Result<()> {
        self.recording()?.push(RecordedCommand::Barrier { image, transition: *transition });
        Ok(())
    }

    fn record_image_copy(&mut self, staging: &MockStaging, image: ImageHandle, _aspect: ImageAspectFlags, region: &ImageRegion) -> Result<()> {
        if self.fail_image_copy {
            return Err(Error::BackendError("injected image copy failure".to_string()));
        }
        let bytes = staging.bytes.clone();
        self.recording()?.push(RecordedCommand::ImageCopy { bytes, image, region: *region });
        Ok(())
    }

    fn submit_transfer(&mut self) -> Result<()> {
        let commands = self
            .recording
            .take()
            .ok_or_else(|| Error::BackendError("transfer not begun".to_string()))?;
        if self.fail_submit {
            return Err(Error::BackendError("injected submit failure".to_string()));
        }

        for command in commands {
            match command {
                RecordedCommand::BufferCopy { bytes, buffer, offset } => {
                    let target = self
                        .buffers
                        .get_mut(buffer)
                        .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))?;
                    let start = offset as usize;
                    target.bytes[start..start + bytes.len()].copy_from_slice(&bytes);
                }
                RecordedCommand::ImageCopy { bytes, image, region } => {
                    let target = self
                        .images
                        .get_mut(image)
                        .ok_or_else(|| Error::InvalidResource("stale image handle".to_string()))?;
                    target.write_region(&region, &bytes);
                }
                RecordedCommand::Barrier { image, transition } => {
                    let aspect = self.image(image)?.info.aspect;
                    self.stats.barriers.push((image, aspect, transition));
                }
            }
        }
        self.stats.submissions += 1;
        Ok(())
    }

    fn abort_transfer(&mut self) {
        self.recording = None;
        self.stats.aborted_transfers += 1;
    }

    fn destination_image(&self, image: ImageHandle) -> Result<ImageInfo> {
        Ok(self.image(image)?.info)
    }

    fn image_tracker(&self, image: ImageHandle) -> Result<&ImageLayoutTracker> {
        Ok(&self.image(image)?.tracker)
    }

    fn commit_image_tracker(&mut self, image: ImageHandle, tracker: ImageLayoutTracker) -> Result<()> {
        let target = self
            .images
            .get_mut(image)
            .ok_or_else(|| Error::InvalidResource("stale image handle".to_string()))?;
        target.tracker = tracker;
        Ok(())
    }
}

// ============================================================================
// GraphicsInterface
// ============================================================================

impl GraphicsInterface for MockGi {
    fn gi_type(&self) -> GiType {
        GiType::Vulkan
    }

    fn device_name(&self) -> &str {
        "mock"
    }

    fn create_shader_module(&mut self, path: &Path) -> Result<ShaderModuleHandle> {
        let reflection = self
            .known_shaders
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("shader bytecode for {}", path.display())))?;
        Ok(self.shaders.insert(reflection))
    }

    fn shader_reflection(&self, module: ShaderModuleHandle) -> Result<&ShaderReflection> {
        self.shaders
            .get(module)
            .ok_or_else(|| Error::InvalidResource("stale shader module handle".to_string()))
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) -> Result<()> {
        self.shaders
            .remove(module)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("stale shader module handle".to_string()))
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        if desc.subpasses.is_empty() {
            return Err(Error::InvalidResource("render pass without subpass".to_string()));
        }
        Ok(self.render_passes.insert(desc.clone()))
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) -> Result<()> {
        self.render_passes
            .remove(render_pass)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("stale render pass handle".to_string()))
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        desc.validate_stages()?;
        if !self.render_passes.contains_key(desc.render_pass) {
            return Err(Error::InvalidResource("stale render pass handle".to_string()));
        }
        let mut reflections = Vec::new();
        for (stage, module) in desc.stages.active() {
            let reflection = self.shader_reflection(module)?;
            validate_stage_reflection(stage, reflection)?;
            reflections.push(reflection);
        }
        let layout = PipelineLayoutDesc::synthesize(&reflections)?;
        Ok(self.pipelines.insert(layout))
    }

    fn pipeline_layout(&self, pipeline: PipelineHandle) -> Result<&PipelineLayoutDesc> {
        self.pipelines
            .get(pipeline)
            .ok_or_else(|| Error::InvalidResource("stale pipeline handle".to_string()))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        self.pipelines
            .remove(pipeline)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("stale pipeline handle".to_string()))
    }

    fn create_buffer(&mut self, size: u64, usage: BufferUsageFlags) -> Result<BufferHandle> {
        if size == 0 {
            return Err(Error::InvalidResource("zero-sized buffer".to_string()));
        }
        let memory = self.allocator.allocate(&AllocationRequest {
            name: "buffer",
            usage: MemoryUsage::classify_buffer(usage),
            size,
            alignment: 16,
            memory_type_bits: u32::MAX,
            linear: true,
        })?;
        Ok(self.buffers.insert(MockBuffer {
            info: BufferInfo { size, usage, memory },
            bytes: vec![0; size as usize],
        }))
    }

    fn buffer_info(&self, buffer: BufferHandle) -> Result<BufferInfo> {
        Ok(self.buffer(buffer)?.info)
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>> {
        let source = self.buffer(buffer)?;
        if !source.info.memory.host_visible {
            return Err(Error::InvalidResource("buffer is not host-visible".to_string()));
        }
        if !source.info.contains_range(offset, len) {
            return Err(Error::InvalidResource("read out of range".to_string()));
        }
        Ok(source.bytes[offset as usize..(offset + len) as usize].to_vec())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        let removed = self
            .buffers
            .remove(buffer)
            .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))?;
        self.allocator.free(removed.info.memory)
    }

    fn update_buffer<'a>(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &'a [u8],
        batch: Option<&mut BufferUpdateBatch<'a>>,
    ) -> Result<()> {
        upload::update_buffer(self, buffer, offset, data, batch)
    }

    fn end_update_buffer(&mut self, batch: BufferUpdateBatch<'_>) -> Result<()> {
        upload::end_update_buffer(self, batch)
    }

    fn update_image_2d<'a>(
        &mut self,
        image: ImageHandle,
        region: &ImageRegion,
        data: &'a [u8],
        batch: Option<&mut ImageUpdateBatch<'a>>,
    ) -> Result<()> {
        upload::update_image_2d(self, image, region, data, batch)
    }

    fn end_update_image(&mut self, batch: ImageUpdateBatch<'_>) -> Result<()> {
        upload::end_update_image(self, batch)
    }

    fn outstanding_allocations(&self) -> usize {
        self.allocator.outstanding_allocations()
    }

    fn create_image_2d(&mut self, desc: &Image2DDesc) -> Result<ImageHandle> {
        desc.validate()?;
        let texel = desc.format.size_bytes() as u64;
        let memory = self.allocator.allocate(&AllocationRequest {
            name: "image",
            usage: MemoryUsage::classify_image(desc.usage),
            size: desc.width as u64 * desc.height as u64 * texel.max(1),
            alignment: 256,
            memory_type_bits: u32::MAX,
            linear: false,
        })?;

        let aspect = image_aspect(desc.format, desc.usage);
        let info = ImageInfo {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            mip_levels: desc.mip_levels,
            samples: desc.samples,
            usage: desc.usage,
            aspect,
            memory: Some(memory),
        };
        let levels = (0..desc.mip_levels)
            .map(|level| {
                let (w, h) = info.mip_extent(level);
                vec![0; (w as u64 * h as u64 * texel) as usize]
            })
            .collect();

        let image = self.images.insert(MockImage {
            info,
            tracker: ImageLayoutTracker::new(desc.mip_levels),
            levels,
            origin_view: ImageViewHandle::default(),
        });
        let origin_view = self.views.insert(ImageViewInfo {
            image,
            base_mip: 0,
            mip_count: desc.mip_levels,
            format: desc.format,
            aspect,
        });
        if let Some(record) = self.images.get_mut(image) {
            record.origin_view = origin_view;
        }
        Ok(image)
    }

    fn image_info(&self, image: ImageHandle) -> Result<ImageInfo> {
        Ok(self.image(image)?.info)
    }

    fn image_origin_view(&self, image: ImageHandle) -> Result<ImageViewHandle> {
        Ok(self.image(image)?.origin_view)
    }

    fn image_layout(&self, image: ImageHandle, level: u32) -> Result<ImageLayoutState> {
        self.image(image)?
            .tracker
            .state(level)
            .ok_or_else(|| Error::InvalidResource(format!("mip level {} out of range", level)))
    }

    fn destroy_image(&mut self, image: ImageHandle) -> Result<()> {
        let removed = self
            .images
            .remove(image)
            .ok_or_else(|| Error::InvalidResource("stale image handle".to_string()))?;
        self.views.retain(|_, view| view.image != image);
        match removed.info.memory {
            Some(memory) => self.allocator.free(memory),
            None => Ok(()),
        }
    }

    fn create_image_view(
        &mut self,
        image: ImageHandle,
        base_mip: u32,
        mip_count: u32,
        format: Option<Format>,
    ) -> Result<ImageViewHandle> {
        let info = self.image(image)?.info;
        if mip_count == 0 || base_mip.saturating_add(mip_count) > info.mip_levels {
            return Err(Error::InvalidResource(format!(
                "mips {}..{} out of range ({} levels)",
                base_mip, base_mip.saturating_add(mip_count), info.mip_levels
            )));
        }
        Ok(self.views.insert(ImageViewInfo {
            image,
            base_mip,
            mip_count,
            format: format.unwrap_or(info.format),
            aspect: info.aspect,
        }))
    }

    fn image_view_info(&self, view: ImageViewHandle) -> Result<ImageViewInfo> {
        self.views
            .get(view)
            .copied()
            .ok_or_else(|| Error::InvalidResource("stale image view handle".to_string()))
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) -> Result<()> {
        self.views
            .remove(view)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("stale image view handle".to_string()))
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        Ok(self.samplers.insert(*desc))
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) -> Result<()> {
        self.samplers
            .remove(sampler)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("stale sampler handle".to_string()))
    }

    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<FrameBufferHandle> {
        let render_pass = self
            .render_passes
            .get(desc.render_pass)
            .ok_or_else(|| Error::InvalidResource("stale render pass handle".to_string()))?;
        if desc.attachments.len() != render_pass.attachments.len() {
            return Err(Error::InvalidResource(format!(
                "{} views for {} render pass attachments",
                desc.attachments.len(),
                render_pass.attachments.len()
            )));
        }
        if let Some(stale) = desc.attachments.iter().find(|view| !self.views.contains_key(**view)) {
            return Err(Error::InvalidResource(format!("stale image view {:?}", stale)));
        }
        let clear_values = desc.resolved_clear_values(&render_pass.attachments);
        Ok(self.frame_buffers.insert((desc.clone(), clear_values)))
    }

    fn frame_buffer_clear_value(&self, frame_buffer: FrameBufferHandle, attachment: usize) -> Result<ClearValue> {
        let (_, clear_values) = self
            .frame_buffers
            .get(frame_buffer)
            .ok_or_else(|| Error::InvalidResource("stale frame buffer handle".to_string()))?;
        clear_values
            .get(attachment)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("attachment {} out of range", attachment)))
    }

    fn set_frame_buffer_clear_value(
        &mut self,
        frame_buffer: FrameBufferHandle,
        attachment: usize,
        value: ClearValue,
    ) -> Result<()> {
        let (_, clear_values) = self
            .frame_buffers
            .get_mut(frame_buffer)
            .ok_or_else(|| Error::InvalidResource("stale frame buffer handle".to_string()))?;
        let slot = clear_values
            .get_mut(attachment)
            .ok_or_else(|| Error::InvalidResource(format!("attachment {} out of range", attachment)))?;
        *slot = value;
        Ok(())
    }

    fn destroy_frame_buffer(&mut self, frame_buffer: FrameBufferHandle) -> Result<()> {
        self.frame_buffers
            .remove(frame_buffer)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("stale frame buffer handle".to_string()))
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_gi_tests.rs"]
mod tests;
