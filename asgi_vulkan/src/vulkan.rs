/// VulkanGi - Vulkan implementation of the GraphicsInterface trait

use std::path::Path;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use slotmap::SlotMap;
use asgi::gi::device::{
    resolve_bytecode, BufferHandle, BufferInfo, BufferUsageFlags, ClearValue, CommandBufferHandle,
    FrameBufferDesc, FrameBufferHandle, GraphicsPipelineDesc, Image2DDesc, ImageAspectFlags, ImageHandle,
    ImageInfo, ImageRegion, ImageUsageFlags, ImageViewHandle, ImageViewInfo, IndexType, PipelineHandle,
    PipelineLayoutDesc, Rect2D, RenderPassDesc, RenderPassHandle, SampleCount, SamplerDesc, SamplerHandle,
    ShaderModuleHandle, ShaderReflection, SwapchainDesc, SwapchainHandle, SwapchainInfo, Viewport,
    validate_stage_reflection,
};
use asgi::gi::device::Format;
use asgi::gi::memory::{MemoryAllocator, MemoryUsage};
use asgi::gi::upload::{self, BufferUpdateBatch, ImageLayoutState, ImageUpdateBatch};
use asgi::gi::{Error, GiConfig, GiType, GraphicsInterface, Result};
use asgi::{gi_bail_warn, gi_debug, gi_err, gi_error, gi_info, gi_trace};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_buffer::{CommandBuffer, SubmitFence};
use crate::vulkan_context::GpuContext;
use crate::vulkan_frame_buffer::FrameBuffer;
use crate::vulkan_image::{Image, ImageView};
use crate::vulkan_memory::VulkanMemoryAllocator;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_sampler::create_sampler;
use crate::vulkan_shader::{GlslangCompiler, ShaderModule};
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_upload::UploadContext;

fn stale(kind: &str) -> Error {
    Error::InvalidResource(format!("stale {} handle", kind))
}

/// Vulkan graphics interface
///
/// Owns the device, the allocator context and one arena per resource kind.
/// Dropping it waits for the GPU and destroys everything still alive.
pub struct VulkanGi {
    pub(crate) ctx: GpuContext,
    pub(crate) allocator: VulkanMemoryAllocator,
    pub(crate) upload: UploadContext,
    compiler: GlslangCompiler,
    bytecode_extension: String,
    /// Fence of the last `submit_commands`
    submit_fence: SubmitFence,

    pub(crate) buffers: SlotMap<BufferHandle, Buffer>,
    pub(crate) images: SlotMap<ImageHandle, Image>,
    views: SlotMap<ImageViewHandle, ImageView>,
    samplers: SlotMap<SamplerHandle, vk::Sampler>,
    shaders: SlotMap<ShaderModuleHandle, ShaderModule>,
    pipelines: SlotMap<PipelineHandle, Pipeline>,
    render_passes: SlotMap<RenderPassHandle, RenderPass>,
    frame_buffers: SlotMap<FrameBufferHandle, FrameBuffer>,
    swapchains: SlotMap<SwapchainHandle, Swapchain>,
    command_buffers: SlotMap<CommandBufferHandle, CommandBuffer>,
}

impl VulkanGi {
    /// Initialize instance, device, allocator and upload context
    ///
    /// Pass the display handle of the windowing system to enable swapchains;
    /// `None` creates a headless context.
    pub fn new(config: &GiConfig, display: Option<RawDisplayHandle>) -> Result<Self> {
        let mut ctx = GpuContext::new(config, display)?;

        let mut allocator = match VulkanMemoryAllocator::new(&ctx) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { ctx.destroy() };
                return Err(e);
            }
        };

        let mut upload = match UploadContext::new(&ctx.device, ctx.graphics_queue_family) {
            Ok(upload) => upload,
            Err(e) => {
                allocator.shutdown();
                unsafe { ctx.destroy() };
                return Err(e);
            }
        };

        let submit_fence = match SubmitFence::new(&ctx.device) {
            Ok(fence) => fence,
            Err(e) => {
                upload.destroy(&ctx.device);
                allocator.shutdown();
                unsafe { ctx.destroy() };
                return Err(Error::InitializationFailed(e.to_string()));
            }
        };

        let compiler = GlslangCompiler::new(&config.shader_compiler);
        gi_info!("asgi::vulkan", "Vulkan context ready on '{}' (shader compiler: {})",
            ctx.device_name, compiler.compiler_path().display());

        Ok(Self {
            ctx,
            allocator,
            upload,
            compiler,
            bytecode_extension: config.shader_compiler.bytecode_extension.clone(),
            submit_fence,
            buffers: SlotMap::with_key(),
            images: SlotMap::with_key(),
            views: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            render_passes: SlotMap::with_key(),
            frame_buffers: SlotMap::with_key(),
            swapchains: SlotMap::with_key(),
            command_buffers: SlotMap::with_key(),
        })
    }

    pub(crate) fn buffer(&self, buffer: BufferHandle) -> Result<&Buffer> {
        self.buffers.get(buffer).ok_or_else(|| stale("buffer"))
    }

    pub(crate) fn image(&self, image: ImageHandle) -> Result<&Image> {
        self.images.get(image).ok_or_else(|| stale("image"))
    }

    fn render_pass(&self, render_pass: RenderPassHandle) -> Result<&RenderPass> {
        self.render_passes.get(render_pass).ok_or_else(|| stale("render pass"))
    }

    fn swapchain(&self, swapchain: SwapchainHandle) -> Result<&Swapchain> {
        self.swapchains.get(swapchain).ok_or_else(|| stale("swapchain"))
    }

    /// Insert an image record and create its origin view over every mip level
    fn register_image(&mut self, image: Image) -> Result<ImageHandle> {
        let native = image.image;
        let info = image.info;
        let handle = self.images.insert(image);

        let view_info = ImageViewInfo {
            image: handle,
            base_mip: 0,
            mip_count: info.mip_levels,
            format: info.format,
            aspect: info.aspect,
        };
        let view = match ImageView::new(&self.ctx.device, native, view_info) {
            Ok(view) => view,
            Err(e) => {
                if let Some(record) = self.images.remove(handle) {
                    if let Err(destroy) = record.destroy(&self.ctx.device, &mut self.allocator) {
                        gi_error!("asgi::vulkan", "Failed to destroy image without a view: {}", destroy);
                    }
                }
                return Err(e);
            }
        };
        let origin_view = self.views.insert(view);
        if let Some(record) = self.images.get_mut(handle) {
            record.origin_view = origin_view;
        }
        Ok(handle)
    }

    /// Destroy every view created on `image`
    fn destroy_views_of(&mut self, image: ImageHandle) {
        let keys: Vec<ImageViewHandle> = self
            .views
            .iter()
            .filter(|(_, view)| view.info.image == image)
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            if let Some(view) = self.views.remove(key) {
                view.destroy(&self.ctx.device);
            }
        }
    }

    /// Remove an image record, its views and its memory
    fn release_image(&mut self, image: ImageHandle) -> Result<()> {
        let record = self.images.remove(image).ok_or_else(|| stale("image"))?;
        self.destroy_views_of(image);
        record.destroy(&self.ctx.device, &mut self.allocator)
    }

    /// Remove the image records of a swapchain, then the swapchain itself
    fn release_swapchain(&mut self, swapchain: Swapchain) {
        for &image in swapchain.color_images.iter().chain(&swapchain.depth_images) {
            if let Err(e) = self.release_image(image) {
                gi_error!("asgi::vulkan", "Failed to release swapchain image: {}", e);
            }
        }
        swapchain.destroy(&self.ctx.device);
    }

    fn wait_submit_fence(&mut self) -> Result<()> {
        self.submit_fence.wait(&self.ctx.device)
    }

    fn restore_submit_semaphores(&mut self, taken: &[SwapchainHandle]) {
        for &handle in taken {
            if let Some(swapchain) = self.swapchains.get_mut(handle) {
                swapchain.restore_submit_semaphores();
            }
        }
    }

    fn register_swapchain_images(&mut self, swapchain: &mut Swapchain) -> Result<()> {
        let color_info = ImageInfo {
            width: swapchain.extent.width,
            height: swapchain.extent.height,
            format: swapchain.format,
            mip_levels: 1,
            samples: SampleCount::S1,
            usage: ImageUsageFlags::COLOR_ATTACHMENT,
            aspect: ImageAspectFlags::COLOR,
            memory: None,
        };
        for &native in &swapchain.native_images {
            let handle = self.register_image(Image::borrowed(native, color_info))?;
            swapchain.color_images.push(handle);
        }

        if let Some(depth_format) = swapchain.depth_format {
            let desc = Image2DDesc {
                width: swapchain.extent.width,
                height: swapchain.extent.height,
                format: depth_format,
                mip_levels: 1,
                samples: SampleCount::S1,
                usage: ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            };
            for _ in 0..swapchain.native_images.len() {
                let handle = self.create_image_2d(&desc)?;
                swapchain.depth_images.push(handle);
            }
        }
        Ok(())
    }
}

impl GraphicsInterface for VulkanGi {
    fn gi_type(&self) -> GiType {
        GiType::Vulkan
    }

    fn device_name(&self) -> &str {
        &self.ctx.device_name
    }

    // ===== SHADERS =====

    fn create_shader_module(&mut self, path: &Path) -> Result<ShaderModuleHandle> {
        let bytecode = resolve_bytecode(path, &self.bytecode_extension, &self.compiler)?;
        let module = ShaderModule::load(&self.ctx.device, &bytecode)?;
        Ok(self.shaders.insert(module))
    }

    fn shader_reflection(&self, module: ShaderModuleHandle) -> Result<&ShaderReflection> {
        self.shaders
            .get(module)
            .map(|module| &module.reflection)
            .ok_or_else(|| stale("shader module"))
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) -> Result<()> {
        let module = self.shaders.remove(module).ok_or_else(|| stale("shader module"))?;
        module.destroy(&self.ctx.device);
        Ok(())
    }

    // ===== RENDER PASSES & PIPELINES =====

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        let render_pass = RenderPass::new(&self.ctx.device, desc)?;
        Ok(self.render_passes.insert(render_pass))
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) -> Result<()> {
        let render_pass = self.render_passes.remove(render_pass).ok_or_else(|| stale("render pass"))?;
        render_pass.destroy(&self.ctx.device);
        Ok(())
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        desc.validate_stages()?;
        let render_pass = self.render_pass(desc.render_pass)?;

        let mut stages = Vec::new();
        for (stage, handle) in desc.stages.active() {
            let module = self.shaders.get(handle).ok_or_else(|| stale("shader module"))?;
            validate_stage_reflection(stage, &module.reflection)?;
            stages.push((stage, module));
        }

        let pipeline = Pipeline::new(&self.ctx.device, desc, render_pass, &stages)?;
        Ok(self.pipelines.insert(pipeline))
    }

    fn pipeline_layout(&self, pipeline: PipelineHandle) -> Result<&PipelineLayoutDesc> {
        self.pipelines
            .get(pipeline)
            .map(|pipeline| &pipeline.layout_desc)
            .ok_or_else(|| stale("pipeline"))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        let pipeline = self.pipelines.remove(pipeline).ok_or_else(|| stale("pipeline"))?;
        pipeline.destroy(&self.ctx.device);
        Ok(())
    }

    // ===== BUFFERS =====

    fn create_buffer(&mut self, size: u64, usage: BufferUsageFlags) -> Result<BufferHandle> {
        if size == 0 {
            gi_bail_warn!("asgi::vulkan", "Cannot create a zero-sized buffer");
        }
        let memory_usage = MemoryUsage::classify_buffer(usage);
        let buffer = Buffer::new(&self.ctx.device, &mut self.allocator, "buffer", size, usage, memory_usage)?;
        gi_trace!("asgi::vulkan", "Created {} byte buffer in {:?} memory", size, memory_usage);
        Ok(self.buffers.insert(buffer))
    }

    fn buffer_info(&self, buffer: BufferHandle) -> Result<BufferInfo> {
        Ok(self.buffer(buffer)?.info)
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>> {
        let source = self.buffer(buffer)?;
        if !source.info.memory.host_visible {
            gi_bail_warn!("asgi::vulkan", "Buffer is not host-visible");
        }
        if !source.info.contains_range(offset, len) {
            gi_bail_warn!("asgi::vulkan",
                "Read of {} bytes at offset {} exceeds buffer size {}", len, offset, source.info.size);
        }
        self.allocator.read_mapped(&source.allocation, offset, len)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        let buffer = self.buffers.remove(buffer).ok_or_else(|| stale("buffer"))?;
        buffer.destroy(&self.ctx.device, &mut self.allocator)
    }

    // ===== UPLOADS =====

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

    // ===== IMAGES =====

    fn create_image_2d(&mut self, desc: &Image2DDesc) -> Result<ImageHandle> {
        let image = Image::new(&self.ctx.device, &mut self.allocator, desc)?;
        let handle = self.register_image(image)?;
        gi_trace!("asgi::vulkan", "Created {}x{} {:?} image with {} mip level(s)",
            desc.width, desc.height, desc.format, desc.mip_levels);
        Ok(handle)
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
        if self.image(image)?.allocation.is_none() {
            gi_bail_warn!("asgi::vulkan", "Image is owned by a swapchain");
        }
        self.release_image(image)
    }

    fn create_image_view(
        &mut self,
        image: ImageHandle,
        base_mip: u32,
        mip_count: u32,
        format: Option<Format>,
    ) -> Result<ImageViewHandle> {
        let record = self.image(image)?;
        let levels = record.info.mip_levels;
        if mip_count == 0 || base_mip.saturating_add(mip_count) > levels {
            gi_bail_warn!("asgi::vulkan",
                "View of mips {}..{} out of range ({} levels)", base_mip, base_mip.saturating_add(mip_count), levels);
        }
        let info = ImageViewInfo {
            image,
            base_mip,
            mip_count,
            format: format.unwrap_or(record.info.format),
            aspect: record.info.aspect,
        };
        let view = ImageView::new(&self.ctx.device, record.image, info)?;
        Ok(self.views.insert(view))
    }

    fn image_view_info(&self, view: ImageViewHandle) -> Result<ImageViewInfo> {
        self.views
            .get(view)
            .map(|view| view.info)
            .ok_or_else(|| stale("image view"))
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) -> Result<()> {
        let view = self.views.remove(view).ok_or_else(|| stale("image view"))?;
        view.destroy(&self.ctx.device);
        Ok(())
    }

    // ===== SAMPLERS =====

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let sampler = create_sampler(&self.ctx.device, desc, self.ctx.max_sampler_anisotropy)?;
        Ok(self.samplers.insert(sampler))
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) -> Result<()> {
        let sampler = self.samplers.remove(sampler).ok_or_else(|| stale("sampler"))?;
        unsafe {
            self.ctx.device.destroy_sampler(sampler, None);
        }
        Ok(())
    }

    // ===== FRAME BUFFERS =====

    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<FrameBufferHandle> {
        let render_pass = self.render_pass(desc.render_pass)?;
        if desc.attachments.len() != render_pass.desc.attachments.len() {
            gi_bail_warn!("asgi::vulkan",
                "{} views for {} render pass attachments", desc.attachments.len(), render_pass.desc.attachments.len());
        }
        let mut views = Vec::with_capacity(desc.attachments.len());
        for &attachment in &desc.attachments {
            let view = self.views.get(attachment).ok_or_else(|| stale("image view"))?;
            views.push(view.view);
        }
        let clear_values = desc.resolved_clear_values(&render_pass.desc.attachments);
        let frame_buffer = FrameBuffer::new(&self.ctx.device, render_pass.render_pass, &views, desc, clear_values)?;
        Ok(self.frame_buffers.insert(frame_buffer))
    }

    fn frame_buffer_clear_value(&self, frame_buffer: FrameBufferHandle, attachment: usize) -> Result<ClearValue> {
        let frame_buffer = self.frame_buffers.get(frame_buffer).ok_or_else(|| stale("frame buffer"))?;
        frame_buffer
            .clear_values
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
        let frame_buffer = self.frame_buffers.get_mut(frame_buffer).ok_or_else(|| stale("frame buffer"))?;
        let slot = frame_buffer
            .clear_values
            .get_mut(attachment)
            .ok_or_else(|| Error::InvalidResource(format!("attachment {} out of range", attachment)))?;
        *slot = value;
        Ok(())
    }

    fn destroy_frame_buffer(&mut self, frame_buffer: FrameBufferHandle) -> Result<()> {
        let frame_buffer = self.frame_buffers.remove(frame_buffer).ok_or_else(|| stale("frame buffer"))?;
        frame_buffer.destroy(&self.ctx.device);
        Ok(())
    }

    // ===== SWAPCHAINS =====

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainHandle> {
        let mut swapchain = Swapchain::new(&self.ctx, desc)?;
        if let Err(e) = self.register_swapchain_images(&mut swapchain) {
            self.release_swapchain(swapchain);
            return Err(e);
        }
        Ok(self.swapchains.insert(swapchain))
    }

    fn swapchain_info(&self, swapchain: SwapchainHandle) -> Result<SwapchainInfo> {
        Ok(self.swapchain(swapchain)?.info())
    }

    fn swapchain_color_attachment(&self, swapchain: SwapchainHandle, index: u32) -> Result<ImageHandle> {
        self.swapchain(swapchain)?
            .color_images
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("swapchain attachment {} out of range", index)))
    }

    fn swapchain_depth_attachment(&self, swapchain: SwapchainHandle, index: u32) -> Result<Option<ImageHandle>> {
        let swapchain = self.swapchain(swapchain)?;
        if index as usize >= swapchain.color_images.len() {
            gi_bail_warn!("asgi::vulkan", "Swapchain attachment {} out of range", index);
        }
        Ok(swapchain.depth_images.get(index as usize).copied())
    }

    fn acquire_next_attachment(&mut self, swapchain: SwapchainHandle) -> Result<u32> {
        // The acquire semaphore is reused: the submission waiting on it must be done
        self.wait_submit_fence()?;
        let swapchain = self.swapchains.get_mut(swapchain).ok_or_else(|| stale("swapchain"))?;
        swapchain.acquire()
    }

    fn present(&mut self, swapchain: SwapchainHandle) -> Result<()> {
        let queue = self.ctx.graphics_queue;
        let swapchain = self.swapchains.get_mut(swapchain).ok_or_else(|| stale("swapchain"))?;
        let index = swapchain.present(queue)?;
        let image = swapchain.color_images[index as usize];
        if let Some(record) = self.images.get_mut(image) {
            record.tracker.transition(0, ImageLayoutState::Present);
        }
        Ok(())
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) -> Result<()> {
        let swapchain = self.swapchains.remove(swapchain).ok_or_else(|| stale("swapchain"))?;
        self.wait_idle()?;
        self.release_swapchain(swapchain);
        Ok(())
    }

    // ===== COMMAND BUFFERS =====

    fn create_command_buffer(&mut self) -> Result<CommandBufferHandle> {
        let command_buffer = CommandBuffer::new(&self.ctx.device, self.ctx.graphics_queue_family)?;
        Ok(self.command_buffers.insert(command_buffer))
    }

    fn begin_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<()> {
        // Resetting a buffer the GPU may still execute is invalid
        self.wait_submit_fence()?;
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.begin(&self.ctx.device)
    }

    fn end_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<()> {
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.end(&self.ctx.device)
    }

    fn cmd_begin_render_pass(
        &mut self,
        cmd: CommandBufferHandle,
        render_pass: RenderPassHandle,
        frame_buffer: FrameBufferHandle,
    ) -> Result<()> {
        let native_pass = self.render_pass(render_pass)?.render_pass;
        let frame_buffer = self.frame_buffers.get(frame_buffer).ok_or_else(|| stale("frame buffer"))?;
        let extent = vk::Extent2D {
            width: frame_buffer.desc.width,
            height: frame_buffer.desc.height,
        };
        let clear_values = frame_buffer.native_clear_values();
        let framebuffer = frame_buffer.framebuffer;

        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.begin_render_pass(&self.ctx.device, native_pass, framebuffer, extent, &clear_values)
    }

    fn cmd_end_render_pass(&mut self, cmd: CommandBufferHandle) -> Result<()> {
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.end_render_pass(&self.ctx.device)
    }

    fn cmd_bind_pipeline(&mut self, cmd: CommandBufferHandle, pipeline: PipelineHandle) -> Result<()> {
        let native = self.pipelines.get(pipeline).ok_or_else(|| stale("pipeline"))?.pipeline;
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.bind_pipeline(&self.ctx.device, native)
    }

    fn cmd_set_viewport(&mut self, cmd: CommandBufferHandle, first: u32, viewports: &[Viewport]) -> Result<()> {
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.set_viewport(&self.ctx.device, first, viewports)
    }

    fn cmd_set_scissor(&mut self, cmd: CommandBufferHandle, first: u32, scissors: &[Rect2D]) -> Result<()> {
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.set_scissor(&self.ctx.device, first, scissors)
    }

    fn cmd_set_line_width(&mut self, cmd: CommandBufferHandle, width: f32) -> Result<()> {
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.set_line_width(&self.ctx.device, width)
    }

    fn cmd_bind_vertex_buffer(
        &mut self,
        cmd: CommandBufferHandle,
        binding: u32,
        buffer: BufferHandle,
        offset: u64,
    ) -> Result<()> {
        let native = self.buffer(buffer)?.buffer;
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.bind_vertex_buffer(&self.ctx.device, binding, native, offset)
    }

    fn cmd_bind_index_buffer(
        &mut self,
        cmd: CommandBufferHandle,
        buffer: BufferHandle,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()> {
        let native = self.buffer(buffer)?.buffer;
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.bind_index_buffer(&self.ctx.device, native, offset, index_type)
    }

    fn cmd_draw(
        &mut self,
        cmd: CommandBufferHandle,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.draw(&self.ctx.device, vertex_count, instance_count, first_vertex, first_instance)
    }

    fn cmd_draw_indexed(
        &mut self,
        cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        let command_buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| stale("command buffer"))?;
        command_buffer.draw_indexed(
            &self.ctx.device,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        )
    }

    fn submit_commands(
        &mut self,
        cmds: &[CommandBufferHandle],
        wait_swapchains: &[SwapchainHandle],
        wait_finished: bool,
    ) -> Result<()> {
        let mut command_buffers = Vec::with_capacity(cmds.len());
        for &cmd in cmds {
            let command_buffer = self.command_buffers.get(cmd).ok_or_else(|| stale("command buffer"))?;
            if !command_buffer.executable {
                gi_bail_warn!("asgi::vulkan", "Command buffer submitted before being ended");
            }
            command_buffers.push(command_buffer.command_buffer);
        }
        for &swapchain in wait_swapchains {
            if !self.swapchain(swapchain)?.frame.ready_for_submit() {
                gi_bail_warn!("asgi::vulkan", "Submission waits on a swapchain without a freshly acquired attachment");
            }
        }

        let fence = self.submit_fence.reset(&self.ctx.device)?;

        let mut taken = Vec::with_capacity(wait_swapchains.len());
        let mut wait_semaphores = Vec::with_capacity(wait_swapchains.len());
        let mut signal_semaphores = Vec::with_capacity(wait_swapchains.len());
        for &handle in wait_swapchains {
            let semaphores = self.swapchains.get_mut(handle).and_then(|swapchain| swapchain.take_submit_semaphores());
            match semaphores {
                Some((wait, signal)) => {
                    taken.push(handle);
                    wait_semaphores.push(wait);
                    signal_semaphores.push(signal);
                }
                None => {
                    self.restore_submit_semaphores(&taken);
                    gi_bail_warn!("asgi::vulkan", "Swapchain attachment waited on twice in one submission");
                }
            }
        }
        let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let submitted = unsafe { self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], fence) };
        if let Err(e) = submitted {
            self.restore_submit_semaphores(&taken);
            return Err(gi_err!("asgi::vulkan", "Failed to submit commands to GPU queue: {:?}", e));
        }
        self.submit_fence.submitted();
        gi_trace!("asgi::vulkan", "Submitted {} command buffer(s), {} swapchain wait(s)",
            command_buffers.len(), wait_semaphores.len());

        if wait_finished {
            self.wait_submit_fence()?;
        }
        Ok(())
    }

    fn destroy_command_buffer(&mut self, cmd: CommandBufferHandle) -> Result<()> {
        if !self.command_buffers.contains_key(cmd) {
            return Err(stale("command buffer"));
        }
        self.wait_submit_fence()?;
        if let Some(command_buffer) = self.command_buffers.remove(cmd) {
            command_buffer.destroy(&self.ctx.device);
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| gi_err!("asgi::vulkan", "Failed to wait idle: {:?}", e))
        }
    }
}

impl Drop for VulkanGi {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to finish
            self.ctx.device.device_wait_idle().ok();
        }

        // 1. Objects referencing other resources first
        for (_, command_buffer) in self.command_buffers.drain() {
            command_buffer.destroy(&self.ctx.device);
        }
        for (_, frame_buffer) in self.frame_buffers.drain() {
            frame_buffer.destroy(&self.ctx.device);
        }
        for (_, pipeline) in self.pipelines.drain() {
            pipeline.destroy(&self.ctx.device);
        }
        for (_, render_pass) in self.render_passes.drain() {
            render_pass.destroy(&self.ctx.device);
        }
        for (_, module) in self.shaders.drain() {
            module.destroy(&self.ctx.device);
        }
        for (_, sampler) in self.samplers.drain() {
            unsafe {
                self.ctx.device.destroy_sampler(sampler, None);
            }
        }

        // 2. Swapchains with their image records, then the remaining images and buffers
        let swapchains: Vec<Swapchain> = self.swapchains.drain().map(|(_, swapchain)| swapchain).collect();
        for swapchain in swapchains {
            self.release_swapchain(swapchain);
        }
        for (_, view) in self.views.drain() {
            view.destroy(&self.ctx.device);
        }
        let images: Vec<Image> = self.images.drain().map(|(_, image)| image).collect();
        for image in images {
            if let Err(e) = image.destroy(&self.ctx.device, &mut self.allocator) {
                gi_error!("asgi::vulkan", "Failed to release image memory: {}", e);
            }
        }
        let buffers: Vec<Buffer> = self.buffers.drain().map(|(_, buffer)| buffer).collect();
        for buffer in buffers {
            if let Err(e) = buffer.destroy(&self.ctx.device, &mut self.allocator) {
                gi_error!("asgi::vulkan", "Failed to release buffer memory: {}", e);
            }
        }

        // 3. Backend-owned synchronization and the upload context
        self.upload.destroy(&self.ctx.device);
        self.submit_fence.destroy(&self.ctx.device);

        // 4. Free memory blocks BEFORE destroying the device
        self.allocator.shutdown();

        // 5. Device, debug messenger and instance
        gi_debug!("asgi::vulkan", "Destroying Vulkan context on '{}'", self.ctx.device_name);
        unsafe {
            self.ctx.destroy();
        }
    }
}
