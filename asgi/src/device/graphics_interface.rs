/// GraphicsInterface trait - the capability contract every backend implements,
/// plus the process-wide backend plugin registry

use std::path::Path;
use std::sync::Mutex;
use raw_window_handle::RawDisplayHandle;
use rustc_hash::FxHashMap;

use crate::config::{GiConfig, GiType};
use crate::device::{
    BufferHandle, BufferInfo, BufferUsageFlags, ClearValue, CommandBufferHandle,
    FrameBufferDesc, FrameBufferHandle, GraphicsPipelineDesc, Image2DDesc, ImageHandle,
    ImageInfo, ImageRegion, ImageViewHandle, ImageViewInfo, IndexType, PipelineHandle,
    PipelineLayoutDesc, Rect2D, RenderPassDesc, RenderPassHandle, SamplerDesc, SamplerHandle,
    ShaderModuleHandle, ShaderReflection, SwapchainDesc, SwapchainHandle, SwapchainInfo,
    Viewport,
};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::image_layout::ImageLayoutState;
use crate::upload::{BufferUpdateBatch, ImageUpdateBatch};
use crate::gi_error;

fn unsupported<T>(operation: &str) -> Result<T> {
    Err(Error::Unsupported(format!("{} is not provided by this backend", operation)))
}

/// Main graphics interface trait
///
/// Central factory for GPU resources. Resources are addressed by `Copy`
/// handles into backend arenas; a stale handle yields
/// [`Error::InvalidResource`]. Every call is synchronous and single-threaded:
/// an instance may move between threads but is never shared.
pub trait GraphicsInterface: Send {
    /// Backend kind
    fn gi_type(&self) -> GiType;

    /// Name of the selected physical device
    fn device_name(&self) -> &str;

    /// Whether command buffers may be recorded from several threads
    ///
    /// Always false for now; present so callers can query it.
    fn supports_parallel_command_buffers(&self) -> bool {
        false
    }

    // ===== SHADERS =====

    /// Load a shader module from its source path
    ///
    /// Bytecode is looked up next to the source (`<source>.<ext>`) and produced
    /// by the configured compiler when absent. The module is reflected at
    /// creation time.
    fn create_shader_module(&mut self, path: &Path) -> Result<ShaderModuleHandle>;

    /// Reflection data captured when the module was created
    fn shader_reflection(&self, module: ShaderModuleHandle) -> Result<&ShaderReflection>;

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) -> Result<()>;

    // ===== RENDER PASSES & PIPELINES =====

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassHandle>;

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) -> Result<()>;

    /// Create a graphics pipeline
    ///
    /// Fails with [`Error::InvalidStages`] without a vertex and a fragment
    /// stage. The binding layout is synthesized from the stages' reflection.
    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle>;

    /// Layout synthesized for the pipeline
    fn pipeline_layout(&self, pipeline: PipelineHandle) -> Result<&PipelineLayoutDesc>;

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()>;

    // ===== BUFFERS =====

    /// Create a buffer; memory is selected from `usage`
    fn create_buffer(&mut self, size: u64, usage: BufferUsageFlags) -> Result<BufferHandle>;

    /// Create a buffer sized for `data` and upload it
    ///
    /// The buffer is destroyed again when the upload fails.
    fn create_buffer_with_data(&mut self, usage: BufferUsageFlags, data: &[u8]) -> Result<BufferHandle> {
        let buffer = self.create_buffer(data.len() as u64, usage)?;
        if let Err(e) = self.update_buffer(buffer, 0, data, None) {
            if let Err(destroy) = self.destroy_buffer(buffer) {
                gi_error!("asgi::gi", "Failed to destroy buffer after a failed upload: {}", destroy);
            }
            return Err(e);
        }
        Ok(buffer)
    }

    fn buffer_info(&self, buffer: BufferHandle) -> Result<BufferInfo>;

    /// Copy `len` bytes out of a host-visible buffer
    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>>;

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()>;

    // ===== UPLOADS =====

    /// Start a buffer update batch
    fn begin_update_buffer<'a>(&self) -> BufferUpdateBatch<'a> {
        BufferUpdateBatch::new()
    }

    /// Write `data` at `offset`, directly or through staging
    ///
    /// See [`crate::upload::update_buffer`].
    fn update_buffer<'a>(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &'a [u8],
        batch: Option<&mut BufferUpdateBatch<'a>>,
    ) -> Result<()>;

    /// Submit a batch in one command buffer and wait for it
    fn end_update_buffer(&mut self, batch: BufferUpdateBatch<'_>) -> Result<()>;

    /// Start an image update batch
    fn begin_update_image<'a>(&self) -> ImageUpdateBatch<'a> {
        ImageUpdateBatch::new()
    }

    /// Upload tightly packed texels into a region of one mip level
    fn update_image_2d<'a>(
        &mut self,
        image: ImageHandle,
        region: &ImageRegion,
        data: &'a [u8],
        batch: Option<&mut ImageUpdateBatch<'a>>,
    ) -> Result<()>;

    fn end_update_image(&mut self, batch: ImageUpdateBatch<'_>) -> Result<()>;

    /// Number of live allocations in the allocator context
    fn outstanding_allocations(&self) -> usize;

    // ===== IMAGES =====

    /// Create a 2D image with its memory, layout tracker and origin view
    fn create_image_2d(&mut self, desc: &Image2DDesc) -> Result<ImageHandle>;

    fn image_info(&self, image: ImageHandle) -> Result<ImageInfo>;

    /// View over every mip level, created with the image
    fn image_origin_view(&self, image: ImageHandle) -> Result<ImageViewHandle>;

    /// Tracked layout state of one mip level
    fn image_layout(&self, image: ImageHandle, level: u32) -> Result<ImageLayoutState>;

    /// Destroy an image and every view created on it
    fn destroy_image(&mut self, image: ImageHandle) -> Result<()>;

    /// Create a view over `mip_count` levels starting at `base_mip`
    ///
    /// `format` reinterprets the image format when given.
    fn create_image_view(
        &mut self,
        image: ImageHandle,
        base_mip: u32,
        mip_count: u32,
        format: Option<Format>,
    ) -> Result<ImageViewHandle>;

    fn image_view_info(&self, view: ImageViewHandle) -> Result<ImageViewInfo>;

    /// Image the view was created on
    fn image_view_source(&self, view: ImageViewHandle) -> Result<ImageHandle> {
        Ok(self.image_view_info(view)?.image)
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) -> Result<()>;

    // ===== SAMPLERS =====

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle>;

    fn destroy_sampler(&mut self, sampler: SamplerHandle) -> Result<()>;

    // ===== FRAME BUFFERS =====

    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<FrameBufferHandle>;

    fn frame_buffer_clear_value(&self, frame_buffer: FrameBufferHandle, attachment: usize) -> Result<ClearValue>;

    fn set_frame_buffer_clear_value(
        &mut self,
        frame_buffer: FrameBufferHandle,
        attachment: usize,
        value: ClearValue,
    ) -> Result<()>;

    fn destroy_frame_buffer(&mut self, frame_buffer: FrameBufferHandle) -> Result<()>;

    // ===== SWAPCHAINS =====

    fn create_swapchain(&mut self, _desc: &SwapchainDesc) -> Result<SwapchainHandle> {
        unsupported("create_swapchain")
    }

    fn swapchain_info(&self, _swapchain: SwapchainHandle) -> Result<SwapchainInfo> {
        unsupported("swapchain_info")
    }

    /// Image record of color attachment `index`
    fn swapchain_color_attachment(&self, _swapchain: SwapchainHandle, _index: u32) -> Result<ImageHandle> {
        unsupported("swapchain_color_attachment")
    }

    /// Depth image paired with color attachment `index`, if the swapchain has one
    fn swapchain_depth_attachment(&self, _swapchain: SwapchainHandle, _index: u32) -> Result<Option<ImageHandle>> {
        unsupported("swapchain_depth_attachment")
    }

    /// Acquire the next presentable attachment and return its index
    fn acquire_next_attachment(&mut self, _swapchain: SwapchainHandle) -> Result<u32> {
        unsupported("acquire_next_attachment")
    }

    /// Present the attachment acquired last
    fn present(&mut self, _swapchain: SwapchainHandle) -> Result<()> {
        unsupported("present")
    }

    fn destroy_swapchain(&mut self, _swapchain: SwapchainHandle) -> Result<()> {
        unsupported("destroy_swapchain")
    }

    // ===== COMMAND BUFFERS =====

    fn create_command_buffer(&mut self) -> Result<CommandBufferHandle> {
        unsupported("create_command_buffer")
    }

    fn begin_command_buffer(&mut self, _cmd: CommandBufferHandle) -> Result<()> {
        unsupported("begin_command_buffer")
    }

    fn end_command_buffer(&mut self, _cmd: CommandBufferHandle) -> Result<()> {
        unsupported("end_command_buffer")
    }

    fn cmd_begin_render_pass(
        &mut self,
        _cmd: CommandBufferHandle,
        _render_pass: RenderPassHandle,
        _frame_buffer: FrameBufferHandle,
    ) -> Result<()> {
        unsupported("cmd_begin_render_pass")
    }

    fn cmd_end_render_pass(&mut self, _cmd: CommandBufferHandle) -> Result<()> {
        unsupported("cmd_end_render_pass")
    }

    fn cmd_bind_pipeline(&mut self, _cmd: CommandBufferHandle, _pipeline: PipelineHandle) -> Result<()> {
        unsupported("cmd_bind_pipeline")
    }

    fn cmd_set_viewport(&mut self, _cmd: CommandBufferHandle, _first: u32, _viewports: &[Viewport]) -> Result<()> {
        unsupported("cmd_set_viewport")
    }

    fn cmd_set_scissor(&mut self, _cmd: CommandBufferHandle, _first: u32, _scissors: &[Rect2D]) -> Result<()> {
        unsupported("cmd_set_scissor")
    }

    fn cmd_set_line_width(&mut self, _cmd: CommandBufferHandle, _width: f32) -> Result<()> {
        unsupported("cmd_set_line_width")
    }

    fn cmd_bind_vertex_buffer(
        &mut self,
        _cmd: CommandBufferHandle,
        _binding: u32,
        _buffer: BufferHandle,
        _offset: u64,
    ) -> Result<()> {
        unsupported("cmd_bind_vertex_buffer")
    }

    fn cmd_bind_index_buffer(
        &mut self,
        _cmd: CommandBufferHandle,
        _buffer: BufferHandle,
        _offset: u64,
        _index_type: IndexType,
    ) -> Result<()> {
        unsupported("cmd_bind_index_buffer")
    }

    fn cmd_draw(
        &mut self,
        _cmd: CommandBufferHandle,
        _vertex_count: u32,
        _instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) -> Result<()> {
        unsupported("cmd_draw")
    }

    fn cmd_draw_indexed(
        &mut self,
        _cmd: CommandBufferHandle,
        _index_count: u32,
        _instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) -> Result<()> {
        unsupported("cmd_draw_indexed")
    }

    /// Submit recorded command buffers
    ///
    /// Waits on the acquire semaphore of each swapchain in `wait_swapchains`;
    /// blocks until completion when `wait_finished` is set.
    fn submit_commands(
        &mut self,
        _cmds: &[CommandBufferHandle],
        _wait_swapchains: &[SwapchainHandle],
        _wait_finished: bool,
    ) -> Result<()> {
        unsupported("submit_commands")
    }

    fn destroy_command_buffer(&mut self, _cmd: CommandBufferHandle) -> Result<()> {
        unsupported("destroy_command_buffer")
    }

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;
}

// ===== PLUGIN REGISTRY =====

/// Backend factory function type
pub type GiPluginFactory =
    Box<dyn Fn(&GiConfig, Option<RawDisplayHandle>) -> Result<Box<dyn GraphicsInterface>> + Send + Sync>;

/// Plugin registry for backends
pub struct GiPluginRegistry {
    plugins: FxHashMap<&'static str, GiPluginFactory>,
}

impl GiPluginRegistry {
    fn new() -> Self {
        Self {
            plugins: FxHashMap::default(),
        }
    }

    /// Register a backend under `name`, replacing any previous factory
    pub fn register_plugin<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn(&GiConfig, Option<RawDisplayHandle>) -> Result<Box<dyn GraphicsInterface>> + Send + Sync + 'static,
    {
        self.plugins.insert(name, Box::new(factory));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Create a context with the plugin registered under `name`
    pub fn create_context(
        &self,
        name: &str,
        config: &GiConfig,
        display: Option<RawDisplayHandle>,
    ) -> Result<Box<dyn GraphicsInterface>> {
        self.plugins
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Backend plugin '{}' not registered", name)))?
            (config, display)
    }
}

static GI_REGISTRY: Mutex<Option<GiPluginRegistry>> = Mutex::new(None);

fn with_registry<T>(f: impl FnOnce(&mut GiPluginRegistry) -> T) -> T {
    // A panicking factory cannot leave the map half-written
    let mut guard = GI_REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(guard.get_or_insert_with(GiPluginRegistry::new))
}

/// Register a backend plugin in the global registry
pub fn register_backend<F>(name: &'static str, factory: F)
where
    F: Fn(&GiConfig, Option<RawDisplayHandle>) -> Result<Box<dyn GraphicsInterface>> + Send + Sync + 'static,
{
    with_registry(|registry| registry.register_plugin(name, factory));
}

/// Whether a backend is registered for `gi_type`
pub fn is_backend_registered(gi_type: GiType) -> bool {
    with_registry(|registry| registry.is_registered(gi_type.name()))
}

/// Create a graphics interface with the backend registered for `gi_type`
///
/// Fails with [`Error::NotFound`] when no such backend was registered.
pub fn create_context(
    gi_type: GiType,
    config: &GiConfig,
    display: Option<RawDisplayHandle>,
) -> Result<Box<dyn GraphicsInterface>> {
    with_registry(|registry| registry.create_context(gi_type.name(), config, display))
}

#[cfg(test)]
#[path = "graphics_interface_tests.rs"]
mod tests;
