/// Device module - resource descriptors, handles and the backend trait

// Module declarations
pub mod handle;
pub mod buffer;
pub mod image;
pub mod shader;
pub mod pipeline;
pub mod pipeline_layout;
pub mod sampler;
pub mod render_pass;
pub mod frame_buffer;
pub mod swapchain;
pub mod command;
pub mod graphics_interface;

// Re-export everything
pub use handle::*;
pub use buffer::*;
pub use image::*;
pub use shader::*;
pub use pipeline::*;
pub use pipeline_layout::*;
pub use sampler::*;
pub use render_pass::*;
pub use frame_buffer::*;
pub use swapchain::*;
pub use command::*;
pub use graphics_interface::*;

// Mock backend for tests (no GPU required)
#[cfg(test)]
pub mod mock_gi;
