//! Abstract parameters of the objects and operations of the driver.

pub mod buffer;
pub mod fence;
pub mod pipeline;
pub mod pixels;
pub mod render_target;
pub mod sampler;
pub mod stream;
pub mod swap_chain;
pub mod texture;

pub mod prelude {
    pub use super::buffer::{
        AttributeArray, AttributeFlags, BufferDescriptor, BufferUsage, ElementType, IndexBufferHandle,
        IndexFormat, PrimitiveType, RenderPrimitiveHandle, UniformBufferHandle, VertexAttribute,
        VertexBufferHandle, VertexBufferParams, MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_BUFFERS,
    };

    pub use super::fence::{FenceHandle, FenceStatus, FENCE_WAIT_FOR_EVER};

    pub use super::pipeline::{
        BlendFactor, BlendValue, Comparison, CullingMode, Equation, FrontFaceOrder, PipelineState,
        PolygonOffset, RasterState, RenderPassFlags, RenderPassParams, Viewport,
    };

    pub use super::pixels::{PixelBufferDescriptor, PixelDataFormat, PixelDataType};

    pub use super::render_target::{
        RenderTargetHandle, RenderTargetParams, TargetBufferFlags, TargetBufferInfo,
    };

    pub use super::sampler::{
        SamplerCompareMode, SamplerEntry, SamplerGroupDescriptor, SamplerGroupHandle,
        SamplerMagFilter, SamplerMinFilter, SamplerParams, SamplerWrapMode, MAX_SAMPLER_COUNT,
    };

    pub use super::stream::{NativeStream, StreamHandle, StreamType};

    pub use super::swap_chain::{NativeWindow, SwapChainFlags, SwapChainHandle};

    pub use super::texture::{
        FaceOffsets, SamplerType, TextureCompression, TextureCubemapFace, TextureFormat,
        TextureHandle, TextureParams, TextureUsage, MAX_TEXTURE_LEVELS,
    };
}
