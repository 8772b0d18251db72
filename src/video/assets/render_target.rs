//! Render targets, the framebuffers draws are rendered into.

use super::texture::TextureHandle;

impl_handle!(RenderTargetHandle);

bitflags! {
    /// Selects the buffers of a render target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TargetBufferFlags: u8 {
        const COLOR = 0x1;
        const DEPTH = 0x2;
        const STENCIL = 0x4;
        const COLOR_AND_DEPTH = Self::COLOR.bits() | Self::DEPTH.bits();
        const DEPTH_AND_STENCIL = Self::DEPTH.bits() | Self::STENCIL.bits();
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

impl Default for TargetBufferFlags {
    fn default() -> Self {
        TargetBufferFlags::empty()
    }
}

/// Describes one attachment of a render target. A nil `handle` makes the driver back
/// the attachment with a renderbuffer it owns.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct TargetBufferInfo {
    pub handle: TextureHandle,
    /// The mipmap level to render into.
    pub level: u8,
    /// The cubemap face or the layer of array/3D textures.
    pub layer: u16,
}

impl TargetBufferInfo {
    pub fn new(handle: TextureHandle) -> Self {
        TargetBufferInfo {
            handle,
            level: 0,
            layer: 0,
        }
    }
}

/// The parameters of a render target.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RenderTargetParams {
    pub targets: TargetBufferFlags,
    pub width: u32,
    pub height: u32,
    pub samples: u8,
    pub color: TargetBufferInfo,
    pub depth: TargetBufferInfo,
    pub stencil: TargetBufferInfo,
}

impl Default for RenderTargetParams {
    fn default() -> Self {
        RenderTargetParams {
            targets: TargetBufferFlags::COLOR,
            width: 0,
            height: 0,
            samples: 1,
            color: TargetBufferInfo::default(),
            depth: TargetBufferInfo::default(),
            stencil: TargetBufferInfo::default(),
        }
    }
}
