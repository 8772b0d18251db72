impl_handle!(SwapChainHandle);

/// An opaque native window supplied by the caller.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct NativeWindow(pub u64);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SwapChainFlags: u32 {
        /// The surface has an alpha channel that is composited with the window system.
        const TRANSPARENT = 0x1;
        /// The content of the surface could be read back.
        const READABLE = 0x2;
    }
}

impl Default for SwapChainFlags {
    fn default() -> Self {
        SwapChainFlags::empty()
    }
}
