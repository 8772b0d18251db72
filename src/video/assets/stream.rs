//! Streams of external images (camera or video frames) that feed textures.

impl_handle!(StreamHandle);

/// An opaque platform stream object (e.g. a `SurfaceTexture`) supplied by the caller.
/// Streams created from one are "native", the platform updates the consuming texture
/// directly.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct NativeStream(pub u64);

/// How the images of a stream reach the consuming texture.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum StreamType {
    /// The platform binds its images to the texture directly.
    Native,
    /// The images are copied into a ring of textures on the producer thread.
    Software,
}
