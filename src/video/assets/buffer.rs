//! Vertex, index and uniform buffers, and the primitives assembled from them.

impl_handle!(VertexBufferHandle);
impl_handle!(IndexBufferHandle);
impl_handle!(UniformBufferHandle);
impl_handle!(RenderPrimitiveHandle);

/// Maximum number of vertex attributes of a vertex buffer.
pub const MAX_VERTEX_ATTRIBUTES: usize = 8;

/// Maximum number of native buffer objects of a vertex buffer.
pub const MAX_VERTEX_BUFFERS: usize = 8;

/// Hint abouts the intended update strategy of the data.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BufferUsage {
    /// The content is initialized once and used many times.
    Static,
    /// The content is updated infrequently.
    Dynamic,
    /// The content is rewritten every frame.
    Stream,
}

/// The type and number of components of a vertex attribute.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ElementType {
    Byte,
    Byte2,
    Byte3,
    Byte4,
    UByte,
    UByte2,
    UByte3,
    UByte4,
    Short,
    Short2,
    Short3,
    Short4,
    UShort,
    UShort2,
    UShort3,
    UShort4,
    Int,
    UInt,
    Float,
    Float2,
    Float3,
    Float4,
    Half,
    Half2,
    Half3,
    Half4,
}

impl ElementType {
    /// Returns the number of components.
    pub fn components(self) -> u8 {
        use self::ElementType::*;

        match self {
            Byte | UByte | Short | UShort | Int | UInt | Float | Half => 1,
            Byte2 | UByte2 | Short2 | UShort2 | Float2 | Half2 => 2,
            Byte3 | UByte3 | Short3 | UShort3 | Float3 | Half3 => 3,
            Byte4 | UByte4 | Short4 | UShort4 | Float4 | Half4 => 4,
        }
    }

    /// Returns the size in bytes of the whole element.
    pub fn size(self) -> u8 {
        use self::ElementType::*;

        let component = match self {
            Byte | Byte2 | Byte3 | Byte4 | UByte | UByte2 | UByte3 | UByte4 => 1,
            Short | Short2 | Short3 | Short4 | UShort | UShort2 | UShort3 | UShort4 | Half
            | Half2 | Half3 | Half4 => 2,
            Int | UInt | Float | Float2 | Float3 | Float4 => 4,
        };

        component * self.components()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttributeFlags: u8 {
        /// Fixed-point values are normalized into [0, 1] or [-1, 1].
        const NORMALIZED = 0x1;
        /// Values are passed to integer inputs of the vertex shader.
        const INTEGER_TARGET = 0x2;
    }
}

/// A vertex attribute sourced from one of the buffers of a vertex buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct VertexAttribute {
    pub offset: u32,
    pub stride: u8,
    /// Index of the native buffer, `VertexAttribute::NO_BUFFER` if the attribute is unused.
    pub buffer: u8,
    pub element: ElementType,
    pub flags: AttributeFlags,
}

impl VertexAttribute {
    pub const NO_BUFFER: u8 = 0xFF;

    pub fn new(buffer: u8, element: ElementType, offset: u32, stride: u8) -> Self {
        VertexAttribute {
            offset,
            stride,
            buffer,
            element,
            flags: AttributeFlags::empty(),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.buffer != VertexAttribute::NO_BUFFER
    }
}

impl Default for VertexAttribute {
    fn default() -> Self {
        VertexAttribute {
            offset: 0,
            stride: 0,
            buffer: VertexAttribute::NO_BUFFER,
            element: ElementType::Float4,
            flags: AttributeFlags::empty(),
        }
    }
}

pub type AttributeArray = [VertexAttribute; MAX_VERTEX_ATTRIBUTES];

/// The parameters of a vertex buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct VertexBufferParams {
    pub buffer_count: u8,
    pub vertex_count: u32,
    pub attributes: AttributeArray,
    pub usage: BufferUsage,
}

impl VertexBufferParams {
    /// Returns the size in bytes of the native buffer `index`.
    pub fn buffer_size(&self, index: u8) -> usize {
        self.attributes
            .iter()
            .filter(|v| v.buffer == index)
            .map(|v| {
                let stride = if v.stride == 0 {
                    u32::from(v.element.size())
                } else {
                    u32::from(v.stride)
                };

                (v.offset + stride * self.vertex_count) as usize
            })
            .max()
            .unwrap_or(0)
    }
}

/// The type of index elements.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn size(self) -> usize {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// How the vertices are assembled into primitives.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
}

/// A CPU-side blob to upload into a buffer at `offset`.
#[derive(Debug, Clone, Default)]
pub struct BufferDescriptor {
    pub data: Vec<u8>,
}

impl BufferDescriptor {
    pub fn new<T: Into<Vec<u8>>>(data: T) -> Self {
        BufferDescriptor { data: data.into() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn element_size() {
        assert_eq!(ElementType::Float3.size(), 12);
        assert_eq!(ElementType::UByte4.size(), 4);
        assert_eq!(ElementType::Half2.components(), 2);
    }

    #[test]
    fn buffer_size() {
        let mut attributes = [VertexAttribute::default(); MAX_VERTEX_ATTRIBUTES];
        attributes[0] = VertexAttribute::new(0, ElementType::Float3, 0, 20);
        attributes[1] = VertexAttribute::new(0, ElementType::Half2, 12, 20);
        attributes[2] = VertexAttribute::new(1, ElementType::UByte4, 0, 0);

        let params = VertexBufferParams {
            buffer_count: 2,
            vertex_count: 3,
            attributes,
            usage: BufferUsage::Static,
        };

        assert_eq!(params.buffer_size(0), 72);
        assert_eq!(params.buffer_size(1), 12);
        assert_eq!(params.buffer_size(2), 0);
    }
}
