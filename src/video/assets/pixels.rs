//! Client-side pixel buffers used for texture uploads and readbacks.

use super::texture::TextureFormat;

/// The channels of client pixel data.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PixelDataFormat {
    R,
    RInteger,
    RG,
    RGInteger,
    RGB,
    RGBInteger,
    RGBA,
    RGBAInteger,
    DepthComponent,
    DepthStencil,
    Alpha,
}

impl PixelDataFormat {
    pub fn components(self) -> usize {
        match self {
            PixelDataFormat::R
            | PixelDataFormat::RInteger
            | PixelDataFormat::DepthComponent
            | PixelDataFormat::Alpha => 1,
            PixelDataFormat::RG | PixelDataFormat::RGInteger | PixelDataFormat::DepthStencil => 2,
            PixelDataFormat::RGB | PixelDataFormat::RGBInteger => 3,
            PixelDataFormat::RGBA | PixelDataFormat::RGBAInteger => 4,
        }
    }
}

/// The type of each component of client pixel data.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PixelDataType {
    UByte,
    Byte,
    UShort,
    Short,
    UInt,
    Int,
    Half,
    Float,
    /// Packed 5-6-5, the format must be RGB.
    UShort565,
    /// Packed 11-11-10 floats, the format must be RGB.
    UInt10F11F11FRev,
}

/// A pixel buffer, with the placement of the image inside it.
///
/// The described image starts at `(left, top)` inside a buffer whose rows are `stride`
/// pixels long (0 means the image width), each row aligned to `alignment` bytes.
#[derive(Debug, Clone)]
pub struct PixelBufferDescriptor {
    pub buffer: Vec<u8>,
    pub format: PixelDataFormat,
    pub ty: PixelDataType,
    /// Compressed data is uploaded as is, with this format.
    pub compressed: Option<TextureFormat>,
    pub alignment: u8,
    pub left: u32,
    pub top: u32,
    pub stride: u32,
}

impl PixelBufferDescriptor {
    pub fn new<T: Into<Vec<u8>>>(buffer: T, format: PixelDataFormat, ty: PixelDataType) -> Self {
        PixelBufferDescriptor {
            buffer: buffer.into(),
            format,
            ty,
            compressed: None,
            alignment: 1,
            left: 0,
            top: 0,
            stride: 0,
        }
    }

    /// Creates a descriptor of compressed data.
    pub fn compressed<T: Into<Vec<u8>>>(buffer: T, format: TextureFormat) -> Self {
        let mut desc = PixelBufferDescriptor::new(buffer, PixelDataFormat::RGBA, PixelDataType::UByte);
        desc.compressed = Some(format);
        desc
    }

    /// Returns the size in bytes of a pixel.
    pub fn pixel_size(format: PixelDataFormat, ty: PixelDataType) -> usize {
        let component = match ty {
            PixelDataType::UByte | PixelDataType::Byte => 1,
            PixelDataType::UShort | PixelDataType::Short | PixelDataType::Half => 2,
            PixelDataType::UInt | PixelDataType::Int | PixelDataType::Float => 4,
            PixelDataType::UShort565 => return 2,
            PixelDataType::UInt10F11F11FRev => return 4,
        };

        component * format.components()
    }

    /// Returns the number of bytes between two consecutive rows of `width` pixels.
    pub fn row_size(&self, width: u32) -> usize {
        let stride = if self.stride == 0 { width } else { self.stride };
        let bpr = PixelBufferDescriptor::pixel_size(self.format, self.ty) * stride as usize;
        let alignment = self.alignment.max(1) as usize;
        (bpr + alignment - 1) / alignment * alignment
    }

    /// Returns the minimum size of the buffer to hold an image of `width x height`
    /// pixels, with the offsets of this descriptor.
    pub fn required_size(&self, width: u32, height: u32) -> usize {
        let bpp = PixelBufferDescriptor::pixel_size(self.format, self.ty);
        let bpr = self.row_size(width);
        (self.top + height) as usize * bpr - (bpr - (self.left + width) as usize * bpp).min(bpr)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(
            PixelBufferDescriptor::pixel_size(PixelDataFormat::RGBA, PixelDataType::UByte),
            4
        );
        assert_eq!(
            PixelBufferDescriptor::pixel_size(PixelDataFormat::RGB, PixelDataType::UShort565),
            2
        );

        let mut desc =
            PixelBufferDescriptor::new(vec![], PixelDataFormat::RGB, PixelDataType::UByte);
        desc.alignment = 4;
        assert_eq!(desc.row_size(3), 12);
        assert_eq!(desc.row_size(4), 12);

        desc.alignment = 1;
        desc.stride = 8;
        assert_eq!(desc.row_size(4), 24);
        assert_eq!(desc.required_size(4, 2), 24 + 12);
    }
}
