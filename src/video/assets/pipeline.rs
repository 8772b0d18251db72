//! Pipeline state: the program plus immutable raster state used by a draw, and the
//! parameters of render passes.

use std::fmt;
use std::sync::Arc;

use super::render_target::TargetBufferFlags;
use crate::video::program::CompiledProgram;

/// Specify whether front- or back-facing polygons can be culled.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum CullingMode {
    Nothing,
    Front,
    Back,
    FrontAndBack,
}

/// Define front- and back-facing polygons.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum FrontFaceOrder {
    Clockwise,
    CounterClockwise,
}

/// A pixel-wise comparison function.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Comparison {
    LessOrEqual = 0,
    GreaterOrEqual = 1,
    Less = 2,
    Greater = 3,
    Equal = 4,
    NotEqual = 5,
    Always = 6,
    Never = 7,
}

/// Specifies how incoming RGBA values (source) and the RGBA in framebuffer (destination)
/// are combined.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Equation {
    /// Adds source and destination. Source and destination are multiplied
    /// by blending parameters before addition.
    Add,
    /// Subtracts destination from source. Source and destination are
    /// multiplied by blending parameters before subtraction.
    Subtract,
    /// Subtracts source from destination. Source and destination are
    /// multiplied by blending parameters before subtraction.
    ReverseSubtract,
    Min,
    Max,
}

/// Blend values.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BlendValue {
    SourceColor,
    SourceAlpha,
    DestinationColor,
    DestinationAlpha,
}

/// Blend factors.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    Value(BlendValue),
    OneMinusValue(BlendValue),
    SourceAlphaSaturate,
}

/// The immutable raster state of a draw.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct RasterState {
    pub culling: CullingMode,
    pub front_face: FrontFaceOrder,
    pub blend_equation_rgb: Equation,
    pub blend_equation_alpha: Equation,
    pub blend_src_rgb: BlendFactor,
    pub blend_src_alpha: BlendFactor,
    pub blend_dst_rgb: BlendFactor,
    pub blend_dst_alpha: BlendFactor,
    pub depth_write: bool,
    pub depth_func: Comparison,
    pub color_write: bool,
    pub alpha_to_coverage: bool,
}

impl Default for RasterState {
    fn default() -> Self {
        RasterState {
            culling: CullingMode::Back,
            front_face: FrontFaceOrder::CounterClockwise,
            blend_equation_rgb: Equation::Add,
            blend_equation_alpha: Equation::Add,
            blend_src_rgb: BlendFactor::One,
            blend_src_alpha: BlendFactor::One,
            blend_dst_rgb: BlendFactor::Zero,
            blend_dst_alpha: BlendFactor::Zero,
            depth_write: false,
            depth_func: Comparison::LessOrEqual,
            color_write: false,
            alpha_to_coverage: false,
        }
    }
}

impl RasterState {
    /// Blending is skipped if it would not change the incoming fragments.
    pub fn has_blending(&self) -> bool {
        !(self.blend_equation_rgb == Equation::Add
            && self.blend_equation_alpha == Equation::Add
            && self.blend_src_rgb == BlendFactor::One
            && self.blend_src_alpha == BlendFactor::One
            && self.blend_dst_rgb == BlendFactor::Zero
            && self.blend_dst_alpha == BlendFactor::Zero)
    }

    /// The depth test could be disabled if it always passes and nothing is written.
    pub fn has_depth_test(&self) -> bool {
        !(self.depth_func == Comparison::Always && !self.depth_write)
    }
}

/// Depth values are offset by `factor * slope + units * constant`.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct PolygonOffset {
    pub slope: f32,
    pub constant: f32,
}

/// Everything a draw needs besides its geometry.
#[derive(Clone)]
pub struct PipelineState {
    pub program: Arc<dyn CompiledProgram>,
    pub raster: RasterState,
    pub polygon_offset: PolygonOffset,
}

impl fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PipelineState")
            .field("program", &self.program.id())
            .field("raster", &self.raster)
            .field("polygon_offset", &self.polygon_offset)
            .finish()
    }
}

/// A rectangle in window coordinates, the origin is at the bottom-left corner.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
pub struct Viewport {
    pub left: i32,
    pub bottom: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(left: i32, bottom: i32, width: u32, height: u32) -> Self {
        Viewport {
            left,
            bottom,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.left + self.width as i32
    }

    #[inline]
    pub fn top(&self) -> i32 {
        self.bottom + self.height as i32
    }
}

/// Describes how attachments are handled at the start and the end of a render pass.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct RenderPassFlags {
    /// Buffers to clear at the start of the pass.
    pub clear: TargetBufferFlags,
    /// Buffers whose content is not needed at the start of the pass.
    pub discard_start: TargetBufferFlags,
    /// Buffers whose content is not needed after the pass.
    pub discard_end: TargetBufferFlags,
    /// Clears the whole attachments regardless of the scissor rectangle.
    pub ignore_scissor: bool,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct RenderPassParams {
    pub flags: RenderPassFlags,
    pub viewport: Viewport,
    pub clear_color: [f32; 4],
    pub clear_depth: f64,
    pub clear_stencil: u32,
}

impl Default for RenderPassParams {
    fn default() -> Self {
        RenderPassParams {
            flags: RenderPassFlags::default(),
            viewport: Viewport::default(),
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}
