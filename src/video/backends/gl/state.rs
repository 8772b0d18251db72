//! The redundant-state cache of a GL context.
//!
//! `GLState` holds the value assumed current for every binding point, capability,
//! raster parameter and pixel-store parameter of the context. Every mutation of them
//! goes through `update_state`, which skips the native call when the cached value is
//! already the requested one.
//!
//! The cached values must always match what the native API would report. Any native
//! call that changes tracked state without going through `GLState` breaks this for
//! the rest of the session.

use gl;
use gl::types::*;

use super::capabilities::{Bugs, Capabilities};
use super::types::TEXTURE_EXTERNAL_OES;
use crate::utils::hash::FastHashMap;
use crate::video::backends::GL;

/// Maximum number of texture units tracked.
pub const MAX_TEXTURE_UNITS: usize = 16;

/// Maximum number of indexed bindings tracked per indexed buffer target.
pub const MAX_BUFFER_BINDINGS: usize = 32;

/// Number of texture target classes tracked per unit.
pub const TEXTURE_TARGET_COUNT: usize = 6;

const BUFFER_TARGET_COUNT: usize = 8;
const INDEXED_TARGET_COUNT: usize = 2;

/// A name no native object ever gets. Slots holding it always fail the comparison
/// of `update_state`, which forces the next update.
pub const INVALID_NAME: GLuint = ::std::u32::MAX;

const CAPABILITIES: [GLenum; 10] = [
    gl::BLEND,
    gl::CULL_FACE,
    gl::SCISSOR_TEST,
    gl::DEPTH_TEST,
    gl::POLYGON_OFFSET_FILL,
    gl::SAMPLE_ALPHA_TO_COVERAGE,
    gl::DITHER,
    gl::RASTERIZER_DISCARD,
    gl::STENCIL_TEST,
    gl::PRIMITIVE_RESTART_FIXED_INDEX,
];

/// Compares `slot` with `value`. If they differ, or `force` is set, stores `value`
/// into `slot` and runs `apply`. Returns true if `apply` ran.
#[inline]
pub fn update_state<T, F>(slot: &mut T, value: T, force: bool, apply: F) -> bool
where
    T: PartialEq,
    F: FnOnce(),
{
    if force || *slot != value {
        *slot = value;
        apply();
        true
    } else {
        false
    }
}

/// Collapses the native texture targets into the small index of a cache slot.
pub fn texture_target_index(target: GLenum) -> usize {
    match target {
        gl::TEXTURE_2D => 0,
        gl::TEXTURE_2D_ARRAY => 1,
        gl::TEXTURE_CUBE_MAP => 2,
        gl::TEXTURE_2D_MULTISAMPLE => 3,
        TEXTURE_EXTERNAL_OES => 4,
        gl::TEXTURE_3D => 5,
        _ => unreachable!("Unknown texture target {:#x}.", target),
    }
}

fn buffer_target_index(target: GLenum) -> usize {
    match target {
        gl::ARRAY_BUFFER => 0,
        gl::ELEMENT_ARRAY_BUFFER => 1,
        gl::UNIFORM_BUFFER => 2,
        gl::TRANSFORM_FEEDBACK_BUFFER => 3,
        gl::PIXEL_PACK_BUFFER => 4,
        gl::PIXEL_UNPACK_BUFFER => 5,
        gl::COPY_READ_BUFFER => 6,
        gl::COPY_WRITE_BUFFER => 7,
        _ => unreachable!("Unknown buffer target {:#x}.", target),
    }
}

fn indexed_target_index(target: GLenum) -> usize {
    match target {
        gl::UNIFORM_BUFFER => 0,
        gl::TRANSFORM_FEEDBACK_BUFFER => 1,
        _ => unreachable!("Buffer target {:#x} is not indexed.", target),
    }
}

fn capability_index(cap: GLenum) -> usize {
    match CAPABILITIES.iter().position(|&v| v == cap) {
        Some(v) => v,
        None => unreachable!("Unknown capability {:#x}.", cap),
    }
}

/// The record of an indexed buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexedBinding {
    pub name: GLuint,
    pub offset: GLintptr,
    pub size: GLsizeiptr,
}

/// The parameters of `glPixelStorei`, for packing or unpacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelStore {
    pub alignment: GLint,
    pub row_length: GLint,
    pub skip_pixels: GLint,
    pub skip_rows: GLint,
}

impl Default for PixelStore {
    fn default() -> Self {
        PixelStore {
            alignment: 4,
            row_length: 0,
            skip_pixels: 0,
            skip_rows: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RasterCache {
    depth_func: GLenum,
    depth_mask: bool,
    color_mask: bool,
    cull_face: GLenum,
    front_face: GLenum,
    blend_equation: (GLenum, GLenum),
    blend_function: (GLenum, GLenum, GLenum, GLenum),
    polygon_offset: (f32, f32),
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: GLint,
}

impl Default for RasterCache {
    fn default() -> Self {
        RasterCache {
            depth_func: gl::LESS,
            depth_mask: true,
            color_mask: true,
            cull_face: gl::BACK,
            front_face: gl::CCW,
            blend_equation: (gl::FUNC_ADD, gl::FUNC_ADD),
            blend_function: (gl::ONE, gl::ONE, gl::ZERO, gl::ZERO),
            polygon_offset: (0.0, 0.0),
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

pub struct GLState {
    bugs: Bugs,
    units: usize,

    active_unit: usize,
    textures: [[GLuint; TEXTURE_TARGET_COUNT]; MAX_TEXTURE_UNITS],
    samplers: [GLuint; MAX_TEXTURE_UNITS],

    buffers: [GLuint; BUFFER_TARGET_COUNT],
    indexed: [[IndexedBinding; MAX_BUFFER_BINDINGS]; INDEXED_TARGET_COUNT],

    vao: GLuint,
    default_vao: GLuint,
    // Element array buffer remembered by each vertex array object.
    vaos: FastHashMap<GLuint, GLuint>,

    draw_framebuffer: GLuint,
    read_framebuffer: GLuint,
    renderbuffer: GLuint,
    program: GLuint,

    enables: u32,
    raster: RasterCache,
    viewport: [GLint; 4],
    scissor: [GLint; 4],
    pack: PixelStore,
    unpack: PixelStore,
}

impl GLState {
    /// Creates the cache of the current context, which must be in its initial state.
    ///
    /// On desktop GL a default vertex array object is created, which stands for "no
    /// vertex array object" from then on.
    pub fn new(gl: &dyn GL, caps: &Capabilities, units: usize) -> GLState {
        let units = units
            .min(MAX_TEXTURE_UNITS)
            .min(caps.limits.max_combined_texture_image_units.max(1) as usize);

        let default_vao = if caps.needs_default_vao() {
            let vao = gl.gen_vertex_arrays(1)[0];
            gl.bind_vertex_array(vao);
            vao
        } else {
            0
        };

        let mut vaos = FastHashMap::default();
        vaos.insert(default_vao, 0);

        GLState {
            bugs: caps.bugs,
            units,
            active_unit: 0,
            textures: [[0; TEXTURE_TARGET_COUNT]; MAX_TEXTURE_UNITS],
            samplers: [0; MAX_TEXTURE_UNITS],
            buffers: [0; BUFFER_TARGET_COUNT],
            indexed: [[IndexedBinding::default(); MAX_BUFFER_BINDINGS]; INDEXED_TARGET_COUNT],
            vao: default_vao,
            default_vao,
            vaos,
            draw_framebuffer: 0,
            read_framebuffer: 0,
            renderbuffer: 0,
            program: 0,
            enables: 1 << capability_index(gl::DITHER),
            raster: RasterCache::default(),
            viewport: [-1; 4],
            scissor: [-1; 4],
            pack: PixelStore::default(),
            unpack: PixelStore::default(),
        }
    }

    /// Number of texture units tracked.
    #[inline]
    pub fn units(&self) -> usize {
        self.units
    }

    #[inline]
    pub fn bugs(&self) -> &Bugs {
        &self.bugs
    }

    // Capabilities.

    pub fn enable(&mut self, gl: &dyn GL, cap: GLenum) {
        let bit = 1 << capability_index(cap);
        if self.enables & bit == 0 {
            self.enables |= bit;
            gl.enable(cap);
        }
    }

    pub fn disable(&mut self, gl: &dyn GL, cap: GLenum) {
        let bit = 1 << capability_index(cap);
        if self.enables & bit != 0 {
            self.enables &= !bit;
            gl.disable(cap);
        }
    }

    #[inline]
    pub fn set_capability(&mut self, gl: &dyn GL, cap: GLenum, enabled: bool) {
        if enabled {
            self.enable(gl, cap);
        } else {
            self.disable(gl, cap);
        }
    }

    #[inline]
    pub fn is_enabled(&self, cap: GLenum) -> bool {
        self.enables & (1 << capability_index(cap)) != 0
    }

    // Textures and samplers.

    pub fn active_texture(&mut self, gl: &dyn GL, unit: usize) {
        debug_assert!(unit < self.units);
        update_state(&mut self.active_unit, unit, false, || {
            gl.active_texture(gl::TEXTURE0 + unit as GLenum)
        });
    }

    pub fn bind_texture(&mut self, gl: &dyn GL, unit: usize, target: GLenum, name: GLuint) {
        let index = texture_target_index(target);
        let force = target == TEXTURE_EXTERNAL_OES && self.bugs.texture_external_needs_rebind;

        if force || self.textures[unit][index] != name {
            self.active_texture(gl, unit);
            self.textures[unit][index] = name;
            gl.bind_texture(target, name);
        }
    }

    /// Rebinds texture 0 on every unit `name` is bound to as `target`.
    pub fn unbind_texture(&mut self, gl: &dyn GL, target: GLenum, name: GLuint) {
        let index = texture_target_index(target);
        for unit in 0..self.units {
            if self.textures[unit][index] == name {
                self.bind_texture(gl, unit, target, 0);
            }
        }
    }

    pub fn bind_sampler(&mut self, gl: &dyn GL, unit: usize, sampler: GLuint) {
        debug_assert!(unit < self.units);
        update_state(&mut self.samplers[unit], sampler, false, || {
            gl.bind_sampler(unit as GLuint, sampler)
        });
    }

    /// Rebinds sampler 0 on every unit `sampler` is bound to.
    pub fn unbind_sampler(&mut self, gl: &dyn GL, sampler: GLuint) {
        for unit in 0..self.units {
            if self.samplers[unit] == sampler {
                self.bind_sampler(gl, unit, 0);
            }
        }
    }

    /// Deletes textures, after clearing them from every unit and target class.
    pub fn delete_textures(&mut self, gl: &dyn GL, names: &[GLuint]) {
        for &name in names {
            if name == 0 {
                continue;
            }

            for unit in 0..self.units {
                for index in 0..TEXTURE_TARGET_COUNT {
                    if self.textures[unit][index] == name {
                        // Deleting a bound texture reverts the binding to 0 natively.
                        self.textures[unit][index] = 0;
                    }
                }
            }
        }

        gl.delete_textures(names);
    }

    /// Deletes samplers, after clearing them from every unit.
    pub fn delete_samplers(&mut self, gl: &dyn GL, names: &[GLuint]) {
        for &name in names {
            for unit in 0..self.units {
                if name != 0 && self.samplers[unit] == name {
                    self.samplers[unit] = 0;
                }
            }
        }

        gl.delete_samplers(names);
    }

    // Buffers.

    pub fn bind_buffer(&mut self, gl: &dyn GL, target: GLenum, name: GLuint) {
        let index = buffer_target_index(target);

        if target == gl::ELEMENT_ARRAY_BUFFER {
            // The element array binding is a part of the bound vertex array object.
            let remembered = self.vaos.get(&self.vao).cloned().unwrap_or(INVALID_NAME);
            if self.buffers[index] != name || remembered != name {
                self.buffers[index] = name;
                self.vaos.insert(self.vao, name);
                gl.bind_buffer(target, name);
            }
        } else {
            update_state(&mut self.buffers[index], name, false, || {
                gl.bind_buffer(target, name)
            });
        }
    }

    /// Binds a range of buffer `name` to `index` of `target`. This also binds `name`
    /// to the generic binding point of `target`.
    pub fn bind_buffer_range(
        &mut self,
        gl: &dyn GL,
        target: GLenum,
        index: usize,
        name: GLuint,
        offset: GLintptr,
        size: GLsizeiptr,
    ) {
        let ti = indexed_target_index(target);
        let gi = buffer_target_index(target);
        let binding = IndexedBinding { name, offset, size };

        let slot = &mut self.indexed[ti][index];
        if *slot != binding || self.buffers[gi] != name {
            *slot = binding;
            self.buffers[gi] = name;
            gl.bind_buffer_range(target, index as GLuint, name, offset, size);
        }
    }

    /// Resets the cache slots referencing buffer `name`, then deletes it.
    pub fn delete_buffer(&mut self, gl: &dyn GL, name: GLuint, target: GLenum) {
        debug_assert!(name != 0);

        let gi = buffer_target_index(target);
        if self.buffers[gi] == name {
            self.buffers[gi] = 0;
        }

        if target == gl::UNIFORM_BUFFER || target == gl::TRANSFORM_FEEDBACK_BUFFER {
            let ti = indexed_target_index(target);
            for binding in self.indexed[ti].iter_mut() {
                if binding.name == name {
                    *binding = IndexedBinding::default();
                }
            }
        }

        if target == gl::ELEMENT_ARRAY_BUFFER {
            // Only the bound vertex array object drops the binding natively, the others
            // keep referencing the dead buffer.
            let bound = self.vao;
            for (&vao, element) in self.vaos.iter_mut() {
                if *element == name {
                    *element = if vao == bound { 0 } else { INVALID_NAME };
                }
            }
        }

        gl.delete_buffers(&[name]);
    }

    // Vertex array objects.

    /// Binds `vao`, or the default vertex array object if `None`.
    pub fn bind_vertex_array(&mut self, gl: &dyn GL, vao: Option<GLuint>) {
        let vao = vao.unwrap_or(self.default_vao);
        if self.vao != vao {
            self.vao = vao;
            gl.bind_vertex_array(vao);

            // Binding a vertex array object also changes the element array binding.
            let element = *self.vaos.entry(vao).or_insert(0);
            let gi = buffer_target_index(gl::ELEMENT_ARRAY_BUFFER);
            self.buffers[gi] = element;

            if self.bugs.vao_doesnt_store_element_array_buffer_binding && element != INVALID_NAME {
                gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, element);
            }
        }
    }

    /// Creates a vertex array object, tracked by the cache.
    pub fn gen_vertex_array(&mut self, gl: &dyn GL) -> GLuint {
        let vao = gl.gen_vertex_arrays(1)[0];
        self.vaos.insert(vao, 0);
        vao
    }

    /// Deletes `vao`. If it's bound, the default vertex array object gets bound first.
    pub fn delete_vertex_array(&mut self, gl: &dyn GL, vao: GLuint) {
        debug_assert!(vao != self.default_vao);

        if self.vao == vao {
            self.bind_vertex_array(gl, None);
        }

        self.vaos.remove(&vao);
        gl.delete_vertex_arrays(&[vao]);
    }

    #[inline]
    pub fn default_vertex_array(&self) -> GLuint {
        self.default_vao
    }

    /// Releases the objects owned by the cache itself.
    pub fn terminate(&mut self, gl: &dyn GL) {
        if self.default_vao != 0 {
            let vao = self.default_vao;
            self.vaos.remove(&vao);
            gl.bind_vertex_array(0);
            gl.delete_vertex_arrays(&[vao]);

            self.vao = 0;
            self.default_vao = 0;
        }
    }

    // Framebuffers, renderbuffers and programs.

    pub fn bind_framebuffer(&mut self, gl: &dyn GL, target: GLenum, name: GLuint) {
        match target {
            gl::FRAMEBUFFER => {
                if self.draw_framebuffer != name || self.read_framebuffer != name {
                    self.draw_framebuffer = name;
                    self.read_framebuffer = name;
                    gl.bind_framebuffer(gl::FRAMEBUFFER, name);
                }
            }
            gl::DRAW_FRAMEBUFFER => {
                update_state(&mut self.draw_framebuffer, name, false, || {
                    gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, name)
                });
            }
            gl::READ_FRAMEBUFFER => {
                update_state(&mut self.read_framebuffer, name, false, || {
                    gl.bind_framebuffer(gl::READ_FRAMEBUFFER, name)
                });
            }
            _ => unreachable!("Unknown framebuffer target {:#x}.", target),
        }
    }

    pub fn delete_framebuffer(&mut self, gl: &dyn GL, name: GLuint) {
        debug_assert!(name != 0);

        if self.draw_framebuffer == name {
            self.draw_framebuffer = 0;
        }

        if self.read_framebuffer == name {
            self.read_framebuffer = 0;
        }

        gl.delete_framebuffers(&[name]);
    }

    pub fn bind_renderbuffer(&mut self, gl: &dyn GL, name: GLuint) {
        update_state(&mut self.renderbuffer, name, false, || {
            gl.bind_renderbuffer(gl::RENDERBUFFER, name)
        });
    }

    pub fn delete_renderbuffer(&mut self, gl: &dyn GL, name: GLuint) {
        debug_assert!(name != 0);

        if self.renderbuffer == name {
            self.renderbuffer = 0;
        }

        gl.delete_renderbuffers(&[name]);
    }

    pub fn use_program(&mut self, gl: &dyn GL, program: GLuint) {
        update_state(&mut self.program, program, false, || gl.use_program(program));
    }

    /// Unbinds `program` if it's current, then deletes it.
    pub fn delete_program(&mut self, gl: &dyn GL, program: GLuint) {
        if self.program == program {
            self.use_program(gl, 0);
        }

        gl.delete_program(program);
    }

    // Raster state.

    pub fn depth_func(&mut self, gl: &dyn GL, func: GLenum) {
        update_state(&mut self.raster.depth_func, func, false, || gl.depth_func(func));
    }

    pub fn depth_mask(&mut self, gl: &dyn GL, flag: bool) {
        update_state(&mut self.raster.depth_mask, flag, false, || gl.depth_mask(flag));
    }

    pub fn color_mask(&mut self, gl: &dyn GL, flag: bool) {
        update_state(&mut self.raster.color_mask, flag, false, || {
            gl.color_mask(flag, flag, flag, flag)
        });
    }

    pub fn cull_face(&mut self, gl: &dyn GL, mode: GLenum) {
        update_state(&mut self.raster.cull_face, mode, false, || gl.cull_face(mode));
    }

    pub fn front_face(&mut self, gl: &dyn GL, mode: GLenum) {
        update_state(&mut self.raster.front_face, mode, false, || gl.front_face(mode));
    }

    pub fn blend_equation(&mut self, gl: &dyn GL, rgb: GLenum, alpha: GLenum) {
        update_state(&mut self.raster.blend_equation, (rgb, alpha), false, || {
            gl.blend_equation_separate(rgb, alpha)
        });
    }

    pub fn blend_function(
        &mut self,
        gl: &dyn GL,
        src_rgb: GLenum,
        src_a: GLenum,
        dst_rgb: GLenum,
        dst_a: GLenum,
    ) {
        let v = (src_rgb, src_a, dst_rgb, dst_a);
        update_state(&mut self.raster.blend_function, v, false, || {
            gl.blend_func_separate(src_rgb, dst_rgb, src_a, dst_a)
        });
    }

    /// Sets the polygon offset, which is enabled only if it's not zero.
    pub fn polygon_offset(&mut self, gl: &dyn GL, factor: f32, units: f32) {
        update_state(&mut self.raster.polygon_offset, (factor, units), false, || {
            gl.polygon_offset(factor, units)
        });

        let enabled = factor != 0.0 || units != 0.0;
        self.set_capability(gl, gl::POLYGON_OFFSET_FILL, enabled);
    }

    pub fn clear_color(&mut self, gl: &dyn GL, color: [f32; 4]) {
        update_state(&mut self.raster.clear_color, color, false, || {
            gl.clear_color(color[0], color[1], color[2], color[3])
        });
    }

    pub fn clear_depth(&mut self, gl: &dyn GL, depth: f32) {
        update_state(&mut self.raster.clear_depth, depth, false, || {
            gl.clear_depth_f(depth)
        });
    }

    pub fn clear_stencil(&mut self, gl: &dyn GL, stencil: GLint) {
        update_state(&mut self.raster.clear_stencil, stencil, false, || {
            gl.clear_stencil(stencil)
        });
    }

    pub fn viewport(&mut self, gl: &dyn GL, x: GLint, y: GLint, w: GLsizei, h: GLsizei) {
        update_state(&mut self.viewport, [x, y, w, h], false, || gl.viewport(x, y, w, h));
    }

    pub fn scissor(&mut self, gl: &dyn GL, x: GLint, y: GLint, w: GLsizei, h: GLsizei) {
        update_state(&mut self.scissor, [x, y, w, h], false, || gl.scissor(x, y, w, h));
    }

    // Pixel store.

    pub fn pixel_store(&mut self, gl: &dyn GL, name: GLenum, param: GLint) {
        let slot = match name {
            gl::PACK_ALIGNMENT => &mut self.pack.alignment,
            gl::PACK_ROW_LENGTH => &mut self.pack.row_length,
            gl::PACK_SKIP_PIXELS => &mut self.pack.skip_pixels,
            gl::PACK_SKIP_ROWS => &mut self.pack.skip_rows,
            gl::UNPACK_ALIGNMENT => &mut self.unpack.alignment,
            gl::UNPACK_ROW_LENGTH => &mut self.unpack.row_length,
            gl::UNPACK_SKIP_PIXELS => &mut self.unpack.skip_pixels,
            gl::UNPACK_SKIP_ROWS => &mut self.unpack.skip_rows,
            _ => unreachable!("Unknown pixel store parameter {:#x}.", name),
        };

        update_state(slot, param, false, || gl.pixel_store_i(name, param));
    }

    // Queries, which never touch native GL.

    #[inline]
    pub fn active_unit(&self) -> usize {
        self.active_unit
    }

    #[inline]
    pub fn texture_binding(&self, unit: usize, target: GLenum) -> GLuint {
        self.textures[unit][texture_target_index(target)]
    }

    #[inline]
    pub fn sampler_binding(&self, unit: usize) -> GLuint {
        self.samplers[unit]
    }

    #[inline]
    pub fn buffer_binding(&self, target: GLenum) -> GLuint {
        self.buffers[buffer_target_index(target)]
    }

    #[inline]
    pub fn indexed_binding(&self, target: GLenum, index: usize) -> IndexedBinding {
        self.indexed[indexed_target_index(target)][index]
    }

    #[inline]
    pub fn vertex_array(&self) -> GLuint {
        self.vao
    }

    /// The element array buffer remembered by `vao`.
    #[inline]
    pub fn vertex_array_element_buffer(&self, vao: GLuint) -> Option<GLuint> {
        self.vaos.get(&vao).cloned()
    }

    pub fn framebuffer(&self, target: GLenum) -> GLuint {
        match target {
            gl::DRAW_FRAMEBUFFER | gl::FRAMEBUFFER => self.draw_framebuffer,
            gl::READ_FRAMEBUFFER => self.read_framebuffer,
            _ => unreachable!("Unknown framebuffer target {:#x}.", target),
        }
    }

    #[inline]
    pub fn renderbuffer(&self) -> GLuint {
        self.renderbuffer
    }

    #[inline]
    pub fn program(&self) -> GLuint {
        self.program
    }

    #[inline]
    pub fn current_viewport(&self) -> [GLint; 4] {
        self.viewport
    }

    #[inline]
    pub fn current_scissor(&self) -> [GLint; 4] {
        self.scissor
    }

    #[inline]
    pub fn pack(&self) -> PixelStore {
        self.pack
    }

    #[inline]
    pub fn unpack(&self) -> PixelStore {
        self.unpack
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::video::backends::headless::HeadlessGL;

    #[test]
    fn update() {
        let mut slot = 0;
        let mut calls = 0;

        assert!(update_state(&mut slot, 3, false, || calls += 1));
        assert!(!update_state(&mut slot, 3, false, || calls += 1));
        assert_eq!(calls, 1);
        assert_eq!(slot, 3);

        assert!(update_state(&mut slot, 3, true, || calls += 1));
        assert_eq!(calls, 2);

        let mut name = INVALID_NAME;
        assert!(update_state(&mut name, 0, false, || calls += 1));
        assert_eq!(calls, 3);
    }

    #[test]
    fn indices() {
        assert_eq!(texture_target_index(gl::TEXTURE_2D), 0);
        assert_eq!(texture_target_index(TEXTURE_EXTERNAL_OES), 4);
        assert_eq!(buffer_target_index(gl::ELEMENT_ARRAY_BUFFER), 1);
        assert_eq!(indexed_target_index(gl::TRANSFORM_FEEDBACK_BUFFER), 1);
        assert_eq!(capability_index(gl::DITHER), 6);
    }

    #[test]
    fn raster_defaults() {
        let gl = HeadlessGL::es3();
        let caps = Capabilities::parse(&gl).unwrap();
        let mut state = GLState::new(&gl, &caps, 16);
        gl.reset_calls();

        // The initial values of a fresh context.
        state.depth_func(&gl, gl::LESS);
        state.depth_mask(&gl, true);
        state.color_mask(&gl, true);
        state.cull_face(&gl, gl::BACK);
        state.front_face(&gl, gl::CCW);
        state.blend_equation(&gl, gl::FUNC_ADD, gl::FUNC_ADD);
        state.blend_function(&gl, gl::ONE, gl::ONE, gl::ZERO, gl::ZERO);
        state.polygon_offset(&gl, 0.0, 0.0);
        state.clear_color(&gl, [0.0; 4]);
        state.clear_depth(&gl, 1.0);
        state.clear_stencil(&gl, 0);

        let names = [
            "depth_func",
            "depth_mask",
            "color_mask",
            "cull_face",
            "front_face",
            "blend_equation_separate",
            "blend_func_separate",
            "polygon_offset",
            "clear_color",
            "clear_depth_f",
            "clear_stencil",
            "enable",
            "disable",
        ];

        for name in names.iter() {
            assert_eq!(gl.calls(name), 0, "{}", name);
        }

        // Source alpha ZERO and destination color ONE differ from the defaults.
        state.blend_function(&gl, gl::ONE, gl::ZERO, gl::ONE, gl::ZERO);
        assert_eq!(gl.calls("blend_func_separate"), 1);
        state.blend_function(&gl, gl::ONE, gl::ZERO, gl::ONE, gl::ZERO);
        assert_eq!(gl.calls("blend_func_separate"), 1);
    }

    #[test]
    #[should_panic]
    fn unknown_target() {
        texture_target_index(gl::TEXTURE_1D);
    }
}
