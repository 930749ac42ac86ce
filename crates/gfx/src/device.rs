use crate::{ClearMask, Feature, ShaderStage};
use vesta_common::{AttributeLayout, BindingTarget, ComponentType, DataUsage, DrawMode};

/// Opaque GPU buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Opaque compiled shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u32);

/// Opaque linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// Location of an active uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

/// Low-level rendering backend, one method per driver entry point.
///
/// Implementations do no validation or caching of their own; that is the
/// job of [`crate::Context`]. Compile and link failures carry the driver's
/// info log as the error string.
pub trait GraphicsDevice {
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&mut self, mask: ClearMask);

    fn is_enabled(&self, feature: Feature) -> bool;
    fn enable(&mut self, feature: Feature);
    fn disable(&mut self, feature: Feature);

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String>;
    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String>;
    fn delete_shader(&mut self, shader: ShaderHandle);
    fn use_program(&mut self, program: Option<ProgramHandle>);
    /// Active vertex attributes of a linked program, in location order.
    fn active_attributes(&self, program: ProgramHandle) -> Vec<(String, u32)>;
    fn active_uniforms(&self, program: ProgramHandle) -> Vec<(String, UniformLocation)>;

    fn vertex_attrib_pointer(&mut self, location: u32, layout: &AttributeLayout);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);

    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    fn uniform_1f(&mut self, location: UniformLocation, value: f32);
    fn uniform_3f(&mut self, location: UniformLocation, value: [f32; 3]);
    fn uniform_4f(&mut self, location: UniformLocation, value: [f32; 4]);
    /// Column-major, never transposed.
    fn uniform_matrix4fv(&mut self, location: UniformLocation, value: &[f32; 16]);

    fn create_buffer(&mut self) -> BufferHandle;
    fn bind_buffer(&mut self, target: BindingTarget, buffer: Option<BufferHandle>);
    /// Upload into the buffer currently bound to `target`.
    fn buffer_data(&mut self, target: BindingTarget, data: &[u8], usage: DataUsage);

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32);
    fn draw_elements(&mut self, mode: DrawMode, count: u32, index_type: ComponentType, offset: u32);
}
