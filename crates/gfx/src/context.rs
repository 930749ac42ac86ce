use crate::device::{BufferHandle, GraphicsDevice, ProgramHandle, ShaderHandle};
use crate::shader::{Shader, add_headers, numbered_listing};
use crate::{ClearMask, Defines, Feature, GfxError, ShaderStage};
use vesta_common::{BindingTarget, ComponentType, DataUsage, DrawMode};
use vesta_math::Vector4;

/// Engine-facing wrapper over a [`GraphicsDevice`].
///
/// Owns the device and the small amount of state needed to skip redundant
/// driver calls (enabled attribute slots, current program).
#[derive(Debug)]
pub struct Context<D> {
    device: D,
    attribute_slots: u32,
    program: Option<ProgramHandle>,
}

impl<D: GraphicsDevice> Context<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            attribute_slots: 0,
            program: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Number of currently enabled vertex attribute slots.
    pub fn attribute_slots(&self) -> u32 {
        self.attribute_slots
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.device.viewport(x, y, width, height);
    }

    /// Clear the selected buffers in a single call. Nothing selected, no call.
    pub fn clear(&mut self, color: bool, depth: bool, stencil: bool) {
        let mask = ClearMask {
            color,
            depth,
            stencil,
        };
        if mask.is_empty() {
            return;
        }
        self.device.clear(mask);
    }

    pub fn clear_color(&mut self, color: &Vector4) {
        self.device.clear_color(color.x, color.y, color.z, color.w);
    }

    /// Enable or disable `feature`, only touching the device on a change.
    pub fn set_feature(&mut self, feature: Feature, enabled: bool) {
        let current = self.device.is_enabled(feature);
        match (enabled, current) {
            (true, false) => self.device.enable(feature),
            (false, true) => self.device.disable(feature),
            _ => tracing::trace!(?feature, enabled, "feature state unchanged"),
        }
    }

    /// Compile both stages with injected headers, link, and introspect.
    pub fn create_shader(
        &mut self,
        vertex: &str,
        fragment: &str,
        defines: &Defines,
    ) -> Result<Shader, GfxError> {
        let vertex_src = add_headers(vertex, defines, false);
        let fragment_src = add_headers(fragment, defines, true);

        let vs = self.compile(ShaderStage::Vertex, &vertex_src)?;
        let fs = match self.compile(ShaderStage::Fragment, &fragment_src) {
            Ok(fs) => fs,
            Err(e) => {
                self.device.delete_shader(vs);
                return Err(e);
            }
        };

        let linked = self.device.link_program(vs, fs);
        self.device.delete_shader(vs);
        self.device.delete_shader(fs);

        let program = linked.map_err(|log| {
            tracing::error!(%log, "cannot link a program");
            GfxError::Link(log)
        })?;

        let attributes = self.device.active_attributes(program);
        let uniforms = self.device.active_uniforms(program);
        tracing::debug!(
            ?program,
            attributes = attributes.len(),
            uniforms = uniforms.len(),
            "shader program linked"
        );

        Ok(Shader::new(program, attributes, uniforms))
    }

    fn compile(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, GfxError> {
        self.device.compile_shader(stage, source).map_err(|log| {
            let listing = numbered_listing(source);
            tracing::error!(%stage, %log, "error occurred while compiling shader\n{listing}");
            GfxError::Compile {
                stage,
                log,
                listing,
            }
        })
    }

    /// Make `program` current unless it already is.
    pub fn use_program(&mut self, program: ProgramHandle) {
        if self.program == Some(program) {
            return;
        }
        self.device.use_program(Some(program));
        self.program = Some(program);
    }

    /// Allocate a buffer, upload `data` and leave `target` unbound.
    pub fn create_buffer(
        &mut self,
        target: BindingTarget,
        data: &[u8],
        usage: DataUsage,
    ) -> BufferHandle {
        let buffer = self.device.create_buffer();
        self.bind_buffer(target, buffer);
        self.device.buffer_data(target, data, usage);
        self.unbind_buffer(target);
        tracing::trace!(?buffer, ?target, bytes = data.len(), "buffer uploaded");
        buffer
    }

    pub fn bind_buffer(&mut self, target: BindingTarget, buffer: BufferHandle) {
        self.device.bind_buffer(target, Some(buffer));
    }

    pub fn unbind_buffer(&mut self, target: BindingTarget) {
        self.device.bind_buffer(target, None);
    }

    /// Make exactly `count` attribute slots active, diffing against the
    /// previously active count.
    pub fn switch_attributes(&mut self, count: u32) {
        if self.attribute_slots < count {
            for index in self.attribute_slots..count {
                self.device.enable_vertex_attrib_array(index);
            }
        } else {
            for index in count..self.attribute_slots {
                self.device.disable_vertex_attrib_array(index);
            }
        }
        self.attribute_slots = count;
    }

    pub fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.device.draw_arrays(mode, first, count);
    }

    pub fn draw_elements(
        &mut self,
        mode: DrawMode,
        count: u32,
        index_type: ComponentType,
        offset: u32,
    ) {
        self.device.draw_elements(mode, count, index_type, offset);
    }
}
