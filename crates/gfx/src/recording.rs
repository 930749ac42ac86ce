use crate::device::{BufferHandle, GraphicsDevice, ProgramHandle, ShaderHandle, UniformLocation};
use crate::{ClearMask, Feature, ShaderStage};
use std::collections::{BTreeMap, BTreeSet};
use vesta_common::{AttributeLayout, BindingTarget, ComponentType, DataUsage, DrawMode};

/// One call received by a [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Viewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    ClearColor([f32; 4]),
    Clear(ClearMask),
    Enable(Feature),
    Disable(Feature),
    CompileShader {
        stage: ShaderStage,
        shader: Option<ShaderHandle>,
    },
    LinkProgram(Option<ProgramHandle>),
    DeleteShader(ShaderHandle),
    UseProgram(Option<ProgramHandle>),
    VertexAttribPointer {
        location: u32,
        layout: AttributeLayout,
    },
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    Uniform1i {
        location: UniformLocation,
        value: i32,
    },
    Uniform1f {
        location: UniformLocation,
        value: f32,
    },
    Uniform3f {
        location: UniformLocation,
        value: [f32; 3],
    },
    Uniform4f {
        location: UniformLocation,
        value: [f32; 4],
    },
    UniformMatrix4fv {
        location: UniformLocation,
        value: [f32; 16],
    },
    CreateBuffer(BufferHandle),
    BindBuffer {
        target: BindingTarget,
        buffer: Option<BufferHandle>,
    },
    BufferData {
        target: BindingTarget,
        bytes: usize,
        usage: DataUsage,
    },
    DrawArrays {
        mode: DrawMode,
        first: u32,
        count: u32,
    },
    DrawElements {
        mode: DrawMode,
        count: u32,
        index_type: ComponentType,
        offset: u32,
    },
}

impl DeviceCall {
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawArrays { .. } | Self::DrawElements { .. })
    }
}

#[derive(Debug, Clone)]
struct Program {
    attributes: Vec<(String, u32)>,
    uniforms: Vec<(String, UniformLocation)>,
}

/// In-memory [`GraphicsDevice`] that needs no GPU.
///
/// Every call is appended to a log. Compilation is simulated: a line starting
/// with `#error` fails, a source without `main` fails to link, and only
/// `attribute`/`uniform` declarations referenced outside their declaration
/// are reported as active.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    enabled: BTreeSet<Feature>,
    next_handle: u32,
    compiled: Vec<(ShaderStage, String)>,
    shaders: BTreeMap<ShaderHandle, (ShaderStage, String)>,
    programs: BTreeMap<ProgramHandle, Program>,
    buffers: BTreeMap<BufferHandle, Vec<u8>>,
    bound: BTreeMap<BindingTarget, BufferHandle>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn drain_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = &DeviceCall> {
        self.calls.iter().filter(|c| c.is_draw())
    }

    pub fn enabled_features(&self) -> &BTreeSet<Feature> {
        &self.enabled
    }

    /// Every source handed to `compile_shader`, in call order.
    pub fn compiled_sources(&self) -> Vec<(ShaderStage, &str)> {
        self.compiled
            .iter()
            .map(|(stage, src)| (*stage, src.as_str()))
            .collect()
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn bound_buffer(&self, target: BindingTarget) -> Option<BufferHandle> {
        self.bound.get(&target).copied()
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

fn has_identifier(line: &str, name: &str) -> bool {
    line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| token == name)
}

fn is_declaration(line: &str) -> bool {
    matches!(
        line.split_whitespace().next(),
        Some("attribute" | "uniform" | "varying")
    )
}

/// Names declared with `keyword`, in source order.
fn declarations<'a>(src: &'a str, keyword: &str) -> Vec<&'a str> {
    src.lines()
        .filter(|line| line.split_whitespace().next() == Some(keyword))
        .filter_map(|line| line.split_whitespace().last())
        .map(|name| name.trim_end_matches(';'))
        .map(|name| name.split('[').next().unwrap_or(name))
        .collect()
}

fn is_referenced(name: &str, sources: &[&str]) -> bool {
    sources
        .iter()
        .flat_map(|src| src.lines())
        .filter(|line| !is_declaration(line))
        .any(|line| has_identifier(line, name))
}

impl GraphicsDevice for RecordingDevice {
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.calls.push(DeviceCall::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.calls.push(DeviceCall::ClearColor([r, g, b, a]));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.calls.push(DeviceCall::Clear(mask));
    }

    fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }

    fn enable(&mut self, feature: Feature) {
        self.enabled.insert(feature);
        self.calls.push(DeviceCall::Enable(feature));
    }

    fn disable(&mut self, feature: Feature) {
        self.enabled.remove(&feature);
        self.calls.push(DeviceCall::Disable(feature));
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        self.compiled.push((stage, source.to_owned()));

        let failure = source
            .lines()
            .enumerate()
            .find(|(_, line)| line.trim_start().starts_with("#error"));
        if let Some((index, line)) = failure {
            self.calls.push(DeviceCall::CompileShader {
                stage,
                shader: None,
            });
            let message = line.trim_start().trim_start_matches("#error").trim();
            return Err(format!("ERROR: 0:{}: '#error' : {message}", index + 1));
        }

        let shader = ShaderHandle(self.next());
        self.shaders.insert(shader, (stage, source.to_owned()));
        self.calls.push(DeviceCall::CompileShader {
            stage,
            shader: Some(shader),
        });
        Ok(shader)
    }

    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, String> {
        let (Some((_, vs)), Some((_, fs))) = (self.shaders.get(&vertex), self.shaders.get(&fragment))
        else {
            self.calls.push(DeviceCall::LinkProgram(None));
            return Err("invalid shader object".to_owned());
        };

        for (stage, src) in [(ShaderStage::Vertex, vs), (ShaderStage::Fragment, fs)] {
            if !src.lines().any(|line| has_identifier(line, "main")) {
                self.calls.push(DeviceCall::LinkProgram(None));
                return Err(format!("ERROR: Missing entry point 'main' in {stage} shader"));
            }
        }

        let sources = [vs.as_str(), fs.as_str()];
        let attributes = declarations(vs, "attribute")
            .into_iter()
            .filter(|name| is_referenced(name, &sources))
            .enumerate()
            .map(|(location, name)| (name.to_owned(), location as u32))
            .collect();

        let mut uniform_names: Vec<&str> = Vec::new();
        for name in declarations(vs, "uniform")
            .into_iter()
            .chain(declarations(fs, "uniform"))
        {
            if !uniform_names.contains(&name) && is_referenced(name, &sources) {
                uniform_names.push(name);
            }
        }
        let uniforms = uniform_names
            .into_iter()
            .enumerate()
            .map(|(location, name)| (name.to_owned(), UniformLocation(location as u32)))
            .collect();

        let program = ProgramHandle(self.next());
        self.programs.insert(
            program,
            Program {
                attributes,
                uniforms,
            },
        );
        self.calls.push(DeviceCall::LinkProgram(Some(program)));
        Ok(program)
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
        self.calls.push(DeviceCall::DeleteShader(shader));
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.calls.push(DeviceCall::UseProgram(program));
    }

    fn active_attributes(&self, program: ProgramHandle) -> Vec<(String, u32)> {
        self.programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&self, program: ProgramHandle) -> Vec<(String, UniformLocation)> {
        self.programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn vertex_attrib_pointer(&mut self, location: u32, layout: &AttributeLayout) {
        self.calls.push(DeviceCall::VertexAttribPointer {
            location,
            layout: *layout,
        });
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(DeviceCall::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(DeviceCall::DisableVertexAttribArray(index));
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        self.calls.push(DeviceCall::Uniform1i { location, value });
    }

    fn uniform_1f(&mut self, location: UniformLocation, value: f32) {
        self.calls.push(DeviceCall::Uniform1f { location, value });
    }

    fn uniform_3f(&mut self, location: UniformLocation, value: [f32; 3]) {
        self.calls.push(DeviceCall::Uniform3f { location, value });
    }

    fn uniform_4f(&mut self, location: UniformLocation, value: [f32; 4]) {
        self.calls.push(DeviceCall::Uniform4f { location, value });
    }

    fn uniform_matrix4fv(&mut self, location: UniformLocation, value: &[f32; 16]) {
        self.calls.push(DeviceCall::UniformMatrix4fv {
            location,
            value: *value,
        });
    }

    fn create_buffer(&mut self) -> BufferHandle {
        let buffer = BufferHandle(self.next());
        self.buffers.insert(buffer, Vec::new());
        self.calls.push(DeviceCall::CreateBuffer(buffer));
        buffer
    }

    fn bind_buffer(&mut self, target: BindingTarget, buffer: Option<BufferHandle>) {
        match buffer {
            Some(b) => self.bound.insert(target, b),
            None => self.bound.remove(&target),
        };
        self.calls.push(DeviceCall::BindBuffer { target, buffer });
    }

    fn buffer_data(&mut self, target: BindingTarget, data: &[u8], usage: DataUsage) {
        if let Some(bytes) = self
            .bound
            .get(&target)
            .and_then(|b| self.buffers.get_mut(b))
        {
            *bytes = data.to_vec();
        }
        self.calls.push(DeviceCall::BufferData {
            target,
            bytes: data.len(),
            usage,
        });
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.calls.push(DeviceCall::DrawArrays { mode, first, count });
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, index_type: ComponentType, offset: u32) {
        self.calls.push(DeviceCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
        });
    }
}
