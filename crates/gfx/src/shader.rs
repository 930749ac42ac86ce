use crate::context::Context;
use crate::device::{GraphicsDevice, ProgramHandle, UniformLocation};
use crate::{DefineValue, Defines, GfxError, LookupPolicy};
use std::collections::BTreeMap;
use vesta_common::AttributeLayout;
use vesta_math::{Matrix4, Vector3, Vector4};

/// GLSL sources for one program, with the defines to inject.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
    pub defines: Defines,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            defines: Defines::new(),
        }
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<DefineValue>) -> Self {
        self.defines.insert(name.into(), value.into());
        self
    }
}

/// Prepend the precision directive (fragment stage) and one `#define` line
/// per define to `src`.
pub fn add_headers(src: &str, defines: &Defines, with_precision: bool) -> String {
    let mut headers = String::new();

    if with_precision {
        headers.push_str("precision highp float;\n\n");
    }

    if !defines.is_empty() {
        for (name, value) in defines {
            match value {
                DefineValue::Bool(true) => headers.push_str(&format!("#define {name}\n")),
                DefineValue::Bool(false) => {}
                DefineValue::Number(n) => headers.push_str(&format!("#define {name} {n}\n")),
            }
        }
        headers.push('\n');
    }

    headers + src
}

/// `src` with each line prefixed by its 1-based number.
pub fn numbered_listing(src: &str) -> String {
    src.split('\n')
        .enumerate()
        .map(|(i, row)| format!("{}  {row}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A linked program plus its introspected symbol locations.
#[derive(Debug, Clone)]
pub struct Shader {
    program: ProgramHandle,
    /// Location order, as reported by the device.
    attributes: Vec<(String, u32)>,
    uniforms: BTreeMap<String, UniformLocation>,
    policy: LookupPolicy,
}

impl Shader {
    pub(crate) fn new(
        program: ProgramHandle,
        attributes: Vec<(String, u32)>,
        uniforms: Vec<(String, UniformLocation)>,
    ) -> Self {
        Self {
            program,
            attributes,
            uniforms: uniforms.into_iter().collect(),
            policy: LookupPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LookupPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> LookupPolicy {
        self.policy
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, loc)| *loc)
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.keys().map(String::as_str)
    }

    /// Make this program current.
    pub fn bind<D: GraphicsDevice>(&self, ctx: &mut Context<D>) {
        ctx.use_program(self.program);
    }

    /// Point attribute `name` at the buffer bound to the array target.
    pub fn bind_attribute<D: GraphicsDevice>(
        &self,
        ctx: &mut Context<D>,
        name: &str,
        layout: &AttributeLayout,
    ) -> Result<(), GfxError> {
        match self.attribute_location(name) {
            Some(location) => {
                ctx.device_mut().vertex_attrib_pointer(location, layout);
                Ok(())
            }
            None => match self.policy {
                LookupPolicy::Strict => Err(GfxError::MissingAttribute(name.to_owned())),
                LookupPolicy::Lenient => {
                    tracing::trace!(attribute = name, "attribute not active, skipped");
                    Ok(())
                }
            },
        }
    }

    fn uniform(&self, name: &str) -> Result<Option<UniformLocation>, GfxError> {
        match (self.uniform_location(name), self.policy) {
            (Some(location), _) => Ok(Some(location)),
            (None, LookupPolicy::Strict) => Err(GfxError::MissingUniform(name.to_owned())),
            (None, LookupPolicy::Lenient) => {
                tracing::trace!(uniform = name, "uniform not active, skipped");
                Ok(None)
            }
        }
    }

    pub fn set_bool<D: GraphicsDevice>(
        &self,
        ctx: &mut Context<D>,
        name: &str,
        value: bool,
    ) -> Result<(), GfxError> {
        if let Some(location) = self.uniform(name)? {
            ctx.device_mut().uniform_1i(location, i32::from(value));
        }
        Ok(())
    }

    pub fn set_float<D: GraphicsDevice>(
        &self,
        ctx: &mut Context<D>,
        name: &str,
        value: f32,
    ) -> Result<(), GfxError> {
        if let Some(location) = self.uniform(name)? {
            ctx.device_mut().uniform_1f(location, value);
        }
        Ok(())
    }

    pub fn set_vector3<D: GraphicsDevice>(
        &self,
        ctx: &mut Context<D>,
        name: &str,
        value: &Vector3,
    ) -> Result<(), GfxError> {
        if let Some(location) = self.uniform(name)? {
            ctx.device_mut().uniform_3f(location, value.to_array());
        }
        Ok(())
    }

    pub fn set_vector4<D: GraphicsDevice>(
        &self,
        ctx: &mut Context<D>,
        name: &str,
        value: &Vector4,
    ) -> Result<(), GfxError> {
        if let Some(location) = self.uniform(name)? {
            ctx.device_mut().uniform_4f(location, value.to_array());
        }
        Ok(())
    }

    pub fn set_matrix4<D: GraphicsDevice>(
        &self,
        ctx: &mut Context<D>,
        name: &str,
        value: &Matrix4,
    ) -> Result<(), GfxError> {
        if let Some(location) = self.uniform(name)? {
            ctx.device_mut().uniform_matrix4fv(location, value.elements());
        }
        Ok(())
    }
}
