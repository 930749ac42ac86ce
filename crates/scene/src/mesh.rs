use std::collections::BTreeMap;
use std::sync::Arc;
use vesta_common::{AttributeLayout, BufferId, DrawMode};
use vesta_math::Vector3;

/// A vertex (or index) stream: which buffer, and how to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub buffer: BufferId,
    pub layout: AttributeLayout,
}

impl Attribute {
    pub fn new(buffer: BufferId, layout: AttributeLayout) -> Self {
        Self { buffer, layout }
    }
}

/// Named attribute streams plus draw parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    /// Keyed by lowercase semantic name (`position`, `normal`, ...).
    pub attributes: BTreeMap<String, Attribute>,
    /// Vertices to draw, or indices when `index` is set.
    pub count: u32,
    pub index: Option<Attribute>,
    pub mode: Option<DrawMode>,
}

impl Geometry {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn with_index(mut self, index: Attribute) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_mode(mut self, mode: DrawMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Declared mode, triangles otherwise.
    pub fn draw_mode(&self) -> DrawMode {
        self.mode.unwrap_or_default()
    }
}

/// Surface appearance: a flat base color and the shader to draw with.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: Vector3,
    /// Registered shader tag; `None` selects the renderer's default.
    pub shader_tag: Option<String>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_owned(),
            color: Vector3::ONE,
            shader_tag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub geometry: Arc<Geometry>,
    pub material: Arc<Material>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}
