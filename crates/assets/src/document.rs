use crate::AssetError;
use serde::Deserialize;
use std::collections::BTreeMap;
use vesta_common::{ComponentType, DrawMode};

/// The JSON root of an asset.
///
/// Every section is optional in the file; the getters turn an absent
/// section into [`AssetError::MissingSection`] for operations that need it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub buffers: Option<Vec<BufferDef>>,
    pub buffer_views: Option<Vec<BufferViewDef>>,
    pub accessors: Option<Vec<AccessorDef>>,
    pub meshes: Option<Vec<MeshDef>>,
    pub materials: Option<Vec<MaterialDef>>,
    pub nodes: Option<Vec<NodeDef>>,
    pub scenes: Option<Vec<SceneDef>>,
    /// Default scene index.
    pub scene: Option<usize>,
    pub images: Option<Vec<ImageDef>>,
}

fn section<'a, T>(items: &'a Option<Vec<T>>, name: &'static str) -> Result<&'a [T], AssetError> {
    items.as_deref().ok_or(AssetError::MissingSection(name))
}

/// Fetch `items[index]`, reporting the section name when out of range.
pub(crate) fn element<'a, T>(
    items: &'a [T],
    section: &'static str,
    index: usize,
) -> Result<&'a T, AssetError> {
    items
        .get(index)
        .ok_or(AssetError::IndexOutOfRange { section, index })
}

impl Document {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AssetError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn buffers(&self) -> &[BufferDef] {
        self.buffers.as_deref().unwrap_or_default()
    }

    pub fn images(&self) -> &[ImageDef] {
        self.images.as_deref().unwrap_or_default()
    }

    pub fn buffer_views(&self) -> Result<&[BufferViewDef], AssetError> {
        section(&self.buffer_views, "bufferViews")
    }

    pub fn accessors(&self) -> Result<&[AccessorDef], AssetError> {
        section(&self.accessors, "accessors")
    }

    pub fn meshes(&self) -> Result<&[MeshDef], AssetError> {
        section(&self.meshes, "meshes")
    }

    pub fn materials(&self) -> Result<&[MaterialDef], AssetError> {
        section(&self.materials, "materials")
    }

    pub fn nodes(&self) -> Result<&[NodeDef], AssetError> {
        section(&self.nodes, "nodes")
    }

    pub fn scenes(&self) -> Result<&[SceneDef], AssetError> {
        section(&self.scenes, "scenes")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferDef {
    pub uri: Option<String>,
    pub byte_length: usize,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferViewDef {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    /// GL binding target hint.
    pub target: Option<u32>,
    pub name: Option<String>,
}

/// Shape of one accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    /// Components per element.
    pub fn item_size(self) -> u8 {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorDef {
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
    #[serde(default)]
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub kind: AccessorType,
    pub sparse: Option<SparseDef>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseDef {
    pub count: usize,
    pub indices: SparseIndicesDef,
    pub values: SparseValuesDef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndicesDef {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseValuesDef {
    pub buffer_view: usize,
    #[serde(default)]
    pub byte_offset: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshDef {
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveDef {
    /// Semantic name -> accessor index.
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: Option<DrawMode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDef {
    pub name: Option<String>,
    pub pbr_metallic_roughness: Option<PbrDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrDef {
    pub base_color_factor: Option<[f32; 4]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
    pub name: Option<String>,
    /// Column-major; takes precedence over translation/rotation/scale.
    pub matrix: Option<[f32; 16]>,
    pub translation: Option<[f32; 3]>,
    /// Quaternion `[x, y, z, w]`.
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub mesh: Option<usize>,
    #[serde(default)]
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDef {
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDef {
    pub uri: Option<String>,
    pub mime_type: Option<String>,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"{
        "asset": { "version": "2.0" },
        "buffers": [{ "uri": "tri.bin", "byteLength": 42 }],
        "bufferViews": [
            { "buffer": 0, "byteLength": 36, "target": 34962 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
        "nodes": [{ "mesh": 0, "translation": [1, 2, 3] }],
        "scenes": [{ "nodes": [0] }],
        "scene": 0
    }"#;

    #[test]
    fn parses_camel_case_root() {
        let doc = Document::from_slice(TRIANGLE.as_bytes()).unwrap();
        assert_eq!(doc.buffers()[0].uri.as_deref(), Some("tri.bin"));
        assert_eq!(doc.buffer_views().unwrap()[1].byte_offset, 36);
        let accessor = &doc.accessors().unwrap()[0];
        assert_eq!(accessor.component_type, ComponentType::Float);
        assert_eq!(accessor.kind.item_size(), 3);
        assert_eq!(doc.meshes().unwrap()[0].primitives[0].indices, Some(1));
        assert_eq!(doc.nodes().unwrap()[0].translation, Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn missing_section_is_named() {
        let doc = Document::from_slice(b"{}").unwrap();
        assert!(doc.buffers().is_empty());
        assert!(matches!(
            doc.accessors(),
            Err(AssetError::MissingSection("accessors"))
        ));
        assert!(matches!(
            doc.buffer_views(),
            Err(AssetError::MissingSection("bufferViews"))
        ));
    }

    #[test]
    fn rejects_unknown_component_type() {
        let json = r#"{ "accessors": [{ "componentType": 5124, "count": 1, "type": "SCALAR" }] }"#;
        assert!(matches!(
            Document::from_slice(json.as_bytes()),
            Err(AssetError::Json(_))
        ));
    }

    #[test]
    fn matrix_item_sizes() {
        assert_eq!(AccessorType::Mat2.item_size(), 4);
        assert_eq!(AccessorType::Mat3.item_size(), 9);
        assert_eq!(AccessorType::Mat4.item_size(), 16);
    }
}
