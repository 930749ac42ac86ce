use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a GPU buffer owned by a renderer.
///
/// Geometry attributes refer to buffers through this id only; the raw bytes
/// live behind the graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(pub Uuid);

impl BufferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BufferId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Errors raised while building layout descriptors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("item size {0} is outside 1..=16")]
    ItemSize(u8),
    #[error("unknown component type {0}")]
    ComponentType(u32),
    #[error("unknown draw mode {0}")]
    DrawMode(u32),
    #[error("unknown binding target {0}")]
    BindingTarget(u32),
}

/// Numeric type of a single vertex component. Discriminants are the GL enum
/// values, which the asset format reuses verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum ComponentType {
    /// Signed 8-bit integer.
    Byte = 5120,
    /// Unsigned 8-bit integer.
    UnsignedByte = 5121,
    /// Signed 16-bit integer.
    Short = 5122,
    /// Unsigned 16-bit integer.
    UnsignedShort = 5123,
    /// Unsigned 32-bit integer.
    UnsignedInt = 5125,
    /// 32-bit IEEE float.
    Float = 5126,
}

impl ComponentType {
    /// Width of one element in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }

    /// Only unsigned integer types may address vertices.
    pub fn is_index_type(self) -> bool {
        matches!(
            self,
            Self::UnsignedByte | Self::UnsignedShort | Self::UnsignedInt
        )
    }

    pub fn gl_enum(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = LayoutError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            5120 => Self::Byte,
            5121 => Self::UnsignedByte,
            5122 => Self::Short,
            5123 => Self::UnsignedShort,
            5125 => Self::UnsignedInt,
            5126 => Self::Float,
            other => return Err(LayoutError::ComponentType(other)),
        })
    }
}

impl From<ComponentType> for u32 {
    fn from(value: ComponentType) -> Self {
        value.gl_enum()
    }
}

/// Addressing metadata for one vertex attribute inside a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AttributeLayout {
    item_size: u8,
    pub component_type: ComponentType,
    pub normalized: bool,
    /// Byte distance between consecutive items; 0 means tightly packed.
    pub stride: u32,
    /// Byte offset of the first item inside the buffer.
    pub offset: u32,
}

impl AttributeLayout {
    pub fn new(
        item_size: u8,
        component_type: ComponentType,
        normalized: bool,
        stride: u32,
        offset: u32,
    ) -> Result<Self, LayoutError> {
        if !(1..=16).contains(&item_size) {
            return Err(LayoutError::ItemSize(item_size));
        }
        Ok(Self {
            item_size,
            component_type,
            normalized,
            stride,
            offset,
        })
    }

    /// Tightly packed layout starting at byte 0.
    pub fn packed(item_size: u8, component_type: ComponentType) -> Result<Self, LayoutError> {
        Self::new(item_size, component_type, false, 0, 0)
    }

    pub fn item_size(&self) -> u8 {
        self.item_size
    }

    /// Bytes occupied by one item (ignoring stride).
    pub fn item_bytes(&self) -> usize {
        self.item_size as usize * self.component_type.byte_size()
    }
}

/// Primitive assembly mode of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum DrawMode {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    #[default]
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

impl TryFrom<u32> for DrawMode {
    type Error = LayoutError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Points,
            1 => Self::Lines,
            2 => Self::LineLoop,
            3 => Self::LineStrip,
            4 => Self::Triangles,
            5 => Self::TriangleStrip,
            6 => Self::TriangleFan,
            other => return Err(LayoutError::DrawMode(other)),
        })
    }
}

impl From<DrawMode> for u32 {
    fn from(value: DrawMode) -> Self {
        value as u32
    }
}

/// Bind point of a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum BindingTarget {
    /// Vertex attribute data.
    ArrayBuffer = 34962,
    /// Element indices.
    ElementArrayBuffer = 34963,
}

impl TryFrom<u32> for BindingTarget {
    type Error = LayoutError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            34962 => Ok(Self::ArrayBuffer),
            34963 => Ok(Self::ElementArrayBuffer),
            other => Err(LayoutError::BindingTarget(other)),
        }
    }
}

impl From<BindingTarget> for u32 {
    fn from(value: BindingTarget) -> Self {
        value as u32
    }
}

/// Expected update pattern of buffer contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataUsage {
    /// Written once, drawn many times.
    #[default]
    StaticDraw,
    /// Rewritten often, drawn many times.
    DynamicDraw,
    /// Written once, drawn a few times.
    StreamDraw,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_id_uniqueness() {
        let a = BufferId::new();
        let b = BufferId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn component_sizes() {
        assert_eq!(ComponentType::Byte.byte_size(), 1);
        assert_eq!(ComponentType::UnsignedShort.byte_size(), 2);
        assert_eq!(ComponentType::Float.byte_size(), 4);
        assert!(ComponentType::UnsignedInt.is_index_type());
        assert!(!ComponentType::Float.is_index_type());
    }

    #[test]
    fn component_type_from_gl_enum() {
        assert_eq!(ComponentType::try_from(5126), Ok(ComponentType::Float));
        assert_eq!(
            ComponentType::try_from(5124),
            Err(LayoutError::ComponentType(5124))
        );
    }

    #[test]
    fn layout_rejects_bad_item_size() {
        assert!(AttributeLayout::packed(0, ComponentType::Float).is_err());
        assert!(AttributeLayout::packed(17, ComponentType::Float).is_err());
        let layout = AttributeLayout::packed(16, ComponentType::Float).unwrap();
        assert_eq!(layout.item_bytes(), 64);
    }

    #[test]
    fn draw_mode_defaults_to_triangles() {
        assert_eq!(DrawMode::default(), DrawMode::Triangles);
        assert_eq!(DrawMode::try_from(1), Ok(DrawMode::Lines));
    }
}
