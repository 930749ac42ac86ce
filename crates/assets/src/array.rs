use crate::AssetError;
use std::sync::Arc;
use vesta_common::ComponentType;

/// End of `len` elements of `element_bytes` each starting at `offset`.
///
/// Overflow saturates to `usize::MAX`, so it always lands past `available`.
pub(crate) fn span_end(
    offset: usize,
    len: usize,
    element_bytes: usize,
    available: usize,
) -> Result<usize, AssetError> {
    let end = len
        .checked_mul(element_bytes)
        .and_then(|bytes| bytes.checked_add(offset))
        .unwrap_or(usize::MAX);
    if end > available {
        return Err(AssetError::OutOfBounds {
            offset,
            end,
            available,
        });
    }
    Ok(end)
}

/// A typed window over shared bytes.
///
/// Elements are little-endian and read through the component type; the
/// window never copies until [`ElementArray::set`] is called while the bytes
/// are shared.
#[derive(Debug, Clone)]
pub struct ElementArray {
    component_type: ComponentType,
    bytes: Arc<[u8]>,
    byte_offset: usize,
    len: usize,
}

impl ElementArray {
    /// Zero-copy view of `len` elements starting at `byte_offset`.
    pub fn view(
        component_type: ComponentType,
        bytes: &Arc<[u8]>,
        byte_offset: usize,
        len: usize,
    ) -> Result<Self, AssetError> {
        span_end(byte_offset, len, component_type.byte_size(), bytes.len())?;
        Ok(Self {
            component_type,
            bytes: Arc::clone(bytes),
            byte_offset,
            len,
        })
    }

    /// `len` zero elements in freshly owned bytes.
    ///
    /// Fails instead of aborting when the byte size overflows or cannot be
    /// allocated.
    pub fn zeroed(component_type: ComponentType, len: usize) -> Result<Self, AssetError> {
        let size = span_end(0, len, component_type.byte_size(), isize::MAX as usize)?;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| AssetError::OutOfBounds {
                offset: 0,
                end: size,
                available: 0,
            })?;
        bytes.resize(size, 0);
        Ok(Self {
            component_type,
            bytes: Arc::from(bytes),
            byte_offset: 0,
            len,
        })
    }

    pub fn from_bytes(component_type: ComponentType, bytes: Vec<u8>) -> Self {
        let len = bytes.len() / component_type.byte_size();
        Self {
            component_type,
            bytes: Arc::from(bytes),
            byte_offset: 0,
            len,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when both arrays read the same bytes (not merely equal bytes).
    pub fn shares_bytes(&self, other: &ElementArray) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes) && self.byte_offset == other.byte_offset
    }

    pub fn as_bytes(&self) -> &[u8] {
        let end = self.byte_offset + self.len * self.component_type.byte_size();
        &self.bytes[self.byte_offset..end]
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len {
            return None;
        }
        let size = self.component_type.byte_size();
        let at = self.byte_offset + index * size;
        let raw = &self.bytes[at..at + size];
        Some(match self.component_type {
            ComponentType::Byte => f64::from(raw[0] as i8),
            ComponentType::UnsignedByte => f64::from(raw[0]),
            ComponentType::Short => f64::from(i16::from_le_bytes([raw[0], raw[1]])),
            ComponentType::UnsignedShort => f64::from(u16::from_le_bytes([raw[0], raw[1]])),
            ComponentType::UnsignedInt => {
                f64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            ComponentType::Float => f64::from(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).filter_map(|i| self.get(i))
    }

    /// Write one element, copying the window first if anyone else holds
    /// the underlying bytes.
    pub fn set(&mut self, index: usize, value: f64) -> Result<(), AssetError> {
        let size = self.component_type.byte_size();
        if index >= self.len {
            return Err(AssetError::OutOfBounds {
                offset: index * size,
                end: (index + 1) * size,
                available: self.len * size,
            });
        }
        if Arc::get_mut(&mut self.bytes).is_none() {
            tracing::trace!(elements = self.len, "copying shared array before write");
            self.bytes = Arc::from(self.as_bytes());
            self.byte_offset = 0;
        }
        let at = self.byte_offset + index * size;
        let encoded: Vec<u8> = match self.component_type {
            ComponentType::Byte => (value as i8).to_le_bytes().to_vec(),
            ComponentType::UnsignedByte => (value as u8).to_le_bytes().to_vec(),
            ComponentType::Short => (value as i16).to_le_bytes().to_vec(),
            ComponentType::UnsignedShort => (value as u16).to_le_bytes().to_vec(),
            ComponentType::UnsignedInt => (value as u32).to_le_bytes().to_vec(),
            ComponentType::Float => (value as f32).to_le_bytes().to_vec(),
        };
        if let Some(bytes) = Arc::get_mut(&mut self.bytes) {
            bytes[at..at + size].copy_from_slice(&encoded);
        }
        Ok(())
    }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.iter().map(|v| v as f32).collect()
    }
}

/// Strided storage shared by several attributes.
#[derive(Debug)]
pub struct InterleavedBuffer {
    pub array: ElementArray,
    /// Elements between the starts of consecutive rows.
    pub stride: usize,
    /// Rows covered.
    pub count: usize,
}

/// Tightly packed attribute data.
#[derive(Debug, Clone)]
pub struct BufferAttribute {
    pub array: ElementArray,
    pub item_size: u8,
    pub normalized: bool,
    /// The bufferView the array reads directly, if it still does.
    pub view: Option<usize>,
}

impl BufferAttribute {
    pub fn count(&self) -> usize {
        self.array.len() / self.item_size as usize
    }
}

/// One lane of an [`InterleavedBuffer`].
#[derive(Debug, Clone)]
pub struct InterleavedAttribute {
    pub buffer: Arc<InterleavedBuffer>,
    pub item_size: u8,
    /// Element offset of this lane inside a row.
    pub offset: usize,
    pub normalized: bool,
}

impl InterleavedAttribute {
    fn get(&self, item: usize, component: usize) -> Option<f64> {
        if item >= self.buffer.count || component >= self.item_size as usize {
            return None;
        }
        self.buffer
            .array
            .get(item * self.buffer.stride + self.offset + component)
    }
}

/// A resolved accessor.
#[derive(Debug, Clone)]
pub enum AccessorData {
    Packed(BufferAttribute),
    Interleaved(InterleavedAttribute),
}

impl AccessorData {
    pub fn item_size(&self) -> u8 {
        match self {
            Self::Packed(a) => a.item_size,
            Self::Interleaved(a) => a.item_size,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Self::Packed(a) => a.count(),
            Self::Interleaved(a) => a.buffer.count,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::Packed(a) => a.array.component_type(),
            Self::Interleaved(a) => a.buffer.array.component_type(),
        }
    }

    pub fn normalized(&self) -> bool {
        match self {
            Self::Packed(a) => a.normalized,
            Self::Interleaved(a) => a.normalized,
        }
    }

    pub fn is_interleaved(&self) -> bool {
        matches!(self, Self::Interleaved(_))
    }

    /// Component `component` of item `item`.
    pub fn get(&self, item: usize, component: usize) -> Option<f64> {
        match self {
            Self::Packed(a) if component < a.item_size as usize => {
                a.array.get(item * a.item_size as usize + component)
            }
            Self::Packed(_) => None,
            Self::Interleaved(a) => a.get(item, component),
        }
    }

    /// All components of all items, in item order.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::Packed(a) => a.array.to_f32_vec(),
            Self::Interleaved(a) => (0..a.buffer.count)
                .flat_map(|item| (0..a.item_size as usize).map(move |c| (item, c)))
                .filter_map(|(item, c)| a.get(item, c))
                .map(|v| v as f32)
                .collect(),
        }
    }

    /// Packed form. Interleaved lanes are copied out into fresh storage.
    pub fn into_packed(self) -> BufferAttribute {
        match self {
            Self::Packed(a) => a,
            Self::Interleaved(a) => {
                let array = &a.buffer.array;
                let size = array.component_type().byte_size();
                let lane_bytes = a.item_size as usize * size;
                let source = array.as_bytes();
                let mut bytes = Vec::with_capacity(a.buffer.count * lane_bytes);
                for row in 0..a.buffer.count {
                    let start = (row * a.buffer.stride + a.offset) * size;
                    if let Some(lane) = source.get(start..start + lane_bytes) {
                        bytes.extend_from_slice(lane);
                    }
                }
                BufferAttribute {
                    array: ElementArray::from_bytes(array.component_type(), bytes),
                    item_size: a.item_size,
                    normalized: a.normalized,
                    view: None,
                }
            }
        }
    }
}
