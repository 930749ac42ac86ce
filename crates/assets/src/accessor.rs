use crate::AssetError;
use crate::array::{
    AccessorData, BufferAttribute, ElementArray, InterleavedAttribute, InterleavedBuffer, span_end,
};
use crate::document::{AccessorDef, BufferViewDef, Document, SparseDef, element};
use std::collections::BTreeMap;
use std::sync::Arc;
use vesta_common::ComponentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct InterleavedKey {
    view: usize,
    component_type: ComponentType,
    /// Row index of the accessor's first element within the view.
    slice: usize,
    count: usize,
}

/// Turns accessor definitions into attribute data over fetched buffers.
///
/// Interleaved storage is cached per resolver, so accessors that read lanes
/// of the same strided region share one [`InterleavedBuffer`].
pub struct AccessorResolver<'a> {
    document: &'a Document,
    buffers: &'a [Arc<[u8]>],
    interleaved: BTreeMap<InterleavedKey, Arc<InterleavedBuffer>>,
}

impl<'a> AccessorResolver<'a> {
    pub fn new(document: &'a Document, buffers: &'a [Arc<[u8]>]) -> Self {
        Self {
            document,
            buffers,
            interleaved: BTreeMap::new(),
        }
    }

    /// Number of distinct interleaved buffers created so far.
    pub fn interleaved_buffers(&self) -> usize {
        self.interleaved.len()
    }

    /// Resolve every accessor, in index order.
    pub fn resolve_all(&mut self) -> Result<Vec<AccessorData>, AssetError> {
        let count = self.document.accessors()?.len();
        (0..count).map(|i| self.resolve(i)).collect()
    }

    pub fn resolve(&mut self, index: usize) -> Result<AccessorData, AssetError> {
        let document = self.document;
        let def = element(document.accessors()?, "accessors", index)?;
        let item_size = def.kind.item_size();
        // Saturates so an oversized count fails the byte range checks below.
        let components = def.count.saturating_mul(item_size as usize);

        let data = match def.buffer_view {
            None => AccessorData::Packed(BufferAttribute {
                array: ElementArray::zeroed(def.component_type, components)?,
                item_size,
                normalized: def.normalized,
                view: None,
            }),
            Some(view_index) => {
                let view = element(document.buffer_views()?, "bufferViews", view_index)?;
                let item_bytes = def.component_type.byte_size() * item_size as usize;
                match view.byte_stride {
                    Some(stride) if stride != item_bytes => {
                        self.interleaved_lane(index, def, view_index, view, stride)?
                    }
                    _ => {
                        let array = self.view_array(
                            view,
                            def.byte_offset,
                            def.component_type,
                            components,
                        )?;
                        AccessorData::Packed(BufferAttribute {
                            array,
                            item_size,
                            normalized: def.normalized,
                            view: Some(view_index),
                        })
                    }
                }
            }
        };

        match &def.sparse {
            Some(sparse) => self.apply_sparse(index, def, sparse, data),
            None => Ok(data),
        }
    }

    fn buffer(&self, index: usize) -> Result<&Arc<[u8]>, AssetError> {
        element(self.buffers, "buffers", index)
    }

    /// Packed elements at `byte_offset` inside a bufferView, bounded by the view.
    fn view_array(
        &self,
        view: &BufferViewDef,
        byte_offset: usize,
        component_type: ComponentType,
        len: usize,
    ) -> Result<ElementArray, AssetError> {
        let start = view.byte_offset.saturating_add(byte_offset);
        let view_end = view.byte_offset.saturating_add(view.byte_length);
        span_end(start, len, component_type.byte_size(), view_end)?;
        ElementArray::view(component_type, self.buffer(view.buffer)?, start, len)
    }

    fn interleaved_lane(
        &mut self,
        index: usize,
        def: &AccessorDef,
        view_index: usize,
        view: &BufferViewDef,
        stride: usize,
    ) -> Result<AccessorData, AssetError> {
        let element_bytes = def.component_type.byte_size();
        if stride == 0 || stride % element_bytes != 0 || def.byte_offset % element_bytes != 0 {
            return Err(AssetError::MisalignedStride {
                view: view_index,
                stride,
                element_bytes,
            });
        }
        let slice = def.byte_offset / stride;
        let start = view.byte_offset.saturating_add(slice * stride);
        let view_end = view.byte_offset.saturating_add(view.byte_length);
        let key = InterleavedKey {
            view: view_index,
            component_type: def.component_type,
            slice,
            count: def.count,
        };

        let buffer = match self.interleaved.get(&key) {
            Some(buffer) => {
                tracing::trace!(accessor = index, view = view_index, "interleaved buffer cache hit");
                Arc::clone(buffer)
            }
            None => {
                let rows_end = def
                    .count
                    .checked_mul(stride)
                    .and_then(|bytes| bytes.checked_add(start))
                    .unwrap_or(usize::MAX);
                // The last row may omit trailing padding.
                let end = rows_end.min(view_end);
                if start > end {
                    return Err(AssetError::OutOfBounds {
                        offset: start,
                        end: rows_end,
                        available: view_end,
                    });
                }
                let array = ElementArray::view(
                    def.component_type,
                    self.buffer(view.buffer)?,
                    start,
                    (end - start) / element_bytes,
                )?;
                let buffer = Arc::new(InterleavedBuffer {
                    array,
                    stride: stride / element_bytes,
                    count: def.count,
                });
                self.interleaved.insert(key, Arc::clone(&buffer));
                buffer
            }
        };

        let offset = (def.byte_offset % stride) / element_bytes;
        let item_size = def.kind.item_size();
        if def.count > 0 {
            let needed = (def.count - 1)
                .checked_mul(buffer.stride)
                .and_then(|n| n.checked_add(offset + item_size as usize))
                .unwrap_or(usize::MAX);
            if needed > buffer.array.len() {
                return Err(AssetError::OutOfBounds {
                    offset: start,
                    end: needed
                        .checked_mul(element_bytes)
                        .and_then(|bytes| bytes.checked_add(start))
                        .unwrap_or(usize::MAX),
                    available: view_end,
                });
            }
        }

        Ok(AccessorData::Interleaved(InterleavedAttribute {
            buffer,
            item_size,
            offset,
            normalized: def.normalized,
        }))
    }

    fn apply_sparse(
        &self,
        index: usize,
        def: &AccessorDef,
        sparse: &SparseDef,
        data: AccessorData,
    ) -> Result<AccessorData, AssetError> {
        let item_size = def.kind.item_size() as usize;
        if item_size > 4 {
            return Err(AssetError::UnsupportedSparse {
                accessor: index,
                reason: "matrix element types",
            });
        }
        if !sparse.indices.component_type.is_index_type() {
            return Err(AssetError::UnsupportedSparse {
                accessor: index,
                reason: "indices must be unsigned integers",
            });
        }

        let views = self.document.buffer_views()?;
        let indices_view = element(views, "bufferViews", sparse.indices.buffer_view)?;
        let indices = self.view_array(
            indices_view,
            sparse.indices.byte_offset,
            sparse.indices.component_type,
            sparse.count,
        )?;
        let values_view = element(views, "bufferViews", sparse.values.buffer_view)?;
        let values: Vec<f64> = self
            .view_array(
                values_view,
                sparse.values.byte_offset,
                def.component_type,
                sparse.count.saturating_mul(item_size),
            )?
            .iter()
            .collect();

        // The base may alias a bufferView other accessors read; `set` copies
        // it before the first write.
        let mut base = data.into_packed();
        base.view = None;
        let count = base.count();
        for (target, tuple) in indices.iter().zip(values.chunks(item_size)) {
            let target = target as usize;
            if target >= count {
                return Err(AssetError::IndexOutOfRange {
                    section: "sparse targets",
                    index: target,
                });
            }
            for (component, value) in tuple.iter().enumerate() {
                base.array.set(target * item_size + component, *value)?;
            }
        }
        tracing::debug!(accessor = index, patched = sparse.count, "applied sparse overlay");
        Ok(AccessorData::Packed(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn setup(json: &str, bytes: Vec<u8>) -> (Document, Vec<Arc<[u8]>>) {
        (Document::from_slice(json.as_bytes()).unwrap(), vec![Arc::from(bytes)])
    }

    #[test]
    fn packed_vec3_reads_raw_floats() {
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [{ "buffer": 0, "byteLength": 24 }],
                "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3" }]
            }"#,
            floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        let data = resolver.resolve(0).unwrap();
        assert!(!data.is_interleaved());
        assert_eq!(data.count(), 2);
        assert_eq!(data.to_f32_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn packed_respects_offsets() {
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [{ "buffer": 0, "byteOffset": 4, "byteLength": 16 }],
                "accessors": [{ "bufferView": 0, "byteOffset": 4, "componentType": 5126, "count": 2, "type": "SCALAR" }]
            }"#,
            floats(&[9.0, 1.0, 2.0, 3.0, 4.0]),
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        assert_eq!(resolver.resolve(0).unwrap().to_f32_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn stride_equal_to_item_size_is_packed() {
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [{ "buffer": 0, "byteLength": 8, "byteStride": 8 }],
                "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 1, "type": "VEC2" }]
            }"#,
            floats(&[1.0, 2.0]),
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        assert!(!resolver.resolve(0).unwrap().is_interleaved());
        assert_eq!(resolver.interleaved_buffers(), 0);
    }

    #[test]
    fn interleaved_lanes_share_one_buffer() {
        // Two rows of 8 floats: position xyz, normal xyz, uv.
        let row = |i: f32| [i, i, i, 10.0 + i, 10.0 + i, 10.0 + i, 0.5, 0.5];
        let mut values = row(1.0).to_vec();
        values.extend(row(2.0));
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [{ "buffer": 0, "byteLength": 64, "byteStride": 32 }],
                "accessors": [
                    { "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3" },
                    { "bufferView": 0, "byteOffset": 12, "componentType": 5126, "count": 2, "type": "VEC3" }
                ]
            }"#,
            floats(&values),
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        let all = resolver.resolve_all().unwrap();
        let (AccessorData::Interleaved(position), AccessorData::Interleaved(normal)) =
            (&all[0], &all[1])
        else {
            panic!("expected interleaved lanes");
        };
        assert!(Arc::ptr_eq(&position.buffer, &normal.buffer));
        assert_eq!(resolver.interleaved_buffers(), 1);
        assert_eq!(normal.offset, 3);
        assert_eq!(all[0].to_f32_vec(), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(all[1].to_f32_vec(), vec![11.0, 11.0, 11.0, 12.0, 12.0, 12.0]);
    }

    #[test]
    fn interleaved_view_offset_is_honoured() {
        // One float of padding before the view, then rows of [x, y, u, v].
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [{ "buffer": 0, "byteOffset": 4, "byteLength": 32, "byteStride": 16 }],
                "accessors": [
                    { "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC2" },
                    { "bufferView": 0, "byteOffset": 8, "componentType": 5126, "count": 2, "type": "VEC2" },
                    { "bufferView": 0, "byteOffset": 24, "componentType": 5126, "count": 1, "type": "VEC2" }
                ]
            }"#,
            floats(&[99.0, 1.0, 2.0, 7.0, 8.0, 3.0, 4.0, 9.0, 10.0]),
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        let all = resolver.resolve_all().unwrap();
        assert!(all.iter().all(AccessorData::is_interleaved));
        assert_eq!(all[0].to_f32_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(all[1].to_f32_vec(), vec![7.0, 8.0, 9.0, 10.0]);
        assert_eq!(all[2].to_f32_vec(), vec![9.0, 10.0]);
        assert_eq!(resolver.interleaved_buffers(), 2);
    }

    #[test]
    fn oversized_counts_are_out_of_bounds() {
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [
                    { "buffer": 0, "byteLength": 12 },
                    { "buffer": 0, "byteLength": 12, "byteStride": 8 }
                ],
                "accessors": [
                    { "bufferView": 0, "componentType": 5126, "count": 4611686018427387905, "type": "VEC3" },
                    { "componentType": 5126, "count": 4611686018427387905, "type": "VEC3" },
                    { "bufferView": 1, "componentType": 5126, "count": 4611686018427387905, "type": "SCALAR" },
                    {
                        "bufferView": 0, "componentType": 5126, "count": 1, "type": "SCALAR",
                        "sparse": {
                            "count": 4611686018427387905,
                            "indices": { "bufferView": 0, "componentType": 5125 },
                            "values": { "bufferView": 0 }
                        }
                    }
                ]
            }"#,
            floats(&[1.0, 2.0, 3.0]),
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        for index in 0..4 {
            assert!(
                matches!(resolver.resolve(index), Err(AssetError::OutOfBounds { .. })),
                "accessor {index}"
            );
        }
    }

    #[test]
    fn misaligned_stride_is_rejected() {
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [{ "buffer": 0, "byteLength": 16, "byteStride": 6 }],
                "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 1, "type": "SCALAR" }]
            }"#,
            floats(&[0.0; 4]),
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        assert!(matches!(
            resolver.resolve(0),
            Err(AssetError::MisalignedStride { stride: 6, .. })
        ));
    }

    #[test]
    fn hole_accessor_is_zero_filled() {
        let (doc, buffers) = setup(
            r#"{ "accessors": [{ "componentType": 5126, "count": 3, "type": "VEC2" }] }"#,
            Vec::new(),
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        assert_eq!(resolver.resolve(0).unwrap().to_f32_vec(), vec![0.0; 6]);
    }

    #[test]
    fn sparse_overlay_does_not_touch_aliases() {
        // view 0: 4 zeroed vec3; view 1: sparse index 2 (u16 + padding); view 2: values
        let mut bytes = floats(&[0.0; 12]);
        bytes.extend([2u8, 0, 0, 0]);
        bytes.extend(floats(&[1.0, 2.0, 3.0]));
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [
                    { "buffer": 0, "byteLength": 48 },
                    { "buffer": 0, "byteOffset": 48, "byteLength": 4 },
                    { "buffer": 0, "byteOffset": 52, "byteLength": 12 }
                ],
                "accessors": [
                    {
                        "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
                        "sparse": {
                            "count": 1,
                            "indices": { "bufferView": 1, "componentType": 5123 },
                            "values": { "bufferView": 2 }
                        }
                    },
                    { "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3" }
                ]
            }"#,
            bytes,
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        let all = resolver.resolve_all().unwrap();
        assert_eq!(
            all[0].to_f32_vec(),
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0]
        );
        assert_eq!(all[1].to_f32_vec(), vec![0.0; 12]);
        assert_eq!(&buffers[0][24..36], &floats(&[0.0; 3])[..]);
        match &all[0] {
            AccessorData::Packed(patched) => assert_eq!(patched.view, None),
            AccessorData::Interleaved(_) => panic!("sparse result must be packed"),
        }
    }

    #[test]
    fn sparse_on_hole_accessor() {
        let mut bytes = vec![1u8];
        bytes.extend([0u8; 3]);
        bytes.extend(floats(&[5.0]));
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [
                    { "buffer": 0, "byteLength": 1 },
                    { "buffer": 0, "byteOffset": 4, "byteLength": 4 }
                ],
                "accessors": [{
                    "componentType": 5126, "count": 3, "type": "SCALAR",
                    "sparse": {
                        "count": 1,
                        "indices": { "bufferView": 0, "componentType": 5121 },
                        "values": { "bufferView": 1 }
                    }
                }]
            }"#,
            bytes,
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        assert_eq!(resolver.resolve(0).unwrap().to_f32_vec(), vec![0.0, 5.0, 0.0]);
    }

    #[test]
    fn sparse_matrix_is_unsupported() {
        let (doc, buffers) = setup(
            r#"{
                "bufferViews": [{ "buffer": 0, "byteLength": 4 }],
                "accessors": [{
                    "componentType": 5126, "count": 1, "type": "MAT4",
                    "sparse": {
                        "count": 1,
                        "indices": { "bufferView": 0, "componentType": 5121 },
                        "values": { "bufferView": 0 }
                    }
                }]
            }"#,
            vec![0; 4],
        );
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        assert!(matches!(
            resolver.resolve(0),
            Err(AssetError::UnsupportedSparse { accessor: 0, .. })
        ));
    }

    #[test]
    fn out_of_range_reports_section() {
        let (doc, buffers) = setup(r#"{ "accessors": [] }"#, Vec::new());
        let mut resolver = AccessorResolver::new(&doc, &buffers);
        assert!(matches!(
            resolver.resolve(3),
            Err(AssetError::IndexOutOfRange { section: "accessors", index: 3 })
        ));
    }
}
