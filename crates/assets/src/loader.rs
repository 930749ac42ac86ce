use crate::AssetError;
use crate::accessor::AccessorResolver;
use crate::array::{AccessorData, InterleavedBuffer};
use crate::document::{Document, element};
use crate::fetch::Asset;
use std::collections::BTreeMap;
use std::sync::Arc;
use vesta_common::{AttributeLayout, BindingTarget, BufferAllocator, BufferId, DataUsage};
use vesta_math::{Matrix4, Quaternion, Vector3};
use vesta_scene::{Attribute, Geometry, Material, Mesh, Node, NodeId, Primitive, SceneGraph};

/// Options for [`Loader`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderOptions {
    /// Usage hint passed with every buffer upload.
    pub buffer_usage: DataUsage,
}

/// Builds meshes, nodes and scenes from a fetched asset.
///
/// All accessors are resolved up front. GPU buffers are created lazily
/// through a [`BufferAllocator`] and deduplicated: one upload per
/// (bufferView, target), one per shared interleaved buffer, and one per
/// accessor whose data no longer lives in a bufferView (holes and sparse
/// results).
///
/// A node listed by several scenes is built once; attaching it to a later
/// scene root moves it there.
pub struct Loader<'a> {
    document: &'a Document,
    buffers: &'a [Arc<[u8]>],
    options: LoaderOptions,
    accessors: Vec<AccessorData>,
    view_uploads: BTreeMap<(usize, BindingTarget), BufferId>,
    interleaved_uploads: Vec<(Arc<InterleavedBuffer>, BufferId)>,
    owned_uploads: BTreeMap<(usize, BindingTarget), BufferId>,
    materials: BTreeMap<usize, Arc<Material>>,
    meshes: BTreeMap<usize, Arc<Mesh>>,
    nodes: BTreeMap<usize, NodeId>,
}

impl<'a> Loader<'a> {
    pub fn new(
        document: &'a Document,
        buffers: &'a [Arc<[u8]>],
        options: LoaderOptions,
    ) -> Result<Self, AssetError> {
        let accessors = if document.accessors.is_some() {
            AccessorResolver::new(document, buffers).resolve_all()?
        } else {
            Vec::new()
        };
        Ok(Self {
            document,
            buffers,
            options,
            accessors,
            view_uploads: BTreeMap::new(),
            interleaved_uploads: Vec::new(),
            owned_uploads: BTreeMap::new(),
            materials: BTreeMap::new(),
            meshes: BTreeMap::new(),
            nodes: BTreeMap::new(),
        })
    }

    pub fn from_asset(asset: &'a Asset, options: LoaderOptions) -> Result<Self, AssetError> {
        Self::new(&asset.document, &asset.buffers, options)
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn accessor(&self, index: usize) -> Result<&AccessorData, AssetError> {
        self.document.accessors()?;
        element(&self.accessors, "accessors", index)
    }

    pub fn accessors(&self) -> &[AccessorData] {
        &self.accessors
    }

    /// Index of the scene to show by default.
    pub fn default_scene(&self) -> Option<usize> {
        self.document.scene
    }

    pub fn load_material(&mut self, index: usize) -> Result<Arc<Material>, AssetError> {
        if let Some(material) = self.materials.get(&index) {
            return Ok(Arc::clone(material));
        }
        let document = self.document;
        let def = element(document.materials()?, "materials", index)?;
        let color = def
            .pbr_metallic_roughness
            .as_ref()
            .and_then(|pbr| pbr.base_color_factor)
            .map(|[r, g, b, _]| Vector3::new(r, g, b))
            .unwrap_or(Vector3::ONE);
        let material = Arc::new(Material {
            name: def.name.clone().unwrap_or_else(|| format!("material{index}")),
            color,
            shader_tag: None,
        });
        self.materials.insert(index, Arc::clone(&material));
        Ok(material)
    }

    pub fn load_mesh(
        &mut self,
        index: usize,
        allocator: &mut impl BufferAllocator,
    ) -> Result<Arc<Mesh>, AssetError> {
        if let Some(mesh) = self.meshes.get(&index) {
            return Ok(Arc::clone(mesh));
        }
        let document = self.document;
        let def = element(document.meshes()?, "meshes", index)?;
        let mut primitives = Vec::with_capacity(def.primitives.len());
        for primitive in &def.primitives {
            let mut geometry = Geometry::new(0);
            for (semantic, &accessor) in &primitive.attributes {
                let attribute = self.upload(accessor, BindingTarget::ArrayBuffer, allocator)?;
                geometry
                    .attributes
                    .insert(semantic.to_lowercase(), attribute);
            }
            let count = match primitive.indices {
                Some(accessor) => {
                    if self.accessor(accessor)?.is_interleaved() {
                        return Err(AssetError::InterleavedIndices(accessor));
                    }
                    let index = self.upload(accessor, BindingTarget::ElementArrayBuffer, allocator)?;
                    geometry.index = Some(index);
                    self.accessor(accessor)?.count()
                }
                None => match primitive.attributes.values().next() {
                    Some(&first) => self.accessor(first)?.count(),
                    None => 0,
                },
            };
            geometry.count = layout_u32("vertex count", count)?;
            geometry.mode = primitive.mode;

            let material = match primitive.material {
                Some(material) => self.load_material(material)?,
                None => Arc::new(Material::default()),
            };
            primitives.push(Primitive {
                geometry: Arc::new(geometry),
                material,
            });
        }
        let mesh = Arc::new(Mesh {
            name: def.name.clone().unwrap_or_else(|| format!("mesh{index}")),
            primitives,
        });
        tracing::debug!(mesh = index, primitives = mesh.primitives.len(), "built mesh");
        self.meshes.insert(index, Arc::clone(&mesh));
        Ok(mesh)
    }

    /// Build node `index` and its subtree into `graph`.
    pub fn load_node(
        &mut self,
        index: usize,
        graph: &mut SceneGraph,
        allocator: &mut impl BufferAllocator,
    ) -> Result<NodeId, AssetError> {
        if let Some(&id) = self.nodes.get(&index) {
            return Ok(id);
        }
        let document = self.document;
        let def = element(document.nodes()?, "nodes", index)?;

        let (position, quaternion, scale) = match def.matrix {
            Some(matrix) => Matrix4::from_cols_array(matrix).decompose(),
            None => (
                def.translation.map(Vector3::from_array).unwrap_or(Vector3::ZERO),
                def.rotation
                    .map(Quaternion::from_array)
                    .unwrap_or(Quaternion::IDENTITY),
                def.scale.map(Vector3::from_array).unwrap_or(Vector3::ONE),
            ),
        };
        let mut node = match &def.name {
            Some(name) => Node::named(name.clone()),
            None => Node::new(),
        };
        node.set_transform(position, quaternion, scale);
        if let Some(mesh) = def.mesh {
            node = node.with_mesh(self.load_mesh(mesh, allocator)?);
        }

        let id = graph.insert(node);
        self.nodes.insert(index, id);
        for &child in &def.children {
            let child = self.load_node(child, graph, allocator)?;
            graph.add(id, child)?;
        }
        Ok(id)
    }

    /// Build scene `index` under a fresh root node.
    pub fn load_scene(
        &mut self,
        index: usize,
        graph: &mut SceneGraph,
        allocator: &mut impl BufferAllocator,
    ) -> Result<NodeId, AssetError> {
        let document = self.document;
        let def = element(document.scenes()?, "scenes", index)?;
        let name = def.name.clone().unwrap_or_else(|| format!("scene{index}"));
        let root = graph.insert(Node::named(name));
        for &node in &def.nodes {
            let child = self.load_node(node, graph, allocator)?;
            graph.add(root, child)?;
        }
        Ok(root)
    }

    /// Build every scene, returning their roots in document order.
    pub fn load_scenes(
        &mut self,
        graph: &mut SceneGraph,
        allocator: &mut impl BufferAllocator,
    ) -> Result<Vec<NodeId>, AssetError> {
        let _span = tracing::info_span!("load_scenes").entered();
        let count = self.document.scenes()?.len();
        let roots = (0..count)
            .map(|i| self.load_scene(i, graph, allocator))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            scenes = roots.len(),
            nodes = self.nodes.len(),
            meshes = self.meshes.len(),
            "asset loaded"
        );
        Ok(roots)
    }

    /// Upload the data behind `accessor` (or reuse an earlier upload) and
    /// describe how to read it.
    fn upload(
        &mut self,
        accessor: usize,
        fallback_target: BindingTarget,
        allocator: &mut impl BufferAllocator,
    ) -> Result<Attribute, AssetError> {
        let document = self.document;
        let def = element(document.accessors()?, "accessors", accessor)?;
        let data = self.accessor(accessor)?.clone();
        let usage = self.options.buffer_usage;

        match data {
            AccessorData::Packed(packed) => match packed.view {
                Some(view_index) => {
                    let view = element(document.buffer_views()?, "bufferViews", view_index)?;
                    let target = match view.target {
                        Some(raw) => BindingTarget::try_from(raw)?,
                        None => fallback_target,
                    };
                    let buffer = match self.view_uploads.get(&(view_index, target)) {
                        Some(&id) => id,
                        None => {
                            let bytes = element(self.buffers, "buffers", view.buffer)?;
                            let end = view.byte_offset.saturating_add(view.byte_length);
                            let slice = bytes.get(view.byte_offset..end).ok_or(
                                AssetError::OutOfBounds {
                                    offset: view.byte_offset,
                                    end,
                                    available: bytes.len(),
                                },
                            )?;
                            let id = allocator.allocate_buffer(target, slice, usage);
                            self.view_uploads.insert((view_index, target), id);
                            id
                        }
                    };
                    let layout = AttributeLayout::new(
                        packed.item_size,
                        def.component_type,
                        packed.normalized,
                        layout_u32("byte stride", view.byte_stride.unwrap_or(0))?,
                        layout_u32("byte offset", def.byte_offset)?,
                    )?;
                    Ok(Attribute::new(buffer, layout))
                }
                None => {
                    let key = (accessor, fallback_target);
                    let buffer = match self.owned_uploads.get(&key) {
                        Some(&id) => id,
                        None => {
                            let id = allocator.allocate_buffer(
                                fallback_target,
                                packed.array.as_bytes(),
                                usage,
                            );
                            self.owned_uploads.insert(key, id);
                            id
                        }
                    };
                    let mut layout = AttributeLayout::packed(packed.item_size, def.component_type)?;
                    layout.normalized = packed.normalized;
                    Ok(Attribute::new(buffer, layout))
                }
            },
            AccessorData::Interleaved(lane) => {
                if fallback_target == BindingTarget::ElementArrayBuffer {
                    return Err(AssetError::InterleavedIndices(accessor));
                }
                let existing = self
                    .interleaved_uploads
                    .iter()
                    .find(|(buffer, _)| Arc::ptr_eq(buffer, &lane.buffer))
                    .map(|(_, id)| *id);
                let buffer = match existing {
                    Some(id) => id,
                    None => {
                        let id = allocator.allocate_buffer(
                            BindingTarget::ArrayBuffer,
                            lane.buffer.array.as_bytes(),
                            usage,
                        );
                        self.interleaved_uploads.push((Arc::clone(&lane.buffer), id));
                        id
                    }
                };
                let element_bytes = def.component_type.byte_size();
                let layout = AttributeLayout::new(
                    lane.item_size,
                    def.component_type,
                    lane.normalized,
                    layout_u32("byte stride", lane.buffer.stride * element_bytes)?,
                    layout_u32("byte offset", lane.offset * element_bytes)?,
                )?;
                Ok(Attribute::new(buffer, layout))
            }
        }
    }
}

fn layout_u32(what: &'static str, value: usize) -> Result<u32, AssetError> {
    u32::try_from(value).map_err(|_| AssetError::LayoutRange { what, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_common::DrawMode;

    #[derive(Default)]
    struct MemoryAllocator {
        uploads: Vec<(BufferId, BindingTarget, Vec<u8>)>,
    }

    impl BufferAllocator for MemoryAllocator {
        fn allocate_buffer(
            &mut self,
            target: BindingTarget,
            data: &[u8],
            _usage: DataUsage,
        ) -> BufferId {
            let id = BufferId::new();
            self.uploads.push((id, target, data.to_vec()));
            id
        }
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// One triangle (positions + u16 indices), two nodes, one scene.
    fn triangle() -> (Document, Vec<Arc<[u8]>>) {
        let mut bytes = floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        for index in [0u16, 1, 2] {
            bytes.extend(index.to_le_bytes());
        }
        let json = r#"{
            "buffers": [{ "uri": "tri.bin", "byteLength": 42 }],
            "bufferViews": [
                { "buffer": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
            ],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" },
                { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
            ],
            "materials": [{ "name": "red", "pbrMetallicRoughness": { "baseColorFactor": [1, 0, 0, 1] } }],
            "meshes": [{
                "name": "tri",
                "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0, "mode": 4 }]
            }],
            "nodes": [
                { "name": "parent", "translation": [0, 1, 0], "children": [1] },
                { "name": "child", "mesh": 0, "scale": [2, 2, 2] }
            ],
            "scenes": [{ "name": "main", "nodes": [0] }],
            "scene": 0
        }"#;
        (Document::from_slice(json.as_bytes()).unwrap(), vec![Arc::from(bytes)])
    }

    #[test]
    fn builds_indexed_mesh() {
        let (doc, buffers) = triangle();
        let mut loader = Loader::new(&doc, &buffers, LoaderOptions::default()).unwrap();
        let mut allocator = MemoryAllocator::default();
        let mesh = loader.load_mesh(0, &mut allocator).unwrap();

        assert_eq!(mesh.name, "tri");
        let primitive = &mesh.primitives[0];
        let geometry = &primitive.geometry;
        assert_eq!(geometry.count, 3);
        assert_eq!(geometry.draw_mode(), DrawMode::Triangles);
        assert!(geometry.attribute("position").is_some());
        let index = geometry.index.unwrap();
        assert_eq!(index.layout.component_type, vesta_common::ComponentType::UnsignedShort);
        assert_eq!(primitive.material.name, "red");
        assert_eq!(primitive.material.color, Vector3::new(1.0, 0.0, 0.0));

        assert_eq!(allocator.uploads.len(), 2);
        assert_eq!(allocator.uploads[0].1, BindingTarget::ArrayBuffer);
        assert_eq!(allocator.uploads[1].1, BindingTarget::ElementArrayBuffer);
        assert_eq!(allocator.uploads[1].2, vec![0, 0, 1, 0, 2, 0]);

        let again = loader.load_mesh(0, &mut allocator).unwrap();
        assert!(Arc::ptr_eq(&mesh, &again));
        assert_eq!(allocator.uploads.len(), 2);
    }

    #[test]
    fn builds_scene_hierarchy() {
        let (doc, buffers) = triangle();
        let mut loader = Loader::new(&doc, &buffers, LoaderOptions::default()).unwrap();
        let mut allocator = MemoryAllocator::default();
        let mut graph = SceneGraph::new();
        let roots = loader.load_scenes(&mut graph, &mut allocator).unwrap();

        assert_eq!(roots.len(), 1);
        assert_eq!(loader.default_scene(), Some(0));
        let root = roots[0];
        assert_eq!(graph.node(root).unwrap().name.as_deref(), Some("main"));
        let parent = graph.find_by_name(root, "parent").unwrap().unwrap();
        let child = graph.find_by_name(root, "child").unwrap().unwrap();
        assert_eq!(graph.node(child).unwrap().parent(), Some(parent));
        assert!(graph.node(child).unwrap().mesh.is_some());

        graph.update_matrix_world(root).unwrap();
        let world = graph.node(child).unwrap().world_matrix();
        assert!(world.get_position().approx_eq(&Vector3::new(0.0, 1.0, 0.0), 1e-6));
        assert!(world.get_scale().approx_eq(&Vector3::new(2.0, 2.0, 2.0), 1e-6));
    }

    #[test]
    fn node_matrix_is_decomposed() {
        let json = r#"{
            "nodes": [{ "matrix": [2,0,0,0, 0,2,0,0, 0,0,2,0, 5,6,7,1] }]
        }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        let mut loader = Loader::new(&doc, &[], LoaderOptions::default()).unwrap();
        let mut graph = SceneGraph::new();
        let id = loader
            .load_node(0, &mut graph, &mut MemoryAllocator::default())
            .unwrap();
        let node = graph.node(id).unwrap();
        assert!(node.position.approx_eq(&Vector3::new(5.0, 6.0, 7.0), 1e-6));
        assert!(node.scale.approx_eq(&Vector3::new(2.0, 2.0, 2.0), 1e-6));
        assert!(node.quaternion.approx_eq(&Quaternion::IDENTITY, 1e-6));
    }

    #[test]
    fn interleaved_lanes_upload_once() {
        let values = [1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 4.0, 5.0, 6.0, 0.0, 1.0, 0.0];
        let json = r#"{
            "bufferViews": [{ "buffer": 0, "byteLength": 48, "byteStride": 24 }],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3" },
                { "bufferView": 0, "byteOffset": 12, "componentType": 5126, "count": 2, "type": "VEC3" }
            ],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0, "NORMAL": 1 } }] }]
        }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        let buffers = vec![Arc::from(floats(&values))];
        let mut loader = Loader::new(&doc, &buffers, LoaderOptions::default()).unwrap();
        let mut allocator = MemoryAllocator::default();
        let mesh = loader.load_mesh(0, &mut allocator).unwrap();

        assert_eq!(allocator.uploads.len(), 1);
        let geometry = &mesh.primitives[0].geometry;
        let position = geometry.attribute("position").unwrap();
        let normal = geometry.attribute("normal").unwrap();
        assert_eq!(position.buffer, normal.buffer);
        assert_eq!(normal.layout.stride, 24);
        assert_eq!(normal.layout.offset, 12);
        assert_eq!(geometry.count, 2);
        assert_eq!(geometry.index, None);
        assert_eq!(mesh.primitives[0].material.name, "default");
    }

    #[test]
    fn shared_hole_accessor_uploads_once() {
        let json = r#"{
            "accessors": [{ "componentType": 5126, "count": 3, "type": "VEC3" }],
            "meshes": [{
                "primitives": [
                    { "attributes": { "POSITION": 0 } },
                    { "attributes": { "POSITION": 0 } }
                ]
            }]
        }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        let mut loader = Loader::new(&doc, &[], LoaderOptions::default()).unwrap();
        let mut allocator = MemoryAllocator::default();
        let mesh = loader.load_mesh(0, &mut allocator).unwrap();

        assert_eq!(allocator.uploads.len(), 1);
        assert_eq!(allocator.uploads[0].2, vec![0u8; 36]);
        let first = mesh.primitives[0].geometry.attribute("position").unwrap();
        let second = mesh.primitives[1].geometry.attribute("position").unwrap();
        assert_eq!(first.buffer, second.buffer);
        assert_eq!(mesh.primitives[1].geometry.count, 3);
    }

    #[test]
    fn oversized_accessor_fails_to_load() {
        let json = r#"{
            "bufferViews": [{ "buffer": 0, "byteLength": 12 }],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 4611686018427387905, "type": "VEC3" }
            ]
        }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        let buffers = vec![Arc::from(floats(&[0.0, 0.0, 0.0]))];
        assert!(matches!(
            Loader::new(&doc, &buffers, LoaderOptions::default()),
            Err(AssetError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn layout_values_must_fit_u32() {
        assert_eq!(layout_u32("byte offset", 12).unwrap(), 12);
        assert_eq!(layout_u32("byte offset", u32::MAX as usize).unwrap(), u32::MAX);
        assert!(matches!(
            layout_u32("byte stride", u32::MAX as usize + 1),
            Err(AssetError::LayoutRange { what: "byte stride", .. })
        ));
    }

    #[test]
    fn interleaved_indices_fail() {
        let json = r#"{
            "bufferViews": [{ "buffer": 0, "byteLength": 16, "byteStride": 8 }],
            "accessors": [
                { "bufferView": 0, "componentType": 5125, "count": 2, "type": "SCALAR" }
            ],
            "meshes": [{ "primitives": [{ "attributes": {}, "indices": 0 }] }]
        }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        let buffers = vec![Arc::from(vec![0u8; 16])];
        let mut loader = Loader::new(&doc, &buffers, LoaderOptions::default()).unwrap();
        assert!(matches!(
            loader.load_mesh(0, &mut MemoryAllocator::default()),
            Err(AssetError::InterleavedIndices(0))
        ));
    }

    #[test]
    fn missing_sections_are_named() {
        let doc = Document::from_slice(b"{}").unwrap();
        let mut loader = Loader::new(&doc, &[], LoaderOptions::default()).unwrap();
        let mut graph = SceneGraph::new();
        let mut allocator = MemoryAllocator::default();
        assert!(matches!(
            loader.load_mesh(0, &mut allocator),
            Err(AssetError::MissingSection("meshes"))
        ));
        assert!(matches!(
            loader.load_node(0, &mut graph, &mut allocator),
            Err(AssetError::MissingSection("nodes"))
        ));
        assert!(matches!(
            loader.load_scenes(&mut graph, &mut allocator),
            Err(AssetError::MissingSection("scenes"))
        ));
        assert!(matches!(loader.accessor(0), Err(AssetError::MissingSection("accessors"))));
    }

    #[test]
    fn cyclic_children_are_rejected() {
        let json = r#"{ "nodes": [{ "children": [1] }, { "children": [0] }] }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        let mut loader = Loader::new(&doc, &[], LoaderOptions::default()).unwrap();
        let mut graph = SceneGraph::new();
        assert!(matches!(
            loader.load_node(0, &mut graph, &mut MemoryAllocator::default()),
            Err(AssetError::Scene(_))
        ));
    }
}
