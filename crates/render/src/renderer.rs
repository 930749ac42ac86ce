use crate::{FrameStats, RenderError, RendererConfig};
use std::collections::BTreeMap;
use vesta_common::{BindingTarget, BufferAllocator, BufferId, DataUsage};
use vesta_gfx::{BufferHandle, Context, Feature, GraphicsDevice, Shader, ShaderSource, shaders};
use vesta_math::Matrix4;
use vesta_scene::{Camera, Geometry, Material, NodeId, SceneGraph};

/// Draws scene graphs through a graphics context.
///
/// Owns the buffer table (`BufferId` -> device buffer) and the per-tag
/// shader cache. Both live exactly as long as the renderer.
#[derive(Debug)]
pub struct Renderer<D> {
    context: Context<D>,
    config: RendererConfig,
    buffers: BTreeMap<BufferId, BufferHandle>,
    sources: BTreeMap<String, ShaderSource>,
    shaders: BTreeMap<String, Shader>,
    viewport: Option<(u32, u32)>,
}

impl<D: GraphicsDevice> Renderer<D> {
    /// Wrap `device`; the built-in program is registered under the
    /// configured default tag.
    pub fn new(device: D, config: RendererConfig) -> Self {
        let mut sources = BTreeMap::new();
        sources.insert(config.default_shader_tag.clone(), shaders::default_source());
        Self {
            context: Context::new(device),
            config,
            buffers: BTreeMap::new(),
            sources,
            shaders: BTreeMap::new(),
            viewport: None,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn context(&self) -> &Context<D> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context<D> {
        &mut self.context
    }

    pub fn into_device(self) -> D {
        self.context.into_device()
    }

    pub fn buffer_handle(&self, id: BufferId) -> Option<BufferHandle> {
        self.buffers.get(&id).copied()
    }

    /// Make `source` available to materials tagged `tag`. Replacing a tag
    /// drops its compiled program.
    pub fn register_shader(&mut self, tag: impl Into<String>, source: ShaderSource) {
        let tag = tag.into();
        self.shaders.remove(&tag);
        self.sources.insert(tag, source);
    }

    /// Set the viewport to `width` x `height` if it changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.viewport == Some((width, height)) {
            return false;
        }
        self.context.set_viewport(0, 0, width, height);
        self.viewport = Some((width, height));
        tracing::debug!(width, height, "viewport resized");
        true
    }

    /// Apply the configured clear color, then clear the selected buffers.
    pub fn clear(&mut self, color: bool, depth: bool) {
        self.context.clear_color(&self.config.clear_color);
        self.context.clear(color, depth, false);
    }

    /// Draw every visible primitive under `root` as seen by `camera`.
    pub fn render(
        &mut self,
        graph: &mut SceneGraph,
        root: NodeId,
        camera: &Camera,
    ) -> Result<FrameStats, RenderError> {
        let _span = tracing::info_span!("render", %root).entered();

        graph.update_matrix_world(root)?;
        let visible = graph.collect_visible_nodes(root)?;
        let mut stats = FrameStats {
            visible_nodes: visible.len(),
            ..Default::default()
        };

        for id in visible {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let Some(mesh) = &node.mesh else {
                continue;
            };
            for primitive in &mesh.primitives {
                let tag = primitive
                    .material
                    .shader_tag
                    .clone()
                    .unwrap_or_else(|| self.config.default_shader_tag.clone());
                self.prepare_shader(&tag)?;
                self.setup_material(&tag, node.world_matrix(), &primitive.material, camera)?;
                self.bind_geometry(&tag, &primitive.geometry)?;
                self.draw_geometry(&primitive.geometry)?;
                stats.draw_calls += 1;
            }
        }

        tracing::debug!(
            visible = stats.visible_nodes,
            draws = stats.draw_calls,
            "frame rendered"
        );
        Ok(stats)
    }

    /// Compile the program for `tag` on first use.
    fn prepare_shader(&mut self, tag: &str) -> Result<(), RenderError> {
        if self.shaders.contains_key(tag) {
            return Ok(());
        }
        let source = self
            .sources
            .get(tag)
            .ok_or_else(|| RenderError::UnknownShader(tag.to_owned()))?;
        let shader = self
            .context
            .create_shader(&source.vertex, &source.fragment, &source.defines)?
            .with_policy(self.config.lookup_policy);
        tracing::debug!(tag, "shader compiled");
        self.shaders.insert(tag.to_owned(), shader);
        Ok(())
    }

    fn setup_material(
        &mut self,
        tag: &str,
        model: &Matrix4,
        material: &Material,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        let shader = self
            .shaders
            .get(tag)
            .ok_or_else(|| RenderError::UnknownShader(tag.to_owned()))?;
        let ctx = &mut self.context;

        shader.bind(ctx);
        shader.set_vector3(ctx, "u_color", &material.color)?;
        shader.set_matrix4(ctx, "u_projection_matrix", camera.projection_matrix())?;
        shader.set_matrix4(ctx, "u_view_matrix", camera.view_matrix())?;
        shader.set_matrix4(ctx, "u_model_matrix", model)?;

        ctx.set_feature(Feature::CullFace, self.config.cull_face);
        ctx.set_feature(Feature::DepthTest, self.config.depth_test);
        Ok(())
    }

    /// Bind geometry streams by the shader's attribute names. Names the
    /// geometry lacks are skipped but still count as slots.
    fn bind_geometry(&mut self, tag: &str, geometry: &Geometry) -> Result<(), RenderError> {
        let shader = self
            .shaders
            .get(tag)
            .ok_or_else(|| RenderError::UnknownShader(tag.to_owned()))?;
        let mut slots = 0;

        for name in shader.attribute_names() {
            if let Some(attribute) = geometry.attribute(name) {
                let handle = self
                    .buffers
                    .get(&attribute.buffer)
                    .copied()
                    .ok_or(RenderError::UnknownBuffer(attribute.buffer))?;
                self.context.bind_buffer(BindingTarget::ArrayBuffer, handle);
                shader.bind_attribute(&mut self.context, name, &attribute.layout)?;
            } else {
                tracing::trace!(attribute = name, "geometry has no such attribute");
            }
            slots += 1;
        }

        self.context.switch_attributes(slots);
        Ok(())
    }

    fn draw_geometry(&mut self, geometry: &Geometry) -> Result<(), RenderError> {
        let mode = geometry.draw_mode();
        match &geometry.index {
            Some(index) => {
                let index_type = index.layout.component_type;
                if !index_type.is_index_type() {
                    return Err(RenderError::IndexType(index_type));
                }
                let handle = self
                    .buffers
                    .get(&index.buffer)
                    .copied()
                    .ok_or(RenderError::UnknownBuffer(index.buffer))?;
                self.context
                    .bind_buffer(BindingTarget::ElementArrayBuffer, handle);
                self.context
                    .draw_elements(mode, geometry.count, index_type, index.layout.offset);
            }
            None => self.context.draw_arrays(mode, 0, geometry.count),
        }
        Ok(())
    }
}

impl<D: GraphicsDevice> BufferAllocator for Renderer<D> {
    fn allocate_buffer(&mut self, target: BindingTarget, data: &[u8], usage: DataUsage) -> BufferId {
        let handle = self.context.create_buffer(target, data, usage);
        let id = BufferId::new();
        self.buffers.insert(id, handle);
        tracing::trace!(%id, ?handle, "buffer allocated");
        id
    }
}
