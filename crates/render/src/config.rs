use vesta_gfx::LookupPolicy;
use vesta_math::Vector4;

/// Renderer configuration: shader lookup strictness, clear color and the
/// fixed-function state applied before every draw.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// How shaders treat uniforms/attributes the linked program lacks.
    pub lookup_policy: LookupPolicy,
    /// RGBA color used by `Renderer::clear`.
    pub clear_color: Vector4,
    /// Shader used by materials without an explicit tag.
    pub default_shader_tag: String,
    pub cull_face: bool,
    pub depth_test: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            lookup_policy: LookupPolicy::Lenient,
            clear_color: Vector4::new(0.0, 0.0, 0.0, 1.0),
            default_shader_tag: "default".to_owned(),
            cull_face: true,
            depth_test: true,
        }
    }
}

/// Per-frame statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub visible_nodes: usize,
    pub draw_calls: usize,
}
