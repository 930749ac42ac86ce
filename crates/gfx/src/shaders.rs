//! Built-in GLSL programs.

use crate::ShaderSource;

pub const DEFAULT_VERTEX: &str = r#"attribute vec3 position;
attribute vec3 normal;

uniform mat4 u_projection_matrix;
uniform mat4 u_view_matrix;
uniform mat4 u_model_matrix;

varying vec3 v_normal;

void main() {
  v_normal = mat3(u_model_matrix) * normal;
  gl_Position = u_projection_matrix * u_view_matrix * u_model_matrix * vec4(position, 1.0);
}
"#;

pub const DEFAULT_FRAGMENT: &str = r#"uniform vec3 u_color;

varying vec3 v_normal;

void main() {
  float shade = 0.6 + 0.4 * abs(normalize(v_normal).y);
  gl_FragColor = vec4(u_color * shade, 1.0);
}
"#;

/// Flat base-color program with world-space normals.
pub fn default_source() -> ShaderSource {
    ShaderSource::new(DEFAULT_VERTEX, DEFAULT_FRAGMENT)
}
