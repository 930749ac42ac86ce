//! Scene renderer.
//!
//! Walks a scene graph, resolves one shader program per material tag and
//! submits one draw per mesh primitive through a graphics [`Context`].
//!
//! # Invariants
//! - The renderer never mutates node transforms; it only refreshes derived
//!   world matrices before drawing.
//! - Shaders are compiled once per tag and cached for the renderer's lifetime
//!   (until the tag is re-registered).
//! - Every `BufferId` a geometry refers to must have been allocated through
//!   this renderer.
//!
//! [`Context`]: vesta_gfx::Context

mod config;
mod renderer;

pub use config::{FrameStats, RendererConfig};
pub use renderer::Renderer;

use vesta_common::{BufferId, ComponentType};
use vesta_gfx::GfxError;
use vesta_scene::SceneError;

/// Errors raised while rendering a frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Gfx(#[from] GfxError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("no shader registered for tag `{0}`")]
    UnknownShader(String),
    #[error("buffer {0} was not allocated by this renderer")]
    UnknownBuffer(BufferId),
    #[error("{0:?} cannot be used as an index type")]
    IndexType(ComponentType),
}
