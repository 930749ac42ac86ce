//! Graphics-context abstraction.
//!
//! [`GraphicsDevice`] is the raw, GL-shaped backend interface. [`Context`]
//! sits on top of it and turns engine-level requests into device calls,
//! eliding redundant state changes. [`Shader`] wraps a linked program and its
//! introspected attribute/uniform locations.
//!
//! # Invariants
//! - `Context::set_feature` never issues an enable/disable that would not
//!   change device state.
//! - After `Context::switch_attributes(n)`, exactly slots `0..n` are enabled.
//! - A `Shader` only exists for a successfully compiled and linked program.
//!
//! [`RecordingDevice`] is an in-memory backend that records every call. It
//! drives the tests and the CLI's dry-run rendering.

mod context;
mod device;
mod recording;
mod shader;
pub mod shaders;

pub use context::Context;
pub use device::{BufferHandle, GraphicsDevice, ProgramHandle, ShaderHandle, UniformLocation};
pub use recording::{DeviceCall, RecordingDevice};
pub use shader::{Shader, ShaderSource, add_headers, numbered_listing};

use std::collections::BTreeMap;
use std::fmt;

/// Errors raised by the graphics context and shader programs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GfxError {
    #[error("error occurred while compiling {stage} shader: {log}")]
    Compile {
        stage: ShaderStage,
        log: String,
        /// Line-numbered source that failed.
        listing: String,
    },
    #[error("cannot link a program: {0}")]
    Link(String),
    #[error("cannot find attribute `{0}`")]
    MissingAttribute(String),
    #[error("cannot find uniform `{0}`")]
    MissingUniform(String),
}

/// Pipeline stage of a shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Toggleable fixed-function state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Blend,
    CullFace,
    DepthTest,
    Dither,
    PolygonOffsetFill,
    SampleAlphaToCoverage,
    SampleCoverage,
    ScissorTest,
    StencilTest,
}

/// Which buffers a clear call resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl ClearMask {
    pub fn is_empty(&self) -> bool {
        !(self.color || self.depth || self.stencil)
    }
}

/// How shaders react to names the linked program does not expose.
///
/// Drivers strip unused symbols, so a name declared in source may still be
/// absent after linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupPolicy {
    /// Writes to absent symbols are skipped.
    #[default]
    Lenient,
    /// Writes to absent symbols fail with `MissingAttribute`/`MissingUniform`.
    Strict,
}

/// Value of a preprocessor define injected ahead of shader source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefineValue {
    /// `true` emits a bare `#define NAME`; `false` emits nothing.
    Bool(bool),
    /// Emits `#define NAME value`.
    Number(f64),
}

impl From<bool> for DefineValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for DefineValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for DefineValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

/// Ordered define table; iteration order is the emitted order.
pub type Defines = BTreeMap<String, DefineValue>;
