//! Binary asset loading.
//!
//! An asset is a JSON root ([`Document`]) plus raw binary buffers and decoded
//! images. [`fetch_asset`] gathers those from an [`AssetSource`];
//! [`AccessorResolver`] turns accessors into typed attribute data and
//! [`Loader`] uploads that data through a [`BufferAllocator`] and builds
//! meshes, nodes and scenes into a [`SceneGraph`].
//!
//! # Invariants
//! - Accessors that address the same interleaved region share one
//!   [`InterleavedBuffer`] (`Arc` identity), never copies.
//! - A sparse overlay never writes into bytes another accessor can see; the
//!   base data is copied first when shared.
//! - Loading is synchronous once every buffer and image has been fetched.
//!
//! [`BufferAllocator`]: vesta_common::BufferAllocator
//! [`SceneGraph`]: vesta_scene::SceneGraph

mod accessor;
mod array;
mod document;
mod fetch;
mod loader;

pub use accessor::AccessorResolver;
pub use array::{AccessorData, BufferAttribute, ElementArray, InterleavedAttribute, InterleavedBuffer};
pub use document::{
    AccessorDef, AccessorType, BufferDef, BufferViewDef, Document, ImageDef, MaterialDef, MeshDef,
    NodeDef, PbrDef, PrimitiveDef, SceneDef, SparseDef, SparseIndicesDef, SparseValuesDef,
};
pub use fetch::{Asset, AssetSource, CancelToken, FileSource, fetch_asset};
pub use loader::{Loader, LoaderOptions};

use vesta_common::LayoutError;
use vesta_scene::SceneError;

/// Errors from fetching, resolving or loading an asset.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("there is no `{0}` section")]
    MissingSection(&'static str),
    #[error("{section}[{index}] does not exist")]
    IndexOutOfRange { section: &'static str, index: usize },
    #[error("byte range {offset}..{end} exceeds the {available} available bytes")]
    OutOfBounds {
        offset: usize,
        end: usize,
        available: usize,
    },
    #[error("bufferView {view}: stride {stride} is not a multiple of {element_bytes}")]
    MisalignedStride {
        view: usize,
        stride: usize,
        element_bytes: usize,
    },
    #[error("accessor {accessor}: unsupported sparse overlay ({reason})")]
    UnsupportedSparse {
        accessor: usize,
        reason: &'static str,
    },
    #[error("{what} {value} does not fit a 32-bit attribute layout")]
    LayoutRange { what: &'static str, value: usize },
    #[error("accessor {0} is interleaved and cannot be used as indices")]
    InterleavedIndices(usize),
    #[error("unsupported buffer or image uri `{0}`")]
    UnsupportedUri(String),
    #[error("fetch task failed: {0}")]
    Task(String),
    #[error("asset load was cancelled")]
    Cancelled,
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}
