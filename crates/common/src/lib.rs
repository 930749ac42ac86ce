//! Shared vocabulary of the vesta rendering core.
//!
//! Layout descriptors, GL-valued enums and buffer identifiers used by the
//! graphics context, the scene graph and the asset loader alike.
//!
//! # Invariants
//! - An `AttributeLayout` always has an item size in `1..=16`.
//! - Geometry never embeds vertex bytes; it addresses buffers by `BufferId`.

mod types;

pub use types::{
    AttributeLayout, BindingTarget, BufferId, ComponentType, DataUsage, DrawMode, LayoutError,
};

/// Something that can turn raw bytes into a GPU buffer addressed by id.
///
/// The renderer implements this; the asset loader uploads through it without
/// knowing which graphics backend sits underneath.
pub trait BufferAllocator {
    fn allocate_buffer(&mut self, target: BindingTarget, data: &[u8], usage: DataUsage)
    -> BufferId;
}
