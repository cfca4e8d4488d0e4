//! Bindless resource table.
//!
//! Shaders address textures through small integer slot ids into two global
//! descriptor arrays, one for fragment-visible textures and one for
//! vertex-visible textures. [`ResourceHandleTable`] owns the id assignment
//! for both arrays.
//!
//! # Slot lifecycle
//!
//! ```text
//!   register ──► Live ──unregister──► Quarantined ──N × update()──► Free
//!      ▲                                                            │
//!      └──────────────────── lowest free id first ◄─────────────────┘
//! ```
//!
//! A released slot may still be referenced by command lists that the GPU has
//! not finished executing, so it waits `frames_in_flight` calls to
//! [`update`](ResourceHandleTable::update) before it can be handed out again.
//!
//! Ids are allocated lowest-first: recycled ids come from a min-heap and new
//! ids from a watermark, so a freed id is always preferred over growing.
//!
//! Registration only records the slot; the descriptor writes reach the GPU
//! array on the next `update()`, which runs once per frame before any draw.

mod signature;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::backend::{BindlessWrite, GpuBackend, TextureViewHandle};
use crate::error::GraphicsError;
use crate::profiling::{profile_plot, profile_scope};

pub use signature::{
    ResourceSignature, SignatureBinder, SignatureBuilder, SignatureDescriptor, SignatureEntry,
    SignatureResourceKind, VariableKind,
};

/// Which bindless array a slot lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindlessKind {
    /// Sampled from pixel shaders.
    Texture,
    /// Sampled from vertex shaders (displacement, skinning data).
    VertexTexture,
}

impl BindlessKind {
    pub const ALL: [BindlessKind; 2] = [BindlessKind::Texture, BindlessKind::VertexTexture];

    fn index(self) -> usize {
        match self {
            BindlessKind::Texture => 0,
            BindlessKind::VertexTexture => 1,
        }
    }
}

/// A live slot assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindlessSlot {
    pub index: u32,
    pub kind: BindlessKind,
    pub resource: TextureViewHandle,
}

/// Sizing of the bindless arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindlessConfig {
    /// Slots allocated up front per array.
    pub initial_capacity: u32,
    /// Slots added each time an array is exhausted.
    pub growth_step: u32,
    /// Frames a released slot is held before reuse.
    pub frames_in_flight: u32,
}

impl Default for BindlessConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
            growth_step: 256,
            frames_in_flight: 3,
        }
    }
}

/// One bindless array: dense slot storage plus its free list.
#[derive(Debug)]
struct SlotArena {
    kind: BindlessKind,
    slots: Vec<Option<TextureViewHandle>>,
    /// Released ids that finished quarantine, smallest on top.
    free: BinaryHeap<Reverse<u32>>,
    /// First id that has never been handed out.
    watermark: u32,
    /// Ring of per-frame release lists, indexed by frame modulo its length.
    quarantine: Vec<Vec<u32>>,
    /// Writes waiting for the next `update()`.
    pending: Vec<BindlessWrite>,
    /// Capacity last pushed to the backend.
    synced_capacity: u32,
    live: u32,
}

impl SlotArena {
    fn new(kind: BindlessKind, config: &BindlessConfig) -> Self {
        Self {
            kind,
            slots: vec![None; config.initial_capacity as usize],
            free: BinaryHeap::new(),
            watermark: 0,
            quarantine: vec![Vec::new(); config.frames_in_flight.max(1) as usize],
            pending: Vec::new(),
            synced_capacity: 0,
            live: 0,
        }
    }

    fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    fn allocate(&mut self, growth_step: u32, limit: u32) -> Result<u32, GraphicsError> {
        if let Some(Reverse(index)) = self.free.pop() {
            return Ok(index);
        }

        if self.watermark == self.capacity() {
            if self.capacity() >= limit {
                return Err(GraphicsError::CapacityExceeded {
                    kind: self.kind,
                    limit,
                });
            }
            let grown = self.capacity().saturating_add(growth_step.max(1)).min(limit);
            log::debug!(
                "ResourceHandleTable: growing {:?} array {} -> {grown}",
                self.kind,
                self.capacity()
            );
            self.slots.resize(grown as usize, None);
        }

        let index = self.watermark;
        self.watermark += 1;
        Ok(index)
    }

    fn quarantined(&self) -> usize {
        self.quarantine.iter().map(Vec::len).sum()
    }
}

/// Assigns stable bindless slot ids to texture views.
///
/// One instance exists per [`RenderContext`](crate::RenderContext).
#[derive(Debug)]
pub struct ResourceHandleTable {
    config: BindlessConfig,
    max_descriptors: u32,
    arenas: [SlotArena; 2],
    lookup: HashMap<TextureViewHandle, BindlessSlot>,
    frame: u64,
}

impl ResourceHandleTable {
    /// Create a table whose arrays may grow up to `max_descriptors` slots each.
    pub fn new(config: BindlessConfig, max_descriptors: u32) -> Self {
        let initial = config.initial_capacity.min(max_descriptors);
        let config = BindlessConfig {
            initial_capacity: initial,
            ..config
        };
        Self {
            arenas: [
                SlotArena::new(BindlessKind::Texture, &config),
                SlotArena::new(BindlessKind::VertexTexture, &config),
            ],
            config,
            max_descriptors,
            lookup: HashMap::new(),
            frame: 0,
        }
    }

    pub fn config(&self) -> &BindlessConfig {
        &self.config
    }

    /// Assign a slot to `resource`, or return the slot it already has.
    ///
    /// `is_alive` reports whether the backend knows the view.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::InvalidResource`] for a null or dead view, or a view
    ///   already registered under the other kind
    /// - [`GraphicsError::CapacityExceeded`] when the array is at the device limit
    pub fn register(
        &mut self,
        resource: TextureViewHandle,
        kind: BindlessKind,
        is_alive: bool,
    ) -> Result<u32, GraphicsError> {
        if let Some(slot) = self.lookup.get(&resource) {
            if slot.kind != kind {
                return Err(GraphicsError::InvalidResource(format!(
                    "{resource:?} is already registered as {:?}",
                    slot.kind
                )));
            }
            return Ok(slot.index);
        }

        if resource.is_null() || !is_alive {
            return Err(GraphicsError::InvalidResource(format!(
                "{resource:?} is not a live texture view"
            )));
        }

        let growth_step = self.config.growth_step;
        let limit = self.max_descriptors;
        let arena = &mut self.arenas[kind.index()];
        let index = arena.allocate(growth_step, limit)?;
        arena.slots[index as usize] = Some(resource);
        arena.live += 1;
        arena.pending.push(BindlessWrite {
            index,
            view: Some(resource),
        });

        log::trace!("ResourceHandleTable: {resource:?} -> {kind:?}[{index}]");
        self.lookup.insert(
            resource,
            BindlessSlot {
                index,
                kind,
                resource,
            },
        );
        Ok(index)
    }

    /// Release the slot held by `resource` into quarantine.
    ///
    /// Returns the released slot, or `None` if the resource was not registered.
    pub fn unregister(&mut self, resource: TextureViewHandle) -> Option<BindlessSlot> {
        let slot = self.lookup.remove(&resource)?;
        let ring_index = (self.frame % self.config.frames_in_flight.max(1) as u64) as usize;
        let arena = &mut self.arenas[slot.kind.index()];
        arena.slots[slot.index as usize] = None;
        arena.live -= 1;
        arena.quarantine[ring_index].push(slot.index);
        arena.pending.push(BindlessWrite {
            index: slot.index,
            view: None,
        });
        log::trace!(
            "ResourceHandleTable: released {:?}[{}] at frame {}",
            slot.kind,
            slot.index,
            self.frame
        );
        Some(slot)
    }

    /// Per-frame flush.
    ///
    /// Advances the quarantine by one frame, resizes GPU arrays that grew and
    /// writes every queued slot change.
    pub fn update(&mut self, backend: &mut dyn GpuBackend) -> Result<(), GraphicsError> {
        profile_scope!("bindless_update");

        self.frame += 1;
        let ring_index = (self.frame % self.config.frames_in_flight.max(1) as u64) as usize;

        for arena in &mut self.arenas {
            for index in arena.quarantine[ring_index].drain(..) {
                arena.free.push(Reverse(index));
            }

            if arena.synced_capacity != arena.capacity() {
                backend.resize_bindless(arena.kind, arena.capacity())?;
                arena.synced_capacity = arena.capacity();
            }

            if !arena.pending.is_empty() {
                backend.write_bindless(arena.kind, &arena.pending);
                arena.pending.clear();
            }
        }

        profile_plot!("bindless_textures", self.len(BindlessKind::Texture));
        Ok(())
    }

    /// The slot currently held by `resource`.
    pub fn slot(&self, resource: TextureViewHandle) -> Option<BindlessSlot> {
        self.lookup.get(&resource).copied()
    }

    /// The resource in slot `index` of `kind`, if live.
    pub fn resource_at(&self, kind: BindlessKind, index: u32) -> Option<TextureViewHandle> {
        self.arenas[kind.index()]
            .slots
            .get(index as usize)
            .copied()
            .flatten()
    }

    /// Number of live slots of `kind`.
    pub fn len(&self, kind: BindlessKind) -> u32 {
        self.arenas[kind.index()].live
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Current array capacity of `kind`.
    pub fn capacity(&self, kind: BindlessKind) -> u32 {
        self.arenas[kind.index()].capacity()
    }

    /// Number of slots of `kind` waiting out their quarantine.
    pub fn quarantined(&self, kind: BindlessKind) -> usize {
        self.arenas[kind.index()].quarantined()
    }

    /// Number of `update()` calls so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, DummyCommand};
    use crate::types::DeviceRequest;

    fn view(raw: u64) -> TextureViewHandle {
        TextureViewHandle::from_raw(raw)
    }

    fn table(initial: u32, step: u32, limit: u32) -> ResourceHandleTable {
        ResourceHandleTable::new(
            BindlessConfig {
                initial_capacity: initial,
                growth_step: step,
                frames_in_flight: 3,
            },
            limit,
        )
    }

    fn backend() -> DummyBackend {
        let mut backend = DummyBackend::new();
        backend
            .create_device(&DeviceRequest::default())
            .expect("device");
        backend
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut table = table(8, 8, 64);
        let a = table.register(view(1), BindlessKind::Texture, true).unwrap();
        let b = table.register(view(1), BindlessKind::Texture, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(table.len(BindlessKind::Texture), 1);
    }

    #[test]
    fn test_sequential_ids() {
        let mut table = table(8, 8, 64);
        let ids: Vec<u32> = (1..=3)
            .map(|raw| table.register(view(raw), BindlessKind::Texture, true).unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_kinds_have_separate_id_spaces() {
        let mut table = table(8, 8, 64);
        assert_eq!(table.register(view(1), BindlessKind::Texture, true).unwrap(), 0);
        assert_eq!(
            table.register(view(2), BindlessKind::VertexTexture, true).unwrap(),
            0
        );
        assert!(matches!(
            table.register(view(1), BindlessKind::VertexTexture, true),
            Err(GraphicsError::InvalidResource(_))
        ));
    }

    #[test]
    fn test_invalid_resource_rejected() {
        let mut table = table(8, 8, 64);
        assert!(matches!(
            table.register(TextureViewHandle::NULL, BindlessKind::Texture, true),
            Err(GraphicsError::InvalidResource(_))
        ));
        assert!(matches!(
            table.register(view(9), BindlessKind::Texture, false),
            Err(GraphicsError::InvalidResource(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_quarantine_then_lowest_reuse() {
        let mut backend = backend();
        let mut table = table(8, 8, 64);
        for raw in 1..=3 {
            table.register(view(raw), BindlessKind::Texture, true).unwrap();
        }

        let released = table.unregister(view(2)).unwrap();
        assert_eq!(released.index, 1);

        // Still quarantined: the next id comes from the watermark.
        for _ in 0..2 {
            table.update(&mut backend).unwrap();
        }
        assert_eq!(table.quarantined(BindlessKind::Texture), 1);
        assert_eq!(table.register(view(4), BindlessKind::Texture, true).unwrap(), 3);

        table.update(&mut backend).unwrap();
        assert_eq!(table.quarantined(BindlessKind::Texture), 0);
        assert_eq!(table.register(view(5), BindlessKind::Texture, true).unwrap(), 1);
    }

    #[test]
    fn test_no_reuse_before_n_frames() {
        let mut backend = backend();
        let mut table = table(4, 4, 64);
        table.register(view(1), BindlessKind::Texture, true).unwrap();
        table.unregister(view(1));

        let mut ids = Vec::new();
        for raw in 2..=4 {
            ids.push(table.register(view(raw), BindlessKind::Texture, true).unwrap());
            table.update(&mut backend).unwrap();
        }
        assert!(!ids.contains(&0), "slot 0 reused during quarantine: {ids:?}");
        assert_eq!(table.register(view(5), BindlessKind::Texture, true).unwrap(), 0);
    }

    #[test]
    fn test_growth_and_capacity_exceeded() {
        let mut table = table(2, 2, 5);
        for raw in 1..=5 {
            table.register(view(raw), BindlessKind::Texture, true).unwrap();
        }
        assert_eq!(table.capacity(BindlessKind::Texture), 5);

        let err = table
            .register(view(6), BindlessKind::Texture, true)
            .unwrap_err();
        assert_eq!(
            err,
            GraphicsError::CapacityExceeded {
                kind: BindlessKind::Texture,
                limit: 5
            }
        );
    }

    #[test]
    fn test_update_flushes_writes_once() {
        let mut backend = backend();
        let log = backend.command_log();
        let mut table = table(4, 4, 64);
        table.register(view(1), BindlessKind::Texture, true).unwrap();
        log.clear();

        table.update(&mut backend).unwrap();
        let commands = log.drain();
        assert!(commands.contains(&DummyCommand::ResizeBindless {
            kind: BindlessKind::Texture,
            capacity: 4
        }));
        assert!(commands.contains(&DummyCommand::WriteBindless {
            kind: BindlessKind::Texture,
            writes: vec![BindlessWrite {
                index: 0,
                view: Some(view(1))
            }],
        }));

        table.update(&mut backend).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_unregister_unknown_is_none() {
        let mut table = table(4, 4, 64);
        assert!(table.unregister(view(42)).is_none());
    }
}
