use slotmap::{SlotMap, new_key_type};

use super::{Light, LightBlock, LightKind};
use crate::error::{CullError, CullResult};

new_key_type! {
    pub struct LightId;
}

struct Slot {
    kind: LightKind,
    index: usize,
}

/// Owns the scene's lights and keeps each kind densely packed, so the packed
/// index of a light is the index the kernels write into the cluster lists.
///
/// Removing a light moves the last light of its kind into the hole, which
/// changes that light's packed index.
pub struct LightManager {
    slots: SlotMap<LightId, Slot>,
    point: Vec<(LightId, Light)>,
    spot: Vec<(LightId, Light)>,
    directional: Vec<(LightId, Light)>,
}

impl Default for LightManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LightManager {
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            point: Vec::new(),
            spot: Vec::new(),
            directional: Vec::new(),
        }
    }

    fn packed(&self, kind: LightKind) -> &Vec<(LightId, Light)> {
        match kind {
            LightKind::Point => &self.point,
            LightKind::Spot => &self.spot,
            LightKind::Directional => &self.directional,
        }
    }

    fn packed_mut(&mut self, kind: LightKind) -> &mut Vec<(LightId, Light)> {
        match kind {
            LightKind::Point => &mut self.point,
            LightKind::Spot => &mut self.spot,
            LightKind::Directional => &mut self.directional,
        }
    }

    pub fn insert(&mut self, light: Light) -> CullResult<LightId> {
        let kind = light.kind;
        let index = self.packed(kind).len();
        if index == kind.capacity() {
            return Err(CullError::TooManyLights {
                kind,
                capacity: kind.capacity(),
            });
        }
        let id = self.slots.insert(Slot { kind, index });
        self.packed_mut(kind).push((id, light));
        Ok(id)
    }

    /// Replaces the parameters of `id`. A change of kind moves the light to
    /// the other packed array.
    pub fn update(&mut self, id: LightId, light: Light) -> CullResult<()> {
        let slot = self.slots.get(id).ok_or(CullError::UnknownLight)?;
        let (kind, index) = (slot.kind, slot.index);
        if kind == light.kind {
            self.packed_mut(kind)[index].1 = light;
            return Ok(());
        }

        let target = light.kind;
        if self.packed(target).len() == target.capacity() {
            return Err(CullError::TooManyLights {
                kind: target,
                capacity: target.capacity(),
            });
        }
        self.unpack(kind, index);
        let new_index = self.packed(target).len();
        self.packed_mut(target).push((id, light));
        self.slots[id] = Slot {
            kind: target,
            index: new_index,
        };
        Ok(())
    }

    pub fn remove(&mut self, id: LightId) -> Option<Light> {
        let slot = self.slots.remove(id)?;
        Some(self.unpack(slot.kind, slot.index))
    }

    // swap-remove from the packed array and repoint the light that moved
    fn unpack(&mut self, kind: LightKind, index: usize) -> Light {
        let packed = self.packed_mut(kind);
        let (_, light) = packed.swap_remove(index);
        let moved = packed.get(index).map(|(id, _)| *id);
        if let Some(slot) = moved.and_then(|id| self.slots.get_mut(id)) {
            slot.index = index;
        }
        light
    }

    pub fn get(&self, id: LightId) -> Option<&Light> {
        let slot = self.slots.get(id)?;
        self.packed(slot.kind).get(slot.index).map(|(_, l)| l)
    }

    /// Position of `id` in its kind's packed array, i.e. the index the cull
    /// kernel reports for it.
    pub fn packed_index(&self, id: LightId) -> Option<(LightKind, usize)> {
        self.slots.get(id).map(|s| (s.kind, s.index))
    }

    pub fn len(&self, kind: LightKind) -> usize {
        self.packed(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn block(&self, kind: LightKind) -> Box<LightBlock> {
        let mut block = LightBlock::empty();
        let packed = self.packed(kind);
        for (slot, (_, light)) in block.lights.iter_mut().zip(packed) {
            *slot = light.into();
        }
        block.count = packed.len() as u32;
        block
    }

    pub fn point_block(&self) -> Box<LightBlock> {
        self.block(LightKind::Point)
    }

    pub fn spot_block(&self) -> Box<LightBlock> {
        self.block(LightKind::Spot)
    }
}
