//! Color-ID pick encoding, hover tracking and the pick registry.
//!
//! Each pickable object is drawn in a flat color that encodes its id as a
//! 24-bit RGB integer. Reading back one pixel and decoding it yields the id
//! of the object under the cursor; black (id 0) is the background.

use std::collections::HashMap;

use glam::Vec3;

use crate::error::{GlintError, Result};
use crate::scene::NodeId;

/// Largest id representable as a packed RGB color.
pub const MAX_PICK_ID: u32 = 0xFF_FFFF;

/// Decodes a pick color back to an index.
///
/// The color is encoded as RGB where:
/// - R contains bits 16-23
/// - G contains bits 8-15
/// - B contains bits 0-7
#[must_use]
pub fn color_to_index(r: u8, g: u8, b: u8) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Encodes an index as an RGB pick color. Bits above 23 are dropped.
#[must_use]
pub fn index_to_color(index: u32) -> [u8; 3] {
    [
        ((index >> 16) & 0xFF) as u8,
        ((index >> 8) & 0xFF) as u8,
        (index & 0xFF) as u8,
    ]
}

/// The id as a normalized vertex color. Each channel is an exact multiple of 1/255.
#[must_use]
pub fn id_to_rgb(id: u32) -> Vec3 {
    let [r, g, b] = index_to_color(id);
    Vec3::new(f32::from(r), f32::from(g), f32::from(b)) / 255.0
}

/// Decodes an RGBA pixel read back from the pick target. Background yields `None`.
#[must_use]
pub fn decode_pixel(rgba: [u8; 4]) -> Option<u32> {
    match color_to_index(rgba[0], rgba[1], rgba[2]) {
        0 => None,
        id => Some(id),
    }
}

/// Checks that `id` can be drawn and read back unchanged.
pub fn validate_pick_id(id: u32) -> Result<u32> {
    if id == 0 || id > MAX_PICK_ID {
        return Err(GlintError::InvalidPickId(id));
    }
    Ok(id)
}

/// Discriminant of a [`PickEvent`], used to subscribe to one kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickEventKind {
    Enter,
    Exit,
    Click,
    Clear,
}

/// Notifications emitted by the pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickEvent {
    /// The pointer moved onto the object with this id.
    Enter(u32),
    /// The pointer left the object with this id.
    Exit(u32),
    /// The pointer was pressed over the object with this id.
    Click(u32),
    /// The pointer was pressed over empty space on the rendering surface.
    Clear,
}

impl PickEvent {
    pub fn kind(&self) -> PickEventKind {
        match self {
            Self::Enter(_) => PickEventKind::Enter,
            Self::Exit(_) => PickEventKind::Exit,
            Self::Click(_) => PickEventKind::Click,
            Self::Clear => PickEventKind::Clear,
        }
    }

    pub fn id(&self) -> Option<u32> {
        match self {
            Self::Enter(id) | Self::Exit(id) | Self::Click(id) => Some(*id),
            Self::Clear => None,
        }
    }
}

/// The currently hovered id and its transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoverState {
    current: Option<u32>,
}

impl HoverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<u32> {
        self.current
    }

    /// Feeds one pointer-move sample. Emits `Exit` for the previous id
    /// before `Enter` for the new one; an unchanged id emits nothing.
    pub fn update(&mut self, sample: Option<u32>) -> Vec<PickEvent> {
        let sample = sample.filter(|id| *id != 0);
        if sample == self.current {
            return Vec::new();
        }
        let mut events = Vec::with_capacity(2);
        if let Some(previous) = self.current {
            events.push(PickEvent::Exit(previous));
        }
        if let Some(next) = sample {
            events.push(PickEvent::Enter(next));
        }
        self.current = sample;
        events
    }

    /// Resolves a pointer press against the hovered id.
    ///
    /// `on_surface` tells whether the press originated on the rendering
    /// surface itself; only then does a miss produce [`PickEvent::Clear`].
    pub fn on_pointer_down(&self, on_surface: bool) -> Option<PickEvent> {
        match self.current {
            Some(id) => Some(PickEvent::Click(id)),
            None if on_surface => Some(PickEvent::Clear),
            None => None,
        }
    }

    /// Forgets the hovered id without emitting anything.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// A registered pickable clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickEntry {
    /// Root of the color-tagged clone in the pick scene.
    pub root: NodeId,
    pub visible: bool,
}

/// Maps pick ids to their clones in the pick scene.
///
/// Entries are only removed explicitly.
#[derive(Debug, Default)]
pub struct PickRegistry {
    entries: HashMap<u32, PickEntry>,
}

impl PickRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `root` under `id`, returning the entry it replaces.
    pub fn insert(&mut self, id: u32, root: NodeId) -> Result<Option<PickEntry>> {
        let id = validate_pick_id(id)?;
        let replaced = self.entries.insert(id, PickEntry { root, visible: true });
        if replaced.is_some() {
            log::debug!("pick id {id:#08x} re-registered, replacing previous clone");
        }
        Ok(replaced)
    }

    pub fn remove(&mut self, id: u32) -> Result<PickEntry> {
        self.entries
            .remove(&id)
            .ok_or(GlintError::PickIdNotRegistered(id))
    }

    pub fn get(&self, id: u32) -> Option<&PickEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn set_visible(&mut self, id: u32, visible: bool) -> Result<NodeId> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(GlintError::PickIdNotRegistered(id))?;
        entry.visible = visible;
        Ok(entry.root)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Node, Scene};
    use proptest::prelude::*;

    #[test]
    fn test_color_index_roundtrip() {
        for index in [0, 1, 255, 256, 65535, 65536, 0xFFFFFF, 12345678 & 0xFFFFFF] {
            let color = index_to_color(index);
            let decoded = color_to_index(color[0], color[1], color[2]);
            assert_eq!(decoded, index, "Roundtrip failed for index {index}");
        }
    }

    #[test]
    fn test_specific_colors() {
        assert_eq!(index_to_color(0), [0, 0, 0]);
        assert_eq!(index_to_color(1), [0, 0, 1]);
        assert_eq!(index_to_color(256), [0, 1, 0]);
        assert_eq!(index_to_color(0xFF0000), [255, 0, 0]);
        assert_eq!(index_to_color(0x00FF00), [0, 255, 0]);
        assert_eq!(id_to_rgb(0x00FF00), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_background_decodes_to_none() {
        assert_eq!(decode_pixel([0, 0, 0, 255]), None);
        assert_eq!(decode_pixel([0, 0, 0, 0]), None);
        assert_eq!(decode_pixel([0, 255, 0, 255]), Some(65280));
    }

    #[test]
    fn test_validate_pick_id() {
        assert!(matches!(validate_pick_id(0), Err(GlintError::InvalidPickId(0))));
        assert!(validate_pick_id(MAX_PICK_ID + 1).is_err());
        assert_eq!(validate_pick_id(MAX_PICK_ID).unwrap(), MAX_PICK_ID);
    }

    #[test]
    fn test_hover_sequence() {
        let mut hover = HoverState::new();
        let events: Vec<PickEvent> = [None, Some(5), Some(5), Some(9), None]
            .into_iter()
            .flat_map(|sample| hover.update(sample))
            .collect();
        assert_eq!(
            events,
            vec![
                PickEvent::Enter(5),
                PickEvent::Exit(5),
                PickEvent::Enter(9),
                PickEvent::Exit(9),
            ]
        );
        assert_eq!(hover.current(), None);
    }

    #[test]
    fn test_zero_sample_is_background() {
        let mut hover = HoverState::new();
        assert!(hover.update(Some(0)).is_empty());
        assert_eq!(hover.current(), None);
    }

    #[test]
    fn test_pointer_down() {
        let mut hover = HoverState::new();
        assert_eq!(hover.on_pointer_down(true), Some(PickEvent::Clear));
        assert_eq!(hover.on_pointer_down(false), None);
        hover.update(Some(3));
        assert_eq!(hover.on_pointer_down(false), Some(PickEvent::Click(3)));
        assert_eq!(hover.on_pointer_down(true), Some(PickEvent::Click(3)));
    }

    #[test]
    fn test_registry() {
        let mut scene = Scene::new();
        let a = scene.add(Node::group("a"));
        let b = scene.add(Node::group("b"));

        let mut registry = PickRegistry::new();
        assert_eq!(registry.insert(7, a).unwrap(), None);
        let replaced = registry.insert(7, b).unwrap();
        assert_eq!(replaced.map(|e| e.root), Some(a));
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.set_visible(7, false).unwrap(), b);
        assert!(!registry.get(7).unwrap().visible);

        assert!(matches!(
            registry.set_visible(8, true),
            Err(GlintError::PickIdNotRegistered(8))
        ));
        assert!(registry.insert(0, a).is_err());

        assert_eq!(registry.remove(7).unwrap().root, b);
        assert!(registry.is_empty());
        assert!(registry.remove(7).is_err());
    }

    proptest! {
        #[test]
        fn prop_pick_id_roundtrip(id in 1u32..=MAX_PICK_ID) {
            let [r, g, b] = index_to_color(id);
            prop_assert_eq!(decode_pixel([r, g, b, 255]), Some(id));
            // Quantizing the float vertex color must land on the same bytes.
            let rgb = id_to_rgb(id) * 255.0;
            let bytes = [rgb.x.round() as u8, rgb.y.round() as u8, rgb.z.round() as u8];
            prop_assert_eq!(bytes, [r, g, b]);
        }
    }
}
