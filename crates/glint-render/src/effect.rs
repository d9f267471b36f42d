//! The per-frame contract shared by offscreen effects.

use glint_core::{CameraView, NodeId, Scene};

use crate::error::RenderResult;
use crate::renderer::Renderer;

/// An effect that renders the scene into its own targets once per frame,
/// before the main camera render.
pub trait OffscreenEffect {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Manual effects only render when the host asks for it explicitly.
    fn is_manual(&self) -> bool {
        false
    }

    /// Runs the effect for this frame. Returns `false` when nothing was rendered.
    fn render_effect(
        &mut self,
        renderer: &mut Renderer,
        scene: &mut Scene,
        camera: &dyn CameraView,
    ) -> RenderResult<bool>;
}

/// Hides `nodes`, returning their previous flags for [`restore_visibility`].
/// Missing nodes are skipped.
pub(crate) fn hide_nodes(
    scene: &mut Scene,
    nodes: impl IntoIterator<Item = NodeId>,
) -> Vec<(NodeId, bool)> {
    nodes
        .into_iter()
        .filter_map(|id| {
            let was_visible = scene.visible(id)?;
            scene.set_visible(id, false);
            Some((id, was_visible))
        })
        .collect()
}

/// Undoes [`hide_nodes`]. Restores in reverse so repeated ids end with their original flag.
pub(crate) fn restore_visibility(scene: &mut Scene, hidden: &[(NodeId, bool)]) {
    for (id, visible) in hidden.iter().rev() {
        scene.set_visible(*id, *visible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::Node;

    #[test]
    fn test_hide_and_restore() {
        let mut scene = Scene::new();
        let a = scene.add(Node::group("a"));
        let b = scene.add(Node::group("b").with_visible(false));
        let missing = scene.add(Node::group("gone"));
        scene.remove(missing).unwrap();

        let hidden = hide_nodes(&mut scene, [a, b, a, missing]);
        assert_eq!(hidden.len(), 3);
        assert_eq!(scene.visible(a), Some(false));

        restore_visibility(&mut scene, &hidden);
        assert_eq!(scene.visible(a), Some(true));
        assert_eq!(scene.visible(b), Some(false));
    }
}
