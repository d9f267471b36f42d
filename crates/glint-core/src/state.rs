//! Renderer-global mutable state and the scoped guard that protects it.
//!
//! Offscreen passes redirect output, suppress the background and freeze
//! shadow updates. [`StateScope`] captures everything they may touch on
//! entry and restores it on drop, so nested passes compose in LIFO order
//! and early returns or panics never leak state into the main render.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::scene::{Scene, TargetId};

/// Tone mapping operator applied to shaded colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToneMapping {
    #[default]
    None,
    Reinhard,
    Aces,
}

impl ToneMapping {
    /// Index passed to shaders.
    pub fn shader_index(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Reinhard => 1,
            Self::Aces => 2,
        }
    }
}

/// Transfer function applied before writing to the output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputEncoding {
    #[default]
    Linear,
    Srgb,
}

impl OutputEncoding {
    pub fn shader_index(self) -> u32 {
        match self {
            Self::Linear => 0,
            Self::Srgb => 1,
        }
    }
}

/// Renderer-global mutable settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    /// Target subsequent draws write to. `None` is the renderer's main target.
    pub render_target: Option<TargetId>,
    pub clear_color: Vec3,
    pub clear_alpha: f32,
    /// Whether head tracking drives the camera.
    pub xr_enabled: bool,
    /// Whether shadow maps are recomputed on each render.
    pub shadow_auto_update: bool,
    /// Whether `render` clears the target first.
    pub auto_clear: bool,
    pub tone_mapping: ToneMapping,
    pub output_encoding: OutputEncoding,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            render_target: None,
            clear_color: Vec3::ZERO,
            clear_alpha: 1.0,
            xr_enabled: false,
            shadow_auto_update: true,
            auto_clear: true,
            tone_mapping: ToneMapping::None,
            output_encoding: OutputEncoding::Linear,
        }
    }
}

/// Access to a renderer's global state.
pub trait HasRenderState {
    fn render_state(&self) -> &RenderState;
    fn render_state_mut(&mut self) -> &mut RenderState;
}

impl HasRenderState for RenderState {
    fn render_state(&self) -> &RenderState {
        self
    }

    fn render_state_mut(&mut self) -> &mut RenderState {
        self
    }
}

/// Access to a scene's background.
pub trait HasBackground {
    fn background(&self) -> Option<Vec3>;
    fn set_background(&mut self, background: Option<Vec3>);
}

impl HasBackground for Scene {
    fn background(&self) -> Option<Vec3> {
        self.background
    }

    fn set_background(&mut self, background: Option<Vec3>) {
        self.background = background;
    }
}

/// Values captured on entry to a scoped pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub state: RenderState,
    pub background: Option<Vec3>,
}

impl StateSnapshot {
    pub fn capture<R, S>(renderer: &R, scene: &S) -> Self
    where
        R: HasRenderState + ?Sized,
        S: HasBackground + ?Sized,
    {
        Self {
            state: *renderer.render_state(),
            background: scene.background(),
        }
    }

    pub fn restore<R, S>(&self, renderer: &mut R, scene: &mut S)
    where
        R: HasRenderState + ?Sized,
        S: HasBackground + ?Sized,
    {
        *renderer.render_state_mut() = self.state;
        scene.set_background(self.background);
    }
}

/// Guard for one offscreen pass. Restores the captured state when dropped.
pub struct StateScope<'a, R, S>
where
    R: HasRenderState + ?Sized,
    S: HasBackground + ?Sized,
{
    renderer: &'a mut R,
    scene: &'a mut S,
    saved: StateSnapshot,
}

impl<'a, R, S> StateScope<'a, R, S>
where
    R: HasRenderState + ?Sized,
    S: HasBackground + ?Sized,
{
    /// Captures the current state, then suppresses the background,
    /// XR head tracking and shadow auto-update.
    pub fn enter(renderer: &'a mut R, scene: &'a mut S) -> Self {
        let saved = StateSnapshot::capture(&*renderer, &*scene);

        scene.set_background(None);
        let state = renderer.render_state_mut();
        state.xr_enabled = false;
        state.shadow_auto_update = false;

        Self {
            renderer,
            scene,
            saved,
        }
    }

    pub fn saved(&self) -> &StateSnapshot {
        &self.saved
    }

    pub fn renderer(&mut self) -> &mut R {
        &mut *self.renderer
    }

    pub fn scene(&mut self) -> &mut S {
        &mut *self.scene
    }

    /// Both guarded handles at once.
    pub fn parts(&mut self) -> (&mut R, &mut S) {
        (&mut *self.renderer, &mut *self.scene)
    }
}

impl<R, S> Drop for StateScope<'_, R, S>
where
    R: HasRenderState + ?Sized,
    S: HasBackground + ?Sized,
{
    fn drop(&mut self) {
        self.saved.restore(&mut *self.renderer, &mut *self.scene);
    }
}

/// Runs `pass` inside a [`StateScope`].
pub fn run_scoped<R, S, T, F>(renderer: &mut R, scene: &mut S, pass: F) -> T
where
    R: HasRenderState + ?Sized,
    S: HasBackground + ?Sized,
    F: FnOnce(&mut R, &mut S) -> T,
{
    let mut scope = StateScope::enter(renderer, scene);
    let (renderer, scene) = scope.parts();
    pass(renderer, scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn busy_state(target: TargetId) -> RenderState {
        RenderState {
            render_target: Some(target),
            clear_color: Vec3::new(0.2, 0.3, 0.4),
            clear_alpha: 0.5,
            xr_enabled: true,
            shadow_auto_update: true,
            auto_clear: false,
            tone_mapping: ToneMapping::Aces,
            output_encoding: OutputEncoding::Srgb,
        }
    }

    #[test]
    fn test_scope_suppresses_then_restores() {
        let initial = busy_state(TargetId::next());
        let mut state = initial;
        let mut scene = Scene::new();
        scene.background = Some(Vec3::ONE);

        run_scoped(&mut state, &mut scene, |state, scene| {
            assert_eq!(scene.background, None);
            assert!(!state.xr_enabled);
            assert!(!state.shadow_auto_update);
            state.render_target = Some(TargetId::next());
            state.clear_alpha = 0.0;
            state.tone_mapping = ToneMapping::None;
        });

        assert_eq!(state, initial);
        assert_eq!(scene.background, Some(Vec3::ONE));
    }

    #[test]
    fn test_nested_scopes_restore_in_order() {
        let initial = busy_state(TargetId::next());
        let outer_target = TargetId::next();
        let mut state = initial;
        let mut scene = Scene::new();
        scene.background = Some(Vec3::X);

        run_scoped(&mut state, &mut scene, |state, scene| {
            state.render_target = Some(outer_target);
            run_scoped(state, scene, |state, scene| {
                state.render_target = Some(TargetId::next());
                scene.background = Some(Vec3::Y);
            });
            // Inner scope restored the outer pass's values.
            assert_eq!(state.render_target, Some(outer_target));
            assert_eq!(scene.background, None);
        });

        assert_eq!(state, initial);
        assert_eq!(scene.background, Some(Vec3::X));
    }

    #[test]
    fn test_early_return_restores() {
        fn pass(state: &mut RenderState, scene: &mut Scene, fail: bool) -> Result<(), ()> {
            let mut scope = StateScope::enter(state, scene);
            scope.renderer().render_target = Some(TargetId::next());
            if fail {
                return Err(());
            }
            scope.renderer().clear_alpha = 0.0;
            Ok(())
        }

        let initial = busy_state(TargetId::next());
        let mut state = initial;
        let mut scene = Scene::new();
        assert!(pass(&mut state, &mut scene, true).is_err());
        assert_eq!(state, initial);
        assert!(pass(&mut state, &mut scene, false).is_ok());
        assert_eq!(state, initial);
    }

    #[test]
    fn test_panic_restores() {
        let initial = busy_state(TargetId::next());
        let mut state = initial;
        let mut scene = Scene::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_scoped(&mut state, &mut scene, |state, _| {
                state.render_target = None;
                panic!("pass failed");
            });
        }));
        assert!(result.is_err());
        assert_eq!(state, initial);
    }

    fn nest(state: &mut RenderState, scene: &mut Scene, depth: usize) {
        if depth == 0 {
            return;
        }
        run_scoped(state, scene, |state, scene| {
            state.render_target = Some(TargetId::next());
            state.clear_alpha = 0.0;
            state.xr_enabled = true;
            state.shadow_auto_update = true;
            scene.background = Some(Vec3::splat(depth as f32));
            nest(state, scene, depth - 1);
            nest(state, scene, depth / 2);
        });
    }

    proptest! {
        #[test]
        fn prop_nested_scopes_restore(depth in 0usize..6, alpha in 0.0f32..1.0, xr: bool, shadows: bool) {
            let initial = RenderState {
                clear_alpha: alpha,
                xr_enabled: xr,
                shadow_auto_update: shadows,
                ..busy_state(TargetId::next())
            };
            let mut state = initial;
            let mut scene = Scene::new();
            scene.background = Some(Vec3::Z);

            nest(&mut state, &mut scene, depth);

            prop_assert_eq!(state, initial);
            prop_assert_eq!(scene.background, Some(Vec3::Z));
        }
    }
}
