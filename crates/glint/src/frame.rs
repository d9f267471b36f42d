//! The per-frame host contract: offscreen effects first, then the main camera.

use glint_core::{CameraView, Scene};
use glint_render::{OffscreenEffect, RenderInfo, RenderResult, Renderer};

/// Frames a cached geometry buffer may go unused before it is dropped.
const DEFAULT_MAX_IDLE_FRAMES: u64 = 120;

/// What happened during one [`FrameLoop::render_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Effects that rendered into their targets.
    pub effects_rendered: usize,
    /// Effects that had nothing to do, including manual ones.
    pub effects_skipped: usize,
    /// Effects that failed; their errors were logged.
    pub effects_failed: usize,
    /// Renderer counters for the whole frame.
    pub info: RenderInfo,
}

/// Drives automatic effects and the main render each frame.
#[derive(Debug, Clone)]
pub struct FrameLoop {
    max_idle_frames: u64,
    frames: u64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self {
            max_idle_frames: DEFAULT_MAX_IDLE_FRAMES,
            frames: 0,
        }
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_idle_frames(mut self, frames: u64) -> Self {
        self.max_idle_frames = frames;
        self
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Renders one frame.
    ///
    /// Non-manual effects run in order. An effect error is logged and the
    /// frame continues; only a failing main render is returned as an error.
    pub fn render_frame<C: CameraView>(
        &mut self,
        renderer: &mut Renderer,
        scene: &mut Scene,
        camera: &C,
        effects: &mut [&mut dyn OffscreenEffect],
    ) -> RenderResult<FrameReport> {
        renderer.reset_info();
        let mut report = FrameReport::default();

        for effect in effects.iter_mut() {
            if effect.is_manual() {
                report.effects_skipped += 1;
                continue;
            }
            match effect.render_effect(renderer, scene, camera) {
                Ok(true) => report.effects_rendered += 1,
                Ok(false) => report.effects_skipped += 1,
                Err(e) => {
                    log::warn!("{} failed, continuing with the frame: {e}", effect.name());
                    report.effects_failed += 1;
                }
            }
        }

        renderer.render(scene, camera)?;

        let dropped = renderer.collect_garbage(self.max_idle_frames);
        if dropped > 0 {
            log::debug!("dropped {dropped} idle geometry buffers");
        }

        self.frames += 1;
        report.info = renderer.info();
        Ok(report)
    }
}
