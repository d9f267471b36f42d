//! Blocking helpers for rendering without a window.
//!
//! Useful for integration tests, batch rendering and debugging effect
//! targets on machines without a display.

use std::path::Path;

use glint_core::{CameraView, Scene};
use glint_render::{save_png, RenderResult, Renderer};
use pollster::FutureExt;

/// Creates a renderer with a `width` x `height` main target and no surface.
///
/// Fails with [`glint_render::RenderError::AdapterCreationFailed`] when no
/// GPU adapter (real or software) is available.
pub fn create_headless_renderer(width: u32, height: u32) -> RenderResult<Renderer> {
    Renderer::new_headless(width, height).block_on()
}

/// Renders `scene` into the current output target and returns its pixels
/// as tightly packed RGBA8 rows, top-left first.
pub fn render_to_image<C: CameraView + ?Sized>(
    renderer: &mut Renderer,
    scene: &Scene,
    camera: &C,
) -> RenderResult<Vec<u8>> {
    renderer.render(scene, camera)?;
    let target = renderer.render_target();
    let (width, height) = {
        let output = renderer.resolve_target(target)?;
        (output.width(), output.height())
    };
    renderer.read_pixels(target, 0, 0, width, height)
}

/// Renders `scene` and writes the output target to a PNG file.
pub fn render_to_file<C: CameraView + ?Sized>(
    renderer: &mut Renderer,
    scene: &Scene,
    camera: &C,
    path: impl AsRef<Path>,
) -> RenderResult<()> {
    let data = render_to_image(renderer, scene, camera)?;
    let (width, height) = {
        let output = renderer.resolve_target(renderer.render_target())?;
        (output.width(), output.height())
    };
    save_png(path, &data, width, height)
}
