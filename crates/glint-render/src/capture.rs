//! PNG capture of render targets, mostly for debugging effects.

use std::path::Path;

use glint_core::TargetId;
use image::{ImageBuffer, Rgba};

use crate::error::{RenderError, RenderResult};
use crate::renderer::Renderer;

fn to_image(data: Vec<u8>, width: u32, height: u32) -> RenderResult<ImageBuffer<Rgba<u8>, Vec<u8>>> {
    // Targets are RGBA8 with a top-left origin, so rows map directly.
    ImageBuffer::from_raw(width, height, data).ok_or(RenderError::InvalidImageData)
}

/// Encodes tightly packed RGBA8 pixels as PNG.
pub fn encode_png(data: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let img = to_image(data.to_vec(), width, height)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Writes tightly packed RGBA8 pixels to a PNG file.
pub fn save_png(path: impl AsRef<Path>, data: &[u8], width: u32, height: u32) -> RenderResult<()> {
    let img = to_image(data.to_vec(), width, height)?;
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Reads back a whole target (the main target for `None`) and writes it as PNG.
pub fn save_target_png(
    renderer: &Renderer,
    target: Option<TargetId>,
    path: impl AsRef<Path>,
) -> RenderResult<()> {
    let (width, height) = {
        let source = renderer.resolve_target(target)?;
        (source.width(), source.height())
    };
    let pixels = renderer.read_pixels(target, 0, 0, width, height)?;
    log::debug!("capturing {width}x{height} target to {}", path.as_ref().display());
    save_png(path, &pixels, width, height)
}
