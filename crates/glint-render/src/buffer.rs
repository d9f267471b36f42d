//! GPU buffer helpers.

use wgpu::util::DeviceExt;

/// Creates a vertex buffer from data.
pub fn create_vertex_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    data: &[T],
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

/// Creates an index buffer from data.
pub fn create_index_buffer(device: &wgpu::Device, data: &[u32], label: Option<&str>) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::INDEX,
    })
}

/// Rounds `size` up to a multiple of `alignment` (a power of two).
pub fn align_to(size: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (size + alignment - 1) & !(alignment - 1)
}

/// Bytes per row of a texture-to-buffer copy of `width` RGBA8 texels.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    align_to(u64::from(width) * 4, u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(304, 256), 512);
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    proptest! {
        #[test]
        fn prop_align_to_is_smallest_multiple(size in 0u64..1_000_000, shift in 0u32..12) {
            let alignment = 1u64 << shift;
            let aligned = align_to(size, alignment);
            prop_assert_eq!(aligned % alignment, 0);
            prop_assert!(aligned >= size);
            prop_assert!(aligned < size + alignment);
        }
    }
}
