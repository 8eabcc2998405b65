/// Vertex layout used by the quad renderer: position, RGBA8 color, UV
///
/// 24 bytes, matching the default `GpuConfig::vertex_stride`.

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPcu {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
}

impl VertexPcu {
    pub fn new(position: [f32; 3], color: [u8; 4], uv: [f32; 2]) -> Self {
        Self { position, color, uv }
    }
}

/// Two triangles covering `[min, max]` at depth `z`, as vertices and 16-bit indices
pub fn quad(min: [f32; 2], max: [f32; 2], z: f32, color: [u8; 4]) -> ([VertexPcu; 4], [u16; 6]) {
    let vertices = [
        VertexPcu::new([min[0], min[1], z], color, [0.0, 0.0]),
        VertexPcu::new([max[0], min[1], z], color, [1.0, 0.0]),
        VertexPcu::new([max[0], max[1], z], color, [1.0, 1.0]),
        VertexPcu::new([min[0], max[1], z], color, [0.0, 1.0]),
    ];
    (vertices, [0, 1, 2, 0, 2, 3])
}
