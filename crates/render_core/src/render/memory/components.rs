//! Vertex component keys
//!
//! A drawable's component set decides the shape of the buffers it lives in,
//! so pools keep one slab list per distinct key.

use bitflags::bitflags;

/// Size of one vertex attribute: every attribute is stored as a 4-float vector.
pub const ATTRIBUTE_SIZE: u32 = 16;

/// Size of one index (32-bit indices only)
pub const INDEX_SIZE: u32 = 4;

/// Size of one vertex's bone data: four joint ids and four weights
pub const BONE_DATA_SIZE: u32 = 32;

/// Per-vertex skinning data as stored in the bone sub-buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VertexBoneData {
    /// Joint indices
    pub ids: [u32; 4],
    /// Joint weights, summing to one
    pub weights: [f32; 4],
}

impl VertexBoneData {
    /// Byte image of this entry as the shaders read it
    pub fn to_bytes(&self) -> [u8; BONE_DATA_SIZE as usize] {
        let mut bytes = [0; BONE_DATA_SIZE as usize];
        bytes[..16].copy_from_slice(bytemuck::bytes_of(&self.ids));
        bytes[16..].copy_from_slice(bytemuck::bytes_of(&self.weights));
        bytes
    }
}

bitflags! {
    /// Components a submesh provides, used as the slab selection key
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SubmeshComponents: u32 {
        /// Vertex positions
        const POSITIONS = 1 << 0;
        /// Vertex normals
        const NORMALS = 1 << 1;
        /// Vertex tangents
        const TANGENTS = 1 << 2;
        /// Vertex bitangents
        const BITANGENTS = 1 << 3;
        /// First texture coordinate set
        const TEXCOORDS0 = 1 << 4;
        /// Second texture coordinate set
        const TEXCOORDS1 = 1 << 5;
        /// Vertex colours
        const COLOURS = 1 << 6;
        /// Skinning data, stored in its own sub-buffer
        const BONES = 1 << 7;
        /// Meshlet-rendered submesh; meshlet data lives outside the pools
        const MESHLETS = 1 << 8;
    }
}

impl SubmeshComponents {
    /// Attributes interleaved in the vertex sub-buffer
    pub const VERTEX_ATTRIBUTES: Self = Self::POSITIONS
        .union(Self::NORMALS)
        .union(Self::TANGENTS)
        .union(Self::BITANGENTS)
        .union(Self::TEXCOORDS0)
        .union(Self::TEXCOORDS1)
        .union(Self::COLOURS);

    /// Positions, normals, tangents and one texture set
    pub const fn standard() -> Self {
        Self::POSITIONS
            .union(Self::NORMALS)
            .union(Self::TANGENTS)
            .union(Self::TEXCOORDS0)
    }

    /// Bytes per vertex in the vertex sub-buffer
    pub fn vertex_stride(self) -> u32 {
        self.intersection(Self::VERTEX_ATTRIBUTES).bits().count_ones() * ATTRIBUTE_SIZE
    }

    /// Whether slabs for this key carry a bone sub-buffer
    pub fn has_bones(self) -> bool {
        self.contains(Self::BONES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_counts_vertex_attributes_only() {
        assert_eq!(SubmeshComponents::POSITIONS.vertex_stride(), 16);
        assert_eq!(SubmeshComponents::standard().vertex_stride(), 64);
        let skinned = SubmeshComponents::standard() | SubmeshComponents::BONES | SubmeshComponents::MESHLETS;
        assert_eq!(skinned.vertex_stride(), 64);
        assert!(skinned.has_bones());
    }

    #[test]
    fn test_bone_data_size_matches_layout() {
        assert_eq!(std::mem::size_of::<VertexBoneData>(), BONE_DATA_SIZE as usize);
        let bone = VertexBoneData { ids: [1, 0, 0, 0], weights: [1.0, 0.0, 0.0, 0.0] };
        let bytes = bone.to_bytes();
        assert_eq!(&bytes[..4], &1u32.to_ne_bytes());
        assert_eq!(&bytes[16..20], &1.0f32.to_ne_bytes());
    }
}
