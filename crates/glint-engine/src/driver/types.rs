use std::fmt;

use glam::{Mat4, Vec2, Vec3, Vec4};

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw driver-side object name.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

object_id!(
    /// Driver-side shader object.
    ShaderId,
    "shader"
);
object_id!(
    /// Driver-side program object.
    ProgramId,
    "program"
);
object_id!(
    /// Driver-side buffer object.
    BufferId,
    "buffer"
);
object_id!(
    /// Driver-side vertex array object (buffer-to-attribute bindings).
    VertexArrayId,
    "vertex-array"
);

/// Monotonic object-name allocator shared by the drivers.
///
/// Names start at 1 so that a zeroed id never aliases a live object.
#[derive(Debug)]
pub(crate) struct NameAllocator {
    next: u32,
}

impl NameAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next(&mut self) -> u32 {
        let name = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        name
    }
}

/// Fixed-function stage a shader source is compiled for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
    /// Accepted for completeness, but neither driver can run one: wgpu has no
    /// geometry stage, so compiling a geometry source always fails with a log.
    Geometry,
}

impl StageKind {
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::Geometry => "geometry",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shading language of a stage source.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SourceLanguage {
    Wgsl,
    /// Desktop GLSL (`#version 440` and later).
    Glsl,
}

/// Source text for one shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSource {
    language: SourceLanguage,
    text: String,
}

impl StageSource {
    pub fn new(language: SourceLanguage, text: impl Into<String>) -> Self {
        Self {
            language,
            text: text.into(),
        }
    }

    pub fn wgsl(text: impl Into<String>) -> Self {
        Self::new(SourceLanguage::Wgsl, text)
    }

    pub fn glsl(text: impl Into<String>) -> Self {
        Self::new(SourceLanguage::Glsl, text)
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    /// Source text with any C-style NUL terminator removed.
    pub fn text(&self) -> &str {
        self.text.trim_end_matches('\0')
    }
}

/// Declared type of a uniform as seen by the shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    F32,
    Vec2,
    Vec3,
    Vec4,
    /// Column-major 4x4 float matrix.
    Mat4,
    /// Any declared type the binder cannot upload (structs, arrays, integers).
    Other,
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UniformKind::F32 => "f32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec3 => "vec3<f32>",
            UniformKind::Vec4 => "vec4<f32>",
            UniformKind::Mat4 => "mat4x4<f32>",
            UniformKind::Other => "<non-uploadable>",
        };
        f.write_str(s)
    }
}

/// Typed uniform payload.
///
/// Matrices are uploaded column-major; vectors as tightly packed 32-bit floats.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::F32(_) => UniformKind::F32,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Raw little-endian float bytes as laid out in a uniform buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::F32(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec2(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            UniformValue::Mat4(m) => bytemuck::cast_slice(&m.to_cols_array()).to_vec(),
        }
    }
}

/// Driver-side uniform location inside one linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Result of a successful uniform lookup.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformInfo {
    pub location: UniformLocation,
    pub kind: UniformKind,
}

/// Scalar type of one attribute component.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComponentType {
    F32,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(self) -> u64 {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::F32 | ComponentType::I32 | ComponentType::U32 => 4,
        }
    }
}

/// Memory description of one vertex attribute inside a buffer.
///
/// `stride == 0` means tightly packed (stride equals the attribute size).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AttributeFormat {
    pub components: u8,
    pub component_type: ComponentType,
    pub normalized: bool,
    pub offset: u64,
    pub stride: u64,
}

impl AttributeFormat {
    /// Bytes read per vertex for this attribute.
    pub fn size(&self) -> u64 {
        u64::from(self.components) * self.component_type.size()
    }

    /// Distance between consecutive vertices, resolving the tightly-packed case.
    pub fn effective_stride(&self) -> u64 {
        if self.stride == 0 { self.size() } else { self.stride }
    }
}

/// Usage hint for vertex data uploads.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    /// Uploaded once; re-uploads are rejected.
    StaticUpload,
    /// May be re-uploaded any number of times.
    DynamicUpload,
}

/// Primitive assembly mode of a draw call.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_terminator_is_stripped() {
        let src = StageSource::glsl("void main() {}\0");
        assert_eq!(src.text(), "void main() {}");
    }

    #[test]
    fn tightly_packed_stride_is_attribute_size() {
        let fmt = AttributeFormat {
            components: 3,
            component_type: ComponentType::F32,
            normalized: false,
            offset: 0,
            stride: 0,
        };
        assert_eq!(fmt.size(), 12);
        assert_eq!(fmt.effective_stride(), 12);
    }

    #[test]
    fn matrix_bytes_are_column_major() {
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        ]);
        let bytes = UniformValue::Mat4(m).to_bytes();
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        assert_eq!(floats.len(), 16);
        assert_eq!(floats[1], 2.0);
        assert_eq!(floats[4], 5.0);
    }

    #[test]
    fn vec3_is_tightly_packed() {
        assert_eq!(UniformValue::Vec3(Vec3::ONE).to_bytes().len(), 12);
    }

    #[test]
    fn object_ids_display_with_kind() {
        assert_eq!(ProgramId(7).to_string(), "program#7");
    }
}
