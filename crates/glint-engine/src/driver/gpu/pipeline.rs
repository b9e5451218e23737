//! Program objects and render pipelines for the wgpu driver.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::num::NonZeroU64;

use crate::driver::error::DriverError;
use crate::driver::front::{CompiledStage, LinkedProgram};
use crate::driver::types::{AttributeFormat, ComponentType, Topology};

/// Uniform buffers are sized in whole 16-byte rows.
const UNIFORM_ROW: u64 = 16;

/// GPU half of a linked program: shader modules, uniform buffers, layouts.
pub(super) struct ProgramGpu {
    vertex_module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_module: wgpu::ShaderModule,
    fragment_entry: String,
    pipeline_layout: wgpu::PipelineLayout,
    pub(super) bind_group: Option<wgpu::BindGroup>,
    pub(super) uniform_buffers: BTreeMap<u32, wgpu::Buffer>,
}

fn shader_module(device: &wgpu::Device, stage: &CompiledStage) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(stage.kind.label()),
        source: wgpu::ShaderSource::Naga(Cow::Owned(stage.module.clone())),
    })
}

impl ProgramGpu {
    pub(super) fn new(device: &wgpu::Device, linked: &LinkedProgram) -> Self {
        let buffers = &linked.interface.buffers;

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = buffers
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(u64::from(b.size)),
                },
                count: None,
            })
            .collect();

        let uniform_buffers: BTreeMap<u32, wgpu::Buffer> = buffers
            .iter()
            .map(|b| {
                let size = u64::from(b.size).div_ceil(UNIFORM_ROW).max(1) * UNIFORM_ROW;
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("glint uniform buffer"),
                    size,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (b.binding, buffer)
            })
            .collect();

        let (pipeline_layout, bind_group) = if layout_entries.is_empty() {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("glint pipeline layout"),
                bind_group_layouts: &[],
                immediate_size: 0,
            });
            (layout, None)
        } else {
            let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("glint uniform bgl"),
                entries: &layout_entries,
            });
            let entries: Vec<wgpu::BindGroupEntry<'_>> = uniform_buffers
                .iter()
                .map(|(binding, buffer)| wgpu::BindGroupEntry {
                    binding: *binding,
                    resource: buffer.as_entire_binding(),
                })
                .collect();
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("glint uniform bind group"),
                layout: &bgl,
                entries: &entries,
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("glint pipeline layout"),
                bind_group_layouts: &[&bgl],
                immediate_size: 0,
            });
            (layout, Some(bind_group))
        };

        Self {
            vertex_module: shader_module(device, &linked.vertex),
            vertex_entry: linked.vertex.entry_point.clone(),
            fragment_module: shader_module(device, &linked.fragment),
            fragment_entry: linked.fragment.entry_point.clone(),
            pipeline_layout,
            bind_group,
            uniform_buffers,
        }
    }

    /// Builds a pipeline reading one vertex buffer per `(location, format)`.
    ///
    /// Buffer slot `i` in the pipeline is `attributes[i]`.
    pub(super) fn build_pipeline(
        &self,
        device: &wgpu::Device,
        attributes: &[(u32, AttributeFormat)],
        topology: Topology,
        target: wgpu::TextureFormat,
    ) -> Result<wgpu::RenderPipeline, DriverError> {
        let attrs = attributes
            .iter()
            .map(|(location, format)| -> Result<[wgpu::VertexAttribute; 1], DriverError> {
                Ok([wgpu::VertexAttribute {
                    format: vertex_format(format)?,
                    offset: 0,
                    shader_location: *location,
                }])
            })
            .collect::<Result<Vec<_>, _>>()?;

        let layouts: Vec<wgpu::VertexBufferLayout<'_>> = attributes
            .iter()
            .zip(&attrs)
            .map(|((_, format), attr)| wgpu::VertexBufferLayout {
                array_stride: format.effective_stride(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attr,
            })
            .collect();

        Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("glint pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.vertex_module,
                entry_point: Some(self.vertex_entry.as_str()),
                compilation_options: Default::default(),
                buffers: &layouts,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.fragment_module,
                entry_point: Some(self.fragment_entry.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: primitive_topology(topology),
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        }))
    }
}

pub(super) fn primitive_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::Points => wgpu::PrimitiveTopology::PointList,
        Topology::Lines => wgpu::PrimitiveTopology::LineList,
        Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

/// Maps an attribute description onto a wgpu vertex format.
///
/// wgpu has no 3-component 8/16-bit formats and no normalized 32-bit integers.
pub(super) fn vertex_format(format: &AttributeFormat) -> Result<wgpu::VertexFormat, DriverError> {
    use wgpu::VertexFormat as F;

    let f = match (format.component_type, format.normalized, format.components) {
        (ComponentType::F32, _, 1) => F::Float32,
        (ComponentType::F32, _, 2) => F::Float32x2,
        (ComponentType::F32, _, 3) => F::Float32x3,
        (ComponentType::F32, _, 4) => F::Float32x4,

        (ComponentType::U32, false, 1) => F::Uint32,
        (ComponentType::U32, false, 2) => F::Uint32x2,
        (ComponentType::U32, false, 3) => F::Uint32x3,
        (ComponentType::U32, false, 4) => F::Uint32x4,
        (ComponentType::I32, false, 1) => F::Sint32,
        (ComponentType::I32, false, 2) => F::Sint32x2,
        (ComponentType::I32, false, 3) => F::Sint32x3,
        (ComponentType::I32, false, 4) => F::Sint32x4,

        (ComponentType::U8, false, 2) => F::Uint8x2,
        (ComponentType::U8, false, 4) => F::Uint8x4,
        (ComponentType::U8, true, 2) => F::Unorm8x2,
        (ComponentType::U8, true, 4) => F::Unorm8x4,
        (ComponentType::I8, false, 2) => F::Sint8x2,
        (ComponentType::I8, false, 4) => F::Sint8x4,
        (ComponentType::I8, true, 2) => F::Snorm8x2,
        (ComponentType::I8, true, 4) => F::Snorm8x4,

        (ComponentType::U16, false, 2) => F::Uint16x2,
        (ComponentType::U16, false, 4) => F::Uint16x4,
        (ComponentType::U16, true, 2) => F::Unorm16x2,
        (ComponentType::U16, true, 4) => F::Unorm16x4,
        (ComponentType::I16, false, 2) => F::Sint16x2,
        (ComponentType::I16, false, 4) => F::Sint16x4,
        (ComponentType::I16, true, 2) => F::Snorm16x2,
        (ComponentType::I16, true, 4) => F::Snorm16x4,

        (ty, normalized, n) => {
            return Err(DriverError::Unsupported(format!(
                "vertex format {n}x{ty:?}{}",
                if normalized { " (normalized)" } else { "" }
            )));
        }
    };
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(component_type: ComponentType, normalized: bool, components: u8) -> AttributeFormat {
        AttributeFormat {
            components,
            component_type,
            normalized,
            offset: 0,
            stride: 0,
        }
    }

    #[test]
    fn float_formats_map_by_component_count() {
        assert_eq!(
            vertex_format(&fmt(ComponentType::F32, false, 3)).unwrap(),
            wgpu::VertexFormat::Float32x3
        );
    }

    #[test]
    fn normalized_bytes_map_to_unorm() {
        assert_eq!(
            vertex_format(&fmt(ComponentType::U8, true, 4)).unwrap(),
            wgpu::VertexFormat::Unorm8x4
        );
    }

    #[test]
    fn three_byte_attributes_are_unsupported() {
        assert!(matches!(
            vertex_format(&fmt(ComponentType::U8, true, 3)),
            Err(DriverError::Unsupported(_))
        ));
    }

    #[test]
    fn topology_maps_to_list_and_strip_kinds() {
        assert_eq!(primitive_topology(Topology::Points), wgpu::PrimitiveTopology::PointList);
        assert_eq!(
            primitive_topology(Topology::TriangleStrip),
            wgpu::PrimitiveTopology::TriangleStrip
        );
    }
}
