//! wgpu-backed driver.
//!
//! Programs turn into render pipelines lazily, one per (program, vertex array,
//! topology) combination seen at draw time. Draws are queued while a frame is
//! open and encoded into a single render pass at `present`.

mod device;
mod pipeline;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

pub use device::{GpuInit, SurfaceErrorAction};

use self::device::{Gpu, GpuFrame};
use self::pipeline::ProgramGpu;
use super::Driver;
use super::error::DriverError;
use super::registry::ShaderRegistry;
use super::types::{
    AttributeFormat, BufferId, BufferUsage, NameAllocator, ProgramId, ShaderId, StageKind, StageSource, Topology,
    UniformInfo, UniformLocation, UniformValue, VertexArrayId,
};

/// Required alignment of buffer copies and vertex buffer offsets.
const COPY_ALIGN: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

struct GpuBuffer {
    raw: Option<wgpu::Buffer>,
    /// Bytes the caller uploaded; the allocation is padded to `COPY_ALIGN`.
    len: u64,
    usage: BufferUsage,
}

#[derive(Default)]
struct VertexArrayState {
    attributes: BTreeMap<u32, (BufferId, AttributeFormat)>,
}

type PipelineKey = (ProgramId, VertexArrayId, Topology);

struct QueuedDraw {
    pipeline: wgpu::RenderPipeline,
    bind_group: Option<wgpu::BindGroup>,
    vertex_buffers: Vec<(wgpu::Buffer, u64)>,
    first: u32,
    count: u32,
}

struct OpenFrame {
    /// `None` when the surface could not provide a texture this frame.
    target: Option<GpuFrame>,
    clear: [f32; 4],
    draws: Vec<QueuedDraw>,
}

/// Driver rendering into a winit window through wgpu.
pub struct WgpuDriver {
    gpu: Gpu,
    names: NameAllocator,
    registry: ShaderRegistry,
    programs: HashMap<ProgramId, ProgramGpu>,
    buffers: HashMap<BufferId, GpuBuffer>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayState>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    current_program: Option<ProgramId>,
    bound_array: Option<VertexArrayId>,
    frame: Option<OpenFrame>,
}

impl WgpuDriver {
    /// Creates the device and a surface for `window`.
    ///
    /// Blocks on adapter and device acquisition.
    pub fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(window, init))?;
        Ok(Self {
            gpu,
            names: NameAllocator::new(),
            registry: ShaderRegistry::default(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            pipelines: HashMap::new(),
            current_program: None,
            bound_array: None,
            frame: None,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.gpu.surface_format()
    }

    /// Current drawable size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        let s = self.gpu.size();
        (s.width, s.height)
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut GpuBuffer, DriverError> {
        self.buffers.get_mut(&id).ok_or_else(|| DriverError::unknown(id))
    }

    fn pipeline(
        &mut self,
        program: ProgramId,
        vertex_array: VertexArrayId,
        topology: Topology,
        attributes: &[(u32, AttributeFormat)],
    ) -> Result<wgpu::RenderPipeline, DriverError> {
        let key = (program, vertex_array, topology);
        if let Some(p) = self.pipelines.get(&key) {
            return Ok(p.clone());
        }
        let gpu_program = self.programs.get(&program).ok_or_else(|| DriverError::unknown(program))?;
        let pipeline =
            gpu_program.build_pipeline(self.gpu.device(), attributes, topology, self.gpu.surface_format())?;
        log::debug!("built pipeline for {program} with {vertex_array} ({topology:?})");
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    fn forget_pipelines(&mut self, keep: impl Fn(&PipelineKey) -> bool) {
        self.pipelines.retain(|key, _| keep(key));
    }
}

/// Rounds `len` up to the copy alignment, never below one aligned word.
fn padded_len(len: u64) -> u64 {
    len.div_ceil(COPY_ALIGN).max(1) * COPY_ALIGN
}

fn padded(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.resize(padded_len(data.len() as u64) as usize, 0);
    out
}

impl Driver for WgpuDriver {
    fn create_shader(&mut self, kind: StageKind) -> Result<ShaderId, DriverError> {
        let id = ShaderId(self.names.next());
        self.registry.insert_shader(id, kind);
        Ok(id)
    }

    fn shader_source(&mut self, shader: ShaderId, source: &StageSource) -> Result<(), DriverError> {
        self.registry.shader_source(shader, source)
    }

    fn compile_shader(&mut self, shader: ShaderId) -> Result<(), DriverError> {
        self.registry.compile_shader(shader)
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        self.registry.compile_status(shader)
    }

    fn shader_info_log_length(&self, shader: ShaderId) -> usize {
        self.registry.shader_log_length(shader)
    }

    fn shader_info_log(&self, shader: ShaderId, buf: &mut [u8]) -> usize {
        self.registry.shader_log(shader, buf)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.registry.remove_shader(shader);
    }

    fn create_program(&mut self) -> Result<ProgramId, DriverError> {
        let id = ProgramId(self.names.next());
        self.registry.insert_program(id);
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) -> Result<(), DriverError> {
        self.registry.attach(program, shader)
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), DriverError> {
        self.registry.link(program)?;
        self.programs.remove(&program);
        self.forget_pipelines(|(p, _, _)| *p != program);
        if let Some(linked) = self.registry.linked(program) {
            self.programs
                .insert(program, ProgramGpu::new(self.gpu.device(), linked));
        }
        Ok(())
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.registry.linked(program).is_some()
    }

    fn program_info_log_length(&self, program: ProgramId) -> usize {
        self.registry.program_log_length(program)
    }

    fn program_info_log(&self, program: ProgramId, buf: &mut [u8]) -> usize {
        self.registry.program_log(program, buf)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.registry.remove_program(program) {
            self.programs.remove(&program);
            self.forget_pipelines(|(p, _, _)| *p != program);
            if self.current_program == Some(program) {
                self.current_program = None;
            }
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), DriverError> {
        if let Some(id) = program {
            if !self.registry.contains_program(id) {
                return Err(DriverError::unknown(id));
            }
            if !self.programs.contains_key(&id) {
                return Err(DriverError::Unbound(format!("{id} is not linked")));
            }
        }
        self.current_program = program;
        Ok(())
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformInfo> {
        self.registry.uniform_location(program, name)
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.registry.attrib_location(program, name)
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<(), DriverError> {
        let slot = self.registry.set_uniform(program, location, value)?;
        let buffer = self
            .programs
            .get(&program)
            .and_then(|p| p.uniform_buffers.get(&slot.binding))
            .ok_or_else(|| DriverError::unknown(format!("uniform buffer {} of {program}", slot.binding)))?;
        self.gpu
            .queue()
            .write_buffer(buffer, u64::from(slot.offset), &value.to_bytes());
        Ok(())
    }

    fn create_buffer(&mut self) -> Result<BufferId, DriverError> {
        let id = BufferId(self.names.next());
        self.buffers.insert(
            id,
            GpuBuffer {
                raw: None,
                len: 0,
                usage: BufferUsage::StaticUpload,
            },
        );
        Ok(id)
    }

    fn buffer_data(&mut self, buffer: BufferId, data: &[u8], usage: BufferUsage) -> Result<(), DriverError> {
        let mut flags = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_SRC;
        if usage == BufferUsage::DynamicUpload {
            flags |= wgpu::BufferUsages::COPY_DST;
        }
        self.buffer_mut(buffer)?;
        let raw = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("glint vertex buffer"),
                contents: &padded(data),
                usage: flags,
            });
        let obj = self.buffer_mut(buffer)?;
        obj.raw = Some(raw);
        obj.len = data.len() as u64;
        obj.usage = usage;
        Ok(())
    }

    fn buffer_sub_data(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DriverError> {
        let obj = self.buffers.get(&buffer).ok_or_else(|| DriverError::unknown(buffer))?;
        if obj.usage != BufferUsage::DynamicUpload {
            return Err(DriverError::Unsupported(format!("{buffer} was not allocated for updates")));
        }
        let end = offset.saturating_add(data.len() as u64);
        if offset % COPY_ALIGN != 0 || (data.len() as u64 % COPY_ALIGN != 0 && end != obj.len) {
            return Err(DriverError::Unsupported(format!(
                "update of {} bytes at offset {offset} is not {COPY_ALIGN}-byte aligned",
                data.len()
            )));
        }
        if end > obj.len {
            return Err(DriverError::OutOfRange(format!(
                "{} bytes at offset {offset} into {buffer} of {} bytes",
                data.len(),
                obj.len
            )));
        }
        let raw = obj
            .raw
            .as_ref()
            .ok_or_else(|| DriverError::Unbound(format!("{buffer} has no storage")))?;
        // Unaligned writes end at `len`, so padding only lands in the alignment tail.
        self.gpu.queue().write_buffer(raw, offset, &padded(data));
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId) -> Result<Option<Vec<u8>>, DriverError> {
        let obj = self.buffers.get(&buffer).ok_or_else(|| DriverError::unknown(buffer))?;
        let Some(raw) = obj.raw.as_ref() else {
            return Ok(Some(Vec::new()));
        };
        let size = raw.size();
        let device = self.gpu.device();

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glint read-back staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("glint read-back encoder"),
        });
        encoder.copy_buffer_to_buffer(raw, 0, &staging, 0, size);
        self.gpu.queue().submit(std::iter::once(encoder.finish()));

        let (tx, rx) = std::sync::mpsc::channel();
        staging.slice(..).map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| DriverError::Device(format!("poll failed during read-back: {e}")))?;
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(DriverError::Device(format!("read-back map failed: {e}"))),
            Err(_) => return Err(DriverError::Device("read-back map never completed".into())),
        }

        let mut bytes = staging.slice(..).get_mapped_range().to_vec();
        staging.unmap();
        bytes.truncate(obj.len as usize);
        Ok(Some(bytes))
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, DriverError> {
        let id = VertexArrayId(self.names.next());
        self.vertex_arrays.insert(id, VertexArrayState::default());
        Ok(id)
    }

    fn vertex_attrib_pointer(
        &mut self,
        array: VertexArrayId,
        buffer: BufferId,
        location: u32,
        format: &AttributeFormat,
    ) -> Result<(), DriverError> {
        pipeline::vertex_format(format)?;
        if format.offset % COPY_ALIGN != 0 || format.effective_stride() % COPY_ALIGN != 0 {
            return Err(DriverError::Unsupported(format!(
                "attribute offset {} / stride {} must be multiples of {COPY_ALIGN}",
                format.offset,
                format.effective_stride()
            )));
        }
        if !self.buffers.contains_key(&buffer) {
            return Err(DriverError::unknown(buffer));
        }
        let vao = self
            .vertex_arrays
            .get_mut(&array)
            .ok_or_else(|| DriverError::unknown(array))?;
        vao.attributes.insert(location, (buffer, *format));
        self.forget_pipelines(|(_, v, _)| *v != array);
        Ok(())
    }

    fn bind_vertex_array(&mut self, array: Option<VertexArrayId>) -> Result<(), DriverError> {
        if let Some(id) = array {
            if !self.vertex_arrays.contains_key(&id) {
                return Err(DriverError::unknown(id));
            }
        }
        self.bound_array = array;
        Ok(())
    }

    fn delete_vertex_array(&mut self, array: VertexArrayId) {
        if self.vertex_arrays.remove(&array).is_some() {
            self.forget_pipelines(|(_, v, _)| *v != array);
            if self.bound_array == Some(array) {
                self.bound_array = None;
            }
        }
    }

    fn begin_frame(&mut self, clear: [f32; 4]) -> Result<(), DriverError> {
        let target = match self.gpu.begin_frame() {
            Ok(frame) => Some(frame),
            Err(err) => match self.gpu.handle_surface_error(&err) {
                SurfaceErrorAction::Reconfigured => {
                    log::info!("surface reconfigured after {err}; skipping frame");
                    None
                }
                SurfaceErrorAction::SkipFrame => {
                    log::warn!("surface unavailable ({err}); skipping frame");
                    None
                }
                SurfaceErrorAction::Fatal => {
                    return Err(match err {
                        wgpu::SurfaceError::OutOfMemory => DriverError::OutOfMemory,
                        other => DriverError::Surface(other.to_string()),
                    });
                }
            },
        };
        self.frame = Some(OpenFrame {
            target,
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) -> Result<(), DriverError> {
        if self.frame.is_none() {
            return Err(DriverError::Unbound("draw issued outside a frame".into()));
        }
        if first.checked_add(count).is_none() {
            return Err(DriverError::OutOfRange(format!("draw of {count} vertices from {first} overflows")));
        }
        let program = self
            .current_program
            .ok_or_else(|| DriverError::Unbound("no program in use".into()))?;
        let vertex_array = self
            .bound_array
            .ok_or_else(|| DriverError::Unbound("no vertex array bound".into()))?;

        let linked = self
            .registry
            .linked(program)
            .ok_or_else(|| DriverError::Unbound(format!("{program} is not linked")))?;
        let vao = self
            .vertex_arrays
            .get(&vertex_array)
            .ok_or_else(|| DriverError::unknown(vertex_array))?;

        let mut attributes = Vec::with_capacity(linked.interface.attributes.len());
        let mut vertex_buffers = Vec::with_capacity(linked.interface.attributes.len());
        for attr in &linked.interface.attributes {
            let (buffer, format) = vao.attributes.get(&attr.location).ok_or_else(|| {
                DriverError::Unbound(format!(
                    "attribute `{}` (location {}) has no buffer in {vertex_array}",
                    attr.name, attr.location
                ))
            })?;
            let raw = self
                .buffers
                .get(buffer)
                .and_then(|b| b.raw.clone())
                .ok_or_else(|| DriverError::Unbound(format!("{buffer} has no storage")))?;
            attributes.push((attr.location, *format));
            vertex_buffers.push((raw, format.offset));
        }

        let pipeline = self.pipeline(program, vertex_array, topology, &attributes)?;
        let bind_group = self.programs.get(&program).and_then(|p| p.bind_group.clone());

        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(QueuedDraw {
                pipeline,
                bind_group,
                vertex_buffers,
                first,
                count,
            });
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), DriverError> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| DriverError::Unbound("present without begin_frame".into()))?;
        let Some(mut target) = frame.target else {
            return Ok(());
        };

        {
            let [r, g, b, a] = frame.clear.map(f64::from);
            let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glint frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in &frame.draws {
                // Empty draws, or attributes starting past the end of their buffer.
                if draw.count == 0 || draw.vertex_buffers.iter().any(|(b, offset)| *offset >= b.size()) {
                    continue;
                }
                rpass.set_pipeline(&draw.pipeline);
                if let Some(bg) = &draw.bind_group {
                    rpass.set_bind_group(0, bg, &[]);
                }
                for (slot, (buffer, offset)) in draw.vertex_buffers.iter().enumerate() {
                    rpass.set_vertex_buffer(slot as u32, buffer.slice(*offset..));
                }
                rpass.draw(draw.first..draw.first.saturating_add(draw.count), 0..1);
            }
        }

        self.gpu.submit(target);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::debug!("reconfiguring surface at {width}x{height}");
        self.gpu.resize(PhysicalSize::new(width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_up_to_copy_alignment() {
        assert_eq!(padded_len(0), 4);
        assert_eq!(padded_len(5), 8);
        assert_eq!(padded(&[1, 2, 3]), vec![1, 2, 3, 0]);
    }
}
