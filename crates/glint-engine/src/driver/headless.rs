use std::collections::{BTreeMap, HashMap};

use super::Driver;
use super::error::DriverError;
use super::registry::ShaderRegistry;
use super::types::{
    AttributeFormat, BufferId, BufferUsage, NameAllocator, ProgramId, ShaderId, StageKind, StageSource, Topology,
    UniformInfo, UniformLocation, UniformValue, VertexArrayId,
};

/// One draw call as the headless driver saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub vertex_array: VertexArrayId,
    pub topology: Topology,
    pub first: u32,
    pub count: u32,
    /// Uniform values of the program at draw time, by name.
    pub uniforms: BTreeMap<String, UniformValue>,
}

/// One presented frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub clear: [f32; 4],
    pub draws: Vec<DrawRecord>,
}

/// Number of driver objects currently alive.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub shaders: usize,
    pub programs: usize,
    pub buffers: usize,
    pub vertex_arrays: usize,
}

impl LiveObjects {
    pub fn total(&self) -> usize {
        self.shaders + self.programs + self.buffers + self.vertex_arrays
    }
}

#[derive(Debug, Default)]
struct BufferObject {
    data: Vec<u8>,
    usage: Option<BufferUsage>,
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    attributes: BTreeMap<u32, (BufferId, AttributeFormat)>,
}

/// Frames kept by [`HeadlessDriver::new`]; older frames are dropped first.
pub const DEFAULT_FRAME_CAPACITY: usize = 256;

/// Host-memory driver.
///
/// Shaders go through the same naga front end as [`super::WgpuDriver`], so
/// compile and link diagnostics match; draws are recorded instead of rasterised.
/// Only the most recent `frame_capacity` frames are retained.
#[derive(Debug)]
pub struct HeadlessDriver {
    names: NameAllocator,
    registry: ShaderRegistry,
    buffers: HashMap<u32, BufferObject>,
    vertex_arrays: HashMap<u32, VertexArrayObject>,

    current_program: Option<ProgramId>,
    bound_array: Option<VertexArrayId>,
    open_frame: Option<FrameRecord>,
    frames: Vec<FrameRecord>,
    frame_capacity: usize,
    presented: u64,
    size: (u32, u32),
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self {
            names: NameAllocator::new(),
            registry: ShaderRegistry::default(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            current_program: None,
            bound_array: None,
            open_frame: None,
            frames: Vec::new(),
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            presented: 0,
            size: (0, 0),
        }
    }

    /// Keeps at most `capacity` frames; 0 records nothing.
    pub fn with_frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self.trim_frames();
        self
    }

    /// Retained frames, oldest first.
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    /// Hands over the retained frames and clears the history.
    pub fn take_frames(&mut self) -> Vec<FrameRecord> {
        std::mem::take(&mut self.frames)
    }

    /// Frames presented over the driver's lifetime, retained or not.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    fn trim_frames(&mut self) {
        if self.frames.len() > self.frame_capacity {
            let excess = self.frames.len() - self.frame_capacity;
            self.frames.drain(..excess);
            log::debug!("dropped {excess} old frame records");
        }
    }

    pub fn live_objects(&self) -> LiveObjects {
        LiveObjects {
            shaders: self.registry.shader_count(),
            programs: self.registry.program_count(),
            buffers: self.buffers.len(),
            vertex_arrays: self.vertex_arrays.len(),
        }
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    /// Last size passed to [`Driver::resize`].
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Usage hint of the buffer's current storage.
    pub fn buffer_usage(&self, id: BufferId) -> Option<BufferUsage> {
        self.buffers.get(&id.0).and_then(|b| b.usage)
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut BufferObject, DriverError> {
        self.buffers.get_mut(&id.0).ok_or_else(|| DriverError::unknown(id))
    }
}

impl Driver for HeadlessDriver {
    fn create_shader(&mut self, kind: StageKind) -> Result<ShaderId, DriverError> {
        let id = ShaderId(self.names.next());
        self.registry.insert_shader(id, kind);
        log::debug!("created {kind} {id}");
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
        if self.registry.remove_shader(shader) {
            log::debug!("deleted {shader}");
        }
    }

    fn create_program(&mut self) -> Result<ProgramId, DriverError> {
        let id = ProgramId(self.names.next());
        self.registry.insert_program(id);
        log::debug!("created {id}");
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) -> Result<(), DriverError> {
        self.registry.attach(program, shader)
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), DriverError> {
        self.registry.link(program)
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
            if self.current_program == Some(program) {
                self.current_program = None;
            }
            log::debug!("deleted {program}");
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), DriverError> {
        if let Some(id) = program {
            if !self.registry.contains_program(id) {
                return Err(DriverError::unknown(id));
            }
            if self.registry.linked(id).is_none() {
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
        self.registry.set_uniform(program, location, value).map(|_| ())
    }

    fn create_buffer(&mut self) -> Result<BufferId, DriverError> {
        let id = BufferId(self.names.next());
        self.buffers.insert(id.0, BufferObject::default());
        log::debug!("created {id}");
        Ok(id)
    }

    fn buffer_data(&mut self, buffer: BufferId, data: &[u8], usage: BufferUsage) -> Result<(), DriverError> {
        let obj = self.buffer_mut(buffer)?;
        obj.data = data.to_vec();
        obj.usage = Some(usage);
        Ok(())
    }

    fn buffer_sub_data(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DriverError> {
        let obj = self.buffer_mut(buffer)?;
        let start = offset as usize;
        let end = start.checked_add(data.len()).filter(|&end| end <= obj.data.len()).ok_or_else(|| {
            DriverError::OutOfRange(format!(
                "{} bytes at offset {offset} into {buffer} of {} bytes",
                data.len(),
                obj.data.len()
            ))
        })?;
        obj.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId) -> Result<Option<Vec<u8>>, DriverError> {
        Ok(Some(self.buffer_mut(buffer)?.data.clone()))
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer.0).is_some() {
            log::debug!("deleted {buffer}");
        }
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, DriverError> {
        let id = VertexArrayId(self.names.next());
        self.vertex_arrays.insert(id.0, VertexArrayObject::default());
        log::debug!("created {id}");
        Ok(id)
    }

    fn vertex_attrib_pointer(
        &mut self,
        array: VertexArrayId,
        buffer: BufferId,
        location: u32,
        format: &AttributeFormat,
    ) -> Result<(), DriverError> {
        if !(1..=4).contains(&format.components) {
            return Err(DriverError::Unsupported(format!(
                "{} components per attribute",
                format.components
            )));
        }
        if !self.buffers.contains_key(&buffer.0) {
            return Err(DriverError::unknown(buffer));
        }
        let vao = self
            .vertex_arrays
            .get_mut(&array.0)
            .ok_or_else(|| DriverError::unknown(array))?;
        vao.attributes.insert(location, (buffer, *format));
        Ok(())
    }

    fn bind_vertex_array(&mut self, array: Option<VertexArrayId>) -> Result<(), DriverError> {
        if let Some(id) = array {
            if !self.vertex_arrays.contains_key(&id.0) {
                return Err(DriverError::unknown(id));
            }
        }
        self.bound_array = array;
        Ok(())
    }

    fn delete_vertex_array(&mut self, array: VertexArrayId) {
        if self.vertex_arrays.remove(&array.0).is_some() {
            if self.bound_array == Some(array) {
                self.bound_array = None;
            }
            log::debug!("deleted {array}");
        }
    }

    fn begin_frame(&mut self, clear: [f32; 4]) -> Result<(), DriverError> {
        self.open_frame = Some(FrameRecord {
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) -> Result<(), DriverError> {
        if self.open_frame.is_none() {
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
            .get(&vertex_array.0)
            .ok_or_else(|| DriverError::unknown(vertex_array))?;
        for attr in &linked.interface.attributes {
            if !vao.attributes.contains_key(&attr.location) {
                return Err(DriverError::Unbound(format!(
                    "attribute `{}` (location {}) has no buffer in {vertex_array}",
                    attr.name, attr.location
                )));
            }
        }

        let uniforms = self.registry.uniform_values(program);
        let record = DrawRecord {
            program,
            vertex_array,
            topology,
            first,
            count,
            uniforms,
        };
        if let Some(frame) = self.open_frame.as_mut() {
            frame.draws.push(record);
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), DriverError> {
        let frame = self
            .open_frame
            .take()
            .ok_or_else(|| DriverError::Unbound("present without begin_frame".into()))?;
        self.presented += 1;
        if self.frame_capacity > 0 {
            if self.frames.len() == self.frame_capacity {
                self.frames.remove(0);
            }
            self.frames.push(frame);
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }
}
