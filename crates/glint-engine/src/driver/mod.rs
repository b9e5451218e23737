//! GPU driver boundary.
//!
//! Everything above this module talks to the GPU through [`Driver`], a small
//! object-name API modelled on the shader/program/buffer/vertex-array split.
//! Every call is atomic and single-threaded; the driver is owned by the render
//! thread for the lifetime of the context.
//!
//! Drivers:
//! - [`HeadlessDriver`]: host-memory driver for tests and windowless runs
//! - [`WgpuDriver`]: wgpu device + window surface

mod error;
mod front;
mod gpu;
mod headless;
mod registry;
mod types;

pub use error::DriverError;
pub use gpu::{GpuInit, SurfaceErrorAction, WgpuDriver};
pub use headless::{DEFAULT_FRAME_CAPACITY, DrawRecord, FrameRecord, HeadlessDriver, LiveObjects};
pub use types::{
    AttributeFormat,
    BufferId,
    BufferUsage,
    ComponentType,
    ProgramId,
    ShaderId,
    SourceLanguage,
    StageKind,
    StageSource,
    Topology,
    UniformInfo,
    UniformKind,
    UniformLocation,
    UniformValue,
    VertexArrayId,
};

/// GL-shaped driver contract consumed by the shader, vertex and loop layers.
///
/// Status and log queries on unknown objects report "failed" / empty instead of
/// erroring, mirroring how the compile/link protocol probes them.
pub trait Driver {
    // ── shaders ───────────────────────────────────────────────────────────

    fn create_shader(&mut self, kind: StageKind) -> Result<ShaderId, DriverError>;
    fn shader_source(&mut self, shader: ShaderId, source: &StageSource) -> Result<(), DriverError>;
    fn compile_shader(&mut self, shader: ShaderId) -> Result<(), DriverError>;
    fn shader_compile_status(&self, shader: ShaderId) -> bool;
    /// Length in bytes of the compile log.
    fn shader_info_log_length(&self, shader: ShaderId) -> usize;
    /// Copies up to `buf.len()` bytes of the compile log; returns the count written.
    fn shader_info_log(&self, shader: ShaderId, buf: &mut [u8]) -> usize;
    fn delete_shader(&mut self, shader: ShaderId);

    // ── programs ──────────────────────────────────────────────────────────

    fn create_program(&mut self) -> Result<ProgramId, DriverError>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) -> Result<(), DriverError>;
    fn link_program(&mut self, program: ProgramId) -> Result<(), DriverError>;
    fn program_link_status(&self, program: ProgramId) -> bool;
    fn program_info_log_length(&self, program: ProgramId) -> usize;
    fn program_info_log(&self, program: ProgramId, buf: &mut [u8]) -> usize;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: Option<ProgramId>) -> Result<(), DriverError>;

    /// Looks up an active uniform; `None` when the program does not declare it.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformInfo>;
    /// Looks up a vertex input location by name.
    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32>;
    fn set_uniform(
        &mut self,
        program: ProgramId,
        location: UniformLocation,
        value: &UniformValue,
    ) -> Result<(), DriverError>;

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&mut self) -> Result<BufferId, DriverError>;
    /// (Re)allocates the buffer storage and fills it with `data`.
    fn buffer_data(&mut self, buffer: BufferId, data: &[u8], usage: BufferUsage) -> Result<(), DriverError>;
    /// Overwrites part of the existing storage.
    fn buffer_sub_data(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DriverError>;
    /// Reads the buffer back to host memory; `Ok(None)` when unsupported.
    fn read_buffer(&mut self, buffer: BufferId) -> Result<Option<Vec<u8>>, DriverError>;
    fn delete_buffer(&mut self, buffer: BufferId);

    // ── vertex arrays ─────────────────────────────────────────────────────

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, DriverError>;
    /// Binds `buffer` to attribute `location` of `array` and enables it.
    fn vertex_attrib_pointer(
        &mut self,
        array: VertexArrayId,
        buffer: BufferId,
        location: u32,
        format: &AttributeFormat,
    ) -> Result<(), DriverError>;
    fn bind_vertex_array(&mut self, array: Option<VertexArrayId>) -> Result<(), DriverError>;
    fn delete_vertex_array(&mut self, array: VertexArrayId);

    // ── frames ────────────────────────────────────────────────────────────

    /// Starts recording a frame whose colour target is cleared to `clear`.
    fn begin_frame(&mut self, clear: [f32; 4]) -> Result<(), DriverError>;
    /// Draws `count` vertices from the bound vertex array with the program in use.
    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) -> Result<(), DriverError>;
    /// Submits the recorded frame and hands it to the display.
    ///
    /// May block on vertical sync.
    fn present(&mut self) -> Result<(), DriverError>;

    /// Notifies the driver that the drawable size changed (physical pixels).
    fn resize(&mut self, width: u32, height: u32) {
        let _ = (width, height);
    }
}
