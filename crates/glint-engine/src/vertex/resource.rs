use crate::driver::{BufferId, BufferUsage, Driver, VertexArrayId};
use crate::error::{RenderError, RenderResult};
use crate::shader::Program;

use super::layout::{AttributeSlot, VertexLayout};

/// One vertex array plus the buffer backing every attribute of its layout.
#[derive(Debug)]
pub struct VertexResourceSet {
    array: VertexArrayId,
    buffer: BufferId,
    layout: VertexLayout,
    usage: BufferUsage,
    /// Bytes currently held by the buffer.
    data_len: usize,
    vertex_count: u32,
    count_override: Option<u32>,
    released: bool,
}

impl VertexResourceSet {
    /// Allocates the array and buffer, uploads `data` and enables every
    /// attribute of `layout` against that buffer.
    ///
    /// All slots must be locations; use [`Self::create_for_program`] for names.
    pub fn create<D: Driver>(
        driver: &mut D,
        layout: VertexLayout,
        data: &[u8],
        usage: BufferUsage,
    ) -> RenderResult<Self> {
        layout.validate()?;

        let locations = layout
            .attributes()
            .iter()
            .map(|a| match a.slot {
                AttributeSlot::Location(l) => Ok((l, a.format)),
                AttributeSlot::Name(ref name) => Err(RenderError::contract(format!(
                    "attribute `{name}` must be resolved against a program before upload"
                ))),
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let array = driver.create_vertex_array()?;
        let buffer = match driver.create_buffer() {
            Ok(b) => b,
            Err(e) => {
                driver.delete_vertex_array(array);
                return Err(e.into());
            }
        };

        let configured = driver.buffer_data(buffer, data, usage).and_then(|()| {
            locations
                .iter()
                .try_for_each(|(location, format)| driver.vertex_attrib_pointer(array, buffer, *location, format))
        });
        if let Err(e) = configured {
            driver.delete_vertex_array(array);
            driver.delete_buffer(buffer);
            return Err(e.into());
        }

        let vertex_count = layout.vertex_count(data.len() as u64);
        log::debug!(
            "created {array} with {buffer}: {} bytes, {vertex_count} vertices, {usage:?}",
            data.len()
        );
        Ok(Self {
            array,
            buffer,
            layout,
            usage,
            data_len: data.len(),
            vertex_count,
            count_override: None,
            released: false,
        })
    }

    /// Resolves named slots against `program`, then behaves like [`Self::create`].
    pub fn create_for_program<D: Driver>(
        driver: &mut D,
        program: &Program,
        layout: &VertexLayout,
        data: &[u8],
        usage: BufferUsage,
    ) -> RenderResult<Self> {
        let resolved = layout.resolve_names(driver, program)?;
        Self::create(driver, resolved, data, usage)
    }

    /// Replaces the buffer contents.
    ///
    /// Only valid for [`BufferUsage::DynamicUpload`]. Same-sized data is written
    /// in place; anything else reallocates the storage.
    pub fn reupload<D: Driver>(&mut self, driver: &mut D, data: &[u8]) -> RenderResult<()> {
        if self.usage != BufferUsage::DynamicUpload {
            return Err(RenderError::contract(format!(
                "re-upload into {} which was created for static upload",
                self.buffer
            )));
        }

        if data.len() == self.data_len {
            driver.buffer_sub_data(self.buffer, 0, data)?;
        } else {
            driver.buffer_data(self.buffer, data, self.usage)?;
            self.data_len = data.len();
        }
        self.vertex_count = self.layout.vertex_count(data.len() as u64);
        Ok(())
    }

    /// Binds the vertex array for the next draw.
    pub fn bind_for_draw<D: Driver>(&self, driver: &mut D) -> RenderResult<()> {
        driver.bind_vertex_array(Some(self.array))?;
        Ok(())
    }

    /// Current buffer contents, or `None` where the driver cannot read back.
    pub fn read_back<D: Driver>(&self, driver: &mut D) -> RenderResult<Option<Vec<u8>>> {
        let bytes = driver.read_buffer(self.buffer)?;
        Ok(bytes.map(|mut b| {
            b.truncate(self.data_len);
            b
        }))
    }

    /// Vertices drawn per call: the override if set, else the count derived
    /// from the uploaded data.
    pub fn vertex_count(&self) -> u32 {
        self.count_override.unwrap_or(self.vertex_count)
    }

    /// Forces the draw count, e.g. for shaders that synthesize positions.
    pub fn set_vertex_count(&mut self, count: Option<u32>) {
        self.count_override = count;
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn array(&self) -> VertexArrayId {
        self.array
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Deletes the array and its buffer.
    pub fn release<D: Driver>(mut self, driver: &mut D) {
        driver.delete_vertex_array(self.array);
        driver.delete_buffer(self.buffer);
        self.released = true;
        log::debug!("released {} and {}", self.array, self.buffer);
    }
}

impl Drop for VertexResourceSet {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("{} dropped without release; driver objects leaked", self.array);
        }
    }
}
