use crate::driver::{Driver, ProgramId, UniformValue};
use crate::error::{LinkFailure, RenderError, RenderResult};

use super::stage::ShaderStage;
use super::uniform::{Slot, UniformBinder};
use super::read_info_log;

/// Stages held for the duration of a link; released on every exit path.
struct AttachedStages<'d, D: Driver> {
    driver: &'d mut D,
    stages: Vec<ShaderStage>,
}

impl<D: Driver> AttachedStages<'_, D> {
    fn attach_and_link(&mut self, program: ProgramId) -> RenderResult<()> {
        for stage in &self.stages {
            self.driver.attach_shader(program, stage.id())?;
        }
        self.driver.link_program(program)?;

        if !self.driver.program_link_status(program) {
            let driver = &*self.driver;
            let mut log = read_info_log(driver.program_info_log_length(program), |buf| {
                driver.program_info_log(program, buf)
            });
            if log.is_empty() {
                log = "program failed to link without a diagnostic".to_string();
            }
            log::error!("{program} link failed:\n{log}");
            return Err(RenderError::Link(LinkFailure { log }));
        }
        Ok(())
    }
}

impl<D: Driver> Drop for AttachedStages<'_, D> {
    fn drop(&mut self) {
        for stage in self.stages.drain(..) {
            stage.release(&mut *self.driver);
        }
    }
}

/// A linked program plus its uniform slot cache.
///
/// Stage objects are gone once `link` returns; a failed link is terminal and
/// the stages must be recompiled to try again.
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    uniforms: UniformBinder,
    released: bool,
}

impl Program {
    /// Attaches `stages` to a new program and links it.
    ///
    /// Every stage is released before this returns, whatever the outcome.
    /// A vertex and a fragment stage are required; geometry is optional.
    pub fn link<D: Driver>(driver: &mut D, stages: Vec<ShaderStage>) -> RenderResult<Self> {
        let mut attached = AttachedStages { driver, stages };
        let id = attached.driver.create_program()?;

        if let Err(e) = attached.attach_and_link(id) {
            attached.driver.delete_program(id);
            return Err(e);
        }

        log::debug!("linked {id} from {} stages", attached.stages.len());
        Ok(Self {
            id,
            uniforms: UniformBinder::new(id),
            released: false,
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Cached uniform lookup; see [`UniformBinder::resolve`].
    pub fn resolve<D: Driver>(&mut self, driver: &D, name: &str) -> Slot {
        self.uniforms.resolve(driver, name)
    }

    /// See [`UniformBinder::upload`].
    pub fn upload<D: Driver>(&self, driver: &mut D, slot: Slot, value: &UniformValue) -> RenderResult<()> {
        self.uniforms.upload(driver, slot, value)
    }

    /// Location of the vertex input `name`, if the program reads it.
    pub fn attrib_location<D: Driver>(&self, driver: &D, name: &str) -> Option<u32> {
        driver.attrib_location(self.id, name)
    }

    pub fn release<D: Driver>(mut self, driver: &mut D) {
        driver.delete_program(self.id);
        self.released = true;
        log::debug!("released {}", self.id);
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("{} dropped without release; driver object leaked", self.id);
        }
    }
}
