use crate::driver::{Driver, ShaderId, StageKind, StageSource};
use crate::error::{CompileFailure, RenderError, RenderResult};

use super::read_info_log;

/// A compiled shader stage.
///
/// Owned exclusively until passed to [`super::Program::link`], which releases
/// it whatever the link outcome. A stage that is never linked must be released
/// with [`ShaderStage::release`].
#[derive(Debug)]
pub struct ShaderStage {
    id: ShaderId,
    kind: StageKind,
    source: StageSource,
    released: bool,
}

impl ShaderStage {
    /// Compiles `source` as a `kind` stage.
    ///
    /// Warnings count as success. On failure the driver object is already
    /// released and the error carries the full compile log and the source.
    pub fn compile<D: Driver>(driver: &mut D, kind: StageKind, source: StageSource) -> RenderResult<Self> {
        let id = driver.create_shader(kind)?;

        if let Err(e) = driver
            .shader_source(id, &source)
            .and_then(|()| driver.compile_shader(id))
        {
            driver.delete_shader(id);
            return Err(e.into());
        }

        if !driver.shader_compile_status(id) {
            let mut log = read_info_log(driver.shader_info_log_length(id), |buf| driver.shader_info_log(id, buf));
            driver.delete_shader(id);
            if log.is_empty() {
                log = format!("{kind} stage failed to compile without a diagnostic");
            }
            log::error!("{kind} shader compile failed:\n{log}");
            return Err(RenderError::Compile(CompileFailure { kind, source, log }));
        }

        log::debug!("compiled {kind} stage as {id}");
        Ok(Self {
            id,
            kind,
            source,
            released: false,
        })
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn source(&self) -> &StageSource {
        &self.source
    }

    /// Deletes the driver object.
    pub fn release<D: Driver>(mut self, driver: &mut D) {
        driver.delete_shader(self.id);
        self.released = true;
    }
}

impl Drop for ShaderStage {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("{} {} dropped without release; driver object leaked", self.kind, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HeadlessDriver;

    const VERTEX: &str = "@vertex fn main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0, 0.0, 0.0, 1.0); }";

    #[test]
    fn valid_source_compiles() {
        let mut d = HeadlessDriver::new();
        let stage = ShaderStage::compile(&mut d, StageKind::Vertex, StageSource::wgsl(VERTEX)).unwrap();
        assert_eq!(stage.kind(), StageKind::Vertex);
        assert_eq!(d.live_objects().shaders, 1);

        stage.release(&mut d);
        assert_eq!(d.live_objects().shaders, 0);
    }

    #[test]
    fn syntax_error_returns_log_and_source() {
        let mut d = HeadlessDriver::new();
        let source = StageSource::wgsl("@vertex fn main( -> {");
        let err = ShaderStage::compile(&mut d, StageKind::Vertex, source.clone()).unwrap_err();

        let RenderError::Compile(failure) = err else {
            panic!("expected a compile failure");
        };
        assert_eq!(failure.kind, StageKind::Vertex);
        assert_eq!(failure.source, source);
        assert!(!failure.log.is_empty());
        assert_eq!(d.live_objects().shaders, 0);
    }

    #[test]
    fn geometry_stage_fails_to_compile() {
        let mut d = HeadlessDriver::new();
        let err = ShaderStage::compile(
            &mut d,
            StageKind::Geometry,
            StageSource::glsl("#version 450\nvoid main() {}"),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Compile(_)));
    }
}
