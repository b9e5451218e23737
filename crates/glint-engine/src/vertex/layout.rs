use crate::driver::{AttributeFormat, ComponentType, Driver};
use crate::error::{RenderError, RenderResult};
use crate::shader::Program;

/// Where an attribute feeds into the vertex stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeSlot {
    Location(u32),
    /// Vertex input name, resolved against a linked program.
    Name(String),
}

impl From<u32> for AttributeSlot {
    fn from(location: u32) -> Self {
        AttributeSlot::Location(location)
    }
}

impl From<&str> for AttributeSlot {
    fn from(name: &str) -> Self {
        AttributeSlot::Name(name.to_string())
    }
}

impl From<String> for AttributeSlot {
    fn from(name: String) -> Self {
        AttributeSlot::Name(name)
    }
}

/// One attribute of a vertex layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub slot: AttributeSlot,
    pub format: AttributeFormat,
}

impl VertexAttribute {
    /// Tightly packed attribute at offset 0.
    pub fn new(slot: impl Into<AttributeSlot>, components: u8, component_type: ComponentType) -> Self {
        Self {
            slot: slot.into(),
            format: AttributeFormat {
                components,
                component_type,
                normalized: false,
                offset: 0,
                stride: 0,
            },
        }
    }

    pub fn f32(slot: impl Into<AttributeSlot>, components: u8) -> Self {
        Self::new(slot, components, ComponentType::F32)
    }

    pub fn normalized(mut self, normalized: bool) -> Self {
        self.format.normalized = normalized;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.format.offset = offset;
        self
    }

    pub fn stride(mut self, stride: u64) -> Self {
        self.format.stride = stride;
        self
    }
}

/// Ordered attribute layout of one vertex buffer.
///
/// The layout is trusted to describe the uploaded bytes; a layout that does
/// not match its data draws garbage rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn push(&mut self, attribute: VertexAttribute) {
        self.attributes.push(attribute);
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Checks component counts, stride bounds, overlaps and duplicate slots.
    pub fn validate(&self) -> RenderResult<()> {
        for (i, a) in self.attributes.iter().enumerate() {
            let f = &a.format;
            if !(1..=4).contains(&f.components) {
                return Err(RenderError::contract(format!(
                    "attribute {:?} has {} components; expected 1 to 4",
                    a.slot, f.components
                )));
            }
            let end = attribute_end(f).ok_or_else(|| {
                RenderError::contract(format!("attribute {:?} offset {} overflows", a.slot, f.offset))
            })?;
            if f.stride != 0 && end > f.stride {
                return Err(RenderError::contract(format!(
                    "attribute {:?} spans bytes {}..{} past its stride of {}",
                    a.slot, f.offset, end, f.stride
                )));
            }

            for b in &self.attributes[i + 1..] {
                if a.slot == b.slot {
                    return Err(RenderError::contract(format!("attribute slot {:?} is used twice", a.slot)));
                }
                let g = &b.format;
                let interleaved = f.stride != 0 && f.stride == g.stride;
                let overlaps = match attribute_end(g) {
                    Some(g_end) => f.offset < g_end && g.offset < end,
                    None => false,
                };
                if interleaved && overlaps {
                    return Err(RenderError::contract(format!(
                        "attributes {:?} and {:?} overlap within their shared stride",
                        a.slot, b.slot
                    )));
                }
            }
        }
        Ok(())
    }

    /// Replaces every named slot with the program's location for that input.
    pub fn resolve_names<D: Driver>(&self, driver: &D, program: &Program) -> RenderResult<VertexLayout> {
        let attributes = self
            .attributes
            .iter()
            .map(|a| -> RenderResult<VertexAttribute> {
                let slot = match &a.slot {
                    AttributeSlot::Location(l) => AttributeSlot::Location(*l),
                    AttributeSlot::Name(name) => {
                        let location = program.attrib_location(driver, name).ok_or_else(|| {
                            RenderError::contract(format!("{} has no vertex input named `{name}`", program.id()))
                        })?;
                        AttributeSlot::Location(location)
                    }
                };
                Ok(VertexAttribute {
                    slot,
                    format: a.format,
                })
            })
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(VertexLayout { attributes })
    }

    /// Number of whole vertices every attribute can read from `data_len` bytes.
    pub fn vertex_count(&self, data_len: u64) -> u32 {
        self.attributes
            .iter()
            .map(|a| {
                let f = &a.format;
                match attribute_end(f) {
                    Some(end) if end <= data_len => (data_len - end) / f.effective_stride() + 1,
                    _ => 0,
                }
            })
            .min()
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
    }
}

/// First byte past the attribute's first element, or `None` on overflow.
fn attribute_end(f: &AttributeFormat) -> Option<u64> {
    f.offset.checked_add(f.size())
}
