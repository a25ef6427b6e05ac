// ============================================================================
// EFFECT - catalog program plus its current parameter values
// ============================================================================

use super::catalog::{EffectDescriptor, ParamKind};
use super::target::RenderOp;
use super::texture::Texture;
use super::GfxResult;

#[derive(Clone, Debug)]
pub enum ParamValue {
    Float(f32),
    Float2([f32; 2]),
    Float4([f32; 4]),
    FloatArray(Vec<f32>),
    Texture(Option<Texture>),
}

impl ParamValue {
    fn zeroed(kind: ParamKind) -> Self {
        match kind {
            ParamKind::Float => ParamValue::Float(0.0),
            ParamKind::Float2 => ParamValue::Float2([0.0; 2]),
            ParamKind::Float4 => ParamValue::Float4([0.0; 4]),
            ParamKind::FloatArray(n) => ParamValue::FloatArray(vec![0.0; n]),
            ParamKind::Texture => ParamValue::Texture(None),
        }
    }
}

/// A loaded effect.  Parameter values persist between draws until changed.
#[derive(Clone, Debug)]
pub struct Effect {
    descriptor: &'static EffectDescriptor,
    values: Vec<ParamValue>,
}

impl Effect {
    pub(crate) fn new(descriptor: &'static EffectDescriptor) -> Self {
        let values = descriptor
            .params
            .iter()
            .map(|p| ParamValue::zeroed(p.kind))
            .collect();
        Self { descriptor, values }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn descriptor(&self) -> &'static EffectDescriptor {
        self.descriptor
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.descriptor.param_index(name).is_some()
    }

    pub fn has_technique(&self, name: &str) -> bool {
        self.descriptor.technique_index(name).is_some()
    }

    pub fn get_parameter(&mut self, name: &str) -> Option<Parameter<'_>> {
        let index = self.descriptor.param_index(name)?;
        Some(Parameter {
            name: self.descriptor.params[index].name,
            slot: &mut self.values[index],
        })
    }

    pub(crate) fn values(&self) -> &[ParamValue] {
        &self.values
    }

    /// Draw `technique` into the target of `op` with its current blend state.
    pub fn run(&self, op: &mut RenderOp<'_>, technique: &str) -> GfxResult<()> {
        op.draw(self, technique)
    }
}

/// Write access to one parameter.  A setter whose type does not match the
/// declaration is ignored.
pub struct Parameter<'a> {
    name: &'static str,
    slot: &'a mut ParamValue,
}

fn mismatch(name: &str, wanted: &str) {
    log::debug!("<gfx> parameter '{}' is not a {}, ignoring", name, wanted);
}

impl Parameter<'_> {
    pub fn set_float(self, value: f32) {
        match self.slot {
            ParamValue::Float(v) => *v = value,
            _ => mismatch(self.name, "float"),
        }
    }

    pub fn set_float2(self, x: f32, y: f32) {
        match self.slot {
            ParamValue::Float2(v) => *v = [x, y],
            _ => mismatch(self.name, "float2"),
        }
    }

    pub fn set_float4(self, x: f32, y: f32, z: f32, w: f32) {
        match self.slot {
            ParamValue::Float4(v) => *v = [x, y, z, w],
            _ => mismatch(self.name, "float4"),
        }
    }

    /// Copies up to the declared length; the remainder is zeroed.
    pub fn set_float_array(self, values: &[f32]) {
        match self.slot {
            ParamValue::FloatArray(v) => {
                let n = v.len().min(values.len());
                v[..n].copy_from_slice(&values[..n]);
                v[n..].iter_mut().for_each(|x| *x = 0.0);
            }
            _ => mismatch(self.name, "float array"),
        }
    }

    pub fn set_texture(self, texture: Option<&Texture>) {
        match self.slot {
            ParamValue::Texture(t) => *t = texture.cloned(),
            _ => mismatch(self.name, "texture"),
        }
    }
}
