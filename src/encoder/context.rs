// ============================================================================
// CODEC CONTEXT - structured fields plus string-keyed native options
// ============================================================================
//
// Hardware encoders expose two surfaces: a handful of structured fields every
// codec has (bit rates, quantizer limits, reference frames) and a bag of
// codec-private options addressed by name.  `CodecContext` models both.
// Option names are checked against a closed per-codec table, so a typo in a
// mapper is an `UnknownOption` error in tests rather than a silently ignored
// native call.
//
// `OptionContext` is the in-memory implementation used by the CLI and tests.

use std::collections::{BTreeMap, BTreeSet};

use super::EncoderError;

/// `flags` bit: in-loop deblocking filter.
pub const FLAG_LOOP_FILTER: u32 = 1 << 11;

/// Structured encoder fields.  Rates are in bits per second, sizes in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecFields {
    pub bit_rate: i64,
    pub rc_max_rate: i64,
    pub rc_min_rate: i64,
    pub rc_buffer_size: i64,
    pub qmin: i64,
    pub qmax: i64,
    pub refs: i64,
    pub max_b_frames: i64,
    pub delay: i64,
    pub flags: u32,
}

impl CodecFields {
    pub const fn new() -> Self {
        Self {
            bit_rate: 2_000_000,
            rc_max_rate: 0,
            rc_min_rate: 0,
            rc_buffer_size: 0,
            qmin: -1,
            qmax: -1,
            refs: -1,
            max_b_frames: -1,
            delay: 0,
            flags: 0,
        }
    }
}

impl Default for CodecFields {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Option tables
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptionKind {
    Int { default: i64, min: i64, max: i64 },
    Bool { default: i64 },
    Double { default: f64, min: f64, max: f64 },
    Str { default: &'static str },
}

#[derive(Clone, Copy, Debug)]
pub struct OptionDecl {
    pub name: &'static str,
    pub kind: OptionKind,
    /// Named constants for this option live under this unit.
    pub unit: Option<&'static str>,
}

/// Named value of a unit, e.g. `rc = "cbr"`.
#[derive(Clone, Copy, Debug)]
pub struct UnitConst {
    pub unit: &'static str,
    pub name: &'static str,
    pub value: i64,
    pub deprecated: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderFamily {
    Amf,
    Nvenc,
}

/// Codec-dependent option support the mappers consult instead of comparing
/// codec names at each call site.
#[derive(Clone, Copy, Debug)]
pub struct Capabilities {
    /// B-frames and their QP/reference knobs.
    pub b_frames: bool,
    /// `b_adapt` (adaptive B-frame placement).
    pub adaptive_b: bool,
    /// Frame skipping option name.
    pub frame_skip_option: &'static str,
    pub spatial_aq_option: &'static str,
    pub temporal_aq_option: &'static str,
    pub max_reference_frames: i64,
}

#[derive(Debug)]
pub struct CodecDescriptor {
    pub name: &'static str,
    pub family: EncoderFamily,
    pub caps: Capabilities,
    pub options: &'static [OptionDecl],
    pub units: &'static [UnitConst],
    pub field_defaults: CodecFields,
}

impl CodecDescriptor {
    pub fn option(&self, name: &str) -> Option<&'static OptionDecl> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn unit_value(&self, unit: &str, name: &str) -> Option<i64> {
        self.units
            .iter()
            .find(|c| c.unit == unit && c.name == name)
            .map(|c| c.value)
    }

    pub fn unit_name(&self, unit: &str, value: i64) -> Option<&'static str> {
        self.units
            .iter()
            .find(|c| c.unit == unit && c.value == value)
            .map(|c| c.name)
    }

    /// Non-deprecated constants of `unit`, in table order.
    pub fn unit_entries<'a>(&'a self, unit: &'a str) -> impl Iterator<Item = &'static UnitConst> + 'a {
        self.units
            .iter()
            .filter(move |c| c.unit == unit && !c.deprecated)
    }
}

/// Options every codec context carries, backed by [`CodecFields`].
const GENERIC_OPTIONS: &[&str] = &["b", "minrate", "maxrate", "bufsize", "qmin", "qmax", "refs", "bf"];

fn generic_field<'a>(fields: &'a mut CodecFields, name: &str) -> Option<&'a mut i64> {
    Some(match name {
        "b" => &mut fields.bit_rate,
        "minrate" => &mut fields.rc_min_rate,
        "maxrate" => &mut fields.rc_max_rate,
        "bufsize" => &mut fields.rc_buffer_size,
        "qmin" => &mut fields.qmin,
        "qmax" => &mut fields.qmax,
        "refs" => &mut fields.refs,
        "bf" => &mut fields.max_b_frames,
        _ => return None,
    })
}

fn generic_value(fields: &CodecFields, name: &str) -> Option<i64> {
    Some(match name {
        "b" => fields.bit_rate,
        "minrate" => fields.rc_min_rate,
        "maxrate" => fields.rc_max_rate,
        "bufsize" => fields.rc_buffer_size,
        "qmin" => fields.qmin,
        "qmax" => fields.qmax,
        "refs" => fields.refs,
        "bf" => fields.max_b_frames,
        _ => return None,
    })
}

// ============================================================================
// CodecContext
// ============================================================================

pub trait CodecContext {
    fn codec(&self) -> &'static CodecDescriptor;

    fn fields(&self) -> &CodecFields;

    fn fields_mut(&mut self) -> &mut CodecFields;

    /// True once the encoder is running; only runtime-safe options may change.
    fn is_open(&self) -> bool;

    fn opt_exists(&self, name: &str) -> bool;

    /// Set from text: a unit constant name, a number, or a string value.
    fn opt_set(&mut self, name: &str, value: &str) -> Result<(), EncoderError>;

    /// Reset an option to its default.
    fn opt_clear(&mut self, name: &str) -> Result<(), EncoderError>;

    fn opt_set_int(&mut self, name: &str, value: i64) -> Result<(), EncoderError>;

    fn opt_set_double(&mut self, name: &str, value: f64) -> Result<(), EncoderError>;

    fn opt_get_int(&self, name: &str) -> Result<i64, EncoderError>;

    fn opt_get_double(&self, name: &str) -> Result<f64, EncoderError>;

    fn opt_get_string(&self, name: &str) -> Result<String, EncoderError>;

    fn opt_is_default(&self, name: &str) -> bool;

    /// Unit the option's named constants live under.
    fn opt_unit(&self, name: &str) -> Option<&'static str>;

    /// Name of the constant with `value` in `unit`.
    fn name_from_unit_value(&self, unit: &str, value: i64) -> Option<&'static str>;
}

#[derive(Clone, Debug, PartialEq)]
enum OptionValue {
    Int(i64),
    Double(f64),
    Str(String),
}

/// In-memory codec context over a static [`CodecDescriptor`].
#[derive(Clone, Debug)]
pub struct OptionContext {
    codec: &'static CodecDescriptor,
    fields: CodecFields,
    values: BTreeMap<&'static str, OptionValue>,
    hidden: BTreeSet<String>,
    open: bool,
}

impl OptionContext {
    pub fn new(codec: &'static CodecDescriptor) -> Self {
        Self {
            codec,
            fields: codec.field_defaults,
            values: BTreeMap::new(),
            hidden: BTreeSet::new(),
            open: false,
        }
    }

    /// Pretend the native library lacks `names`, like an older build would.
    pub fn with_hidden(mut self, names: &[&str]) -> Self {
        self.hidden.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Mark the encoder as running.
    pub fn open(&mut self) {
        self.open = true;
    }

    /// Options the caller changed from their defaults, for display.
    pub fn changed_options(&self) -> Vec<(&'static str, String)> {
        self.values
            .keys()
            .filter_map(|name| self.opt_get_string(name).ok().map(|v| (*name, v)))
            .collect()
    }

    fn decl(&self, name: &str) -> Result<&'static OptionDecl, EncoderError> {
        if self.hidden.contains(name) {
            return Err(self.unknown(name));
        }
        self.codec.option(name).ok_or_else(|| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> EncoderError {
        EncoderError::UnknownOption {
            codec: self.codec.name.to_string(),
            option: name.to_string(),
        }
    }

    fn mismatch(&self, name: &str, expected: &'static str) -> EncoderError {
        EncoderError::TypeMismatch {
            option: name.to_string(),
            expected,
        }
    }

    fn out_of_range(&self, name: &str, value: String) -> EncoderError {
        EncoderError::OutOfRange {
            option: name.to_string(),
            value,
        }
    }

    fn store_int(&mut self, decl: &'static OptionDecl, value: i64) -> Result<(), EncoderError> {
        let (min, max) = match decl.kind {
            OptionKind::Int { min, max, .. } => (min, max),
            OptionKind::Bool { .. } => (-1, 1),
            OptionKind::Double { .. } => {
                return self.store_double(decl, value as f64);
            }
            OptionKind::Str { .. } => return Err(self.mismatch(decl.name, "string")),
        };
        if value < min || value > max {
            return Err(self.out_of_range(decl.name, value.to_string()));
        }
        self.values.insert(decl.name, OptionValue::Int(value));
        Ok(())
    }

    fn store_double(&mut self, decl: &'static OptionDecl, value: f64) -> Result<(), EncoderError> {
        match decl.kind {
            OptionKind::Double { min, max, .. } => {
                if !(min..=max).contains(&value) {
                    return Err(self.out_of_range(decl.name, value.to_string()));
                }
                self.values.insert(decl.name, OptionValue::Double(value));
                Ok(())
            }
            OptionKind::Int { .. } | OptionKind::Bool { .. } => {
                self.store_int(decl, value.round() as i64)
            }
            OptionKind::Str { .. } => Err(self.mismatch(decl.name, "string")),
        }
    }
}

impl CodecContext for OptionContext {
    fn codec(&self) -> &'static CodecDescriptor {
        self.codec
    }

    fn fields(&self) -> &CodecFields {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut CodecFields {
        &mut self.fields
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn opt_exists(&self, name: &str) -> bool {
        GENERIC_OPTIONS.contains(&name)
            || (!self.hidden.contains(name) && self.codec.option(name).is_some())
    }

    fn opt_set(&mut self, name: &str, value: &str) -> Result<(), EncoderError> {
        if GENERIC_OPTIONS.contains(&name) {
            let v = value
                .parse::<i64>()
                .map_err(|_| self.mismatch(name, "integer"))?;
            return self.opt_set_int(name, v);
        }
        let decl = self.decl(name)?;
        match decl.kind {
            OptionKind::Str { .. } => {
                self.values.insert(decl.name, OptionValue::Str(value.to_string()));
                Ok(())
            }
            OptionKind::Double { .. } => {
                let v = value
                    .parse::<f64>()
                    .map_err(|_| self.mismatch(name, "number"))?;
                self.store_double(decl, v)
            }
            OptionKind::Int { .. } | OptionKind::Bool { .. } => {
                let named = decl.unit.and_then(|u| self.codec.unit_value(u, value));
                let v = match named {
                    Some(v) => v,
                    None => match value {
                        "true" => 1,
                        "false" => 0,
                        _ => value
                            .parse::<i64>()
                            .map_err(|_| self.out_of_range(name, value.to_string()))?,
                    },
                };
                self.store_int(decl, v)
            }
        }
    }

    fn opt_clear(&mut self, name: &str) -> Result<(), EncoderError> {
        if GENERIC_OPTIONS.contains(&name) {
            let default = generic_value(&self.codec.field_defaults, name).unwrap_or(0);
            return self.opt_set_int(name, default);
        }
        let decl = self.decl(name)?;
        self.values.remove(decl.name);
        Ok(())
    }

    fn opt_set_int(&mut self, name: &str, value: i64) -> Result<(), EncoderError> {
        if let Some(field) = generic_field(&mut self.fields, name) {
            *field = value;
            return Ok(());
        }
        let decl = self.decl(name)?;
        self.store_int(decl, value)
    }

    fn opt_set_double(&mut self, name: &str, value: f64) -> Result<(), EncoderError> {
        if GENERIC_OPTIONS.contains(&name) {
            return self.opt_set_int(name, value.round() as i64);
        }
        let decl = self.decl(name)?;
        self.store_double(decl, value)
    }

    fn opt_get_int(&self, name: &str) -> Result<i64, EncoderError> {
        if let Some(v) = generic_value(&self.fields, name) {
            return Ok(v);
        }
        let decl = self.decl(name)?;
        match (self.values.get(decl.name), decl.kind) {
            (Some(OptionValue::Int(v)), _) => Ok(*v),
            (Some(OptionValue::Double(v)), _) => Ok(v.round() as i64),
            (None, OptionKind::Int { default, .. }) | (None, OptionKind::Bool { default }) => {
                Ok(default)
            }
            (None, OptionKind::Double { default, .. }) => Ok(default.round() as i64),
            (Some(OptionValue::Str(_)), _) | (None, OptionKind::Str { .. }) => {
                Err(self.mismatch(name, "integer"))
            }
        }
    }

    fn opt_get_double(&self, name: &str) -> Result<f64, EncoderError> {
        if let Some(v) = generic_value(&self.fields, name) {
            return Ok(v as f64);
        }
        let decl = self.decl(name)?;
        match (self.values.get(decl.name), decl.kind) {
            (Some(OptionValue::Double(v)), _) => Ok(*v),
            (None, OptionKind::Double { default, .. }) => Ok(default),
            _ => self.opt_get_int(name).map(|v| v as f64),
        }
    }

    fn opt_get_string(&self, name: &str) -> Result<String, EncoderError> {
        if let Some(v) = generic_value(&self.fields, name) {
            return Ok(v.to_string());
        }
        let decl = self.decl(name)?;
        match (self.values.get(decl.name), decl.kind) {
            (Some(OptionValue::Str(s)), _) => Ok(s.clone()),
            (None, OptionKind::Str { default }) => Ok(default.to_string()),
            (_, OptionKind::Double { .. }) => self.opt_get_double(name).map(|v| v.to_string()),
            _ => {
                let v = self.opt_get_int(name)?;
                Ok(decl
                    .unit
                    .and_then(|u| self.codec.unit_name(u, v))
                    .map(str::to_string)
                    .unwrap_or_else(|| v.to_string()))
            }
        }
    }

    fn opt_is_default(&self, name: &str) -> bool {
        if let Some(v) = generic_value(&self.fields, name) {
            return generic_value(&self.codec.field_defaults, name) == Some(v);
        }
        match self.decl(name) {
            Ok(decl) => match (self.values.get(decl.name), decl.kind) {
                (None, _) => true,
                (Some(OptionValue::Int(v)), OptionKind::Int { default, .. })
                | (Some(OptionValue::Int(v)), OptionKind::Bool { default }) => *v == default,
                (Some(OptionValue::Double(v)), OptionKind::Double { default, .. }) => *v == default,
                (Some(OptionValue::Str(s)), OptionKind::Str { default }) => s == default,
                _ => false,
            },
            Err(_) => false,
        }
    }

    fn opt_unit(&self, name: &str) -> Option<&'static str> {
        self.decl(name).ok().and_then(|d| d.unit)
    }

    fn name_from_unit_value(&self, unit: &str, value: i64) -> Option<&'static str> {
        if self.hidden.contains(unit) {
            return None;
        }
        self.codec.unit_name(unit, value)
    }
}
