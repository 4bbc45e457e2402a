//! Types crossing the node-graph host boundary.
//!
//! The host consumes a declared table of [`ParamDescriptor`]s once, then
//! pushes [`ParamValue`] writes per parameter; the node hands back a
//! [`TextureRef`] on its output port. Descriptor tables serialize through
//! serde so the host can enumerate parameters in whatever wire format it
//! uses; the texture reference is opaque to the host and only forwarded.

use std::fmt;

use serde::{Deserialize, Serialize};
use texgen_core::{SamplingHints, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGroup {
    Function,
    Options,
    RenderingHints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Float4,
    Float2,
    OptionList,
}

/// A value written to one parameter. The same shape doubles as the
/// descriptor's default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Float4([f32; 4]),
    Float2([f32; 2]),
    OptionIndex(u32),
}

impl ParamValue {
    pub const fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Float4(_) => ParamKind::Float4,
            ParamValue::Float2(_) => ParamKind::Float2,
            ParamValue::OptionIndex(_) => ParamKind::OptionList,
        }
    }
}

/// One row of a node's declared parameter table. `options` is empty for
/// non-enumerated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub group: ParamGroup,
    pub default: ParamValue,
    pub options: &'static [&'static str],
}

impl ParamDescriptor {
    pub const fn kind(&self) -> ParamKind {
        self.default.kind()
    }
}

/// Node metadata the host displays and routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub identifier: &'static str,
    pub description: &'static str,
    pub component_class: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamWriteError {
    UnknownParam {
        name: String,
    },
    TypeMismatch {
        param: &'static str,
        expected: ParamKind,
        received: ParamKind,
    },
    InvalidOptionIndex {
        param: &'static str,
        index: u32,
        option_count: u32,
    },
}

impl fmt::Display for ParamWriteError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamWriteError::UnknownParam { name } => {
                write!(formatter, "no parameter named {name:?}")
            }
            ParamWriteError::TypeMismatch {
                param,
                expected,
                received,
            } => write!(
                formatter,
                "parameter {param:?} expects {expected:?}, received {received:?}"
            ),
            ParamWriteError::InvalidOptionIndex {
                param,
                index,
                option_count,
            } => write!(
                formatter,
                "parameter {param:?} has {option_count} options, index {index} is out of range"
            ),
        }
    }
}

impl std::error::Error for ParamWriteError {}

/// The value a node publishes on its texture output port. Opaque to the
/// host; the hints tell a downstream consumer how to configure sampling,
/// they say nothing about texel content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRef {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
    pub hints: SamplingHints,
}
