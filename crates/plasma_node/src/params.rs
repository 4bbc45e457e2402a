//! Declared parameter table and the typed write adapter.

use node_protocol::{
    NodeInfo, ParamDescriptor, ParamGroup, ParamKind, ParamValue, ParamWriteError,
};
use texgen_core::{ColorRgba, GenerationParams, SamplingHints, TextureSize, Vec2};

pub const INFO: NodeInfo = NodeInfo {
    identifier: "texture;generators;plasma",
    description: "Generates a Sin-plasma bitmap",
    component_class: "texture",
};

const SIZE_OPTIONS: &[&str] = &[
    "8x8", "16x16", "32x32", "64x64", "128x128", "256x256", "512x512", "1024x1024",
];
const FILTER_OPTIONS: &[&str] = &["nearest", "linear"];
const TOGGLE_OPTIONS: &[&str] = &["no", "yes"];

const DESCRIPTORS: &[ParamDescriptor] = &[
    ParamDescriptor {
        name: "col_amp",
        group: ParamGroup::Function,
        default: ParamValue::Float4([1.0, 1.0, 1.0, 1.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "col_ofs",
        group: ParamGroup::Function,
        default: ParamValue::Float4([0.0, 0.0, 0.0, 0.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "r_period",
        group: ParamGroup::Function,
        default: ParamValue::Float2([1.0, 1.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "g_period",
        group: ParamGroup::Function,
        default: ParamValue::Float2([1.0, 1.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "b_period",
        group: ParamGroup::Function,
        default: ParamValue::Float2([0.0, 0.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "a_period",
        group: ParamGroup::Function,
        default: ParamValue::Float2([0.0, 0.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "r_ofs",
        group: ParamGroup::Function,
        default: ParamValue::Float2([0.0, 0.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "g_ofs",
        group: ParamGroup::Function,
        default: ParamValue::Float2([0.0, 0.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "b_ofs",
        group: ParamGroup::Function,
        default: ParamValue::Float2([0.0, 0.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "a_ofs",
        group: ParamGroup::Function,
        default: ParamValue::Float2([0.0, 0.0]),
        options: &[],
    },
    ParamDescriptor {
        name: "size",
        group: ParamGroup::Options,
        default: ParamValue::OptionIndex(4),
        options: SIZE_OPTIONS,
    },
    ParamDescriptor {
        name: "min_mag_filter",
        group: ParamGroup::RenderingHints,
        default: ParamValue::OptionIndex(1),
        options: FILTER_OPTIONS,
    },
    ParamDescriptor {
        name: "anisotropic_filter",
        group: ParamGroup::RenderingHints,
        default: ParamValue::OptionIndex(0),
        options: TOGGLE_OPTIONS,
    },
    ParamDescriptor {
        name: "mipmaps",
        group: ParamGroup::RenderingHints,
        default: ParamValue::OptionIndex(0),
        options: TOGGLE_OPTIONS,
    },
    ParamDescriptor {
        name: "mipmap_min_filter",
        group: ParamGroup::RenderingHints,
        default: ParamValue::OptionIndex(1),
        options: FILTER_OPTIONS,
    },
];

pub fn descriptors() -> &'static [ParamDescriptor] {
    DESCRIPTORS
}

/// Apply one host write to the parameter snapshot. Returns whether the
/// stored value actually changed, so unchanged rewrites do not arm the
/// node's dirty flag.
pub(crate) fn apply(
    params: &mut GenerationParams,
    name: &str,
    value: ParamValue,
) -> Result<bool, ParamWriteError> {
    // Resolve against the declared table first; this also upgrades the
    // name to the table's 'static copy for error reporting.
    let name = DESCRIPTORS
        .iter()
        .find(|descriptor| descriptor.name == name)
        .map(|descriptor| descriptor.name)
        .ok_or_else(|| ParamWriteError::UnknownParam {
            name: name.to_owned(),
        })?;
    match name {
        "col_amp" => {
            let color = color_from(expect_float4(name, value)?);
            Ok(replace(&mut params.function.color_amp, color))
        }
        "col_ofs" => {
            let color = color_from(expect_float4(name, value)?);
            Ok(replace(&mut params.function.color_offset, color))
        }
        "r_period" => {
            let period = vec_from(expect_float2(name, value)?);
            Ok(replace(&mut params.function.red.period, period))
        }
        "g_period" => {
            let period = vec_from(expect_float2(name, value)?);
            Ok(replace(&mut params.function.green.period, period))
        }
        "b_period" => {
            let period = vec_from(expect_float2(name, value)?);
            Ok(replace(&mut params.function.blue.period, period))
        }
        "a_period" => {
            let period = vec_from(expect_float2(name, value)?);
            Ok(replace(&mut params.function.alpha.period, period))
        }
        "r_ofs" => {
            let phase = vec_from(expect_float2(name, value)?);
            Ok(replace(&mut params.function.red.phase, phase))
        }
        "g_ofs" => {
            let phase = vec_from(expect_float2(name, value)?);
            Ok(replace(&mut params.function.green.phase, phase))
        }
        "b_ofs" => {
            let phase = vec_from(expect_float2(name, value)?);
            Ok(replace(&mut params.function.blue.phase, phase))
        }
        "a_ofs" => {
            let phase = vec_from(expect_float2(name, value)?);
            Ok(replace(&mut params.function.alpha.phase, phase))
        }
        "size" => {
            let index = expect_option(name, value, SIZE_OPTIONS.len() as u32)?;
            let size = TextureSize::from_option_index(index)
                .expect("option index validated against the size table");
            Ok(replace(&mut params.size, size))
        }
        "min_mag_filter" => apply_hint(params, name, value, SamplingHints::LINEAR_FILTER),
        "anisotropic_filter" => apply_hint(params, name, value, SamplingHints::ANISOTROPIC),
        "mipmaps" => apply_hint(params, name, value, SamplingHints::MIPMAPS),
        "mipmap_min_filter" => apply_hint(params, name, value, SamplingHints::MIPMAP_LINEAR),
        _ => unreachable!("declared parameter {name:?} has no write arm"),
    }
}

fn apply_hint(
    params: &mut GenerationParams,
    name: &'static str,
    value: ParamValue,
    flag: SamplingHints,
) -> Result<bool, ParamWriteError> {
    let index = expect_option(name, value, 2)?;
    let mut hints = params.hints;
    hints.set(flag, index == 1);
    Ok(replace(&mut params.hints, hints))
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

fn color_from(components: [f32; 4]) -> ColorRgba {
    ColorRgba::new(components[0], components[1], components[2], components[3])
}

fn vec_from(components: [f32; 2]) -> Vec2 {
    Vec2::new(components[0], components[1])
}

fn expect_float4(name: &'static str, value: ParamValue) -> Result<[f32; 4], ParamWriteError> {
    match value {
        ParamValue::Float4(components) => Ok(components),
        other => Err(ParamWriteError::TypeMismatch {
            param: name,
            expected: ParamKind::Float4,
            received: other.kind(),
        }),
    }
}

fn expect_float2(name: &'static str, value: ParamValue) -> Result<[f32; 2], ParamWriteError> {
    match value {
        ParamValue::Float2(components) => Ok(components),
        other => Err(ParamWriteError::TypeMismatch {
            param: name,
            expected: ParamKind::Float2,
            received: other.kind(),
        }),
    }
}

fn expect_option(
    name: &'static str,
    value: ParamValue,
    option_count: u32,
) -> Result<u32, ParamWriteError> {
    let index = match value {
        ParamValue::OptionIndex(index) => index,
        other => {
            return Err(ParamWriteError::TypeMismatch {
                param: name,
                expected: ParamKind::OptionList,
                received: other.kind(),
            });
        }
    };
    if index >= option_count {
        return Err(ParamWriteError::InvalidOptionIndex {
            param: name,
            index,
            option_count,
        });
    }
    Ok(index)
}
