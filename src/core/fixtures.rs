//! In-memory `.gwy` fixtures shared by unit tests.

use std::path::{Path, PathBuf};

use super::loaders::{GwyObject, GwyValue, GWY_MAGIC};

fn encode_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn encode_value(out: &mut Vec<u8>, value: &GwyValue) {
    match value {
        GwyValue::Bool(v) => out.push(u8::from(*v)),
        GwyValue::Char(v) => out.push(*v),
        GwyValue::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
        GwyValue::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
        GwyValue::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        GwyValue::String(s) => encode_cstr(out, s),
        GwyValue::Object(obj) => encode_object(out, obj),
        GwyValue::CharArray(values) => {
            out.extend_from_slice(&(values.len() as u32).to_le_bytes());
            out.extend_from_slice(values);
        }
        GwyValue::Int32Array(values) => {
            out.extend_from_slice(&(values.len() as u32).to_le_bytes());
            values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes()));
        }
        GwyValue::Int64Array(values) => {
            out.extend_from_slice(&(values.len() as u32).to_le_bytes());
            values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes()));
        }
        GwyValue::DoubleArray(values) => {
            out.extend_from_slice(&(values.len() as u32).to_le_bytes());
            values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes()));
        }
        GwyValue::StringArray(values) => {
            out.extend_from_slice(&(values.len() as u32).to_le_bytes());
            values.iter().for_each(|s| encode_cstr(out, s));
        }
        GwyValue::ObjectArray(values) => {
            out.extend_from_slice(&(values.len() as u32).to_le_bytes());
            values.iter().for_each(|obj| encode_object(out, obj));
        }
    }
}

fn encode_object(out: &mut Vec<u8>, obj: &GwyObject) {
    let mut body = Vec::new();
    for (key, value) in &obj.components {
        encode_cstr(&mut body, key);
        body.push(value.type_char() as u8);
        encode_value(&mut body, value);
    }

    encode_cstr(out, &obj.name);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
}

/// Serialize an object tree as a complete `.gwy` file.
pub(crate) fn encode_file(root: &GwyObject) -> Vec<u8> {
    let mut out = GWY_MAGIC.to_vec();
    encode_object(&mut out, root);
    out
}

fn si_unit(unit: &str) -> GwyValue {
    GwyValue::Object(GwyObject::new("GwySIUnit").with("unitstr", GwyValue::String(unit.into())))
}

/// A `GwyDataField` with lateral unit `m`.
pub(crate) fn datafield(
    xres: i32,
    yres: i32,
    xreal: f64,
    yreal: f64,
    unit_z: &str,
    data: Vec<f64>,
) -> GwyObject {
    GwyObject::new("GwyDataField")
        .with("xres", GwyValue::Int32(xres))
        .with("yres", GwyValue::Int32(yres))
        .with("xreal", GwyValue::Double(xreal))
        .with("yreal", GwyValue::Double(yreal))
        .with("si_unit_xy", si_unit("m"))
        .with("si_unit_z", si_unit(unit_z))
        .with("data", GwyValue::DoubleArray(data))
}

/// A `GwyContainer` with one titled `/<i>/data` entry per field.
pub(crate) fn container(fields: &[(&str, GwyObject)]) -> GwyObject {
    let mut root = GwyObject::new("GwyContainer");
    for (i, (title, field)) in fields.iter().enumerate() {
        root = root
            .with(format!("/{}/data", i), GwyValue::Object(field.clone()))
            .with(format!("/{}/data/title", i), GwyValue::String(title.to_string()));
    }
    root
}

/// A small ramp-valued field, handy for rendering tests.
pub(crate) fn ramp_field(xres: i32, yres: i32, unit_z: &str, scale: f64) -> GwyObject {
    let data = (0..xres * yres).map(|i| f64::from(i) * scale).collect();
    datafield(xres, yres, 2e-6, 1e-6, unit_z, data)
}

/// Write a typical three-channel scan to `dir/name`.
pub(crate) fn write_scan(dir: &Path, name: &str) -> PathBuf {
    let root = container(&[
        ("ZSensor", ramp_field(16, 8, "m", 1e-10)),
        ("Peak Force Error", ramp_field(16, 8, "V", 1e-4)),
        ("Amplitude", ramp_field(16, 8, "V", 1.0)),
    ]);
    let path = dir.join(name);
    std::fs::write(&path, encode_file(&root)).expect("write fixture");
    path
}
