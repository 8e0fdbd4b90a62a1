//! Data loaders for Gwyddion `.gwy` files.
//!
//! A `.gwy` file is the magic header `GWYP` followed by one serialized
//! object. Objects and their components are self-describing, so the reader
//! here is generic: it produces a [`GwyObject`] tree and the typed views
//! ([`DataField`], [`Channel`]) are extracted from that tree afterwards.
//!
//! Only the generic serialization layer plus `GwyContainer`, `GwyDataField`
//! and `GwySIUnit` are understood. Everything else in a file is parsed and
//! carried along but never interpreted.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Magic header of current (version 2) GWY files.
pub const GWY_MAGIC: &[u8; 4] = b"GWYP";

/// Deepest object nesting accepted before a file is considered corrupt.
const MAX_NESTING: usize = 64;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a GWY file (missing GWYP header)")]
    InvalidMagic,

    #[error("Unexpected end of data while reading {0}")]
    UnexpectedEof(String),

    #[error("Unknown type '{type_char}' for component '{component}'")]
    UnknownType { type_char: char, component: String },

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(String),

    #[error("Object '{object}' declares {declared} bytes but {available} are available")]
    SizeMismatch {
        object: String,
        declared: usize,
        available: usize,
    },

    #[error("{0} bytes of trailing data after top-level object")]
    TrailingData(usize),

    #[error("Objects nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("Missing component '{component}' in {object}")]
    MissingComponent { object: String, component: String },

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Expected {expected} object, found {found}")]
    WrongObject { expected: String, found: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A single serialized component value.
#[derive(Debug, Clone, PartialEq)]
pub enum GwyValue {
    Bool(bool),
    Char(u8),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Object(GwyObject),
    CharArray(Vec<u8>),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
    ObjectArray(Vec<GwyObject>),
}

impl GwyValue {
    /// The single-character type tag used in the serialized form.
    pub fn type_char(&self) -> char {
        match self {
            GwyValue::Bool(_) => 'b',
            GwyValue::Char(_) => 'c',
            GwyValue::Int32(_) => 'i',
            GwyValue::Int64(_) => 'q',
            GwyValue::Double(_) => 'd',
            GwyValue::String(_) => 's',
            GwyValue::Object(_) => 'o',
            GwyValue::CharArray(_) => 'C',
            GwyValue::Int32Array(_) => 'I',
            GwyValue::Int64Array(_) => 'Q',
            GwyValue::DoubleArray(_) => 'D',
            GwyValue::StringArray(_) => 'S',
            GwyValue::ObjectArray(_) => 'O',
        }
    }
}

/// A serialized object: a type name plus ordered, named components.
#[derive(Debug, Clone, PartialEq)]
pub struct GwyObject {
    /// Type name, e.g. `GwyContainer` or `GwyDataField`.
    pub name: String,
    /// Components in file order.
    pub components: Vec<(String, GwyValue)>,
}

impl GwyObject {
    /// Creates an object with no components.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Appends a component, builder style.
    pub fn with(mut self, key: impl Into<String>, value: GwyValue) -> Self {
        self.components.push((key.into(), value));
        self
    }

    /// Looks up a component by name.
    pub fn get(&self, key: &str) -> Option<&GwyValue> {
        self.components
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Iterates over component names in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|(name, _)| name.as_str())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            GwyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer lookup; 64-bit values are accepted when they fit.
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        match self.get(key)? {
            GwyValue::Int32(v) => Some(*v),
            GwyValue::Int64(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            GwyValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_object(&self, key: &str) -> Option<&GwyObject> {
        match self.get(key)? {
            GwyValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn get_doubles(&self, key: &str) -> Option<&[f64]> {
        match self.get(key)? {
            GwyValue::DoubleArray(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    fn require_i32(&self, key: &str) -> Result<i32> {
        self.get_i32(key).ok_or_else(|| self.missing(key))
    }

    fn missing(&self, key: &str) -> LoaderError {
        LoaderError::MissingComponent {
            object: self.name.clone(),
            component: key.to_string(),
        }
    }
}

/// A two-dimensional data channel (`GwyDataField`).
///
/// Samples are stored row-major with the first row at the top of the image.
#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    /// Horizontal resolution in pixels.
    pub xres: usize,
    /// Vertical resolution in pixels.
    pub yres: usize,
    /// Physical width in base units of `unit_xy` (usually meters).
    pub xreal: f64,
    /// Physical height in base units of `unit_xy`.
    pub yreal: f64,
    pub xoff: f64,
    pub yoff: f64,
    /// Lateral unit string, e.g. `m`.
    pub unit_xy: String,
    /// Value unit string, e.g. `m` or `V`.
    pub unit_z: String,
    /// `xres * yres` samples.
    pub data: Vec<f64>,
}

impl DataField {
    /// Builds a data field from a deserialized `GwyDataField` object.
    pub fn from_object(obj: &GwyObject) -> Result<Self> {
        if obj.name != "GwyDataField" {
            return Err(LoaderError::WrongObject {
                expected: "GwyDataField".to_string(),
                found: obj.name.clone(),
            });
        }

        let xres = obj.require_i32("xres")?;
        let yres = obj.require_i32("yres")?;
        if xres <= 0 || yres <= 0 {
            return Err(LoaderError::InvalidDimensions(format!(
                "resolution {}x{}",
                xres, yres
            )));
        }
        let (xres, yres) = (xres as usize, yres as usize);

        let xreal = obj.get_f64("xreal").unwrap_or(1.0);
        let yreal = obj.get_f64("yreal").unwrap_or(1.0);
        if !(xreal.is_finite() && xreal > 0.0 && yreal.is_finite() && yreal > 0.0) {
            return Err(LoaderError::InvalidDimensions(format!(
                "physical size {} x {}",
                xreal, yreal
            )));
        }

        let data = obj.get_doubles("data").ok_or_else(|| obj.missing("data"))?;
        if data.len() != xres * yres {
            return Err(LoaderError::InvalidDimensions(format!(
                "expected {}x{} = {} samples, found {}",
                xres,
                yres,
                xres * yres,
                data.len()
            )));
        }

        Ok(Self {
            xres,
            yres,
            xreal,
            yreal,
            xoff: obj.get_f64("xoff").unwrap_or(0.0),
            yoff: obj.get_f64("yoff").unwrap_or(0.0),
            unit_xy: unit_string(obj, "si_unit_xy"),
            unit_z: unit_string(obj, "si_unit_z"),
            data: data.to_vec(),
        })
    }

    /// Returns the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the field holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at column `col`, row `row` (row 0 is the top).
    #[inline]
    pub fn value(&self, col: usize, row: usize) -> f64 {
        self.data[row * self.xres + col]
    }
}

/// A named data channel of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Numeric id from the container key `/<id>/data`.
    pub id: u32,
    /// Channel title, e.g. `ZSensor`.
    pub title: String,
    pub field: DataField,
}

fn unit_string(obj: &GwyObject, key: &str) -> String {
    obj.get_object(key)
        .and_then(|unit| unit.get_str("unitstr"))
        .unwrap_or_default()
        .to_string()
}

/// Cursor over a little-endian byte buffer.
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(LoaderError::UnexpectedEof(what.to_string()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array(what)?))
    }

    fn read_i32(&mut self, what: &str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array(what)?))
    }

    fn read_i64(&mut self, what: &str) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array(what)?))
    }

    fn read_f64(&mut self, what: &str) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array(what)?))
    }

    /// Reads a NUL-terminated UTF-8 string.
    fn read_cstr(&mut self, what: &str) -> Result<String> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| LoaderError::UnexpectedEof(what.to_string()))?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|_| LoaderError::InvalidUtf8(what.to_string()))?;
        self.pos += end + 1;
        Ok(s.to_string())
    }

    /// Reads an array length and checks it against the bytes left.
    fn read_count(&mut self, min_elem_size: usize, what: &str) -> Result<usize> {
        let count = self.read_u32(what)? as usize;
        let fits = count
            .checked_mul(min_elem_size)
            .map_or(false, |bytes| bytes <= self.remaining());
        if !fits {
            return Err(LoaderError::UnexpectedEof(what.to_string()));
        }
        Ok(count)
    }
}

fn parse_object(reader: &mut ByteReader<'_>, depth: usize) -> Result<GwyObject> {
    if depth > MAX_NESTING {
        return Err(LoaderError::NestingTooDeep(MAX_NESTING));
    }

    let name = reader.read_cstr("object name")?;
    let declared = reader.read_u32("object size")? as usize;
    if declared > reader.remaining() {
        return Err(LoaderError::SizeMismatch {
            object: name,
            declared,
            available: reader.remaining(),
        });
    }

    let body = reader.take(declared, "object body")?;
    let mut inner = ByteReader::new(body);
    let mut components = Vec::new();

    while inner.remaining() > 0 {
        let key = inner.read_cstr("component name")?;
        let type_char = inner.read_u8("component type")? as char;
        let value = parse_value(&mut inner, type_char, &key, depth)?;
        components.push((key, value));
    }

    Ok(GwyObject { name, components })
}

fn parse_value(
    reader: &mut ByteReader<'_>,
    type_char: char,
    key: &str,
    depth: usize,
) -> Result<GwyValue> {
    let value = match type_char {
        'b' => GwyValue::Bool(reader.read_u8(key)? != 0),
        'c' => GwyValue::Char(reader.read_u8(key)?),
        'i' => GwyValue::Int32(reader.read_i32(key)?),
        'q' => GwyValue::Int64(reader.read_i64(key)?),
        'd' => GwyValue::Double(reader.read_f64(key)?),
        's' => GwyValue::String(reader.read_cstr(key)?),
        'o' => GwyValue::Object(parse_object(reader, depth + 1)?),
        'C' => {
            let n = reader.read_count(1, key)?;
            GwyValue::CharArray(reader.take(n, key)?.to_vec())
        }
        'I' => {
            let n = reader.read_count(4, key)?;
            let values = (0..n)
                .map(|_| reader.read_i32(key))
                .collect::<Result<Vec<_>>>()?;
            GwyValue::Int32Array(values)
        }
        'Q' => {
            let n = reader.read_count(8, key)?;
            let values = (0..n)
                .map(|_| reader.read_i64(key))
                .collect::<Result<Vec<_>>>()?;
            GwyValue::Int64Array(values)
        }
        'D' => {
            let n = reader.read_count(8, key)?;
            let values = (0..n)
                .map(|_| reader.read_f64(key))
                .collect::<Result<Vec<_>>>()?;
            GwyValue::DoubleArray(values)
        }
        'S' => {
            let n = reader.read_count(1, key)?;
            let values = (0..n)
                .map(|_| reader.read_cstr(key))
                .collect::<Result<Vec<_>>>()?;
            GwyValue::StringArray(values)
        }
        'O' => {
            let n = reader.read_count(1, key)?;
            let values = (0..n)
                .map(|_| parse_object(reader, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            GwyValue::ObjectArray(values)
        }
        other => {
            return Err(LoaderError::UnknownType {
                type_char: other,
                component: key.to_string(),
            })
        }
    };
    Ok(value)
}

/// Parse the contents of a `.gwy` file.
///
/// # Errors
///
/// Returns an error if the header is wrong, the object tree is truncated or
/// malformed, or bytes remain after the top-level object.
pub fn parse_gwy(bytes: &[u8]) -> Result<GwyObject> {
    if bytes.len() < GWY_MAGIC.len() || &bytes[..GWY_MAGIC.len()] != GWY_MAGIC {
        return Err(LoaderError::InvalidMagic);
    }

    let mut reader = ByteReader::new(&bytes[GWY_MAGIC.len()..]);
    let root = parse_object(&mut reader, 0)?;

    if reader.remaining() > 0 {
        return Err(LoaderError::TrailingData(reader.remaining()));
    }

    Ok(root)
}

/// Load and parse a `.gwy` file.
pub fn load_gwy<P: AsRef<Path>>(path: P) -> Result<GwyObject> {
    let bytes = fs::read(path.as_ref())?;
    parse_gwy(&bytes)
}

fn data_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^/(\d+)/data$").expect("valid data key pattern"))
}

/// Extract all image channels from a `GwyContainer`.
///
/// Every `/<id>/data` entry holding a `GwyDataField` becomes a channel. The
/// title is taken from `/<id>/data/title`, falling back to `Channel <id>`.
/// Channels are returned in ascending id order.
///
/// # Errors
///
/// Returns an error if `container` is not a `GwyContainer` or any of its
/// data fields is inconsistent.
pub fn get_datafields(container: &GwyObject) -> Result<Vec<Channel>> {
    if container.name != "GwyContainer" {
        return Err(LoaderError::WrongObject {
            expected: "GwyContainer".to_string(),
            found: container.name.clone(),
        });
    }

    let pattern = data_key_pattern();
    let mut channels = Vec::new();

    for (key, value) in &container.components {
        let Some(caps) = pattern.captures(key) else {
            continue;
        };
        let GwyValue::Object(obj) = value else {
            continue;
        };
        if obj.name != "GwyDataField" {
            continue;
        }
        let Ok(id) = caps[1].parse::<u32>() else {
            continue;
        };

        let title = container
            .get_str(&format!("/{}/data/title", id))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Channel {}", id));

        channels.push(Channel {
            id,
            title,
            field: DataField::from_object(obj)?,
        });
    }

    channels.sort_by_key(|c| c.id);
    Ok(channels)
}

/// Load a `.gwy` file and return its image channels.
pub fn load_channels<P: AsRef<Path>>(path: P) -> Result<Vec<Channel>> {
    let root = load_gwy(path)?;
    get_datafields(&root)
}
