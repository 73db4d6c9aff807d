//! NumPy `.npy` / `.npz` codec
//!
//! An `.npz` file is a zip archive of `<name>.npy` members. Each member is a
//! magic string, a format version, a header length and a Python-literal
//! dict (`descr`, `fortran_order`, `shape`) followed by the raw element
//! bytes. Versions 1.0, 2.0 and 3.0 are read; 1.0 is written unless the
//! header is too large for it.

use crate::error::{PipelineError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const NPY_SUFFIX: &str = ".npy";
const HEADER_ALIGN: usize = 64;

lazy_static! {
    static ref DESCR_RE: Regex = Regex::new(r#"['"]descr['"]\s*:\s*['"]([^'"]+)['"]"#).unwrap();
    static ref FORTRAN_RE: Regex = Regex::new(r#"['"]fortran_order['"]\s*:\s*(True|False)"#).unwrap();
    static ref SHAPE_RE: Regex = Regex::new(r#"['"]shape['"]\s*:\s*\(([^)]*)\)"#).unwrap();
}

/// Element storage for one array, always in native representation
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! decode_numbers {
    ($bytes:expr, $t:ty, $big_endian:expr) => {{
        const WIDTH: usize = std::mem::size_of::<$t>();
        $bytes
            .chunks_exact(WIDTH)
            .map(|chunk| {
                let mut buf = [0u8; WIDTH];
                buf.copy_from_slice(chunk);
                if $big_endian {
                    <$t>::from_be_bytes(buf)
                } else {
                    <$t>::from_le_bytes(buf)
                }
            })
            .collect::<Vec<$t>>()
    }};
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Int8(v) => v.len(),
            ArrayData::Int16(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::UInt8(v) => v.len(),
            ArrayData::UInt16(v) => v.len(),
            ArrayData::UInt32(v) => v.len(),
            ArrayData::UInt64(v) => v.len(),
            ArrayData::Float32(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// NumPy dtype string used when writing (little-endian)
    pub fn descr(&self) -> &'static str {
        match self {
            ArrayData::Bool(_) => "|b1",
            ArrayData::Int8(_) => "|i1",
            ArrayData::Int16(_) => "<i2",
            ArrayData::Int32(_) => "<i4",
            ArrayData::Int64(_) => "<i8",
            ArrayData::UInt8(_) => "|u1",
            ArrayData::UInt16(_) => "<u2",
            ArrayData::UInt32(_) => "<u4",
            ArrayData::UInt64(_) => "<u8",
            ArrayData::Float32(_) => "<f4",
            ArrayData::Float64(_) => "<f8",
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            ArrayData::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            ArrayData::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Decode `count` elements of dtype `descr` from `bytes`
    fn decode(descr: &str, count: usize, bytes: &[u8]) -> Result<Self> {
        let (order, code) = match descr.chars().next() {
            Some('<') | Some('>') | Some('|') | Some('=') => descr.split_at(1),
            _ => ("|", descr),
        };
        let big_endian = match order {
            ">" => true,
            "=" => cfg!(target_endian = "big"),
            _ => false,
        };

        let width = match code {
            "b1" | "i1" | "u1" => 1,
            "i2" | "u2" => 2,
            "i4" | "u4" | "f4" => 4,
            "i8" | "u8" | "f8" => 8,
            other => {
                return Err(PipelineError::ArrayFormat(format!("unsupported dtype '{}'", other)));
            }
        };
        let expected = count
            .checked_mul(width)
            .ok_or_else(|| PipelineError::ArrayFormat("array size overflows".to_string()))?;
        if bytes.len() != expected {
            return Err(PipelineError::ArrayFormat(format!(
                "expected {} data bytes for {} x {}, found {}",
                expected,
                count,
                descr,
                bytes.len()
            )));
        }

        Ok(match code {
            "b1" => ArrayData::Bool(bytes.iter().map(|b| *b != 0).collect()),
            "i1" => ArrayData::Int8(bytes.iter().map(|b| *b as i8).collect()),
            "u1" => ArrayData::UInt8(bytes.to_vec()),
            "i2" => ArrayData::Int16(decode_numbers!(bytes, i16, big_endian)),
            "u2" => ArrayData::UInt16(decode_numbers!(bytes, u16, big_endian)),
            "i4" => ArrayData::Int32(decode_numbers!(bytes, i32, big_endian)),
            "u4" => ArrayData::UInt32(decode_numbers!(bytes, u32, big_endian)),
            "f4" => ArrayData::Float32(decode_numbers!(bytes, f32, big_endian)),
            "i8" => ArrayData::Int64(decode_numbers!(bytes, i64, big_endian)),
            "u8" => ArrayData::UInt64(decode_numbers!(bytes, u64, big_endian)),
            _ => ArrayData::Float64(decode_numbers!(bytes, f64, big_endian)),
        })
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            ArrayData::Bool(v) => v.iter().map(|b| *b as u8).collect(),
            ArrayData::Int8(v) => v.iter().map(|x| *x as u8).collect(),
            ArrayData::UInt8(v) => v.clone(),
            ArrayData::Int16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ArrayData::Int32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ArrayData::Int64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ArrayData::UInt16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ArrayData::UInt32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ArrayData::UInt64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ArrayData::Float32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ArrayData::Float64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }
}

/// One n-dimensional array. Elements are stored flat in the order given by
/// `fortran_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub fortran_order: bool,
    pub data: ArrayData,
}

impl NpyArray {
    /// C-ordered array; `shape` must account for every element
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self> {
        let expected = element_count(&shape)?;
        if expected != data.len() {
            return Err(PipelineError::ArrayFormat(format!(
                "shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            shape,
            fortran_order: false,
            data,
        })
    }

    /// One-dimensional array over `data`
    pub fn vector(data: ArrayData) -> Self {
        Self {
            shape: vec![data.len()],
            fortran_order: false,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn from_npy_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 10 || &bytes[..6] != MAGIC {
            return Err(PipelineError::ArrayFormat("missing NUMPY magic".to_string()));
        }

        let major = bytes[6];
        let (header_len, header_start) = match major {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 => {
                if bytes.len() < 12 {
                    return Err(PipelineError::ArrayFormat("truncated header".to_string()));
                }
                (
                    u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                    12,
                )
            }
            other => {
                return Err(PipelineError::ArrayFormat(format!("unsupported npy version {}", other)));
            }
        };

        let data_start = header_start + header_len;
        if bytes.len() < data_start {
            return Err(PipelineError::ArrayFormat("truncated header".to_string()));
        }
        let header = std::str::from_utf8(&bytes[header_start..data_start])
            .map_err(|e| PipelineError::ArrayFormat(format!("header is not text: {}", e)))?;

        let descr = DESCR_RE
            .captures(header)
            .map(|c| c[1].to_string())
            .ok_or_else(|| PipelineError::ArrayFormat("header has no descr".to_string()))?;
        let fortran_order = FORTRAN_RE
            .captures(header)
            .map(|c| &c[1] == "True")
            .ok_or_else(|| PipelineError::ArrayFormat("header has no fortran_order".to_string()))?;
        let shape = SHAPE_RE
            .captures(header)
            .ok_or_else(|| PipelineError::ArrayFormat("header has no shape".to_string()))
            .and_then(|c| parse_shape(&c[1]))?;

        let count = element_count(&shape)?;
        let data = ArrayData::decode(&descr, count, &bytes[data_start..])?;
        Ok(Self {
            shape,
            fortran_order,
            data,
        })
    }

    pub fn to_npy_bytes(&self) -> Vec<u8> {
        let shape = match self.shape.as_slice() {
            [] => "()".to_string(),
            [n] => format!("({},)", n),
            dims => format!("({})", dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")),
        };
        let dict = format!(
            "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}",
            self.data.descr(),
            if self.fortran_order { "True" } else { "False" },
            shape
        );

        // Version 1.0 has a 10-byte preamble, 2.0 a 12-byte one
        let (major, preamble) = if dict.len() + 1 + 10 + HEADER_ALIGN <= u16::MAX as usize {
            (1u8, 10)
        } else {
            (2u8, 12)
        };
        let unpadded = preamble + dict.len() + 1;
        let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
        let header_len = dict.len() + padding + 1;

        let mut out = Vec::with_capacity(unpadded + padding + self.data.len() * 8);
        out.extend_from_slice(MAGIC);
        out.push(major);
        out.push(0);
        if major == 1 {
            out.extend_from_slice(&(header_len as u16).to_le_bytes());
        } else {
            out.extend_from_slice(&(header_len as u32).to_le_bytes());
        }
        out.extend_from_slice(dict.as_bytes());
        out.extend(std::iter::repeat(b' ').take(padding));
        out.push(b'\n');
        out.extend_from_slice(&self.data.encode());
        out
    }
}

fn parse_shape(raw: &str) -> Result<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            // Python 2 era files may carry an `L` suffix on longs
            dim.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| PipelineError::ArrayFormat(format!("bad shape dimension '{}'", dim)))
        })
        .collect()
}

fn element_count(shape: &[usize]) -> Result<usize> {
    shape.iter().try_fold(1usize, |acc, dim| {
        acc.checked_mul(*dim)
            .ok_or_else(|| PipelineError::ArrayFormat(format!("shape {:?} overflows", shape)))
    })
}

/// Named arrays of one `.npz` archive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayCollection {
    arrays: BTreeMap<String, NpyArray>,
}

impl ArrayCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, array: NpyArray) -> Option<NpyArray> {
        self.arrays.insert(name.into(), array)
    }

    pub fn get(&self, name: &str) -> Option<&NpyArray> {
        self.arrays.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NpyArray)> {
        self.arrays.iter()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Read every `.npy` member of the archive; other members are ignored
    pub fn read_npz(path: &Path) -> Result<Self> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut collection = Self::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = match entry.name().strip_suffix(NPY_SUFFIX) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            let array = NpyArray::from_npy_bytes(&bytes)
                .map_err(|e| PipelineError::ArrayFormat(format!("{}: {}", name, e)))?;
            collection.insert(name, array);
        }
        Ok(collection)
    }

    /// Write an uncompressed archive, as `numpy.savez` does
    pub fn write_npz(&self, path: &Path) -> Result<()> {
        let mut zip = ZipWriter::new(File::create(path)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, array) in &self.arrays {
            zip.start_file(format!("{}{}", name, NPY_SUFFIX), options)?;
            zip.write_all(&array.to_npy_bytes())?;
        }
        zip.finish()?.sync_all()?;
        Ok(())
    }
}
