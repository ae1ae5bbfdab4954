// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

//! Turning raw attribute buffers into text.
//!
//! Every platform reader hands back a [`RawAttributeBuffer`]: the bytes (or
//! UTF-16 units on Windows) copied out of the target process or the kernel,
//! tagged with how its fields are delimited. Decoding happens here and only
//! here, one field at a time, so a single malformed field never poisons the
//! rest of the list.

use crate::common::AttributeKind;

/// A unit of encoded text: a byte, or a UTF-16 code unit.
pub trait CodeUnit: Copy + Eq {
    const NUL: Self;

    /// Decodes one field, replacing invalid sequences.
    fn decode(field: &[Self]) -> String;
}

impl CodeUnit for u8 {
    const NUL: Self = 0;

    fn decode(field: &[Self]) -> String {
        String::from_utf8_lossy(field).into_owned()
    }
}

impl CodeUnit for u16 {
    const NUL: Self = 0;

    fn decode(field: &[Self]) -> String {
        String::from_utf16_lossy(field)
    }
}

/// Text as copied out of the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawData {
    Narrow(Vec<u8>),
    Wide(Vec<u16>),
}

impl RawData {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Narrow(data) => data.is_empty(),
            Self::Wide(data) => data.is_empty(),
        }
    }
}

/// How the fields inside a raw buffer are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferShape {
    /// NUL-terminated fields, the list ending at an empty field or at the end of the buffer.
    SentinelTerminated,
    /// NUL-terminated fields up to the end of the buffer, empty ones included.
    Delimited,
    /// `argc` argument fields followed by NUL-terminated environment fields.
    CountKnown { argc: usize },
    /// A single value with no delimiters.
    Scalar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttributeBuffer {
    pub data: RawData,
    pub shape: BufferShape,
}

impl RawAttributeBuffer {
    pub fn narrow(data: Vec<u8>, shape: BufferShape) -> Self {
        Self {
            data: RawData::Narrow(data),
            shape,
        }
    }

    pub fn wide(data: Vec<u16>, shape: BufferShape) -> Self {
        Self {
            data: RawData::Wide(data),
            shape,
        }
    }

    /// Splits the buffer into the fields belonging to `kind`.
    ///
    /// A count-known buffer carries both argv and envp; `kind` selects which
    /// half is returned. Scalar buffers yield at most one field.
    pub fn fields(&self, kind: AttributeKind) -> Vec<String> {
        match &self.data {
            RawData::Narrow(data) => fields_of(data, self.shape, kind),
            RawData::Wide(data) => fields_of(data, self.shape, kind),
        }
    }

    /// The buffer read as one value.
    pub fn scalar(&self) -> String {
        match &self.data {
            RawData::Narrow(data) => parse_scalar(data),
            RawData::Wide(data) => parse_scalar(data),
        }
    }
}

fn fields_of<T: CodeUnit>(data: &[T], shape: BufferShape, kind: AttributeKind) -> Vec<String> {
    match shape {
        BufferShape::SentinelTerminated => parse_sentinel_terminated(data),
        BufferShape::Delimited => parse_delimited(data),
        BufferShape::CountKnown { argc } => {
            let (argv, envp) = parse_count_known(data, argc);
            match kind {
                AttributeKind::Environment => envp,
                _ => argv,
            }
        }
        BufferShape::Scalar => {
            let value = parse_scalar(data);
            if value.is_empty() {
                Vec::new()
            } else {
                vec![value]
            }
        }
    }
}

/// Iterator over the complete NUL-terminated fields of a buffer.
///
/// A trailing run of units with no terminator is a truncated field and is
/// never yielded.
struct Fields<'a, T> {
    data: &'a [T],
}

impl<'a, T: CodeUnit> Iterator for Fields<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.data.iter().position(|&unit| unit == T::NUL)?;
        let field = &self.data[..end];
        self.data = &self.data[end + 1..];
        Some(field)
    }
}

fn fields<T: CodeUnit>(data: &[T]) -> Fields<'_, T> {
    Fields { data }
}

/// Parses `F1\0F2\0...\0\0`. The list ends at the first empty field or the
/// end of the buffer.
pub fn parse_sentinel_terminated<T: CodeUnit>(data: &[T]) -> Vec<String> {
    fields(data)
        .take_while(|field| !field.is_empty())
        .map(T::decode)
        .collect()
}

/// Parses `F1\0\0F3\0` into every field, the empty `F2` included.
///
/// The buffer is taken as complete: text after the last NUL is a final field
/// whose terminator was overwritten, as procfs reports for processes that
/// rewrote their own arguments.
pub fn parse_delimited<T: CodeUnit>(data: &[T]) -> Vec<String> {
    let mut iter = fields(data);
    let mut parsed: Vec<String> = iter.by_ref().map(T::decode).collect();
    if !iter.data.is_empty() {
        parsed.push(T::decode(iter.data));
    }
    parsed
}

/// Parses exactly `argc` argument fields, empty ones included, then reads the
/// rest of the buffer as sentinel-terminated environment fields.
pub fn parse_count_known<T: CodeUnit>(data: &[T], argc: usize) -> (Vec<String>, Vec<String>) {
    let mut iter = fields(data);
    let argv: Vec<String> = iter.by_ref().take(argc).map(T::decode).collect();
    if argv.len() < argc {
        return (argv, Vec::new());
    }
    let envp = iter
        .take_while(|field| !field.is_empty())
        .map(T::decode)
        .collect();
    (argv, envp)
}

/// Reads a single value: everything up to the first NUL, without trailing line breaks.
pub fn parse_scalar<T: CodeUnit>(data: &[T]) -> String {
    let end = data
        .iter()
        .position(|&unit| unit == T::NUL)
        .unwrap_or(data.len());
    T::decode(&data[..end])
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Locates the argument vector inside a `KERN_PROCARGS2` blob.
///
/// The blob starts with a native-endian `int` argc, then the executable path,
/// then NUL padding, then `argv[0]`. Returns `argc` and the slice starting at
/// `argv[0]`, or `None` if the blob is truncated before that point.
pub fn split_procargs2(blob: &[u8]) -> Option<(usize, &[u8])> {
    const ARGC_LEN: usize = std::mem::size_of::<i32>();

    let argc = i32::from_ne_bytes(blob.get(..ARGC_LEN)?.try_into().ok()?);
    let argc = usize::try_from(argc).ok()?;

    let rest = &blob[ARGC_LEN..];
    let exec_path_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[exec_path_end..];
    let args_start = rest.iter().position(|&b| b != 0)?;
    Some((argc, &rest[args_start..]))
}
