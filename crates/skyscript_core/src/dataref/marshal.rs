//! Conversions between script values and native dataref representations.
//!
//! Truncation policy: reads and writes are clamped to the native length.
//! A window that starts past the end is empty rather than an error, and
//! values that do not fit are dropped silently. Negative or non-finite
//! offsets and counts cannot be clamped and are rejected.

use crate::dataref::{DataTypes, VariableDescriptor};
use crate::error::{BridgeError, Result};
use crate::host::{Host, NativeDataRef};
use std::ops::Range;

/// Requested `[offset, offset + count)` window into an array or byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    /// `None` means everything from `offset` to the end.
    pub count: Option<usize>,
}

impl Span {
    pub const ALL: Span = Span {
        offset: 0,
        count: None,
    };

    pub fn new(offset: usize, count: Option<usize>) -> Self {
        Self { offset, count }
    }

    /// Build a span from optional script numbers.
    pub fn from_script(offset: Option<f64>, count: Option<f64>) -> Result<Self> {
        let offset = match offset {
            Some(value) => script_index("offset", value)?,
            None => 0,
        };
        let count = count.map(|value| script_index("count", value)).transpose()?;
        Ok(Self { offset, count })
    }

    /// Clamp against a native length of `len` elements.
    pub fn clamp(&self, len: usize) -> Range<usize> {
        let start = self.offset.min(len);
        let end = match self.count {
            Some(count) => start.saturating_add(count).min(len),
            None => len,
        };
        start..end
    }
}

/// Convert a script number into an index or length.
pub fn script_index(name: &'static str, value: f64) -> Result<usize> {
    if !value.is_finite() {
        return Err(BridgeError::invalid(name, format!("{value} is not a finite number")));
    }
    if value < 0.0 {
        return Err(BridgeError::invalid(name, format!("{value} is negative")));
    }
    Ok(value.trunc() as usize)
}

/// Convert a script number into a native int.
///
/// Truncates toward zero and saturates at the `i32` range.
pub fn script_int(value: f64) -> Result<i32> {
    if !value.is_finite() {
        return Err(BridgeError::invalid("value", format!("{value} is not a finite number")));
    }
    Ok(value.trunc() as i32)
}

/// Element type of a native array representation.
pub trait ArrayElement: Copy + Default {
    const TYPE: DataTypes;

    fn native_len<H: Host>(host: &H, dataref: NativeDataRef) -> usize;
    fn read<H: Host>(host: &H, dataref: NativeDataRef, offset: usize, out: &mut [Self]) -> usize;
    fn write<H: Host>(host: &mut H, dataref: NativeDataRef, offset: usize, values: &[Self]);
}

impl ArrayElement for i32 {
    const TYPE: DataTypes = DataTypes::INT_ARRAY;

    fn native_len<H: Host>(host: &H, dataref: NativeDataRef) -> usize {
        host.int_array_len(dataref)
    }

    fn read<H: Host>(host: &H, dataref: NativeDataRef, offset: usize, out: &mut [Self]) -> usize {
        host.read_ints(dataref, offset, out)
    }

    fn write<H: Host>(host: &mut H, dataref: NativeDataRef, offset: usize, values: &[Self]) {
        host.write_ints(dataref, offset, values)
    }
}

impl ArrayElement for f32 {
    const TYPE: DataTypes = DataTypes::FLOAT_ARRAY;

    fn native_len<H: Host>(host: &H, dataref: NativeDataRef) -> usize {
        host.float_array_len(dataref)
    }

    fn read<H: Host>(host: &H, dataref: NativeDataRef, offset: usize, out: &mut [Self]) -> usize {
        host.read_floats(dataref, offset, out)
    }

    fn write<H: Host>(host: &mut H, dataref: NativeDataRef, offset: usize, values: &[Self]) {
        host.write_floats(dataref, offset, values)
    }
}

fn require(descriptor: &VariableDescriptor, requested: DataTypes) -> Result<()> {
    if descriptor.supports(requested) {
        Ok(())
    } else {
        Err(BridgeError::TypeUnsupported {
            path: descriptor.path().to_string(),
            requested,
            supported: descriptor.types(),
        })
    }
}

fn require_writable(descriptor: &VariableDescriptor, requested: DataTypes) -> Result<()> {
    if !descriptor.is_writable() {
        return Err(BridgeError::NotWritable {
            path: descriptor.path().to_string(),
        });
    }
    require(descriptor, requested)
}

// ============================================================================
// Scalars
// ============================================================================

pub fn read_int<H: Host>(host: &H, descriptor: &VariableDescriptor) -> Result<i32> {
    require(descriptor, DataTypes::INT)?;
    Ok(host.get_int(descriptor.native()))
}

pub fn read_float<H: Host>(host: &H, descriptor: &VariableDescriptor) -> Result<f32> {
    require(descriptor, DataTypes::FLOAT)?;
    Ok(host.get_float(descriptor.native()))
}

pub fn read_double<H: Host>(host: &H, descriptor: &VariableDescriptor) -> Result<f64> {
    require(descriptor, DataTypes::DOUBLE)?;
    Ok(host.get_double(descriptor.native()))
}

pub fn write_int<H: Host>(host: &mut H, descriptor: &VariableDescriptor, value: i32) -> Result<()> {
    require_writable(descriptor, DataTypes::INT)?;
    host.set_int(descriptor.native(), value);
    Ok(())
}

pub fn write_float<H: Host>(
    host: &mut H,
    descriptor: &VariableDescriptor,
    value: f32,
) -> Result<()> {
    require_writable(descriptor, DataTypes::FLOAT)?;
    host.set_float(descriptor.native(), value);
    Ok(())
}

pub fn write_double<H: Host>(
    host: &mut H,
    descriptor: &VariableDescriptor,
    value: f64,
) -> Result<()> {
    require_writable(descriptor, DataTypes::DOUBLE)?;
    host.set_double(descriptor.native(), value);
    Ok(())
}

// ============================================================================
// Arrays
// ============================================================================

pub fn read_array<T: ArrayElement, H: Host>(
    host: &H,
    descriptor: &VariableDescriptor,
    span: Span,
) -> Result<Vec<T>> {
    require(descriptor, T::TYPE)?;
    let range = span.clamp(T::native_len(host, descriptor.native()));
    let mut out = vec![T::default(); range.len()];
    if !out.is_empty() {
        let copied = T::read(host, descriptor.native(), range.start, &mut out);
        out.truncate(copied);
    }
    Ok(out)
}

/// Returns the number of elements that landed in the native array.
pub fn write_array<T: ArrayElement, H: Host>(
    host: &mut H,
    descriptor: &VariableDescriptor,
    values: &[T],
    offset: usize,
) -> Result<usize> {
    require_writable(descriptor, T::TYPE)?;
    let len = T::native_len(host, descriptor.native());
    let fits = len.saturating_sub(offset).min(values.len());
    if fits > 0 {
        T::write(host, descriptor.native(), offset, &values[..fits]);
    }
    Ok(fits)
}

// ============================================================================
// Byte data
// ============================================================================

pub fn read_bytes<H: Host>(
    host: &H,
    descriptor: &VariableDescriptor,
    span: Span,
) -> Result<Vec<u8>> {
    require(descriptor, DataTypes::DATA)?;
    let range = span.clamp(host.data_len(descriptor.native()));
    let mut out = vec![0u8; range.len()];
    if !out.is_empty() {
        let copied = host.read_bytes(descriptor.native(), range.start, &mut out);
        out.truncate(copied);
    }
    Ok(out)
}

/// Writes at most `max_bytes` of `bytes` starting at `offset`.
pub fn write_bytes<H: Host>(
    host: &mut H,
    descriptor: &VariableDescriptor,
    bytes: &[u8],
    offset: usize,
    max_bytes: Option<usize>,
) -> Result<usize> {
    require_writable(descriptor, DataTypes::DATA)?;
    let len = host.data_len(descriptor.native());
    let wanted = max_bytes.map_or(bytes.len(), |max| max.min(bytes.len()));
    let fits = len.saturating_sub(offset).min(wanted);
    if fits > 0 {
        host.write_bytes(descriptor.native(), offset, &bytes[..fits]);
    }
    Ok(fits)
}

/// Text view of a byte buffer: everything up to the first NUL, decoded lossily.
pub fn bytes_to_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
