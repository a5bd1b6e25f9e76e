//! Cache line aligned buffers, and buffers deliberately shifted off the
//! cache line boundary by a fixed number of bytes.
//!
//! A misaligned buffer is carved out of an aligned allocation: the usable
//! view starts `offset_bytes` past the allocation base. The base pointer and
//! layout are kept alongside the view so the allocation is released exactly
//! as it was made.

use crate::{BenchError, Result};
use cache_partition::is_aligned;
use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

mod sealed {
    pub trait Sealed {}
}

/// Plain numeric types whose all-zero byte pattern is a valid value.
pub trait Element: Copy + Send + Sync + sealed::Sealed + 'static {}

macro_rules! impl_element {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}
            impl Element for $t {}
        )*
    };
}

impl_element!(f32, f64, u8, u16, u32, u64, i32, i64);

pub struct AlignedBuffer<T: Element> {
    base: NonNull<u8>,
    layout: Layout,
    data: NonNull<T>,
    len: usize,
    offset_bytes: usize,
}

// The buffer owns its allocation outright, like a `Vec<T>`.
unsafe impl<T: Element> Send for AlignedBuffer<T> {}
unsafe impl<T: Element> Sync for AlignedBuffer<T> {}

impl<T: Element> AlignedBuffer<T> {
    /// Zeroed buffer of `len` values starting on an `align` byte boundary.
    pub fn aligned(len: usize, align: usize) -> Result<Self> {
        Self::misaligned(len, align, 0)
    }

    /// Zeroed buffer of `len` values starting `offset_bytes` past an `align`
    /// byte boundary.
    ///
    /// Aborts through `handle_alloc_error` if the allocation fails; the
    /// measurements are meaningless without the requested placement.
    pub fn misaligned(len: usize, align: usize, offset_bytes: usize) -> Result<Self> {
        let value_align = std::mem::align_of::<T>();
        if offset_bytes % value_align != 0 {
            return Err(BenchError::UnalignedOffset {
                offset: offset_bytes,
                align: value_align,
                type_name: std::any::type_name::<T>(),
            });
        }

        let align = align.max(value_align);
        let bytes = len
            .checked_mul(std::mem::size_of::<T>())
            .and_then(|b| b.checked_add(offset_bytes))
            .ok_or_else(|| BenchError::InvalidConfig(format!("buffer of {len} values is too large")))?;
        let layout = Layout::from_size_align(bytes.max(align), align)
            .map_err(|e| BenchError::InvalidConfig(e.to_string()))?;

        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout)
        };

        // SAFETY: offset_bytes + len * size_of::<T>() <= layout.size(), and the
        // offset is a multiple of align_of::<T>() on an `align` aligned base.
        let data = unsafe { base.add(offset_bytes) }.cast::<T>();

        log::debug!(
            "allocated {} bytes at {:p}, view at {:p} (+{offset_bytes})",
            layout.size(),
            base.as_ptr(),
            data.as_ptr()
        );

        Ok(Self {
            base,
            layout,
            data,
            len,
            offset_bytes,
        })
    }

    /// Copies `values` into a fresh buffer placed like `misaligned`.
    pub fn from_slice(values: &[T], align: usize, offset_bytes: usize) -> Result<Self> {
        let mut buffer = Self::misaligned(values.len(), align, offset_bytes)?;
        buffer.copy_from_slice(values);
        Ok(buffer)
    }

    /// Address of the first value.
    pub fn address(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Address of the underlying allocation.
    pub fn base_address(&self) -> usize {
        self.base.as_ptr() as usize
    }

    pub fn offset_bytes(&self) -> usize {
        self.offset_bytes
    }

    pub fn is_aligned_to(&self, unit_size: usize) -> bool {
        is_aligned(self.address(), unit_size)
    }
}

impl<T: Element> Deref for AlignedBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: `data` points at `len` initialised values inside the allocation.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }
}

impl<T: Element> DerefMut for AlignedBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in `deref`, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }
}

impl<T: Element> Drop for AlignedBuffer<T> {
    fn drop(&mut self) {
        // SAFETY: `base` came from `alloc_zeroed` with exactly this layout.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
    }
}

impl<T: Element> fmt::Debug for AlignedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("len", &self.len)
            .field("offset_bytes", &self.offset_bytes)
            .finish()
    }
}

pub const F32_SIZE: usize = std::mem::size_of::<f32>();

/// Loads float `index` from a byte slice with no alignment requirement.
#[inline]
pub fn load_f32(bytes: &[u8], index: usize) -> f32 {
    let slot = &bytes[index * F32_SIZE..(index + 1) * F32_SIZE];
    // SAFETY: `slot` is exactly four readable bytes.
    unsafe { slot.as_ptr().cast::<f32>().read_unaligned() }
}

/// Stores float `index` into a byte slice with no alignment requirement.
#[inline]
pub fn store_f32(bytes: &mut [u8], index: usize, value: f32) {
    let slot = &mut bytes[index * F32_SIZE..(index + 1) * F32_SIZE];
    // SAFETY: `slot` is exactly four writable bytes.
    unsafe { slot.as_mut_ptr().cast::<f32>().write_unaligned(value) }
}

/// `f32` values starting at any byte offset past an `align` boundary, e.g. 37
/// bytes, so single values can straddle two cache lines.
///
/// Such an address cannot back a `&[f32]`, so the values live in a byte view
/// and are accessed with unaligned loads and stores.
pub struct UnalignedBuffer {
    bytes: AlignedBuffer<u8>,
    len: usize,
}

impl UnalignedBuffer {
    /// Zeroed buffer of `len` floats starting `offset_bytes` past an `align`
    /// byte boundary.
    pub fn new(len: usize, align: usize, offset_bytes: usize) -> Result<Self> {
        let byte_len = len
            .checked_mul(F32_SIZE)
            .ok_or_else(|| BenchError::InvalidConfig(format!("buffer of {len} values is too large")))?;
        Ok(Self {
            bytes: AlignedBuffer::misaligned(byte_len, align, offset_bytes)?,
            len,
        })
    }

    pub fn from_slice(values: &[f32], align: usize, offset_bytes: usize) -> Result<Self> {
        let mut buffer = Self::new(values.len(), align, offset_bytes)?;
        for (i, value) in values.iter().enumerate() {
            buffer.set(i, *value);
        }
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn address(&self) -> usize {
        self.bytes.address()
    }

    pub fn offset_bytes(&self) -> usize {
        self.bytes.offset_bytes()
    }

    pub fn is_aligned_to(&self, unit_size: usize) -> bool {
        self.bytes.is_aligned_to(unit_size)
    }

    pub fn get(&self, index: usize) -> f32 {
        load_f32(&self.bytes, index)
    }

    pub fn set(&mut self, index: usize, value: f32) {
        store_f32(&mut self.bytes, index, value)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn to_vec(&self) -> Vec<f32> {
        (0..self.len).map(|i| self.get(i)).collect()
    }
}

impl fmt::Debug for UnalignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnalignedBuffer")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("len", &self.len)
            .field("offset_bytes", &self.offset_bytes())
            .finish()
    }
}
