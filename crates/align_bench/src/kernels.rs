// Parallel elementwise kernels timed by the benchmarks.
//
// Each kernel runs inside the given rayon pool, so the number of workers is
// whatever the pool was built with.

use crate::buffer::{AlignedBuffer, F32_SIZE, UnalignedBuffer, load_f32, store_f32};
use crate::{BenchError, Result};
use cache_partition::IndexRange;
use ndarray::Array1;
use rayon::{ThreadPool, prelude::*};
use std::marker::PhantomData;

/// Input for the arithmetic benchmark, values between 1.0 and 2.0.
pub fn arithmetic_input(len: usize) -> Array1<f32> {
    Array1::from_shape_fn(len, |i| 1.0 + (i % 100) as f32 * 0.01)
}

#[inline]
pub fn arithmetic_op(x: f32) -> f32 {
    x.sqrt() + x.sin() * x.cos()
}

fn add_into(out: &mut [f32], a: &[f32], b: &[f32]) {
    for ((c, x), y) in out.iter_mut().zip(a).zip(b) {
        *c = x + y;
    }
}

fn add_into_bytes(out: &mut [u8], a: &[f32], b: &[f32]) {
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        store_f32(out, i, x + y);
    }
}

fn check_lengths(a: &[f32], b: &[f32], out_len: usize) {
    assert!(
        a.len() >= out_len && b.len() >= out_len,
        "inputs shorter than output"
    );
}

fn byte_ranges(ranges: &[IndexRange]) -> Vec<IndexRange> {
    ranges
        .iter()
        .map(|r| IndexRange::new(r.start * F32_SIZE, r.end * F32_SIZE))
        .collect()
}

/// Splits `data` into one mutable slice per range.
///
/// The ranges must be contiguous, ordered, start at 0 and end at
/// `data.len()`, which is exactly what the partitioner produces.
pub fn split_by_ranges<'a, T>(data: &'a mut [T], ranges: &[IndexRange]) -> Result<Vec<&'a mut [T]>> {
    let total = data.len();
    let mut rest = data;
    let mut slices = Vec::with_capacity(ranges.len());
    let mut next = 0;

    for range in ranges {
        if range.start != next || range.end > total {
            return Err(BenchError::InvalidConfig(format!(
                "range {range} does not continue a partition at {next} of {total}"
            )));
        }
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
        slices.push(head);
        rest = tail;
        next = range.end;
    }

    if next != total {
        return Err(BenchError::InvalidConfig(format!(
            "ranges cover {next} of {total} elements"
        )));
    }
    Ok(slices)
}

/// `c[i] = a[i] + b[i]` with the output cut into one contiguous chunk per
/// pool thread.
pub fn vector_add_static(a: &[f32], b: &[f32], c: &mut [f32], thread_pool: &ThreadPool) {
    check_lengths(a, b, c.len());
    if c.is_empty() {
        return;
    }
    let chunk_size = c.len().div_ceil(thread_pool.current_num_threads());

    thread_pool.install(|| {
        c.par_chunks_mut(chunk_size)
            .enumerate()
            .for_each(|(i, chunk)| {
                let offset = i * chunk_size;
                let end = offset + chunk.len();
                add_into(chunk, &a[offset..end], &b[offset..end]);
            })
    });
}

/// `c[i] = a[i] + b[i]` with one task per range, each writing only its own
/// part of `c`.
pub fn vector_add_blocked(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    ranges: &[IndexRange],
    thread_pool: &ThreadPool,
) -> Result<()> {
    check_lengths(a, b, c.len());
    let outputs = split_by_ranges(c, ranges)?;

    thread_pool.scope(|s| {
        for (range, out) in ranges.iter().zip(outputs) {
            let a = &a[range.as_range()];
            let b = &b[range.as_range()];
            s.spawn(move |_| add_into(out, a, b));
        }
    });
    Ok(())
}

// Output floats written concurrently at disjoint, interleaved indices. The
// stores are unaligned so the same writer serves byte-offset buffers.
struct InterleavedOutput<'a> {
    ptr: *mut u8,
    len: usize,
    _marker: PhantomData<&'a mut [u8]>,
}

unsafe impl Sync for InterleavedOutput<'_> {}

impl<'a> InterleavedOutput<'a> {
    fn from_floats(data: &'a mut [f32]) -> Self {
        Self {
            ptr: data.as_mut_ptr().cast::<u8>(),
            len: data.len(),
            _marker: PhantomData,
        }
    }

    fn from_bytes(data: &'a mut [u8]) -> Self {
        Self {
            ptr: data.as_mut_ptr(),
            len: data.len() / F32_SIZE,
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// No other thread may access `index` while this call runs.
    unsafe fn write(&self, index: usize, value: f32) {
        assert!(index < self.len);
        unsafe {
            self.ptr
                .add(index * F32_SIZE)
                .cast::<f32>()
                .write_unaligned(value)
        }
    }
}

fn add_interleaved(a: &[f32], b: &[f32], out: &InterleavedOutput<'_>, thread_pool: &ThreadPool) {
    let len = out.len;
    thread_pool.broadcast(|ctx| {
        let workers = ctx.num_threads();
        for i in (ctx.index()..len).step_by(workers) {
            // SAFETY: only this thread writes indices congruent to its index
            // modulo the pool size.
            unsafe { out.write(i, a[i] + b[i]) };
        }
    });
}

/// `c[i] = a[i] + b[i]` where pool thread `t` of `w` handles indices
/// `t, t + w, t + 2w, ...`. Neighbouring elements belong to different
/// threads, so every cache line of `c` is written by all of them.
pub fn vector_add_interleaved(a: &[f32], b: &[f32], c: &mut [f32], thread_pool: &ThreadPool) {
    check_lengths(a, b, c.len());
    add_interleaved(a, b, &InterleavedOutput::from_floats(c), thread_pool);
}

/// In place `x = sqrt(x) + sin(x) * cos(x)` with one task per range.
pub fn arithmetic_blocked(
    data: &mut [f32],
    ranges: &[IndexRange],
    thread_pool: &ThreadPool,
) -> Result<()> {
    let blocks = split_by_ranges(data, ranges)?;

    thread_pool.scope(|s| {
        for block in blocks {
            s.spawn(move |_| {
                for x in block.iter_mut() {
                    *x = arithmetic_op(*x);
                }
            });
        }
    });
    Ok(())
}

// Variants for outputs at byte offsets that break `f32` alignment.

pub fn vector_add_static_unaligned(
    a: &[f32],
    b: &[f32],
    c: &mut UnalignedBuffer,
    thread_pool: &ThreadPool,
) {
    check_lengths(a, b, c.len());
    if c.is_empty() {
        return;
    }
    let chunk_size = c.len().div_ceil(thread_pool.current_num_threads());

    thread_pool.install(|| {
        c.as_bytes_mut()
            .par_chunks_mut(chunk_size * F32_SIZE)
            .enumerate()
            .for_each(|(i, chunk)| {
                let offset = i * chunk_size;
                let end = offset + chunk.len() / F32_SIZE;
                add_into_bytes(chunk, &a[offset..end], &b[offset..end]);
            })
    });
}

pub fn vector_add_blocked_unaligned(
    a: &[f32],
    b: &[f32],
    c: &mut UnalignedBuffer,
    ranges: &[IndexRange],
    thread_pool: &ThreadPool,
) -> Result<()> {
    check_lengths(a, b, c.len());
    let byte_ranges = byte_ranges(ranges);
    let outputs = split_by_ranges(c.as_bytes_mut(), &byte_ranges)?;

    thread_pool.scope(|s| {
        for (range, out) in ranges.iter().zip(outputs) {
            let a = &a[range.as_range()];
            let b = &b[range.as_range()];
            s.spawn(move |_| add_into_bytes(out, a, b));
        }
    });
    Ok(())
}

pub fn vector_add_interleaved_unaligned(
    a: &[f32],
    b: &[f32],
    c: &mut UnalignedBuffer,
    thread_pool: &ThreadPool,
) {
    check_lengths(a, b, c.len());
    add_interleaved(a, b, &InterleavedOutput::from_bytes(c.as_bytes_mut()), thread_pool);
}

pub fn arithmetic_blocked_unaligned(
    data: &mut UnalignedBuffer,
    ranges: &[IndexRange],
    thread_pool: &ThreadPool,
) -> Result<()> {
    let byte_ranges = byte_ranges(ranges);
    let blocks = split_by_ranges(data.as_bytes_mut(), &byte_ranges)?;

    thread_pool.scope(|s| {
        for block in blocks {
            s.spawn(move |_| {
                for i in 0..block.len() / F32_SIZE {
                    let x = load_f32(block, i);
                    store_f32(block, i, arithmetic_op(x));
                }
            });
        }
    });
    Ok(())
}

/// Benchmark output placed `offset_bytes` past a cache line boundary: a
/// typed buffer when the offset keeps floats aligned, a byte view otherwise.
#[derive(Debug)]
pub enum OutputBuffer {
    Typed(AlignedBuffer<f32>),
    Unaligned(UnalignedBuffer),
}

impl OutputBuffer {
    pub fn new(len: usize, align: usize, offset_bytes: usize) -> Result<Self> {
        if offset_bytes % std::mem::align_of::<f32>() == 0 {
            Ok(Self::Typed(AlignedBuffer::misaligned(len, align, offset_bytes)?))
        } else {
            Ok(Self::Unaligned(UnalignedBuffer::new(len, align, offset_bytes)?))
        }
    }

    pub fn from_slice(values: &[f32], align: usize, offset_bytes: usize) -> Result<Self> {
        if offset_bytes % std::mem::align_of::<f32>() == 0 {
            Ok(Self::Typed(AlignedBuffer::from_slice(values, align, offset_bytes)?))
        } else {
            Ok(Self::Unaligned(UnalignedBuffer::from_slice(values, align, offset_bytes)?))
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Typed(buffer) => buffer.len(),
            Self::Unaligned(buffer) => buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn address(&self) -> usize {
        match self {
            Self::Typed(buffer) => buffer.address(),
            Self::Unaligned(buffer) => buffer.address(),
        }
    }

    pub fn is_aligned_to(&self, unit_size: usize) -> bool {
        match self {
            Self::Typed(buffer) => buffer.is_aligned_to(unit_size),
            Self::Unaligned(buffer) => buffer.is_aligned_to(unit_size),
        }
    }

    pub fn to_vec(&self) -> Vec<f32> {
        match self {
            Self::Typed(buffer) => buffer.to_vec(),
            Self::Unaligned(buffer) => buffer.to_vec(),
        }
    }

    pub fn add_static(&mut self, a: &[f32], b: &[f32], thread_pool: &ThreadPool) {
        match self {
            Self::Typed(c) => vector_add_static(a, b, c, thread_pool),
            Self::Unaligned(c) => vector_add_static_unaligned(a, b, c, thread_pool),
        }
    }

    pub fn add_blocked(
        &mut self,
        a: &[f32],
        b: &[f32],
        ranges: &[IndexRange],
        thread_pool: &ThreadPool,
    ) -> Result<()> {
        match self {
            Self::Typed(c) => vector_add_blocked(a, b, c, ranges, thread_pool),
            Self::Unaligned(c) => vector_add_blocked_unaligned(a, b, c, ranges, thread_pool),
        }
    }

    pub fn add_interleaved(&mut self, a: &[f32], b: &[f32], thread_pool: &ThreadPool) {
        match self {
            Self::Typed(c) => vector_add_interleaved(a, b, c, thread_pool),
            Self::Unaligned(c) => vector_add_interleaved_unaligned(a, b, c, thread_pool),
        }
    }

    pub fn arithmetic(&mut self, ranges: &[IndexRange], thread_pool: &ThreadPool) -> Result<()> {
        match self {
            Self::Typed(data) => arithmetic_blocked(data, ranges, thread_pool),
            Self::Unaligned(data) => arithmetic_blocked_unaligned(data, ranges, thread_pool),
        }
    }
}
