//! Host implementations of the statistics kernels
//!
//! Each function reproduces the device kernel of the same name exactly,
//! including its work-group partitioning, so results are bit-identical to
//! the WGSL versions. Work-groups are processed in parallel with rayon when
//! the `rayon` feature is enabled.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::geometry::ReductionKind;
use crate::kernel::{KernelId, KernelParams, SortKernel};

/// Execute `kernel` over `input`, writing `output`.
///
/// `input` and `output` must hold at least `params.len` elements.
pub(crate) fn execute(
    kernel: KernelId,
    input: &[i32],
    output: &mut [i32],
    params: KernelParams,
    group_size: usize,
) {
    let len = params.len as usize;
    match kernel {
        KernelId::ReduceMin => reduce(ReductionKind::Min, &input[..len], output, group_size),
        KernelId::ReduceMax => reduce(ReductionKind::Max, &input[..len], output, group_size),
        KernelId::ReduceSum => reduce(ReductionKind::Sum, &input[..len], output, group_size),
        KernelId::Variance => variance(&input[..len], output, params),
        KernelId::VarianceSum => variance_sum(&input[..len], output, params, group_size),
        KernelId::Sort(SortKernel::Bubble) => sort_odd_even(&input[..len], output),
        KernelId::Sort(SortKernel::Selection | SortKernel::SelectionTiled) => {
            sort_rank(&input[..len], output)
        }
    }
}

#[inline]
fn combine(kind: ReductionKind, a: i32, b: i32) -> i32 {
    match kind {
        ReductionKind::Min => a.min(b),
        ReductionKind::Max => a.max(b),
        ReductionKind::Sum => a.wrapping_add(b),
    }
}

fn fold(kind: ReductionKind, values: &[i32]) -> i32 {
    values
        .iter()
        .fold(kind.neutral(), |acc, &v| combine(kind, acc, v))
}

/// One partial per work-group, mapped through `finish`.
fn group_partials(
    kind: ReductionKind,
    input: &[i32],
    group_size: usize,
    finish: impl Fn(i32) -> i32 + Sync,
) -> Vec<i32> {
    #[cfg(feature = "rayon")]
    {
        input
            .par_chunks(group_size)
            .map(|g| finish(fold(kind, g)))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    {
        input
            .chunks(group_size)
            .map(|g| finish(fold(kind, g)))
            .collect()
    }
}

/// Partials land in `output[0..groups]`, then collapse into `output[0]`.
fn write_and_collapse(kind: ReductionKind, partials: &[i32], output: &mut [i32]) {
    output[..partials.len()].copy_from_slice(partials);
    output[0] = fold(kind, partials);
}

fn reduce(kind: ReductionKind, input: &[i32], output: &mut [i32], group_size: usize) {
    let partials = group_partials(kind, input, group_size, |p| p);
    write_and_collapse(kind, &partials, output);
}

fn variance(input: &[i32], output: &mut [i32], params: KernelParams) {
    let count = params.count as usize;
    let mean = params.mean;
    let deviation = |(i, (out, &v)): (usize, (&mut i32, &i32))| {
        *out = if i < count {
            let d = v.wrapping_sub(mean);
            d.wrapping_mul(d)
        } else {
            0
        };
    };

    let out = &mut output[..input.len()];
    #[cfg(feature = "rayon")]
    out.par_iter_mut().zip(input.par_iter()).enumerate().for_each(deviation);
    #[cfg(not(feature = "rayon"))]
    out.iter_mut().zip(input.iter()).enumerate().for_each(deviation);
}

fn variance_sum(input: &[i32], output: &mut [i32], params: KernelParams, group_size: usize) {
    let partials = group_partials(ReductionKind::Sum, input, group_size, |p| p);
    output[..partials.len()].copy_from_slice(&partials);
    output[0] = divide_once(&partials, params.scale.wrapping_mul(params.scale));
}

/// `Σp / divisor` without forming `Σp`: quotients and remainders are summed
/// apart, so the result does not depend on how the partials were grouped.
fn divide_once(partials: &[i32], divisor: i32) -> i32 {
    let (q, r) = partials.iter().fold((0i32, 0i32), |(q, r), &p| {
        (
            q.wrapping_add(p.wrapping_div(divisor)),
            r.wrapping_add(p.wrapping_rem(divisor)),
        )
    });
    q.wrapping_add(r.wrapping_div(divisor))
}

/// Odd-even transposition: `n` alternating compare-exchange phases.
fn sort_odd_even(input: &[i32], output: &mut [i32]) {
    let n = input.len();
    let out = &mut output[..n];
    out.copy_from_slice(input);
    for phase in 0..n {
        let mut i = phase % 2;
        while i + 1 < n {
            if out[i + 1] < out[i] {
                out.swap(i, i + 1);
            }
            i += 2;
        }
    }
}

/// Each element is placed at the count of elements ordered before it, with
/// ties broken by index.
fn sort_rank(input: &[i32], output: &mut [i32]) {
    let rank = |(i, &v): (usize, &i32)| {
        let r = input
            .iter()
            .enumerate()
            .filter(|&(j, &w)| w < v || (w == v && j < i))
            .count();
        (r, v)
    };

    #[cfg(feature = "rayon")]
    let placed: Vec<(usize, i32)> = input.par_iter().enumerate().map(rank).collect();
    #[cfg(not(feature = "rayon"))]
    let placed: Vec<(usize, i32)> = input.iter().enumerate().map(rank).collect();

    for (r, v) in placed {
        output[r] = v;
    }
}
