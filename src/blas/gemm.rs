use std::sync::OnceLock;

use rayon::prelude::*;

use crate::error::EngineError;

use super::GemmBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transpose {
    No,
    Yes,
}

impl TryFrom<char> for Transpose {
    type Error = EngineError;

    fn try_from(flag: char) -> Result<Self, Self::Error> {
        match flag {
            'n' | 'N' => Ok(Transpose::No),
            't' | 'T' => Ok(Transpose::Yes),
            other => Err(EngineError::Configuration(
                format!("Unsupported GEMM operand flag '{}'", other)
            )),
        }
    }
}

// Operand geometry shared by the kernels. All matrices are column-major.
#[derive(Clone, Copy, Debug)]
struct GemmDims {
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    lda: usize,
    ldb: usize,
    beta: f32,
    ldc: usize,
}

impl GemmDims {
    #[inline]
    fn a_at(&self, a: &[f32], i: usize, p: usize) -> f32 {
        match self.trans_a {
            Transpose::No => a[i + p * self.lda],
            Transpose::Yes => a[p + i * self.lda],
        }
    }

    #[inline]
    fn b_at(&self, b: &[f32], p: usize, j: usize) -> f32 {
        match self.trans_b {
            Transpose::No => b[p + j * self.ldb],
            Transpose::Yes => b[j + p * self.ldb],
        }
    }

    // Writes column j of C. Each element accumulates over p in ascending order,
    // so every kernel produces the same bits.
    fn compute_column(&self, a: &[f32], b: &[f32], j: usize, column: &mut [f32]) {
        for i in 0..self.m {
            let mut acc = 0.0f32;
            for p in 0..self.k {
                acc += self.a_at(a, i, p) * self.b_at(b, p, j);
            }
            // beta == 0 means C is write only, stale contents (even NaN) are ignored
            let previous = if self.beta == 0.0 { 0.0 } else { self.beta * column[i] };
            column[i] = self.alpha * acc + previous;
        }
    }
}

type GemmKernel = fn(&GemmDims, &[f32], &[f32], &mut [f32]);

// Indexed by GemmBackend
struct KernelTable {
    kernels: [GemmKernel; 2],
}

static KERNEL_TABLE: OnceLock<KernelTable> = OnceLock::new();

fn kernel_table() -> &'static KernelTable {
    KERNEL_TABLE.get_or_init(|| KernelTable {
        kernels: [naive_kernel, parallel_kernel],
    })
}

fn kernel_for(backend: GemmBackend) -> GemmKernel {
    let index = match backend {
        GemmBackend::Naive => 0,
        GemmBackend::Parallel => 1,
    };
    kernel_table().kernels[index]
}

fn naive_kernel(dims: &GemmDims, a: &[f32], b: &[f32], c: &mut [f32]) {
    c.chunks_mut(dims.ldc)
        .take(dims.n)
        .enumerate()
        .for_each(|(j, column)| dims.compute_column(a, b, j, column));
}

fn parallel_kernel(dims: &GemmDims, a: &[f32], b: &[f32], c: &mut [f32]) {
    c.par_chunks_mut(dims.ldc)
        .take(dims.n)
        .enumerate()
        .for_each(|(j, column)| dims.compute_column(a, b, j, column));
}

// Minimum buffer length for a rows x cols column-major matrix with leading dimension ld
fn required_len(rows: usize, cols: usize, ld: usize) -> usize {
    if rows == 0 || cols == 0 {
        0
    } else {
        ld * (cols - 1) + rows
    }
}

fn check_operand(name: &str, len: usize, rows: usize, cols: usize, ld: usize) -> Result<(), EngineError> {
    if ld < rows.max(1) {
        return Err(EngineError::ShapeMismatch(
            format!("GEMM: leading dimension of {} is {}, needs at least {}", name, ld, rows.max(1))
        ));
    }
    let needed = required_len(rows, cols, ld);
    if len < needed {
        return Err(EngineError::ShapeMismatch(
            format!("GEMM: {} holds {} elements, a {}x{} operand with ld {} needs {}",
                    name, len, rows, cols, ld, needed)
        ));
    }
    Ok(())
}

// C := alpha * op(A) * op(B) + beta * C
// op(A) is m x k, op(B) is k x n, C is m x n, all column-major with the given leading dimensions.
pub fn gemm(
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    lda: usize,
    b: &[f32],
    ldb: usize,
    beta: f32,
    c: &mut [f32],
    ldc: usize,
) -> Result<(), EngineError> {
    let (a_rows, a_cols) = match trans_a {
        Transpose::No => (m, k),
        Transpose::Yes => (k, m),
    };
    let (b_rows, b_cols) = match trans_b {
        Transpose::No => (k, n),
        Transpose::Yes => (n, k),
    };

    check_operand("A", a.len(), a_rows, a_cols, lda)?;
    check_operand("B", b.len(), b_rows, b_cols, ldb)?;
    check_operand("C", c.len(), m, n, ldc)?;

    if m == 0 || n == 0 {
        return Ok(());
    }

    let dims = GemmDims { trans_a, trans_b, m, n, k, alpha, lda, ldb, beta, ldc };

    let backend = if super::use_parallel(m * n * k.max(1)) {
        GemmBackend::Parallel
    } else {
        GemmBackend::Naive
    };

    kernel_for(backend)(&dims, a, b, c);
    Ok(())
}
