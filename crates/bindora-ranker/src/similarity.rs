//! Similarity between one query vector and a batch of rows: cosine for
//! target embeddings against fingerprints, Tanimoto for fingerprints against
//! each other.
//!
//! The batch is scored in a single matrix product on the CPU.

use candle_core::{Device, Tensor};

use bindora_common::{BindoraError, Result};

fn tensor_err(e: candle_core::Error) -> BindoraError {
    BindoraError::Encoding(format!("Similarity computation failed: {}", e))
}

/// L2 normalize rows.
pub fn l2_normalize(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    // embeddings: (batch, dim)
    let norms = embeddings.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norms_clamped = norms.clamp(1e-9f32, f32::MAX)?;
    embeddings.broadcast_div(&norms_clamped)
}

/// Rows of equal dimension as one `(n, dim)` matrix, plus the query as `(1, dim)`.
fn batch_tensors(query: &[f32], rows: &[Vec<f32>]) -> Result<(Tensor, Tensor)> {
    let dim = query.len();
    if dim == 0 {
        return Err(BindoraError::Encoding("Empty query vector".to_string()));
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
        return Err(BindoraError::Encoding(format!(
            "Fingerprint {} has dimension {}, query has {}",
            i,
            row.len(),
            dim
        )));
    }

    let device = Device::Cpu;
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let matrix = Tensor::from_vec(flat, (rows.len(), dim), &device).map_err(tensor_err)?;
    let q = Tensor::from_slice(query, (1, dim), &device).map_err(tensor_err)?;
    Ok((matrix, q))
}

/// Cosine similarity of `query` against every row, in row order.
/// Zero vectors have similarity 0. Every row must match the query's dimension.
pub fn cosine_batch(query: &[f32], rows: &[Vec<f32>]) -> Result<Vec<f64>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let (matrix, q) = batch_tensors(query, rows)?;

    let sims = (|| -> candle_core::Result<Vec<f32>> {
        let matrix = l2_normalize(&matrix)?;
        let q = l2_normalize(&q)?;
        // (n, dim) x (dim, 1) -> (n, 1)
        matrix.matmul(&q.t()?.contiguous()?)?.squeeze(1)?.to_vec1::<f32>()
    })()
    .map_err(tensor_err)?;

    Ok(sims.into_iter().map(|s| (s as f64).clamp(-1.0, 1.0)).collect())
}

/// Tanimoto coefficient `a·b / (|a|² + |b|² - a·b)` of `query` against every
/// row. On 0/1 fingerprints this is shared bits over bits set in either.
/// Two zero vectors have similarity 0.
pub fn tanimoto_batch(query: &[f32], rows: &[Vec<f32>]) -> Result<Vec<f64>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let (matrix, q) = batch_tensors(query, rows)?;

    let (dots, row_sq) = (|| -> candle_core::Result<(Vec<f32>, Vec<f32>)> {
        let dots = matrix.matmul(&q.t()?.contiguous()?)?.squeeze(1)?.to_vec1::<f32>()?;
        let row_sq = matrix.sqr()?.sum(1)?.to_vec1::<f32>()?;
        Ok((dots, row_sq))
    })()
    .map_err(tensor_err)?;

    let query_sq: f64 = query.iter().map(|x| (*x as f64) * (*x as f64)).sum();
    Ok(dots
        .into_iter()
        .zip(row_sq)
        .map(|(dot, sq)| {
            let dot = dot as f64;
            let denom = query_sq + sq as f64 - dot;
            if denom <= f64::EPSILON {
                0.0
            } else {
                dot / denom
            }
        })
        .collect())
}

pub fn cosine(a: &[f32], b: &[f32]) -> Result<f64> {
    let sims = cosine_batch(a, &[b.to_vec()])?;
    Ok(sims.first().copied().unwrap_or(0.0))
}
