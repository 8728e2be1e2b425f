//! Feature-hashing bag-of-words embedder.
//!
//! Each lowercase alphanumeric token is hashed (FNV-1a) into one of `dim`
//! buckets with a hash-derived sign; the result is L2-normalized. Purely local
//! and deterministic across processes, so it works offline and in tests.

use async_trait::async_trait;
use ndarray::Array1;

use crate::embedder::EmbedderBackend;
use docsage_core::{Error, Result};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Config("hashing embedder dimension must be > 0".into()));
        }
        Ok(Self { dim })
    }

    fn vectorize(&self, text: &str) -> Array1<f32> {
        let mut v = Array1::<f32>::zeros(self.dim);
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(&token.to_lowercase());
            let bucket = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.dot(&v).sqrt();
        if norm > 1e-9 {
            v /= norm;
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl EmbedderBackend for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        Ok(self.vectorize(text))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> String {
        format!("hashing:{}", self.dim)
    }
}
