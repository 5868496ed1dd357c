/// Accumulates dot product and both squared magnitudes in a single pass.
///
/// The arena stores vectors contiguously, so the hot loop is a straight
/// sweep over two float slices. On x86_64 with AVX2+FMA the three
/// accumulators are kept in vector registers with fused multiply-adds;
/// otherwise a scalar loop runs.
#[inline]
pub fn dot_norms(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    debug_assert_eq!(a.len(), b.len());
    #[cfg(target_arch = "x86_64")]
    {
        if a.len() >= 8
            && std::is_x86_feature_detected!("avx2")
            && std::is_x86_feature_detected!("fma")
        {
            unsafe {
                return dot_norms_fma(a, b);
            }
        }
    }
    dot_norms_scalar(a, b)
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0.0 when either magnitude is zero, otherwise
/// `dot / sqrt(|a|^2) / sqrt(|b|^2)`, bounded to [-1, 1] for non-zero input.
#[inline]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (dot, mag_a, mag_b) = dot_norms(a, b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / mag_a.sqrt() / mag_b.sqrt()
}

#[inline]
fn dot_norms_scalar(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    (dot, mag_a, mag_b)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_norms_fma(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    use std::arch::x86_64::*;

    let mut dot = _mm256_setzero_ps();
    let mut mag_a = _mm256_setzero_ps();
    let mut mag_b = _mm256_setzero_ps();
    let mut i = 0usize;

    while i + 8 <= a.len() {
        let va = _mm256_loadu_ps(a.as_ptr().add(i));
        let vb = _mm256_loadu_ps(b.as_ptr().add(i));
        dot = _mm256_fmadd_ps(va, vb, dot);
        mag_a = _mm256_fmadd_ps(va, va, mag_a);
        mag_b = _mm256_fmadd_ps(vb, vb, mag_b);
        i += 8;
    }

    let mut dot_lanes = [0f32; 8];
    let mut mag_a_lanes = [0f32; 8];
    let mut mag_b_lanes = [0f32; 8];
    _mm256_storeu_ps(dot_lanes.as_mut_ptr(), dot);
    _mm256_storeu_ps(mag_a_lanes.as_mut_ptr(), mag_a);
    _mm256_storeu_ps(mag_b_lanes.as_mut_ptr(), mag_b);

    let mut dot_sum = dot_lanes.iter().sum::<f32>();
    let mut mag_a_sum = mag_a_lanes.iter().sum::<f32>();
    let mut mag_b_sum = mag_b_lanes.iter().sum::<f32>();

    while i < a.len() {
        let x = a[i];
        let y = b[i];
        dot_sum += x * y;
        mag_a_sum += x * x;
        mag_b_sum += y * y;
        i += 1;
    }

    (dot_sum, mag_a_sum, mag_b_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn dot_norms_match_scalar() {
        let mut rng = StdRng::seed_from_u64(42);
        for dim in [8usize, 17, 32, 384, 1024] {
            let a: Vec<f32> = (0..dim).map(|_| rng.gen()).collect();
            let b: Vec<f32> = (0..dim).map(|_| rng.gen()).collect();
            let scalar = dot_norms_scalar(&a, &b);
            let fused = dot_norms(&a, &b);
            assert!(approx_close(scalar.0, fused.0, 1e-4), "dim={dim}");
            assert!(approx_close(scalar.1, fused.1, 1e-3), "dim={dim}");
            assert!(approx_close(scalar.2, fused.2, 1e-3), "dim={dim}");
        }
    }

    #[test]
    fn cosine_self_is_one() {
        let mut rng = StdRng::seed_from_u64(7);
        for dim in [3usize, 8, 64, 300] {
            let v: Vec<f32> = (0..dim).map(|_| rng.gen::<f32>() - 0.5).collect();
            let score = cosine(&v, &v);
            assert!((score - 1.0).abs() < 1e-5, "dim={dim} score={score}");
        }
    }

    #[test]
    fn cosine_zero_magnitude_is_zero() {
        let zero = vec![0.0f32; 16];
        let other: Vec<f32> = (0..16).map(|i| i as f32).collect();
        assert_eq!(cosine(&zero, &other), 0.0);
        assert_eq!(cosine(&other, &zero), 0.0);
        assert_eq!(cosine(&zero, &zero), 0.0);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine(&a, &b).abs() < 1e-6);
    }

    fn approx_close(expected: f32, actual: f32, eps: f32) -> bool {
        let allowance = eps.max(expected.abs() * 1e-5);
        (expected - actual).abs() <= allowance
    }
}
