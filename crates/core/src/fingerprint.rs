//! Fingerprint derivation (spec §4.6, C1): a total function from rendition
//! parameters to a filesystem-safe cache key.

use crate::params::RenditionParams;

/// `<id>_<w>x<h>_q<quality>_s<maxBytes>.<ext>`. No field contains the `_`,
/// `x`, or `.` separators, so distinct parameter records can never collide.
pub fn compute(params: &RenditionParams) -> String {
    format!(
        "{}_{}x{}_q{}_s{}.{}",
        params.id,
        params.width,
        params.height,
        params.quality,
        params.max_bytes,
        params.format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    fn params(id: u64, w: u32, h: u32, q: u32, max: u64, fmt: Format) -> RenditionParams {
        RenditionParams {
            id,
            format: fmt,
            quality: q,
            width: w,
            height: h,
            max_bytes: max,
            interpolation: crate::format::Interpolation::default(),
        }
    }

    #[test]
    fn identical_params_produce_identical_fingerprints() {
        let a = params(1, 100, 100, 80, 0, Format::Jpeg);
        let b = params(1, 100, 100, 80, 0, Format::Jpeg);
        assert_eq!(compute(&a), compute(&b));
    }

    #[test]
    fn distinct_params_produce_distinct_fingerprints() {
        let base = params(1, 100, 100, 80, 0, Format::Jpeg);
        let variants = [
            params(2, 100, 100, 80, 0, Format::Jpeg),
            params(1, 200, 100, 80, 0, Format::Jpeg),
            params(1, 100, 200, 80, 0, Format::Jpeg),
            params(1, 100, 100, 90, 0, Format::Jpeg),
            params(1, 100, 100, 80, 10, Format::Jpeg),
            params(1, 100, 100, 80, 0, Format::Png),
        ];
        let base_fp = compute(&base);
        for v in variants {
            assert_ne!(base_fp, compute(&v));
        }
    }

    #[test]
    fn fingerprint_has_expected_shape() {
        let p = params(7, 64, 32, 80, 1024, Format::Jpeg);
        assert_eq!(compute(&p), "7_64x32_q80_s1024.jpeg");
    }
}
