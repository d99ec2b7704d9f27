//! Transcendental functions on `FixedPoint`
//!
//! `ln` and `exp` follow the rational approximations used by the pool
//! contracts (solmate / Remco Bloemen): the argument is converted to a `2^96`
//! basis, range-reduced by powers of two, evaluated with monic polynomials and
//! converted back. Intermediates need 256 bits, so they run on `I256` with the
//! same wrapping and truncation behaviour as EVM `int256` code.

use crate::common::errors::FixedPointError;
use crate::common::fixed_point::FixedPoint;
use crate::common::int256::I256;

/// `floor(ln((2^255 - 1) / 1e18) * 1e18)`
pub const EXP_MAX: i128 = 135_305_999_368_893_231_589;

/// `floor(ln(0.5e-18) * 1e18)`
pub const EXP_MIN: i128 = -42_139_678_854_452_767_622;

/// ln(2) in the 2^96 basis
const LN_2_X96: i128 = 54_916_777_467_707_473_351_141_471_128;

/// 5^18, the odd part of 1e18
const FIVE_POW_18: i128 = 3_814_697_265_625;

/// s * 5e18 * 2^96 (ln scale factor), 1677202110996718588342820967067443963516166
const LN_SCALE: I256 = I256::from_limbs([0x5cef59f0815a5506, 0xdaa0d5f769dba191, 0x1340, 0x0]);

/// ln(2) * 5e18 * 2^192, 16597577552685614221487285958193947469193820559219878177908093499208371
const LN_2_SCALED: I256 = I256::from_limbs([
    0xd803ae7b6687f2b3,
    0x7614a3f75373f047,
    0xb3975ab3ee5b203a,
    0x267a36c0c95,
]);

/// ln(2^96 / 1e18) * 5e18 * 2^192, 600920179829731861736702779321621459595472258049074101567377883020018308
const LN_BASIS_OFFSET: I256 = I256::from_limbs([
    0xe8028c72b8864284,
    0x356a1b7863008a5a,
    0x7177eebf7cd370a3,
    0x57115e47018c,
]);

/// exp scale factor s * 1e18 / 2^96 in the 2^213 basis, 3822833074963236453042738258902158003155416615667
const EXP_SCALE: I256 = I256::from_limbs([0xee70ef65f9978af3, 0x63c32e5c2f6dc192, 0x29d9dc385, 0x0]);

fn c(value: i128) -> I256 {
    I256::from_i128(value)
}

impl FixedPoint {
    /// Natural logarithm; fails for `x <= 0`
    pub fn ln(self) -> Result<Self, FixedPointError> {
        let raw = self.raw_value();
        if raw <= 0 {
            return Err(FixedPointError::OutOfDomain {
                operation: "ln",
                raw,
            });
        }

        // Reduce range of x to (1, 2) * 2^96: ln(2^k * x) = k * ln(2) + ln(x)
        let k = (127 - raw.leading_zeros() as i64) - 96;
        let shift = (159 - k) as usize;
        let x = (c(raw) << shift).into_bits() >> 159;
        let x = I256::from_bits(x);

        // (8, 8)-term rational approximation; p is monic
        let mut p = x + c(3_273_285_459_638_523_848_632_254_066_296);
        p = ((p * x) >> 96) + c(24_828_157_081_833_163_892_658_089_445_524);
        p = ((p * x) >> 96) + c(43_456_485_725_739_037_958_740_375_743_393);
        p = ((p * x) >> 96) - c(11_111_509_109_440_967_052_023_855_526_967);
        p = ((p * x) >> 96) - c(45_023_709_667_254_063_763_336_534_515_857);
        p = ((p * x) >> 96) - c(14_706_773_417_378_608_786_704_636_184_526);
        // p stays in the 2^192 basis for the division
        p = p * x - (c(795_164_235_651_350_426_258_249_787_498) << 96);

        let mut q = x + c(5_573_035_233_440_673_466_300_451_813_936);
        q = ((q * x) >> 96) + c(71_694_874_799_317_883_764_090_561_454_958);
        q = ((q * x) >> 96) + c(283_447_036_172_924_575_727_196_451_306_956);
        q = ((q * x) >> 96) + c(401_686_690_394_027_663_651_624_208_769_553);
        q = ((q * x) >> 96) + c(204_048_457_590_392_012_362_485_061_816_622);
        q = ((q * x) >> 96) + c(31_853_899_698_501_571_402_653_359_427_138);
        q = ((q * x) >> 96) + c(909_429_971_244_387_300_277_376_558_375);

        // r is in (0, 0.125) * 2^96
        let mut r = p
            .checked_div(q)
            .ok_or(FixedPointError::DivisionByZero { operation: "ln" })?;

        // scale factor, k * ln(2), ln(2^96 / 1e18), then back to 1e18
        r = r * LN_SCALE;
        r = r + LN_2_SCALED * c(k as i128);
        r = r + LN_BASIS_OFFSET;
        r = r >> 174;

        r.to_i128()
            .map(FixedPoint::from_raw)
            .ok_or(FixedPointError::Overflow { operation: "ln" })
    }

    /// Natural exponential
    ///
    /// Returns 0 at or below `EXP_MIN`, fails at or above `EXP_MAX`, and fails
    /// with `Overflow` when the result does not fit the storage type.
    pub fn exp(self) -> Result<Self, FixedPointError> {
        let raw = self.raw_value();
        if raw <= EXP_MIN {
            return Ok(FixedPoint::ZERO);
        }
        if raw >= EXP_MAX {
            return Err(FixedPointError::OutOfDomain {
                operation: "exp",
                raw,
            });
        }

        // Convert to the 2^96 basis: multiply by 2^96 / 1e18 = 2^78 / 5^18
        let overflow = FixedPointError::Overflow { operation: "exp" };
        let mut x = (c(raw) << 78)
            .checked_div(c(FIVE_POW_18))
            .ok_or(overflow.clone())?;

        // exp(x) = exp(x') * 2^k with k = round(x / ln 2), k in [-61, 195]
        let k = ((x << 96).checked_div(c(LN_2_X96)).ok_or(overflow.clone())? + (c(1) << 95)) >> 96;
        x = x - k * c(LN_2_X96);
        let k = k.to_i128().ok_or(overflow.clone())?;

        // (6, 7)-term rational approximation; p is monic
        let mut p = x + c(2_772_001_395_605_857_295_435_445_496_992);
        p = ((p * x) >> 96) + c(44_335_888_930_127_919_016_834_873_520_032);
        p = ((p * x) >> 96) + c(398_888_492_587_501_845_352_592_340_339_721);
        p = ((p * x) >> 96) + c(1_993_839_819_670_624_470_859_228_494_792_842);
        p = p * x + (c(4_385_272_521_454_847_904_659_076_985_693_276) << 96);

        // Knuth's scheme for q
        let mut z = x + c(750_530_180_792_738_023_273_180_420_736);
        z = ((z * x) >> 96) + c(32_788_456_221_302_202_726_307_501_949_080);
        let mut w = x - c(2_218_138_959_503_481_824_038_194_425_854);
        w = ((w * z) >> 96) + c(892_943_633_302_991_980_437_332_862_907_700);
        let mut q = z + w - c(78_174_809_823_045_304_726_920_794_422_040);
        q = ((q * w) >> 96) + c(4_203_224_763_890_128_580_604_056_984_195_872);

        // r is in (0.09, 0.25) * 2^96
        let r = p.checked_div(q).ok_or(overflow.clone())?;

        // scale factor, 2^k and 1e18 / 2^96 at once; unsigned multiply
        let scaled = r.into_bits().overflowing_mul(EXP_SCALE.into_bits()).0 >> ((195 - k) as usize);
        I256::from_bits(scaled)
            .to_i128()
            .filter(|value| *value >= 0)
            .map(FixedPoint::from_raw)
            .ok_or(overflow)
    }

    /// `self ^ y` via `exp(y * ln(self))`
    ///
    /// `0^0 = 1`, `0^y = 0`; a negative base is outside the domain of `ln`.
    pub fn pow(self, y: FixedPoint) -> Result<Self, FixedPointError> {
        if self.is_zero() {
            return Ok(if y.is_zero() {
                FixedPoint::ONE
            } else {
                FixedPoint::ZERO
            });
        }
        let ln_x = self.ln()?;
        let y_ln_x = (c(y.raw_value()) * c(ln_x.raw_value()))
            .checked_div(c(FixedPoint::SCALE))
            .and_then(I256::to_i128)
            .ok_or(FixedPointError::Overflow { operation: "pow" })?;
        FixedPoint::from_raw(y_ln_x).exp()
    }

    /// Square root via `pow(x, 0.5)`
    pub fn sqrt(self) -> Result<Self, FixedPointError> {
        if self.is_negative() {
            return Err(FixedPointError::OutOfDomain {
                operation: "sqrt",
                raw: self.raw_value(),
            });
        }
        if self.is_zero() || self == FixedPoint::ONE {
            return Ok(self);
        }
        self.pow(FixedPoint::from_raw(FixedPoint::SCALE / 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(s: &str) -> FixedPoint {
        FixedPoint::from_decimal_str(s).unwrap()
    }

    fn assert_close(actual: FixedPoint, expected: f64, tolerance: f64) {
        let diff = (actual.to_f64() - expected).abs();
        assert!(
            diff <= tolerance * expected.abs().max(1.0),
            "expected {} got {} (diff {})",
            expected,
            actual,
            diff
        );
    }

    #[test]
    fn test_ln_known_values() {
        assert_eq!(FixedPoint::ONE.ln().unwrap(), FixedPoint::ZERO);
        assert_close(fp("2").ln().unwrap(), std::f64::consts::LN_2, 1e-15);
        assert_close(fp("0.5").ln().unwrap(), -std::f64::consts::LN_2, 1e-15);
        assert_close(fp("123.456").ln().unwrap(), 123.456f64.ln(), 1e-15);
        assert_close(fp("0.000000001").ln().unwrap(), 1e-9f64.ln(), 1e-15);
        assert_close(fp("100000000000000000000").ln().unwrap(), 1e20f64.ln(), 1e-15);
    }

    #[test]
    fn test_ln_domain() {
        assert!(matches!(
            FixedPoint::ZERO.ln(),
            Err(FixedPointError::OutOfDomain { operation: "ln", .. })
        ));
        assert!(fp("-1").ln().is_err());
    }

    #[test]
    fn test_exp_known_values() {
        assert_eq!(FixedPoint::ZERO.exp().unwrap(), FixedPoint::ONE);
        assert_close(FixedPoint::ONE.exp().unwrap(), std::f64::consts::E, 1e-15);
        assert_close(fp("-1").exp().unwrap(), (-1f64).exp(), 1e-15);
        assert_close(fp("2.5").exp().unwrap(), 2.5f64.exp(), 1e-15);
        assert_close(fp("-20").exp().unwrap(), (-20f64).exp(), 1e-12);
        assert_close(fp("40").exp().unwrap(), 40f64.exp(), 1e-14);
    }

    #[test]
    fn test_exp_domain_bounds() {
        assert_eq!(FixedPoint::from_raw(EXP_MIN).exp().unwrap(), FixedPoint::ZERO);
        assert_eq!(fp("-50").exp().unwrap(), FixedPoint::ZERO);
        assert!(matches!(
            FixedPoint::from_raw(EXP_MAX).exp(),
            Err(FixedPointError::OutOfDomain { operation: "exp", .. })
        ));
        // representable by the exponent domain but not by i128 storage
        assert_eq!(
            fp("100").exp(),
            Err(FixedPointError::Overflow { operation: "exp" })
        );
    }

    #[test]
    fn test_pow() {
        assert_eq!(FixedPoint::ZERO.pow(FixedPoint::ZERO).unwrap(), FixedPoint::ONE);
        assert_eq!(FixedPoint::ZERO.pow(fp("2")).unwrap(), FixedPoint::ZERO);
        assert_close(fp("1.2").pow(fp("0.5")).unwrap(), 1.2f64.sqrt(), 1e-15);
        assert_close(fp("200000").pow(fp("0.95")).unwrap(), 200000f64.powf(0.95), 1e-14);
        assert_close(fp("2.5").pow(fp("-0.045")).unwrap(), 2.5f64.powf(-0.045), 1e-15);
        assert!(fp("-2").pow(fp("0.5")).is_err());
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(FixedPoint::ONE.sqrt().unwrap(), FixedPoint::ONE);
        assert_close(fp("16").sqrt().unwrap(), 4.0, 1e-15);
        assert!(fp("-4").sqrt().is_err());
    }
}
