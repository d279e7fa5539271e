//! Bit-exact storage and conversion for the floating point encodings used by
//! module operands.
//!
//! Values are carried as raw bit patterns tagged with their format, so NaN
//! payloads, signed zeros and denormals survive every operation; native float
//! arithmetic is never consulted for classification or conversion.

mod literal;

pub use literal::{parse_float_literal, parse_hex_float, ParseFloatError};

/// The closed set of floating point encodings the toolkit understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    /// IEEE binary16: 1 sign, 5 exponent, 10 fraction bits.
    Binary16,
    /// IEEE binary32: 1 sign, 8 exponent, 23 fraction bits.
    Binary32,
    /// IEEE binary64: 1 sign, 11 exponent, 52 fraction bits.
    Binary64,
    /// 8-bit E4M3: 4 exponent, 3 fraction bits. No infinity encoding; the
    /// sole NaN pattern is exponent and fraction all ones.
    E4M3,
    /// 8-bit E5M2: 5 exponent, 2 fraction bits, IEEE-like specials.
    E5M2,
}

/// Describes one encoding: bit widths, bias, and special-value patterns.
#[derive(Debug, Clone, Copy)]
pub struct FormatSpec {
    pub total_bits: u32,
    pub exponent_bits: u32,
    pub fraction_bits: u32,
    pub bias: i32,
    pub has_infinity: bool,
    /// Base pattern for constructing a NaN; covers the exponent field, and
    /// for formats without an infinity encoding the fraction field as well.
    pub nan_pattern: u64,
    /// Largest positive finite value.
    pub max_bits: u64,
}

const BINARY16_SPEC: FormatSpec = FormatSpec {
    total_bits: 16,
    exponent_bits: 5,
    fraction_bits: 10,
    bias: 15,
    has_infinity: true,
    nan_pattern: 0x7c00,
    max_bits: 0x7bff,
};

const BINARY32_SPEC: FormatSpec = FormatSpec {
    total_bits: 32,
    exponent_bits: 8,
    fraction_bits: 23,
    bias: 127,
    has_infinity: true,
    nan_pattern: 0x7f80_0000,
    max_bits: 0x7f7f_ffff,
};

const BINARY64_SPEC: FormatSpec = FormatSpec {
    total_bits: 64,
    exponent_bits: 11,
    fraction_bits: 52,
    bias: 1023,
    has_infinity: true,
    nan_pattern: 0x7ff0_0000_0000_0000,
    max_bits: 0x7fef_ffff_ffff_ffff,
};

const E4M3_SPEC: FormatSpec = FormatSpec {
    total_bits: 8,
    exponent_bits: 4,
    fraction_bits: 3,
    bias: 7,
    has_infinity: false,
    nan_pattern: 0x7f,
    max_bits: 0x7e,
};

const E5M2_SPEC: FormatSpec = FormatSpec {
    total_bits: 8,
    exponent_bits: 5,
    fraction_bits: 2,
    bias: 15,
    has_infinity: true,
    nan_pattern: 0x7c,
    max_bits: 0x7b,
};

impl FloatKind {
    pub const fn spec(self) -> &'static FormatSpec {
        match self {
            FloatKind::Binary16 => &BINARY16_SPEC,
            FloatKind::Binary32 => &BINARY32_SPEC,
            FloatKind::Binary64 => &BINARY64_SPEC,
            FloatKind::E4M3 => &E4M3_SPEC,
            FloatKind::E5M2 => &E5M2_SPEC,
        }
    }

    pub const fn width(self) -> u32 {
        self.spec().total_bits
    }

    /// The format for a float type of the given bit width, IEEE encodings
    /// only.
    pub fn for_width(width: u32) -> Option<Self> {
        match width {
            16 => Some(FloatKind::Binary16),
            32 => Some(FloatKind::Binary32),
            64 => Some(FloatKind::Binary64),
            _ => None,
        }
    }
}

/// Rounding direction for narrowing conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundDir {
    TowardZero,
    NearestEven,
    TowardPositive,
    TowardNegative,
}

/// A floating point value stored purely as bits.
///
/// Equality is bitwise; two NaNs with different payloads compare unequal, and
/// `0.0 != -0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatBits {
    kind: FloatKind,
    bits: u64,
}

impl FloatBits {
    pub fn new(kind: FloatKind, bits: u64) -> Self {
        let mask = mask_lo(kind.spec().total_bits);
        Self {
            kind,
            bits: bits & mask,
        }
    }

    pub fn zero(kind: FloatKind) -> Self {
        Self { kind, bits: 0 }
    }

    pub fn from_f32(value: f32) -> Self {
        Self::new(FloatKind::Binary32, value.to_bits() as u64)
    }

    pub fn from_f64(value: f64) -> Self {
        Self::new(FloatKind::Binary64, value.to_bits())
    }

    pub fn kind(self) -> FloatKind {
        self.kind
    }

    pub fn bits(self) -> u64 {
        self.bits
    }

    /// Largest positive finite value of the format.
    pub fn max(kind: FloatKind) -> Self {
        Self::new(kind, kind.spec().max_bits)
    }

    /// Most negative finite value of the format.
    pub fn lowest(kind: FloatKind) -> Self {
        let spec = kind.spec();
        Self::new(kind, sign_mask(spec) | spec.max_bits)
    }

    pub fn infinity(kind: FloatKind, negative: bool) -> Self {
        let spec = kind.spec();
        debug_assert!(spec.has_infinity);
        let sign = if negative { sign_mask(spec) } else { 0 };
        Self::new(kind, sign | exponent_mask(spec))
    }

    pub fn is_negative(self) -> bool {
        self.bits & sign_mask(self.kind.spec()) != 0
    }

    pub fn is_zero(self) -> bool {
        self.unsigned_bits() == 0
    }

    pub fn is_nan(self) -> bool {
        let spec = self.kind.spec();
        let unsigned = self.unsigned_bits();
        match self.kind {
            // All-ones low seven bits is the single NaN encoding.
            FloatKind::E4M3 => unsigned == 0x7f,
            _ => {
                unsigned & exponent_mask(spec) == exponent_mask(spec)
                    && unsigned & fraction_mask(spec) != 0
            }
        }
    }

    pub fn is_infinity(self) -> bool {
        let spec = self.kind.spec();
        if !spec.has_infinity {
            return false;
        }
        let unsigned = self.unsigned_bits();
        unsigned & exponent_mask(spec) == exponent_mask(spec) && unsigned & fraction_mask(spec) == 0
    }

    /// Flips the sign bit. Never stomps other bits, so NaN payloads survive.
    pub fn negate(self) -> Self {
        Self {
            kind: self.kind,
            bits: self.bits ^ sign_mask(self.kind.spec()),
        }
    }

    /// The value as 32-bit operand words, low word first.
    pub fn words(self) -> Vec<u32> {
        if self.kind.spec().total_bits == 64 {
            vec![self.bits as u32, (self.bits >> 32) as u32]
        } else {
            vec![self.bits as u32]
        }
    }

    fn unsigned_bits(self) -> u64 {
        self.bits & !sign_mask(self.kind.spec())
    }

    fn exponent_field(self) -> u64 {
        let spec = self.kind.spec();
        (self.bits & exponent_mask(spec)) >> spec.fraction_bits
    }

    fn significand_bits(self) -> u64 {
        self.bits & fraction_mask(self.kind.spec())
    }

    /// The unbiased exponent after normalizing a denormal input.
    fn normalized_exponent(self) -> i32 {
        let spec = self.kind.spec();
        if self.unsigned_bits() == 0 {
            return 0;
        }
        let min_exponent = -spec.bias;
        let mut exp = self.exponent_field() as i32 - spec.bias;
        if exp == min_exponent {
            // Denormal: scan for the leading significand bit.
            let significand = self.significand_bits();
            exp += 1;
            let mut check_bit = 1u64 << (spec.fraction_bits - 1);
            while check_bit != 0 {
                exp -= 1;
                if check_bit & significand != 0 {
                    break;
                }
                check_bit >>= 1;
            }
        }
        exp
    }

    /// The significand with any denormal input shifted into the normal
    /// `1.fraction` position, the implicit bit dropped.
    fn normalized_significand(self) -> u64 {
        let spec = self.kind.spec();
        let mut significand = self.significand_bits();
        let exp = self.normalized_exponent();
        let min_exponent = -spec.bias;
        let mut i = exp;
        while i <= min_exponent {
            significand <<= 1;
            i += 1;
        }
        significand & fraction_mask(spec)
    }

    /// Converts to another format with the given rounding direction.
    ///
    /// Widening is exact. Narrowing rounds as directed; ties in
    /// nearest-even resolve upward iff any sticky bit is set or the lowest
    /// retained bit is 1. Overflow saturates to infinity, or to the maximum
    /// finite value for formats with no infinity encoding. NaNs stay NaNs:
    /// the payload is shifted into the narrower field, and if every payload
    /// bit is discarded the lowest bit is forced to 1. Underflow produces
    /// zero, or the smallest denormal when rounding away from zero on that
    /// side.
    pub fn convert(self, target: FloatKind, dir: RoundDir) -> FloatBits {
        if target == self.kind {
            return self;
        }

        let src = self.kind.spec();
        let tgt = target.spec();
        let negative = self.is_negative();
        let tgt_sign = if negative { sign_mask(tgt) } else { 0 };

        if self.unsigned_bits() == 0 {
            return FloatBits::new(target, tgt_sign);
        }

        if self.is_nan() {
            // Keep the payload bit pattern as close as possible; a payload
            // shifted entirely away becomes the minimal payload rather than
            // an infinity.
            let shift = tgt.fraction_bits as i32 - src.fraction_bits as i32;
            let shifted = shift_signed(self.significand_bits(), shift) & fraction_mask(tgt);
            let payload = if shifted == 0 { 1 } else { shifted };
            return FloatBits::new(target, tgt_sign | tgt.nan_pattern | payload);
        }

        let (rounded, carried) = round_significand(self, target, dir);
        let exponent = self.normalized_exponent() + i32::from(carried);

        let max_finite_exp = FloatBits::new(target, tgt.max_bits).normalized_exponent();
        let is_inf = self.is_infinity() || exponent > max_finite_exp;
        if is_inf {
            return if tgt.has_infinity {
                FloatBits::infinity(target, negative)
            } else {
                FloatBits::new(target, tgt_sign | tgt.max_bits)
            };
        }

        // At the top finite exponent a format without infinities can still
        // round into its NaN pattern; that is an overflow too.
        if !tgt.has_infinity && exponent == max_finite_exp {
            let max_sig = FloatBits::new(target, tgt.max_bits).significand_bits();
            if rounded > max_sig {
                return FloatBits::new(target, tgt_sign | tgt.max_bits);
            }
        }

        let round_denorm_up = if negative {
            dir == RoundDir::TowardNegative
        } else {
            dir == RoundDir::TowardPositive
        };
        assemble(target, negative, exponent, rounded, round_denorm_up)
    }
}

pub(crate) const fn mask_lo(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

pub(crate) fn sign_mask(spec: &FormatSpec) -> u64 {
    1u64 << (spec.total_bits - 1)
}

pub(crate) fn exponent_mask(spec: &FormatSpec) -> u64 {
    mask_lo(spec.exponent_bits) << spec.fraction_bits
}

pub(crate) fn fraction_mask(spec: &FormatSpec) -> u64 {
    mask_lo(spec.fraction_bits)
}

fn shift_signed(value: u64, shift: i32) -> u64 {
    if shift >= 0 {
        value.checked_shl(shift as u32).unwrap_or(0)
    } else {
        value.checked_shr((-shift) as u32).unwrap_or(0)
    }
}

/// Rounds the normalized source significand to the target fraction width.
/// Returns the target-width significand and whether rounding carried into
/// the implicit bit (which bumps the exponent).
fn round_significand(value: FloatBits, target: FloatKind, dir: RoundDir) -> (u64, bool) {
    let src = value.kind.spec();
    let tgt = target.spec();
    let throwaway = src.fraction_bits as i32 - tgt.fraction_bits as i32;
    let significand = value.normalized_significand();

    if throwaway <= 0 {
        return (significand << (-throwaway) as u32, false);
    }

    let throwaway = throwaway as u32;
    let throwaway_mask = mask_lo(throwaway);
    if significand & throwaway_mask == 0 {
        return (significand >> throwaway, false);
    }

    let last_significant_bit = 1u64 << throwaway;
    let first_rounded_bit = 1u64 << (throwaway - 1);

    let round_away_from_zero = match dir {
        RoundDir::TowardZero => false,
        RoundDir::TowardPositive => !value.is_negative(),
        RoundDir::TowardNegative => value.is_negative(),
        RoundDir::NearestEven => {
            if significand & first_rounded_bit == 0 {
                false
            } else if (significand & throwaway_mask) & !first_rounded_bit != 0 {
                // Guard bit set and some sticky bit set: round up.
                true
            } else {
                // Exactly halfway: pick even.
                significand & last_significant_bit != 0
            }
        }
    };

    if !round_away_from_zero {
        return (significand >> throwaway, false);
    }

    let mut incremented = significand + last_significant_bit;
    let implicit_bit = 1u64 << src.fraction_bits;
    let mut carry = false;
    if incremented & implicit_bit != 0 {
        carry = true;
        incremented = (incremented & !implicit_bit) >> 1;
    }
    (incremented >> throwaway, carry)
}

/// Builds a value from sign, unbiased exponent, and a normalized significand
/// already in the target fraction width. Underflowing values shift into the
/// denormal range and may flush to zero; `round_denorm_up` rescues a fully
/// flushed non-zero value as the smallest denormal.
fn assemble(
    kind: FloatKind,
    negative: bool,
    mut exponent: i32,
    mut significand: u64,
    round_denorm_up: bool,
) -> FloatBits {
    let spec = kind.spec();
    let min_exponent = -spec.bias;
    let mut significand_is_zero = significand == 0;

    if exponent <= min_exponent {
        // Crossing into denormal range: the implicit bit becomes explicit.
        significand_is_zero = false;
        significand |= 1u64 << spec.fraction_bits;
        significand >>= 1;
    }

    while exponent < min_exponent {
        significand >>= 1;
        exponent += 1;
    }

    if exponent == min_exponent && significand == 0 && !significand_is_zero && round_denorm_up {
        significand = 1;
    }

    let biased = (exponent + spec.bias) as u64;
    let mut bits = if negative { sign_mask(spec) } else { 0 };
    bits |= (biased << spec.fraction_bits) & exponent_mask(spec);
    bits |= significand & fraction_mask(spec);
    FloatBits::new(kind, bits)
}
