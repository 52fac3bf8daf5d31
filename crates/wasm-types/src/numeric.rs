//! Bit-exact numeric semantics for every operator in §4.1.
//!
//! Integer operators work on the raw bit patterns carried by `Value::I32`/`I64`;
//! signedness is selected by the function called, never stored on the value.
//! Floating point operators defer to `f32`/`f64` native operations, which on
//! every tier-1 target already implement IEEE-754 round-to-nearest-ties-to-even
//! and the NaN propagation rules the specification asks for.

use crate::trap::TrapKind;

pub type TrapResult<T> = Result<T, TrapKind>;

// ---------------------------------------------------------------------
// Integer arithmetic
// ---------------------------------------------------------------------

pub fn i32_div_s(a: i32, b: i32) -> TrapResult<i32> {
    if b == 0 {
        return Err(TrapKind::IntegerDivideByZero);
    }
    if a == i32::MIN && b == -1 {
        return Err(TrapKind::IntegerOverflow);
    }
    Ok(a.wrapping_div(b))
}

pub fn i32_rem_s(a: i32, b: i32) -> TrapResult<i32> {
    if b == 0 {
        return Err(TrapKind::IntegerDivideByZero);
    }
    if a == i32::MIN && b == -1 {
        return Ok(0);
    }
    Ok(a.wrapping_rem(b))
}

pub fn i32_div_u(a: i32, b: i32) -> TrapResult<i32> {
    let (a, b) = (a as u32, b as u32);
    if b == 0 {
        return Err(TrapKind::IntegerDivideByZero);
    }
    Ok((a / b) as i32)
}

pub fn i32_rem_u(a: i32, b: i32) -> TrapResult<i32> {
    let (a, b) = (a as u32, b as u32);
    if b == 0 {
        return Err(TrapKind::IntegerDivideByZero);
    }
    Ok((a % b) as i32)
}

pub fn i64_div_s(a: i64, b: i64) -> TrapResult<i64> {
    if b == 0 {
        return Err(TrapKind::IntegerDivideByZero);
    }
    if a == i64::MIN && b == -1 {
        return Err(TrapKind::IntegerOverflow);
    }
    Ok(a.wrapping_div(b))
}

pub fn i64_rem_s(a: i64, b: i64) -> TrapResult<i64> {
    if b == 0 {
        return Err(TrapKind::IntegerDivideByZero);
    }
    if a == i64::MIN && b == -1 {
        return Ok(0);
    }
    Ok(a.wrapping_rem(b))
}

pub fn i64_div_u(a: i64, b: i64) -> TrapResult<i64> {
    let (a, b) = (a as u64, b as u64);
    if b == 0 {
        return Err(TrapKind::IntegerDivideByZero);
    }
    Ok((a / b) as i64)
}

pub fn i64_rem_u(a: i64, b: i64) -> TrapResult<i64> {
    let (a, b) = (a as u64, b as u64);
    if b == 0 {
        return Err(TrapKind::IntegerDivideByZero);
    }
    Ok((a % b) as i64)
}

// ---------------------------------------------------------------------
// Bitwise / shifts / rotates / counting
// ---------------------------------------------------------------------

macro_rules! shift_and_rotate {
    ($ity:ty, $uty:ty, $bits:expr, $shl:ident, $shr_s:ident, $shr_u:ident, $rotl:ident, $rotr:ident) => {
        pub fn $shl(a: $ity, b: $ity) -> $ity {
            a.wrapping_shl((b as $uty % $bits) as u32)
        }

        pub fn $shr_s(a: $ity, b: $ity) -> $ity {
            a.wrapping_shr((b as $uty % $bits) as u32)
        }

        pub fn $shr_u(a: $ity, b: $ity) -> $ity {
            ((a as $uty).wrapping_shr((b as $uty % $bits) as u32)) as $ity
        }

        pub fn $rotl(a: $ity, b: $ity) -> $ity {
            (a as $uty).rotate_left((b as $uty % $bits) as u32) as $ity
        }

        pub fn $rotr(a: $ity, b: $ity) -> $ity {
            (a as $uty).rotate_right((b as $uty % $bits) as u32) as $ity
        }
    };
}

shift_and_rotate!(i32, u32, 32, i32_shl, i32_shr_s, i32_shr_u, i32_rotl, i32_rotr);
shift_and_rotate!(i64, u64, 64, i64_shl, i64_shr_s, i64_shr_u, i64_rotl, i64_rotr);

pub fn i32_clz(a: i32) -> i32 {
    a.leading_zeros() as i32
}
pub fn i32_ctz(a: i32) -> i32 {
    a.trailing_zeros() as i32
}
pub fn i32_popcnt(a: i32) -> i32 {
    a.count_ones() as i32
}
pub fn i64_clz(a: i64) -> i64 {
    a.leading_zeros() as i64
}
pub fn i64_ctz(a: i64) -> i64 {
    a.trailing_zeros() as i64
}
pub fn i64_popcnt(a: i64) -> i64 {
    a.count_ones() as i64
}

// ---------------------------------------------------------------------
// Integer comparisons (produce an i32 {0,1})
// ---------------------------------------------------------------------

pub fn bool_to_i32(b: bool) -> i32 {
    if b {
        1
    } else {
        0
    }
}

pub fn i32_lt_u(a: i32, b: i32) -> bool {
    (a as u32) < (b as u32)
}
pub fn i32_le_u(a: i32, b: i32) -> bool {
    (a as u32) <= (b as u32)
}
pub fn i32_gt_u(a: i32, b: i32) -> bool {
    (a as u32) > (b as u32)
}
pub fn i32_ge_u(a: i32, b: i32) -> bool {
    (a as u32) >= (b as u32)
}

pub fn i64_lt_u(a: i64, b: i64) -> bool {
    (a as u64) < (b as u64)
}
pub fn i64_le_u(a: i64, b: i64) -> bool {
    (a as u64) <= (b as u64)
}
pub fn i64_gt_u(a: i64, b: i64) -> bool {
    (a as u64) > (b as u64)
}
pub fn i64_ge_u(a: i64, b: i64) -> bool {
    (a as u64) >= (b as u64)
}

// ---------------------------------------------------------------------
// Floating point
// ---------------------------------------------------------------------

/// `min`/`max` per the spec: NaN is propagated (as a canonical NaN), and
/// among zeros, `-0.0` compares less than `+0.0`.
pub fn f32_min(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    if a == 0.0 && b == 0.0 {
        return if a.is_sign_negative() || b.is_sign_negative() {
            -0.0
        } else {
            0.0
        };
    }
    a.min(b)
}

pub fn f32_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    if a == 0.0 && b == 0.0 {
        return if a.is_sign_positive() || b.is_sign_positive() {
            0.0
        } else {
            -0.0
        };
    }
    a.max(b)
}

pub fn f64_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == 0.0 && b == 0.0 {
        return if a.is_sign_negative() || b.is_sign_negative() {
            -0.0
        } else {
            0.0
        };
    }
    a.min(b)
}

pub fn f64_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == 0.0 && b == 0.0 {
        return if a.is_sign_positive() || b.is_sign_positive() {
            0.0
        } else {
            -0.0
        };
    }
    a.max(b)
}

// ---------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------

pub fn i32_wrap_i64(a: i64) -> i32 {
    a as i32
}
pub fn i64_extend_i32_s(a: i32) -> i64 {
    a as i64
}
pub fn i64_extend_i32_u(a: i32) -> i64 {
    (a as u32) as i64
}

pub fn i32_extend8_s(a: i32) -> i32 {
    (a as i8) as i32
}
pub fn i32_extend16_s(a: i32) -> i32 {
    (a as i16) as i32
}
pub fn i64_extend8_s(a: i64) -> i64 {
    (a as i8) as i64
}
pub fn i64_extend16_s(a: i64) -> i64 {
    (a as i16) as i64
}
pub fn i64_extend32_s(a: i64) -> i64 {
    (a as i32) as i64
}

pub fn f32_demote_f64(a: f64) -> f32 {
    a as f32
}
pub fn f64_promote_f32(a: f32) -> f64 {
    a as f64
}

macro_rules! trunc {
    ($name:ident, $fty:ty, $ity:ty, $min:expr, $max:expr) => {
        pub fn $name(a: $fty) -> TrapResult<$ity> {
            if a.is_nan() {
                return Err(TrapKind::InvalidConversion);
            }
            if a <= $min || a >= $max {
                return Err(TrapKind::InvalidConversion);
            }
            Ok(a as $ity)
        }
    };
}

// bounds are the first invalid values one ULP beyond the representable range;
// the comparison below is inclusive since $min/$max are themselves invalid
trunc!(i32_trunc_f32_s, f32, i32, -2147483904.0f32, 2147483648.0f32);
trunc!(i32_trunc_f32_u, f32, u32, -1.0f32, 4294967296.0f32);
trunc!(i32_trunc_f64_s, f64, i32, -2147483649.0f64, 2147483648.0f64);
trunc!(i32_trunc_f64_u, f64, u32, -1.0f64, 4294967296.0f64);
trunc!(
    i64_trunc_f32_s,
    f32,
    i64,
    -9223373136366403584.0f32,
    9223372036854775808.0f32
);
trunc!(i64_trunc_f32_u, f32, u64, -1.0f32, 18446744073709551616.0f32);
trunc!(
    i64_trunc_f64_s,
    f64,
    i64,
    -9223372036854777856.0f64,
    9223372036854775808.0f64
);
trunc!(
    i64_trunc_f64_u,
    f64,
    u64,
    -1.0f64,
    18446744073709551616.0f64
);

pub fn i32_trunc_sat_f32_s(a: f32) -> i32 {
    if a.is_nan() {
        0
    } else if a < i32::MIN as f32 {
        i32::MIN
    } else if a >= -(i32::MIN as f32) {
        i32::MAX
    } else {
        a as i32
    }
}
pub fn i32_trunc_sat_f32_u(a: f32) -> u32 {
    if a.is_nan() || a < 0.0 {
        0
    } else if a >= 4294967296.0f32 {
        u32::MAX
    } else {
        a as u32
    }
}
pub fn i32_trunc_sat_f64_s(a: f64) -> i32 {
    if a.is_nan() {
        0
    } else if a < i32::MIN as f64 {
        i32::MIN
    } else if a > i32::MAX as f64 {
        i32::MAX
    } else {
        a as i32
    }
}
pub fn i32_trunc_sat_f64_u(a: f64) -> u32 {
    if a.is_nan() || a < 0.0 {
        0
    } else if a > u32::MAX as f64 {
        u32::MAX
    } else {
        a as u32
    }
}
pub fn i64_trunc_sat_f32_s(a: f32) -> i64 {
    if a.is_nan() {
        0
    } else if a < i64::MIN as f32 {
        i64::MIN
    } else if a >= -(i64::MIN as f32) {
        i64::MAX
    } else {
        a as i64
    }
}
pub fn i64_trunc_sat_f32_u(a: f32) -> u64 {
    if a.is_nan() || a < 0.0 {
        0
    } else if a >= 18446744073709551616.0f32 {
        u64::MAX
    } else {
        a as u64
    }
}
pub fn i64_trunc_sat_f64_s(a: f64) -> i64 {
    if a.is_nan() {
        0
    } else if a < i64::MIN as f64 {
        i64::MIN
    } else if a >= -(i64::MIN as f64) {
        i64::MAX
    } else {
        a as i64
    }
}
pub fn i64_trunc_sat_f64_u(a: f64) -> u64 {
    if a.is_nan() || a < 0.0 {
        0
    } else if a >= 18446744073709551616.0f64 {
        u64::MAX
    } else {
        a as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn div_s_wraps_at_min_over_neg_one() {
        assert_eq!(i32_div_s(i32::MIN, -1), Err(TrapKind::IntegerOverflow));
        assert_eq!(i32_rem_s(i32::MIN, -1), Ok(0));
    }

    #[test]
    fn div_by_zero_traps() {
        assert_eq!(i32_div_s(7, 0), Err(TrapKind::IntegerDivideByZero));
        assert_eq!(i32_div_u(7, 0), Err(TrapKind::IntegerDivideByZero));
        assert_eq!(i64_div_s(7, 0), Err(TrapKind::IntegerDivideByZero));
    }

    #[test]
    fn shift_count_is_taken_modulo_width() {
        assert_eq!(i32_shl(1, 32), 1);
        assert_eq!(i32_shl(1, 33), 2);
        assert_eq!(i64_shl(1, 64), 1);
    }

    #[test]
    fn shr_u_is_logical_shr_s_is_arithmetic() {
        assert_eq!(i32_shr_u(-1, 28), 0x0000000F);
        assert_eq!(i32_shr_s(-1, 28), -1);
    }

    #[test]
    fn rotations_round_trip() {
        assert_eq!(i32_rotr(i32_rotl(0x1234_5678u32 as i32, 5), 5), 0x1234_5678u32 as i32);
    }

    #[test]
    fn min_max_propagate_nan_and_respect_signed_zero() {
        assert!(f32_min(f32::NAN, 1.0).is_nan());
        assert_eq!(f32_min(0.0, -0.0).to_bits(), (-0.0f32).to_bits());
        assert_eq!(f32_max(0.0, -0.0).to_bits(), (0.0f32).to_bits());
    }

    #[test]
    fn trunc_traps_on_nan_and_out_of_range() {
        assert_eq!(i32_trunc_f32_s(f32::NAN), Err(TrapKind::InvalidConversion));
        assert_eq!(
            i32_trunc_f32_s(1e20),
            Err(TrapKind::InvalidConversion)
        );
        assert_eq!(i32_trunc_f32_s(1.9), Ok(1));
    }

    #[test]
    fn trunc_traps_exactly_at_the_invalid_boundary() {
        assert_eq!(
            i32_trunc_f32_s(-2147483904.0f32),
            Err(TrapKind::InvalidConversion)
        );
        assert_eq!(
            i32_trunc_f32_s(2147483648.0f32),
            Err(TrapKind::InvalidConversion)
        );
        assert_eq!(i32_trunc_f32_u(-1.0f32), Err(TrapKind::InvalidConversion));
    }

    #[test]
    fn trunc_sat_never_traps() {
        assert_eq!(i32_trunc_sat_f32_s(f32::NAN), 0);
        assert_eq!(i32_trunc_sat_f32_s(1e20), i32::MAX);
        assert_eq!(i32_trunc_sat_f32_s(-1e20), i32::MIN);
    }

    #[test]
    fn wrap_then_extend_is_identity_on_i32() {
        let x: i32 = -12345;
        assert_eq!(i32_wrap_i64(i64_extend_i32_s(x)), x);
    }
}
