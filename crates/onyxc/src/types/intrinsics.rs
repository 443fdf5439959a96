//! Builtin operation catalog
//!
//! Maps the names accepted by `#intrinsic` procedures to the WebAssembly
//! instruction that implements them. The resolver only validates names and
//! signatures against this table; lowering emits the opcode.

use super::BasicKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    MemorySize,
    MemoryGrow,

    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32Slr,
    I32Sar,
    I32Rotl,
    I32Rotr,

    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64Slr,
    I64Sar,
    I64Rotl,
    I64Rotr,

    F32Abs,
    F32Sqrt,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Min,
    F32Max,
    F32Copysign,

    F64Abs,
    F64Sqrt,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Min,
    F64Max,
    F64Copysign,
}

const CATALOG: &[(&str, Intrinsic)] = &[
    ("memory_size", Intrinsic::MemorySize),
    ("memory_grow", Intrinsic::MemoryGrow),
    ("clz_i32", Intrinsic::I32Clz),
    ("ctz_i32", Intrinsic::I32Ctz),
    ("popcnt_i32", Intrinsic::I32Popcnt),
    ("and_i32", Intrinsic::I32And),
    ("or_i32", Intrinsic::I32Or),
    ("xor_i32", Intrinsic::I32Xor),
    ("shl_i32", Intrinsic::I32Shl),
    ("slr_i32", Intrinsic::I32Slr),
    ("sar_i32", Intrinsic::I32Sar),
    ("rotl_i32", Intrinsic::I32Rotl),
    ("rotr_i32", Intrinsic::I32Rotr),
    ("clz_i64", Intrinsic::I64Clz),
    ("ctz_i64", Intrinsic::I64Ctz),
    ("popcnt_i64", Intrinsic::I64Popcnt),
    ("and_i64", Intrinsic::I64And),
    ("or_i64", Intrinsic::I64Or),
    ("xor_i64", Intrinsic::I64Xor),
    ("shl_i64", Intrinsic::I64Shl),
    ("slr_i64", Intrinsic::I64Slr),
    ("sar_i64", Intrinsic::I64Sar),
    ("rotl_i64", Intrinsic::I64Rotl),
    ("rotr_i64", Intrinsic::I64Rotr),
    ("abs_f32", Intrinsic::F32Abs),
    ("sqrt_f32", Intrinsic::F32Sqrt),
    ("ceil_f32", Intrinsic::F32Ceil),
    ("floor_f32", Intrinsic::F32Floor),
    ("trunc_f32", Intrinsic::F32Trunc),
    ("nearest_f32", Intrinsic::F32Nearest),
    ("min_f32", Intrinsic::F32Min),
    ("max_f32", Intrinsic::F32Max),
    ("copysign_f32", Intrinsic::F32Copysign),
    ("abs_f64", Intrinsic::F64Abs),
    ("sqrt_f64", Intrinsic::F64Sqrt),
    ("ceil_f64", Intrinsic::F64Ceil),
    ("floor_f64", Intrinsic::F64Floor),
    ("trunc_f64", Intrinsic::F64Trunc),
    ("nearest_f64", Intrinsic::F64Nearest),
    ("min_f64", Intrinsic::F64Min),
    ("max_f64", Intrinsic::F64Max),
    ("copysign_f64", Intrinsic::F64Copysign),
];

impl Intrinsic {
    pub fn from_name(name: &str) -> Option<Intrinsic> {
        CATALOG
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, intrinsic)| *intrinsic)
    }

    pub fn name(self) -> &'static str {
        CATALOG
            .iter()
            .find(|(_, i)| *i == self)
            .map_or("<unknown>", |(n, _)| n)
    }

    /// WebAssembly opcode implementing this operation
    pub fn opcode(self) -> u8 {
        use Intrinsic::*;
        match self {
            MemorySize => 0x3F,
            MemoryGrow => 0x40,

            I32Clz => 0x67,
            I32Ctz => 0x68,
            I32Popcnt => 0x69,
            I32And => 0x71,
            I32Or => 0x72,
            I32Xor => 0x73,
            I32Shl => 0x74,
            I32Sar => 0x75,
            I32Slr => 0x76,
            I32Rotl => 0x77,
            I32Rotr => 0x78,

            I64Clz => 0x79,
            I64Ctz => 0x7A,
            I64Popcnt => 0x7B,
            I64And => 0x83,
            I64Or => 0x84,
            I64Xor => 0x85,
            I64Shl => 0x86,
            I64Sar => 0x87,
            I64Slr => 0x88,
            I64Rotl => 0x89,
            I64Rotr => 0x8A,

            F32Abs => 0x8B,
            F32Ceil => 0x8D,
            F32Floor => 0x8E,
            F32Trunc => 0x8F,
            F32Nearest => 0x90,
            F32Sqrt => 0x91,
            F32Min => 0x96,
            F32Max => 0x97,
            F32Copysign => 0x98,

            F64Abs => 0x99,
            F64Ceil => 0x9B,
            F64Floor => 0x9C,
            F64Trunc => 0x9D,
            F64Nearest => 0x9E,
            F64Sqrt => 0x9F,
            F64Min => 0xA4,
            F64Max => 0xA5,
            F64Copysign => 0xA6,
        }
    }

    /// Parameter and result types the declaring procedure must use
    pub fn signature(self) -> (&'static [BasicKind], BasicKind) {
        use BasicKind::{F32, F64, I32, I64};
        use Intrinsic::*;
        match self {
            MemorySize => (&[], I32),
            MemoryGrow => (&[I32], I32),

            I32Clz | I32Ctz | I32Popcnt => (&[I32], I32),
            I32And | I32Or | I32Xor | I32Shl | I32Slr | I32Sar | I32Rotl | I32Rotr => {
                (&[I32, I32], I32)
            }

            I64Clz | I64Ctz | I64Popcnt => (&[I64], I64),
            I64And | I64Or | I64Xor | I64Shl | I64Slr | I64Sar | I64Rotl | I64Rotr => {
                (&[I64, I64], I64)
            }

            F32Abs | F32Sqrt | F32Ceil | F32Floor | F32Trunc | F32Nearest => (&[F32], F32),
            F32Min | F32Max | F32Copysign => (&[F32, F32], F32),

            F64Abs | F64Sqrt | F64Ceil | F64Floor | F64Trunc | F64Nearest => (&[F64], F64),
            F64Min | F64Max | F64Copysign => (&[F64, F64], F64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_round_trip() {
        for (name, intrinsic) in CATALOG {
            assert_eq!(Intrinsic::from_name(name), Some(*intrinsic));
            assert_eq!(intrinsic.name(), *name);
        }
        assert_eq!(Intrinsic::from_name("fma_f32"), None);
    }

    #[test]
    fn test_opcodes_are_distinct() {
        let mut codes: Vec<u8> = CATALOG.iter().map(|(_, i)| i.opcode()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), CATALOG.len());
    }

    #[test]
    fn test_shift_right_opcodes() {
        // slr = logical (unsigned), sar = arithmetic (signed)
        assert_eq!(Intrinsic::I32Slr.opcode(), 0x76);
        assert_eq!(Intrinsic::I32Sar.opcode(), 0x75);
    }
}
