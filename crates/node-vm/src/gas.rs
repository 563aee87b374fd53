//! Gas price table. Prices are per-opcode-execution and per-syscall, in the
//! same fixed-point unit as the utility token; the committee can adjust the
//! syscall price table, and a hardfork id gates changes to either table so
//! replay of historical blocks always uses the prices in force at that
//! height.

use crate::opcode::OpCode;

/// 1 gas unit == 10^-8 of the utility token (matches `Fixed8`).
pub const GAS_PER_BYTE_PUSHDATA: i64 = 8;

/// Base execution price for an opcode, ignoring any data-length surcharge.
pub fn opcode_base_price(op: OpCode) -> i64 {
    use OpCode::*;
    match op {
        PushInt0 | PushInt1 | PushIntM1 | PushNull | PushTrue | PushFalse | PushA | Nop => 30,
        PushData1 | PushData2 | PushData4 => 180,
        Jmp | JmpIf | JmpIfNot | Ret => 60,
        Call | CallL => 22_000,
        Syscall => 0, // priced by the interop descriptor instead
        Depth | Drop | Dup | Swap | Over => 60,
        Cat | Substr | Left | Right => 2_048,
        Add | Sub | Numequal | Numnotequal | Lt | Gt | Not | BoolAnd | BoolOr => 80,
        Mul | Div | Mod | ShL | ShR => 240,
        IsNull | IsType => 60,
        Convert => 8_192,
        NewArray0 | NewStruct0 | NewMap => 160,
        NewArray => 15_360,
        PackMap | Unpack => 2_048,
        PickItem | SetItem | Append | Size => 2_048,
        Try | EndTry | EndFinally | Throw | Assert => 60,
        Abort => 0,
        CheckSig => 1_000_000,
        CheckMultisig => 1_000_000, // scaled by signer count at the call site
    }
}

/// Multisig pricing scales linearly with the number of public keys checked.
pub fn check_multisig_price(key_count: usize) -> i64 {
    opcode_base_price(OpCode::CheckSig) * key_count as i64
}

/// A price table snapshot for interop (syscall) descriptors, keyed by the
/// 4-byte hash used on the wire. Real deployments load this from native
/// contract storage so the committee can retune it; this is the
/// hardfork-default fallback.
pub struct InteropPriceTable;

impl InteropPriceTable {
    pub fn price_for(hash: u32) -> Option<i64> {
        match hash {
            // System.Runtime.CheckWitness
            0x0c7f_f2c3 => Some(1_024),
            // System.Runtime.Notify
            0x95d2_0a5d => Some(32_768),
            // System.Storage.Get
            0x9bf6_67ce => Some(1_000_000),
            // System.Storage.Put
            0xe63f_1884 => Some(1_000_000),
            // System.Storage.Delete
            0x6c5e_1d1e => Some(1_000_000),
            // System.Contract.Call
            0x627d_5b52 => Some(32_768),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_cheaper_than_call() {
        assert!(opcode_base_price(OpCode::PushInt0) < opcode_base_price(OpCode::Call));
    }

    #[test]
    fn multisig_scales_with_key_count() {
        assert_eq!(check_multisig_price(3), opcode_base_price(OpCode::CheckSig) * 3);
    }

    #[test]
    fn unknown_interop_hash_has_no_price() {
        assert!(InteropPriceTable::price_for(0xdead_beef).is_none());
    }
}
