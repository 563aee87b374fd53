//! Opcode set spanning push, flow, stack, splice, bit/arith, type,
//! array/map/struct, exception, and crypto-helper categories. This is the
//! subset actually dispatched by the interpreter.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // --- push ---
    PushInt0 = 0x10,
    PushInt1 = 0x11,
    PushIntM1 = 0x0f,
    PushData1 = 0x0c,
    PushData2 = 0x0d,
    PushData4 = 0x0e,
    PushNull = 0x0b,
    PushTrue = 0x08,
    PushFalse = 0x09,
    PushA = 0x18,

    // --- flow ---
    Nop = 0x21,
    Jmp = 0x22,
    JmpIf = 0x24,
    JmpIfNot = 0x26,
    Call = 0x34,
    CallL = 0x35,
    Ret = 0x40,
    Syscall = 0x41,

    // --- stack ---
    Depth = 0x43,
    Drop = 0x45,
    Dup = 0x4a,
    Swap = 0x50,
    Over = 0x4b,

    // --- splice ---
    Cat = 0x7e,
    Substr = 0x7f,
    Left = 0x80,
    Right = 0x81,

    // --- bit/arith ---
    Add = 0x9e,
    Sub = 0x9f,
    Mul = 0xa0,
    Div = 0xa1,
    Mod = 0xa2,
    ShL = 0xa8,
    ShR = 0xa9,
    Not = 0xaa,
    BoolAnd = 0xab,
    BoolOr = 0xac,
    Numequal = 0xb3,
    Numnotequal = 0xb4,
    Lt = 0xaf,
    Gt = 0xb0,

    // --- type ---
    IsNull = 0xd8,
    IsType = 0xd9,
    Convert = 0xdb,

    // --- array/map/struct ---
    NewArray0 = 0xc2,
    NewArray = 0xc3,
    NewStruct0 = 0xc5,
    NewMap = 0xc8,
    PackMap = 0xbe,
    Unpack = 0xbd,
    PickItem = 0xce,
    SetItem = 0xcf,
    Append = 0xd0,
    Size = 0xca,

    // --- exception ---
    Try = 0x3a,
    EndTry = 0x3d,
    EndFinally = 0x3e,
    Throw = 0x3f,
    Abort = 0x00,
    Assert = 0x38,

    // --- crypto-helper (dispatched by dedicated opcode in some reference
    // implementations for cheaper gas accounting than a generic syscall) ---
    CheckSig = 0xf0,
    CheckMultisig = 0xf1,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use OpCode::*;
        let table = [
            PushInt0, PushInt1, PushIntM1, PushData1, PushData2, PushData4, PushNull, PushTrue,
            PushFalse, PushA, Nop, Jmp, JmpIf, JmpIfNot, Call, CallL, Ret, Syscall, Depth, Drop,
            Dup, Swap, Over, Cat, Substr, Left, Right, Add, Sub, Mul, Div, Mod, ShL, ShR, Not,
            BoolAnd, BoolOr, Numequal, Numnotequal, Lt, Gt, IsNull, IsType, Convert, NewArray0,
            NewArray, NewStruct0, NewMap, PackMap, Unpack, PickItem, SetItem, Append, Size, Try,
            EndTry, EndFinally, Throw, Abort, Assert, CheckSig, CheckMultisig,
        ];
        table.into_iter().find(|op| *op as u8 == byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_every_opcode() {
        let samples = [
            OpCode::PushInt0,
            OpCode::Jmp,
            OpCode::Call,
            OpCode::Add,
            OpCode::Try,
            OpCode::CheckMultisig,
        ];
        for op in samples {
            assert_eq!(OpCode::from_byte(op as u8), Some(op));
        }
    }

    #[test]
    fn unknown_byte_is_none() {
        assert_eq!(OpCode::from_byte(0x02), None);
    }
}
