//! Symbolic ARM/Thumb opcode identifiers the rule table matches against.
//! Real encodings are the external disassembler's concern; these exist so
//! the rule table and its tests have stable names to refer to.

use crate::inst::Opcode;

macro_rules! arm_opcodes {
    ($($name:ident = $value:expr),* $(,)?) => {
        $(pub const $name: Opcode = Opcode($value);)*
    };
}

arm_opcodes! {
    BX = 1,
    BX_PRED = 2,
    T_BX = 3,
    BLX = 4,
    BLX_PRED = 5,
    BL = 6,
    BL_PRED = 7,
    BLXI = 8,
    T_BL = 9,
    T_BLXI = 10,
    T_B = 11,
    T2_B = 12,
    MOVPCLR = 13,
    BX_RET = 14,
    BCC = 15,
    T_BCC = 16,
    T_CBZ = 17,
    T_CBNZ = 18,
    LDMIA_UPD = 19,
    T_POP = 20,
    T_LDRPCI = 21,
}
