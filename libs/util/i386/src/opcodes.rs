// This file is part of OpenFA.
//
// OpenFA is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenFA is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenFA.  If not, see <http://www.gnu.org/licenses/>.

// Operands are written as method/size, following the Intel manual's opcode map notation:
//
//   E  ModR/M register or memory     b  byte
//   G  ModR/M reg field register     w  word
//   I  immediate                     d  dword
//   J  relative offset               v  word or dword
//   O  absolute memory offset        p  32 bit offset + 16 bit selector
//   A  direct far address            n  none
//   Z  register in the opcode byte
//   S  segment register in the reg field
//   One, AL, CL, DX, EAX  implied operands
use crate::lut::{AddressingMethod, Form, Mnemonic, OpCode, OperandDef, OperandSize};

macro_rules! method {
    (E) => {
        AddressingMethod::RegisterOrMemoryAddress
    };
    (G) => {
        AddressingMethod::Register
    };
    (I) => {
        AddressingMethod::ImmediateData
    };
    (J) => {
        AddressingMethod::RelativeOffset
    };
    (O) => {
        AddressingMethod::MemoryAddress
    };
    (A) => {
        AddressingMethod::DirectAddress
    };
    (Z) => {
        AddressingMethod::OpCodeRegister
    };
    (S) => {
        AddressingMethod::SegmentRegister
    };
    (One) => {
        AddressingMethod::ImmediateOne
    };
    (AL) => {
        AddressingMethod::RegisterAl
    };
    (CL) => {
        AddressingMethod::RegisterCl
    };
    (DX) => {
        AddressingMethod::RegisterDx
    };
    (EAX) => {
        AddressingMethod::RegisterEax
    };
}

macro_rules! size {
    (b) => {
        OperandSize::Byte
    };
    (w) => {
        OperandSize::Word
    };
    (d) => {
        OperandSize::Dword
    };
    (v) => {
        OperandSize::WordOrDword
    };
    (p) => {
        OperandSize::Fword
    };
    (n) => {
        OperandSize::None
    };
}

macro_rules! operand {
    ($method:ident / $size:ident) => {
        OperandDef {
            method: method!($method),
            size: size!($size),
        }
    };
}

macro_rules! form {
    ($mnemonic:ident) => {
        Form {
            mnemonic: Mnemonic::$mnemonic,
            operand1: OperandDef::NONE,
            operand2: OperandDef::NONE,
        }
    };
    ($mnemonic:ident: $m1:ident / $s1:ident) => {
        Form {
            mnemonic: Mnemonic::$mnemonic,
            operand1: operand!($m1 / $s1),
            operand2: OperandDef::NONE,
        }
    };
    ($mnemonic:ident: $m1:ident / $s1:ident, $m2:ident / $s2:ident) => {
        Form {
            mnemonic: Mnemonic::$mnemonic,
            operand1: operand!($m1 / $s1),
            operand2: operand!($m2 / $s2),
        }
    };
}

// op!(0x00, modrm; Add: E/b, G/b)       one form, ModR/M byte follows
// op!(0x80, group; [Add: E/b, I/b], ..) form selected by the ModR/M reg field
// op!(0x0F 0xB6, modrm; ...)            two-byte opcode
macro_rules! op {
    (@def $escape:expr, $op1:expr, $token:expr, $modifier:expr, [$($form:expr),+]) => {
        OpCode {
            prefix: 0,
            two_byte_prefix: $escape,
            op1: $op1,
            op2: 0,
            forms: &[$($form),+],
            has_register_token: $token,
            has_opcode_modifier: $modifier,
        }
    };
    (0x0F $op1:literal, group; $([$($form:tt)*]),+) => {
        op!(@def OpCode::TWO_BYTE_ESCAPE, $op1, true, true, [$(form!($($form)*)),+])
    };
    (0x0F $op1:literal, modrm; $($form:tt)*) => {
        op!(@def OpCode::TWO_BYTE_ESCAPE, $op1, true, false, [form!($($form)*)])
    };
    (0x0F $op1:literal; $($form:tt)*) => {
        op!(@def OpCode::TWO_BYTE_ESCAPE, $op1, false, false, [form!($($form)*)])
    };
    ($op1:literal, group; $([$($form:tt)*]),+) => {
        op!(@def 0, $op1, true, true, [$(form!($($form)*)),+])
    };
    ($op1:literal, modrm; $($form:tt)*) => {
        op!(@def 0, $op1, true, false, [form!($($form)*)])
    };
    ($op1:literal; $($form:tt)*) => {
        op!(@def 0, $op1, false, false, [form!($($form)*)])
    };
}

macro_rules! opcodes {
    ($($name:ident = $def:expr;)*) => {
        $(pub const $name: OpCode = $def;)*

        /// Every definition the standard table is built from.
        pub const ALL: &[OpCode] = &[$($name),*];
    };
}

opcodes! {
    ADD_RM8_R8 = op!(0x00, modrm; Add: E/b, G/b);
    ADD_RM1632_R1632 = op!(0x01, modrm; Add: E/v, G/v);
    ADD_R8_RM8 = op!(0x02, modrm; Add: G/b, E/b);
    ADD_R1632_RM1632 = op!(0x03, modrm; Add: G/v, E/v);
    ADD_AL_IMM8 = op!(0x04; Add: AL/b, I/b);
    ADD_EAX_IMM1632 = op!(0x05; Add: EAX/v, I/v);
    PUSH_ES = op!(0x06; Push);
    POP_ES = op!(0x07; Pop);
    OR_RM8_R8 = op!(0x08, modrm; Or: E/b, G/b);
    OR_RM1632_R1632 = op!(0x09, modrm; Or: E/v, G/v);
    OR_R8_RM8 = op!(0x0A, modrm; Or: G/b, E/b);
    OR_R1632_RM1632 = op!(0x0B, modrm; Or: G/v, E/v);
    OR_AL_IMM8 = op!(0x0C; Or: AL/b, I/b);
    OR_EAX_IMM1632 = op!(0x0D; Or: EAX/v, I/v);
    PUSH_CS = op!(0x0E; Push);

    ADC_RM8_R8 = op!(0x10, modrm; Adc: E/b, G/b);
    ADC_RM1632_R1632 = op!(0x11, modrm; Adc: E/v, G/v);
    ADC_R8_RM8 = op!(0x12, modrm; Adc: G/b, E/b);
    ADC_R1632_RM1632 = op!(0x13, modrm; Adc: G/v, E/v);
    ADC_AL_IMM8 = op!(0x14; Adc: AL/b, I/b);
    ADC_EAX_IMM1632 = op!(0x15; Adc: EAX/v, I/v);
    PUSH_SS = op!(0x16; Push);
    POP_SS = op!(0x17; Pop);
    SBB_RM8_R8 = op!(0x18, modrm; Sbb: E/b, G/b);
    SBB_RM1632_R1632 = op!(0x19, modrm; Sbb: E/v, G/v);
    SBB_R8_RM8 = op!(0x1A, modrm; Sbb: G/b, E/b);
    SBB_R1632_RM1632 = op!(0x1B, modrm; Sbb: G/v, E/v);
    SBB_AL_IMM8 = op!(0x1C; Sbb: AL/b, I/b);
    SBB_EAX_IMM1632 = op!(0x1D; Sbb: EAX/v, I/v);
    PUSH_DS = op!(0x1E; Push);
    POP_DS = op!(0x1F; Pop);

    AND_RM8_R8 = op!(0x20, modrm; And: E/b, G/b);
    AND_RM1632_R1632 = op!(0x21, modrm; And: E/v, G/v);
    AND_R8_RM8 = op!(0x22, modrm; And: G/b, E/b);
    AND_R1632_RM1632 = op!(0x23, modrm; And: G/v, E/v);
    AND_AL_IMM8 = op!(0x24; And: AL/b, I/b);
    AND_EAX_IMM1632 = op!(0x25; And: EAX/v, I/v);
    DAA = op!(0x27; Daa);
    SUB_RM8_R8 = op!(0x28, modrm; Sub: E/b, G/b);
    SUB_RM1632_R1632 = op!(0x29, modrm; Sub: E/v, G/v);
    SUB_R8_RM8 = op!(0x2A, modrm; Sub: G/b, E/b);
    SUB_R1632_RM1632 = op!(0x2B, modrm; Sub: G/v, E/v);
    SUB_AL_IMM8 = op!(0x2C; Sub: AL/b, I/b);
    SUB_EAX_IMM1632 = op!(0x2D; Sub: EAX/v, I/v);
    DAS = op!(0x2F; Das);

    XOR_RM8_R8 = op!(0x30, modrm; Xor: E/b, G/b);
    XOR_RM1632_R1632 = op!(0x31, modrm; Xor: E/v, G/v);
    XOR_R8_RM8 = op!(0x32, modrm; Xor: G/b, E/b);
    XOR_R1632_RM1632 = op!(0x33, modrm; Xor: G/v, E/v);
    XOR_AL_IMM8 = op!(0x34; Xor: AL/b, I/b);
    XOR_EAX_IMM1632 = op!(0x35; Xor: EAX/v, I/v);
    AAA = op!(0x37; Aaa);
    CMP_RM8_R8 = op!(0x38, modrm; Cmp: E/b, G/b);
    CMP_RM1632_R1632 = op!(0x39, modrm; Cmp: E/v, G/v);
    CMP_R8_RM8 = op!(0x3A, modrm; Cmp: G/b, E/b);
    CMP_R1632_RM1632 = op!(0x3B, modrm; Cmp: G/v, E/v);
    CMP_AL_IMM8 = op!(0x3C; Cmp: AL/b, I/b);
    CMP_EAX_IMM1632 = op!(0x3D; Cmp: EAX/v, I/v);
    AAS = op!(0x3F; Aas);

    INC_EAX = op!(0x40; Inc: Z/v);
    INC_ECX = op!(0x41; Inc: Z/v);
    INC_EDX = op!(0x42; Inc: Z/v);
    INC_EBX = op!(0x43; Inc: Z/v);
    INC_ESP = op!(0x44; Inc: Z/v);
    INC_EBP = op!(0x45; Inc: Z/v);
    INC_ESI = op!(0x46; Inc: Z/v);
    INC_EDI = op!(0x47; Inc: Z/v);
    DEC_EAX = op!(0x48; Dec: Z/v);
    DEC_ECX = op!(0x49; Dec: Z/v);
    DEC_EDX = op!(0x4A; Dec: Z/v);
    DEC_EBX = op!(0x4B; Dec: Z/v);
    DEC_ESP = op!(0x4C; Dec: Z/v);
    DEC_EBP = op!(0x4D; Dec: Z/v);
    DEC_ESI = op!(0x4E; Dec: Z/v);
    DEC_EDI = op!(0x4F; Dec: Z/v);

    PUSH_EAX = op!(0x50; Push: Z/v);
    PUSH_ECX = op!(0x51; Push: Z/v);
    PUSH_EDX = op!(0x52; Push: Z/v);
    PUSH_EBX = op!(0x53; Push: Z/v);
    PUSH_ESP = op!(0x54; Push: Z/v);
    PUSH_EBP = op!(0x55; Push: Z/v);
    PUSH_ESI = op!(0x56; Push: Z/v);
    PUSH_EDI = op!(0x57; Push: Z/v);
    POP_EAX = op!(0x58; Pop: Z/v);
    POP_ECX = op!(0x59; Pop: Z/v);
    POP_EDX = op!(0x5A; Pop: Z/v);
    POP_EBX = op!(0x5B; Pop: Z/v);
    POP_ESP = op!(0x5C; Pop: Z/v);
    POP_EBP = op!(0x5D; Pop: Z/v);
    POP_ESI = op!(0x5E; Pop: Z/v);
    POP_EDI = op!(0x5F; Pop: Z/v);

    PUSHAD = op!(0x60; Pushad);
    POPAD = op!(0x61; Popad);
    BOUND_R1632_M1632 = op!(0x62, modrm; Bound: G/v, E/v);
    ARPL_RM16_R16 = op!(0x63, modrm; Arpl: E/w, G/w);
    PUSH_IMM1632 = op!(0x68; Push: I/v);
    PUSH_IMM8 = op!(0x6A; Push: I/b);
    INSB = op!(0x6C; Insb);
    INSD = op!(0x6D; Insd);
    OUTSB = op!(0x6E; Outsb);
    OUTSD = op!(0x6F; Outsd);

    JO_REL8 = op!(0x70; Jo: J/b);
    JNO_REL8 = op!(0x71; Jno: J/b);
    JB_REL8 = op!(0x72; Jb: J/b);
    JNB_REL8 = op!(0x73; Jnb: J/b);
    JE_REL8 = op!(0x74; Je: J/b);
    JNE_REL8 = op!(0x75; Jne: J/b);
    JBE_REL8 = op!(0x76; Jbe: J/b);
    JA_REL8 = op!(0x77; Ja: J/b);
    JS_REL8 = op!(0x78; Js: J/b);
    JNS_REL8 = op!(0x79; Jns: J/b);
    JPE_REL8 = op!(0x7A; Jpe: J/b);
    JPO_REL8 = op!(0x7B; Jpo: J/b);
    JL_REL8 = op!(0x7C; Jl: J/b);
    JGE_REL8 = op!(0x7D; Jge: J/b);
    JLE_REL8 = op!(0x7E; Jle: J/b);
    JG_REL8 = op!(0x7F; Jg: J/b);

    ARITHMETIC_RM8_IMM8 = op!(0x80, group;
        [Add: E/b, I/b], [Or: E/b, I/b], [Adc: E/b, I/b], [Sbb: E/b, I/b],
        [And: E/b, I/b], [Sub: E/b, I/b], [Xor: E/b, I/b], [Cmp: E/b, I/b]);
    ARITHMETIC_RM32_IMM1632 = op!(0x81, group;
        [Add: E/d, I/v], [Or: E/d, I/v], [Adc: E/d, I/v], [Sbb: E/d, I/v],
        [And: E/d, I/v], [Sub: E/d, I/v], [Xor: E/d, I/v], [Cmp: E/d, I/v]);
    ARITHMETIC_RM8_IMM8_ALIAS = op!(0x82, group;
        [Add: E/b, I/b], [Or: E/b, I/b], [Adc: E/b, I/b], [Sbb: E/b, I/b],
        [And: E/b, I/b], [Sub: E/b, I/b], [Xor: E/b, I/b], [Cmp: E/b, I/b]);
    ARITHMETIC_RM32_IMM8 = op!(0x83, group;
        [Add: E/d, I/b], [Or: E/d, I/b], [Adc: E/d, I/b], [Sbb: E/d, I/b],
        [And: E/d, I/b], [Sub: E/d, I/b], [Xor: E/d, I/b], [Cmp: E/d, I/b]);
    TEST_RM8_R8 = op!(0x84, modrm; Test: E/b, G/b);
    TEST_RM1632_R1632 = op!(0x85, modrm; Test: E/v, G/v);
    XCHG_RM8_R8 = op!(0x86, modrm; Xchg: E/b, G/b);
    XCHG_RM1632_R1632 = op!(0x87, modrm; Xchg: E/v, G/v);
    MOV_RM8_R8 = op!(0x88, modrm; Mov: E/b, G/b);
    MOV_RM1632_R1632 = op!(0x89, modrm; Mov: E/v, G/v);
    MOV_R8_RM8 = op!(0x8A, modrm; Mov: G/b, E/b);
    MOV_R1632_RM1632 = op!(0x8B, modrm; Mov: G/v, E/v);
    MOV_RM16_SREG = op!(0x8C, modrm; Mov: E/w, S/w);
    LEA_R1632_M32 = op!(0x8D, modrm; Lea: G/v, E/d);
    MOV_SREG_RM16 = op!(0x8E, modrm; Mov: S/w, E/w);
    POP_RM1632 = op!(0x8F, group; [Pop: E/v]);

    NOP = op!(0x90; Nop);
    XCHG_ECX_EAX = op!(0x91; Xchg: Z/v, EAX/v);
    XCHG_EDX_EAX = op!(0x92; Xchg: Z/v, EAX/v);
    XCHG_EBX_EAX = op!(0x93; Xchg: Z/v, EAX/v);
    XCHG_ESP_EAX = op!(0x94; Xchg: Z/v, EAX/v);
    XCHG_EBP_EAX = op!(0x95; Xchg: Z/v, EAX/v);
    XCHG_ESI_EAX = op!(0x96; Xchg: Z/v, EAX/v);
    XCHG_EDI_EAX = op!(0x97; Xchg: Z/v, EAX/v);
    CWDE = op!(0x98; Cwde);
    CDQ = op!(0x99; Cdq);
    CALL_FAR_PTR1632 = op!(0x9A; CallFar: A/p);
    WAIT = op!(0x9B; Wait);
    PUSHFD = op!(0x9C; Pushfd);
    POPFD = op!(0x9D; Popfd);
    SAHF = op!(0x9E; Sahf);
    LAHF = op!(0x9F; Lahf);

    MOV_AL_MEM8 = op!(0xA0; Mov: AL/b, O/b);
    MOV_EAX_MEM1632 = op!(0xA1; Mov: EAX/v, O/v);
    MOV_MEM8_AL = op!(0xA2; Mov: O/b, AL/b);
    MOV_MEM1632_EAX = op!(0xA3; Mov: O/v, EAX/v);
    MOVSB = op!(0xA4; Movsb);
    MOVSD = op!(0xA5; Movsd);
    CMPSB = op!(0xA6; Cmpsb);
    CMPSD = op!(0xA7; Cmpsd);
    TEST_AL_IMM8 = op!(0xA8; Test: AL/b, I/b);
    TEST_EAX_IMM1632 = op!(0xA9; Test: EAX/v, I/v);
    STOSB = op!(0xAA; Stosb);
    STOSD = op!(0xAB; Stosd);
    LODSB = op!(0xAC; Lodsb);
    LODSD = op!(0xAD; Lodsd);
    SCASB = op!(0xAE; Scasb);
    SCASD = op!(0xAF; Scasd);

    MOV_AL_IMM8 = op!(0xB0; Mov: Z/b, I/b);
    MOV_CL_IMM8 = op!(0xB1; Mov: Z/b, I/b);
    MOV_DL_IMM8 = op!(0xB2; Mov: Z/b, I/b);
    MOV_BL_IMM8 = op!(0xB3; Mov: Z/b, I/b);
    MOV_AH_IMM8 = op!(0xB4; Mov: Z/b, I/b);
    MOV_CH_IMM8 = op!(0xB5; Mov: Z/b, I/b);
    MOV_DH_IMM8 = op!(0xB6; Mov: Z/b, I/b);
    MOV_BH_IMM8 = op!(0xB7; Mov: Z/b, I/b);
    MOV_EAX_IMM1632 = op!(0xB8; Mov: Z/v, I/v);
    MOV_ECX_IMM1632 = op!(0xB9; Mov: Z/v, I/v);
    MOV_EDX_IMM1632 = op!(0xBA; Mov: Z/v, I/v);
    MOV_EBX_IMM1632 = op!(0xBB; Mov: Z/v, I/v);
    MOV_ESP_IMM1632 = op!(0xBC; Mov: Z/v, I/v);
    MOV_EBP_IMM1632 = op!(0xBD; Mov: Z/v, I/v);
    MOV_ESI_IMM1632 = op!(0xBE; Mov: Z/v, I/v);
    MOV_EDI_IMM1632 = op!(0xBF; Mov: Z/v, I/v);

    SHIFT_RM8_IMM8 = op!(0xC0, group;
        [Rol: E/b, I/b], [Ror: E/b, I/b], [Rcl: E/b, I/b], [Rcr: E/b, I/b],
        [Shl: E/b, I/b], [Shr: E/b, I/b], [Sal: E/b, I/b], [Sar: E/b, I/b]);
    SHIFT_RM1632_IMM8 = op!(0xC1, group;
        [Rol: E/v, I/b], [Ror: E/v, I/b], [Rcl: E/v, I/b], [Rcr: E/v, I/b],
        [Shl: E/v, I/b], [Shr: E/v, I/b], [Sal: E/v, I/b], [Sar: E/v, I/b]);
    RETN_IMM16 = op!(0xC2; Retn: I/w);
    RETN = op!(0xC3; Retn);
    LES_R1632_M1632 = op!(0xC4, modrm; Les: G/v, E/p);
    LDS_R1632_M1632 = op!(0xC5, modrm; Lds: G/v, E/p);
    MOV_RM8_IMM8 = op!(0xC6, group; [Mov: E/b, I/b]);
    MOV_RM1632_IMM1632 = op!(0xC7, group; [Mov: E/v, I/v]);
    ENTER_IMM16_IMM8 = op!(0xC8; Enter: I/w, I/b);
    LEAVE = op!(0xC9; Leave);
    RETF_IMM16 = op!(0xCA; Retf: I/w);
    RETF = op!(0xCB; Retf);
    INT3 = op!(0xCC; Int3);
    INT_IMM8 = op!(0xCD; Int: I/b);
    INTO = op!(0xCE; Into);
    IRETD = op!(0xCF; Iretd);

    SHIFT_RM8_1 = op!(0xD0, group;
        [Rol: E/b, One/n], [Ror: E/b, One/n], [Rcl: E/b, One/n], [Rcr: E/b, One/n],
        [Shl: E/b, One/n], [Shr: E/b, One/n], [Sal: E/b, One/n], [Sar: E/b, One/n]);
    SHIFT_RM1632_1 = op!(0xD1, group;
        [Rol: E/v, One/n], [Ror: E/v, One/n], [Rcl: E/v, One/n], [Rcr: E/v, One/n],
        [Shl: E/v, One/n], [Shr: E/v, One/n], [Sal: E/v, One/n], [Sar: E/v, One/n]);
    SHIFT_RM8_CL = op!(0xD2, group;
        [Rol: E/b, CL/b], [Ror: E/b, CL/b], [Rcl: E/b, CL/b], [Rcr: E/b, CL/b],
        [Shl: E/b, CL/b], [Shr: E/b, CL/b], [Sal: E/b, CL/b], [Sar: E/b, CL/b]);
    SHIFT_RM1632_CL = op!(0xD3, group;
        [Rol: E/v, CL/b], [Ror: E/v, CL/b], [Rcl: E/v, CL/b], [Rcr: E/v, CL/b],
        [Shl: E/v, CL/b], [Shr: E/v, CL/b], [Sal: E/v, CL/b], [Sar: E/v, CL/b]);
    AAM_IMM8 = op!(0xD4; Aam: I/b);
    AAD_IMM8 = op!(0xD5; Aad: I/b);
    SALC = op!(0xD6; Salc);
    XLATB = op!(0xD7; Xlatb);

    LOOPNE_REL8 = op!(0xE0; Loopne: J/b);
    LOOPE_REL8 = op!(0xE1; Loope: J/b);
    LOOP_REL8 = op!(0xE2; Loop: J/b);
    JECXZ_REL8 = op!(0xE3; Jecxz: J/b);
    IN_AL_IMM8 = op!(0xE4; In: AL/b, I/b);
    IN_EAX_IMM8 = op!(0xE5; In: EAX/d, I/b);
    OUT_IMM8_AL = op!(0xE6; Out: I/b, AL/b);
    OUT_IMM8_EAX = op!(0xE7; Out: I/b, EAX/d);
    CALL_REL1632 = op!(0xE8; Call: J/v);
    JMP_REL1632 = op!(0xE9; Jmp: J/v);
    JMP_FAR_PTR1632 = op!(0xEA; JmpFar: A/p);
    JMP_REL8 = op!(0xEB; Jmp: J/b);
    IN_AL_DX = op!(0xEC; In: AL/b, DX/w);
    IN_EAX_DX = op!(0xED; In: EAX/d, DX/w);
    OUT_DX_AL = op!(0xEE; Out: DX/w, AL/b);
    OUT_DX_EAX = op!(0xEF; Out: DX/w, EAX/d);

    LOCK = op!(0xF0; Lock);
    INT1 = op!(0xF1; Int1);
    REP = op!(0xF3; Rep);
    HLT = op!(0xF4; Hlt);
    CMC = op!(0xF5; Cmc);
    UNARY_RM8 = op!(0xF6, group;
        [Test: E/b, I/b], [Test: E/b, I/b], [Not: E/b], [Neg: E/b],
        [Mul: E/b], [Imul: E/b], [Div: E/b], [Idiv: E/b]);
    UNARY_RM1632 = op!(0xF7, group;
        [Test: E/v, I/v], [Test: E/v, I/v], [Not: E/v], [Neg: E/v],
        [Mul: E/v], [Imul: E/v], [Div: E/v], [Idiv: E/v]);
    CLC = op!(0xF8; Clc);
    STC = op!(0xF9; Stc);
    CLI = op!(0xFA; Cli);
    STI = op!(0xFB; Sti);
    CLD = op!(0xFC; Cld);
    STD = op!(0xFD; Std);
    INC_DEC_RM8 = op!(0xFE, group; [Inc: E/b], [Dec: E/b]);
    INDIRECT_RM1632 = op!(0xFF, group;
        [Inc: E/v], [Dec: E/v], [Call: E/v], [CallFar: E/p],
        [Jmp: E/v], [JmpFar: E/p], [Push: E/v]);

    JO_REL1632 = op!(0x0F 0x80; Jo: J/v);
    JNO_REL1632 = op!(0x0F 0x81; Jno: J/v);
    JB_REL1632 = op!(0x0F 0x82; Jb: J/v);
    JNB_REL1632 = op!(0x0F 0x83; Jnb: J/v);
    JE_REL1632 = op!(0x0F 0x84; Je: J/v);
    JNE_REL1632 = op!(0x0F 0x85; Jne: J/v);
    JBE_REL1632 = op!(0x0F 0x86; Jbe: J/v);
    JA_REL1632 = op!(0x0F 0x87; Ja: J/v);
    JS_REL1632 = op!(0x0F 0x88; Js: J/v);
    JNS_REL1632 = op!(0x0F 0x89; Jns: J/v);
    JPE_REL1632 = op!(0x0F 0x8A; Jpe: J/v);
    JPO_REL1632 = op!(0x0F 0x8B; Jpo: J/v);
    JL_REL1632 = op!(0x0F 0x8C; Jl: J/v);
    JGE_REL1632 = op!(0x0F 0x8D; Jge: J/v);
    JLE_REL1632 = op!(0x0F 0x8E; Jle: J/v);
    JG_REL1632 = op!(0x0F 0x8F; Jg: J/v);
    BT_RM1632_R1632 = op!(0x0F 0xA3, modrm; Bt: E/v, G/v);
    BTS_RM1632_R1632 = op!(0x0F 0xAB, modrm; Bts: E/v, G/v);
    IMUL_R1632_RM1632 = op!(0x0F 0xAF, modrm; Imul: G/v, E/v);
    CMPXCHG_RM8_R8 = op!(0x0F 0xB0, modrm; Cmpxchg: E/b, G/b);
    CMPXCHG_RM1632_R1632 = op!(0x0F 0xB1, modrm; Cmpxchg: E/v, G/v);
    BTR_RM1632_R1632 = op!(0x0F 0xB3, modrm; Btr: E/v, G/v);
    MOVZX_R1632_RM8 = op!(0x0F 0xB6, modrm; Movzx: G/v, E/b);
    MOVZX_R1632_RM16 = op!(0x0F 0xB7, modrm; Movzx: G/v, E/w);
    BTC_RM1632_R1632 = op!(0x0F 0xBB, modrm; Btc: E/v, G/v);
    BSF_R1632_RM1632 = op!(0x0F 0xBC, modrm; Bsf: G/v, E/v);
    BSR_R1632_RM1632 = op!(0x0F 0xBD, modrm; Bsr: G/v, E/v);
    MOVSX_R1632_RM8 = op!(0x0F 0xBE, modrm; Movsx: G/v, E/b);
    MOVSX_R1632_RM16 = op!(0x0F 0xBF, modrm; Movsx: G/v, E/w);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn no_two_definitions_share_a_slot() {
        let mut seen = HashSet::new();
        for op in ALL {
            assert!(seen.insert(op.code()), "duplicate slot {}", op);
        }
    }

    #[test]
    fn macro_shapes() {
        assert_eq!(ADD_RM8_R8.op1, 0x00);
        assert!(ADD_RM8_R8.has_register_token);
        assert!(!ADD_RM8_R8.has_opcode_modifier);
        assert_eq!(
            ADD_RM8_R8.forms[0].operand1.method,
            AddressingMethod::RegisterOrMemoryAddress
        );
        assert_eq!(ADD_RM8_R8.forms[0].operand2.method, AddressingMethod::Register);

        assert!(!NOP.has_register_token);
        assert!(NOP.forms[0].operand1.is_none());

        assert!(MOVZX_R1632_RM16.is_two_byte());
        assert_eq!(MOVZX_R1632_RM16.code(), 0x0FB7);
        assert_eq!(MOVZX_R1632_RM16.forms[0].operand2.size, OperandSize::Word);

        assert!(INDIRECT_RM1632.has_opcode_modifier);
        assert_eq!(INDIRECT_RM1632.forms.len(), 7);
        assert_eq!(INDIRECT_RM1632.forms[5].mnemonic, Mnemonic::JmpFar);
        assert_eq!(INDIRECT_RM1632.forms[5].operand1.size, OperandSize::Fword);
    }

    #[test]
    fn segment_push_pop_take_no_modrm() {
        for op in &[PUSH_ES, POP_ES, PUSH_CS, PUSH_SS, POP_SS, PUSH_DS, POP_DS] {
            assert!(!op.has_register_token, "{}", op);
            assert!(op.forms[0].operand1.is_none());
        }
    }

    #[test]
    fn string_io_takes_no_immediate() {
        for op in &[INSB, INSD, OUTSB, OUTSD] {
            assert!(op.forms[0].operand1.is_none(), "{}", op);
        }
    }
}
