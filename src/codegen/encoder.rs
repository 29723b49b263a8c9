//! Instruction encoder/decoder (component Q): the x86-64 opcode table and
//! the REX/ModRM/SIB-aware decode path the machine-code builder (R) and the
//! disassembler share

use lazy_static::lazy_static;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("instruction stream truncated while reading {0}")]
    Truncated(&'static str),
    #[error("opcode byte {0:#04x} has no table entry")]
    UnknownOpcode(u8),
    #[error("two-byte opcode 0F {0:#04x} has no table entry")]
    UnknownTwoByteOpcode(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Dword,
    Qword,
}

/// Integer register numbers 0..15 (REX extends ModRM's 3-bit fields to 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Register(pub u8);

const GPR64_NAMES: [&str; 16] = [
    "RAX", "RCX", "RDX", "RBX", "RSP", "RBP", "RSI", "RDI", "R8", "R9", "R10", "R11", "R12", "R13",
    "R14", "R15",
];
const GPR8_NAMES: [&str; 16] = [
    "AL", "CL", "DL", "BL", "SPL", "BPL", "SIL", "DIL", "R8B", "R9B", "R10B", "R11B", "R12B",
    "R13B", "R14B", "R15B",
];

impl Register {
    pub fn name(self, width: Width) -> &'static str {
        match width {
            Width::Byte => GPR8_NAMES[self.0 as usize],
            _ => GPR64_NAMES[self.0 as usize],
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MemOperand {
    pub base: Option<Register>,
    pub disp: i32,
    /// RIP-relative: `base` is `None` and this is set.
    pub rip_relative: bool,
}

#[derive(Clone, Copy, Debug)]
pub enum Operand {
    Reg(Register, Width),
    Mem(MemOperand, Width),
    Imm(i64),
    Rel(i32),
}

#[derive(Clone, Debug)]
pub struct DecodedInstruction {
    pub mnemonic: &'static str,
    pub operands: Vec<Operand>,
    pub length: usize,
    /// Byte offset of the displacement/immediate field, if this instruction
    /// carries one a later patch pass (R's `SetCodeOffset`/`SetInt32`) might
    /// rewrite.
    pub patchable_offset: Option<usize>,
}

impl std::fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            write!(f, "{}", if i == 0 { " " } else { ", " })?;
            match op {
                Operand::Reg(r, w) => write!(f, "{}", r.name(*w))?,
                Operand::Mem(m, _) => {
                    if m.rip_relative {
                        write!(f, "RIP+{}", m.disp)?;
                    } else if let Some(b) = m.base {
                        if m.disp == 0 {
                            write!(f, "[{}]", b.name(Width::Qword))?;
                        } else {
                            write!(f, "[{}+{}]", b.name(Width::Qword), m.disp)?;
                        }
                    } else {
                        write!(f, "[{}]", m.disp)?;
                    }
                }
                Operand::Imm(v) => write!(f, "{v}")?,
                Operand::Rel(v) => write!(f, "RIP+{v}")?,
            }
        }
        Ok(())
    }
}

#[derive(Default, Clone, Copy)]
struct Rex {
    present: bool,
    w: bool,
    r: bool,
    x: bool,
    b: bool,
}

fn is_legacy_prefix(b: u8) -> bool {
    matches!(b, 0x66 | 0x67 | 0xF0 | 0xF2 | 0xF3 | 0x2E | 0x36 | 0x3E | 0x26 | 0x64 | 0x65)
}

struct ModRm {
    mod_: u8,
    reg: u8,
    rm: u8,
    /// Decoded memory operand, or `None` when `mod_ == 0b11` (register-direct).
    mem: Option<MemOperand>,
    bytes_consumed: usize,
}

fn decode_modrm(bytes: &[u8], rex: Rex) -> Result<ModRm, DecodeError> {
    let modrm = *bytes.first().ok_or(DecodeError::Truncated("ModRM"))?;
    let mode = modrm >> 6;
    let reg = ((modrm >> 3) & 0b111) | (if rex.r { 0b1000 } else { 0 });
    let rm_field = modrm & 0b111;
    let rm = rm_field | (if rex.b { 0b1000 } else { 0 });

    let mut consumed = 1usize;
    if mode == 0b11 {
        return Ok(ModRm { mod_: mode, reg, rm, mem: None, bytes_consumed: consumed });
    }

    // SIB byte: present whenever rm field (pre-REX.B) is 0b100 and not
    // register-direct. A plain base/disp scheme is enough for this core's
    // operand forms; the full scale/index table is not exercised here.
    let (base, has_sib) = if rm_field == 0b100 {
        let sib = *bytes.get(consumed).ok_or(DecodeError::Truncated("SIB"))?;
        consumed += 1;
        let base_field = (sib & 0b111) | (if rex.b { 0b1000 } else { 0 });
        (Some(Register(base_field)), true)
    } else {
        (Some(Register(rm)), false)
    };

    let rip_relative = mode == 0b00 && rm_field == 0b101 && !has_sib;
    let (base, disp) = if rip_relative {
        let d = i32::from_le_bytes(
            bytes[consumed..consumed + 4]
                .try_into()
                .map_err(|_| DecodeError::Truncated("rip disp32"))?,
        );
        consumed += 4;
        (None, d)
    } else {
        match mode {
            0b00 => (base, 0),
            0b01 => {
                let d = *bytes.get(consumed).ok_or(DecodeError::Truncated("disp8"))? as i8 as i32;
                consumed += 1;
                (base, d)
            }
            0b10 => {
                let d = i32::from_le_bytes(
                    bytes[consumed..consumed + 4]
                        .try_into()
                        .map_err(|_| DecodeError::Truncated("disp32"))?,
                );
                consumed += 4;
                (base, d)
            }
            _ => unreachable!(),
        }
    };

    Ok(ModRm {
        mod_: mode,
        reg,
        rm,
        mem: Some(MemOperand { base, disp, rip_relative }),
        bytes_consumed: consumed,
    })
}

const JCC_MNEMONICS: [&str; 16] = [
    "JO", "JNO", "JB", "JAE", "JE", "JNE", "JBE", "JA", "JS", "JNS", "JP", "JNP", "JL", "JGE",
    "JLE", "JG",
];

/// Decodes one instruction from the front of `bytes`. Recognizes the
/// opcode-table subset this core's emitter produces: MOV Eb/Gb, MOV
/// r/m-imm32 (opcode-extension /0), and the two-byte Jcc rel32 family.
pub fn decode(bytes: &[u8]) -> Result<DecodedInstruction, DecodeError> {
    let mut pos = 0usize;
    while bytes.get(pos).copied().is_some_and(is_legacy_prefix) {
        pos += 1;
    }

    let mut rex = Rex::default();
    if let Some(&b) = bytes.get(pos) {
        if (0x40..=0x4F).contains(&b) {
            rex = Rex {
                present: true,
                w: b & 0b1000 != 0,
                r: b & 0b0100 != 0,
                x: b & 0b0010 != 0,
                b: b & 0b0001 != 0,
            };
            pos += 1;
        }
    }

    let opcode = *bytes.get(pos).ok_or(DecodeError::Truncated("opcode"))?;
    pos += 1;

    if opcode == 0x0F {
        let op2 = *bytes.get(pos).ok_or(DecodeError::Truncated("two-byte opcode"))?;
        pos += 1;
        if (0x80..=0x8F).contains(&op2) {
            let disp_off = pos;
            let rel = i32::from_le_bytes(
                bytes[pos..pos + 4].try_into().map_err(|_| DecodeError::Truncated("rel32"))?,
            );
            pos += 4;
            return Ok(DecodedInstruction {
                mnemonic: JCC_MNEMONICS[(op2 - 0x80) as usize],
                operands: vec![Operand::Rel(rel)],
                length: pos,
                patchable_offset: Some(disp_off),
            });
        }
        return Err(DecodeError::UnknownTwoByteOpcode(op2));
    }

    match opcode {
        0x88 => {
            // MOV Eb, Gb
            let m = decode_modrm(&bytes[pos..], rex)?;
            pos += m.bytes_consumed;
            let reg_operand = Operand::Reg(Register(m.reg), Width::Byte);
            let rm_operand = match m.mem {
                Some(mem) => Operand::Mem(mem, Width::Byte),
                None => Operand::Reg(Register(m.rm), Width::Byte),
            };
            Ok(DecodedInstruction {
                mnemonic: "MOV",
                operands: vec![rm_operand, reg_operand],
                length: pos,
                patchable_offset: None,
            })
        }
        0xC7 => {
            // MOV Ev, Iz (opcode-extension /0).
            let m = decode_modrm(&bytes[pos..], rex)?;
            pos += m.bytes_consumed;
            if m.reg & 0b111 != 0 {
                return Err(DecodeError::UnknownOpcode(opcode));
            }
            let width = if rex.w { Width::Qword } else { Width::Dword };
            let rm_operand = match m.mem {
                Some(mem) => Operand::Mem(mem, width),
                None => Operand::Reg(Register(m.rm), width),
            };
            let imm_off = pos;
            let imm = i32::from_le_bytes(
                bytes[pos..pos + 4].try_into().map_err(|_| DecodeError::Truncated("imm32"))?,
            );
            pos += 4;
            Ok(DecodedInstruction {
                mnemonic: "MOV",
                operands: vec![rm_operand, Operand::Imm(imm as i64)],
                length: pos,
                patchable_offset: Some(imm_off),
            })
        }
        other => Err(DecodeError::UnknownOpcode(other)),
    }
}

fn modrm_byte(mode: u8, reg: u8, rm: u8) -> u8 {
    (mode << 6) | ((reg & 0b111) << 3) | (rm & 0b111)
}

fn rex_byte(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | ((w as u8) << 3) | ((r as u8) << 2) | ((x as u8) << 1) | (b as u8)
}

/// Encodes `MOV [base+disp], src` (Eb, Gb), choosing Disp8 over Disp32 when
/// `disp` fits the shorter form.
pub fn encode_mov_mem8_reg8(base: Register, disp: i32, src: Register) -> Vec<u8> {
    let mut out = vec![0x88u8];
    if disp == 0 && base.0 & 0b111 != 0b101 {
        out.push(modrm_byte(0b00, src.0, base.0));
    } else if let Ok(d8) = i8::try_from(disp) {
        out.push(modrm_byte(0b01, src.0, base.0));
        out.push(d8 as u8);
    } else {
        out.push(modrm_byte(0b10, src.0, base.0));
        out.extend_from_slice(&disp.to_le_bytes());
    }
    out
}

/// Encodes `MOV dst, imm32` sign-extended to 64 bits (opcode `C7 /0`).
pub fn encode_mov_reg64_imm32(dst: Register, imm: i32) -> Vec<u8> {
    let mut out = vec![rex_byte(true, false, false, dst.0 & 0b1000 != 0)];
    out.push(0xC7);
    out.push(modrm_byte(0b11, 0, dst.0));
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// Condition codes for the two-byte `Jcc rel32` family, indexed the same
/// way as the opcode's low nibble (`0F 8x`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Condition {
    Overflow = 0x0,
    NotOverflow = 0x1,
    Below = 0x2,
    AboveOrEqual = 0x3,
    Equal = 0x4,
    NotEqual = 0x5,
    BelowOrEqual = 0x6,
    Above = 0x7,
    Sign = 0x8,
    NotSign = 0x9,
    Parity = 0xA,
    NotParity = 0xB,
    Less = 0xC,
    GreaterOrEqual = 0xD,
    LessOrEqual = 0xE,
    Greater = 0xF,
}

/// Encodes `Jcc rel32`. Returns the offset of the displacement field so a
/// caller (the builder's `SetCodeOffset`) can patch it once block layout is
/// known.
pub fn encode_jcc_rel32(cond: Condition, rel: i32) -> (Vec<u8>, usize) {
    let mut out = vec![0x0Fu8, 0x80 | cond as u8];
    let disp_offset = out.len();
    out.extend_from_slice(&rel.to_le_bytes());
    (out, disp_offset)
}

lazy_static! {
    /// Reverse lookup from a Jcc mnemonic back to its `Condition`, built once
    /// from `JCC_MNEMONICS` for the disassembler's textual-input callers.
    static ref CONDITION_BY_MNEMONIC: HashMap<&'static str, Condition> = {
        let conds = [
            Condition::Overflow,
            Condition::NotOverflow,
            Condition::Below,
            Condition::AboveOrEqual,
            Condition::Equal,
            Condition::NotEqual,
            Condition::BelowOrEqual,
            Condition::Above,
            Condition::Sign,
            Condition::NotSign,
            Condition::Parity,
            Condition::NotParity,
            Condition::Less,
            Condition::GreaterOrEqual,
            Condition::LessOrEqual,
            Condition::Greater,
        ];
        JCC_MNEMONICS.iter().copied().zip(conds).collect()
    };
}

/// Looks up the `Condition` a Jcc mnemonic (e.g. `"JB"`) encodes to.
pub fn condition_from_mnemonic(mnemonic: &str) -> Option<Condition> {
    CONDITION_BY_MNEMONIC.get(mnemonic).copied()
}
