//! A deliberately-scoped x86_64 decoder.
//!
//! This does not attempt to be a complete x86_64 disassembler — it
//! recognizes the instruction families that actually appear in the
//! patterns this crate looks for (direct `syscall`, the immediate-move
//! and self-xor idioms that set up a syscall number, the control-flow
//! opcodes that bound a backward scan, and `CALL` for the wrapper
//! resolver) plus enough of the common ALU/MOV/stack opcode space that
//! a backward scan resynchronizes quickly on ordinary compiler output.
//! Anything outside that set decodes as a failure; Pass 1 and the
//! wrapper scan already tolerate decode failures by advancing one byte
//! and resynchronizing (spec §4.6), so this narrower opcode table does
//! not change correctness of syscall-site discovery, only how often
//! `decode_stats.failure_count` ticks up.

use super::{DecodedInstruction, DecodeError, InstructionDecoder, Opcode, Operand, OperandSize, Register};

/// Real x86_64 instructions never exceed 15 bytes.
const MAX_INSTRUCTION_LEN: usize = 15;

#[derive(Debug, Clone, Copy, Default)]
struct Rex {
    present: bool,
    w: bool,
    r: bool,
    x: bool,
    b: bool,
}

struct ModRm {
    reg: u8,
    rm_is_reg: bool,
    rm_reg_code: u8,
    total_len: usize,
}

fn parse_modrm(bytes: &[u8]) -> Option<ModRm> {
    let b = *bytes.first()?;
    let md = b >> 6;
    let reg = (b >> 3) & 0x7;
    let rm = b & 0x7;
    let mut len = 1usize;

    if md == 3 {
        return Some(ModRm {
            reg,
            rm_is_reg: true,
            rm_reg_code: rm,
            total_len: len,
        });
    }

    let mut sib_base_is_5 = false;
    if rm == 4 {
        let sib = *bytes.get(len)?;
        sib_base_is_5 = sib & 0x7 == 5;
        len += 1;
    }

    let disp_len = match md {
        0 => {
            if rm == 5 || (rm == 4 && sib_base_is_5) {
                4 // RIP-relative (no SIB) or base-less SIB
            } else {
                0
            }
        }
        1 => 1,
        2 => 4,
        _ => 0,
    };
    len += disp_len;

    if bytes.len() < len {
        return None;
    }

    Some(ModRm {
        reg,
        rm_is_reg: false,
        rm_reg_code: 0,
        total_len: len,
    })
}

fn accumulator_or_other(code: u8, size: OperandSize) -> Register {
    if code == 0 {
        match size {
            OperandSize::Byte => Register::Al,
            OperandSize::Word => Register::Ax,
            OperandSize::Dword => Register::Eax,
            OperandSize::Qword => Register::Rax,
        }
    } else {
        Register::Other { code, size }
    }
}

fn full_size(rex: Rex, operand_size_override: bool) -> OperandSize {
    if rex.w {
        OperandSize::Qword
    } else if operand_size_override {
        OperandSize::Word
    } else {
        OperandSize::Dword
    }
}

/// Decodes the generic two-operand `{Eb,Gb}/{Ev,Gv}/{Gb,Eb}/{Gv,Ev}`
/// family shared by MOV, the eight ALU opcodes, and TEST. `low2` is the
/// low two bits of the opcode byte: bit0 selects byte vs full operand
/// size, bit1 selects which operand is the destination.
fn decode_two_operand(
    low2: u8,
    rex: Rex,
    operand_size_override: bool,
    rest: &[u8],
) -> Option<(Vec<Operand>, usize)> {
    let dest_is_reg = low2 & 0b10 != 0;
    let byte_size = low2 & 0b01 == 0;
    let size = if byte_size {
        OperandSize::Byte
    } else {
        full_size(rex, operand_size_override)
    };

    let modrm = parse_modrm(rest)?;
    let reg_code = modrm.reg | if rex.r { 8 } else { 0 };
    let reg_operand = Operand::Register(accumulator_or_other(reg_code, size));

    let rm_operand = if modrm.rm_is_reg {
        let rm_code = modrm.rm_reg_code | if rex.b { 8 } else { 0 };
        Operand::Register(accumulator_or_other(rm_code, size))
    } else {
        Operand::Memory
    };

    let operands = if dest_is_reg {
        vec![reg_operand, rm_operand]
    } else {
        vec![rm_operand, reg_operand]
    };
    Some((operands, modrm.total_len))
}

fn read_i32_le(bytes: &[u8]) -> Option<i32> {
    let arr: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(i32::from_le_bytes(arr))
}

fn read_i64_le(bytes: &[u8]) -> Option<i64> {
    let arr: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(i64::from_le_bytes(arr))
}

fn decode_one(bytes: &[u8], va: u64) -> Result<DecodedInstruction, DecodeError> {
    let mut pos = 0usize;
    let mut operand_size_override = false;
    let mut rex = Rex::default();

    // Legacy prefixes we recognize (segment overrides, address-size,
    // lock, repeat) are skipped but otherwise ignored; at most a
    // handful can legally precede an opcode.
    for _ in 0..4 {
        match bytes.get(pos) {
            Some(0x66) => {
                operand_size_override = true;
                pos += 1;
            }
            Some(0x67) | Some(0xF0) | Some(0xF2) | Some(0xF3) | Some(0x2E) | Some(0x36)
            | Some(0x3E) | Some(0x26) | Some(0x64) | Some(0x65) => {
                pos += 1;
            }
            _ => break,
        }
    }
    if let Some(&b) = bytes.get(pos) {
        if (0x40..=0x4F).contains(&b) {
            rex = Rex {
                present: true,
                w: b & 0x08 != 0,
                r: b & 0x04 != 0,
                x: b & 0x02 != 0,
                b: b & 0x01 != 0,
            };
            pos += 1;
        }
    }
    let _ = rex.x; // SIB index extension not needed without address resolution

    let opcode_byte = *bytes.get(pos).ok_or(DecodeError {
        reason: "truncated (no opcode byte)",
    })?;
    let opcode_pos = pos;
    pos += 1;

    let (opcode, operands, extra_len): (Opcode, Vec<Operand>, usize) = match opcode_byte {
        0x0F => {
            let b2 = *bytes.get(pos).ok_or(DecodeError {
                reason: "truncated (0F escape)",
            })?;
            match b2 {
                0x05 => (Opcode::Syscall, vec![], 1),
                0x80..=0x8F => {
                    let imm = read_i32_le(bytes.get(pos + 1..).ok_or(DecodeError {
                        reason: "truncated (Jcc rel32)",
                    })?)
                    .ok_or(DecodeError {
                        reason: "truncated (Jcc rel32)",
                    })?;
                    (Opcode::Jcc, vec![Operand::Immediate(imm as i64)], 1 + 4)
                }
                0x1F => {
                    // multi-byte NOP: 0F 1F /0
                    let modrm = parse_modrm(bytes.get(pos + 1..).ok_or(DecodeError {
                        reason: "truncated (multi-byte nop)",
                    })?)
                    .ok_or(DecodeError {
                        reason: "truncated (multi-byte nop modrm)",
                    })?;
                    (Opcode::Nop, vec![], 1 + modrm.total_len)
                }
                _ => {
                    return Err(DecodeError {
                        reason: "unsupported 0F opcode",
                    })
                }
            }
        }
        0x00..=0x03 | 0x08..=0x0B | 0x10..=0x13 | 0x18..=0x1B | 0x20..=0x23 | 0x28..=0x2B
        | 0x30..=0x33 | 0x38..=0x3B | 0x84 | 0x85 | 0x88..=0x8B => {
            let mnemonic = match opcode_byte & 0xF8 {
                0x00 => Opcode::Add,
                0x08 => Opcode::Or,
                0x10 => Opcode::Adc,
                0x18 => Opcode::Sbb,
                0x20 => Opcode::And,
                0x28 => Opcode::Sub,
                0x30 => Opcode::Xor,
                0x38 => Opcode::Cmp,
                0x80 => Opcode::Test,
                0x88 => Opcode::Mov,
                _ => {
                    return Err(DecodeError {
                        reason: "unreachable opcode group",
                    })
                }
            };
            let (operands, modrm_len) =
                decode_two_operand(opcode_byte & 0x3, rex, operand_size_override, &bytes[pos..])
                    .ok_or(DecodeError {
                        reason: "truncated (modrm two-operand)",
                    })?;
            (mnemonic, operands, modrm_len)
        }
        0x8D => {
            // LEA Gv, M
            let (operands, modrm_len) =
                decode_two_operand(0b11, rex, operand_size_override, &bytes[pos..]).ok_or(
                    DecodeError {
                        reason: "truncated (lea modrm)",
                    },
                )?;
            (Opcode::Lea, operands, modrm_len)
        }
        0x80 | 0x81 | 0x83 => {
            // Group 1: ALU Eb/Ev, imm8/imm32 — /reg selects the ALU op.
            let modrm = parse_modrm(&bytes[pos..]).ok_or(DecodeError {
                reason: "truncated (group1 modrm)",
            })?;
            let mnemonic = match modrm.reg {
                0 => Opcode::Add,
                1 => Opcode::Or,
                2 => Opcode::Adc,
                3 => Opcode::Sbb,
                4 => Opcode::And,
                5 => Opcode::Sub,
                6 => Opcode::Xor,
                _ => Opcode::Cmp,
            };
            let size = if opcode_byte == 0x80 {
                OperandSize::Byte
            } else {
                full_size(rex, operand_size_override)
            };
            let rm_operand = if modrm.rm_is_reg {
                let rm_code = modrm.rm_reg_code | if rex.b { 8 } else { 0 };
                Operand::Register(accumulator_or_other(rm_code, size))
            } else {
                Operand::Memory
            };
            let imm_start = pos + modrm.total_len;
            let imm_len = if opcode_byte == 0x81 { 4 } else { 1 };
            let imm = if imm_len == 4 {
                read_i32_le(bytes.get(imm_start..).ok_or(DecodeError {
                    reason: "truncated (group1 imm32)",
                })?)
                .ok_or(DecodeError {
                    reason: "truncated (group1 imm32)",
                })? as i64
            } else {
                *bytes.get(imm_start).ok_or(DecodeError {
                    reason: "truncated (group1 imm8)",
                })? as i8 as i64
            };
            (
                mnemonic,
                vec![rm_operand, Operand::Immediate(imm)],
                modrm.total_len + imm_len,
            )
        }
        0xB0..=0xB7 => {
            let code = (opcode_byte - 0xB0) | if rex.b { 8 } else { 0 };
            let imm = *bytes.get(pos).ok_or(DecodeError {
                reason: "truncated (mov r8, imm8)",
            })? as i64;
            (
                Opcode::Mov,
                vec![
                    Operand::Register(accumulator_or_other(code, OperandSize::Byte)),
                    Operand::Immediate(imm),
                ],
                1,
            )
        }
        0xB8..=0xBF => {
            let code = (opcode_byte - 0xB8) | if rex.b { 8 } else { 0 };
            let size = full_size(rex, operand_size_override);
            let (imm, imm_len) = match size {
                OperandSize::Qword => (
                    read_i64_le(bytes.get(pos..).ok_or(DecodeError {
                        reason: "truncated (mov r64, imm64)",
                    })?)
                    .ok_or(DecodeError {
                        reason: "truncated (mov r64, imm64)",
                    })?,
                    8,
                ),
                OperandSize::Word => {
                    let arr: [u8; 2] = bytes
                        .get(pos..pos + 2)
                        .ok_or(DecodeError {
                            reason: "truncated (mov r16, imm16)",
                        })?
                        .try_into()
                        .map_err(|_| DecodeError {
                            reason: "truncated (mov r16, imm16)",
                        })?;
                    (i16::from_le_bytes(arr) as i64, 2)
                }
                _ => (
                    read_i32_le(bytes.get(pos..).ok_or(DecodeError {
                        reason: "truncated (mov r32, imm32)",
                    })?)
                    .ok_or(DecodeError {
                        reason: "truncated (mov r32, imm32)",
                    })? as i64,
                    4,
                ),
            };
            (
                Opcode::Mov,
                vec![
                    Operand::Register(accumulator_or_other(code, size)),
                    Operand::Immediate(imm),
                ],
                imm_len,
            )
        }
        0xC6 => {
            let modrm = parse_modrm(&bytes[pos..]).ok_or(DecodeError {
                reason: "truncated (C6 modrm)",
            })?;
            if modrm.reg != 0 {
                return Err(DecodeError {
                    reason: "unsupported C6 /reg (not MOV)",
                });
            }
            let imm_start = pos + modrm.total_len;
            let imm = *bytes.get(imm_start).ok_or(DecodeError {
                reason: "truncated (C6 imm8)",
            })? as i64;
            let rm_operand = if modrm.rm_is_reg {
                let rm_code = modrm.rm_reg_code | if rex.b { 8 } else { 0 };
                Operand::Register(accumulator_or_other(rm_code, OperandSize::Byte))
            } else {
                Operand::Memory
            };
            (
                Opcode::Mov,
                vec![rm_operand, Operand::Immediate(imm)],
                modrm.total_len + 1,
            )
        }
        0xC7 => {
            let modrm = parse_modrm(&bytes[pos..]).ok_or(DecodeError {
                reason: "truncated (C7 modrm)",
            })?;
            if modrm.reg != 0 {
                return Err(DecodeError {
                    reason: "unsupported C7 /reg (not MOV)",
                });
            }
            let size = full_size(rex, operand_size_override);
            let imm_start = pos + modrm.total_len;
            let imm = read_i32_le(bytes.get(imm_start..).ok_or(DecodeError {
                reason: "truncated (C7 imm32)",
            })?)
            .ok_or(DecodeError {
                reason: "truncated (C7 imm32)",
            })? as i64;
            let rm_operand = if modrm.rm_is_reg {
                let rm_code = modrm.rm_reg_code | if rex.b { 8 } else { 0 };
                Operand::Register(accumulator_or_other(rm_code, size))
            } else {
                Operand::Memory
            };
            (
                Opcode::Mov,
                vec![rm_operand, Operand::Immediate(imm)],
                modrm.total_len + 4,
            )
        }
        0x50..=0x57 => {
            let code = (opcode_byte - 0x50) | if rex.b { 8 } else { 0 };
            (
                Opcode::Push,
                vec![
                    Operand::Memory,
                    Operand::Register(accumulator_or_other(code, OperandSize::Qword)),
                ],
                0,
            )
        }
        0x58..=0x5F => {
            let code = (opcode_byte - 0x58) | if rex.b { 8 } else { 0 };
            (
                Opcode::Pop,
                vec![Operand::Register(accumulator_or_other(
                    code,
                    OperandSize::Qword,
                ))],
                0,
            )
        }
        0x90 => (Opcode::Nop, vec![], 0),
        0xE8 => {
            let imm = read_i32_le(bytes.get(pos..).ok_or(DecodeError {
                reason: "truncated (call rel32)",
            })?)
            .ok_or(DecodeError {
                reason: "truncated (call rel32)",
            })?;
            (Opcode::Call, vec![Operand::Immediate(imm as i64)], 4)
        }
        0xE9 => {
            let imm = read_i32_le(bytes.get(pos..).ok_or(DecodeError {
                reason: "truncated (jmp rel32)",
            })?)
            .ok_or(DecodeError {
                reason: "truncated (jmp rel32)",
            })?;
            (Opcode::Jmp, vec![Operand::Immediate(imm as i64)], 4)
        }
        0xEB => {
            let imm = *bytes.get(pos).ok_or(DecodeError {
                reason: "truncated (jmp rel8)",
            })? as i8 as i64;
            (Opcode::Jmp, vec![Operand::Immediate(imm)], 1)
        }
        0x70..=0x7F => {
            let imm = *bytes.get(pos).ok_or(DecodeError {
                reason: "truncated (jcc rel8)",
            })? as i8 as i64;
            (Opcode::Jcc, vec![Operand::Immediate(imm)], 1)
        }
        0xE0 | 0xE1 | 0xE2 => {
            let imm = *bytes.get(pos).ok_or(DecodeError {
                reason: "truncated (loop rel8)",
            })? as i8 as i64;
            (Opcode::Loop, vec![Operand::Immediate(imm)], 1)
        }
        0xE3 => {
            let imm = *bytes.get(pos).ok_or(DecodeError {
                reason: "truncated (jcxz rel8)",
            })? as i8 as i64;
            (Opcode::JcxzEcxzRcxz, vec![Operand::Immediate(imm)], 1)
        }
        0xC3 => (Opcode::Ret, vec![], 0),
        0xC2 => {
            let arr: [u8; 2] = bytes
                .get(pos..pos + 2)
                .ok_or(DecodeError {
                    reason: "truncated (ret imm16)",
                })?
                .try_into()
                .map_err(|_| DecodeError {
                    reason: "truncated (ret imm16)",
                })?;
            (
                Opcode::Ret,
                vec![Operand::Immediate(u16::from_le_bytes(arr) as i64)],
                2,
            )
        }
        0xCC => (Opcode::Int, vec![Operand::Immediate(3)], 0),
        0xCD => {
            let imm = *bytes.get(pos).ok_or(DecodeError {
                reason: "truncated (int imm8)",
            })? as i64;
            (Opcode::Int, vec![Operand::Immediate(imm)], 1)
        }
        0xCF => (Opcode::Iret, vec![], 0),
        _ => {
            return Err(DecodeError {
                reason: "unsupported opcode",
            })
        }
    };

    let total_len = pos + extra_len;
    if total_len > MAX_INSTRUCTION_LEN || total_len > bytes.len() {
        return Err(DecodeError {
            reason: "decoded length exceeds available bytes",
        });
    }
    let _ = opcode_pos;

    Ok(DecodedInstruction {
        va,
        length: total_len as i64,
        opcode,
        operands,
        bytes: bytes[..total_len].to_vec(),
    })
}

/// The real x86_64 decoder (spec §4.1).
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Decoder;

impl X86Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl InstructionDecoder for X86Decoder {
    fn decode(&self, bytes: &[u8], va: u64) -> Result<DecodedInstruction, DecodeError> {
        decode_one(bytes, va)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_syscall() {
        let inst = decode_one(&[0x0F, 0x05], 0x1000).unwrap();
        assert_eq!(inst.length, 2);
        assert!(inst.is_syscall());
    }

    #[test]
    fn decodes_mov_eax_immediate() {
        // mov eax, 0x29 ; socket
        let inst = decode_one(&[0xB8, 0x29, 0x00, 0x00, 0x00], 0x1000).unwrap();
        assert_eq!(inst.length, 5);
        let (is_imm, value) = inst.is_immediate_move();
        assert!(is_imm);
        assert_eq!(value, 41);
    }

    #[test]
    fn decodes_mov_reg_reg_as_indirect() {
        // mov eax, ebx (89 d8)
        let inst = decode_one(&[0x89, 0xD8], 0x1000).unwrap();
        assert_eq!(inst.length, 2);
        assert!(inst.modifies_eax_or_rax());
        let (is_imm, _) = inst.is_immediate_move();
        assert!(!is_imm);
    }

    #[test]
    fn decodes_xor_self_zeroing() {
        let inst = decode_one(&[0x31, 0xC0], 0x1000).unwrap();
        let (is_imm, value) = inst.is_immediate_move();
        assert!(is_imm);
        assert_eq!(value, 0);
    }

    #[test]
    fn decodes_call_rel32() {
        let inst = decode_one(&[0xE8, 0xF6, 0x0F, 0x00, 0x00], 0x401005).unwrap();
        assert_eq!(inst.length, 5);
        assert!(inst.is_control_flow());
        assert_eq!(inst.operands[0], Operand::Immediate(0x0FF6));
    }

    #[test]
    fn decodes_unconditional_jmp_as_control_flow() {
        let inst = decode_one(&[0xEB, 0x05], 0x1000).unwrap();
        assert!(inst.is_control_flow());
    }

    #[test]
    fn unsupported_opcode_is_a_decode_failure() {
        // 0x0F 0xFF is not in our supported two-byte table.
        assert!(decode_one(&[0x0F, 0xFF], 0x1000).is_err());
    }

    #[test]
    fn decoding_is_pure() {
        let bytes = [0xB8, 0x29, 0x00, 0x00, 0x00];
        let a = decode_one(&bytes, 0x2000).unwrap();
        let b = decode_one(&bytes, 0x2000).unwrap();
        assert_eq!(a, b);
    }
}
