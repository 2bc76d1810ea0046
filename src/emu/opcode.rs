use crate::u4;

/// A decoded CHIP-8 instruction.
///
/// The fields (x, y, n, nn, nnn) correspond to the operands encoded in the
/// 16-bit instruction word.
#[derive(Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 1NNN - Jump to address NNN.
    Jump { nnn: u16 },
    /// BNNN - Jump to address NNN + V0.
    JumpWithOffset { nnn: u16 },

    /// 2NNN - Call subroutine at NNN.
    Call { nnn: u16 },
    /// 00EE - Return from a subroutine.
    Return,

    /// 3XNN - Skip next instruction if Vx == NN.
    SkipRegEqualImm { x: u4, nn: u8 },
    /// 4XNN - Skip next instruction if Vx != NN.
    SkipRegNotEqualImm { x: u4, nn: u8 },
    /// 5XY0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9XY0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6XNN - Set Vx = NN.
    SetRegImm { x: u4, nn: u8 },
    /// 7XNN - Set Vx = Vx + NN (mod 256, no flag).
    AddRegImm { x: u4, nn: u8 },
    /// ANNN - Set I = NNN.
    SetIndexImm { nnn: u16 },
    /// FX1E - Set I = I + Vx (12-bit wraparound).
    AddIndexReg { x: u4 },

    /// 8XYn - Register-register ALU operation.
    Alu { x: u4, y: u4, op: AluOp },
    /// CXNN - Set Vx = random byte AND NN.
    Random { x: u4, nn: u8 },

    /// 00E0 - Clear the display.
    ClearDisplay,
    /// DXYN - Draw an N-byte sprite from I at (Vx, Vy).
    Draw { x: u4, y: u4, n: u4 },

    /// EX9E - Skip next instruction if key Vx is pressed.
    SkipIfPressed { x: u4 },
    /// EXA1 - Skip next instruction if key Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// FX0A - Block until a key is pressed, then set Vx to that key.
    WaitForKey { x: u4 },

    /// FX07 - Set Vx = delay timer.
    ReadDelayTimer { x: u4 },
    /// FX15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// FX18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },

    /// FX29 - Set I = address of the font glyph for digit Vx.
    FontChar { x: u4 },
    /// FX33 - Store the BCD digits of Vx at I, I+1, I+2.
    Bcd { x: u4 },

    /// FX55 - Store V0..=Vx into memory starting at I.
    StoreRegs { x: u4 },
    /// FX65 - Load V0..=Vx from memory starting at I.
    LoadRegs { x: u4 },

    /// The instruction word matched no known encoding.
    Invalid(u16),
}

/// Operations selectable by the low nibble of an 8XYn instruction.
#[derive(Debug, PartialEq, Eq)]
pub enum AluOp {
    /// 8XY0 - Vx = Vy
    Assign,
    /// 8XY1 - Vx |= Vy
    Or,
    /// 8XY2 - Vx &= Vy
    And,
    /// 8XY3 - Vx ^= Vy
    Xor,
    /// 8XY4 - Vx += Vy, VF = carry
    Add,
    /// 8XY5 - Vx -= Vy, VF = NOT borrow
    Sub,
    /// 8XY6 - shift right, VF = bit shifted out
    ShiftRight,
    /// 8XY7 - Vx = Vy - Vx, VF = NOT borrow
    SubReverse,
    /// 8XYE - shift left, VF = bit shifted out
    ShiftLeft,
}

impl AluOp {
    fn decode(n: u8) -> Option<Self> {
        match n {
            0x0 => Some(AluOp::Assign),
            0x1 => Some(AluOp::Or),
            0x2 => Some(AluOp::And),
            0x3 => Some(AluOp::Xor),
            0x4 => Some(AluOp::Add),
            0x5 => Some(AluOp::Sub),
            0x6 => Some(AluOp::ShiftRight),
            0x7 => Some(AluOp::SubReverse),
            0xE => Some(AluOp::ShiftLeft),
            _ => None,
        }
    }
}

impl Opcode {
    /// Decode a 16-bit instruction word into an `Opcode` variant.
    pub fn decode(word: u16) -> Self {
        let nibble = (
            ((word & 0xF000) >> 12) as u8,
            ((word & 0x0F00) >> 8) as u8,
            ((word & 0x00F0) >> 4) as u8,
            (word & 0x000F) as u8,
        );

        let x = u4::new(nibble.1);
        let y = u4::new(nibble.2);
        let n = u4::new(nibble.3);
        let nn = (word & 0x00FF) as u8;
        let nnn = word & 0x0FFF;

        match (nibble.0, nibble.1, nibble.2, nibble.3) {
            (0x0, 0x0, 0xE, 0x0) => Opcode::ClearDisplay,
            (0x0, 0x0, 0xE, 0xE) => Opcode::Return,
            (0x1, _, _, _) => Opcode::Jump { nnn },
            (0x2, _, _, _) => Opcode::Call { nnn },
            (0x3, _, _, _) => Opcode::SkipRegEqualImm { x, nn },
            (0x4, _, _, _) => Opcode::SkipRegNotEqualImm { x, nn },
            (0x5, _, _, 0x0) => Opcode::SkipRegEqualReg { x, y },
            (0x6, _, _, _) => Opcode::SetRegImm { x, nn },
            (0x7, _, _, _) => Opcode::AddRegImm { x, nn },
            (0x8, _, _, _) => match AluOp::decode(nibble.3) {
                Some(op) => Opcode::Alu { x, y, op },
                None => Opcode::Invalid(word),
            },
            (0x9, _, _, 0x0) => Opcode::SkipRegNotEqualReg { x, y },
            (0xA, _, _, _) => Opcode::SetIndexImm { nnn },
            (0xB, _, _, _) => Opcode::JumpWithOffset { nnn },
            (0xC, _, _, _) => Opcode::Random { x, nn },
            (0xD, _, _, _) => Opcode::Draw { x, y, n },
            (0xE, _, 0x9, 0xE) => Opcode::SkipIfPressed { x },
            (0xE, _, 0xA, 0x1) => Opcode::SkipIfNotPressed { x },
            (0xF, _, 0x0, 0x7) => Opcode::ReadDelayTimer { x },
            (0xF, _, 0x0, 0xA) => Opcode::WaitForKey { x },
            (0xF, _, 0x1, 0x5) => Opcode::SetDelayTimer { x },
            (0xF, _, 0x1, 0x8) => Opcode::SetSoundTimer { x },
            (0xF, _, 0x1, 0xE) => Opcode::AddIndexReg { x },
            (0xF, _, 0x2, 0x9) => Opcode::FontChar { x },
            (0xF, _, 0x3, 0x3) => Opcode::Bcd { x },
            (0xF, _, 0x5, 0x5) => Opcode::StoreRegs { x },
            (0xF, _, 0x6, 0x5) => Opcode::LoadRegs { x },

            _ => Opcode::Invalid(word),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_operands() {
        assert_eq!(Opcode::decode(0x1ABC), Opcode::Jump { nnn: 0xABC });
        assert_eq!(
            Opcode::decode(0x6C42),
            Opcode::SetRegImm {
                x: u4::new(0xC),
                nn: 0x42
            }
        );
        assert_eq!(
            Opcode::decode(0xD125),
            Opcode::Draw {
                x: u4::new(1),
                y: u4::new(2),
                n: u4::new(5)
            }
        );
    }

    #[test]
    fn test_decodes_alu_family() {
        assert_eq!(
            Opcode::decode(0x8124),
            Opcode::Alu {
                x: u4::new(1),
                y: u4::new(2),
                op: AluOp::Add
            }
        );
        assert_eq!(
            Opcode::decode(0x812E),
            Opcode::Alu {
                x: u4::new(1),
                y: u4::new(2),
                op: AluOp::ShiftLeft
            }
        );
    }

    #[test]
    fn test_rejects_unknown_encodings() {
        // 5XY1, 8XY8 and F003 match no instruction
        assert_eq!(Opcode::decode(0x5121), Opcode::Invalid(0x5121));
        assert_eq!(Opcode::decode(0x8128), Opcode::Invalid(0x8128));
        assert_eq!(Opcode::decode(0xF003), Opcode::Invalid(0xF003));
    }

    #[test]
    fn test_decodes_machine_control() {
        assert_eq!(Opcode::decode(0x00E0), Opcode::ClearDisplay);
        assert_eq!(Opcode::decode(0x00EE), Opcode::Return);
        // 0NNN machine-code calls are not supported
        assert_eq!(Opcode::decode(0x0123), Opcode::Invalid(0x0123));
    }
}
