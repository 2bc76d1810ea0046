use super::chip8::{ADDR_MASK, Chip8, STACK_DEPTH};
use super::font::{FONT_GLYPH_SIZE, FONT_START_ADDRESS};
use super::opcode::{AluOp, Opcode};
use super::types::{Chip8Error, CycleResult, DISPLAY_X, DISPLAY_Y};
use crate::u4;

impl Chip8 {
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<CycleResult, Chip8Error> {
        self.pc = self.pc.wrapping_add(2) & ADDR_MASK;

        match opcode {
            Opcode::ClearDisplay => {
                self.display = [[false; DISPLAY_X]; DISPLAY_Y];
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                // `jump_with_v0_quirk` is accepted but inert: the offset is
                // always taken from V0, never from Vx.
                self.pc = nnn.wrapping_add(self.v[0].into()) & ADDR_MASK;
            }
            Opcode::Call { nnn } => {
                if self.stack.len() >= STACK_DEPTH {
                    return Err(Chip8Error::StackOverflow {
                        max_depth: STACK_DEPTH,
                    });
                }
                self.stack.push(self.pc);
                self.pc = nnn;
            }
            Opcode::Return => {
                self.pc = self.stack.pop().ok_or(Chip8Error::StackUnderflow)?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                if self.v[x] == nn {
                    self.skip();
                }
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                if self.v[x] != nn {
                    self.skip();
                }
            }
            Opcode::SkipRegEqualReg { x, y } => {
                if self.v[x] == self.v[y] {
                    self.skip();
                }
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                if self.v[x] != self.v[y] {
                    self.skip();
                }
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::Alu { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                self.v[x] = rand::random::<u8>() & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into()) & ADDR_MASK;
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                if self.keypad[u4::from_low_nibble(self.v[x])] {
                    self.skip();
                }
            }
            Opcode::SkipIfNotPressed { x } => {
                if !self.keypad[u4::from_low_nibble(self.v[x])] {
                    self.skip();
                }
            }
            Opcode::WaitForKey { x } => {
                // Suspension point: the machine stays blocked until set_key
                // reports a key-press edge, which fills Vx and resumes.
                self.awaiting_key = Some(x);
                return Ok(CycleResult::AwaitingKey);
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::FontChar { x } => {
                let digit = u16::from(self.v[x] & 0x0F);
                self.i = FONT_START_ADDRESS as u16 + digit * FONT_GLYPH_SIZE;
            }
            Opcode::Bcd { x } => {
                let value = self.v[x];
                self.mem_write(self.i, value / 100);
                self.mem_write(self.i.wrapping_add(1), (value / 10) % 10);
                self.mem_write(self.i.wrapping_add(2), value % 10);
            }
            Opcode::StoreRegs { x } => {
                for offset in 0..=u16::from(x) {
                    self.mem_write(self.i.wrapping_add(offset), self.v[offset as usize]);
                }
                if self.quirks.load_store_increment_i {
                    self.i = self.i.wrapping_add(u16::from(x) + 1) & ADDR_MASK;
                }
            }
            Opcode::LoadRegs { x } => {
                for offset in 0..=u16::from(x) {
                    self.v[offset as usize] = self.mem_read(self.i.wrapping_add(offset));
                }
                if self.quirks.load_store_increment_i {
                    self.i = self.i.wrapping_add(u16::from(x) + 1) & ADDR_MASK;
                }
            }
            Opcode::Invalid(word) => {
                return Err(Chip8Error::InvalidOpcode {
                    opcode: word,
                    address: self.pc.wrapping_sub(2) & ADDR_MASK,
                });
            }
        };

        Ok(CycleResult::Continue)
    }

    fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2) & ADDR_MASK;
    }

    /// 8XYn family. VF is always written after the result so that a flag
    /// write wins when the instruction targets VF itself.
    fn execute_alu(&mut self, x: u4, y: u4, op: AluOp) {
        match op {
            AluOp::Assign => self.v[x] = self.v[y],
            AluOp::Or => self.v[x] |= self.v[y],
            AluOp::And => self.v[x] &= self.v[y],
            AluOp::Xor => self.v[x] ^= self.v[y],
            AluOp::Add => {
                let (result, carry) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = result;
                self.v[0xF] = u8::from(carry);
            }
            AluOp::Sub => {
                let (result, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = result;
                // VF holds NOT borrow
                self.v[0xF] = u8::from(!borrow);
            }
            AluOp::SubReverse => {
                let (result, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = result;
                self.v[0xF] = u8::from(!borrow);
            }
            AluOp::ShiftRight => {
                let source = if self.quirks.shift_legacy {
                    self.v[y]
                } else {
                    self.v[x]
                };
                self.v[x] = source >> 1;
                self.v[0xF] = source & 1;
            }
            AluOp::ShiftLeft => {
                let source = if self.quirks.shift_legacy {
                    self.v[y]
                } else {
                    self.v[x]
                };
                self.v[x] = source << 1;
                self.v[0xF] = source >> 7;
            }
        }
    }

    /// DXYN: XOR an N-byte sprite from I onto the display at (Vx, Vy).
    ///
    /// The origin always wraps into the screen; pixels past the right or
    /// bottom edge wrap only with the `draw_wrap` quirk, otherwise they are
    /// dropped and never count as collisions.
    fn execute_draw(&mut self, x: u4, y: u4, n: u4) {
        let x_origin = usize::from(self.v[x]) % DISPLAY_X;
        let y_origin = usize::from(self.v[y]) % DISPLAY_Y;
        let wrap = self.quirks.draw_wrap;

        let mut collision = false;
        for row in 0..usize::from(n) {
            let y_pos = if wrap {
                (y_origin + row) % DISPLAY_Y
            } else {
                y_origin + row
            };
            if y_pos >= DISPLAY_Y {
                break;
            }

            let sprite_byte = self.mem_read(self.i.wrapping_add(row as u16));

            for col in 0..8 {
                if sprite_byte & (0x80 >> col) == 0 {
                    continue;
                }

                let x_pos = if wrap {
                    (x_origin + col) % DISPLAY_X
                } else {
                    x_origin + col
                };
                if x_pos >= DISPLAY_X {
                    break;
                }

                let pixel = &mut self.display[y_pos][x_pos];
                *pixel ^= true;
                if !*pixel {
                    collision = true;
                }
            }
        }

        self.v[0xF] = u8::from(collision);
    }
}

#[cfg(test)]
mod tests {
    use super::super::quirks::Quirks;
    use super::*;

    fn machine(quirks: Quirks) -> Chip8 {
        let mut chip8 = Chip8::new(quirks);
        chip8.load(&[]).unwrap();
        chip8
    }

    fn exec(chip8: &mut Chip8, word: u16) -> Result<CycleResult, Chip8Error> {
        chip8.execute(Opcode::decode(word))
    }

    #[test]
    fn test_add_sets_carry_and_wraps() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 200;
        chip8.v[1] = 100;
        exec(&mut chip8, 0x8014).unwrap();
        assert_eq!(chip8.v[0], 44);
        assert_eq!(chip8.v[0xF], 1);

        chip8.v[0] = 20;
        chip8.v[1] = 30;
        exec(&mut chip8, 0x8014).unwrap();
        assert_eq!(chip8.v[0], 50);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn test_add_flag_wins_when_vf_is_target() {
        let mut chip8 = Chip8::default();
        chip8.v[0xF] = 200;
        chip8.v[1] = 100;
        exec(&mut chip8, 0x8F14).unwrap();
        // The carry flag overwrites the arithmetic result in VF
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn test_sub_sets_not_borrow() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 50;
        chip8.v[1] = 20;
        exec(&mut chip8, 0x8015).unwrap();
        assert_eq!(chip8.v[0], 30);
        assert_eq!(chip8.v[0xF], 1);

        chip8.v[0] = 20;
        chip8.v[1] = 50;
        exec(&mut chip8, 0x8015).unwrap();
        assert_eq!(chip8.v[0], 226);
        assert_eq!(chip8.v[0xF], 0);

        // a == b counts as "no borrow"
        chip8.v[0] = 10;
        chip8.v[1] = 10;
        exec(&mut chip8, 0x8015).unwrap();
        assert_eq!(chip8.v[0], 0);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn test_sub_reverse() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 20;
        chip8.v[1] = 50;
        exec(&mut chip8, 0x8017).unwrap();
        assert_eq!(chip8.v[0], 30);
        assert_eq!(chip8.v[0xF], 1);

        chip8.v[0] = 50;
        chip8.v[1] = 20;
        exec(&mut chip8, 0x8017).unwrap();
        assert_eq!(chip8.v[0], 226);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn test_logic_ops() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 0b1100;
        chip8.v[1] = 0b1010;
        chip8.v[0xF] = 7;

        exec(&mut chip8, 0x8011).unwrap();
        assert_eq!(chip8.v[0], 0b1110);

        chip8.v[0] = 0b1100;
        exec(&mut chip8, 0x8012).unwrap();
        assert_eq!(chip8.v[0], 0b1000);

        chip8.v[0] = 0b1100;
        exec(&mut chip8, 0x8013).unwrap();
        assert_eq!(chip8.v[0], 0b0110);

        // Logic ops leave the flag register alone
        assert_eq!(chip8.v[0xF], 7);
    }

    #[test]
    fn test_shift_right_in_place_by_default() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 0b0000_0011;
        chip8.v[1] = 0xAA;
        exec(&mut chip8, 0x8016).unwrap();
        assert_eq!(chip8.v[0], 0b0000_0001);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn test_shift_right_legacy_uses_vy() {
        let mut chip8 = machine(Quirks {
            shift_legacy: true,
            ..Quirks::default()
        });
        chip8.v[0] = 0xFF; // prior Vx must not matter
        chip8.v[1] = 0b1000_0001;
        exec(&mut chip8, 0x8016).unwrap();
        assert_eq!(chip8.v[0], 0b0100_0000);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn test_shift_left_in_place_by_default() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 0b1100_0000;
        exec(&mut chip8, 0x801E).unwrap();
        assert_eq!(chip8.v[0], 0b1000_0000);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn test_shift_left_legacy_uses_vy() {
        let mut chip8 = machine(Quirks {
            shift_legacy: true,
            ..Quirks::default()
        });
        chip8.v[0] = 0x00;
        chip8.v[1] = 0b0100_0001;
        exec(&mut chip8, 0x801E).unwrap();
        assert_eq!(chip8.v[0], 0b1000_0010);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn test_skip_instructions() {
        let mut chip8 = Chip8::default();
        chip8.v[2] = 0x42;
        chip8.v[3] = 0x42;

        let pc = chip8.pc;
        exec(&mut chip8, 0x3242).unwrap(); // Vx == nn: skip
        assert_eq!(chip8.pc, pc + 4);

        let pc = chip8.pc;
        exec(&mut chip8, 0x4242).unwrap(); // Vx != nn: no skip
        assert_eq!(chip8.pc, pc + 2);

        let pc = chip8.pc;
        exec(&mut chip8, 0x5230).unwrap(); // Vx == Vy: skip
        assert_eq!(chip8.pc, pc + 4);

        let pc = chip8.pc;
        exec(&mut chip8, 0x9230).unwrap(); // Vx == Vy: no skip
        assert_eq!(chip8.pc, pc + 2);
    }

    #[test]
    fn test_call_and_return() {
        let mut chip8 = Chip8::default();
        exec(&mut chip8, 0x2400).unwrap();
        assert_eq!(chip8.pc, 0x400);
        assert_eq!(chip8.stack, [0x202]);

        exec(&mut chip8, 0x00EE).unwrap();
        assert_eq!(chip8.pc, 0x202);
        assert!(chip8.stack.is_empty());
    }

    #[test]
    fn test_seventeenth_nested_call_overflows() {
        let mut chip8 = Chip8::default();
        for _ in 0..16 {
            exec(&mut chip8, 0x2300).unwrap();
        }

        assert!(matches!(
            exec(&mut chip8, 0x2300),
            Err(Chip8Error::StackOverflow { max_depth: 16 })
        ));
    }

    #[test]
    fn test_return_on_empty_stack_underflows() {
        let mut chip8 = Chip8::default();
        assert!(matches!(
            exec(&mut chip8, 0x00EE),
            Err(Chip8Error::StackUnderflow)
        ));
    }

    #[test]
    fn test_jump_with_offset_always_uses_v0() {
        // The quirk toggle is inert by design; even with it enabled the
        // offset comes from V0, not from the leading register nibble.
        let mut chip8 = machine(Quirks {
            jump_with_v0_quirk: true,
            ..Quirks::default()
        });
        chip8.v[0] = 0x05;
        chip8.v[2] = 0xFF;
        exec(&mut chip8, 0xB23C).unwrap();
        assert_eq!(chip8.pc, 0x241);
    }

    #[test]
    fn test_random_is_masked() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 0xFF;
        exec(&mut chip8, 0xC000).unwrap();
        assert_eq!(chip8.v[0], 0);

        exec(&mut chip8, 0xC00F).unwrap();
        assert!(chip8.v[0] <= 0x0F);
    }

    #[test]
    fn test_index_add_wraps_12_bit() {
        let mut chip8 = Chip8::default();
        chip8.i = 0xFFE;
        chip8.v[0] = 5;
        exec(&mut chip8, 0xF01E).unwrap();
        assert_eq!(chip8.i, 0x003);
    }

    #[test]
    fn test_font_char_address() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 0xA;
        exec(&mut chip8, 0xF029).unwrap();
        assert_eq!(chip8.i, 0x50 + 0xA * 5);

        // Only the low nibble of Vx selects the glyph
        chip8.v[0] = 0x1F;
        exec(&mut chip8, 0xF029).unwrap();
        assert_eq!(chip8.i, 0x50 + 0xF * 5);
    }

    #[test]
    fn test_bcd_digits() {
        let mut chip8 = Chip8::default();
        chip8.v[3] = 254;
        chip8.i = 0x300;
        exec(&mut chip8, 0xF333).unwrap();
        assert_eq!(chip8.memory[0x300..0x303], [2, 5, 4]);
    }

    #[test]
    fn test_store_load_roundtrip_leaves_i_unchanged() {
        let mut chip8 = Chip8::default();
        chip8.i = 0x300;
        let before: Vec<u8> = (0u8..=5).map(|r| r * 11).collect();
        chip8.v[..6].copy_from_slice(&before);

        exec(&mut chip8, 0xF555).unwrap();
        assert_eq!(chip8.i, 0x300);

        chip8.v[..6].fill(0);
        exec(&mut chip8, 0xF565).unwrap();
        assert_eq!(chip8.v[..6], before[..]);
        assert_eq!(chip8.i, 0x300);
    }

    #[test]
    fn test_store_load_increment_quirk() {
        let mut chip8 = machine(Quirks {
            load_store_increment_i: true,
            ..Quirks::default()
        });
        chip8.i = 0x300;

        exec(&mut chip8, 0xF555).unwrap();
        assert_eq!(chip8.i, 0x300 + 5 + 1);

        chip8.i = 0x300;
        exec(&mut chip8, 0xF565).unwrap();
        assert_eq!(chip8.i, 0x300 + 5 + 1);
    }

    #[test]
    fn test_timer_opcodes() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 42;
        exec(&mut chip8, 0xF015).unwrap();
        assert_eq!(chip8.delay_timer, 42);

        exec(&mut chip8, 0xF018).unwrap();
        assert_eq!(chip8.sound_timer, 42);

        chip8.delay_timer = 17;
        exec(&mut chip8, 0xF107).unwrap();
        assert_eq!(chip8.v[1], 17);
    }

    #[test]
    fn test_skip_if_pressed() {
        let mut chip8 = Chip8::default();
        chip8.v[0] = 0x4;
        chip8.set_key(u4::new(0x4), true);

        let pc = chip8.pc;
        exec(&mut chip8, 0xE09E).unwrap();
        assert_eq!(chip8.pc, pc + 4);

        let pc = chip8.pc;
        exec(&mut chip8, 0xE0A1).unwrap();
        assert_eq!(chip8.pc, pc + 2);

        chip8.set_key(u4::new(0x4), false);
        let pc = chip8.pc;
        exec(&mut chip8, 0xE0A1).unwrap();
        assert_eq!(chip8.pc, pc + 4);
    }

    #[test]
    fn test_invalid_opcode_is_fatal_with_address() {
        let mut chip8 = Chip8::default();
        chip8.load(&[0xF0, 0x03]).unwrap();

        assert!(matches!(
            chip8.cpu_cycle(),
            Err(Chip8Error::InvalidOpcode {
                opcode: 0xF003,
                address: 0x200
            })
        ));
    }

    #[test]
    fn test_draw_xor_self_inverse_and_collision() {
        let mut chip8 = Chip8::default();
        chip8.i = 0x300;
        chip8.memory[0x300..0x302].copy_from_slice(&[0b1010_0000, 0b0101_0000]);
        chip8.v[0] = 4;
        chip8.v[1] = 6;

        exec(&mut chip8, 0xD012).unwrap();
        assert_eq!(chip8.v[0xF], 0);
        assert!(chip8.display[6][4]);
        assert!(chip8.display[6][6]);
        assert!(chip8.display[7][5]);
        assert!(chip8.display[7][7]);

        // Drawing the same sprite again erases it exactly
        exec(&mut chip8, 0xD012).unwrap();
        assert_eq!(chip8.v[0xF], 1);
        assert_eq!(chip8.display, [[false; DISPLAY_X]; DISPLAY_Y]);
    }

    #[test]
    fn test_draw_clips_without_wrap() {
        let mut chip8 = Chip8::default();
        chip8.i = 0x300;
        chip8.memory[0x300..0x302].copy_from_slice(&[0xFF, 0xFF]);
        chip8.v[0] = 63;
        chip8.v[1] = 31;

        exec(&mut chip8, 0xD012).unwrap();

        // Only the corner pixel survives; clipped pixels never collide
        let lit: usize = chip8
            .display
            .iter()
            .flatten()
            .map(|&px| usize::from(px))
            .sum();
        assert_eq!(lit, 1);
        assert!(chip8.display[31][63]);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn test_draw_wraps_with_quirk() {
        let mut chip8 = machine(Quirks {
            draw_wrap: true,
            ..Quirks::default()
        });
        chip8.i = 0x300;
        chip8.memory[0x300..0x302].copy_from_slice(&[0b1100_0000, 0b1100_0000]);
        chip8.v[0] = 63;
        chip8.v[1] = 31;

        exec(&mut chip8, 0xD012).unwrap();

        assert!(chip8.display[31][63]);
        assert!(chip8.display[31][0]);
        assert!(chip8.display[0][63]);
        assert!(chip8.display[0][0]);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn test_draw_origin_wraps_modulo_screen() {
        let mut chip8 = Chip8::default();
        chip8.i = 0x300;
        chip8.memory[0x300] = 0b1000_0000;
        chip8.v[0] = 64 + 3;
        chip8.v[1] = 32 + 2;

        exec(&mut chip8, 0xD011).unwrap();
        assert!(chip8.display[2][3]);
    }

    #[test]
    fn test_clear_display() {
        let mut chip8 = Chip8::default();
        chip8.display[5][5] = true;
        exec(&mut chip8, 0x00E0).unwrap();
        assert_eq!(chip8.display, [[false; DISPLAY_X]; DISPLAY_Y]);
    }
}
