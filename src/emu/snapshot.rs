//! Raw state snapshots.
//!
//! The blob is a fixed-layout dump of all mutable machine state. It is
//! intentionally *not* a stable or versioned format: restoring a blob
//! produced by a different quirk configuration or crate revision is
//! undefined. Quirks are configuration, not state, and are not captured.

use super::chip8::{Chip8, MEMORY_SIZE, STACK_DEPTH};
use super::types::{Chip8Error, DISPLAY_X, DISPLAY_Y};
use crate::u4;

const V_OFFSET: usize = MEMORY_SIZE;
const STACK_OFFSET: usize = V_OFFSET + 16;
const STACK_LEN_OFFSET: usize = STACK_OFFSET + STACK_DEPTH * 2;
const PC_OFFSET: usize = STACK_LEN_OFFSET + 1;
const I_OFFSET: usize = PC_OFFSET + 2;
const DELAY_OFFSET: usize = I_OFFSET + 2;
const SOUND_OFFSET: usize = DELAY_OFFSET + 1;
const AWAITING_OFFSET: usize = SOUND_OFFSET + 1;
const KEYPAD_OFFSET: usize = AWAITING_OFFSET + 1;
const DISPLAY_OFFSET: usize = KEYPAD_OFFSET + 2;

/// Total size of a snapshot blob in bytes.
pub const SNAPSHOT_SIZE: usize = DISPLAY_OFFSET + DISPLAY_X * DISPLAY_Y / 8;

/// Marker byte for "no FX0A wait pending".
const NO_AWAITING_KEY: u8 = 0xFF;

impl Chip8 {
    /// Serializes all mutable machine state into an opaque byte blob.
    pub fn save_state(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(SNAPSHOT_SIZE);

        blob.extend_from_slice(&self.memory);
        blob.extend_from_slice(&self.v);

        for slot in 0..STACK_DEPTH {
            let entry = self.stack.get(slot).copied().unwrap_or(0);
            blob.extend_from_slice(&entry.to_be_bytes());
        }
        blob.push(self.stack.len() as u8);

        blob.extend_from_slice(&self.pc.to_be_bytes());
        blob.extend_from_slice(&self.i.to_be_bytes());
        blob.push(self.delay_timer);
        blob.push(self.sound_timer);
        blob.push(self.awaiting_key.map_or(NO_AWAITING_KEY, u8::from));

        let mut keys: u16 = 0;
        for (key, &pressed) in self.keypad.iter().enumerate() {
            if pressed {
                keys |= 1 << key;
            }
        }
        blob.extend_from_slice(&keys.to_be_bytes());

        for row in &self.display {
            for chunk in row.chunks(8) {
                let mut byte = 0u8;
                for (bit, &pixel) in chunk.iter().enumerate() {
                    if pixel {
                        byte |= 0x80 >> bit;
                    }
                }
                blob.push(byte);
            }
        }

        debug_assert_eq!(blob.len(), SNAPSHOT_SIZE);
        blob
    }

    /// Restores the machine from a blob produced by [`Chip8::save_state`].
    ///
    /// The restore is atomic: on [`Chip8Error::CorruptState`] the current
    /// state is left untouched.
    pub fn load_state(&mut self, blob: &[u8]) -> Result<(), Chip8Error> {
        if blob.len() != SNAPSHOT_SIZE {
            return Err(Chip8Error::CorruptState {
                reason: "wrong blob length",
            });
        }

        let stack_len = usize::from(blob[STACK_LEN_OFFSET]);
        if stack_len > STACK_DEPTH {
            return Err(Chip8Error::CorruptState {
                reason: "call stack length out of range",
            });
        }

        let awaiting_byte = blob[AWAITING_OFFSET];
        if awaiting_byte != NO_AWAITING_KEY && awaiting_byte > 0x0F {
            return Err(Chip8Error::CorruptState {
                reason: "awaiting-key register out of range",
            });
        }

        // Validation done, commit everything.
        self.memory.copy_from_slice(&blob[..MEMORY_SIZE]);
        self.v.copy_from_slice(&blob[V_OFFSET..V_OFFSET + 16]);

        self.stack.clear();
        for slot in 0..stack_len {
            let offset = STACK_OFFSET + slot * 2;
            self.stack.push(read_u16(blob, offset));
        }

        self.pc = read_u16(blob, PC_OFFSET);
        self.i = read_u16(blob, I_OFFSET);
        self.delay_timer = blob[DELAY_OFFSET];
        self.sound_timer = blob[SOUND_OFFSET];
        self.awaiting_key = if awaiting_byte == NO_AWAITING_KEY {
            None
        } else {
            Some(u4::new(awaiting_byte))
        };

        let keys = read_u16(blob, KEYPAD_OFFSET);
        for (key, pressed) in self.keypad.iter_mut().enumerate() {
            *pressed = keys & (1 << key) != 0;
        }

        for (y, row) in self.display.iter_mut().enumerate() {
            for (x, pixel) in row.iter_mut().enumerate() {
                let byte = blob[DISPLAY_OFFSET + y * DISPLAY_X / 8 + x / 8];
                *pixel = byte & (0x80 >> (x % 8)) != 0;
            }
        }

        Ok(())
    }
}

fn read_u16(blob: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([blob[offset], blob[offset + 1]])
}
