use super::font::{FONT, FONT_END_ADDRESS, FONT_START_ADDRESS};
use super::opcode::Opcode;
use super::quirks::Quirks;
use super::types::{Chip8Error, CycleResult, DISPLAY_X, DISPLAY_Y, Display};
use crate::u4;

// Fixed by the CHIP-8 memory map
pub(crate) const ROM_START_ADDRESS: usize = 0x200;
pub(crate) const MEMORY_SIZE: usize = 4096;
/// Mask applied to every address so that accesses wrap in the 12-bit space.
pub(crate) const ADDR_MASK: u16 = 0x0FFF;
/// Maximum call depth; a 17th nested CALL is a fatal error.
pub(crate) const STACK_DEPTH: usize = 16;

/// CHIP-8 virtual machine state.
pub struct Chip8 {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: Display<bool>,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: addresses memory for sprite/load/store instructions
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF doubles as the flag register)
    pub(crate) v: [u8; 16],
    /// Call stack for subroutine returns, at most `STACK_DEPTH` deep
    pub(crate) stack: Vec<u16>,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, beeps while non-zero
    pub(crate) sound_timer: u8,

    /// Register waiting to receive a key from an FX0A instruction.
    /// While this is `Some`, the CPU does not fetch instructions.
    pub(crate) awaiting_key: Option<u4>,
    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],

    /// Behaviour toggles, fixed at construction
    pub(crate) quirks: Quirks,
}

impl Chip8 {
    pub fn new(quirks: Quirks) -> Self {
        Chip8 {
            memory: [0; MEMORY_SIZE],
            display: [[false; DISPLAY_X]; DISPLAY_Y],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::with_capacity(STACK_DEPTH),
            delay_timer: 0,
            sound_timer: 0,
            awaiting_key: None,
            keypad: [false; 16],
            quirks,
        }
    }

    /// Loads a ROM into memory at 0x200 and initializes the font set.
    ///
    /// Fails with [`Chip8Error::RomTooLarge`] before touching the program
    /// counter if the ROM does not fit between 0x200 and 0xFFF.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let max_size = MEMORY_SIZE - ROM_START_ADDRESS;
        if rom.len() > max_size {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size,
            });
        }

        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        self.memory[ROM_START_ADDRESS..ROM_START_ADDRESS + rom.len()].copy_from_slice(rom);
        self.pc = ROM_START_ADDRESS as u16;

        Ok(())
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// While an FX0A key wait is pending this is a no-op that reports
    /// [`CycleResult::AwaitingKey`]; the pending register is filled and
    /// execution resumes once [`Chip8::set_key`] sees a key-press edge.
    pub fn cpu_cycle(&mut self) -> Result<CycleResult, Chip8Error> {
        if self.awaiting_key.is_some() {
            return Ok(CycleResult::AwaitingKey);
        }

        let word = self.fetch();
        self.execute(Opcode::decode(word))
    }

    /// Updates the delay and sound timers. Should be called at 60Hz.
    pub fn timers_cycle(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Returns true while the sound timer is running and a tone should play.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    /// Set the state of a key on the keypad.
    ///
    /// A released-to-pressed edge completes a pending FX0A wait by storing
    /// the key in the awaiting register.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        if pressed
            && !self.keypad[key]
            && let Some(x) = self.awaiting_key.take()
        {
            self.v[x] = key.into();
        }

        self.keypad[key] = pressed;
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.display[y][x]
    }

    /// Read-only view of the framebuffer for display sinks.
    pub fn display(&self) -> &Display<bool> {
        &self.display
    }

    /// The quirk configuration this machine was constructed with.
    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    /// Fetches the 16-bit instruction word at the program counter
    /// (big-endian). The counter is advanced during execution.
    fn fetch(&self) -> u16 {
        let high = self.mem_read(self.pc);
        let low = self.mem_read(self.pc.wrapping_add(1));

        u16::from_be_bytes([high, low])
    }

    /// Reads a memory byte; the address wraps in the 12-bit space.
    pub(crate) fn mem_read(&self, addr: u16) -> u8 {
        self.memory[(addr & ADDR_MASK) as usize]
    }

    /// Writes a memory byte; the address wraps in the 12-bit space.
    pub(crate) fn mem_write(&mut self, addr: u16, value: u8) {
        self.memory[(addr & ADDR_MASK) as usize] = value;
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new(Quirks::default())
    }
}
