/// Result of a single CPU cycle.
pub enum CycleResult {
    /// The instruction completed and execution can continue.
    Continue,
    /// The machine is blocked on an FX0A key wait; no further instructions
    /// will execute until a key-press edge arrives via `set_key`.
    AwaitingKey,
}

/// Error types that can occur during CHIP-8 emulation.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("invalid opcode {opcode:#06X} at address {address:#05X}")]
    InvalidOpcode { opcode: u16, address: u16 },

    #[error("stack overflow: CALL exceeds maximum depth of {max_depth}")]
    StackOverflow { max_depth: usize },

    #[error("stack underflow: attempted to return with an empty call stack")]
    StackUnderflow,

    #[error("corrupt snapshot: {reason}")]
    CorruptState { reason: &'static str },
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;

/// A type alias for the CHIP-8 display buffer representation.
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];
