/// Behavioural toggles matching historical CHIP-8 interpreter variants.
///
/// Constructed once and handed to [`super::Chip8`] at creation; never
/// mutated during execution.
#[derive(Clone, Copy, Debug, Default)]
pub struct Quirks {
    /// 8XY6/8XYE shift Vy and store the result into Vx (COSMAC VIP
    /// behaviour). When unset, Vx is shifted in place and Vy is ignored.
    pub shift_legacy: bool,

    /// FX55/FX65 leave I incremented by x + 1 after the transfer. When
    /// unset, I is unchanged.
    pub load_store_increment_i: bool,

    /// DXYN sprite pixels wrap around the screen edges instead of being
    /// clipped at the right/bottom borders.
    pub draw_wrap: bool,

    /// Reserved toggle for the BNNN variant that jumps to XNN + Vx.
    /// Accepted for configuration compatibility but currently has no
    /// effect; BNNN always jumps to NNN + V0.
    pub jump_with_v0_quirk: bool,
}
