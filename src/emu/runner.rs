use std::collections::HashSet;

use super::chip8::Chip8;
use super::types::{Chip8Error, CycleResult, Display};
use crate::u4;

/// Instructions executed per frame when no override is given.
pub const DEFAULT_CYCLES_PER_FRAME: u32 = 700;

/// Delay/sound timers and frames both tick at this rate, matching original
/// hardware where timers run at 60Hz regardless of CPU throughput.
pub const TIMER_HZ: f32 = 60.0;

const FRAME_TIME_STEP: f32 = 1.0 / TIMER_HZ;

// Cap on accumulated lag so a long stall (window drag, suspend) does not
// trigger a burst of catch-up frames.
const MAX_ACCUMULATED_TIME: f32 = 0.25;

/// Frame scheduler: drives the machine at a fixed real-time cadence.
///
/// Each frame runs `cycles_per_frame` instructions and then ticks the
/// timers once, decoupling CPU throughput from the 60Hz timer rate.
pub struct Chip8Runner {
    chip8: Chip8,
    cycles_per_frame: u32,
    frame_dt_accumulator: f32,
}

/// Outcome of driving the runner, used by the debugger front end.
pub enum RunnerResult {
    Ok,
    HitBreakpoint,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8, cycles_per_frame: u32) -> Self {
        Self {
            chip8,
            cycles_per_frame,
            frame_dt_accumulator: 0.0,
        }
    }

    /// Advance emulation by the elapsed wall-clock time `dt`, running as
    /// many whole frames as have become due.
    pub fn update(&mut self, dt: f32) -> Result<RunnerResult, Chip8Error> {
        self.update_with_breakpoints(dt, None)
    }

    /// Like [`Chip8Runner::update`] but stops as soon as the program
    /// counter lands on one of `breakpoints`.
    pub fn update_with_breakpoints(
        &mut self,
        dt: f32,
        breakpoints: Option<&HashSet<u16>>,
    ) -> Result<RunnerResult, Chip8Error> {
        self.frame_dt_accumulator = (self.frame_dt_accumulator + dt).min(MAX_ACCUMULATED_TIME);

        while self.frame_dt_accumulator >= FRAME_TIME_STEP {
            self.frame_dt_accumulator -= FRAME_TIME_STEP;

            if let RunnerResult::HitBreakpoint = self.frame_with_breakpoints(breakpoints)? {
                self.frame_dt_accumulator = 0.0;
                return Ok(RunnerResult::HitBreakpoint);
            }
        }

        Ok(RunnerResult::Ok)
    }

    /// Run exactly one frame: `cycles_per_frame` instructions followed by
    /// one timer tick. A pending FX0A key wait ends the instruction batch
    /// early; timers still tick so sounds decay while blocked.
    pub fn run_frame(&mut self) -> Result<(), Chip8Error> {
        self.frame_with_breakpoints(None).map(|_| ())
    }

    fn frame_with_breakpoints(
        &mut self,
        breakpoints: Option<&HashSet<u16>>,
    ) -> Result<RunnerResult, Chip8Error> {
        for _ in 0..self.cycles_per_frame {
            match self.chip8.cpu_cycle()? {
                CycleResult::AwaitingKey => break,
                CycleResult::Continue => {}
            }

            if let Some(breakpoints) = breakpoints
                && breakpoints.contains(&self.chip8.pc)
            {
                // Paused mid-frame: leave the timers frozen as well
                return Ok(RunnerResult::HitBreakpoint);
            }
        }

        self.chip8.timers_cycle();
        Ok(RunnerResult::Ok)
    }

    /// Returns true while the sound timer is active and a tone should play.
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed);
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.chip8.get_display_pixel(y, x)
    }

    /// Read-only view of the framebuffer for display sinks.
    pub fn display(&self) -> &Display<bool> {
        self.chip8.display()
    }

    pub fn cycles_per_frame(&self) -> u32 {
        self.cycles_per_frame
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0x200: jump to self
    const SPIN: [u8; 2] = [0x12, 0x00];

    fn runner(rom: &[u8], cycles_per_frame: u32) -> Chip8Runner {
        let mut chip8 = Chip8::default();
        chip8.load(rom).unwrap();
        Chip8Runner::new(chip8, cycles_per_frame)
    }

    #[test]
    fn test_frame_ticks_timers_once() {
        let mut runner = runner(&SPIN, 10);
        runner.chip8_mut().delay_timer = 5;
        runner.chip8_mut().sound_timer = 3;

        for _ in 0..3 {
            runner.run_frame().unwrap();
        }

        assert_eq!(runner.chip8_ref().delay_timer, 2);
        assert_eq!(runner.chip8_ref().sound_timer, 0);
    }

    #[test]
    fn test_update_runs_whole_frames_only() {
        let mut runner = runner(&SPIN, 10);
        runner.chip8_mut().delay_timer = 10;

        runner.update(2.5 * FRAME_TIME_STEP).unwrap();
        assert_eq!(runner.chip8_ref().delay_timer, 8);

        // The fractional remainder carries over into the next update
        runner.update(0.6 * FRAME_TIME_STEP).unwrap();
        assert_eq!(runner.chip8_ref().delay_timer, 7);
    }

    #[test]
    fn test_accumulated_lag_is_capped() {
        let mut runner = runner(&SPIN, 10);
        runner.chip8_mut().delay_timer = 255;

        runner.update(10.0).unwrap();

        // At most MAX_ACCUMULATED_TIME worth of frames ran
        let max_frames = (MAX_ACCUMULATED_TIME * TIMER_HZ) as u8;
        assert!(runner.chip8_ref().delay_timer >= 255 - max_frames);
    }

    #[test]
    fn test_key_wait_stops_frame_but_not_timers() {
        // FX0A at 0x200, then jump to self
        let mut runner = runner(&[0xF0, 0x0A, 0x12, 0x02], 100);
        runner.chip8_mut().delay_timer = 10;

        runner.run_frame().unwrap();
        assert_eq!(runner.chip8_ref().pc, 0x202);
        assert_eq!(runner.chip8_ref().delay_timer, 9);

        // Still blocked next frame; pc does not move
        runner.run_frame().unwrap();
        assert_eq!(runner.chip8_ref().pc, 0x202);
        assert_eq!(runner.chip8_ref().delay_timer, 8);

        // A key press resumes execution
        runner.set_key(u4::new(0x9), true);
        runner.run_frame().unwrap();
        assert_eq!(runner.chip8_ref().v[0], 0x9);
        assert_eq!(runner.chip8_ref().pc, 0x202);
    }

    #[test]
    fn test_breakpoint_pauses_execution() {
        let mut breakpoints = HashSet::new();
        breakpoints.insert(0x200u16);

        let mut runner = runner(&SPIN, 100);
        runner.chip8_mut().delay_timer = 10;

        let result = runner
            .update_with_breakpoints(FRAME_TIME_STEP, Some(&breakpoints))
            .unwrap();

        assert!(matches!(result, RunnerResult::HitBreakpoint));
        assert_eq!(runner.chip8_ref().pc, 0x200);
        // Timers are frozen with the rest of the machine
        assert_eq!(runner.chip8_ref().delay_timer, 10);
    }
}
