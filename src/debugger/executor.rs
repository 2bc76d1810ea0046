use std::collections::HashSet;

use super::commands::{BreakpointAction, Command, CommandError, CommandResult, SetTarget};
use crate::emu::{Chip8Error, Chip8Runner, Display, Quirks, RunnerResult};

/// Executes debugger commands against a paused or running machine.
pub struct Executor {
    is_running: bool,
    runner: Chip8Runner,
    breakpoints: HashSet<u16>,
}

impl Executor {
    pub fn new(runner: Chip8Runner) -> Self {
        Self {
            is_running: false,
            runner,
            breakpoints: HashSet::new(),
        }
    }

    /// Drive emulation while in running mode; pauses on errors and
    /// breakpoints so the TUI can inspect the stopped machine.
    pub fn poll(&mut self, dt: f32) -> Result<RunnerResult, Chip8Error> {
        if !self.is_running {
            return Ok(RunnerResult::Ok);
        }

        let result = self
            .runner
            .update_with_breakpoints(dt, Some(&self.breakpoints));

        if matches!(result, Err(_) | Ok(RunnerResult::HitBreakpoint)) {
            self.is_running = false;
        }

        result
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Run => {
                self.is_running = true;
                Ok(CommandResult::Ok)
            }
            Command::Pause => {
                self.is_running = false;
                Ok(CommandResult::Ok)
            }
            Command::Step => {
                self.runner.chip8_mut().cpu_cycle()?;
                Ok(CommandResult::Ok)
            }
            Command::Breakpoint { action } => Ok(self.handle_breakpoint(action)),
            Command::Set { target, value } => self.handle_set(target, value),
            Command::Mem { start, len } => Ok(self.handle_mem(start, len)),
            Command::Save { path } => {
                std::fs::write(path, self.runner.chip8_ref().save_state())?;
                Ok(CommandResult::Ok)
            }
            Command::Load { path } => {
                let blob = std::fs::read(path)?;
                self.runner.chip8_mut().load_state(&blob)?;
                Ok(CommandResult::Ok)
            }
            Command::Quit => Ok(CommandResult::Quit),
        }
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn get_display(&self) -> &Display<bool> {
        self.runner.display()
    }

    pub fn get_pc(&self) -> u16 {
        self.runner.chip8_ref().pc
    }

    pub fn get_i(&self) -> u16 {
        self.runner.chip8_ref().i
    }

    pub fn get_v(&self) -> &[u8; 16] {
        &self.runner.chip8_ref().v
    }

    pub fn get_stack(&self) -> &[u16] {
        &self.runner.chip8_ref().stack
    }

    pub fn get_delay_timer(&self) -> u8 {
        self.runner.chip8_ref().delay_timer
    }

    pub fn get_sound_timer(&self) -> u8 {
        self.runner.chip8_ref().sound_timer
    }

    pub fn get_keypad(&self) -> &[bool; 16] {
        &self.runner.chip8_ref().keypad
    }

    pub fn get_quirks(&self) -> Quirks {
        self.runner.chip8_ref().quirks()
    }

    pub fn runner_mut(&mut self) -> &mut Chip8Runner {
        &mut self.runner
    }

    fn handle_breakpoint(&mut self, action: BreakpointAction) -> CommandResult {
        match action {
            BreakpointAction::Set { addr } => {
                self.breakpoints.insert(addr);
            }
            BreakpointAction::Clear { addr } => {
                self.breakpoints.remove(&addr);
            }
            BreakpointAction::ClearAll => {
                self.breakpoints.clear();
            }
            BreakpointAction::List => {
                let mut breakpoints: Vec<u16> = self.breakpoints.iter().copied().collect();
                breakpoints.sort_unstable();
                return CommandResult::Breakpoints(breakpoints);
            }
        };

        CommandResult::Ok
    }

    fn handle_set(&mut self, target: SetTarget, value: u16) -> Result<CommandResult, CommandError> {
        let chip8 = self.runner.chip8_mut();

        match target {
            SetTarget::V(reg) => {
                chip8.v[reg] = u8::try_from(value).map_err(|_| CommandError::ValueOutOfRange)?;
            }
            SetTarget::I => {
                if value > 0xFFF {
                    return Err(CommandError::ValueOutOfRange);
                }
                chip8.i = value;
            }
            SetTarget::Pc => {
                if value > 0xFFF {
                    return Err(CommandError::ValueOutOfRange);
                }
                chip8.pc = value;
            }
        }

        Ok(CommandResult::Ok)
    }

    fn handle_mem(&self, start: u16, len: u16) -> CommandResult {
        let chip8 = self.runner.chip8_ref();
        let data = (start..start.saturating_add(len))
            .map(|addr| chip8.mem_read(addr))
            .collect();

        CommandResult::MemDump {
            data,
            offset: start,
        }
    }
}
