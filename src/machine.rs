use crate::error::{Error, Result};
use crate::framebuffer::{DISPLAY_HEIGHT, DISPLAY_WIDTH, FrameBuffer};
use crate::instruction::decode;

pub type Address = usize;

pub const MEM_SIZE: usize = 4096;
pub const FONT_ADDR: Address = 0x000;
pub const FONT_HEIGHT: usize = 5;
pub const PROGRAM_ADDR: Address = 0x200;
pub const MAX_PROGRAM_SIZE: usize = MEM_SIZE - PROGRAM_ADDR;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const STACK_DEPTH: usize = 16;

const FONT_DATA: [u8; NUM_KEYS * FONT_HEIGHT] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// The 4096-byte address space. The font table sits at 0x000-0x04F and
/// programs load at 0x200. Every access is bounds-checked.
pub struct Memory {
    bytes: [u8; MEM_SIZE],
}

impl Memory {
    pub fn new() -> Self {
        let bytes = {
            let mut bytes = [0; MEM_SIZE];
            bytes[FONT_ADDR..FONT_ADDR + FONT_DATA.len()].copy_from_slice(&FONT_DATA);
            bytes
        };

        Memory { bytes }
    }

    pub fn read(&self, addr: Address) -> Result<u8> {
        if addr >= MEM_SIZE {
            return Err(Error::InvalidAddress(format!(
                "memory read at {:#05X}",
                addr
            )));
        }
        Ok(self.bytes[addr])
    }

    pub fn write(&mut self, addr: Address, value: u8) -> Result<()> {
        if addr >= MEM_SIZE {
            return Err(Error::InvalidAddress(format!(
                "memory write at {:#05X}",
                addr
            )));
        }
        self.bytes[addr] = value;
        Ok(())
    }

    /// Fetch a 2-byte instruction word, assembled big-endian so that the
    /// result is independent of host byte order.
    pub fn read_word(&self, addr: Address) -> Result<u16> {
        let high = u16::from(self.read(addr)?);
        let low = u16::from(self.read(addr + 1)?);
        Ok((high << 8) | low)
    }

    pub fn sprite(&self, addr: Address, rows: u8) -> Result<&[u8]> {
        let range = addr..addr + rows as usize;
        if range.end > MEM_SIZE {
            return Err(Error::InvalidAddress(format!(
                "sprite rows {:#05X}..{:#05X}",
                range.start, range.end
            )));
        }
        Ok(&self.bytes[range])
    }

    pub fn load_program(&mut self, image: &[u8]) -> Result<()> {
        if image.len() > MAX_PROGRAM_SIZE {
            return Err(Error::Load(format!(
                "program image is {} bytes, at most {} fit",
                image.len(),
                MAX_PROGRAM_SIZE
            )));
        }
        self.bytes[PROGRAM_ADDR..PROGRAM_ADDR + image.len()].copy_from_slice(image);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-depth return address stack. Pushing past 16 frames or popping an
/// empty stack is surfaced as an error instead of corrupting memory.
pub struct CallStack {
    frames: [Address; STACK_DEPTH],
    depth: usize,
}

impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: [0; STACK_DEPTH],
            depth: 0,
        }
    }

    pub fn push(&mut self, addr: Address) -> Result<()> {
        if self.depth >= STACK_DEPTH {
            return Err(Error::InvalidAddress(format!(
                "call stack overflow past {} frames",
                STACK_DEPTH
            )));
        }
        self.frames[self.depth] = addr;
        self.depth += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Address> {
        if self.depth == 0 {
            return Err(Error::InvalidAddress(
                "call stack underflow: no return address".to_string(),
            ));
        }
        self.depth -= 1;
        Ok(self.frames[self.depth])
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-side keyboard collaborator. The machine polls all 16 logical keys
/// through this once at the start of every step; the mapping from physical
/// input to the hex pad belongs to the implementor.
pub trait HostInput {
    fn is_key_pressed(&self, key: u8) -> bool;
}

/// What a single step surfaced to the host. `beep` is true while the sound
/// timer is running down and the host should make noise this tick.
#[derive(Debug)]
pub struct StepOutput {
    pub beep: bool,
}

/// The CHIP-8 machine: all architectural state plus the fetch/decode/execute
/// cycle. The host owns the pacing; one [`step`] call executes exactly one
/// instruction and ticks both timers, so calling it at 60 Hz gives
/// timer-correct behavior.
///
/// [`step`]: Machine::step
pub struct Machine {
    pub memory: Memory,
    pub registers: [u8; NUM_REGISTERS],
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub framebuffer: FrameBuffer,
    pub keys: [bool; NUM_KEYS],
}

impl Machine {
    pub fn new() -> Self {
        Machine {
            memory: Memory::new(),
            registers: [0; NUM_REGISTERS],
            pc: PROGRAM_ADDR,
            index: 0,
            stack: CallStack::new(),
            delay_timer: 0,
            sound_timer: 0,
            framebuffer: FrameBuffer::new(),
            keys: [false; NUM_KEYS],
        }
    }

    /// Reset every register, timer, the stack, the framebuffer, and memory
    /// (reinstating the font table) and point the program counter at 0x200.
    pub fn reset(&mut self) {
        *self = Machine::new();
    }

    /// Reset the machine and place a program image at 0x200.
    ///
    /// Images longer than the 3584 bytes of program memory are rejected
    /// before any state changes.
    pub fn load(&mut self, image: &[u8]) -> Result<()> {
        if image.len() > MAX_PROGRAM_SIZE {
            return Err(Error::Load(format!(
                "program image is {} bytes, at most {} fit",
                image.len(),
                MAX_PROGRAM_SIZE
            )));
        }
        self.reset();
        self.memory.load_program(image)?;
        log::debug!("loaded {} byte program at {:#05X}", image.len(), PROGRAM_ADDR);
        Ok(())
    }

    /// Run one machine cycle: refresh key state from the host, fetch and
    /// execute the instruction under the program counter, then tick both
    /// timers.
    ///
    /// On [`Error::UnimplementedOpcode`] the program counter is left pointing
    /// at the unrecognized word so the host can decide whether to halt;
    /// timers tick regardless of the instruction's outcome.
    pub fn step(&mut self, input: &impl HostInput) -> Result<StepOutput> {
        for (key, state) in self.keys.iter_mut().enumerate() {
            *state = input.is_key_pressed(key as u8);
        }

        let cycle = self.execute_next();
        let beep = self.tick_timers();
        cycle.map(|()| StepOutput { beep })
    }

    fn execute_next(&mut self) -> Result<()> {
        let word = self.memory.read_word(self.pc)?;
        // Decode before advancing so an unknown word leaves pc on it.
        let instruction = decode(word)?;
        self.pc += 2;
        instruction.execute(self)
    }

    fn tick_timers(&mut self) -> bool {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        let beep = self.sound_timer > 0;
        self.sound_timer = self.sound_timer.saturating_sub(1);
        beep
    }

    /// XOR an N-row sprite read from memory at the index register onto the
    /// framebuffer at (x, y). The origin wraps around the grid; rows and
    /// columns that overhang the right or bottom edge are clipped. Returns
    /// true when any lit pixel was toggled off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: u8) -> Result<bool> {
        let sprite = self.memory.sprite(self.index, rows)?;
        let mut collision = false;

        for (row, &byte) in sprite.iter().enumerate() {
            for bit in 0..8 {
                let pixel_x = x + bit;
                let pixel_y = y + row;
                if pixel_x >= DISPLAY_WIDTH || pixel_y >= DISPLAY_HEIGHT {
                    continue;
                }
                if (byte >> (7 - bit)) & 1 == 1 && self.framebuffer.toggle(pixel_x, pixel_y)? {
                    collision = true;
                }
            }
        }
        Ok(collision)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
