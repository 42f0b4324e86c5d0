use crate::error::{Error, Result};
use crate::framebuffer::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::machine::{Address, FONT_ADDR, FONT_HEIGHT, Machine};

/// One decoded CHIP-8 instruction. `execute` is called with the program
/// counter already advanced past the instruction word; jumps overwrite it,
/// skips add another 2, and the key-wait rewinds it to retry.
pub trait Instruction {
    fn execute(&self, machine: &mut Machine) -> Result<()>;
}

/// Operand fields of an instruction word, one per addressing shape.
struct Operands {
    /// Second nibble, selects VX.
    x: usize,
    /// Third nibble, selects VY.
    y: usize,
    /// Fourth nibble, a 4-bit immediate.
    n: u8,
    /// Low byte, an 8-bit immediate.
    nn: u8,
    /// Low 12 bits, an address.
    nnn: Address,
}

impl Operands {
    fn new(word: u16) -> Self {
        Operands {
            x: usize::from((word >> 8) & 0x0F),
            y: usize::from((word >> 4) & 0x0F),
            n: (word & 0x0F) as u8,
            nn: (word & 0xFF) as u8,
            nnn: Address::from(word & 0x0FFF),
        }
    }
}

/// Map an instruction word to its executable form.
///
/// Words that match no pattern (including the 0NNN machine-language routines
/// of the original hardware) come back as [`Error::UnimplementedOpcode`].
pub fn decode(word: u16) -> Result<Box<dyn Instruction>> {
    let ops = Operands::new(word);

    match word >> 12 {
        0x0 => match ops.nnn {
            0x0E0 => Ok(Box::new(ClearScreen)),
            0x0EE => Ok(Box::new(Return)),
            _ => Err(Error::UnimplementedOpcode(word)),
        },
        0x1 => Ok(Box::new(Jump(ops))),
        0x2 => Ok(Box::new(Call(ops))),
        0x3 => Ok(Box::new(SkipEqImm(ops))),
        0x4 => Ok(Box::new(SkipNeImm(ops))),
        0x5 if ops.n == 0x0 => Ok(Box::new(SkipEqReg(ops))),
        0x6 => Ok(Box::new(LoadImm(ops))),
        0x7 => Ok(Box::new(AddImm(ops))),
        0x8 => match ops.n {
            0x0 => Ok(Box::new(CopyReg(ops))),
            0x1 => Ok(Box::new(OrReg(ops))),
            0x2 => Ok(Box::new(AndReg(ops))),
            0x3 => Ok(Box::new(XorReg(ops))),
            0x4 => Ok(Box::new(AddReg(ops))),
            0x5 => Ok(Box::new(SubReg(ops))),
            0x6 => Ok(Box::new(ShiftRight(ops))),
            0x7 => Ok(Box::new(SubRegReversed(ops))),
            0xE => Ok(Box::new(ShiftLeft(ops))),
            _ => Err(Error::UnimplementedOpcode(word)),
        },
        0x9 if ops.n == 0x0 => Ok(Box::new(SkipNeReg(ops))),
        0xA => Ok(Box::new(SetIndex(ops))),
        0xB => Ok(Box::new(JumpOffset(ops))),
        0xC => Ok(Box::new(Random(ops))),
        0xD => Ok(Box::new(Draw(ops))),
        0xE => match ops.nn {
            0x9E => Ok(Box::new(SkipKeyHeld(ops))),
            0xA1 => Ok(Box::new(SkipKeyIdle(ops))),
            _ => Err(Error::UnimplementedOpcode(word)),
        },
        0xF => match ops.nn {
            0x07 => Ok(Box::new(ReadDelay(ops))),
            0x0A => Ok(Box::new(WaitKey(ops))),
            0x15 => Ok(Box::new(SetDelay(ops))),
            0x18 => Ok(Box::new(SetSound(ops))),
            0x1E => Ok(Box::new(AddIndex(ops))),
            0x29 => Ok(Box::new(FontGlyph(ops))),
            0x33 => Ok(Box::new(StoreBcd(ops))),
            0x55 => Ok(Box::new(StoreRegisters(ops))),
            0x65 => Ok(Box::new(LoadRegisters(ops))),
            _ => Err(Error::UnimplementedOpcode(word)),
        },
        _ => Err(Error::UnimplementedOpcode(word)),
    }
}

/// 00E0: blank the framebuffer.
struct ClearScreen;
impl Instruction for ClearScreen {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.framebuffer.clear();
        Ok(())
    }
}

/// 00EE: return from a subroutine.
struct Return;
impl Instruction for Return {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.pc = machine.stack.pop()?;
        Ok(())
    }
}

/// 1NNN: unconditional jump.
struct Jump(Operands);
impl Instruction for Jump {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.pc = self.0.nnn;
        Ok(())
    }
}

/// 2NNN: call a subroutine, saving the resume address.
struct Call(Operands);
impl Instruction for Call {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.stack.push(machine.pc)?;
        machine.pc = self.0.nnn;
        Ok(())
    }
}

/// 3XNN: skip the next instruction if VX == NN.
struct SkipEqImm(Operands);
impl Instruction for SkipEqImm {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        if machine.registers[self.0.x] == self.0.nn {
            machine.pc += 2;
        }
        Ok(())
    }
}

/// 4XNN: skip the next instruction if VX != NN.
struct SkipNeImm(Operands);
impl Instruction for SkipNeImm {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        if machine.registers[self.0.x] != self.0.nn {
            machine.pc += 2;
        }
        Ok(())
    }
}

/// 5XY0: skip the next instruction if VX == VY.
struct SkipEqReg(Operands);
impl Instruction for SkipEqReg {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        if machine.registers[self.0.x] == machine.registers[self.0.y] {
            machine.pc += 2;
        }
        Ok(())
    }
}

/// 9XY0: skip the next instruction if VX != VY.
struct SkipNeReg(Operands);
impl Instruction for SkipNeReg {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        if machine.registers[self.0.x] != machine.registers[self.0.y] {
            machine.pc += 2;
        }
        Ok(())
    }
}

/// 6XNN: VX := NN.
struct LoadImm(Operands);
impl Instruction for LoadImm {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.registers[self.0.x] = self.0.nn;
        Ok(())
    }
}

/// 7XNN: VX := VX + NN, wrapping, carry flag untouched.
struct AddImm(Operands);
impl Instruction for AddImm {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.registers[self.0.x] = machine.registers[self.0.x].wrapping_add(self.0.nn);
        Ok(())
    }
}

/// 8XY0: VX := VY.
struct CopyReg(Operands);
impl Instruction for CopyReg {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.registers[self.0.x] = machine.registers[self.0.y];
        Ok(())
    }
}

/// 8XY1: VX := VX | VY.
struct OrReg(Operands);
impl Instruction for OrReg {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.registers[self.0.x] |= machine.registers[self.0.y];
        Ok(())
    }
}

/// 8XY2: VX := VX & VY.
struct AndReg(Operands);
impl Instruction for AndReg {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.registers[self.0.x] &= machine.registers[self.0.y];
        Ok(())
    }
}

/// 8XY3: VX := VX ^ VY.
struct XorReg(Operands);
impl Instruction for XorReg {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.registers[self.0.x] ^= machine.registers[self.0.y];
        Ok(())
    }
}

/// 8XY4: VX := VX + VY, VF := carry. The flag is written after the sum so
/// it wins when X is F.
struct AddReg(Operands);
impl Instruction for AddReg {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let (sum, carry) =
            machine.registers[self.0.x].overflowing_add(machine.registers[self.0.y]);
        machine.registers[self.0.x] = sum;
        machine.registers[0xF] = u8::from(carry);
        Ok(())
    }
}

/// 8XY5: VX := VX - VY, VF := 0 on borrow, 1 otherwise.
struct SubReg(Operands);
impl Instruction for SubReg {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let (diff, borrow) =
            machine.registers[self.0.x].overflowing_sub(machine.registers[self.0.y]);
        machine.registers[self.0.x] = diff;
        machine.registers[0xF] = u8::from(!borrow);
        Ok(())
    }
}

/// 8XY7: VX := VY - VX, VF := 0 on borrow, 1 otherwise.
struct SubRegReversed(Operands);
impl Instruction for SubRegReversed {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let (diff, borrow) =
            machine.registers[self.0.y].overflowing_sub(machine.registers[self.0.x]);
        machine.registers[self.0.x] = diff;
        machine.registers[0xF] = u8::from(!borrow);
        Ok(())
    }
}

/// 8XY6: VX := VX >> 1, VF := the bit shifted out.
struct ShiftRight(Operands);
impl Instruction for ShiftRight {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let value = machine.registers[self.0.x];
        machine.registers[self.0.x] = value >> 1;
        machine.registers[0xF] = value & 0x01;
        Ok(())
    }
}

/// 8XYE: VX := VX << 1, VF := the bit shifted out.
struct ShiftLeft(Operands);
impl Instruction for ShiftLeft {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let value = machine.registers[self.0.x];
        machine.registers[self.0.x] = value << 1;
        machine.registers[0xF] = value >> 7;
        Ok(())
    }
}

/// ANNN: I := NNN.
struct SetIndex(Operands);
impl Instruction for SetIndex {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.index = self.0.nnn;
        Ok(())
    }
}

/// BNNN: jump to NNN + V0.
struct JumpOffset(Operands);
impl Instruction for JumpOffset {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.pc = self.0.nnn + Address::from(machine.registers[0]);
        Ok(())
    }
}

/// CXNN: VX := random byte masked with NN.
struct Random(Operands);
impl Instruction for Random {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.registers[self.0.x] = rand::random::<u8>() & self.0.nn;
        Ok(())
    }
}

/// DXYN: XOR an N-row sprite at (VX, VY), VF := collision. The origin wraps
/// around the grid; overhanging pixels clip.
struct Draw(Operands);
impl Instruction for Draw {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let x = usize::from(machine.registers[self.0.x]) % DISPLAY_WIDTH;
        let y = usize::from(machine.registers[self.0.y]) % DISPLAY_HEIGHT;
        let collision = machine.draw_sprite(x, y, self.0.n)?;
        machine.registers[0xF] = u8::from(collision);
        Ok(())
    }
}

/// EX9E: skip the next instruction while key VX is held.
struct SkipKeyHeld(Operands);
impl Instruction for SkipKeyHeld {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let key = usize::from(machine.registers[self.0.x] & 0x0F);
        if machine.keys[key] {
            machine.pc += 2;
        }
        Ok(())
    }
}

/// EXA1: skip the next instruction while key VX is not held.
struct SkipKeyIdle(Operands);
impl Instruction for SkipKeyIdle {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let key = usize::from(machine.registers[self.0.x] & 0x0F);
        if !machine.keys[key] {
            machine.pc += 2;
        }
        Ok(())
    }
}

/// FX07: VX := delay timer.
struct ReadDelay(Operands);
impl Instruction for ReadDelay {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.registers[self.0.x] = machine.delay_timer;
        Ok(())
    }
}

/// FX0A: stall until a key is held, then VX := that key. With no key held
/// the program counter is rewound so the host's next step retries; with
/// several held the lowest index wins (ascending scan).
struct WaitKey(Operands);
impl Instruction for WaitKey {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        if let Some(key) = machine.keys.iter().position(|&held| held) {
            machine.registers[self.0.x] = key as u8;
        } else {
            machine.pc -= 2;
        }
        Ok(())
    }
}

/// FX15: delay timer := VX.
struct SetDelay(Operands);
impl Instruction for SetDelay {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.delay_timer = machine.registers[self.0.x];
        Ok(())
    }
}

/// FX18: sound timer := VX.
struct SetSound(Operands);
impl Instruction for SetSound {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        machine.sound_timer = machine.registers[self.0.x];
        Ok(())
    }
}

/// FX1E: I := I + VX, VF := 1 when the sum leaves the 12-bit address space.
struct AddIndex(Operands);
impl Instruction for AddIndex {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let sum = machine.index + Address::from(machine.registers[self.0.x]);
        machine.registers[0xF] = u8::from(sum > 0xFFF);
        machine.index = sum;
        Ok(())
    }
}

/// FX29: I := address of the font glyph for the low nibble of VX.
struct FontGlyph(Operands);
impl Instruction for FontGlyph {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let glyph = Address::from(machine.registers[self.0.x] & 0x0F);
        machine.index = FONT_ADDR + glyph * FONT_HEIGHT;
        Ok(())
    }
}

/// FX33: store the decimal digits of VX at I, I+1, I+2.
struct StoreBcd(Operands);
impl Instruction for StoreBcd {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        let value = machine.registers[self.0.x];
        machine.memory.write(machine.index, value / 100)?;
        machine.memory.write(machine.index + 1, (value / 10) % 10)?;
        machine.memory.write(machine.index + 2, value % 10)?;
        Ok(())
    }
}

/// FX55: store V0..=VX at I, then I := I + X + 1.
struct StoreRegisters(Operands);
impl Instruction for StoreRegisters {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        for offset in 0..=self.0.x {
            machine
                .memory
                .write(machine.index + offset, machine.registers[offset])?;
        }
        machine.index += self.0.x + 1;
        Ok(())
    }
}

/// FX65: load V0..=VX from I, then I := I + X + 1.
struct LoadRegisters(Operands);
impl Instruction for LoadRegisters {
    fn execute(&self, machine: &mut Machine) -> Result<()> {
        for offset in 0..=self.0.x {
            machine.registers[offset] = machine.memory.read(machine.index + offset)?;
        }
        machine.index += self.0.x + 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::PROGRAM_ADDR;

    /// Decode and execute one word the way the machine cycle would: pc moves
    /// past the word first, then the instruction runs.
    fn exec(machine: &mut Machine, word: u16) {
        let instruction = decode(word).unwrap();
        machine.pc += 2;
        instruction.execute(machine).unwrap();
    }

    #[test]
    fn load_imm_sets_register_exactly() {
        let mut machine = Machine::new();
        exec(&mut machine, 0x6A2B);
        assert_eq!(machine.registers[0xA], 0x2B);
        assert_eq!(machine.pc, PROGRAM_ADDR + 2);
    }

    #[test]
    fn add_imm_wraps_without_touching_the_flag() {
        let mut machine = Machine::new();
        machine.registers[0x2] = 0xFF;
        machine.registers[0xF] = 0x7;
        exec(&mut machine, 0x7201);
        assert_eq!(machine.registers[0x2], 0x00);
        assert_eq!(machine.registers[0xF], 0x7);
    }

    #[test]
    fn add_reg_sets_and_clears_carry() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 0xFF;
        machine.registers[0x1] = 0x01;
        exec(&mut machine, 0x8014);
        assert_eq!(machine.registers[0x0], 0x00);
        assert_eq!(machine.registers[0xF], 1);

        machine.registers[0x0] = 0x01;
        exec(&mut machine, 0x8014);
        assert_eq!(machine.registers[0x0], 0x02);
        assert_eq!(machine.registers[0xF], 0);
    }

    #[test]
    fn sub_reg_reports_borrow_in_both_directions() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 0x05;
        machine.registers[0x1] = 0x03;
        exec(&mut machine, 0x8015);
        assert_eq!(machine.registers[0x0], 0x02);
        assert_eq!(machine.registers[0xF], 1);

        machine.registers[0x0] = 0x03;
        machine.registers[0x1] = 0x05;
        exec(&mut machine, 0x8015);
        assert_eq!(machine.registers[0x0], 0xFE);
        assert_eq!(machine.registers[0xF], 0);
    }

    #[test]
    fn sub_reg_reversed_subtracts_x_from_y() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 0x03;
        machine.registers[0x1] = 0x05;
        exec(&mut machine, 0x8017);
        assert_eq!(machine.registers[0x0], 0x02);
        assert_eq!(machine.registers[0xF], 1);

        machine.registers[0x0] = 0x05;
        machine.registers[0x1] = 0x03;
        exec(&mut machine, 0x8017);
        assert_eq!(machine.registers[0x0], 0xFE);
        assert_eq!(machine.registers[0xF], 0);
    }

    #[test]
    fn shift_right_captures_the_low_bit() {
        let mut machine = Machine::new();
        machine.registers[0x4] = 0x03;
        exec(&mut machine, 0x8406);
        assert_eq!(machine.registers[0x4], 0x01);
        assert_eq!(machine.registers[0xF], 1);

        machine.registers[0x4] = 0x02;
        exec(&mut machine, 0x8406);
        assert_eq!(machine.registers[0x4], 0x01);
        assert_eq!(machine.registers[0xF], 0);
    }

    #[test]
    fn shift_left_captures_the_high_bit() {
        let mut machine = Machine::new();
        machine.registers[0x4] = 0x81;
        exec(&mut machine, 0x840E);
        assert_eq!(machine.registers[0x4], 0x02);
        assert_eq!(machine.registers[0xF], 1);
    }

    #[test]
    fn logic_ops_combine_registers() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 0b1100;
        machine.registers[0x1] = 0b1010;

        exec(&mut machine, 0x8013);
        assert_eq!(machine.registers[0x0], 0b0110);

        machine.registers[0x0] = 0b1100;
        exec(&mut machine, 0x8011);
        assert_eq!(machine.registers[0x0], 0b1110);

        machine.registers[0x0] = 0b1100;
        exec(&mut machine, 0x8012);
        assert_eq!(machine.registers[0x0], 0b1000);
    }

    #[test]
    fn copy_reg_takes_the_source_value() {
        let mut machine = Machine::new();
        machine.registers[0x1] = 0x5A;
        exec(&mut machine, 0x8010);
        assert_eq!(machine.registers[0x0], 0x5A);
    }

    #[test]
    fn skips_compare_registers_and_immediates() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 0x10;

        exec(&mut machine, 0x3010); // equal: skip
        assert_eq!(machine.pc, PROGRAM_ADDR + 4);

        exec(&mut machine, 0x3011); // not equal: no skip
        assert_eq!(machine.pc, PROGRAM_ADDR + 6);

        exec(&mut machine, 0x4011); // not equal: skip
        assert_eq!(machine.pc, PROGRAM_ADDR + 10);

        machine.registers[0x1] = 0x10;
        exec(&mut machine, 0x5010); // VX == VY: skip
        assert_eq!(machine.pc, PROGRAM_ADDR + 14);

        exec(&mut machine, 0x9010); // VX == VY: no skip
        assert_eq!(machine.pc, PROGRAM_ADDR + 16);
    }

    #[test]
    fn jump_and_call_transfer_control() {
        let mut machine = Machine::new();
        exec(&mut machine, 0x1ABC);
        assert_eq!(machine.pc, 0xABC);

        exec(&mut machine, 0x2300);
        assert_eq!(machine.pc, 0x300);
        assert_eq!(machine.stack.depth(), 1);

        exec(&mut machine, 0x00EE);
        // Return resumes after the call site.
        assert_eq!(machine.pc, 0xABC + 2);
        assert_eq!(machine.stack.depth(), 0);
    }

    #[test]
    fn jump_offset_adds_v0() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 0x10;
        exec(&mut machine, 0xB200);
        assert_eq!(machine.pc, 0x210);
    }

    #[test]
    fn random_respects_the_mask() {
        let mut machine = Machine::new();
        machine.registers[0x3] = 0xFF;
        exec(&mut machine, 0xC300);
        assert_eq!(machine.registers[0x3], 0x00);

        exec(&mut machine, 0xC30F);
        assert_eq!(machine.registers[0x3] & 0xF0, 0x00);
    }

    #[test]
    fn set_index_loads_the_address_field() {
        let mut machine = Machine::new();
        exec(&mut machine, 0xA123);
        assert_eq!(machine.index, 0x123);
    }

    #[test]
    fn add_index_flags_overflow_past_address_space() {
        let mut machine = Machine::new();
        machine.index = 0xFFF;
        machine.registers[0x0] = 0x01;
        exec(&mut machine, 0xF01E);
        assert_eq!(machine.index, 0x1000);
        assert_eq!(machine.registers[0xF], 1);

        machine.index = 0x100;
        exec(&mut machine, 0xF01E);
        assert_eq!(machine.index, 0x101);
        assert_eq!(machine.registers[0xF], 0);
    }

    #[test]
    fn font_glyph_addresses_are_five_bytes_apart() {
        let mut machine = Machine::new();
        machine.registers[0x2] = 0x0A;
        exec(&mut machine, 0xF229);
        assert_eq!(machine.index, FONT_ADDR + 0xA * FONT_HEIGHT);
        // The byte there is the first row of the hex digit A sprite.
        assert_eq!(machine.memory.read(machine.index).unwrap(), 0xF0);
    }

    #[test]
    fn bcd_splits_decimal_digits() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 123;
        machine.index = 0x300;
        exec(&mut machine, 0xF033);
        assert_eq!(machine.memory.read(0x300).unwrap(), 1);
        assert_eq!(machine.memory.read(0x301).unwrap(), 2);
        assert_eq!(machine.memory.read(0x302).unwrap(), 3);
    }

    #[test]
    fn store_and_load_round_trip_with_index_advance() {
        let mut machine = Machine::new();
        let values = [0x11, 0x22, 0x33, 0x44];
        machine.registers[..4].copy_from_slice(&values);
        machine.index = 0x400;

        exec(&mut machine, 0xF355);
        assert_eq!(machine.index, 0x404);

        machine.registers[..4].copy_from_slice(&[0; 4]);
        machine.index = 0x400;
        exec(&mut machine, 0xF365);
        assert_eq!(machine.registers[..4], values);
        assert_eq!(machine.index, 0x404);
    }

    #[test]
    fn timer_transfers_move_both_directions() {
        let mut machine = Machine::new();
        machine.registers[0x5] = 42;
        exec(&mut machine, 0xF515);
        assert_eq!(machine.delay_timer, 42);
        exec(&mut machine, 0xF518);
        assert_eq!(machine.sound_timer, 42);

        machine.delay_timer = 7;
        exec(&mut machine, 0xF607);
        assert_eq!(machine.registers[0x6], 7);
    }

    #[test]
    fn key_skips_follow_held_state() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 0x5;

        machine.keys[0x5] = true;
        exec(&mut machine, 0xE09E);
        assert_eq!(machine.pc, PROGRAM_ADDR + 4);
        exec(&mut machine, 0xE0A1);
        assert_eq!(machine.pc, PROGRAM_ADDR + 6);

        machine.keys[0x5] = false;
        exec(&mut machine, 0xE09E);
        assert_eq!(machine.pc, PROGRAM_ADDR + 8);
        exec(&mut machine, 0xE0A1);
        assert_eq!(machine.pc, PROGRAM_ADDR + 12);
    }

    #[test]
    fn clear_screen_blanks_the_framebuffer() {
        let mut machine = Machine::new();
        machine.framebuffer.toggle(10, 10).unwrap();
        exec(&mut machine, 0x00E0);
        assert!(!machine.framebuffer.pixel(10, 10).unwrap());
    }

    #[test]
    fn draw_twice_erases_and_reports_collision() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 8;
        machine.registers[0x1] = 4;
        // Point I at the font glyph for 0 and draw it.
        machine.index = FONT_ADDR;

        exec(&mut machine, 0xD015);
        assert_eq!(machine.registers[0xF], 0);
        assert!(machine.framebuffer.pixel(8, 4).unwrap());

        // XOR idempotence: the same sprite again clears every pixel it set.
        exec(&mut machine, 0xD015);
        assert_eq!(machine.registers[0xF], 1);
        for y in 4..9 {
            for x in 8..16 {
                assert!(!machine.framebuffer.pixel(x, y).unwrap());
            }
        }
    }

    #[test]
    fn draw_origin_wraps_around_the_grid() {
        let mut machine = Machine::new();
        machine.registers[0x0] = 64 + 2; // wraps to column 2
        machine.registers[0x1] = 32 + 1; // wraps to row 1
        machine.memory.write(0x300, 0x80).unwrap();
        machine.index = 0x300;

        exec(&mut machine, 0xD011);
        assert!(machine.framebuffer.pixel(2, 1).unwrap());
    }

    #[test]
    fn sub_dispatch_rejects_unknown_variants() {
        for word in [0x5001, 0x8008, 0x9005, 0xE000, 0xF0FF, 0x0123] {
            match decode(word) {
                Err(Error::UnimplementedOpcode(reported)) => assert_eq!(reported, word),
                _ => panic!("{:#06X} should not decode", word),
            }
        }
    }
}
