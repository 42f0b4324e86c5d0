use bitvec::{BitArr, array::BitArray};

use crate::error::{Error, Result};

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Monochrome 64x32 pixel grid with XOR draw semantics.
///
/// Sprite rows are combined into the grid pixel by pixel via [`toggle`],
/// matching the CHIP-8 draw instruction; nothing overwrites the buffer
/// wholesale except [`clear`]. All accessors validate coordinates against
/// the grid.
///
/// [`toggle`]: FrameBuffer::toggle
/// [`clear`]: FrameBuffer::clear
pub struct FrameBuffer {
    pixels: BitArr!(for DISPLAY_WIDTH * DISPLAY_HEIGHT),
}

impl FrameBuffer {
    pub fn new() -> Self {
        FrameBuffer {
            pixels: BitArray::ZERO,
        }
    }

    fn index(x: usize, y: usize) -> Result<usize> {
        if x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return Err(Error::InvalidAddress(format!(
                "pixel ({}, {}) outside {}x{} grid",
                x, y, DISPLAY_WIDTH, DISPLAY_HEIGHT
            )));
        }
        Ok(y * DISPLAY_WIDTH + x)
    }

    /// Whether the pixel at (x, y) is lit.
    pub fn pixel(&self, x: usize, y: usize) -> Result<bool> {
        Ok(self.pixels[Self::index(x, y)?])
    }

    /// Flip the pixel at (x, y). Returns true when the flip turned a lit
    /// pixel off, which is what the draw instruction reports as a collision.
    pub fn toggle(&mut self, x: usize, y: usize) -> Result<bool> {
        let index = Self::index(x, y)?;
        let was_lit = self.pixels[index];
        self.pixels.set(index, !was_lit);
        Ok(was_lit)
    }

    /// Force the pixel at (x, y) off.
    pub fn turn_off(&mut self, x: usize, y: usize) -> Result<()> {
        let index = Self::index(x, y)?;
        self.pixels.set(index, false);
        Ok(())
    }

    /// Blank the whole grid.
    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
