//! Bus-write routing into the video engine.
//!
//! Address decoding stays with the host's memory map; by the time a write
//! reaches here it names its target and a word offset inside it.

use crate::error::VideoResult;
use crate::video::registers::RegisterId;
use crate::video::tilemap::LayerId;
use crate::video::VideoSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusTarget {
    /// A tile layer's backing VRAM.
    Layer(LayerId),
    /// Sprite RAM; always lands in the pending descriptor buffer.
    SpriteRam,
    Register(RegisterId),
}

impl VideoSystem {
    /// Word write from the bus. Takes effect on the next composite pass.
    pub fn write(&mut self, target: BusTarget, offset: usize, value: u16) -> VideoResult<()> {
        if crate::debug_flags::trace_writes() {
            log::trace!("write {:?}[{:#x}] = {:#06x}", target, offset, value);
        }
        match target {
            BusTarget::Layer(id) => self.layer_mut(id)?.write(offset, value),
            BusTarget::SpriteRam => self.sprites_mut().write_pending(offset, value),
            BusTarget::Register(register) => self.write_register(register, offset, value),
        }
    }

    pub fn read(&self, target: BusTarget, offset: usize) -> VideoResult<u16> {
        match target {
            BusTarget::Layer(id) => self.layer(id)?.read(offset),
            BusTarget::SpriteRam => self.sprites().table().read_pending(offset),
            BusTarget::Register(register) => self.registers().read(register, offset),
        }
    }

    /// Writes consecutive words starting at `offset`.
    pub fn write_block(&mut self, target: BusTarget, offset: usize, words: &[u16]) -> VideoResult<()> {
        for (i, &word) in words.iter().enumerate() {
            self.write(target, offset + i, word)?;
        }
        Ok(())
    }
}
