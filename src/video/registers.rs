use bitflags::bitflags;

use super::tilemap::LayerId;
use crate::error::{VideoError, VideoResult};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayControl: u8 {
        const FLIP_SCREEN = 0b00000001;
    }
}

/// Number of raw scroll-control words latched by the register file.
pub const SCROLL_WORDS: usize = 8;

/// Memory-mapped video registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterId {
    /// Raw scroll-control words; the bus offset selects the word.
    ScrollControl,
    /// Tile bank select feeding a layer's global modifier.
    TileBank(LayerId),
    FlipScreen,
    DacGain,
}

/// Result of a register write the engine has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterEffect {
    None,
    /// A tile bank was written. The layer's global modifier is the
    /// authoritative bank; it decides whether the cache goes stale.
    BankWritten(LayerId, u16),
}

/// Latched register state. Scroll words are kept raw: how they pack into
/// per-layer offsets is decided by each layer's scroll hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    pub scroll: [u16; SCROLL_WORDS],
    pub tile_banks: Vec<u16>,
    pub display: DisplayControl,
    pub dac_gain: u8,
}

impl RegisterFile {
    pub fn new(layers: usize) -> Self {
        Self {
            scroll: [0; SCROLL_WORDS],
            tile_banks: vec![0; layers],
            display: DisplayControl::empty(),
            dac_gain: 0,
        }
    }

    pub fn write(&mut self, register: RegisterId, offset: usize, value: u16) -> VideoResult<RegisterEffect> {
        match register {
            RegisterId::ScrollControl => {
                let word = self
                    .scroll
                    .get_mut(offset)
                    .ok_or_else(|| VideoError::out_of_range("scroll control word", offset, SCROLL_WORDS))?;
                *word = value;
            }
            RegisterId::TileBank(layer) => {
                let count = self.tile_banks.len();
                let bank = self
                    .tile_banks
                    .get_mut(usize::from(layer.0))
                    .ok_or_else(|| VideoError::out_of_range("tile bank layer", usize::from(layer.0), count))?;
                *bank = value;
                return Ok(RegisterEffect::BankWritten(layer, value));
            }
            RegisterId::FlipScreen => {
                self.display.set(DisplayControl::FLIP_SCREEN, value & 1 != 0);
            }
            RegisterId::DacGain => {
                self.dac_gain = value as u8;
            }
        }
        Ok(RegisterEffect::None)
    }

    pub fn read(&self, register: RegisterId, offset: usize) -> VideoResult<u16> {
        match register {
            RegisterId::ScrollControl => self
                .scroll
                .get(offset)
                .copied()
                .ok_or_else(|| VideoError::out_of_range("scroll control word", offset, SCROLL_WORDS)),
            RegisterId::TileBank(layer) => self
                .tile_banks
                .get(usize::from(layer.0))
                .copied()
                .ok_or_else(|| {
                    VideoError::out_of_range("tile bank layer", usize::from(layer.0), self.tile_banks.len())
                }),
            RegisterId::FlipScreen => Ok(u16::from(self.flip_screen())),
            RegisterId::DacGain => Ok(u16::from(self.dac_gain)),
        }
    }

    pub fn flip_screen(&self) -> bool {
        self.display.contains(DisplayControl::FLIP_SCREEN)
    }

    /// Default per-layer scroll: words `2n` and `2n + 1` as signed offsets.
    pub fn default_scroll(&self, layer: LayerId) -> (i32, i32) {
        let base = usize::from(layer.0) * 2;
        let word = |i: usize| self.scroll.get(i).map_or(0, |&w| i32::from(w as i16));
        (word(base), word(base + 1))
    }
}
