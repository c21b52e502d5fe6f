use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VideoError, VideoResult};
use crate::video::registers::{DisplayControl, SCROLL_WORDS};
use crate::video::VideoSystem;

/// Everything needed to resume the video engine bit-identically.
/// Decoded tile caches are deliberately absent: they are rebuilt on restore.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VideoSaveState {
    pub version: u32,
    pub frame_count: u64,
    pub layers: Vec<LayerSaveState>,
    pub registers: RegisterSaveState,
    pub sprites: SpriteSaveState,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LayerSaveState {
    pub backing: Vec<u16>,
    pub global_modifier: u16,
    pub scroll_x: i32,
    pub scroll_y: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegisterSaveState {
    pub scroll: Vec<u16>,
    pub tile_banks: Vec<u16>,
    pub display: u8,
    pub dac_gain: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpriteSaveState {
    pub pending: Vec<u16>,
    #[serde(default)]
    pub staged: Option<Vec<u16>>,
    pub live: Vec<u16>,
}

impl VideoSaveState {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn encode(&self) -> VideoResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> VideoResult<Self> {
        let state: VideoSaveState = bincode::deserialize(data)?;
        if state.version > Self::CURRENT_VERSION {
            return Err(VideoError::save_state(format!(
                "save state version {} is not supported (current: {})",
                state.version,
                Self::CURRENT_VERSION
            )));
        }
        Ok(state)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> VideoResult<()> {
        let data = self.encode()?;
        std::fs::write(path.as_ref(), data)?;
        log::info!("save state written to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> VideoResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        let state = Self::decode(&data)?;
        log::info!("save state loaded from {}", path.as_ref().display());
        Ok(state)
    }
}

impl VideoSystem {
    pub fn to_save_state(&self) -> VideoSaveState {
        let registers = self.registers();
        let table = self.sprites().table();
        VideoSaveState {
            version: VideoSaveState::CURRENT_VERSION,
            frame_count: self.frame_count(),
            layers: self
                .layers()
                .iter()
                .map(|layer| {
                    let (scroll_x, scroll_y) = layer.scroll();
                    LayerSaveState {
                        backing: layer.backing().to_vec(),
                        global_modifier: layer.global_modifier(),
                        scroll_x,
                        scroll_y,
                    }
                })
                .collect(),
            registers: RegisterSaveState {
                scroll: registers.scroll.to_vec(),
                tile_banks: registers.tile_banks.clone(),
                display: registers.display.bits(),
                dac_gain: registers.dac_gain,
            },
            sprites: SpriteSaveState {
                pending: table.pending().to_vec(),
                staged: table.staged().map(<[u16]>::to_vec),
                live: table.live().to_vec(),
            },
        }
    }

    /// Restores a snapshot taken from an identically configured system.
    /// The whole state is checked before anything is overwritten.
    pub fn load_from_save_state(&mut self, state: &VideoSaveState) -> VideoResult<()> {
        if state.layers.len() != self.layers().len() {
            return Err(VideoError::save_state(format!(
                "saved state has {} layer(s), system has {}",
                state.layers.len(),
                self.layers().len()
            )));
        }
        if state.registers.scroll.len() != SCROLL_WORDS
            || state.registers.tile_banks.len() != self.registers().tile_banks.len()
        {
            return Err(VideoError::save_state("register file shape does not match"));
        }
        for (layer, saved) in self.layers().iter().zip(&state.layers) {
            if layer.backing().len() != saved.backing.len() {
                return Err(VideoError::save_state(format!(
                    "layer {:?}: saved backing has {} words, expected {}",
                    layer.id(),
                    saved.backing.len(),
                    layer.backing().len()
                )));
            }
        }

        self.sprites_mut().table_mut().restore(
            &state.sprites.pending,
            state.sprites.staged.as_deref(),
            &state.sprites.live,
        )?;

        for (index, saved) in state.layers.iter().enumerate() {
            let layer = self.layer_mut(crate::video::tilemap::LayerId(index as u8))?;
            layer.restore(&saved.backing, saved.global_modifier, (saved.scroll_x, saved.scroll_y))?;
        }

        let registers = self.registers_mut();
        registers.scroll.copy_from_slice(&state.registers.scroll);
        registers.tile_banks.copy_from_slice(&state.registers.tile_banks);
        registers.display = DisplayControl::from_bits_truncate(state.registers.display);
        registers.dac_gain = state.registers.dac_gain;

        self.compositor_mut().set_frames(state.frame_count);
        Ok(())
    }
}
