use bitflags::bitflags;

use super::bitmap::{Raster, Rect};
use super::gfx::GfxElement;
use super::registers::RegisterFile;
use super::sprites::SpriteCompositor;
use super::tilemap::{LayerId, TileLayer};
use crate::error::{VideoError, VideoResult};
use crate::hooks::Hook;

/// Most tile layers a frame can composite.
pub const MAX_LAYERS: usize = 4;

bitflags! {
    /// Debug layer enable mask. A cleared bit suppresses that layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayerMask: u32 {
        const LAYER0 = 0x001;
        const LAYER1 = 0x002;
        const LAYER2 = 0x004;
        const LAYER3 = 0x008;
        const SPRITES = 0x100;
    }
}

impl LayerMask {
    pub fn layer(id: LayerId) -> Self {
        Self::from_bits_truncate(1 << u32::from(id.0))
    }
}

/// Scroll resolver: raw register state -> `(scroll_x, scroll_y)` for one layer.
pub type ScrollFn = dyn Fn(&RegisterFile) -> (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    ScrollApplied,
    LayersDrawn,
    SpritesDrawn,
}

impl FramePhase {
    pub fn name(self) -> &'static str {
        match self {
            FramePhase::Idle => "Idle",
            FramePhase::ScrollApplied => "ScrollApplied",
            FramePhase::LayersDrawn => "LayersDrawn",
            FramePhase::SpritesDrawn => "SpritesDrawn",
        }
    }
}

/// Everything one composite pass reads or draws.
pub struct FrameInputs<'a> {
    pub layers: &'a mut [TileLayer],
    pub scroll: &'a [Hook<ScrollFn>],
    pub registers: &'a RegisterFile,
    pub sprites: &'a mut SpriteCompositor,
    pub gfx: &'a [GfxElement],
}

/// Per-frame draw sequencing and the output raster.
#[derive(Debug)]
pub struct FrameCompositor {
    phase: FramePhase,
    raster: Raster,
    layer_mask: LayerMask,
    background_pen: u16,
    frames: u64,
}

impl FrameCompositor {
    pub fn new(screen: Rect, background_pen: u16) -> Self {
        Self {
            phase: FramePhase::Idle,
            raster: Raster::new(screen),
            layer_mask: LayerMask::from_bits_truncate(crate::debug_flags::layer_mask()),
            background_pen,
            frames: 0,
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub(crate) fn set_frames(&mut self, frames: u64) {
        self.frames = frames;
    }

    pub fn layer_mask(&self) -> LayerMask {
        self.layer_mask
    }

    pub fn set_layer_mask(&mut self, mask: LayerMask) {
        self.layer_mask = mask;
    }

    fn advance(&mut self, step: &'static str, from: FramePhase, to: FramePhase) -> VideoResult<()> {
        if self.phase != from {
            return Err(VideoError::Sequence {
                step,
                phase: self.phase.name(),
            });
        }
        self.phase = to;
        if crate::debug_flags::render_verbose() {
            log::trace!("frame {}: {} -> {}", self.frames, from.name(), to.name());
        }
        Ok(())
    }

    pub(crate) fn apply_scroll(
        &mut self,
        layers: &mut [TileLayer],
        scroll: &[Hook<ScrollFn>],
        registers: &RegisterFile,
    ) -> VideoResult<()> {
        self.advance("apply_scroll", FramePhase::Idle, FramePhase::ScrollApplied)?;
        for (layer, hook) in layers.iter_mut().zip(scroll) {
            let (sx, sy) = match hook.get() {
                Some(resolve) => resolve(registers),
                None => {
                    if crate::debug_flags::trace_hooks() {
                        log::trace!("layer {:?}: {} unbound, default scroll", layer.id(), hook.name());
                    }
                    registers.default_scroll(layer.id())
                }
            };
            layer.set_scroll(sx, sy);
        }
        Ok(())
    }

    /// Back-to-front layer pass. The raster starts from the background pen,
    /// so a suppressed or see-through back layer never leaves last frame's
    /// pixels behind.
    pub(crate) fn draw_layers(
        &mut self,
        layers: &mut [TileLayer],
        gfx: &[GfxElement],
        flip_screen: bool,
    ) -> VideoResult<()> {
        self.advance("draw_layers", FramePhase::ScrollApplied, FramePhase::LayersDrawn)?;
        self.raster.clear_priority();
        self.raster.fill(self.background_pen);
        for layer in layers.iter_mut() {
            if !self.layer_mask.contains(LayerMask::layer(layer.id())) {
                continue;
            }
            let index = layer.config().gfx;
            let element = gfx
                .get(index)
                .ok_or_else(|| VideoError::out_of_range("gfx element", index, gfx.len()))?;
            layer.validate();
            layer.draw(&mut self.raster, element, flip_screen);
        }
        Ok(())
    }

    pub(crate) fn draw_sprites(
        &mut self,
        sprites: &mut SpriteCompositor,
        gfx: &[GfxElement],
        flip_screen: bool,
    ) -> VideoResult<()> {
        self.advance("draw_sprites", FramePhase::LayersDrawn, FramePhase::SpritesDrawn)?;
        if !self.layer_mask.contains(LayerMask::SPRITES) {
            return Ok(());
        }
        let index = sprites.config().gfx;
        let element = gfx
            .get(index)
            .ok_or_else(|| VideoError::out_of_range("gfx element", index, gfx.len()))?;
        sprites.draw(&mut self.raster, element, flip_screen);
        Ok(())
    }

    pub(crate) fn finish(&mut self) -> VideoResult<()> {
        self.advance("finish", FramePhase::SpritesDrawn, FramePhase::Idle)?;
        self.frames += 1;
        Ok(())
    }

    /// One complete composite pass, `Idle` back to `Idle`.
    pub fn run(&mut self, inputs: FrameInputs<'_>) -> VideoResult<()> {
        let result = self.pass(inputs);
        if result.is_err() {
            self.phase = FramePhase::Idle;
        }
        result
    }

    fn pass(&mut self, inputs: FrameInputs<'_>) -> VideoResult<()> {
        let flip_screen = inputs.registers.flip_screen();
        self.apply_scroll(inputs.layers, inputs.scroll, inputs.registers)?;
        self.draw_layers(inputs.layers, inputs.gfx, flip_screen)?;
        self.draw_sprites(inputs.sprites, inputs.gfx, flip_screen)?;
        self.finish()
    }
}
