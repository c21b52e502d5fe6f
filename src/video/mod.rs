//! Tilemap + sprite video engine.
//!
//! [`VideoSystem`] owns every piece of video state: the tile layers, the
//! sprite compositor, the register file and the frame compositor with its
//! output raster. Hardware differences enter only through the hooks in
//! [`VideoHooks`], which are resolved once in [`VideoSystem::new`].

pub mod bitmap;
pub mod compositor;
pub mod gfx;
pub mod registers;
pub mod sprites;
pub mod tilemap;


use bitmap::{Raster, Rect, SPRITE_TAG};
use compositor::{FrameCompositor, FrameInputs, LayerMask, ScrollFn, MAX_LAYERS};
use gfx::GfxElement;
use registers::{RegisterEffect, RegisterFile, RegisterId};
use sprites::{SpriteAttrFn, SpriteColourFn, SpriteCompositor, SpriteConfig, SpriteTableId};
use tilemap::{LayerConfig, LayerId, ScrambleFn, TileDecodeFn, TileLayer};

use crate::error::{VideoError, VideoResult};
use crate::hooks::{Hook, HookRegistry};

/// Per-variant callables, keyed by the layer or sprite table they serve.
pub struct VideoHooks {
    pub tile_decoders: HookRegistry<LayerId, TileDecodeFn>,
    pub scramblers: HookRegistry<LayerId, ScrambleFn>,
    pub scroll: HookRegistry<LayerId, ScrollFn>,
    pub sprite_attributes: HookRegistry<SpriteTableId, SpriteAttrFn>,
    pub sprite_colour: HookRegistry<SpriteTableId, SpriteColourFn>,
}

impl VideoHooks {
    pub fn new() -> Self {
        Self {
            tile_decoders: HookRegistry::new("tile decoders"),
            scramblers: HookRegistry::new("address scramblers"),
            scroll: HookRegistry::new("scroll resolvers"),
            sprite_attributes: HookRegistry::new("sprite attribute extensions"),
            sprite_colour: HookRegistry::new("sprite colour/priority"),
        }
    }

    fn seal(&mut self) {
        self.tile_decoders.seal();
        self.scramblers.seal();
        self.scroll.seal();
        self.sprite_attributes.seal();
        self.sprite_colour.seal();
    }
}

impl Default for VideoHooks {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete description of one board's video hardware.
pub struct VideoConfig {
    pub screen: Rect,
    pub background_pen: u16,
    pub gfx: Vec<GfxElement>,
    /// Tile layers in back-to-front draw order.
    pub layers: Vec<LayerConfig>,
    pub sprites: SpriteConfig,
    pub hooks: VideoHooks,
}

pub struct VideoSystem {
    gfx: Vec<GfxElement>,
    layers: Vec<TileLayer>,
    scroll: Vec<Hook<ScrollFn>>,
    sprites: SpriteCompositor,
    registers: RegisterFile,
    compositor: FrameCompositor,
    hooks: VideoHooks,
}

impl VideoSystem {
    /// Validates the configuration, binds every hook and seals the registries.
    pub fn new(config: VideoConfig) -> VideoResult<Self> {
        let VideoConfig {
            screen,
            background_pen,
            gfx,
            layers: layer_configs,
            sprites: sprite_config,
            mut hooks,
        } = config;

        if screen.width() == 0 || screen.height() == 0 {
            return Err(VideoError::config(format!("empty visible area {:?}", screen)));
        }
        if layer_configs.len() > MAX_LAYERS {
            return Err(VideoError::config(format!(
                "{} tile layers configured, at most {} supported",
                layer_configs.len(),
                MAX_LAYERS
            )));
        }

        let mut layers = Vec::with_capacity(layer_configs.len());
        let mut scroll = Vec::with_capacity(layer_configs.len());
        for (position, config) in layer_configs.into_iter().enumerate() {
            if usize::from(config.id.0) != position {
                return Err(VideoError::config(format!(
                    "layer {:?} declared at position {}; ids must follow draw order",
                    config.id, position
                )));
            }
            if config.priority_tag >= SPRITE_TAG {
                return Err(VideoError::config(format!(
                    "layer {:?} priority tag {} collides with the sprite tag",
                    config.id, config.priority_tag
                )));
            }
            check_gfx(&gfx, config.gfx, config.tile_width, config.tile_height)?;
            let id = config.id;
            let layer = TileLayer::new(
                config,
                hooks.tile_decoders.capability(id, "tile decoder"),
                hooks.scramblers.capability(id, "address scrambler"),
            )?;
            layers.push(layer);
            scroll.push(hooks.scroll.capability(id, "scroll resolver"));
        }

        check_gfx(&gfx, sprite_config.gfx, sprite_config.tile_width, sprite_config.tile_height)?;
        let sprites = SpriteCompositor::new(
            sprite_config,
            hooks
                .sprite_attributes
                .capability(SpriteTableId::MAIN, "sprite attribute extension"),
            hooks.sprite_colour.capability(SpriteTableId::MAIN, "sprite colour"),
        )?;

        hooks.seal();
        log::debug!(
            "video: {} layer(s), {} sprite descriptors, visible {}x{}",
            layers.len(),
            sprites.table().capacity(),
            screen.width(),
            screen.height()
        );

        Ok(Self {
            registers: RegisterFile::new(layers.len()),
            compositor: FrameCompositor::new(screen, background_pen),
            gfx,
            layers,
            scroll,
            sprites,
            hooks,
        })
    }

    pub fn hooks(&self) -> &VideoHooks {
        &self.hooks
    }

    pub fn layer(&self, id: LayerId) -> VideoResult<&TileLayer> {
        let count = self.layers.len();
        self.layers
            .get(usize::from(id.0))
            .ok_or_else(|| VideoError::out_of_range("tile layer", usize::from(id.0), count))
    }

    pub(crate) fn layer_mut(&mut self, id: LayerId) -> VideoResult<&mut TileLayer> {
        let count = self.layers.len();
        self.layers
            .get_mut(usize::from(id.0))
            .ok_or_else(|| VideoError::out_of_range("tile layer", usize::from(id.0), count))
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn sprites(&self) -> &SpriteCompositor {
        &self.sprites
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn raster(&self) -> &Raster {
        self.compositor.raster()
    }

    pub fn frame_count(&self) -> u64 {
        self.compositor.frames()
    }

    pub fn set_layer_mask(&mut self, mask: LayerMask) {
        self.compositor.set_layer_mask(mask);
    }

    pub(crate) fn write_register(&mut self, register: RegisterId, offset: usize, value: u16) -> VideoResult<()> {
        match self.registers.write(register, offset, value)? {
            RegisterEffect::None => {}
            // Rewriting the current bank leaves the tile cache alone.
            RegisterEffect::BankWritten(id, bank) => {
                self.layer_mut(id)?.set_global_modifier(bank);
            }
        }
        Ok(())
    }

    /// Composites one frame from the current state without latching sprites.
    pub fn render_frame(&mut self) -> VideoResult<&Raster> {
        self.compositor.run(FrameInputs {
            layers: &mut self.layers,
            scroll: &self.scroll,
            registers: &self.registers,
            sprites: &mut self.sprites,
            gfx: &self.gfx,
        })?;
        Ok(self.compositor.raster())
    }

    /// Vertical-blank edge: latch the sprite table, then composite the frame.
    pub fn vblank(&mut self) -> VideoResult<&Raster> {
        self.sprites.latch();
        self.render_frame()
    }

    pub(crate) fn sprites_mut(&mut self) -> &mut SpriteCompositor {
        &mut self.sprites
    }

    pub(crate) fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub(crate) fn compositor_mut(&mut self) -> &mut FrameCompositor {
        &mut self.compositor
    }
}

fn check_gfx(gfx: &[GfxElement], index: usize, tile_width: u32, tile_height: u32) -> VideoResult<()> {
    let element = gfx
        .get(index)
        .ok_or_else(|| VideoError::config(format!("gfx element {} is not configured", index)))?;
    if element.width() != tile_width || element.height() != tile_height {
        return Err(VideoError::config(format!(
            "gfx element {} holds {}x{} tiles, layer expects {}x{}",
            index,
            element.width(),
            element.height(),
            tile_width,
            tile_height
        )));
    }
    Ok(())
}
