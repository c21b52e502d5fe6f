use super::bitmap::{Raster, SPRITE_TAG};
use super::gfx::GfxElement;
use crate::error::{VideoError, VideoResult};
use crate::hooks::Hook;

/// Words per hardware sprite descriptor.
pub const DESCRIPTOR_WORDS: usize = 8;

/// One unpacked sprite descriptor.
///
/// Word layout of this sprite chip family:
///
/// ```text
/// 0  ---- ---- ---- ---0   visible
/// 1  --d- ---- ---- ----   flip Y
///    ---c ---- ---- ----   flip X
///    ---- ---8 ---- ----   code high bit
///    ---- ---- 7654 ----   tiles high - 1
///    ---- ---- ---- 3210   tiles wide - 1
/// 3  -edc ba98 7654 3210   code low bits
/// 4  x
/// 6  y
/// 7  ---- ---- --54 3210   colour
/// ```
///
/// The raw attribute and colour words are kept so variant hooks can read bits
/// the generic layout does not name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteDescriptor {
    pub visible: bool,
    pub flip_x: bool,
    pub flip_y: bool,
    pub code_high_bit: bool,
    pub tiles_wide_minus1: u8,
    pub tiles_high_minus1: u8,
    pub code_low: u16,
    pub x: u16,
    pub y: u16,
    pub color_group: u8,
    pub attr: u16,
    pub color_word: u16,
}

impl SpriteDescriptor {
    pub fn unpack(words: &[u16; DESCRIPTOR_WORDS]) -> Self {
        let attr = words[1];
        Self {
            visible: words[0] & 0x0001 != 0,
            flip_x: attr & 0x1000 != 0,
            flip_y: attr & 0x2000 != 0,
            code_high_bit: attr & 0x0100 != 0,
            tiles_wide_minus1: (attr & 0x000F) as u8,
            tiles_high_minus1: ((attr >> 4) & 0x000F) as u8,
            code_low: words[3] & 0x7FFF,
            x: words[4],
            y: words[6],
            color_group: (words[7] & 0x003F) as u8,
            attr,
            color_word: words[7],
        }
    }

    pub fn pack(&self) -> [u16; DESCRIPTOR_WORDS] {
        let mut attr = self.attr & !0x31FF;
        attr |= u16::from(self.tiles_wide_minus1 & 0x0F);
        attr |= u16::from(self.tiles_high_minus1 & 0x0F) << 4;
        if self.code_high_bit {
            attr |= 0x0100;
        }
        if self.flip_x {
            attr |= 0x1000;
        }
        if self.flip_y {
            attr |= 0x2000;
        }
        [
            u16::from(self.visible),
            attr,
            0,
            self.code_low & 0x7FFF,
            self.x,
            0,
            self.y,
            (self.color_word & !0x003F) | u16::from(self.color_group & 0x3F),
        ]
    }
}

/// Final code and flips resolved by the attribute-extension hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteAttributes {
    pub code: u32,
    pub flip_x: bool,
    pub flip_y: bool,
}

/// Attribute extension: where the high code bit and flips really live.
pub type SpriteAttrFn = dyn Fn(&SpriteDescriptor) -> Option<SpriteAttributes>;

/// Colour/priority: `raw colour word -> (colour group, priority mask)`.
pub type SpriteColourFn = dyn Fn(u16) -> (u16, u32);

/// A visible sprite ready to blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub x: i32,
    pub y: i32,
    pub width_tiles: u32,
    pub height_tiles: u32,
    pub code: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub color_group: u16,
    pub pmask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpriteTableId(pub u8);

impl SpriteTableId {
    pub const MAIN: Self = Self(0);
}

/// Which end of the table wins where sprites overlap. Decoding always walks
/// the table in order; only the blit order changes, and every blit claims
/// its pixels with the sprite tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOrder {
    /// Earlier entries claim pixels; later ones are hidden behind them.
    FirstOnTop,
    /// Later entries win. The table is blitted back to front so the
    /// front-most sprite still claims its pixels first.
    LastOnTop,
}

#[derive(Debug, Clone)]
pub struct SpriteConfig {
    /// Number of descriptors in each buffer.
    pub capacity: usize,
    pub tile_width: u32,
    pub tile_height: u32,
    pub gfx: usize,
    pub transparent_pen: Option<u8>,
    /// 1: vblank copies pending straight to live. 2: the copy goes through
    /// an intermediate buffer, adding a frame of latency.
    pub buffer_stages: usize,
    pub draw_order: DrawOrder,
    pub x_offset: i32,
    pub y_offset: i32,
    /// Sprite coordinates wrap inside this power-of-two space.
    pub coord_mask: u16,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            tile_width: 16,
            tile_height: 16,
            gfx: 0,
            transparent_pen: Some(15),
            buffer_stages: 1,
            draw_order: DrawOrder::FirstOnTop,
            x_offset: 0,
            y_offset: 0,
            coord_mask: 0x1FF,
        }
    }
}

/// Double-buffered descriptor RAM.
///
/// Bus writes only ever touch `pending`; drawing only ever reads `live`;
/// [`latch`](Self::latch) is the sole bridge between them.
#[derive(Debug, Clone)]
pub struct SpriteTable {
    pending: Vec<u16>,
    staged: Option<Vec<u16>>,
    live: Vec<u16>,
}

impl SpriteTable {
    pub fn new(capacity: usize, buffer_stages: usize) -> Self {
        let words = capacity * DESCRIPTOR_WORDS;
        Self {
            pending: vec![0; words],
            staged: (buffer_stages > 1).then(|| vec![0; words]),
            live: vec![0; words],
        }
    }

    pub fn capacity(&self) -> usize {
        self.live.len() / DESCRIPTOR_WORDS
    }

    pub fn write_pending(&mut self, offset: usize, value: u16) -> VideoResult<()> {
        let len = self.pending.len();
        let word = self
            .pending
            .get_mut(offset)
            .ok_or_else(|| VideoError::out_of_range("sprite RAM word", offset, len))?;
        *word = value;
        Ok(())
    }

    pub fn read_pending(&self, offset: usize) -> VideoResult<u16> {
        self.pending
            .get(offset)
            .copied()
            .ok_or_else(|| VideoError::out_of_range("sprite RAM word", offset, self.pending.len()))
    }

    /// Vertical-blank copy. Runs to completion under `&mut self`, so no
    /// write can interleave with it and no reader sees a partial copy.
    pub fn latch(&mut self) {
        match self.staged.as_mut() {
            Some(staged) => {
                self.live.copy_from_slice(staged);
                staged.copy_from_slice(&self.pending);
            }
            None => self.live.copy_from_slice(&self.pending),
        }
    }

    pub fn live_descriptor(&self, index: usize) -> VideoResult<SpriteDescriptor> {
        let capacity = self.capacity();
        if index >= capacity {
            return Err(VideoError::out_of_range("sprite descriptor", index, capacity));
        }
        let base = index * DESCRIPTOR_WORDS;
        let mut words = [0u16; DESCRIPTOR_WORDS];
        words.copy_from_slice(&self.live[base..base + DESCRIPTOR_WORDS]);
        Ok(SpriteDescriptor::unpack(&words))
    }

    pub fn pending(&self) -> &[u16] {
        &self.pending
    }

    pub fn staged(&self) -> Option<&[u16]> {
        self.staged.as_deref()
    }

    pub fn live(&self) -> &[u16] {
        &self.live
    }

    pub(crate) fn restore(&mut self, pending: &[u16], staged: Option<&[u16]>, live: &[u16]) -> VideoResult<()> {
        let words = self.live.len();
        if pending.len() != words || live.len() != words {
            return Err(VideoError::save_state(format!(
                "sprite buffers hold {} words, saved state has {}/{}",
                words,
                pending.len(),
                live.len()
            )));
        }
        match (self.staged.as_mut(), staged) {
            (Some(ours), Some(saved)) if saved.len() == words => ours.copy_from_slice(saved),
            (None, None) => {}
            _ => {
                return Err(VideoError::save_state(
                    "sprite buffer stage count does not match saved state",
                ))
            }
        }
        self.pending.copy_from_slice(pending);
        self.live.copy_from_slice(live);
        Ok(())
    }
}

/// Sprite layer: descriptor buffers plus the hooks that interpret them.
#[derive(Debug)]
pub struct SpriteCompositor {
    config: SpriteConfig,
    table: SpriteTable,
    attributes: Hook<SpriteAttrFn>,
    colour: Hook<SpriteColourFn>,
    skipped: u64,
}

impl SpriteCompositor {
    pub fn new(
        config: SpriteConfig,
        attributes: Hook<SpriteAttrFn>,
        colour: Hook<SpriteColourFn>,
    ) -> VideoResult<Self> {
        if config.capacity == 0 || config.tile_width == 0 || config.tile_height == 0 {
            return Err(VideoError::config("sprite table needs a capacity and a tile size"));
        }
        if !(1..=2).contains(&config.buffer_stages) {
            return Err(VideoError::config(format!(
                "sprite buffer stages must be 1 or 2, got {}",
                config.buffer_stages
            )));
        }
        if !(u32::from(config.coord_mask) + 1).is_power_of_two() {
            return Err(VideoError::config(format!(
                "sprite coordinate mask {:#x} is not a power of two minus one",
                config.coord_mask
            )));
        }
        Ok(Self {
            table: SpriteTable::new(config.capacity, config.buffer_stages),
            config,
            attributes,
            colour,
            skipped: 0,
        })
    }

    pub fn config(&self) -> &SpriteConfig {
        &self.config
    }

    pub fn table(&self) -> &SpriteTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut SpriteTable {
        &mut self.table
    }

    pub fn write_pending(&mut self, offset: usize, value: u16) -> VideoResult<()> {
        self.table.write_pending(offset, value)
    }

    pub fn latch(&mut self) {
        self.table.latch();
    }

    /// Sprites dropped because a hook produced no attributes.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn wrap(&self, raw: u16, offset: i32) -> i32 {
        (i32::from(raw & self.config.coord_mask) + offset) & i32::from(self.config.coord_mask)
    }

    /// Resolves one descriptor into a draw command; `None` when invisible or
    /// when the attribute hook cannot interpret it.
    pub fn decode(&self, descriptor: &SpriteDescriptor) -> Option<DrawCommand> {
        if !descriptor.visible {
            return None;
        }
        let attributes = match self.attributes.get() {
            Some(extend) => extend(descriptor)?,
            None => SpriteAttributes {
                code: u32::from(descriptor.code_low),
                flip_x: descriptor.flip_x,
                flip_y: descriptor.flip_y,
            },
        };
        let (color_group, pmask) = match self.colour.get() {
            Some(colour) => colour(descriptor.color_word),
            None => (u16::from(descriptor.color_group), 0),
        };
        Some(DrawCommand {
            x: self.wrap(descriptor.x, self.config.x_offset),
            y: self.wrap(descriptor.y, self.config.y_offset),
            width_tiles: u32::from(descriptor.tiles_wide_minus1) + 1,
            height_tiles: u32::from(descriptor.tiles_high_minus1) + 1,
            code: attributes.code,
            flip_x: attributes.flip_x,
            flip_y: attributes.flip_y,
            color_group,
            pmask,
        })
    }

    /// Draw commands for the live table, in table order.
    pub fn commands(&mut self) -> Vec<DrawCommand> {
        let mut commands = Vec::new();
        for index in 0..self.table.capacity() {
            let Ok(descriptor) = self.table.live_descriptor(index) else {
                break;
            };
            match self.decode(&descriptor) {
                Some(command) => commands.push(command),
                None if descriptor.visible => {
                    self.skipped += 1;
                    log::trace!("sprite {}: attribute hook gave no value, skipped", index);
                }
                None => {}
            }
        }
        commands
    }

    pub fn draw(&mut self, raster: &mut Raster, gfx: &GfxElement, flip_screen: bool) {
        let mut commands = self.commands();
        if self.config.draw_order == DrawOrder::LastOnTop {
            commands.reverse();
        }
        for command in &commands {
            self.blit(raster, gfx, command, command.pmask | (1u32 << SPRITE_TAG), flip_screen);
        }
    }

    /// Column-major multi-tile blit; the tile code advances once per tile.
    fn blit(&self, raster: &mut Raster, gfx: &GfxElement, command: &DrawCommand, pmask: u32, flip_screen: bool) {
        let clip = raster.clip();
        let (tile_w, tile_h) = (self.config.tile_width as i32, self.config.tile_height as i32);
        let span = i32::from(self.config.coord_mask) + 1;
        let (w, h) = (command.width_tiles as i32, command.height_tiles as i32);
        let mut code = command.code;

        for tx in 0..w {
            for ty in 0..h {
                let col = if command.flip_x { w - 1 - tx } else { tx };
                let row = if command.flip_y { h - 1 - ty } else { ty };
                let mut x = (command.x + col * tile_w) & (span - 1);
                let mut y = (command.y + row * tile_h) & (span - 1);
                if x > clip.max_x {
                    x -= span;
                }
                if y > clip.max_y {
                    y -= span;
                }
                let (mut flip_x, mut flip_y) = (command.flip_x, command.flip_y);
                if flip_screen {
                    x = clip.mirror_x(x + tile_w - 1);
                    y = clip.mirror_y(y + tile_h - 1);
                    flip_x = !flip_x;
                    flip_y = !flip_y;
                }
                self.blit_tile(raster, gfx, code, command.color_group, (x, y), (flip_x, flip_y), pmask);
                code = code.wrapping_add(1);
            }
        }
    }

    fn blit_tile(
        &self,
        raster: &mut Raster,
        gfx: &GfxElement,
        code: u32,
        color_group: u16,
        (x, y): (i32, i32),
        (flip_x, flip_y): (bool, bool),
        pmask: u32,
    ) {
        let clip = raster.clip();
        let (tile_w, tile_h) = (self.config.tile_width, self.config.tile_height);
        if x + tile_w as i32 <= clip.min_x || x > clip.max_x || y + tile_h as i32 <= clip.min_y || y > clip.max_y {
            return;
        }
        for py in 0..tile_h {
            for px in 0..tile_w {
                let pen = gfx.pen(code, px, py, flip_x, flip_y);
                if self.config.transparent_pen == Some(pen) {
                    continue;
                }
                raster.plot_masked(x + px as i32, y + py as i32, gfx.color(color_group, pen), pmask, SPRITE_TAG);
            }
        }
    }
}
