use bitflags::bitflags;

use super::bitmap::Raster;
use super::gfx::GfxElement;
use crate::error::{VideoError, VideoResult};
use crate::hooks::Hook;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TileFlags: u8 {
        const FLIP_X = 0b00000001;
        const FLIP_Y = 0b00000010;
    }
}

/// A decoded tilemap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileInfo {
    pub code: u32,
    pub palette_group: u16,
    pub flags: TileFlags,
}

/// Attribute decoder: `(raw word, global modifier) -> tile`. `None` renders
/// the cell transparent.
pub type TileDecodeFn = dyn Fn(u16, u16) -> Option<TileInfo>;

/// Address scrambler: `(row, col, rows, cols) -> backing offset`.
pub type ScrambleFn = dyn Fn(u32, u32, u32, u32) -> u32;

/// Row-major scan, the wiring used when no scrambler is bound.
pub fn scan_rows(row: u32, col: u32, _rows: u32, cols: u32) -> u32 {
    row * cols + col
}

/// Column-major scan.
pub fn scan_cols(row: u32, col: u32, rows: u32, _cols: u32) -> u32 {
    col * rows + row
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u8);

/// Static shape of one tile layer.
#[derive(Debug, Clone)]
pub struct LayerConfig {
    pub id: LayerId,
    pub rows: u32,
    pub cols: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Index of the graphics element the layer draws from.
    pub gfx: usize,
    pub transparent_pen: Option<u8>,
    /// Tag written into the priority map for every pixel this layer draws.
    pub priority_tag: u8,
}

impl LayerConfig {
    fn product(&self, what: &str, a: u32, b: u32) -> VideoResult<u32> {
        a.checked_mul(b).ok_or_else(|| {
            VideoError::config(format!("layer {:?}: {} {}x{} overflows", self.id, what, a, b))
        })
    }

    pub fn cells(&self) -> VideoResult<usize> {
        Ok(self.product("cell count", self.rows, self.cols)? as usize)
    }

    pub fn pixel_width(&self) -> VideoResult<u32> {
        self.product("pixel width", self.cols, self.tile_width)
    }

    pub fn pixel_height(&self) -> VideoResult<u32> {
        self.product("pixel height", self.rows, self.tile_height)
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    stamp: Option<u64>,
    tile: Option<TileInfo>,
}

impl CacheEntry {
    const STALE: Self = Self {
        stamp: None,
        tile: None,
    };
}

/// One tilemap: backing VRAM words, the decoded-tile cache and its hooks.
#[derive(Debug)]
pub struct TileLayer {
    config: LayerConfig,
    backing: Vec<u16>,
    cache: Vec<CacheEntry>,
    generation: u64,
    modifier: u16,
    scroll_x: i32,
    scroll_y: i32,
    decoder: Hook<TileDecodeFn>,
    scrambler: Hook<ScrambleFn>,
    decode_calls: u64,
    full_invalidations: u64,
}

impl TileLayer {
    pub fn new(
        config: LayerConfig,
        decoder: Hook<TileDecodeFn>,
        scrambler: Hook<ScrambleFn>,
    ) -> VideoResult<Self> {
        if config.rows == 0 || config.cols == 0 || config.tile_width == 0 || config.tile_height == 0 {
            return Err(VideoError::config(format!(
                "layer {:?} has empty dimensions {}x{} cells of {}x{}",
                config.id, config.cols, config.rows, config.tile_width, config.tile_height
            )));
        }
        let cells = config.cells()?;
        config.pixel_width()?;
        config.pixel_height()?;
        let layer = Self {
            backing: vec![0; cells],
            cache: vec![CacheEntry::STALE; cells],
            generation: 1,
            modifier: 0,
            scroll_x: 0,
            scroll_y: 0,
            decoder,
            scrambler,
            decode_calls: 0,
            full_invalidations: 0,
            config,
        };
        layer.check_scrambler()?;
        Ok(layer)
    }

    /// Every visible cell must land on its own backing slot.
    fn check_scrambler(&self) -> VideoResult<()> {
        let mut seen = vec![false; self.backing.len()];
        for row in 0..self.config.rows {
            for col in 0..self.config.cols {
                let offset = self.scramble(row, col);
                match seen.get_mut(offset) {
                    Some(slot) if !*slot => *slot = true,
                    Some(_) => {
                        return Err(VideoError::config(format!(
                            "layer {:?}: scrambler maps ({}, {}) onto already used offset {:#x}",
                            self.config.id, row, col, offset
                        )))
                    }
                    None => {
                        return Err(VideoError::config(format!(
                            "layer {:?}: scrambler maps ({}, {}) outside backing ({:#x} >= {:#x})",
                            self.config.id,
                            row,
                            col,
                            offset,
                            self.backing.len()
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    fn scramble(&self, row: u32, col: u32) -> usize {
        let (rows, cols) = (self.config.rows, self.config.cols);
        let offset = match self.scrambler.get() {
            Some(scramble) => scramble(row, col, rows, cols),
            None => scan_rows(row, col, rows, cols),
        };
        offset as usize
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn id(&self) -> LayerId {
        self.config.id
    }

    pub fn read(&self, offset: usize) -> VideoResult<u16> {
        self.backing
            .get(offset)
            .copied()
            .ok_or_else(|| VideoError::out_of_range("tile layer word", offset, self.backing.len()))
    }

    /// Stores a backing word. Only the cache entry fed by `offset` goes stale,
    /// and only when the stored value actually changes.
    pub fn write(&mut self, offset: usize, value: u16) -> VideoResult<()> {
        let len = self.backing.len();
        let word = self
            .backing
            .get_mut(offset)
            .ok_or_else(|| VideoError::out_of_range("tile layer word", offset, len))?;
        if *word != value {
            *word = value;
            self.cache[offset] = CacheEntry::STALE;
        }
        Ok(())
    }

    pub fn global_modifier(&self) -> u16 {
        self.modifier
    }

    /// Updates the value every decode sees (e.g. a tile bank). A change
    /// invalidates the whole cache; rewriting the same value does nothing.
    pub fn set_global_modifier(&mut self, value: u16) -> bool {
        if value == self.modifier {
            return false;
        }
        self.modifier = value;
        self.mark_all_dirty();
        true
    }

    pub fn mark_all_dirty(&mut self) {
        self.generation += 1;
        self.full_invalidations += 1;
        log::debug!(
            "layer {:?}: full invalidation, generation {}",
            self.config.id,
            self.generation
        );
    }

    fn resolve_entry(&mut self, index: usize) -> Option<TileInfo> {
        let entry = self.cache[index];
        if entry.stamp == Some(self.generation) {
            return entry.tile;
        }
        let raw = self.backing[index];
        self.decode_calls += 1;
        let tile = match self.decoder.get() {
            Some(decode) => decode(raw, self.modifier),
            None => Some(TileInfo {
                code: u32::from(raw),
                ..TileInfo::default()
            }),
        };
        self.cache[index] = CacheEntry {
            stamp: Some(self.generation),
            tile,
        };
        tile
    }

    /// Re-decodes every stale entry. Valid entries are left untouched and
    /// cost no decoder call. Returns the number of entries decoded.
    pub fn validate(&mut self) -> usize {
        let mut decoded = 0;
        let mut failed = 0;
        for index in 0..self.cache.len() {
            if self.cache[index].stamp == Some(self.generation) {
                continue;
            }
            decoded += 1;
            if self.resolve_entry(index).is_none() {
                failed += 1;
            }
        }
        if failed > 0 {
            log::warn!(
                "layer {:?}: {} tile(s) failed to decode and will be transparent",
                self.config.id,
                failed
            );
        }
        decoded
    }

    /// Backing offset of a logical cell.
    pub fn tile_offset(&self, row: u32, col: u32) -> VideoResult<usize> {
        if row >= self.config.rows {
            return Err(VideoError::out_of_range("tile row", row as usize, self.config.rows as usize));
        }
        if col >= self.config.cols {
            return Err(VideoError::out_of_range("tile column", col as usize, self.config.cols as usize));
        }
        let offset = self.scramble(row, col);
        if offset >= self.backing.len() {
            return Err(VideoError::out_of_range("scrambled offset", offset, self.backing.len()));
        }
        Ok(offset)
    }

    /// Decoded tile of a logical cell, re-decoding it first if stale.
    pub fn lookup(&mut self, row: u32, col: u32) -> VideoResult<Option<TileInfo>> {
        let offset = self.tile_offset(row, col)?;
        Ok(self.resolve_entry(offset))
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.cache
            .get(index)
            .map_or(false, |entry| entry.stamp != Some(self.generation))
    }

    pub fn dirty_count(&self) -> usize {
        (0..self.cache.len()).filter(|&i| self.is_dirty(i)).count()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn decode_calls(&self) -> u64 {
        self.decode_calls
    }

    pub fn full_invalidations(&self) -> u64 {
        self.full_invalidations
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn set_scroll(&mut self, scroll_x: i32, scroll_y: i32) {
        self.scroll_x = scroll_x;
        self.scroll_y = scroll_y;
    }

    pub fn scroll(&self) -> (i32, i32) {
        (self.scroll_x, self.scroll_y)
    }

    pub fn backing(&self) -> &[u16] {
        &self.backing
    }

    /// Reloads persisted state. The cache is derived data, so all of it goes stale.
    pub(crate) fn restore(&mut self, backing: &[u16], modifier: u16, scroll: (i32, i32)) -> VideoResult<()> {
        if backing.len() != self.backing.len() {
            return Err(VideoError::save_state(format!(
                "layer {:?}: saved backing has {} words, expected {}",
                self.config.id,
                backing.len(),
                self.backing.len()
            )));
        }
        self.backing.copy_from_slice(backing);
        self.modifier = modifier;
        (self.scroll_x, self.scroll_y) = scroll;
        self.mark_all_dirty();
        Ok(())
    }

    /// Draws the layer over the whole raster in scan order.
    pub fn draw(&mut self, raster: &mut Raster, gfx: &GfxElement, flip_screen: bool) {
        let clip = raster.clip();
        let (tile_w, tile_h) = (self.config.tile_width, self.config.tile_height);
        let width_px = i64::from(self.config.cols) * i64::from(tile_w);
        let height_px = i64::from(self.config.rows) * i64::from(tile_h);

        for sy in clip.min_y..=clip.max_y {
            let ly = if flip_screen { clip.mirror_y(sy) } else { sy };
            let py = (i64::from(ly) + i64::from(self.scroll_y)).rem_euclid(height_px) as u32;
            let (row, fine_y) = (py / tile_h, py % tile_h);

            for sx in clip.min_x..=clip.max_x {
                let lx = if flip_screen { clip.mirror_x(sx) } else { sx };
                let px = (i64::from(lx) + i64::from(self.scroll_x)).rem_euclid(width_px) as u32;
                let (col, fine_x) = (px / tile_w, px % tile_w);

                let Ok(offset) = self.tile_offset(row, col) else {
                    continue;
                };
                let Some(tile) = self.resolve_entry(offset) else {
                    continue;
                };
                let pen = gfx.pen(
                    tile.code,
                    fine_x,
                    fine_y,
                    tile.flags.contains(TileFlags::FLIP_X),
                    tile.flags.contains(TileFlags::FLIP_Y),
                );
                if self.config.transparent_pen == Some(pen) {
                    continue;
                }
                raster.plot(sx, sy, gfx.color(tile.palette_group, pen), self.config.priority_tag);
            }
        }
    }
}
