use crate::error::{VideoError, VideoResult};

/// A set of decoded, same-sized tiles stored as one pen per pixel.
#[derive(Debug, Clone)]
pub struct GfxElement {
    width: u32,
    height: u32,
    count: u32,
    granularity: u16,
    color_base: u16,
    pens: Vec<u8>,
}

impl GfxElement {
    /// Builds an element from already-decoded pens, `width * height` per tile.
    pub fn from_pens(width: u32, height: u32, granularity: u16, pens: Vec<u8>) -> VideoResult<Self> {
        let tile_size = width.checked_mul(height).ok_or_else(|| {
            VideoError::config(format!("gfx element {}x{} overflows", width, height))
        })? as usize;
        if tile_size == 0 || granularity == 0 {
            return Err(VideoError::config(format!(
                "gfx element {}x{} with granularity {} is empty",
                width, height, granularity
            )));
        }
        if pens.is_empty() || pens.len() % tile_size != 0 {
            return Err(VideoError::config(format!(
                "gfx data of {} pens is not a whole number of {}x{} tiles",
                pens.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            count: (pens.len() / tile_size) as u32,
            granularity,
            color_base: 0,
            pens,
        })
    }

    /// Decodes packed 4bpp data: two pixels per byte, left pixel in the high nibble.
    pub fn from_packed_4bpp(width: u32, height: u32, data: &[u8]) -> VideoResult<Self> {
        let pens = data
            .iter()
            .flat_map(|&byte| [byte >> 4, byte & 0x0F])
            .collect();
        Self::from_pens(width, height, 16, pens)
    }

    pub fn with_color_base(mut self, color_base: u16) -> Self {
        self.color_base = color_base;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn granularity(&self) -> u16 {
        self.granularity
    }

    /// Pen at (`x`, `y`) inside tile `code`. Codes wrap at the element count
    /// the way the decoded ROM space mirrors on real boards.
    pub fn pen(&self, code: u32, x: u32, y: u32, flip_x: bool, flip_y: bool) -> u8 {
        let x = if flip_x { self.width - 1 - x } else { x };
        let y = if flip_y { self.height - 1 - y } else { y };
        let tile = (code % self.count) as usize;
        let tile_size = (self.width * self.height) as usize;
        self.pens[tile * tile_size + (y * self.width + x) as usize]
    }

    /// Final palette index of `pen` within colour group `group`.
    pub fn color(&self, group: u16, pen: u8) -> u16 {
        self.color_base
            .wrapping_add(group.wrapping_mul(self.granularity))
            .wrapping_add(u16::from(pen))
    }
}
