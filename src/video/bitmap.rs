/// Priority tag reserved for sprite pixels.
pub const SPRITE_TAG: u8 = 31;

/// Inclusive screen rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Rect {
    pub const fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x + 1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y + 1).max(0) as u32
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Mirrors a horizontal coordinate across the rectangle (flip screen).
    pub fn mirror_x(&self, x: i32) -> i32 {
        self.min_x + self.max_x - x
    }

    pub fn mirror_y(&self, y: i32) -> i32 {
        self.min_y + self.max_y - y
    }
}

/// Indexed-colour output raster and its companion priority map.
///
/// Both buffers cover exactly the visible area; coordinates are screen
/// coordinates, so the pixel at `clip.min_x, clip.min_y` is element 0.
#[derive(Debug, Clone)]
pub struct Raster {
    clip: Rect,
    pixels: Vec<u16>,
    priority: Vec<u8>,
}

impl Raster {
    pub fn new(clip: Rect) -> Self {
        let len = (clip.width() * clip.height()) as usize;
        Self {
            clip,
            pixels: vec![0; len],
            priority: vec![0; len],
        }
    }

    pub fn clip(&self) -> Rect {
        self.clip
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.clip.contains(x, y) {
            return None;
        }
        let row = (y - self.clip.min_y) as usize;
        let col = (x - self.clip.min_x) as usize;
        Some(row * self.clip.width() as usize + col)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<u16> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    pub fn priority_at(&self, x: i32, y: i32) -> Option<u8> {
        self.index(x, y).map(|i| self.priority[i])
    }

    pub fn fill(&mut self, pen: u16) {
        self.pixels.fill(pen);
    }

    pub fn clear_priority(&mut self) {
        self.priority.fill(0);
    }

    /// Unconditional layer write: stores the pen and claims the pixel with `tag`.
    pub fn plot(&mut self, x: i32, y: i32, pen: u16, tag: u8) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = pen;
            self.priority[i] = tag;
        }
    }

    /// Priority-tested write. The pen is dropped when the tag already stored
    /// there is one of the bits in `pmask`. Either way the pixel is re-tagged
    /// with `claim`, so a hidden sprite pixel still blocks the sprites drawn
    /// after it. Returns whether the pen was written.
    pub fn plot_masked(&mut self, x: i32, y: i32, pen: u16, pmask: u32, claim: u8) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        let existing = u32::from(self.priority[i] & 0x1F);
        let visible = (1u32 << existing) & pmask == 0;
        if visible {
            self.pixels[i] = pen;
        }
        self.priority[i] = claim;
        visible
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn priority(&self) -> &[u8] {
        &self.priority
    }
}
