//! Power Instinct video board.
//!
//! Two tilemaps and one sprite chip:
//!
//! - background: 256x32 cells of 16x16 tiles, laid out in 256x256 pixel
//!   pages, with a tile bank register feeding the code's upper bits
//! - foreground: 64x32 cells of 8x8 tiles, column scanned, pen 15 transparent
//! - 256 sprites of 16x16 tiles, buffered twice across vblank and drawn
//!   under the foreground layer

use std::rc::Rc;

use crate::error::VideoResult;
use crate::video::bitmap::Rect;
use crate::video::compositor::ScrollFn;
use crate::video::gfx::GfxElement;
use crate::video::registers::{RegisterFile, RegisterId};
use crate::video::sprites::{DrawOrder, SpriteAttributes, SpriteConfig, SpriteDescriptor, SpriteTableId};
use crate::video::tilemap::{scan_cols, LayerConfig, LayerId, TileFlags, TileInfo};
use crate::video::{VideoConfig, VideoHooks, VideoSystem};

pub const SCREEN: Rect = Rect::new(0, 319, 16, 239);

pub const BACKGROUND: LayerId = LayerId(0);
pub const FOREGROUND: LayerId = LayerId(1);

pub const TILE_BANK: RegisterId = RegisterId::TileBank(BACKGROUND);

/// Priority mask keeping sprites behind pixels tagged 2 (the foreground).
pub const UNDER_FOREGROUND: u32 = 0xcccc;

/// Sprite RAM is 0x1000 bytes of 8-word descriptors.
pub const SPRITE_COUNT: usize = 0x1000 / 2 / 8;

const SCROLL_X_OFFSET: i32 = 0x20;

/// Palette bases of the three graphics sets: background, foreground, sprites.
const COLOR_BASES: [u16; 3] = [0x000, 0x100, 0x200];

/// Background VRAM wiring: 16x16 cell pages, two page rows.
pub fn page_scramble(row: u32, col: u32, _rows: u32, _cols: u32) -> u32 {
    (row & 0xf) | ((col & 0xff) << 4) | ((row & 0x10) << 8)
}

/// ```text
/// fedc ---- ---- ----   colour low bits
/// ---- b--- ---- ----   colour high bit
/// ---- -a98 7654 3210   code (banked)
/// ```
pub fn decode_background(raw: u16, bank: u16) -> Option<TileInfo> {
    Some(TileInfo {
        code: u32::from(raw & 0x07ff) | (u32::from(bank) << 11),
        palette_group: ((raw & 0xf000) >> 12) | ((raw & 0x0800) >> 7),
        flags: TileFlags::empty(),
    })
}

pub fn decode_foreground(raw: u16, _bank: u16) -> Option<TileInfo> {
    Some(TileInfo {
        code: u32::from(raw & 0x0fff),
        palette_group: (raw & 0xf000) >> 12,
        flags: TileFlags::empty(),
    })
}

/// Flip X lives in bit 12 and attribute bit 8 is code bit 15. The board
/// has no Y flip.
pub fn sprite_extension(descriptor: &SpriteDescriptor) -> Option<SpriteAttributes> {
    Some(SpriteAttributes {
        code: u32::from(descriptor.code_low & 0x7fff) | (u32::from(descriptor.attr & 0x0100) << 7),
        flip_x: descriptor.attr & 0x1000 != 0,
        flip_y: false,
    })
}

pub fn sprite_colour(colour: u16) -> (u16, u32) {
    (colour & 0x3f, UNDER_FOREGROUND)
}

fn byte_pair(high: u16, low: u16) -> i32 {
    i32::from(low & 0xff) | (i32::from(high & 0xff) << 8)
}

/// Control words 0/1 hold X high/low bytes, words 2/3 Y high/low.
pub fn background_scroll(registers: &RegisterFile) -> (i32, i32) {
    let words = &registers.scroll;
    (
        byte_pair(words[0], words[1]) - SCROLL_X_OFFSET,
        byte_pair(words[2], words[3]),
    )
}

pub fn foreground_scroll(_registers: &RegisterFile) -> (i32, i32) {
    (-SCROLL_X_OFFSET, 0)
}

/// Builds the board configuration around its three graphics sets, in the
/// order background (16x16), foreground (8x8), sprites (16x16).
pub fn config(gfx: [GfxElement; 3]) -> VideoResult<VideoConfig> {
    let gfx: Vec<GfxElement> = gfx
        .into_iter()
        .zip(COLOR_BASES)
        .map(|(element, base)| element.with_color_base(base))
        .collect();

    let mut hooks = VideoHooks::new();
    hooks.tile_decoders.bind(BACKGROUND, Rc::new(decode_background))?;
    hooks.tile_decoders.bind(FOREGROUND, Rc::new(decode_foreground))?;
    hooks.scramblers.bind(BACKGROUND, Rc::new(page_scramble))?;
    hooks.scramblers.bind(FOREGROUND, Rc::new(scan_cols))?;
    let background: Rc<ScrollFn> = Rc::new(background_scroll);
    let foreground: Rc<ScrollFn> = Rc::new(foreground_scroll);
    hooks.scroll.bind(BACKGROUND, background)?;
    hooks.scroll.bind(FOREGROUND, foreground)?;
    hooks.sprite_attributes.bind(SpriteTableId::MAIN, Rc::new(sprite_extension))?;
    hooks.sprite_colour.bind(SpriteTableId::MAIN, Rc::new(sprite_colour))?;

    Ok(VideoConfig {
        screen: SCREEN,
        background_pen: 0,
        gfx,
        layers: vec![
            LayerConfig {
                id: BACKGROUND,
                rows: 0x20,
                cols: 0x100,
                tile_width: 16,
                tile_height: 16,
                gfx: 0,
                transparent_pen: None,
                priority_tag: 1,
            },
            LayerConfig {
                id: FOREGROUND,
                rows: 0x20,
                cols: 0x40,
                tile_width: 8,
                tile_height: 8,
                gfx: 1,
                transparent_pen: Some(15),
                priority_tag: 2,
            },
        ],
        sprites: SpriteConfig {
            capacity: SPRITE_COUNT,
            tile_width: 16,
            tile_height: 16,
            gfx: 2,
            transparent_pen: Some(15),
            buffer_stages: 2,
            draw_order: DrawOrder::LastOnTop,
            ..SpriteConfig::default()
        },
        hooks,
    })
}

pub fn build(gfx: [GfxElement; 3]) -> VideoResult<VideoSystem> {
    VideoSystem::new(config(gfx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusTarget;

    fn solid(size: u32, pens: &[u8]) -> GfxElement {
        let tile = (size * size) as usize;
        let data = pens.iter().flat_map(|&pen| std::iter::repeat(pen).take(tile)).collect();
        GfxElement::from_pens(size, size, 16, data).unwrap()
    }

    fn board() -> VideoSystem {
        build([solid(16, &[1]), solid(8, &[15, 2]), solid(16, &[15, 3])]).unwrap()
    }

    #[test]
    fn test_page_scramble_packs_page_row_into_bit_12() {
        assert_eq!(page_scramble(0x11, 0x05, 0x20, 0x100), 0x1051);
        assert_eq!(page_scramble(0x0f, 0xff, 0x20, 0x100), 0x0fff);
    }

    #[test]
    fn test_page_scramble_is_bijective_over_the_background() {
        let mut seen = vec![false; 0x20 * 0x100];
        for row in 0..0x20 {
            for col in 0..0x100 {
                let offset = page_scramble(row, col, 0x20, 0x100) as usize;
                assert!(offset < seen.len());
                assert!(!seen[offset], "offset {:#x} hit twice", offset);
                seen[offset] = true;
            }
        }
    }

    #[test]
    fn test_background_code_takes_bank_bits() {
        let tile = decode_background(0xa9ff, 2).unwrap();
        assert_eq!(tile.code, 0x11ff);
        assert_eq!(tile.palette_group, 0x1a);
    }

    #[test]
    fn test_foreground_code_is_twelve_bits() {
        let tile = decode_foreground(0x7abc, 5).unwrap();
        assert_eq!(tile.code, 0x0abc);
        assert_eq!(tile.palette_group, 7);
    }

    #[test]
    fn test_sprite_extension_sets_code_bit_15() {
        let descriptor = SpriteDescriptor::unpack(&[0x0001, 0x1100, 0, 0x0042, 0, 0, 0, 0]);
        assert!(descriptor.visible && descriptor.flip_x && descriptor.code_high_bit);
        let attributes = sprite_extension(&descriptor).unwrap();
        assert_eq!(attributes.code, 0x8042);
        assert!(attributes.flip_x);
        assert!(!attributes.flip_y);
    }

    #[test]
    fn test_sprite_colour_is_six_bits_under_foreground() {
        assert_eq!(sprite_colour(0xffc5), (0x05, UNDER_FOREGROUND));
    }

    #[test]
    fn test_background_scroll_joins_byte_pairs() {
        let mut registers = RegisterFile::new(2);
        registers.scroll[..4].copy_from_slice(&[0xff12, 0x0034, 0x0000, 0x0156]);
        assert_eq!(background_scroll(&registers), (0x1234 - 0x20, 0x56));
        assert_eq!(foreground_scroll(&registers), (-0x20, 0));
    }

    #[test]
    fn test_board_shape() {
        let video = board();
        assert_eq!(video.layers().len(), 2);
        assert_eq!(video.layer(BACKGROUND).unwrap().cache_len(), 0x2000);
        assert_eq!(video.layer(FOREGROUND).unwrap().cache_len(), 0x800);
        assert_eq!(video.sprites().table().capacity(), 256);
        assert!(video.sprites().table().staged().is_some());
        assert_eq!(video.raster().clip(), SCREEN);
    }

    #[test]
    fn test_bank_write_only_invalidates_on_change() {
        let mut video = board();
        video.write(BusTarget::Register(TILE_BANK), 0, 3).unwrap();
        video.write(BusTarget::Register(TILE_BANK), 0, 3).unwrap();
        let layer = video.layer(BACKGROUND).unwrap();
        assert_eq!(layer.full_invalidations(), 1);
        assert_eq!(layer.global_modifier(), 3);
    }

    #[test]
    fn test_sprites_show_two_frames_late_and_under_the_foreground() {
        let mut video = board();

        // Foreground cell under screen (0..7, 16..23) after the -0x20 scroll.
        let offset = scan_cols(2, 60, 0x20, 0x40) as usize;
        video.write(BusTarget::Layer(FOREGROUND), offset, 0x0001).unwrap();
        video.write_block(BusTarget::SpriteRam, 0, &[0x0001, 0, 0, 0x0001, 0, 0, 16, 0]).unwrap();

        let raster = video.vblank().unwrap();
        assert_eq!(raster.pixel(8, 16), Some(0x001));

        let raster = video.vblank().unwrap();
        assert_eq!(raster.pixel(0, 16), Some(0x102));
        assert_eq!(raster.pixel(8, 16), Some(0x203));
        assert_eq!(raster.pixel(20, 16), Some(0x001));
        assert_eq!(video.frame_count(), 2);
    }

    #[test]
    fn test_later_sprite_wins_where_sprites_overlap() {
        let mut video = build([solid(16, &[1]), solid(8, &[15, 2]), solid(16, &[15, 3, 4])]).unwrap();
        video.write_block(BusTarget::SpriteRam, 0, &[0x0001, 0, 0, 0x0001, 0, 0, 16, 0]).unwrap();
        video.write_block(BusTarget::SpriteRam, 8, &[0x0001, 0, 0, 0x0002, 0, 0, 16, 0]).unwrap();

        video.vblank().unwrap();
        let raster = video.vblank().unwrap();
        assert_eq!(raster.pixel(8, 16), Some(0x204));
        assert_eq!(raster.priority_at(8, 16), Some(31));
    }
}
