use anyhow::{Context, Result, anyhow};
use image::{GrayAlphaImage, LumaA};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};
use tracing::{info, warn};
use ttf_parser::{Face, name_id};
use usvg::fontdb;

use crate::error::{SynthError, SynthResult};
use crate::glyph::Glyph;

/// Renders single characters for printed-text generators.
pub trait FontRasterizer: Send + Sync {
    fn font_ids(&self) -> Vec<String>;

    fn render(&self, character: char, font_id: &str, size: u32) -> SynthResult<Glyph>;
}

#[derive(Clone)]
pub struct LoadedFont {
    id: String,
    data: Arc<Vec<u8>>,
    face_index: u32,
    family: Option<String>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
}

impl std::fmt::Debug for LoadedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFont")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .finish()
    }
}

impl LoadedFont {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }
}

/// Outline rasterizer over `ttf-parser` faces, filled with `tiny-skia`.
#[derive(Debug, Default)]
pub struct TtfRasterizer {
    fonts: Vec<LoadedFont>,
}

impl TtfRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn fonts(&self) -> &[LoadedFont] {
        &self.fonts
    }

    /// Loads font files, recursing into directories.
    pub fn load_paths(&mut self, paths: &[PathBuf]) -> Result<usize> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                collect_font_files(path, &mut files)?;
            } else if path.exists() {
                files.push(path.clone());
            } else {
                return Err(anyhow!("font path not found: {}", path.display()));
            }
        }
        files.sort();
        let mut loaded = 0;
        for file in files {
            match load_font_file(&file) {
                Ok(font) => {
                    self.push(font);
                    loaded += 1;
                }
                Err(err) => warn!("skipping font {}: {:#}", file.display(), err),
            }
        }
        info!("loaded {} font files", loaded);
        Ok(loaded)
    }

    /// Resolves installed families through the system font database.
    pub fn load_system_families(&mut self, families: &[String]) -> usize {
        if families.is_empty() {
            return 0;
        }
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let mut loaded = 0;
        for family in families {
            match load_font_from_family(&db, family) {
                Ok(font) => {
                    self.push(font);
                    loaded += 1;
                }
                Err(err) => warn!("font family unavailable: {:#}", err),
            }
        }
        loaded
    }

    pub fn load_data(&mut self, id: &str, data: Vec<u8>) -> Result<()> {
        let font = LoadedFont::first_in(Arc::new(data), Some(id))
            .ok_or_else(|| anyhow!("failed to parse font data for '{}'", id))?;
        self.push(font);
        Ok(())
    }

    fn push(&mut self, mut font: LoadedFont) {
        let base = font.id.clone();
        let mut suffix = 1;
        while self.fonts.iter().any(|existing| existing.id == font.id) {
            suffix += 1;
            font.id = format!("{}#{}", base, suffix);
        }
        self.fonts.push(font);
    }

    fn font(&self, font_id: &str) -> Option<&LoadedFont> {
        self.fonts.iter().find(|font| font.id == font_id)
    }
}

impl FontRasterizer for TtfRasterizer {
    fn font_ids(&self) -> Vec<String> {
        self.fonts.iter().map(|font| font.id.clone()).collect()
    }

    fn render(&self, character: char, font_id: &str, size: u32) -> SynthResult<Glyph> {
        let font = self
            .font(font_id)
            .ok_or_else(|| SynthError::invalid_glyph(character, format!("unknown font '{}'", font_id)))?;
        rasterize_glyph(font, character, size)
    }
}

fn rasterize_glyph(font: &LoadedFont, character: char, size: u32) -> SynthResult<Glyph> {
    let face = Face::parse(&font.data, font.face_index)
        .map_err(|err| SynthError::invalid_glyph(character, format!("font parse: {}", err)))?;
    let glyph_id = face.glyph_index(character).ok_or_else(|| {
        SynthError::invalid_glyph(character, format!("not covered by font '{}'", font.id))
    })?;
    let scale = size as f32 / font.units_per_em.max(1) as f32;
    let ascender = font.ascender as f32 * scale;
    let descender = font.descender as f32 * scale;
    let cell_height = (ascender - descender).ceil().max(1.0) as u32;

    let mut builder = SkiaOutline(PathBuilder::new());
    let bbox = face
        .outline_glyph(glyph_id, &mut builder)
        .ok_or_else(|| SynthError::invalid_glyph(character, "glyph has no outline"))?;
    let path = builder
        .0
        .finish()
        .ok_or_else(|| SynthError::invalid_glyph(character, "empty outline path"))?;

    let advance = face
        .glyph_hor_advance(glyph_id)
        .map(|value| value as f32 * scale)
        .unwrap_or(bbox.x_max as f32 * scale);
    let left = (bbox.x_min as f32 * scale).min(0.0).floor();
    let right = (bbox.x_max as f32 * scale).max(advance).ceil();
    let cell_width = (right - left).max(1.0) as u32;

    let mut pixmap = Pixmap::new(cell_width, cell_height)
        .ok_or_else(|| SynthError::invalid_glyph(character, "empty glyph canvas"))?;
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    paint.anti_alias = true;
    let transform = Transform::from_row(scale, 0.0, 0.0, -scale, -left, ascender);
    pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);

    let mut image = GrayAlphaImage::new(cell_width, cell_height);
    for (pixel, rgba) in image.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        *pixel = LumaA([0, rgba[3]]);
    }
    Ok(Glyph::new(character, image, font.id.clone())?.with_baseline(ascender.round() as u32))
}

struct SkiaOutline(PathBuilder);

impl ttf_parser::OutlineBuilder for SkiaOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

fn collect_font_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list font directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_font_files(&path, files)?;
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
            .unwrap_or(false);
        if is_font {
            files.push(path);
        }
    }
    Ok(())
}

pub fn load_font_file(path: &Path) -> Result<LoadedFont> {
    let data =
        fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    let stem = path.file_stem().and_then(|stem| stem.to_str());
    LoadedFont::first_in(Arc::new(data), stem)
        .ok_or_else(|| anyhow!("failed to parse font: {}", path.display()))
}

impl LoadedFont {
    /// Reads the metrics of face `face_index`. The id is `id`, else the
    /// face's family name, else `font-<index>`.
    fn from_face(data: Arc<Vec<u8>>, face_index: u32, id: Option<&str>) -> Option<Self> {
        let face = Face::parse(&data, face_index).ok()?;
        let family = family_name(&face);
        let (units_per_em, ascender, descender) =
            (face.units_per_em().max(1), face.ascender(), face.descender());
        let id = id
            .map(str::to_string)
            .or_else(|| family.clone())
            .unwrap_or_else(|| format!("font-{}", face_index));
        Some(Self {
            id,
            data,
            face_index,
            family,
            units_per_em,
            ascender,
            descender,
        })
    }

    /// First parsable face of a font file or collection.
    fn first_in(data: Arc<Vec<u8>>, id: Option<&str>) -> Option<Self> {
        let faces = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        (0..faces).find_map(|index| Self::from_face(data.clone(), index, id))
    }
}

fn load_font_from_family(db: &fontdb::Database, family: &str) -> Result<LoadedFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        [fontdb::Family::SansSerif]
    } else {
        [fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let mut font = LoadedFont::from_face(Arc::new(data), face_index, None)
        .ok_or_else(|| anyhow!("failed to parse font for family: {}", family))?;
    if font.family.is_none() {
        font.id = family.to_string();
    }
    Ok(font)
}

/// Typographic family (name id 16) when present, plain family (id 1) otherwise.
fn family_name(face: &Face<'_>) -> Option<String> {
    [name_id::TYPOGRAPHIC_FAMILY, name_id::FAMILY]
        .into_iter()
        .find_map(|wanted| {
            face.names()
                .into_iter()
                .filter(|name| name.name_id == wanted)
                .find_map(|name| name.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_font_data_is_rejected() {
        let mut rasterizer = TtfRasterizer::new();
        assert!(rasterizer.load_data("junk", vec![0u8; 64]).is_err());
        assert!(rasterizer.is_empty());
    }

    #[test]
    fn unknown_font_id_is_an_invalid_glyph() {
        let rasterizer = TtfRasterizer::new();
        let err = rasterizer.render('a', "missing", 32).unwrap_err();
        assert!(matches!(err, SynthError::InvalidGlyph { character: 'a', .. }));
    }

    #[test]
    fn missing_font_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut rasterizer = TtfRasterizer::new();
        assert!(rasterizer.load_paths(&[dir.path().join("none.ttf")]).is_err());
        assert_eq!(rasterizer.load_paths(&[dir.path().to_path_buf()]).unwrap(), 0);
    }

    #[test]
    fn system_sans_serif_renders_with_baseline() {
        let mut rasterizer = TtfRasterizer::new();
        if rasterizer.load_system_families(&["sans-serif".to_string()]) == 0 {
            return;
        }
        let id = rasterizer.font_ids()[0].clone();
        let Ok(glyph) = rasterizer.render('H', &id, 40) else {
            return;
        };
        assert!(glyph.has_alpha());
        let baseline = glyph.baseline().expect("baseline");
        let extent = glyph.ink_extent().expect("ink");
        assert!(extent.bottom <= baseline + 1);
        assert!(rasterizer.render(' ', &id, 40).is_err());
    }

    #[test]
    fn repeated_family_gets_a_distinct_id() {
        let mut rasterizer = TtfRasterizer::new();
        let families = vec!["sans-serif".to_string(), "sans-serif".to_string()];
        if rasterizer.load_system_families(&families) < 2 {
            return;
        }
        let ids = rasterizer.font_ids();
        assert_eq!(ids[1], format!("{}#2", ids[0]));
        assert_eq!(rasterizer.fonts()[0].family(), rasterizer.fonts()[1].family());
    }
}
