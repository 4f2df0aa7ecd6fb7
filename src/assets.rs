use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::glyph::Glyph;

/// Read-only source of pre-rasterized character images.
pub trait GlyphAssetStore: Send + Sync {
    /// Candidates for `character`; glyphs of `style_hint` come first when
    /// present. An empty list means the character has no asset.
    fn lookup(&self, character: char, style_hint: Option<&str>) -> Vec<Arc<Glyph>>;

    fn characters(&self) -> Vec<char>;

    fn styles(&self) -> Vec<String>;

    fn contains(&self, character: char) -> bool {
        !self.lookup(character, None).is_empty()
    }
}

/// Process-local glyph cache. Load it once, wrap it in an `Arc`, hand it to
/// the workers; nothing mutates it after loading.
#[derive(Debug, Default)]
pub struct GlyphCache {
    glyphs: BTreeMap<char, BTreeMap<String, Arc<Glyph>>>,
}

impl GlyphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_glyphs(glyphs: impl IntoIterator<Item = Glyph>) -> Self {
        let mut cache = Self::new();
        for glyph in glyphs {
            cache.insert(glyph);
        }
        cache
    }

    pub fn insert(&mut self, glyph: Glyph) {
        self.glyphs
            .entry(glyph.character())
            .or_default()
            .insert(glyph.style_id().to_string(), Arc::new(glyph));
    }

    pub fn len(&self) -> usize {
        self.glyphs.values().map(|styles| styles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Loads `style_code.(png|jpg)` files from `image_dir`, mapping codes to
    /// characters through a `char : code` dictionary.
    pub fn load(char_dict: &Path, image_dir: &Path) -> Result<Self> {
        let dict = load_char_dict(char_dict)?;
        let mut cache = Self::new();
        let mut paths: Vec<PathBuf> = fs::read_dir(image_dir)
            .with_context(|| format!("failed to list glyph directory: {}", image_dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| has_image_extension(path))
            .collect();
        paths.sort();

        let mut skipped = 0usize;
        for path in paths {
            let Some((style, code)) = parse_glyph_file_name(&path) else {
                skipped += 1;
                continue;
            };
            let Some(&character) = dict.get(&code) else {
                skipped += 1;
                continue;
            };
            match load_glyph_file(&path, character, &style) {
                Ok(glyph) => cache.insert(glyph),
                Err(err) => {
                    warn!("skipping glyph {}: {:#}", path.display(), err);
                    skipped += 1;
                }
            }
        }
        info!(
            "loaded {} glyphs for {} characters ({} files skipped)",
            cache.len(),
            cache.glyphs.len(),
            skipped
        );
        Ok(cache)
    }

    /// Drops every cached glyph. Workers still holding an `Arc` keep theirs alive.
    pub fn teardown(self) {
        debug!("releasing glyph cache with {} glyphs", self.len());
    }
}

impl GlyphAssetStore for GlyphCache {
    fn lookup(&self, character: char, style_hint: Option<&str>) -> Vec<Arc<Glyph>> {
        let Some(styles) = self.glyphs.get(&character) else {
            return Vec::new();
        };
        if let Some(hint) = style_hint {
            if let Some(glyph) = styles.get(hint) {
                return vec![glyph.clone()];
            }
        }
        styles.values().cloned().collect()
    }

    fn characters(&self) -> Vec<char> {
        self.glyphs.keys().copied().collect()
    }

    fn styles(&self) -> Vec<String> {
        let mut styles: Vec<String> = self
            .glyphs
            .values()
            .flat_map(|styles| styles.keys().cloned())
            .collect();
        styles.sort();
        styles.dedup();
        styles
    }
}

pub fn load_char_dict(path: &Path) -> Result<BTreeMap<u32, char>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read character dictionary: {}", path.display()))?;
    let dict = parse_char_dict(&content);
    if dict.is_empty() {
        return Err(anyhow!("character dictionary is empty: {}", path.display()));
    }
    info!("loaded {} dictionary entries", dict.len());
    Ok(dict)
}

fn parse_char_dict(content: &str) -> BTreeMap<u32, char> {
    let mut dict = BTreeMap::new();
    for line in content.lines() {
        let Some((character, code)) = line.trim_end_matches(['\r', '\n']).split_once(" : ") else {
            continue;
        };
        let mut chars = character.chars();
        let (Some(character), None) = (chars.next(), chars.next()) else {
            continue;
        };
        if let Ok(code) = code.trim().parse::<u32>() {
            dict.insert(code, character);
        }
    }
    dict
}

fn parse_glyph_file_name(path: &Path) -> Option<(String, u32)> {
    let stem = path.file_stem()?.to_str()?;
    let (style, rest) = stem.split_once('_')?;
    let code = rest.split('_').next()?.parse::<u32>().ok()?;
    if style.is_empty() {
        return None;
    }
    Some((style.to_string(), code))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ext == "png" || ext == "jpg" || ext == "jpeg"
        })
        .unwrap_or(false)
}

fn load_glyph_file(path: &Path, character: char, style: &str) -> Result<Glyph> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_luma8();
    Ok(Glyph::from_luma(character, &image, style)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// A block glyph: dark rectangle on white paper.
    pub(crate) fn block_glyph(character: char, style: &str, width: u32, height: u32) -> Glyph {
        let mut image = GrayImage::from_pixel(width, height, Luma([255]));
        for y in height / 5..height - height / 5 {
            for x in width / 5..width - width / 5 {
                image.put_pixel(x, y, Luma([10]));
            }
        }
        Glyph::from_luma(character, &image, style).expect("block glyph")
    }

    #[test]
    fn char_dict_parses_code_lines() {
        let dict = parse_char_dict("的 : 1\n一 : 2\nbroken line\nab : 3\n- : 45\n");
        assert_eq!(dict.get(&1), Some(&'的'));
        assert_eq!(dict.get(&45), Some(&'-'));
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn glyph_file_names_split_style_and_code() {
        assert_eq!(
            parse_glyph_file_name(Path::new("dir/w001_17.png")),
            Some(("w001".to_string(), 17))
        );
        assert_eq!(parse_glyph_file_name(Path::new("noseparator.png")), None);
        assert_eq!(parse_glyph_file_name(Path::new("w1_abc.png")), None);
    }

    #[test]
    fn lookup_prefers_style_hint() {
        let cache = GlyphCache::from_glyphs(vec![
            block_glyph('a', "s1", 20, 30),
            block_glyph('a', "s2", 22, 30),
            block_glyph('b', "s1", 20, 30),
        ]);
        assert_eq!(cache.lookup('a', None).len(), 2);
        let hinted = cache.lookup('a', Some("s2"));
        assert_eq!(hinted.len(), 1);
        assert_eq!(hinted[0].style_id(), "s2");
        assert_eq!(cache.lookup('b', Some("s2")).len(), 1);
        assert!(cache.lookup('z', None).is_empty());
        assert_eq!(cache.styles(), vec!["s1".to_string(), "s2".to_string()]);
    }

    #[test]
    fn load_reads_dictionary_and_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dict_path = dir.path().join("dict.txt");
        fs::write(&dict_path, "7 : 7\nx : 8\n").expect("write dict");
        let glyph_dir = dir.path().join("glyphs");
        fs::create_dir(&glyph_dir).expect("mkdir");
        let image = GrayImage::from_pixel(12, 16, Luma([0]));
        image.save(glyph_dir.join("hw1_7.png")).expect("save glyph");
        image.save(glyph_dir.join("hw2_8.png")).expect("save glyph");
        image.save(glyph_dir.join("hw2_99.png")).expect("save unknown code");
        fs::write(glyph_dir.join("hw3_8.png"), b"not an image").expect("write junk");

        let cache = GlyphCache::load(&dict_path, &glyph_dir).expect("load cache");
        assert_eq!(cache.len(), 2);
        assert!(cache.contains('7'));
        assert_eq!(cache.lookup('x', None)[0].style_id(), "hw2");
        cache.teardown();
    }
}
