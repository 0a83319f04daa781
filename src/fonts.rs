use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use memmap2::Mmap;
use ttf_parser::Face;

/// Family used when a document names a font that cannot be found.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Horizontal metrics of one font face, normalized to 1000 units per em.
#[derive(Debug)]
pub struct FontMetrics {
    pub family: String,
    pub ascender: f32,
    pub descender: f32, // positive, below the baseline
    pub line_gap: f32,
    advances: HashMap<char, f32>,
}

impl FontMetrics {
    pub fn from_face(family: &str, face: &Face) -> Self {
        let units = face.units_per_em().max(1) as f32;
        let scale = 1000.0 / units;
        let mut advances = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if let Some(ch) = char::from_u32(cp)
                        && let Some(gid) = subtable.glyph_index(cp)
                        && let Some(adv) = face.glyph_hor_advance(gid)
                    {
                        advances.entry(ch).or_insert(adv as f32 * scale);
                    }
                });
            }
        }
        FontMetrics {
            family: family.to_string(),
            ascender: face.ascender() as f32 * scale,
            descender: -(face.descender() as f32) * scale,
            line_gap: face.line_gap() as f32 * scale,
            advances,
        }
    }

    pub fn char_width_1000(&self, ch: char) -> Option<f32> {
        self.advances.get(&ch).copied()
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.advances.contains_key(&ch)
    }

    /// Advance width of `text` at `font_size`. Characters the face lacks use the
    /// approximate 0.6em advance.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch).unwrap_or(600.0) * font_size / 1000.0)
            .sum()
    }

    pub fn ascent(&self, font_size: f32) -> f32 {
        self.ascender * font_size / 1000.0
    }

    pub fn descent(&self, font_size: f32) -> f32 {
        self.descender * font_size / 1000.0
    }
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

type MetricsKey = (String, bool, bool);

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();
static METRICS: OnceLock<RwLock<HashMap<MetricsKey, Option<Arc<FontMetrics>>>>> =
    OnceLock::new();

fn metrics_table() -> &'static RwLock<HashMap<MetricsKey, Option<Arc<FontMetrics>>>> {
    METRICS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn font_family_name(face: &Face) -> Option<String> {
    // ID 1 (Family) distinguishes "Aptos Display" from "Aptos"; ID 16 would merge them.
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn read_font_style(data: &[u8], face_index: u32) -> Option<(String, bool, bool)> {
    let face = Face::parse(data, face_index).ok()?;
    let family = font_family_name(&face)?;
    Some((family, face.is_bold(), face.is_italic()))
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    // User-configured directories come first so they win over system fonts
    if let Ok(val) = std::env::var("DOCXIDE_LAYOUT_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(
            val.split(sep)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(PathBuf::from),
        );
    }

    if std::env::var("DOCXIDE_LAYOUT_NO_SYSTEM_FONTS").is_ok() {
        return dirs;
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/Library/Fonts/Microsoft".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        match std::env::var("WINDIR") {
            Ok(windir) => dirs.push(PathBuf::from(windir).join("Fonts")),
            Err(_) => dirs.push("C:\\Windows\\Fonts".into()),
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn is_font_collection(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttc"))
}

fn scan_font_dirs() -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut files_scanned = 0u32;
    let mut visited: HashSet<PathBuf> = HashSet::new();

    let mut stack = font_directories();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            files_scanned += 1;
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            // SAFETY: font files are opened read-only and not expected to change mid-scan
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            let face_count = if is_font_collection(&path) {
                ttf_parser::fonts_in_collection(&data).unwrap_or(1)
            } else {
                1
            };
            for face_idx in 0..face_count {
                if let Some((family, bold, italic)) = read_font_style(&data, face_idx) {
                    index
                        .entry((family.to_lowercase(), bold, italic))
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }

    log::info!(
        "Font scan: {:.1}ms, {} dirs, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        visited.len(),
        files_scanned,
        index.len(),
    );
    index
}

fn get_font_index() -> &'static FontLookup {
    FONT_INDEX.get_or_init(scan_font_dirs)
}

/// Build the process-wide font index. Call once at startup, before layout work runs
/// on other threads; later calls return immediately. Returns the number of indexed faces.
pub fn init_fonts() -> usize {
    get_font_index().len()
}

/// Look up a font file by family name and style. Falls back to the regular variant
/// when the requested bold/italic face is not installed.
fn find_font_file(font_name: &str, bold: bool, italic: bool) -> Option<(PathBuf, u32)> {
    let index = get_font_index();
    let key = font_name.to_lowercase();
    index
        .get(&(key.clone(), bold, italic))
        .or_else(|| {
            if bold || italic {
                index.get(&(key, false, false))
            } else {
                None
            }
        })
        .cloned()
}

fn load_metrics(family: &str, bold: bool, italic: bool) -> Option<FontMetrics> {
    let (path, face_index) = find_font_file(family, bold, italic)?;
    let data = std::fs::read(&path).ok()?;
    let face = Face::parse(&data, face_index).ok()?;
    Some(FontMetrics::from_face(family, &face))
}

/// Register metrics from raw TTF/OTF bytes, e.g. fonts embedded in the DOCX package.
/// Registered faces take precedence over installed ones.
pub fn register_font_data(family: &str, bold: bool, italic: bool, data: &[u8]) -> bool {
    let Ok(face) = Face::parse(data, 0) else {
        log::warn!("Could not parse font data for {family}");
        return false;
    };
    let metrics = Arc::new(FontMetrics::from_face(family, &face));
    if let Ok(mut table) = metrics_table().write() {
        table.insert((family.to_lowercase(), bold, italic), Some(metrics));
        return true;
    }
    false
}

pub fn primary_font_name(name: &str) -> &str {
    name.split(';').next().unwrap_or(name).trim()
}

/// Metrics for a family/variant, loading them on first use. `None` when no face for the
/// family is installed or registered; callers fall back to the approximation.
pub fn metrics_for(family: &str, bold: bool, italic: bool) -> Option<Arc<FontMetrics>> {
    let key = (primary_font_name(family).to_lowercase(), bold, italic);
    if let Ok(table) = metrics_table().read()
        && let Some(cached) = table.get(&key)
    {
        return cached.clone();
    }
    if bold || italic {
        // A registered regular face serves missing variants, as with installed fonts
        let regular = (key.0.clone(), false, false);
        if let Ok(table) = metrics_table().read()
            && let Some(Some(cached)) = table.get(&regular)
            && find_font_file(&key.0, bold, italic).is_none()
        {
            return Some(cached.clone());
        }
    }

    let t0 = std::time::Instant::now();
    let loaded = load_metrics(primary_font_name(family), bold, italic).map(Arc::new);
    log::debug!(
        "metrics_for: {family} bold={bold} italic={italic} found={} → {:.1}ms",
        loaded.is_some(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    if let Ok(mut table) = metrics_table().write() {
        table.entry(key).or_insert_with(|| loaded.clone());
    }
    loaded
}
