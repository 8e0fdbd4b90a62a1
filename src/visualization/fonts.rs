//! Font registration for text annotations.
//!
//! Text is rasterized with ab_glyph, which needs the raw bytes of a
//! TrueType font. The font is registered process-wide under the
//! [`FONT_FAMILY`] name. Calls with the same preferred path reuse the last
//! outcome; a different preferred path triggers a new registration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};
use plotters::style::{register_font, FontStyle};

/// Family name the registered font is available under.
pub const FONT_FAMILY: &str = "serif";

/// Well-known locations of serif fonts, then sans fallbacks.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf",
    "/usr/share/fonts/dejavu/DejaVuSerif.ttf",
    "/usr/share/fonts/TTF/DejaVuSerif.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSerif-Regular.ttf",
    "/usr/share/fonts/truetype/libertine/LinLibertine_R.ttf",
    "/System/Library/Fonts/Supplemental/Times New Roman.ttf",
    "/Library/Fonts/Times New Roman.ttf",
    "C:\\Windows\\Fonts\\times.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Outcome of the last registration attempt.
struct Registration {
    requested: Option<PathBuf>,
    loaded: Option<PathBuf>,
}

static REGISTERED: Mutex<Option<Registration>> = Mutex::new(None);

/// Make sure a font is registered, preferring `preferred` when given.
///
/// Returns false when no usable font could be found; callers then draw
/// without text.
pub fn ensure_font(preferred: Option<&Path>) -> bool {
    let mut registered = REGISTERED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(current) = registered.as_ref() {
        if current.requested.as_deref() == preferred {
            return current.loaded.is_some();
        }
    }

    let loaded = register_first_available(preferred);
    let found = loaded.is_some();
    *registered = Some(Registration {
        requested: preferred.map(Path::to_path_buf),
        loaded,
    });
    found
}

/// Font files to try, in order: `preferred`, then the system fonts.
fn font_candidates(preferred: Option<&Path>) -> Vec<PathBuf> {
    preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .collect()
}

/// Register the first candidate that parses, returning its path.
fn register_first_available(preferred: Option<&Path>) -> Option<PathBuf> {
    for path in font_candidates(preferred) {
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Font {} not usable: {}", path.display(), e);
                continue;
            }
        };

        // The font registry keeps borrowed bytes for the process lifetime.
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
            Ok(()) => {
                info!("Using font {}", path.display());
                return Some(path);
            }
            Err(_) => warn!("Could not parse font {}", path.display()),
        }
    }

    warn!("No TrueType font found; images will be drawn without labels");
    None
}
