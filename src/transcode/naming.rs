//! Output file naming.

use std::collections::HashSet;

use crate::upload::sanitize_filename;

/// Suffix appended to every output stem.
pub const OUTPUT_SUFFIX: &str = "_compressed";

/// Extension of every output file.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Stem used when sanitization leaves nothing.
const FALLBACK_STEM: &str = "image";

/// Strip the last extension from a sanitized name.
///
/// A dot in first position does not start an extension.
fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Derive the archive entry name for an uploaded file.
///
/// `My Photo.PNG` becomes `My_Photo_compressed.jpg`.
pub fn output_filename(original: &str) -> String {
    let sanitized = sanitize_filename(original);
    let base = match stem(&sanitized) {
        "" => FALLBACK_STEM,
        s => s,
    };
    format!("{}{}.{}", base, OUTPUT_SUFFIX, OUTPUT_EXTENSION)
}

/// Hands out unique entry names within one archive.
///
/// The first occurrence of a name is kept as is; later ones get `_2`, `_3`,
/// ... inserted before the extension, skipping any name already taken.
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a unique name derived from `candidate`.
    pub fn allocate(&mut self, candidate: &str) -> String {
        if self.taken.insert(candidate.to_string()) {
            return candidate.to_string();
        }

        let (base, ext) = match candidate.rfind('.') {
            Some(idx) if idx > 0 => (&candidate[..idx], &candidate[idx..]),
            _ => (candidate, ""),
        };

        let mut index = 2usize;
        loop {
            let name = format!("{}_{}{}", base, index, ext);
            if self.taken.insert(name.clone()) {
                return name;
            }
            index += 1;
        }
    }
}
