use std::{fs, io, path::Path};

use anyhow::{Context, anyhow};
use serde_json::Value;

use crate::{fetch::Skipped, publication::Publication};

/// Records of a previous run.
#[derive(Debug, Default)]
pub struct Loaded {
    pub publications: Vec<Publication>,
    pub skipped: Vec<Skipped>,
}

/// Read a previously written output file. A missing file is an empty list; a file that is not a
/// JSON array is an error so that a run never replaces data it could not read. Single entries
/// that do not look like a publication are skipped.
pub fn load(path: &Path) -> anyhow::Result<Loaded> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Loaded::default()),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    if text.trim().is_empty() {
        return Ok(Loaded::default());
    }

    let json: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let Value::Array(items) = json else {
        return Err(anyhow!("{} does not contain a JSON array", path.display()));
    };

    let mut loaded = Loaded::default();
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Publication>(item) {
            Ok(p) => loaded.publications.push(p),
            Err(e) => loaded
                .skipped
                .push(Skipped::new(format!("{} entry {i}", path.display()), e)),
        }
    }
    Ok(loaded)
}

/// Replace `path` with the full list, pretty-printed with two-space indentation.
pub fn save(path: &Path, publications: &[Publication]) -> anyhow::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let mut text = serde_json::to_string_pretty(publications)?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
