//! Molecule input-file parsing.
//!
//! Molecule files are plain `key = value` text:
//!
//! ```text
//! atom = "H 0 0 0; H 0 0 0.74"
//! basis = "cc-pvdz"
//! charge = 0
//! spin_sq = 0
//! symmetry = True
//! n_frozen = 2
//! ```
//!
//! Only `atom` is required. Defaults: `basis = "sto-3g"`, `charge = 0`,
//! `spin_sq = 0`, `symmetry = False`, no frozen orbitals.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ChemError, ChemResult};
use crate::molecule::{Atom, MoleculeSpec};

fn parse_error(file: &Path, message: impl Into<String>) -> ChemError {
    ChemError::Parse {
        file: file.display().to_string(),
        message: message.into(),
    }
}

/// Strip surrounding single or double quotes, if present.
fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "True" | "true" => Some(true),
        "False" | "false" => Some(false),
        _ => None,
    }
}

/// Parse a geometry string of the form `"H 0 0 0; O 0 0 0.96"`.
fn parse_geometry(file: &Path, value: &str) -> ChemResult<Vec<Atom>> {
    let mut atoms = Vec::new();

    for entry in value.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let fields: Vec<&str> = entry.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(parse_error(
                file,
                format!("geometry entry '{entry}' is not 'El x y z'"),
            ));
        }
        let mut position = [0.0f64; 3];
        for (i, coord) in fields[1..].iter().enumerate() {
            position[i] = coord
                .parse()
                .map_err(|_| parse_error(file, format!("bad coordinate '{coord}' in '{entry}'")))?;
        }
        atoms.push(Atom::new(fields[0], position));
    }

    if atoms.is_empty() {
        return Err(parse_error(file, "empty geometry"));
    }
    Ok(atoms)
}

/// Load one molecule spec from a `key = value` file.
///
/// The molecule id is the file stem.
pub fn load_molecule(path: impl AsRef<Path>) -> ChemResult<MoleculeSpec> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| parse_error(path, "file has no stem"))?
        .to_string();

    let mut geometry = None;
    let mut basis = "sto-3g".to_string();
    let mut charge = 0i32;
    let mut spin = 0i32;
    let mut symmetry = false;
    let mut n_frozen = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "atom" => geometry = Some(parse_geometry(path, unquote(value))?),
            "basis" => basis = unquote(value).to_string(),
            "charge" => {
                charge = value
                    .parse()
                    .map_err(|_| parse_error(path, format!("bad charge '{value}'")))?;
            }
            "spin_sq" => {
                spin = value
                    .parse()
                    .map_err(|_| parse_error(path, format!("bad spin_sq '{value}'")))?;
            }
            "symmetry" => {
                symmetry = parse_bool(value)
                    .ok_or_else(|| parse_error(path, format!("bad symmetry '{value}'")))?;
            }
            "n_frozen" => {
                n_frozen = Some(
                    value
                        .parse()
                        .map_err(|_| parse_error(path, format!("bad n_frozen '{value}'")))?,
                );
            }
            _ => debug!(file = %path.display(), key, "Ignoring unknown molecule key"),
        }
    }

    let geometry = geometry.ok_or_else(|| parse_error(path, "missing required 'atom' key"))?;

    Ok(MoleculeSpec {
        id,
        geometry,
        basis,
        charge,
        spin,
        symmetry,
        n_frozen,
    })
}

/// Load outcome for one molecule file in a compound directory.
///
/// A file that fails to parse is reported next to the ones that loaded,
/// so a batch can fail that molecule alone and keep the rest.
#[derive(Debug)]
pub enum CompoundLoad {
    /// The file parsed into a molecule spec.
    Loaded(MoleculeSpec),
    /// The file was rejected; `molecule` is the file stem.
    Rejected { molecule: String, error: ChemError },
}

impl CompoundLoad {
    /// Molecule identifier this load belongs to.
    pub fn molecule(&self) -> &str {
        match self {
            CompoundLoad::Loaded(spec) => &spec.id,
            CompoundLoad::Rejected { molecule, .. } => molecule,
        }
    }

    /// The parsed spec, if the file loaded.
    pub fn spec(&self) -> Option<&MoleculeSpec> {
        match self {
            CompoundLoad::Loaded(spec) => Some(spec),
            CompoundLoad::Rejected { .. } => None,
        }
    }
}

/// Load all `*.txt` molecule files from a directory, in lexical filename
/// order so batch composition is reproducible.
///
/// Parse failures are returned per file rather than propagated: one
/// malformed molecule file must not take the whole directory down with
/// it. Only an unreadable directory is an error.
pub fn load_compound_dir(dir: impl AsRef<Path>) -> ChemResult<Vec<CompoundLoad>> {
    let dir = dir.as_ref();
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();

    let mut loads = Vec::with_capacity(paths.len());
    for path in paths {
        loads.push(match load_molecule(&path) {
            Ok(spec) => CompoundLoad::Loaded(spec),
            Err(error) => {
                warn!(file = %path.display(), %error, "Rejected molecule file");
                let molecule = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                CompoundLoad::Rejected { molecule, error }
            }
        });
    }
    Ok(loads)
}
