//! Molecular geometry records shared by the parser, the input generator and
//! the pipeline.
//!
//! A [`Geometry`] is an ordered list of [`Atom`]s. Atom order is significant:
//! it must match the engine's atom ordering because every downstream energy
//! and coupling calculation is built from it. Nothing in this crate reorders
//! atoms.
//!
//! Coordinates are in Angstroms, exactly as the engine prints them in its
//! orientation tables.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when two geometries that describe the same molecule disagree
/// in shape.
#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
    /// Atom counts differ between two geometries of one molecule
    #[error("atom count mismatch: expected {expected}, found {found}")]
    AtomCountMismatch {
        /// Atom count of the reference geometry
        expected: usize,
        /// Atom count of the compared geometry
        found: usize,
    },
}

/// A single atom: element symbol and Cartesian position in Angstroms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Element symbol ("C", "H", ...) or the bare atomic number when the
    /// number is outside the periodic table
    pub symbol: String,
    /// Cartesian position (x, y, z) in Angstroms
    pub position: Vector3<f64>,
}

impl Atom {
    /// Creates an atom from a symbol and three coordinates.
    pub fn new(symbol: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            symbol: symbol.into(),
            position: Vector3::new(x, y, z),
        }
    }

    /// Creates an atom from an atomic number, falling back to the numeric
    /// string for numbers without a symbol.
    pub fn from_atomic_number(number: i32, x: f64, y: f64, z: f64) -> Self {
        Self::new(atomic_number_to_symbol(number), x, y, z)
    }
}

/// Ordered collection of atoms describing one molecular structure.
///
/// # Examples
///
/// ```
/// use kisc::geometry::{Atom, Geometry};
///
/// let water = Geometry::new(vec![
///     Atom::new("O", 0.0, 0.0, 0.117),
///     Atom::new("H", 0.0, 0.757, -0.467),
///     Atom::new("H", 0.0, -0.757, -0.467),
/// ]);
/// assert_eq!(water.num_atoms(), 3);
/// assert_eq!(water.symbols(), vec!["O", "H", "H"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Atoms in engine order
    pub atoms: Vec<Atom>,
}

impl Geometry {
    /// Wraps an ordered atom list.
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    /// Number of atoms.
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// True when the geometry holds no atoms.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Element symbols in atom order.
    pub fn symbols(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.symbol.as_str()).collect()
    }

    /// Checks that `other` describes the same number of atoms.
    pub fn ensure_same_shape(&self, other: &Geometry) -> Result<(), GeometryError> {
        if self.num_atoms() != other.num_atoms() {
            return Err(GeometryError::AtomCountMismatch {
                expected: self.num_atoms(),
                found: other.num_atoms(),
            });
        }
        Ok(())
    }

    /// Root-mean-square displacement between two geometries of the same
    /// molecule, in Angstroms.
    ///
    /// Atoms are compared index by index; no alignment is performed since the
    /// engine's standard orientation already fixes the frame.
    pub fn rms_displacement(&self, other: &Geometry) -> Result<f64, GeometryError> {
        self.ensure_same_shape(other)?;
        if self.is_empty() {
            return Ok(0.0);
        }
        let sum_sq: f64 = self
            .atoms
            .iter()
            .zip(&other.atoms)
            .map(|(a, b)| (a.position - b.position).norm_squared())
            .sum();
        Ok((sum_sq / self.num_atoms() as f64).sqrt())
    }

    /// Largest single-atom displacement between two geometries, in Angstroms.
    pub fn max_displacement(&self, other: &Geometry) -> Result<f64, GeometryError> {
        self.ensure_same_shape(other)?;
        Ok(self
            .atoms
            .iter()
            .zip(&other.atoms)
            .map(|(a, b)| (a.position - b.position).norm())
            .fold(0.0, f64::max))
    }
}

const ELEMENT_SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Maps an atomic number to its element symbol.
///
/// Numbers outside 1..=118 (dummy atoms, ghost centres, the engine's
/// negative sentinels) map to their own decimal string; this is never an
/// error.
pub fn atomic_number_to_symbol(number: i32) -> String {
    match number {
        1..=118 => ELEMENT_SYMBOLS[(number - 1) as usize].to_string(),
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_number_lookup() {
        assert_eq!(atomic_number_to_symbol(1), "H");
        assert_eq!(atomic_number_to_symbol(6), "C");
        assert_eq!(atomic_number_to_symbol(16), "S");
        assert_eq!(atomic_number_to_symbol(17), "Cl");
        assert_eq!(atomic_number_to_symbol(118), "Og");
    }

    #[test]
    fn test_unknown_atomic_number_falls_back_to_number() {
        assert_eq!(atomic_number_to_symbol(0), "0");
        assert_eq!(atomic_number_to_symbol(200), "200");
        assert_eq!(atomic_number_to_symbol(-1), "-1");
    }

    #[test]
    fn test_rms_displacement() {
        let a = Geometry::new(vec![Atom::new("H", 0.0, 0.0, 0.0), Atom::new("H", 0.74, 0.0, 0.0)]);
        let b = Geometry::new(vec![Atom::new("H", 0.0, 0.0, 0.0), Atom::new("H", 0.74, 0.2, 0.0)]);
        let rms = a.rms_displacement(&b).unwrap();
        assert!((rms - (0.04f64 / 2.0).sqrt()).abs() < 1e-12);
        assert!((a.max_displacement(&b).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Geometry::new(vec![Atom::new("H", 0.0, 0.0, 0.0)]);
        let b = Geometry::default();
        assert_eq!(
            a.ensure_same_shape(&b),
            Err(GeometryError::AtomCountMismatch {
                expected: 1,
                found: 0
            })
        );
    }
}
