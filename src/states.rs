//! Typed electronic-state labels and the tables keyed by them.
//!
//! Labels come from two places: the parser numbers "Excited State" records
//! per multiplicity (`S1`, `S2`, ..., `T1`, ...), and the coupling
//! post-processor prints bra/ket labels such as `S0`, `T3` or the catch-all
//! `T*`. Both are represented by [`StateLabel`].

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Index substituted for the catch-all `S*`/`T*` labels during aggregation.
pub const HIGHEST_STATE_SENTINEL: u32 = 10;

/// cm⁻¹ per eV.
pub const WAVENUMBERS_PER_EV: f64 = 8065.54;

/// Converts an energy from cm⁻¹ to eV.
pub fn cm_to_ev(value: f64) -> f64 {
    value / WAVENUMBERS_PER_EV
}

/// Error for text that is not a state label.
#[derive(Error, Debug, PartialEq)]
#[error("invalid state label '{0}'")]
pub struct LabelError(pub String);

/// Spin multiplicity of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Spin {
    /// Multiplicity 1, label prefix `S`
    Singlet,
    /// Multiplicity 3, label prefix `T`
    Triplet,
}

impl Spin {
    /// One-letter label prefix.
    pub fn prefix(self) -> char {
        match self {
            Spin::Singlet => 'S',
            Spin::Triplet => 'T',
        }
    }
}

/// Position of a state within its multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StateIndex {
    /// Ordinary numbered state; 0 is the ground state
    Numbered(u32),
    /// Catch-all highest state printed as `*`
    Highest,
}

/// Electronic state label such as `S1`, `T3` or `T*`.
///
/// Labels order by spin first and then numerically, so `S2 < S10 < T1`.
///
/// ```
/// use kisc::states::StateLabel;
///
/// let t: StateLabel = "T*".parse().unwrap();
/// assert_eq!(t.normalized().to_string(), "T10");
/// assert!("S2".parse::<StateLabel>().unwrap() < "S10".parse().unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateLabel {
    /// Multiplicity
    pub spin: Spin,
    /// Index within the multiplicity
    pub index: StateIndex,
}

impl StateLabel {
    /// Numbered singlet `S{n}`.
    pub fn singlet(n: u32) -> Self {
        Self {
            spin: Spin::Singlet,
            index: StateIndex::Numbered(n),
        }
    }

    /// Numbered triplet `T{n}`.
    pub fn triplet(n: u32) -> Self {
        Self {
            spin: Spin::Triplet,
            index: StateIndex::Numbered(n),
        }
    }

    /// Replaces the catch-all index by [`HIGHEST_STATE_SENTINEL`].
    pub fn normalized(self) -> Self {
        match self.index {
            StateIndex::Highest => Self {
                spin: self.spin,
                index: StateIndex::Numbered(HIGHEST_STATE_SENTINEL),
            },
            StateIndex::Numbered(_) => self,
        }
    }

    /// True for `S0`.
    pub fn is_ground_singlet(&self) -> bool {
        self.spin == Spin::Singlet && self.index == StateIndex::Numbered(0)
    }
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self.index {
            StateIndex::Numbered(n) => format!("{}{}", self.spin.prefix(), n),
            StateIndex::Highest => format!("{}*", self.spin.prefix()),
        };
        f.pad(&text)
    }
}

impl FromStr for StateLabel {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let spin = match chars.next() {
            Some('S') => Spin::Singlet,
            Some('T') => Spin::Triplet,
            _ => return Err(LabelError(s.to_string())),
        };
        let rest = chars.as_str();
        let index = if rest == "*" {
            StateIndex::Highest
        } else {
            StateIndex::Numbered(rest.parse().map_err(|_| LabelError(s.to_string()))?)
        };
        Ok(Self { spin, index })
    }
}

/// A singlet/triplet pair, the unit of rate computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionKey {
    /// Bra state (singlet manifold)
    pub singlet: StateLabel,
    /// Ket state (triplet manifold)
    pub triplet: StateLabel,
}

impl TransitionKey {
    /// Builds a key from two labels.
    pub fn new(singlet: StateLabel, triplet: StateLabel) -> Self {
        Self { singlet, triplet }
    }

    /// Key with both labels normalized (`S*`/`T*` → sentinel).
    pub fn normalized(self) -> Self {
        Self {
            singlet: self.singlet.normalized(),
            triplet: self.triplet.normalized(),
        }
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.singlet, self.triplet)
    }
}

/// Excitation energies in eV keyed by state label.
pub type EnergyTable = std::collections::BTreeMap<StateLabel, f64>;

/// Excitation energies of both multiplicities read from one log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExcitedStates {
    /// `S1..Sn` in file order
    pub singlets: EnergyTable,
    /// `T1..Tn` in file order
    pub triplets: EnergyTable,
}

/// Values keyed by transition, in insertion order.
///
/// Inserting an existing key replaces the value in place, so the position of
/// the first occurrence is kept. Used for couplings as well as for the gaps
/// and rates derived from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionTable {
    entries: Vec<(TransitionKey, f64)>,
}

impl TransitionTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: TransitionKey, value: f64) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &TransitionKey) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TransitionKey, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// Copy with every value converted from cm⁻¹ to eV.
    pub fn to_ev(&self) -> TransitionTable {
        TransitionTable {
            entries: self.entries.iter().map(|(k, v)| (*k, cm_to_ev(*v))).collect(),
        }
    }

    /// Copy with catch-all labels replaced by the sentinel index.
    pub fn normalized(&self) -> TransitionTable {
        let mut out = TransitionTable::new();
        for (k, v) in self.iter() {
            out.insert(k.normalized(), v);
        }
        out
    }

    /// The `n` transitions with the largest coupling, strongest first.
    pub fn top(&self, n: usize) -> Vec<(TransitionKey, f64)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        sorted.truncate(n);
        sorted
    }

    /// Normalized transitions whose singlet is one of `S1..=S{max_singlet}`.
    pub fn singlet_window(&self, max_singlet: u32) -> Vec<(TransitionKey, f64)> {
        self.normalized()
            .iter()
            .filter(|(k, _)| {
                matches!(k.singlet.index, StateIndex::Numbered(n) if n >= 1 && n <= max_singlet)
            })
            .collect()
    }
}

/// Spin-orbit couplings as read from the post-processor, in cm⁻¹.
pub type CouplingTable = TransitionTable;

impl FromIterator<(TransitionKey, f64)> for TransitionTable {
    fn from_iter<I: IntoIterator<Item = (TransitionKey, f64)>>(iter: I) -> Self {
        let mut table = TransitionTable::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_labels() {
        let s: StateLabel = "S3".parse().unwrap();
        assert_eq!(s, StateLabel::singlet(3));
        assert_eq!(s.to_string(), "S3");
        assert_eq!(format!("{:<4}|", s), "S3  |");
        let t: StateLabel = "T*".parse().unwrap();
        assert_eq!(t.to_string(), "T*");
        assert_eq!(t.normalized(), StateLabel::triplet(10));
        assert!("X1".parse::<StateLabel>().is_err());
        assert!("S".parse::<StateLabel>().is_err());
        assert!("Sx".parse::<StateLabel>().is_err());
    }

    #[test]
    fn test_label_ordering_is_numeric() {
        let mut labels: Vec<StateLabel> = ["S10", "T1", "S2", "S1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        labels.sort();
        let text: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        assert_eq!(text, vec!["S1", "S2", "S10", "T1"]);
    }

    #[test]
    fn test_cm_to_ev() {
        assert!((cm_to_ev(8065.54) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_coupling_table_keeps_first_position() {
        let mut table = CouplingTable::new();
        let a = TransitionKey::new(StateLabel::singlet(1), StateLabel::triplet(1));
        let b = TransitionKey::new(StateLabel::singlet(1), StateLabel::triplet(2));
        table.insert(a, 1.0);
        table.insert(b, 5.0);
        table.insert(a, 3.0);
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![(a, 3.0), (b, 5.0)]);
        assert_eq!(table.top(1), vec![(b, 5.0)]);
    }

    #[test]
    fn test_singlet_window_remaps_highest_triplet() {
        let mut table = CouplingTable::new();
        let star = TransitionKey::new(StateLabel::singlet(2), "T*".parse().unwrap());
        let ground = TransitionKey::new(StateLabel::singlet(0), StateLabel::triplet(1));
        let high = TransitionKey::new(StateLabel::singlet(7), StateLabel::triplet(1));
        table.insert(star, 2.0);
        table.insert(ground, 4.0);
        table.insert(high, 1.0);
        let window = table.singlet_window(6);
        assert_eq!(
            window,
            vec![(
                TransitionKey::new(StateLabel::singlet(2), StateLabel::triplet(10)),
                2.0
            )]
        );
    }
}
