use serde::{Deserialize, Serialize};

/// A categorical value stored as its index. The vector form is only
/// materialized when tensors are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OneHot {
    index: usize,
    len: usize,
}

impl OneHot {
    pub fn new(index: usize, len: usize) -> Result<Self, OneHotError> {
        if len == 0 {
            return Err(OneHotError::NoCategories);
        }
        if index >= len {
            return Err(OneHotError::OutOfRange { index, len });
        }
        Ok(Self { index, len })
    }

    /// The first category, used as the default for new elements.
    pub fn first(len: usize) -> Result<Self, OneHotError> {
        Self::new(0, len)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Advance to the next category, wrapping around after the last.
    pub fn cycle(&mut self) {
        self.index = (self.index + 1) % self.len;
    }

    pub fn to_vector(&self) -> Vec<f32> {
        let mut v = vec![0.0; self.len];
        v[self.index] = 1.0;
        v
    }

    /// Parse a feature row back. Exactly one entry must be 1, the rest 0.
    pub fn from_vector(row: &[f32]) -> Result<Self, OneHotError> {
        let mut hot = None;
        for (i, &v) in row.iter().enumerate() {
            if v == 1.0 && hot.is_none() {
                hot = Some(i);
            } else if v != 0.0 {
                return Err(OneHotError::NotOneHot(row.to_vec()));
            }
        }
        match hot {
            Some(index) => Self::new(index, row.len()),
            None => Err(OneHotError::NotOneHot(row.to_vec())),
        }
    }
}

// ------------------------------------------------------------------
// Vocabulary
// ------------------------------------------------------------------

/// Category names for atoms and bonds, in feature order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub atoms: Vec<String>,
    pub bonds: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            atoms: ["Carbon", "Nitrogen", "Oxygen", "Sulphur"]
                .map(String::from)
                .to_vec(),
            bonds: ["Single", "Double", "Triple", "Aromatic"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl Vocabulary {
    pub fn default_atom(&self) -> Result<OneHot, OneHotError> {
        OneHot::first(self.atoms.len())
    }

    pub fn default_bond(&self) -> Result<OneHot, OneHotError> {
        OneHot::first(self.bonds.len())
    }

    pub fn atom_name(&self, value: OneHot) -> &str {
        self.atoms.get(value.index()).map_or("?", String::as_str)
    }

    pub fn bond_name(&self, value: OneHot) -> &str {
        self.bonds.get(value.index()).map_or("?", String::as_str)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum OneHotError {
    #[error("a category needs at least one value")]
    NoCategories,
    #[error("category {index} is outside 0..{len}")]
    OutOfRange { index: usize, len: usize },
    #[error("{0:?} is not a one-hot vector")]
    NotOneHot(Vec<f32>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_has_exactly_one_entry_set() {
        let value = OneHot::new(2, 4).unwrap();

        assert_eq!(value.to_vector(), vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_cycle_visits_every_category_and_returns() {
        let mut value = OneHot::first(4).unwrap();
        let mut seen = vec![value.index()];
        for _ in 0..4 {
            value.cycle();
            seen.push(value.index());
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_single_category_cycles_to_itself() {
        let mut value = OneHot::first(1).unwrap();
        value.cycle();

        assert_eq!(value.index(), 0);
    }

    #[test]
    fn test_from_vector_rejects_non_one_hot_rows() {
        assert!(OneHot::from_vector(&[0.0, 0.0]).is_err(), "no entry set");
        assert!(OneHot::from_vector(&[1.0, 1.0]).is_err(), "two entries set");
        assert!(OneHot::from_vector(&[0.5, 0.0]).is_err(), "fractional entry");
        assert!(OneHot::from_vector(&[]).is_err(), "empty row");
        assert_eq!(
            OneHot::from_vector(&[0.0, 1.0, 0.0]).unwrap(),
            OneHot::new(1, 3).unwrap()
        );
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert_eq!(
            OneHot::new(4, 4),
            Err(OneHotError::OutOfRange { index: 4, len: 4 })
        );
        assert_eq!(OneHot::first(0), Err(OneHotError::NoCategories));
    }
}
