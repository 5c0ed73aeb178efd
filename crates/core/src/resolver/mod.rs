//! Raga-aware swara resolution.
//!
//! A finger carries an abstract degree; the active raga decides which
//! concrete variant of it sounds. Degrees the raga lacks are suppressed
//! instead of falling back to an off-scale pitch.

use crate::scale::{Raga, Swara, SwaraVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Play(SwaraVariant),
    /// The raga has no variant of the requested degree. Not an error.
    Suppressed,
}

impl Resolution {
    pub fn variant(self) -> Option<SwaraVariant> {
        match self {
            Resolution::Play(variant) => Some(variant),
            Resolution::Suppressed => None,
        }
    }
}

/// Resolves `degree` against `raga`.
///
/// Sa and Pa are fixed and always play. Other degrees take the
/// highest-numbered variant the raga contains.
pub fn resolve(degree: Swara, raga: &Raga) -> Resolution {
    match degree {
        Swara::Sa => Resolution::Play(SwaraVariant::Sa),
        Swara::Pa => Resolution::Play(SwaraVariant::Pa),
        _ => degree
            .variants()
            .iter()
            .rev()
            .copied()
            .find(|variant| raga.contains(*variant))
            .map_or(Resolution::Suppressed, Resolution::Play),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::ScaleTable;
    use SwaraVariant::*;

    fn raga(variants: &[SwaraVariant]) -> Raga {
        Raga::new("test", "Test", "", variants).unwrap()
    }

    #[test]
    fn single_variant_in_raga_is_chosen() {
        let table = ScaleTable::builtin();
        let mayamalavagowla = table.raga("mayamalavagowla").unwrap();
        assert_eq!(resolve(Swara::Ri, mayamalavagowla), Resolution::Play(Ri1));
        assert_eq!(resolve(Swara::Ga, mayamalavagowla), Resolution::Play(Ga3));
        assert_eq!(resolve(Swara::Ma, mayamalavagowla), Resolution::Play(Ma1));
        assert_eq!(resolve(Swara::Da, mayamalavagowla), Resolution::Play(Da1));
        assert_eq!(resolve(Swara::Ni, mayamalavagowla), Resolution::Play(Ni3));
    }

    #[test]
    fn sa_and_pa_ignore_the_raga() {
        let table = ScaleTable::builtin();
        for raga in table.ragas() {
            assert_eq!(resolve(Swara::Sa, raga), Resolution::Play(Sa));
            assert_eq!(resolve(Swara::Pa, raga), Resolution::Play(Pa));
        }
    }

    #[test]
    fn missing_degree_is_suppressed() {
        let table = ScaleTable::builtin();
        let mohanam = table.raga("mohanam").unwrap();
        assert_eq!(resolve(Swara::Ma, mohanam), Resolution::Suppressed);
        assert_eq!(resolve(Swara::Ni, mohanam), Resolution::Suppressed);
        assert_eq!(resolve(Swara::Ni, mohanam).variant(), None);
    }

    #[test]
    fn prefers_highest_numbered_variant() {
        // Vivadi-style scale carrying two Ri variants.
        let scale = raga(&[Sa, Ri1, Ri2, Ma1, Pa, Da1, Ni3]);
        assert_eq!(resolve(Swara::Ri, &scale), Resolution::Play(Ri2));

        let scale = raga(&[Sa, Ga1, Ga3, Ma2, Pa, Ni1, Ni2]);
        assert_eq!(resolve(Swara::Ga, &scale), Resolution::Play(Ga3));
        assert_eq!(resolve(Swara::Ni, &scale), Resolution::Play(Ni2));
        assert_eq!(resolve(Swara::Ma, &scale), Resolution::Play(Ma2));
    }
}
