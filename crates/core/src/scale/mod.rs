//! Scale table: swara variants with their just-intonation ratios, plus the
//! raga and tala registries.
//!
//! Tables are validated once when they are built. Lookups afterwards never
//! fail on malformed data, only on keys that simply are not registered.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, SwaraError};

/// Smallest and largest number of variants a raga may declare.
pub const RAGA_SIZE: std::ops::RangeInclusive<usize> = 5..=7;

/// One of the seven abstract scale degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Swara {
    Sa,
    Ri,
    Ga,
    Ma,
    Pa,
    Da,
    Ni,
}

impl Swara {
    pub const ALL: [Swara; 7] = [
        Swara::Sa,
        Swara::Ri,
        Swara::Ga,
        Swara::Ma,
        Swara::Pa,
        Swara::Da,
        Swara::Ni,
    ];

    /// Concrete variants of this degree, lowest numbered first.
    pub fn variants(self) -> &'static [SwaraVariant] {
        use SwaraVariant::*;
        match self {
            Swara::Sa => &[Sa],
            Swara::Ri => &[Ri1, Ri2, Ri3],
            Swara::Ga => &[Ga1, Ga2, Ga3],
            Swara::Ma => &[Ma1, Ma2],
            Swara::Pa => &[Pa],
            Swara::Da => &[Da1, Da2, Da3],
            Swara::Ni => &[Ni1, Ni2, Ni3],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Swara::Sa => "Sa",
            Swara::Ri => "Ri",
            Swara::Ga => "Ga",
            Swara::Ma => "Ma",
            Swara::Pa => "Pa",
            Swara::Da => "Da",
            Swara::Ni => "Ni",
        }
    }
}

impl fmt::Display for Swara {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete pitch identity (swarasthana) such as `Ri2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SwaraVariant {
    Sa,
    Ri1,
    Ri2,
    Ri3,
    Ga1,
    Ga2,
    Ga3,
    Ma1,
    Ma2,
    Pa,
    Da1,
    Da2,
    Da3,
    Ni1,
    Ni2,
    Ni3,
}

impl SwaraVariant {
    pub const ALL: [SwaraVariant; 16] = [
        SwaraVariant::Sa,
        SwaraVariant::Ri1,
        SwaraVariant::Ri2,
        SwaraVariant::Ri3,
        SwaraVariant::Ga1,
        SwaraVariant::Ga2,
        SwaraVariant::Ga3,
        SwaraVariant::Ma1,
        SwaraVariant::Ma2,
        SwaraVariant::Pa,
        SwaraVariant::Da1,
        SwaraVariant::Da2,
        SwaraVariant::Da3,
        SwaraVariant::Ni1,
        SwaraVariant::Ni2,
        SwaraVariant::Ni3,
    ];

    /// The abstract degree this variant belongs to.
    pub fn degree(self) -> Swara {
        use SwaraVariant::*;
        match self {
            Sa => Swara::Sa,
            Ri1 | Ri2 | Ri3 => Swara::Ri,
            Ga1 | Ga2 | Ga3 => Swara::Ga,
            Ma1 | Ma2 => Swara::Ma,
            Pa => Swara::Pa,
            Da1 | Da2 | Da3 => Swara::Da,
            Ni1 | Ni2 | Ni3 => Swara::Ni,
        }
    }

    /// Frequency ratio relative to the tonic.
    ///
    /// Some variants share a ratio (Ri2/Ga1, Ri3/Ga2, Da2/Ni1, Da3/Ni2); they
    /// are the same pitch under different names.
    pub fn ratio(self) -> f32 {
        use SwaraVariant::*;
        match self {
            Sa => 1.0,
            Ri1 => 16.0 / 15.0,
            Ri2 => 9.0 / 8.0,
            Ri3 => 6.0 / 5.0,
            Ga1 => 9.0 / 8.0,
            Ga2 => 6.0 / 5.0,
            Ga3 => 5.0 / 4.0,
            Ma1 => 4.0 / 3.0,
            Ma2 => 45.0 / 32.0,
            Pa => 3.0 / 2.0,
            Da1 => 8.0 / 5.0,
            Da2 => 5.0 / 3.0,
            Da3 => 9.0 / 5.0,
            Ni1 => 5.0 / 3.0,
            Ni2 => 9.0 / 5.0,
            Ni3 => 15.0 / 8.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        use SwaraVariant::*;
        match self {
            Sa => "Sa",
            Ri1 => "Ri1",
            Ri2 => "Ri2",
            Ri3 => "Ri3",
            Ga1 => "Ga1",
            Ga2 => "Ga2",
            Ga3 => "Ga3",
            Ma1 => "Ma1",
            Ma2 => "Ma2",
            Pa => "Pa",
            Da1 => "Da1",
            Da2 => "Da2",
            Da3 => "Da3",
            Ni1 => "Ni1",
            Ni2 => "Ni2",
            Ni3 => "Ni3",
        }
    }
}

impl fmt::Display for SwaraVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwaraVariant {
    type Err = SwaraError;

    fn from_str(s: &str) -> Result<Self> {
        SwaraVariant::ALL
            .into_iter()
            .find(|variant| variant.as_str() == s)
            .ok_or_else(|| SwaraError::table(format!("unknown swara variant `{s}`")))
    }
}

/// Octave register. Madhya (4) is the reference octave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Octave {
    Mandra,
    #[default]
    Madhya,
    Tara,
}

impl Octave {
    pub const REFERENCE: u8 = 4;
    pub const ALL: [Octave; 3] = [Octave::Mandra, Octave::Madhya, Octave::Tara];

    pub fn number(self) -> u8 {
        match self {
            Octave::Mandra => 3,
            Octave::Madhya => 4,
            Octave::Tara => 5,
        }
    }

    /// `2^(octave - 4)`.
    pub fn multiplier(self) -> f32 {
        match self {
            Octave::Mandra => 0.5,
            Octave::Madhya => 1.0,
            Octave::Tara => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Octave::Mandra => "mandra",
            Octave::Madhya => "madhya",
            Octave::Tara => "tara",
        }
    }
}

impl TryFrom<u8> for Octave {
    type Error = SwaraError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            3 => Ok(Octave::Mandra),
            4 => Ok(Octave::Madhya),
            5 => Ok(Octave::Tara),
            other => Err(SwaraError::msg(format!(
                "octave {other} is out of range, expected 3, 4 or 5"
            ))),
        }
    }
}

impl From<Octave> for u8 {
    fn from(octave: Octave) -> Self {
        octave.number()
    }
}

/// A melodic mode: the set of variants that may be played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Raga {
    pub key: String,
    pub name: String,
    pub description: String,
    scale: BTreeSet<SwaraVariant>,
}

impl Raga {
    /// Builds a raga, rejecting scales of the wrong size or with duplicates.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        variants: &[SwaraVariant],
    ) -> Result<Self> {
        let key = key.into();
        let scale: BTreeSet<SwaraVariant> = variants.iter().copied().collect();
        if scale.len() != variants.len() {
            return Err(SwaraError::table(format!(
                "raga `{key}` lists a swara variant more than once"
            )));
        }
        if !RAGA_SIZE.contains(&scale.len()) {
            return Err(SwaraError::table(format!(
                "raga `{key}` has {} swaras, expected {} to {}",
                scale.len(),
                RAGA_SIZE.start(),
                RAGA_SIZE.end()
            )));
        }

        Ok(Self {
            key,
            name: name.into(),
            description: description.into(),
            scale,
        })
    }

    pub fn contains(&self, variant: SwaraVariant) -> bool {
        self.scale.contains(&variant)
    }

    /// Whether any variant of `degree` belongs to this raga.
    pub fn contains_degree(&self, degree: Swara) -> bool {
        degree.variants().iter().any(|variant| self.contains(*variant))
    }

    /// Variants of the raga in ascending order.
    pub fn variants(&self) -> impl Iterator<Item = SwaraVariant> + '_ {
        self.scale.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.scale.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scale.is_empty()
    }
}

/// A cyclic beat pattern used for the beat display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tala {
    pub key: String,
    pub name: String,
    pattern: Vec<bool>,
}

impl Tala {
    /// Builds a tala from its accent pattern (`true` for a strong beat).
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        pattern: Vec<bool>,
    ) -> Result<Self> {
        let key = key.into();
        if pattern.is_empty() {
            return Err(SwaraError::table(format!("tala `{key}` has no beats")));
        }
        Ok(Self {
            key,
            name: name.into(),
            pattern,
        })
    }

    pub fn beats(&self) -> usize {
        self.pattern.len()
    }

    /// Whether `beat` (taken modulo the cycle length) is accented.
    pub fn is_strong(&self, beat: usize) -> bool {
        self.pattern[beat % self.pattern.len()]
    }

    pub fn pattern(&self) -> &[bool] {
        &self.pattern
    }
}

/// Serialized form of a raga, as found in table files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagaDefinition {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub swaras: Vec<SwaraVariant>,
}

/// Serialized form of a tala. `pattern` holds `1` for strong beats and `0`
/// for weak ones and must be exactly `beats` long.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalaDefinition {
    pub key: String,
    pub name: String,
    pub beats: usize,
    pub pattern: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefinitions {
    #[serde(default)]
    pub ragas: Vec<RagaDefinition>,
    #[serde(default)]
    pub talas: Vec<TalaDefinition>,
}

/// Immutable registry of ragas and talas keyed by their short names.
#[derive(Debug, Clone)]
pub struct ScaleTable {
    ragas: Vec<Raga>,
    talas: Vec<Tala>,
}

impl ScaleTable {
    /// Validates the definitions and builds the registry.
    pub fn from_definitions(definitions: TableDefinitions) -> Result<Self> {
        let mut ragas: Vec<Raga> = Vec::with_capacity(definitions.ragas.len());
        for def in definitions.ragas {
            if ragas.iter().any(|raga| raga.key == def.key) {
                return Err(SwaraError::table(format!("duplicate raga `{}`", def.key)));
            }
            ragas.push(Raga::new(def.key, def.name, def.description, &def.swaras)?);
        }

        let mut talas: Vec<Tala> = Vec::with_capacity(definitions.talas.len());
        for def in definitions.talas {
            if talas.iter().any(|tala| tala.key == def.key) {
                return Err(SwaraError::table(format!("duplicate tala `{}`", def.key)));
            }
            if def.pattern.len() != def.beats {
                return Err(SwaraError::table(format!(
                    "tala `{}` declares {} beats but its pattern has {}",
                    def.key,
                    def.beats,
                    def.pattern.len()
                )));
            }
            let mut pattern = Vec::with_capacity(def.beats);
            for accent in &def.pattern {
                match accent {
                    0 => pattern.push(false),
                    1 => pattern.push(true),
                    other => {
                        return Err(SwaraError::table(format!(
                            "tala `{}` has accent {other}, expected 0 or 1",
                            def.key
                        )))
                    }
                }
            }
            talas.push(Tala::new(def.key, def.name, pattern)?);
        }

        if ragas.is_empty() {
            return Err(SwaraError::table("no ragas defined"));
        }
        if talas.is_empty() {
            return Err(SwaraError::table("no talas defined"));
        }

        Ok(Self { ragas, talas })
    }

    /// Parses and validates a JSON table file.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let definitions: TableDefinitions = serde_json::from_str(json)?;
        Self::from_definitions(definitions)
    }

    /// The ragas and talas shipped with the instrument.
    pub fn builtin() -> Self {
        Self::from_definitions(builtin_definitions())
            .unwrap_or_else(|err| unreachable!("built-in scale table is invalid: {err}"))
    }

    pub fn raga(&self, key: &str) -> Option<&Raga> {
        self.ragas.iter().find(|raga| raga.key == key)
    }

    pub fn tala(&self, key: &str) -> Option<&Tala> {
        self.talas.iter().find(|tala| tala.key == key)
    }

    pub fn ragas(&self) -> &[Raga] {
        &self.ragas
    }

    pub fn talas(&self) -> &[Tala] {
        &self.talas
    }
}

impl Default for ScaleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn raga_def(key: &str, name: &str, description: &str, swaras: &[SwaraVariant]) -> RagaDefinition {
    RagaDefinition {
        key: key.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        swaras: swaras.to_vec(),
    }
}

fn tala_def(key: &str, name: &str, pattern: &[u8]) -> TalaDefinition {
    TalaDefinition {
        key: key.to_string(),
        name: name.to_string(),
        beats: pattern.len(),
        pattern: pattern.to_vec(),
    }
}

fn builtin_definitions() -> TableDefinitions {
    use SwaraVariant::*;

    TableDefinitions {
        ragas: vec![
            raga_def(
                "mayamalavagowla",
                "Mayamalavagowla",
                "The first melakarta raga, morning raga",
                &[Sa, Ri1, Ga3, Ma1, Pa, Da1, Ni3],
            ),
            raga_def(
                "shankarabharanam",
                "Shankarabharanam",
                "Equivalent to major scale, very popular",
                &[Sa, Ri2, Ga3, Ma1, Pa, Da2, Ni3],
            ),
            raga_def(
                "kalyani",
                "Kalyani",
                "Bright and uplifting raga",
                &[Sa, Ri2, Ga3, Ma2, Pa, Da2, Ni3],
            ),
            raga_def(
                "kharaharapriya",
                "Kharaharapriya",
                "Natural minor scale equivalent",
                &[Sa, Ri2, Ga2, Ma1, Pa, Da2, Ni2],
            ),
            raga_def(
                "mohanam",
                "Mohanam",
                "Pentatonic raga, very melodious",
                &[Sa, Ri2, Ga3, Pa, Da2],
            ),
            raga_def(
                "hindolam",
                "Hindolam",
                "Evening raga, deeply emotional",
                &[Sa, Ga2, Ma1, Da1, Ni2],
            ),
        ],
        talas: vec![
            tala_def("adi", "Adi Tala", &[1, 0, 1, 0, 1, 1, 0, 1]),
            tala_def("rupaka", "Rupaka Tala", &[1, 0, 1, 1, 0, 1]),
            tala_def("triputa", "Triputa Tala", &[1, 0, 0, 1, 0, 1, 0]),
            tala_def(
                "dhruva",
                "Dhruva Tala",
                &[1, 0, 0, 0, 1, 0, 1, 0, 1, 0, 0, 1, 0, 1],
            ),
        ],
    }
}
