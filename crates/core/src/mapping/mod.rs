use serde::{Deserialize, Serialize};

use crate::{
    gesture::{Finger, FingerKey},
    scale::Swara,
    tracking::Handedness,
    Result, SwaraError,
};

/// Describes which abstract degree a finger plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDescriptor {
    pub hand: Handedness,
    pub finger: Finger,
    pub swara: Swara,
}

/// Fixed finger -> degree routing, set once per play mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTable {
    slots: [Option<Swara>; FingerKey::COUNT],
}

impl AssignmentTable {
    /// A table with no fingers assigned.
    pub fn empty() -> Self {
        Self {
            slots: [None; FingerKey::COUNT],
        }
    }

    /// Traditional layout: left pinky to index play Sa Ri Ga Ma, right index
    /// to ring play Pa Da Ni, right pinky is free.
    pub fn traditional() -> Self {
        use Finger::*;
        use Handedness::*;

        let mut table = Self::empty();
        table.slots[FingerKey::new(Left, Pinky).index()] = Some(Swara::Sa);
        table.slots[FingerKey::new(Left, Ring).index()] = Some(Swara::Ri);
        table.slots[FingerKey::new(Left, Middle).index()] = Some(Swara::Ga);
        table.slots[FingerKey::new(Left, Index).index()] = Some(Swara::Ma);
        table.slots[FingerKey::new(Right, Index).index()] = Some(Swara::Pa);
        table.slots[FingerKey::new(Right, Middle).index()] = Some(Swara::Da);
        table.slots[FingerKey::new(Right, Ring).index()] = Some(Swara::Ni);
        table
    }

    /// Builds a table from descriptors, rejecting thumbs and fingers that are
    /// assigned twice.
    pub fn from_descriptors(descriptors: &[MappingDescriptor]) -> Result<Self> {
        let mut table = Self::empty();
        for descriptor in descriptors {
            if descriptor.finger == Finger::Thumb {
                return Err(SwaraError::table(format!(
                    "{} thumb cannot carry a swara",
                    descriptor.hand.as_str()
                )));
            }
            let slot = &mut table.slots[FingerKey::new(descriptor.hand, descriptor.finger).index()];
            if slot.is_some() {
                return Err(SwaraError::table(format!(
                    "{} {} is assigned more than once",
                    descriptor.hand.as_str(),
                    descriptor.finger.as_str()
                )));
            }
            *slot = Some(descriptor.swara);
        }
        Ok(table)
    }

    pub fn swara_for(&self, key: FingerKey) -> Option<Swara> {
        self.slots[key.index()]
    }

    pub fn descriptors(&self) -> Vec<MappingDescriptor> {
        FingerKey::tracked()
            .filter_map(|key| {
                self.swara_for(key).map(|swara| MappingDescriptor {
                    hand: key.hand,
                    finger: key.finger,
                    swara,
                })
            })
            .collect()
    }
}

impl Default for AssignmentTable {
    fn default() -> Self {
        Self::traditional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traditional_layout_covers_all_seven_degrees() {
        let table = AssignmentTable::traditional();
        let mut degrees: Vec<Swara> = table.descriptors().iter().map(|d| d.swara).collect();
        degrees.sort();
        assert_eq!(degrees, Swara::ALL.to_vec());
        assert_eq!(
            table.swara_for(FingerKey::new(Handedness::Right, Finger::Pinky)),
            None
        );
        assert_eq!(
            table.swara_for(FingerKey::new(Handedness::Left, Finger::Ring)),
            Some(Swara::Ri)
        );
    }

    #[test]
    fn descriptors_round_trip_through_the_table() {
        let table = AssignmentTable::traditional();
        let rebuilt = AssignmentTable::from_descriptors(&table.descriptors()).unwrap();
        assert_eq!(rebuilt, table);
    }

    #[test]
    fn rejects_thumb_and_duplicate_assignments() {
        let thumb = MappingDescriptor {
            hand: Handedness::Left,
            finger: Finger::Thumb,
            swara: Swara::Sa,
        };
        assert!(AssignmentTable::from_descriptors(&[thumb]).is_err());

        let index = MappingDescriptor {
            hand: Handedness::Right,
            finger: Finger::Index,
            swara: Swara::Pa,
        };
        let err = AssignmentTable::from_descriptors(&[index, index]).unwrap_err();
        assert!(format!("{err}").contains("more than once"));
    }
}
