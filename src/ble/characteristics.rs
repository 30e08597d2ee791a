//! GATT characteristic handling.
//!
//! Maps each [`CharacteristicRole`] to the transport handle found for it
//! during service discovery. A map is built fresh on every connect.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::ble::transport::DiscoveredCharacteristic;
use crate::ble::uuids::CharacteristicRole;
use crate::error::{Error, Result};

/// Role-to-handle map for one connection.
#[derive(Debug, Clone)]
pub struct CharacteristicMap<H> {
    handles: HashMap<CharacteristicRole, H>,
}

impl<H: Clone> CharacteristicMap<H> {
    /// Build the map from the characteristics a transport enumerated.
    ///
    /// Characteristics with no recognised role are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CharacteristicNotFound`] for the first required role
    /// that is missing.
    pub fn from_discovered(discovered: Vec<DiscoveredCharacteristic<H>>) -> Result<Self> {
        let mut handles = HashMap::new();

        for characteristic in discovered {
            match CharacteristicRole::from_uuid(&characteristic.uuid) {
                Some(role) => {
                    debug!("Found characteristic {} for {}", characteristic.uuid, role);
                    handles.insert(role, characteristic.handle);
                }
                None => trace!("Ignoring characteristic {}", characteristic.uuid),
            }
        }

        let map = Self { handles };
        for role in CharacteristicRole::REQUIRED {
            map.require(role)?;
        }

        Ok(map)
    }

    /// Get the handle for a role.
    pub fn get(&self, role: CharacteristicRole) -> Option<&H> {
        self.handles.get(&role)
    }

    /// Get the handle for a role, failing with a typed error if it is missing.
    pub fn require(&self, role: CharacteristicRole) -> Result<H> {
        self.handles
            .get(&role)
            .cloned()
            .ok_or(Error::CharacteristicNotFound { role })
    }

    /// Check if a role was found.
    pub fn contains(&self, role: CharacteristicRole) -> bool {
        self.handles.contains_key(&role)
    }

    /// Number of mapped roles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if nothing was mapped.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn discovered(roles: &[CharacteristicRole]) -> Vec<DiscoveredCharacteristic<u16>> {
        roles
            .iter()
            .map(|role| DiscoveredCharacteristic {
                uuid: role.uuid(),
                handle: role.short(),
            })
            .collect()
    }

    #[test]
    fn test_map_all_roles() {
        let map = CharacteristicMap::from_discovered(discovered(&CharacteristicRole::ALL)).unwrap();
        assert_eq!(map.len(), 5);
        assert_eq!(map.require(CharacteristicRole::Pair).unwrap(), 0xFFF2);
        assert!(map.contains(CharacteristicRole::History));
    }

    #[test]
    fn test_history_is_optional() {
        let map =
            CharacteristicMap::from_discovered(discovered(&CharacteristicRole::REQUIRED)).unwrap();
        assert!(map.get(CharacteristicRole::History).is_none());
        assert!(matches!(
            map.require(CharacteristicRole::History),
            Err(Error::CharacteristicNotFound {
                role: CharacteristicRole::History
            })
        ));
    }

    #[test]
    fn test_missing_required_role() {
        let result = CharacteristicMap::from_discovered(discovered(&[
            CharacteristicRole::SettingsNotify,
            CharacteristicRole::RealtimeTempNotify,
            CharacteristicRole::SettingsUpdate,
        ]));
        assert!(matches!(
            result,
            Err(Error::CharacteristicNotFound {
                role: CharacteristicRole::Pair
            })
        ));
    }

    #[test]
    fn test_unrelated_characteristics_ignored() {
        let mut chars = discovered(&CharacteristicRole::REQUIRED);
        chars.push(DiscoveredCharacteristic {
            uuid: Uuid::from_u128(0x0000_2a29_0000_1000_8000_00805f9b34fb),
            handle: 0x2A29,
        });
        let map = CharacteristicMap::from_discovered(chars).unwrap();
        assert_eq!(map.len(), 4);
    }
}
