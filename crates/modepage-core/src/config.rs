use crate::pdt::Pdt;
use crate::registry::Namespace;

/// Immutable options of one page operation.
///
/// Built once per invocation and passed by reference into every editor
/// call; nothing in the crate keeps option state between devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EditConfig {
    /// Table namespace used to resolve pages and fields.
    pub namespace: Namespace,
    /// Peripheral device type to use instead of the one INQUIRY reports.
    pub pdt_override: Option<Pdt>,
    /// Downgrade some validation failures to warnings.
    pub flexible: bool,
    /// Prepare writes but never send them.
    pub dummy: bool,
    /// Use the 6-byte MODE SENSE/SELECT commands.
    pub six_byte: bool,
    /// Ask the device to omit block descriptors.
    pub disable_block_descriptors: bool,
    /// Also store changes as the saved values.
    pub save: bool,
    /// Report changeable, default and saved values alongside current.
    pub all_variants: bool,
    /// Fetch the changeable mask before a write and warn about fixed bits.
    pub check_changeable: bool,
}

impl EditConfig {
    /// Configuration for the given namespace with every toggle off.
    #[must_use]
    pub fn for_namespace(namespace: Namespace) -> Self {
        Self {
            namespace,
            ..Self::default()
        }
    }

    /// Device type used for table lookups: the override when set, else
    /// what the device reported.
    #[must_use]
    pub fn effective_pdt(&self, reported: Option<Pdt>) -> Option<Pdt> {
        self.pdt_override.or(reported)
    }
}

#[cfg(test)]
mod tests {
    use super::EditConfig;
    use crate::pdt::Pdt;
    use crate::registry::{Namespace, TransportId};

    #[test]
    fn default_is_generic_ten_byte_read_write() {
        let config = EditConfig::default();
        assert_eq!(config.namespace, Namespace::Generic);
        assert!(!config.six_byte);
        assert!(!config.dummy);
        assert!(!config.save);
    }

    #[test]
    fn override_wins_over_reported_pdt() {
        let mut config = EditConfig::for_namespace(Namespace::Transport(TransportId::SAS));
        assert_eq!(config.effective_pdt(Some(Pdt::DISK)), Some(Pdt::DISK));
        config.pdt_override = Some(Pdt::TAPE);
        assert_eq!(config.effective_pdt(Some(Pdt::DISK)), Some(Pdt::TAPE));
    }
}
