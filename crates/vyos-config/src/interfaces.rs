//! Interface lookups over a configuration tree.

use crate::tree::ConfigTree;

/// Path under which VyOS lists ethernet interfaces.
pub const ETHERNET_PATH: &str = "interfaces ethernet";

/// Key holding an interface's MAC address.
pub const HW_ID: &str = "hw-id";

/// Returns the name of the ethernet interface whose `hw-id` equals `mac`,
/// compared case-insensitively.
pub fn find_nic_name_by_mac(tree: &ConfigTree, mac: &str) -> Option<String> {
    let mac = mac.to_lowercase();
    tree.get(ETHERNET_PATH)?
        .children()
        .find(|eth| {
            eth.get(HW_ID)
                .and_then(|hw| hw.value().ok())
                .is_some_and(|hw| hw.to_lowercase() == mac)
        })
        .map(|eth| eth.name().to_string())
}
