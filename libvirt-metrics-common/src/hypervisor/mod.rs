//! Hypervisor connection abstraction.
#[cfg(feature = "libvirt")]
pub mod libvirt;
pub mod snapshot;

use uuid::Uuid;

use crate::{error::Result, stats::RawStatValue};

/// Raw bulk statistics of a domain, as dotted key/value pairs.
pub type RawStats = Vec<(Box<str>, RawStatValue)>;

pub trait DomainHandle {
    fn uuid(&self) -> Result<Uuid>;
    fn name(&self) -> Result<String>;
    fn xml_desc(&self) -> Result<String>;
}

pub trait Connection {
    type Domain: DomainHandle;

    /// Bulk statistics of all active domains.
    fn all_active_domain_stats(&self) -> Result<Vec<(Self::Domain, RawStats)>>;

    fn close(self) -> Result<()>;
}

pub trait Hypervisor {
    type Connection: Connection;

    /// Open a connection, `None` lets the backend pick its default URI.
    fn open(&self, uri: Option<&str>) -> Result<Self::Connection>;
}
