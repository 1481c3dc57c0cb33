//! libvirt backend, using `virConnectGetAllDomainStats`.
use std::ffi::CStr;

use uuid::Uuid;
use virt::{connect::Connect, domain::Domain, sys};

use super::{Connection, DomainHandle, Hypervisor, RawStats};
use crate::{
    error::{Error, Result},
    stats::RawStatValue,
};

/// Request all statistics groups supported by the hypervisor.
const ALL_STATS: sys::virDomainStatsTypes = 0;

#[derive(Clone, Copy, Debug, Default)]
pub struct LibvirtHypervisor;

pub struct LibvirtConnection(Connect);

pub struct LibvirtDomain(Domain);

impl Hypervisor for LibvirtHypervisor {
    type Connection = LibvirtConnection;

    fn open(&self, uri: Option<&str>) -> Result<LibvirtConnection> {
        Connect::open(uri)
            .map(LibvirtConnection)
            .map_err(|e| Error::Connection(e.to_string()))
    }
}

/// Decode the typed parameters of a stats record.
///
/// # Safety
/// `record` must point to a valid record returned by libvirt.
unsafe fn record_stats(record: &sys::virDomainStatsRecord) -> RawStats {
    if record.params.is_null() || record.nparams <= 0 {
        return vec![];
    }

    let params = std::slice::from_raw_parts(record.params, record.nparams as usize);
    let mut stats = Vec::with_capacity(params.len());

    for param in params {
        let key = CStr::from_ptr(param.field.as_ptr()).to_string_lossy();

        let value = match param.type_ as sys::virTypedParameterType {
            sys::VIR_TYPED_PARAM_INT => RawStatValue::from(param.value.i as i64),
            sys::VIR_TYPED_PARAM_UINT => RawStatValue::from(param.value.ui as u64),
            sys::VIR_TYPED_PARAM_LLONG => RawStatValue::from(param.value.l as i64),
            sys::VIR_TYPED_PARAM_ULLONG => RawStatValue::from(param.value.ul as u64),
            sys::VIR_TYPED_PARAM_DOUBLE => RawStatValue::from(param.value.d),
            sys::VIR_TYPED_PARAM_BOOLEAN => RawStatValue::from(param.value.b != 0),
            sys::VIR_TYPED_PARAM_STRING if !param.value.s.is_null() => {
                RawStatValue::Text(CStr::from_ptr(param.value.s).to_string_lossy().into())
            }
            other => {
                tracing::debug!("Ignoring {key}: unsupported parameter type {other}");
                continue;
            }
        };

        stats.push((key.into(), value));
    }

    stats
}

/// Decode a stats record and release it, handing its domain reference over
/// to the returned [LibvirtDomain].
///
/// # Safety
/// `ptr` must be a non-null record returned by `virConnectGetAllDomainStats`,
/// not freed yet. It is invalid once this returns.
unsafe fn take_record(ptr: sys::virDomainStatsRecordPtr) -> (LibvirtDomain, RawStats) {
    let raw = &*ptr;
    let stats = record_stats(raw);

    sys::virTypedParamsFree(raw.params, raw.nparams);
    let domain = LibvirtDomain(Domain::from_ptr(raw.dom));
    libc::free(ptr as *mut libc::c_void);

    (domain, stats)
}

impl Connection for LibvirtConnection {
    type Domain = LibvirtDomain;

    fn all_active_domain_stats(&self) -> Result<Vec<(LibvirtDomain, RawStats)>> {
        let records = self
            .0
            .get_all_domain_stats(ALL_STATS, sys::VIR_CONNECT_GET_ALL_DOMAINS_STATS_ACTIVE)
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(records
            .into_iter()
            .filter(|record| !record.ptr.is_null())
            .map(|record| unsafe { take_record(record.ptr) })
            .collect())
    }

    fn close(mut self) -> Result<()> {
        self.0
            .close()
            .map(|_| ())
            .map_err(|e| Error::Connection(e.to_string()))
    }
}

impl DomainHandle for LibvirtDomain {
    fn uuid(&self) -> Result<Uuid> {
        let uuid = self
            .0
            .get_uuid_string()
            .map_err(|e| Error::Domain(e.to_string()))?;

        Uuid::parse_str(&uuid).map_err(|e| Error::Domain(format!("{uuid}: {e}")))
    }

    fn name(&self) -> Result<String> {
        self.0.get_name().map_err(|e| Error::Domain(e.to_string()))
    }

    fn xml_desc(&self) -> Result<String> {
        self.0
            .get_xml_desc(0)
            .map_err(|e| Error::Domain(e.to_string()))
    }
}
