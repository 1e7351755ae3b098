//! # hcupnp - UPnP wire protocols for the HomeCtl control point
//!
//! - [`ssdp`] : M-SEARCH discovery and parsing of the replies
//! - [`soap`] : action envelopes, responses and faults

pub mod soap;
pub mod ssdp;
