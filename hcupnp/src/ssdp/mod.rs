//! # Module SSDP - Simple Service Discovery Protocol
//!
//! Côté *control point* du protocole SSDP : envoi d'un M-SEARCH en multicast
//! et lecture des réponses unicast des devices.
//!
//! ## Architecture
//!
//! - [`SsdpClient`] : envoie la requête et expose les réponses sous forme d'itérateur
//! - [`SsdpTransport`] : la socket sous-jacente ([`UdpSsdpTransport`] en production)
//! - [`SsdpHeaders`] : une réponse parsée, en-têtes insensibles à la casse
//!
//! ## Constants SSDP
//!
//! - **Multicast Address**: 239.255.255.250:1900
//! - **Max-Age**: 1800 secondes (30 minutes) quand CACHE-CONTROL est absent

mod client;
mod headers;

pub use client::{Datagram, SearchResponses, SsdpClient, SsdpTransport, UdpSsdpTransport};
pub use headers::{DiscoveryParseError, SsdpHeaders, SsdpMessageKind, parse_datagram};

/// Adresse multicast SSDP
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Durée de validité des annonces (en secondes)
pub const MAX_AGE: u32 = 1800;

/// Search target matching every device and service
pub const SSDP_ALL: &str = "ssdp:all";
