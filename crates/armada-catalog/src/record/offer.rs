//! Application-offer records and the offer-local access model.
//!
//! # Purpose
//! An application offer is a cross-model share of an application's endpoints
//! with its own per-user access list. The embedded `users` array is a
//! denormalized read optimization; the relationship graph is authoritative
//! for authorization decisions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Pseudo-user granting access to every authenticated principal.
pub const EVERYONE: &str = "everyone";

/// Offer access levels, ordered: none < read < consume < admin.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum OfferAccess {
    #[default]
    None,
    Read,
    Consume,
    Admin,
}

impl OfferAccess {
    pub fn as_str(self) -> &'static str {
        match self {
            OfferAccess::None => "none",
            OfferAccess::Read => "read",
            OfferAccess::Consume => "consume",
            OfferAccess::Admin => "admin",
        }
    }
}

impl fmt::Display for OfferAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferAccess {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "none" => Ok(OfferAccess::None),
            "read" => Ok(OfferAccess::Read),
            "consume" => Ok(OfferAccess::Consume),
            "admin" => Ok(OfferAccess::Admin),
            _ => Err(Error::bad_request(format!("invalid offer access {s:?}"))),
        }
    }
}

/// One entry of the offer-local access list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferUserDetails {
    pub user: String,
    pub access: OfferAccess,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEndpoint {
    pub name: String,
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationOffer {
    /// Primary key; assigned by the owning backend.
    pub uuid: String,
    /// `<owner>/<model>.<offer>`; unique and stable for the offer's life.
    pub url: String,
    pub owner_name: String,
    pub model_name: String,
    pub offer_name: String,
    pub application_name: String,
    #[serde(default)]
    pub application_description: String,
    #[serde(default)]
    pub charm_url: String,
    #[serde(default)]
    pub endpoints: Vec<OfferEndpoint>,
    #[serde(default)]
    pub spaces: Vec<String>,
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
    #[serde(default)]
    pub users: Vec<OfferUserDetails>,
}

impl ApplicationOffer {
    /// Highest access the user holds on this offer, folding in the
    /// `everyone` pseudo-user.
    pub fn access_for(&self, user: &str) -> OfferAccess {
        self.users
            .iter()
            .filter(|u| u.user == user || u.user == EVERYONE)
            .map(|u| u.access)
            .max()
            .unwrap_or(OfferAccess::None)
    }
}

/// Split an offer URL `<owner>/<model>.<offer>` into its components.
pub fn parse_offer_url(url: &str) -> Result<(String, String, String), Error> {
    let err = || Error::bad_request(format!("invalid offer URL {url:?}"));
    let (owner, rest) = url.split_once('/').ok_or_else(err)?;
    let (model, offer) = rest.split_once('.').ok_or_else(err)?;
    if owner.is_empty() || model.is_empty() || offer.is_empty() || offer.contains('/') {
        return Err(err());
    }
    Ok((owner.to_string(), model.to_string(), offer.to_string()))
}

/// Filters for offer search. String fields are ignored when empty; offer
/// name and description match substrings, everything else is equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferFilter {
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub offer_name: String,
    #[serde(default)]
    pub application_description: String,
    #[serde(default)]
    pub endpoints: Vec<OfferEndpoint>,
    /// Users that must hold at least consume access.
    #[serde(default)]
    pub allowed_consumers: Vec<String>,
}

impl OfferFilter {
    pub fn matches(&self, offer: &ApplicationOffer) -> bool {
        if !self.owner_name.is_empty() && offer.owner_name != self.owner_name {
            return false;
        }
        if !self.model_name.is_empty() && offer.model_name != self.model_name {
            return false;
        }
        if !self.application_name.is_empty() && offer.application_name != self.application_name {
            return false;
        }
        if !self.offer_name.is_empty() && !offer.offer_name.contains(&self.offer_name) {
            return false;
        }
        if !self.application_description.is_empty()
            && !offer
                .application_description
                .contains(&self.application_description)
        {
            return false;
        }
        if !self.endpoints.is_empty() {
            let matched = self.endpoints.iter().any(|want| {
                offer.endpoints.iter().any(|ep| {
                    (want.interface.is_empty() || ep.interface == want.interface)
                        && (want.name.is_empty() || ep.name == want.name)
                        && (want.role.is_empty() || ep.role == want.role)
                })
            });
            if !matched {
                return false;
            }
        }
        if !self.allowed_consumers.is_empty() {
            let matched = self
                .allowed_consumers
                .iter()
                .any(|user| offer.access_for(user) >= OfferAccess::Consume);
            if !matched {
                return false;
            }
        }
        true
    }
}
