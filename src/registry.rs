//! Endpoint registry
//!
//! Turns the `address[:label]` specifications coming from the command line and
//! the `iperf-servers` section of the configuration file into an ordered list
//! of [`Endpoint`]s. Nothing here touches the network; reachability is only
//! discovered when a probe runs.

use crate::error::{AppError, Result};
use crate::models::Endpoint;

/// Separator between address and label in a specification
const LABEL_SEPARATOR: char = ':';

/// Ordered set of endpoints, built from every configuration source
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
}

impl EndpointRegistry {
    /// Create a registry from already resolved endpoints
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    /// Build a registry from `(address, label)` pairs, as found in the
    /// configuration file
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let endpoints = pairs
            .into_iter()
            .map(|(address, label)| endpoint_from_pair(address, label))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(endpoints))
    }

    /// Parse a single `address` or `address:label` specification
    pub fn parse_spec(spec: &str) -> Result<Endpoint> {
        let mut tokens = spec.trim().split(LABEL_SEPARATOR);
        let address = tokens.next().unwrap_or_default().trim();
        let label = tokens.next().map(|label| label.trim().to_string());

        if tokens.next().is_some() {
            return Err(AppError::config(format!(
                "Invalid perf server '{}': expected 'address' or 'address:label'",
                spec
            )));
        }

        if address.is_empty() {
            return Err(AppError::config(format!(
                "Invalid perf server '{}': address cannot be empty",
                spec
            )));
        }

        Ok(Endpoint::new(address, label))
    }

    /// Parse a comma-separated list of specifications, skipping blank items
    pub fn parse_list(list: &str) -> Result<Vec<Endpoint>> {
        list.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Self::parse_spec)
            .collect()
    }

    /// Append endpoints after the existing ones
    pub fn extend(&mut self, more: Vec<Endpoint>) {
        self.endpoints.extend(more);
    }

    /// Endpoints in registry order
    pub fn into_vec(self) -> Vec<Endpoint> {
        self.endpoints
    }
}

fn endpoint_from_pair(address: String, label: Option<String>) -> Result<Endpoint> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AppError::config("Perf server address cannot be empty"));
    }
    let label = label.map(|label| label.trim().to_string());
    Ok(Endpoint::new(address, label))
}
