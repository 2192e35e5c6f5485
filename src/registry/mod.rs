//! Immutable clan registry.
//!
//! Built once at startup from [`AppConfig`] and never mutated afterwards;
//! components share it behind an `Arc`. Lookups are pure.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown clan: {0}")]
    UnknownClan(String),

    #[error("No default clan configured")]
    NoDefaultClan,

    #[error("No credential configured for clan {0}")]
    MissingCredential(String),

    #[error("Duplicate clan tag: {0}")]
    DuplicateTag(String),
}

/// Ranking-service region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Na,
    Eu,
    Asia,
    Ru,
}

/// Opaque per-clan API credential.
///
/// `Debug` and `Display` never reveal the token; the HTTP client reads
/// it through [`ApiToken::expose`] when building the auth header.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for request signing only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiToken(***)")
    }
}

impl fmt::Display for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// One clan's identity and credential material.
#[derive(Debug, Clone)]
pub struct ClanIdentity {
    /// External-service clan id
    pub clan_id: i64,

    /// Clan tag, unique case-insensitively
    pub tag: String,

    /// Display name
    pub display_name: String,

    /// Home region
    pub region: Region,

    /// API credential for this clan
    pub credential: ApiToken,

    /// Branding color as a hex string
    pub brand_color: String,
}

/// Process-wide clan lookup table.
pub struct ClanRegistry {
    clans: Vec<ClanIdentity>,
    by_tag: HashMap<String, usize>,
    by_id: HashMap<i64, usize>,
    default_index: Option<usize>,
}

impl ClanRegistry {
    /// Build the registry from configuration, resolving credentials.
    ///
    /// Credentials named via `token_env` are read from the process
    /// environment here, once; a clan without any resolvable credential
    /// fails construction.
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        let mut clans = Vec::with_capacity(config.clans.len());
        let mut by_tag = HashMap::new();
        let mut by_id = HashMap::new();

        for (index, entry) in config.clans.iter().enumerate() {
            let token = match (&entry.token, &entry.token_env) {
                (Some(token), _) => ApiToken::new(token.clone()),
                (None, Some(var)) => std::env::var(var)
                    .map(ApiToken::new)
                    .map_err(|_| RegistryError::MissingCredential(entry.tag.clone()))?,
                (None, None) => {
                    return Err(RegistryError::MissingCredential(entry.tag.clone()));
                }
            };

            let key = entry.tag.to_ascii_lowercase();
            if by_tag.insert(key, index).is_some() {
                return Err(RegistryError::DuplicateTag(entry.tag.clone()));
            }
            by_id.insert(entry.id, index);

            clans.push(ClanIdentity {
                clan_id: entry.id,
                tag: entry.tag.clone(),
                display_name: entry.name.clone(),
                region: entry.region,
                credential: token,
                brand_color: entry.color.clone(),
            });
        }

        let default_index = match &config.default_clan {
            Some(tag) => Some(
                *by_tag
                    .get(&tag.to_ascii_lowercase())
                    .ok_or_else(|| RegistryError::UnknownClan(tag.clone()))?,
            ),
            None => None,
        };

        Ok(Self {
            clans,
            by_tag,
            by_id,
            default_index,
        })
    }

    /// Look up a clan by tag, case-insensitively.
    pub fn resolve_tag(&self, tag: &str) -> Result<&ClanIdentity, RegistryError> {
        self.by_tag
            .get(&tag.to_ascii_lowercase())
            .map(|&i| &self.clans[i])
            .ok_or_else(|| RegistryError::UnknownClan(tag.to_string()))
    }

    /// Look up a clan by its numeric id.
    pub fn resolve_id(&self, id: i64) -> Result<&ClanIdentity, RegistryError> {
        self.by_id
            .get(&id)
            .map(|&i| &self.clans[i])
            .ok_or_else(|| RegistryError::UnknownClan(id.to_string()))
    }

    /// All clans in configuration order.
    pub fn list_all(&self) -> &[ClanIdentity] {
        &self.clans
    }

    /// The configured default clan.
    pub fn default_clan(&self) -> Result<&ClanIdentity, RegistryError> {
        self.default_index
            .map(|i| &self.clans[i])
            .ok_or(RegistryError::NoDefaultClan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClanConfig;

    fn clan_entry(id: i64, tag: &str) -> ClanConfig {
        ClanConfig {
            id,
            tag: tag.to_string(),
            name: format!("Clan {}", tag),
            region: Region::Eu,
            color: "#1e90ff".to_string(),
            token: Some(format!("token-{}", id)),
            token_env: None,
        }
    }

    fn config(clans: Vec<ClanConfig>, default: Option<&str>) -> AppConfig {
        AppConfig {
            default_clan: default.map(|s| s.to_string()),
            clans,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_tag_case_insensitive() {
        let registry =
            ClanRegistry::from_config(&config(vec![clan_entry(776, "PN31")], None)).unwrap();

        assert_eq!(registry.resolve_tag("PN31").unwrap().clan_id, 776);
        assert_eq!(registry.resolve_tag("pn31").unwrap().clan_id, 776);
        assert_eq!(registry.resolve_tag("Pn31").unwrap().clan_id, 776);
    }

    #[test]
    fn test_resolve_unknown_tag() {
        let registry =
            ClanRegistry::from_config(&config(vec![clan_entry(776, "PN31")], None)).unwrap();

        assert!(matches!(
            registry.resolve_tag("ZZ99"),
            Err(RegistryError::UnknownClan(_))
        ));
    }

    #[test]
    fn test_resolve_by_id() {
        let registry = ClanRegistry::from_config(&config(
            vec![clan_entry(776, "PN31"), clan_entry(801, "PN30")],
            None,
        ))
        .unwrap();

        assert_eq!(registry.resolve_id(801).unwrap().tag, "PN30");
        assert!(registry.resolve_id(999).is_err());
    }

    #[test]
    fn test_list_all_preserves_config_order() {
        let registry = ClanRegistry::from_config(&config(
            vec![clan_entry(776, "PN31"), clan_entry(801, "PN30")],
            None,
        ))
        .unwrap();

        let tags: Vec<_> = registry.list_all().iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["PN31", "PN30"]);
    }

    #[test]
    fn test_default_clan() {
        let registry = ClanRegistry::from_config(&config(
            vec![clan_entry(776, "PN31"), clan_entry(801, "PN30")],
            Some("pn30"),
        ))
        .unwrap();

        assert_eq!(registry.default_clan().unwrap().tag, "PN30");
    }

    #[test]
    fn test_missing_default_clan() {
        let registry =
            ClanRegistry::from_config(&config(vec![clan_entry(776, "PN31")], None)).unwrap();

        assert!(matches!(
            registry.default_clan(),
            Err(RegistryError::NoDefaultClan)
        ));
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let result = ClanRegistry::from_config(&config(
            vec![clan_entry(776, "PN31"), clan_entry(801, "pn31")],
            None,
        ));

        assert!(matches!(result, Err(RegistryError::DuplicateTag(_))));
    }

    #[test]
    fn test_missing_credential_rejected() {
        let mut entry = clan_entry(776, "PN31");
        entry.token = None;
        let result = ClanRegistry::from_config(&config(vec![entry], None));

        assert!(matches!(result, Err(RegistryError::MissingCredential(_))));
    }

    #[test]
    fn test_credential_from_environment() {
        std::env::set_var("CLAN_SYNC_TEST_TOKEN", "env-secret");
        let mut entry = clan_entry(776, "PN31");
        entry.token = None;
        entry.token_env = Some("CLAN_SYNC_TEST_TOKEN".to_string());

        let registry = ClanRegistry::from_config(&config(vec![entry], None)).unwrap();
        let clan = registry.resolve_tag("PN31").unwrap();

        assert_eq!(clan.credential.expose(), "env-secret");
    }

    #[test]
    fn test_token_never_printed() {
        let token = ApiToken::new("very-secret");

        assert_eq!(format!("{:?}", token), "ApiToken(***)");
        assert_eq!(format!("{}", token), "***");

        let clan = ClanIdentity {
            clan_id: 776,
            tag: "PN31".to_string(),
            display_name: "Pristine Navy".to_string(),
            region: Region::Eu,
            credential: token,
            brand_color: "#1e90ff".to_string(),
        };
        assert!(!format!("{:?}", clan).contains("very-secret"));
    }
}
