//! Provider and model catalog
//!
//! A static, ordered list of vendors with their credential key names and model
//! lists. Resolution of a mention token against the catalog depends on which
//! credentials are present, so every query takes a [`CredentialStore`].

mod builtin;

use crate::workspace::CredentialStore;
use serde::Serialize;

/// One model offered by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<&'static str>,
}

/// A vendor entry in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderSpec {
    pub id: &'static str,
    pub name: &'static str,
    /// Credential store key holding this provider's API key
    pub key_name: &'static str,
    pub models: &'static [ModelSpec],
}

/// A model together with the provider that serves it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: &'static ProviderSpec,
    pub model: &'static ModelSpec,
}

impl ModelRef {
    /// Mention token for this model (id suffix after the last `/`)
    pub fn mention(&self) -> &'static str {
        short_id(self.model.id)
    }
}

/// Result of resolving a token against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// First match whose provider has a credential
    Usable(ModelRef),
    /// Matches exist, but no matching provider has a credential
    Unusable(Vec<ModelRef>),
    NotFound,
}

/// Suffix of a model id after the last `/`
pub fn short_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

fn token_matches(model_id: &str, token: &str) -> bool {
    model_id == token
        || short_id(model_id) == token
        || (model_id.len() > token.len()
            && model_id.ends_with(token)
            && model_id[..model_id.len() - token.len()].ends_with('/'))
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderRegistry {
    providers: &'static [ProviderSpec],
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProviderRegistry {
    pub fn builtin() -> Self {
        Self {
            providers: builtin::PROVIDERS,
        }
    }

    /// Providers in declaration order
    pub fn providers(&self) -> &'static [ProviderSpec] {
        self.providers
    }

    pub fn provider(&self, id: &str) -> Option<&'static ProviderSpec> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// True when the provider's credential is present and non-empty
    pub fn is_usable(&self, provider: &ProviderSpec, credentials: &dyn CredentialStore) -> bool {
        credentials
            .get(provider.key_name)
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Every catalog model the token matches, in provider declaration order
    ///
    /// Within a provider only the first matching model is taken.
    pub fn matches(&self, token: &str) -> Vec<ModelRef> {
        self.providers
            .iter()
            .filter_map(|provider| {
                provider
                    .models
                    .iter()
                    .find(|m| token_matches(m.id, token))
                    .map(|model| ModelRef { provider, model })
            })
            .collect()
    }

    /// Resolve a mention token to a usable model
    pub fn resolve(&self, token: &str, credentials: &dyn CredentialStore) -> Resolution {
        let candidates = self.matches(token);
        if candidates.is_empty() {
            return Resolution::NotFound;
        }

        match candidates
            .iter()
            .find(|c| self.is_usable(c.provider, credentials))
        {
            Some(usable) => Resolution::Usable(*usable),
            None => Resolution::Unusable(candidates),
        }
    }

    /// Usable models grouped by provider in declaration order
    pub fn list_usable(&self, credentials: &dyn CredentialStore) -> Vec<ModelRef> {
        self.providers
            .iter()
            .filter(|p| self.is_usable(p, credentials))
            .flat_map(|provider| {
                provider
                    .models
                    .iter()
                    .map(move |model| ModelRef { provider, model })
            })
            .collect()
    }

    /// Every catalog model, usable or not
    pub fn list_all(&self) -> Vec<ModelRef> {
        self.providers
            .iter()
            .flat_map(|provider| {
                provider
                    .models
                    .iter()
                    .map(move |model| ModelRef { provider, model })
            })
            .collect()
    }

    /// First model whose id or short id equals `model_id`
    pub fn find_model(&self, model_id: &str) -> Option<ModelRef> {
        self.list_all()
            .into_iter()
            .find(|r| r.model.id == model_id || short_id(r.model.id) == model_id)
    }

    /// Reverse lookup of the provider that serves a model id
    ///
    /// Falls back to "the id contains the provider id" for unlisted models.
    pub fn provider_for_model(&self, model_id: &str) -> Option<&'static ProviderSpec> {
        if model_id.is_empty() {
            return None;
        }
        self.providers.iter().find(|p| {
            p.models
                .iter()
                .any(|m| m.id == model_id || short_id(m.id) == model_id)
                || model_id.contains(p.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Credentials;

    fn creds(keys: &[&str]) -> Credentials {
        let mut c = Credentials::default();
        for key in keys {
            c.set(key, "secret");
        }
        c
    }

    #[test]
    fn test_declaration_order() {
        let ids: Vec<&str> = ProviderRegistry::builtin()
            .providers()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "openai",
                "claude",
                "gemini",
                "grok",
                "deepseek",
                "openrouter",
                "doubao",
                "qwen",
                "kimi",
                "glm"
            ]
        );
    }

    #[test]
    fn test_resolve_prefers_first_usable_provider() {
        let registry = ProviderRegistry::builtin();

        let both = creds(&["openaiKey", "openrouterKey"]);
        match registry.resolve("gpt-4o", &both) {
            Resolution::Usable(r) => {
                assert_eq!(r.provider.id, "openai");
                assert_eq!(r.model.id, "gpt-4o");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let router_only = creds(&["openrouterKey"]);
        match registry.resolve("gpt-4o", &router_only) {
            Resolution::Usable(r) => {
                assert_eq!(r.provider.id, "openrouter");
                assert_eq!(r.model.id, "openai/gpt-4o");
                assert_eq!(r.mention(), "gpt-4o");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_full_id() {
        let registry = ProviderRegistry::builtin();
        match registry.resolve("anthropic/claude-3.5-sonnet", &creds(&["openrouterKey"])) {
            Resolution::Usable(r) => assert_eq!(r.model.id, "anthropic/claude-3.5-sonnet"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unusable_lists_candidates() {
        let registry = ProviderRegistry::builtin();
        match registry.resolve("gpt-4o", &creds(&[])) {
            Resolution::Unusable(candidates) => {
                let providers: Vec<&str> = candidates.iter().map(|c| c.provider.id).collect();
                assert_eq!(providers, vec!["openai", "openrouter"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_not_found() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(
            registry.resolve("gpt-99", &creds(&["openaiKey"])),
            Resolution::NotFound
        );
        // A bare suffix without the separator does not match
        assert_eq!(
            registry.resolve("4o", &creds(&["openaiKey"])),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_blank_credential_is_offline() {
        let registry = ProviderRegistry::builtin();
        let mut c = Credentials::default();
        c.set("deepseekKey", "   ");
        assert!(matches!(
            registry.resolve("deepseek-chat", &c),
            Resolution::Unusable(_)
        ));
    }

    #[test]
    fn test_list_usable_grouped() {
        let registry = ProviderRegistry::builtin();
        let usable = registry.list_usable(&creds(&["kimiKey", "deepseekKey"]));
        assert_eq!(usable.len(), 3 + 4);
        assert_eq!(usable[0].provider.id, "deepseek");
        assert_eq!(usable[3].provider.id, "kimi");
        assert!(registry.list_usable(&creds(&[])).is_empty());
    }

    #[test]
    fn test_provider_for_model() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.provider_for_model("glm-4-air").unwrap().id, "glm");
        assert_eq!(
            registry.provider_for_model("llama-3.3-70b-instruct").unwrap().id,
            "openrouter"
        );
        assert_eq!(
            registry.provider_for_model("qwen-vl-max").unwrap().id,
            "qwen"
        );
        assert!(registry.provider_for_model("").is_none());
        assert!(registry.provider_for_model("my-bot").is_none());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;
        use proptest::sample::Index;

        proptest! {
            #[test]
            fn prop_short_id_resolves_within_own_provider(provider_ix: Index, model_ix: Index) {
                let registry = ProviderRegistry::builtin();
                let provider = provider_ix.get(registry.providers());
                let model = model_ix.get(provider.models);

                let credentials = creds(&[provider.key_name]);
                match registry.resolve(short_id(model.id), &credentials) {
                    Resolution::Usable(r) => {
                        prop_assert_eq!(r.provider.id, provider.id);
                        prop_assert_eq!(r.model.id, model.id);
                    }
                    other => prop_assert!(false, "unexpected: {:?}", other),
                }
            }

            #[test]
            fn prop_full_id_resolves_to_itself(provider_ix: Index, model_ix: Index) {
                let registry = ProviderRegistry::builtin();
                let provider = provider_ix.get(registry.providers());
                let model = model_ix.get(provider.models);

                let credentials = creds(&[provider.key_name]);
                match registry.resolve(model.id, &credentials) {
                    Resolution::Usable(r) => prop_assert_eq!(r.model.id, model.id),
                    other => prop_assert!(false, "unexpected: {:?}", other),
                }
            }
        }
    }
}
