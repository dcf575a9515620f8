//! Process-start wiring: settings -> registry -> manager

use crate::settings::{Settings, SettingsError};
use crate::{
    BancoDoBrasilProvider, BradescoProvider, InterProvider, ItauProvider, PixProvider,
    ProviderManager, ProviderRegistry, SantanderProvider,
};
use std::sync::Arc;
use tracing::{debug, info};

/// One uninitialized instance of every built-in adapter
pub fn builtin_providers() -> Vec<Arc<dyn PixProvider>> {
    vec![
        Arc::new(InterProvider::new()),
        Arc::new(BancoDoBrasilProvider::new()),
        Arc::new(SantanderProvider::new()),
        Arc::new(ItauProvider::new()),
        Arc::new(BradescoProvider::new()),
    ]
}

/// Initialize and register every configured, enabled provider.
///
/// Registration follows the built-in order so priority ties resolve the same
/// way on every start.
pub fn build_registry(settings: &Settings) -> Result<Arc<ProviderRegistry>, SettingsError> {
    let builtins = builtin_providers();

    if let Some(unknown) = settings
        .providers
        .keys()
        .find(|code| !builtins.iter().any(|p| p.code() == code.as_str()))
    {
        return Err(SettingsError::UnknownProvider(unknown.clone()));
    }

    let registry = Arc::new(ProviderRegistry::new());

    for provider in builtins {
        let Some(provider_settings) = settings.providers.get(provider.code()) else {
            continue;
        };

        if !provider_settings.enabled {
            debug!(provider = provider.code(), "Provider disabled, skipping");
            continue;
        }

        provider.initialize(provider_settings.config.clone())?;
        registry.register(provider);
    }

    info!(providers = ?registry.codes(), "Provider registry ready");
    Ok(registry)
}

/// Manager over `registry` with configured priorities and freshness
pub fn build_manager(settings: &Settings, registry: Arc<ProviderRegistry>) -> ProviderManager {
    let manager = ProviderManager::new(registry).with_freshness(settings.health.freshness());

    for (code, provider_settings) in settings.enabled_providers() {
        manager.set_priority(code, provider_settings.priority);
    }

    manager
}
