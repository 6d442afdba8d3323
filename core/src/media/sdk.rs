//! Provider SDK scripts as lazily-initialized, process-wide state.
//!
//! The first adapter that needs an SDK injects its script; every other
//! adapter awaits the same shared load. A failed or timed-out load is
//! evicted so a later mount can try again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::host::ScriptHost;
use crate::error::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sdk {
    YouTube,
    Vimeo,
}

impl Sdk {
    pub fn name(self) -> &'static str {
        match self {
            Sdk::YouTube => "youtube",
            Sdk::Vimeo => "vimeo",
        }
    }

    pub fn script_url(self) -> &'static str {
        match self {
            Sdk::YouTube => "https://www.youtube.com/iframe_api",
            Sdk::Vimeo => "https://player.vimeo.com/api/player.js",
        }
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<(), AdapterError>>>;

static GLOBAL: Lazy<Arc<SdkRegistry>> = Lazy::new(|| Arc::new(SdkRegistry::new()));

/// Cache of in-flight and completed SDK loads, keyed by provider.
#[derive(Default)]
pub struct SdkRegistry {
    loads: Mutex<HashMap<Sdk, SharedLoad>>,
}

impl SdkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry every environment uses by default.
    pub fn global() -> Arc<SdkRegistry> {
        GLOBAL.clone()
    }

    /// Make sure `sdk` is loaded, injecting its script at most once.
    pub async fn ensure_loaded(
        &self,
        host: &Arc<dyn ScriptHost>,
        sdk: Sdk,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        if host.sdk_present(sdk) {
            return Ok(());
        }

        let load = {
            let mut loads = self.loads.lock();
            loads
                .entry(sdk)
                .or_insert_with(|| {
                    log::info!("Injecting {} SDK script {}", sdk.name(), sdk.script_url());
                    let inject = host.inject_script(sdk, sdk.script_url());
                    async move {
                        match tokio::time::timeout(timeout, inject).await {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(reason)) => Err(AdapterError::SdkLoad {
                                sdk: sdk.name(),
                                reason,
                            }),
                            Err(_) => Err(AdapterError::SdkTimeout {
                                sdk: sdk.name(),
                                waited_ms: timeout.as_millis() as u64,
                            }),
                        }
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };

        let result = load.await;
        if let Err(e) = &result {
            log::warn!("{}", e);
            self.loads.lock().remove(&sdk);
        }
        result
    }

    pub fn is_cached(&self, sdk: Sdk) -> bool {
        self.loads.lock().contains_key(&sdk)
    }
}

impl fmt::Debug for SdkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loads = self.loads.lock();
        f.debug_struct("SdkRegistry")
            .field("loads", &loads.keys().collect::<Vec<_>>())
            .finish()
    }
}
