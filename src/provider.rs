use std::sync::{Arc, Weak};

use crate::{
    client::{ConfigClient, ConfigSnapshot, HookStatus, SettingValue},
    evaluation::FromSettingValue,
    events::{EventHandler, EventStream, ProviderEvent},
    synced::Synced,
    EvaluationContext, ProviderEvaluation, User, Value,
};

/// Describes the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderMetadata {
    /// Provider name reported to the host SDK.
    pub name: &'static str,
}

impl ProviderMetadata {
    const CONFIGCAT: ProviderMetadata = ProviderMetadata {
        name: "ConfigCatProvider",
    };
}

/// State shared between the provider and the change hook registered with the client.
///
/// Each cell is synchronized on its own. Readers may observe a snapshot and a user coming from
/// different updates.
struct ProviderState<S> {
    initialized: Synced<bool>,
    snapshot: Synced<Option<S>>,
    user: Synced<Option<User>>,
    events: EventHandler,
}

impl<S: ConfigSnapshot + Clone> ProviderState<S> {
    fn snapshot_changed(&self, snapshot: S) {
        let has_data = snapshot.cache_state().has_data();
        self.snapshot.set(Some(snapshot));
        if has_data {
            self.mark_ready();
        }
    }

    /// Transition to ready, emitting [`ProviderEvent::Ready`] only for the first caller.
    fn mark_ready(&self) {
        if self.initialized.test_and_set(&false, true) {
            log::info!(target: "configcat", "provider is ready");
            self.events.send(ProviderEvent::Ready);
        }
    }
}

/// Feature flag provider backed by a [`ConfigClient`].
///
/// Evaluation methods are synchronous and can be called from any thread at any time, including
/// before the provider is ready: they use the latest snapshot delivered by the client (or pull
/// one) and never fail. Problems are reported in the returned [`ProviderEvaluation`] together with
/// the caller's default value.
///
/// # Examples
/// ```
/// # use std::sync::Arc;
/// # use configcat_openfeature::{ConfigCatProvider, LocalClient};
/// let client = LocalClient::from_json(r#"{
///     "settings": {
///         "enabledFeature": { "type": "boolean", "value": true, "variationId": "v-enabled" }
///     }
/// }"#).unwrap();
/// let provider = ConfigCatProvider::new(Arc::new(client));
///
/// let evaluation = provider.get_boolean_evaluation("enabledFeature", false, None);
/// assert!(evaluation.value);
/// ```
pub struct ConfigCatProvider<C: ConfigClient> {
    client: Arc<C>,
    state: Arc<ProviderState<C::Snapshot>>,
}

impl<C: ConfigClient> ConfigCatProvider<C> {
    /// Create a provider over `client` and subscribe to its configuration changes.
    pub fn new(client: Arc<C>) -> Self {
        let state = Arc::new(ProviderState {
            initialized: Synced::new(false),
            snapshot: Synced::new(None),
            user: Synced::new(None),
            events: EventHandler::new(),
        });

        // The client outlives the provider in general, so the hook must not keep state alive.
        let weak: Weak<ProviderState<C::Snapshot>> = Arc::downgrade(&state);
        client.on_config_changed(Box::new(move |snapshot: C::Snapshot| {
            let Some(state) = weak.upgrade() else {
                return HookStatus::Remove;
            };
            log::debug!(target: "configcat", cache_state:? = snapshot.cache_state(); "configuration changed");
            state.snapshot_changed(snapshot);
            HookStatus::Keep
        }));

        ConfigCatProvider { client, state }
    }

    /// The wrapped client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Metadata describing this provider.
    pub fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::CONFIGCAT
    }

    /// Return `true` once the provider has emitted [`ProviderEvent::Ready`].
    pub fn is_ready(&self) -> bool {
        self.state.initialized.get()
    }

    /// Set the initial context, then wait for the client to finish loading.
    ///
    /// If the client ends up with flag data, the provider becomes ready (unless a configuration
    /// change already made it ready).
    pub async fn initialize(&self, initial_context: Option<&EvaluationContext>) {
        self.state
            .user
            .set(initial_context.map(EvaluationContext::to_user));

        let cache_state = self.client.wait_for_ready().await;
        log::debug!(target: "configcat", cache_state:? = cache_state; "client finished initial load");
        if cache_state.has_data() {
            let snapshot = self.client.snapshot();
            self.state.snapshot.set(Some(snapshot));
            self.state.mark_ready();
        }
    }

    /// Replace the cached context used by evaluations.
    pub fn on_context_set(
        &self,
        _old_context: Option<&EvaluationContext>,
        new_context: &EvaluationContext,
    ) {
        self.state.user.set(Some(new_context.to_user()));
    }

    /// Subscribe to provider events emitted from now on.
    pub fn observe(&self) -> EventStream {
        self.state.events.observe()
    }

    /// Evaluate a boolean flag.
    pub fn get_boolean_evaluation(
        &self,
        key: &str,
        default_value: bool,
        context: Option<&EvaluationContext>,
    ) -> ProviderEvaluation<bool> {
        self.eval(key, default_value.into(), context)
            .typed(default_value)
    }

    /// Evaluate a string flag.
    pub fn get_string_evaluation(
        &self,
        key: &str,
        default_value: &str,
        context: Option<&EvaluationContext>,
    ) -> ProviderEvaluation<String> {
        self.eval(key, default_value.into(), context)
            .typed(default_value.to_owned())
    }

    /// Evaluate an integer flag. The engine evaluates 32-bit integers; the result is widened.
    pub fn get_integer_evaluation(
        &self,
        key: &str,
        default_value: i64,
        context: Option<&EvaluationContext>,
    ) -> ProviderEvaluation<i64> {
        self.eval_typed(key, 0i32, context).widen(default_value)
    }

    /// Evaluate a double flag.
    pub fn get_double_evaluation(
        &self,
        key: &str,
        default_value: f64,
        context: Option<&EvaluationContext>,
    ) -> ProviderEvaluation<f64> {
        self.eval(key, default_value.into(), context)
            .typed(default_value)
    }

    /// Evaluate a string flag holding a JSON document and decode it into a [`Value`].
    pub fn get_object_evaluation(
        &self,
        key: &str,
        default_value: Value,
        context: Option<&EvaluationContext>,
    ) -> ProviderEvaluation<Value> {
        self.eval_typed(key, String::new(), context)
            .decode_json(default_value)
    }

    fn eval_typed<T>(
        &self,
        key: &str,
        default_value: T,
        context: Option<&EvaluationContext>,
    ) -> ProviderEvaluation<T>
    where
        T: FromSettingValue + Clone + Into<SettingValue>,
    {
        self.eval(key, default_value.clone().into(), context)
            .typed(default_value)
    }

    fn eval(
        &self,
        key: &str,
        default_value: SettingValue,
        context: Option<&EvaluationContext>,
    ) -> ProviderEvaluation<SettingValue> {
        // Cells are copied out before calling into the client so no lock is held across it.
        let snapshot = match self.state.snapshot.get() {
            Some(snapshot) => snapshot,
            None => self.client.snapshot(),
        };
        let user = self
            .state
            .user
            .get()
            .or_else(|| context.map(EvaluationContext::to_user));

        let details = snapshot.get_value_details(key, default_value, user.as_ref());
        let evaluation = details.to_provider_evaluation();

        if let Some(error_code) = evaluation.error_code {
            log::warn!(target: "configcat",
                       flag_key = key,
                       error_code:? = error_code,
                       error_message:? = evaluation.error_message;
                       "error occurred while evaluating a flag");
        } else {
            log::trace!(target: "configcat",
                        flag_key = key,
                        reason:display = evaluation.reason,
                        variant:? = evaluation.variant;
                        "evaluated a flag");
        }

        evaluation
    }
}
