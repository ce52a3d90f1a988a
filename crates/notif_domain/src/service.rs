use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::{
    clock::{Clock, SystemClock},
    config::NotificationConfig,
    error::{NotificationError, Result},
    events::EventRelay,
    guard::DuplicateGuard,
    keys,
    memory::MemoryStore,
    notifications::{
        NotificationPresenter, ScheduleUpdate, ScheduledNotification, ShowRequest, TaskOutcome,
        TaskRunner,
    },
    registry::{RestoreReport, ScheduleRegistry},
    store::KeyValueStore,
};

/// Facade over the registry, the duplicate guard and the presenter.
pub struct NotificationService {
    config: NotificationConfig,
    store: Arc<dyn KeyValueStore>,
    presenter: Arc<dyn NotificationPresenter>,
    registry: ScheduleRegistry,
    guard: DuplicateGuard,
    events: EventRelay,
}

pub struct NotificationServiceBuilder {
    config: NotificationConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    runner: Option<Arc<dyn TaskRunner>>,
    presenter: Option<Arc<dyn NotificationPresenter>>,
    clock: Option<Arc<dyn Clock>>,
}

impl NotificationServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: NotificationConfig::default(),
            store: None,
            runner: None,
            presenter: None,
            clock: None,
        }
    }

    pub fn with_config(mut self, config: NotificationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_task_runner(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn NotificationPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<NotificationService> {
        let runner = self
            .runner
            .ok_or(NotificationError::MissingCollaborator("task runner"))?;
        let presenter = self
            .presenter
            .ok_or(NotificationError::MissingCollaborator("presenter"))?;
        let store: Arc<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None => {
                debug!("no store configured, falling back to memory");
                Arc::new(MemoryStore::new())
            }
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let registry = ScheduleRegistry::new(
            store.clone(),
            runner,
            presenter.clone(),
            clock.clone(),
        );
        let guard = DuplicateGuard::new(
            store.clone(),
            presenter.clone(),
            clock,
            self.config.default_duplicate_window_secs,
        );
        Ok(NotificationService {
            config: self.config,
            store,
            presenter,
            registry,
            guard,
            events: EventRelay::new(),
        })
    }
}

impl Default for NotificationServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationService {
    pub fn builder() -> NotificationServiceBuilder {
        NotificationServiceBuilder::new()
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    pub fn registry(&self) -> &ScheduleRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    pub fn events(&self) -> &EventRelay {
        &self.events
    }

    /// Registers the configured notification channel.
    pub fn initialize(&self) -> Result<bool> {
        self.presenter.ensure_channel(&self.config.channel)?;
        info!(channel = %self.config.channel.id, "notification channel ready");
        Ok(true)
    }

    pub fn request_permissions(&self) -> Result<bool> {
        self.presenter.request_permissions()
    }

    pub fn are_notifications_enabled(&self) -> Result<bool> {
        self.presenter.notifications_enabled()
    }

    /// Presents immediately. Returns `Ok(false)` when a duplicate key is
    /// still inside its suppression window.
    #[instrument(skip(self, request), fields(id = %request.id))]
    pub fn show_notification(&self, request: &ShowRequest) -> Result<bool> {
        if let Some(key) = request.duplicate_key.as_deref() {
            if self.guard.is_duplicate(key, request.duplicate_window)? {
                debug!(key, "suppressing duplicate notification");
                return Ok(false);
            }
        }

        self.presenter.present(&request.id, &request.content)?;

        if let Some(key) = request.duplicate_key.as_deref() {
            self.guard.mark_sent(key)?;
        }
        Ok(true)
    }

    pub fn cancel_notification(&self, id: &str) -> Result<()> {
        self.presenter.cancel(id)
    }

    /// Clears displayed notifications; pending schedules stay armed.
    pub fn cancel_all_notifications(&self) -> Result<()> {
        self.presenter.cancel_all()
    }

    pub fn schedule_notification(&self, record: ScheduledNotification) -> Result<bool> {
        self.registry.schedule(record)
    }

    pub fn update_scheduled_notification(&self, update: ScheduleUpdate) -> Result<bool> {
        self.registry.update(update)
    }

    pub fn scheduled_notifications(&self) -> Result<Vec<ScheduledNotification>> {
        self.registry.list()
    }

    pub fn cancel_scheduled_notification(&self, id: &str) -> Result<()> {
        self.registry.cancel(id)
    }

    pub fn cancel_all_scheduled_notifications(&self) -> Result<()> {
        self.registry.cancel_all()
    }

    pub fn restore_scheduled(&self) -> RestoreReport {
        self.registry.restore()
    }

    pub fn on_task_fired(&self, payload: &serde_json::Value) -> TaskOutcome {
        self.registry.on_task_fired(payload)
    }

    pub fn is_duplicate(&self, key: &str, window_secs: Option<u64>) -> Result<bool> {
        self.guard.is_duplicate(key, window_secs)
    }

    pub fn clear_notification_history(&self) -> Result<()> {
        self.guard.clear_history()
    }

    /// Native badge when the presenter has one, the stored count otherwise.
    pub fn badge_count(&self) -> Result<u32> {
        if let Some(native) = self.presenter.badge_count()? {
            return Ok(native);
        }
        Ok(self
            .store
            .get(keys::BADGE_COUNT_KEY)?
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(0))
    }

    pub fn set_badge_count(&self, count: u32) -> Result<()> {
        if !self.presenter.set_badge_count(count)? {
            self.store.set(keys::BADGE_COUNT_KEY, &count.to_string())?;
        }
        Ok(())
    }

    pub fn clear_badge_count(&self) -> Result<()> {
        self.set_badge_count(0)
    }
}
