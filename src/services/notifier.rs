use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tauri::AppHandle;
use tauri_plugin_notification::{NotificationExt, PermissionState};
use thiserror::Error;
use uuid::Uuid;

// Delivery tick. Armed instants are minute-granular, so a coarse tick is
// plenty.
const DELIVERY_TICK_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Primary,
    FollowUp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformHints {
    pub sound: Option<String>,
}

/// Everything the notification subsystem needs to deliver one reminder.
/// `rule_id` + `occurrence_key` correlate a delivered notification back to
/// the occurrence it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub rule_id: String,
    pub occurrence_key: String,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub hints: Option<PlatformHints>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification subsystem unavailable")]
    Unavailable,
    #[error("notification request rejected: {0}")]
    Rejected(String),
    #[error("unknown or already-fired handle {0}")]
    UnknownHandle(String),
}

/// The scheduler's view of the notification subsystem: arm one delivery at
/// a future instant, get back an opaque handle, cancel by handle. Injected
/// everywhere as an explicit dependency; there is no global instance.
pub trait Notifier: Send + Sync {
    fn arm(&self, instant: NaiveDateTime, payload: &NotificationPayload)
        -> Result<String, NotifyError>;
    fn cancel(&self, handle: &str) -> Result<(), NotifyError>;
}

struct ArmedNotification {
    instant: NaiveDateTime,
    payload: NotificationPayload,
}

/// Production notifier. The desktop notification plugin can only show
/// immediately, so arming keeps an in-memory table of pending deliveries
/// that a spawned loop drains when they come due. The table is volatile:
/// a restart drops every armed entry, and the startup refresh pass re-arms
/// from persisted rules.
pub struct SystemNotifier {
    app_handle: AppHandle,
    available: bool,
    armed: Mutex<HashMap<String, ArmedNotification>>,
}

impl SystemNotifier {
    pub fn new(app_handle: AppHandle) -> Self {
        let available = match app_handle.notification().permission_state() {
            Ok(state) => matches!(state, PermissionState::Granted),
            Err(e) => {
                log::error!("Failed to query notification permission: {}", e);
                false
            }
        };
        if !available {
            log::warn!("Notification permission not granted; reminders will not be delivered");
        }

        Self {
            app_handle,
            available,
            armed: Mutex::new(HashMap::new()),
        }
    }

    /// Spawns the delivery loop. Call once after construction.
    pub fn start(self: &Arc<Self>) {
        let notifier = Arc::clone(self);
        tauri::async_runtime::spawn(async move {
            println!("[Notifier] ✅ Delivery loop started (tick every {}s)", DELIVERY_TICK_SECS);
            loop {
                notifier.deliver_due();
                tokio::time::sleep(Duration::from_secs(DELIVERY_TICK_SECS)).await;
            }
        });
    }

    fn lock_armed(&self) -> MutexGuard<'_, HashMap<String, ArmedNotification>> {
        self.armed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn deliver_due(&self) {
        let now = chrono::Local::now().naive_local();

        let due: Vec<ArmedNotification> = {
            let mut armed = self.lock_armed();
            let due_handles: Vec<String> = armed
                .iter()
                .filter(|(_, entry)| entry.instant <= now)
                .map(|(handle, _)| handle.clone())
                .collect();
            due_handles
                .into_iter()
                .filter_map(|handle| armed.remove(&handle))
                .collect()
        };

        if due.is_empty() {
            return;
        }

        let settings = crate::utils::paths::read_settings(&self.app_handle);
        if !settings.notifications.enabled {
            log::info!(
                "Notifications disabled in settings, dropping {} due reminder(s)",
                due.len()
            );
            return;
        }

        for entry in due {
            self.show(&entry.payload, settings.notifications.play_sound);
        }
    }

    fn show(&self, payload: &NotificationPayload, play_sound: bool) {
        let mut builder = self
            .app_handle
            .notification()
            .builder()
            .title(payload.title.as_str())
            .body(payload.body.as_str());

        if play_sound {
            if let Some(sound) = payload.hints.as_ref().and_then(|h| h.sound.as_deref()) {
                builder = builder.sound(sound);
            }
        }

        if let Err(e) = builder.show() {
            log::error!(
                "Failed to show notification for {}: {}",
                payload.occurrence_key,
                e
            );
        }
    }
}

impl Notifier for SystemNotifier {
    fn arm(
        &self,
        instant: NaiveDateTime,
        payload: &NotificationPayload,
    ) -> Result<String, NotifyError> {
        if !self.available {
            return Err(NotifyError::Unavailable);
        }

        // Callers only emit future or just-due instants; anything more than
        // a minute stale is dropped rather than shown late.
        let now = chrono::Local::now().naive_local();
        if now.signed_duration_since(instant).num_seconds() > 60 {
            return Err(NotifyError::Rejected(format!(
                "instant {} already elapsed",
                instant
            )));
        }

        let handle = Uuid::new_v4().to_string();
        self.lock_armed().insert(
            handle.clone(),
            ArmedNotification {
                instant,
                payload: payload.clone(),
            },
        );
        Ok(handle)
    }

    fn cancel(&self, handle: &str) -> Result<(), NotifyError> {
        match self.lock_armed().remove(handle) {
            Some(_) => Ok(()),
            None => Err(NotifyError::UnknownHandle(handle.to_string())),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashSet;

    /// Records arms and cancels; can be told to reject specific arm calls
    /// (1-based call index) to exercise partial-failure paths.
    #[derive(Default)]
    pub struct MockNotifier {
        arm_calls: Mutex<usize>,
        fail_on: HashSet<usize>,
        armed: Mutex<Vec<(String, NaiveDateTime, NotificationPayload)>>,
        issued: Mutex<Vec<String>>,
        cancelled: Mutex<Vec<String>>,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(indices: &[usize]) -> Self {
            Self {
                fail_on: indices.iter().copied().collect(),
                ..Self::default()
            }
        }

        pub fn armed_count(&self) -> usize {
            self.armed.lock().unwrap().len()
        }

        pub fn armed_instants(&self) -> Vec<NaiveDateTime> {
            self.armed.lock().unwrap().iter().map(|(_, i, _)| *i).collect()
        }

        /// Every handle ever returned from `arm`, cancelled or not.
        pub fn issued_handles(&self) -> Vec<String> {
            self.issued.lock().unwrap().clone()
        }

        pub fn cancelled_handles(&self) -> Vec<String> {
            self.cancelled.lock().unwrap().clone()
        }
    }

    impl Notifier for MockNotifier {
        fn arm(
            &self,
            instant: NaiveDateTime,
            payload: &NotificationPayload,
        ) -> Result<String, NotifyError> {
            let mut calls = self.arm_calls.lock().unwrap();
            *calls += 1;
            if self.fail_on.contains(&*calls) {
                return Err(NotifyError::Rejected(format!(
                    "injected failure on arm call {}",
                    *calls
                )));
            }
            let handle = format!("handle-{}", *calls);
            self.issued.lock().unwrap().push(handle.clone());
            self.armed
                .lock()
                .unwrap()
                .push((handle.clone(), instant, payload.clone()));
            Ok(handle)
        }

        fn cancel(&self, handle: &str) -> Result<(), NotifyError> {
            self.cancelled.lock().unwrap().push(handle.to_string());
            let mut armed = self.armed.lock().unwrap();
            match armed.iter().position(|(h, _, _)| h == handle) {
                Some(idx) => {
                    armed.remove(idx);
                    Ok(())
                }
                None => Err(NotifyError::UnknownHandle(handle.to_string())),
            }
        }
    }
}
