//! Bridge between the synchronous event loop and the async API client.
//!
//! Requests run on the tokio runtime; each one reports back exactly once
//! through an unbounded channel that the loop drains every frame.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::ApiError;
use crate::models::{
    Activity, AuthSession, ChatReply, Conversation, GeoLocation, Recommendation, Summary, User,
};

/// Which request a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    Register,
    LoadProfile,
    UpdateProfile,
    ChangePassword,
    DeleteAccount,
    LoadSummary,
    LoadHistory,
    LoadEnergyTypes,
    CreateActivity,
    DeleteActivity,
    Chat,
    LoadConversations,
    LoadRecommendations,
    Locate,
}

impl Action {
    pub fn describe(&self) -> &'static str {
        match self {
            Action::Login => "Login",
            Action::Register => "Sign up",
            Action::LoadProfile => "Loading profile",
            Action::UpdateProfile => "Profile update",
            Action::ChangePassword => "Password change",
            Action::DeleteAccount => "Account deletion",
            Action::LoadSummary => "Loading summary",
            Action::LoadHistory => "Loading history",
            Action::LoadEnergyTypes => "Loading energy types",
            Action::CreateActivity => "Saving activity",
            Action::DeleteActivity => "Deleting activity",
            Action::Chat => "Assistant",
            Action::LoadConversations => "Loading conversations",
            Action::LoadRecommendations => "Loading recommendations",
            Action::Locate => "Location lookup",
        }
    }

    /// A 401 from these means wrong credentials, not an expired token
    pub fn checks_credentials(&self) -> bool {
        matches!(
            self,
            Action::Login | Action::Register | Action::ChangePassword | Action::DeleteAccount
        )
    }
}

#[derive(Debug)]
pub enum ApiEvent {
    SignedIn(AuthSession),
    ProfileLoaded(User),
    ProfileUpdated(User),
    PasswordChanged(String),
    AccountDeleted,
    SummaryLoaded(Summary),
    HistoryLoaded(Vec<Activity>),
    EnergyTypesLoaded(Vec<String>),
    ActivityCreated(Activity),
    ActivityDeleted(String),
    ChatReplied(ChatReply),
    ConversationsLoaded(Vec<Conversation>),
    RecommendationsLoaded(Vec<Recommendation>),
    Located(Option<GeoLocation>),
    Failed { action: Action, error: ApiError },
}

pub struct Worker {
    handle: Handle,
    tx: UnboundedSender<ApiEvent>,
    rx: UnboundedReceiver<ApiEvent>,
    pending: usize,
}

impl Worker {
    pub fn new(handle: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle,
            tx,
            rx,
            pending: 0,
        }
    }

    /// Run `request` in the background and map its success with `on_ok`.
    /// There is no cancellation; late results are still delivered.
    pub fn spawn<T, F>(&mut self, action: Action, request: F, on_ok: fn(T) -> ApiEvent)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        self.pending += 1;
        tracing::debug!(?action, pending = self.pending, "Request started");
        let tx = self.tx.clone();
        self.handle.spawn(async move {
            let event = match request.await {
                Ok(value) => on_ok(value),
                Err(error) => ApiEvent::Failed { action, error },
            };
            // Receiver is gone only when the app is shutting down
            let _ = tx.send(event);
        });
    }

    /// Next finished request, if any. Never blocks.
    pub fn try_next(&mut self) -> Option<ApiEvent> {
        let event = self.rx.try_recv().ok()?;
        self.pending = self.pending.saturating_sub(1);
        Some(event)
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_busy(&self) -> bool {
        self.pending > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn drain_one(worker: &mut Worker) -> ApiEvent {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(event) = worker.try_next() {
                return event;
            }
            assert!(Instant::now() < deadline, "worker produced no event");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_results_arrive_on_channel() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut worker = Worker::new(runtime.handle().clone());

        worker.spawn(Action::LoadEnergyTypes, async { Ok(vec!["Coal".to_string()]) }, ApiEvent::EnergyTypesLoaded);
        assert_eq!(worker.pending(), 1);
        assert!(worker.is_busy());

        match drain_one(&mut worker) {
            ApiEvent::EnergyTypesLoaded(types) => assert_eq!(types, vec!["Coal"]),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(worker.pending(), 0);
    }

    #[test]
    fn test_failures_carry_their_action() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut worker = Worker::new(runtime.handle().clone());

        worker.spawn(
            Action::DeleteActivity,
            async { Err::<String, _>(ApiError::NotAuthenticated) },
            ApiEvent::ActivityDeleted,
        );
        match drain_one(&mut worker) {
            ApiEvent::Failed { action, error } => {
                assert_eq!(action, Action::DeleteActivity);
                assert!(matches!(error, ApiError::NotAuthenticated));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(worker.try_next().is_none());
    }
}
