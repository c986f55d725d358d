use chrono::{Local, Utc};
use ratatui::widgets::ListState;
use std::time::Instant;
use tokio::runtime::Handle;

use crate::aggregation::{self, EmissionsReport, GoalProgress};
use crate::api::ApiClient;
use crate::models::{Activity, Category, ChatMessage, ChatRequest, Conversation, GeoLocation, ProfileUpdate, Recommendation, Summary, User};
use crate::places::{self, Places};
use crate::session::{self, Session};
use crate::store::Store;
use crate::submission::{ActivityDraft, ActivityLog, DEFAULT_UNIT, ENERGY_TYPES, ENERGY_UNITS, TRANSPORT_TYPES};
use crate::tui::error::TuiError;
use crate::tui::widgets::input::TextInput;
use crate::tui::worker::{Action, ApiEvent, Worker};
use crate::{Config, Profile};

/// First message of every assistant session
pub const GREETING: &str = "Hi! I'm your personal Ecobot assistant. I can help you reduce your carbon footprint by keeping track of your activities. Would you like any tips or information about reducing your carbon footprint?";

const LABEL_CATEGORY: &str = "Category";
const LABEL_VEHICLE: &str = "Vehicle Type";
const LABEL_ENERGY: &str = "Energy Type";
const LABEL_DISTANCE: &str = "Distance (km)";
const LABEL_USAGE: &str = "Usage";
const LABEL_UNIT: &str = "Unit";
const LABEL_DATE: &str = "Date (YYYY-MM-DD)";
const LABEL_NOTES: &str = "Notes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Activities,
    Discover,
    Assistant,
    Profile,
}

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::Dashboard, Tab::Activities, Tab::Discover, Tab::Assistant, Tab::Profile];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Activities => "Activities",
            Tab::Discover => "Discover",
            Tab::Assistant => "Assistant",
            Tab::Profile => "Profile",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Tab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Tab {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Login/signup screen; nothing else is reachable while signed out
    Auth,
    View,
    Form,
    Search,
    Chat,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Secret,
    /// The first option may be "" meaning nothing chosen yet
    Choice { options: Vec<String>, selected: usize },
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub label: &'static str,
    pub placeholder: &'static str,
    pub input: TextInput,
    pub kind: FieldKind,
}

impl FormField {
    pub fn text(label: &'static str, placeholder: &'static str) -> Self {
        Self {
            label,
            placeholder,
            input: TextInput::new(),
            kind: FieldKind::Text,
        }
    }

    pub fn secret(label: &'static str) -> Self {
        Self {
            label,
            placeholder: "",
            input: TextInput::masked(),
            kind: FieldKind::Secret,
        }
    }

    pub fn choice(label: &'static str, placeholder: &'static str, options: Vec<String>, selected: usize) -> Self {
        let selected = selected.min(options.len().saturating_sub(1));
        Self {
            label,
            placeholder,
            input: TextInput::new(),
            kind: FieldKind::Choice { options, selected },
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        match &mut self.kind {
            FieldKind::Choice { options, selected } => {
                if let Some(index) = options.iter().position(|o| o.eq_ignore_ascii_case(value)) {
                    *selected = index;
                }
            }
            FieldKind::Text | FieldKind::Secret => {
                let masked = self.input.masked;
                self.input = TextInput::from_string(value);
                self.input.masked = masked;
            }
        }
        self
    }

    pub fn value(&self) -> String {
        match &self.kind {
            FieldKind::Choice { options, selected } => options.get(*selected).cloned().unwrap_or_default(),
            FieldKind::Text | FieldKind::Secret => self.input.value(),
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.kind, FieldKind::Choice { .. })
    }

    pub fn cycle(&mut self, forward: bool) {
        if let FieldKind::Choice { options, selected } = &mut self.kind {
            let len = options.len();
            if len == 0 {
                return;
            }
            *selected = if forward { (*selected + 1) % len } else { (*selected + len - 1) % len };
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Login,
    Signup,
    Activity,
    Profile,
    Password,
    DeleteAccount,
    Locate,
}

impl FormKind {
    pub fn title(&self) -> &'static str {
        match self {
            FormKind::Login => "Welcome Back",
            FormKind::Signup => "Create Account",
            FormKind::Activity => "Log New Activity",
            FormKind::Profile => "Profile Settings",
            FormKind::Password => "Change Password",
            FormKind::DeleteAccount => "Delete Account",
            FormKind::Locate => "Find Location",
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match self {
            FormKind::Login => "Log In",
            FormKind::Signup => "Sign Up",
            FormKind::Activity => "Add Activity",
            FormKind::Profile => "Save Changes",
            FormKind::Password => "Change Password",
            FormKind::DeleteAccount => "Delete Account",
            FormKind::Locate => "Search",
        }
    }

    /// The request a submitted form waits on
    pub fn action(&self) -> Action {
        match self {
            FormKind::Login => Action::Login,
            FormKind::Signup => Action::Register,
            FormKind::Activity => Action::CreateActivity,
            FormKind::Profile => Action::UpdateProfile,
            FormKind::Password => Action::ChangePassword,
            FormKind::DeleteAccount => Action::DeleteAccount,
            FormKind::Locate => Action::Locate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Form {
    pub kind: FormKind,
    pub fields: Vec<FormField>,
    pub current: usize,
    /// Inline validation or server error
    pub error: Option<String>,
    /// Waiting for the backend; further submits are ignored
    pub submitting: bool,
}

fn with_empty_choice(options: impl IntoIterator<Item = String>) -> Vec<String> {
    std::iter::once(String::new()).chain(options).collect()
}

impl Form {
    fn new(kind: FormKind, fields: Vec<FormField>) -> Self {
        Self {
            kind,
            fields,
            current: 0,
            error: None,
            submitting: false,
        }
    }

    pub fn login() -> Self {
        Self::new(
            FormKind::Login,
            vec![FormField::text("Email", "you@example.com"), FormField::secret("Password")],
        )
    }

    pub fn signup() -> Self {
        Self::new(
            FormKind::Signup,
            vec![
                FormField::text("Full Name", "Jane Doe"),
                FormField::text("Email", "you@example.com"),
                FormField::secret("Password"),
                FormField::secret("Confirm Password"),
            ],
        )
    }

    pub fn activity(category: Category, energy_types: &[String]) -> Self {
        let categories = Category::LOGGABLE.iter().map(|c| c.label().to_string()).collect::<Vec<_>>();
        let category_index = Category::LOGGABLE.iter().position(|c| *c == category).unwrap_or(0);
        let mut fields = vec![FormField::choice(LABEL_CATEGORY, "", categories, category_index)];

        if category == Category::Energy {
            let options = if energy_types.is_empty() {
                ENERGY_TYPES.iter().map(|t| t.to_string()).collect::<Vec<_>>()
            } else {
                energy_types.to_vec()
            };
            fields.push(FormField::choice(LABEL_ENERGY, "Select energy type", with_empty_choice(options), 0));
            fields.push(FormField::text(LABEL_USAGE, "e.g., 12"));
            let units: Vec<String> = ENERGY_UNITS.iter().map(|u| u.to_string()).collect();
            let unit_index = ENERGY_UNITS.iter().position(|u| *u == DEFAULT_UNIT).unwrap_or(0);
            fields.push(FormField::choice(LABEL_UNIT, "", units, unit_index));
        } else {
            let options = TRANSPORT_TYPES.iter().map(|t| t.to_string());
            fields.push(FormField::choice(LABEL_VEHICLE, "Select vehicle type", with_empty_choice(options), 0));
            fields.push(FormField::text(LABEL_DISTANCE, "e.g., 15"));
        }
        fields.push(FormField::text(LABEL_DATE, "today"));
        fields.push(FormField::text(LABEL_NOTES, "optional"));
        Self::new(FormKind::Activity, fields)
    }

    pub fn profile(user: Option<&User>, default_goal_kg: f64) -> Self {
        let goal = user.and_then(|u| u.weekly_goal_kg).unwrap_or(default_goal_kg);
        Self::new(
            FormKind::Profile,
            vec![
                FormField::text("Full Name", "").with_value(user.map(|u| u.name.as_str()).unwrap_or_default()),
                FormField::text("Email", "").with_value(user.map(|u| u.email.as_str()).unwrap_or_default()),
                FormField::text("Weekly Carbon Goal (kg CO₂)", "45").with_value(&crate::utils::format_number(goal)),
            ],
        )
    }

    pub fn password() -> Self {
        Self::new(
            FormKind::Password,
            vec![
                FormField::secret("Current Password"),
                FormField::secret("New Password"),
                FormField::secret("Confirm New Password"),
            ],
        )
    }

    pub fn delete_account() -> Self {
        Self::new(FormKind::DeleteAccount, vec![FormField::secret("Password")])
    }

    pub fn locate() -> Self {
        Self::new(FormKind::Locate, vec![FormField::text("Address", "e.g., 10 Downing Street, London")])
    }

    pub fn value(&self, index: usize) -> String {
        self.fields.get(index).map(FormField::value).unwrap_or_default()
    }

    fn value_of(&self, label: &str) -> String {
        self.fields.iter().find(|f| f.label == label).map(FormField::value).unwrap_or_default()
    }

    pub fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.current = (self.current + 1) % self.fields.len();
        }
    }

    pub fn prev_field(&mut self) {
        if !self.fields.is_empty() {
            self.current = (self.current + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn is_last_field(&self) -> bool {
        self.current + 1 >= self.fields.len()
    }

    pub fn current_field_mut(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.current)
    }

    /// Category picked in an activity form
    pub fn activity_category(&self) -> Category {
        let label = self.value_of(LABEL_CATEGORY);
        Category::LOGGABLE
            .into_iter()
            .find(|c| c.label() == label)
            .unwrap_or(Category::Transport)
    }

    pub fn activity_draft(&self) -> ActivityDraft {
        let category = self.activity_category();
        let (kind, amount) = match category {
            Category::Energy => (self.value_of(LABEL_ENERGY), self.value_of(LABEL_USAGE)),
            _ => (self.value_of(LABEL_VEHICLE), self.value_of(LABEL_DISTANCE)),
        };
        ActivityDraft {
            kind,
            amount,
            unit: self.value_of(LABEL_UNIT),
            date: self.value_of(LABEL_DATE),
            notes: self.value_of(LABEL_NOTES),
            ..ActivityDraft::new(category)
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub current_tab: Tab,
    pub mode: Mode,
    pub activity_list_state: ListState,
    pub place_list_state: ListState,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            current_tab: Tab::Dashboard,
            mode: Mode::View,
            activity_list_state: ListState::default(),
            place_list_state: ListState::default().with_selected(Some(0)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusState {
    pub message: Option<String>,
    pub message_time: Option<Instant>,
}

#[derive(Debug, Clone, Default)]
pub struct ModalState {
    pub delete_confirmation: Option<Activity>,
    /// 0 = Delete, 1 = Cancel
    pub delete_modal_selection: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub active: Option<Form>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub input: TextInput,
    pub activity_query: String,
    pub activity_filter: Option<Category>,
}

#[derive(Debug, Clone)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub input: TextInput,
    pub conversation_id: Option<String>,
    pub conversations: Vec<Conversation>,
    pub recommendations: Vec<Recommendation>,
    pub awaiting_reply: bool,
    /// Lines scrolled up from the newest message
    pub scroll_from_bottom: usize,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            messages: vec![ChatMessage::bot(GREETING.to_string())],
            input: TextInput::new(),
            conversation_id: None,
            conversations: Vec::new(),
            recommendations: Vec::new(),
            awaiting_reply: false,
            scroll_from_bottom: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoverState {
    pub places: Places,
    pub location: Option<GeoLocation>,
}

pub struct App {
    pub config: Config,
    /// Where theme changes are saved; None when running from an explicit config file
    pub profile: Option<Profile>,
    pub store: Store,
    pub session: Session,
    pub client: ApiClient,
    pub worker: Worker,
    pub ui: UiState,
    pub status: StatusState,
    pub modals: ModalState,
    pub form: FormState,
    pub search: SearchState,
    pub chat: ChatState,
    pub discover: DiscoverState,
    pub activities: ActivityLog,
    pub report: EmissionsReport,
    /// Emissions over the last seven days, for the goal gauge
    pub week_total_kg: f64,
    /// The summary request failed, so the counters follow the loaded history
    pub summary_from_history: bool,
    pub energy_types: Vec<String>,
}

impl App {
    pub fn new(
        config: Config,
        profile: Option<Profile>,
        store: Store,
        session: Session,
        client: ApiClient,
        runtime: Handle,
    ) -> Result<Self, TuiError> {
        let places = Places::load(&store)?;

        let mut app = Self {
            config,
            profile,
            store,
            session,
            client,
            worker: Worker::new(runtime),
            ui: UiState::default(),
            status: StatusState::default(),
            modals: ModalState::default(),
            form: FormState::default(),
            search: SearchState::default(),
            chat: ChatState::default(),
            discover: DiscoverState { places, location: None },
            activities: ActivityLog::new(),
            report: EmissionsReport::default(),
            week_total_kg: 0.0,
            summary_from_history: false,
            energy_types: ENERGY_TYPES.iter().map(|t| t.to_string()).collect(),
        };

        if app.session.is_authenticated() {
            app.refresh();
        } else {
            app.show_auth(Form::login());
        }
        Ok(app)
    }

    fn show_auth(&mut self, form: Form) {
        self.form.active = Some(form);
        self.ui.mode = Mode::Auth;
    }

    /// Summary and history load independently; either may fail alone
    pub fn refresh(&mut self) {
        let client = self.client.clone();
        self.worker.spawn(Action::LoadSummary, async move { client.summary().await }, ApiEvent::SummaryLoaded);
        let client = self.client.clone();
        self.worker.spawn(Action::LoadHistory, async move { client.history(None).await }, ApiEvent::HistoryLoaded);
        let client = self.client.clone();
        self.worker.spawn(Action::LoadEnergyTypes, async move { client.energy_types().await }, ApiEvent::EnergyTypesLoaded);
        let client = self.client.clone();
        self.worker.spawn(Action::LoadProfile, async move { client.profile().await }, ApiEvent::ProfileLoaded);
    }

    pub fn is_loading(&self) -> bool {
        self.worker.is_busy()
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status.message = Some(message);
        self.status.message_time = Some(Instant::now());
    }

    pub fn clear_status_message(&mut self) {
        self.status.message = None;
        self.status.message_time = None;
    }

    /// Check if status message should be auto-cleared (after 3 seconds)
    pub fn check_status_message_timeout(&mut self) {
        const STATUS_MESSAGE_TIMEOUT_SECS: u64 = 3;
        if let Some(time) = self.status.message_time
            && time.elapsed().as_secs() >= STATUS_MESSAGE_TIMEOUT_SECS
        {
            self.clear_status_message();
        }
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.ui.current_tab = tab;
        if tab == Tab::Assistant && self.chat.conversations.is_empty() && self.chat.recommendations.is_empty() {
            self.load_assistant_extras();
        }
    }

    pub fn next_tab(&mut self) {
        self.select_tab(self.ui.current_tab.next());
    }

    pub fn prev_tab(&mut self) {
        self.select_tab(self.ui.current_tab.prev());
    }

    pub fn weekly_goal_kg(&self) -> f64 {
        aggregation::weekly_goal(self.session.user().and_then(|u| u.weekly_goal_kg), self.config.weekly_goal_kg)
    }

    pub fn goal_progress(&self) -> GoalProgress {
        aggregation::goal_progress(self.week_total_kg, self.weekly_goal_kg())
    }

    fn rebuild_report(&mut self) {
        let history = self.activities.history();
        self.report = aggregation::aggregate(history);
        self.week_total_kg = aggregation::rolling_week_total(history, Utc::now(), &Local);
    }

    // Activities tab

    /// History after the category filter and search query
    pub fn visible_activities(&self) -> Vec<&Activity> {
        self.activities
            .filtered(self.search.activity_filter)
            .into_iter()
            .filter(|a| a.matches_search(&self.search.activity_query))
            .collect()
    }

    pub fn selected_activity(&self) -> Option<&Activity> {
        let index = self.ui.activity_list_state.selected()?;
        self.visible_activities().get(index).copied()
    }

    fn clamp_selections(&mut self) {
        let activity_count = self.visible_activities().len();
        let selected = self.ui.activity_list_state.selected();
        self.ui.activity_list_state.select(match (activity_count, selected) {
            (0, _) => None,
            (n, Some(i)) => Some(i.min(n - 1)),
            (_, None) => Some(0),
        });

        let place_count = self.discover.places.visible().len();
        let selected = self.ui.place_list_state.selected();
        self.ui.place_list_state.select(match (place_count, selected) {
            (0, _) => None,
            (n, Some(i)) => Some(i.min(n - 1)),
            (_, None) => Some(0),
        });
    }

    pub fn move_selection(&mut self, down: bool) {
        let activity_count = self.visible_activities().len();
        let place_count = self.discover.places.visible().len();
        let (state, count) = match self.ui.current_tab {
            Tab::Activities => (&mut self.ui.activity_list_state, activity_count),
            Tab::Discover => (&mut self.ui.place_list_state, place_count),
            Tab::Assistant => {
                self.chat.scroll_from_bottom = if down {
                    self.chat.scroll_from_bottom.saturating_sub(1)
                } else {
                    self.chat.scroll_from_bottom + 1
                };
                return;
            }
            _ => return,
        };
        if count == 0 {
            state.select(None);
            return;
        }
        let current = state.selected().unwrap_or(0);
        state.select(Some(if down {
            (current + 1).min(count - 1)
        } else {
            current.saturating_sub(1)
        }));
    }

    /// All -> Transport -> Energy -> All
    pub fn cycle_activity_filter(&mut self) {
        self.search.activity_filter = match self.search.activity_filter {
            None => Some(Category::Transport),
            Some(Category::Transport) => Some(Category::Energy),
            Some(_) => None,
        };
        self.clamp_selections();
    }

    pub fn cycle_place_filter(&mut self) {
        self.discover.places.filter.cycle_category();
        self.clamp_selections();
    }

    // Search

    pub fn enter_search_mode(&mut self) {
        let current = match self.ui.current_tab {
            Tab::Activities => self.search.activity_query.clone(),
            Tab::Discover => self.discover.places.filter.query.clone(),
            _ => return,
        };
        self.search.input = TextInput::from_string(&current);
        self.ui.mode = Mode::Search;
    }

    /// Push the search box contents to the list of the current tab
    pub fn apply_search(&mut self) {
        let query = self.search.input.value();
        match self.ui.current_tab {
            Tab::Activities => self.search.activity_query = query,
            Tab::Discover => self.discover.places.filter.query = query,
            _ => {}
        }
        self.clamp_selections();
    }

    pub fn exit_search_mode(&mut self, keep: bool) {
        if !keep {
            self.search.input.reset();
            self.apply_search();
        }
        self.ui.mode = Mode::View;
    }

    // Forms

    pub fn open_form(&mut self, form: Form) {
        self.form.active = Some(form);
        self.ui.mode = Mode::Form;
    }

    pub fn close_form(&mut self) {
        if self.ui.mode == Mode::Auth {
            return;
        }
        self.form.active = None;
        self.ui.mode = Mode::View;
    }

    pub fn open_activity_form(&mut self) {
        self.open_form(Form::activity(Category::Transport, &self.energy_types));
    }

    pub fn open_profile_form(&mut self) {
        let form = Form::profile(self.session.user(), self.config.weekly_goal_kg);
        self.open_form(form);
    }

    pub fn toggle_auth_form(&mut self) {
        let next = match self.form.active.as_ref().map(|f| f.kind) {
            Some(FormKind::Login) => Form::signup(),
            _ => Form::login(),
        };
        self.show_auth(next);
    }

    /// Left/Right on a choice field. Changing the category swaps the category-specific fields.
    pub fn cycle_form_choice(&mut self, forward: bool) {
        let energy_types = self.energy_types.clone();
        let Some(form) = self.form.active.as_mut() else {
            return;
        };
        let current = form.current;
        let Some(field) = form.current_field_mut() else {
            return;
        };
        field.cycle(forward);

        if form.kind == FormKind::Activity && form.fields.get(current).is_some_and(|f| f.label == LABEL_CATEGORY) {
            let date = form.value_of(LABEL_DATE);
            let notes = form.value_of(LABEL_NOTES);
            let mut rebuilt = Form::activity(form.activity_category(), &energy_types);
            for field in rebuilt.fields.iter_mut() {
                if field.label == LABEL_DATE {
                    *field = field.clone().with_value(&date);
                } else if field.label == LABEL_NOTES {
                    *field = field.clone().with_value(&notes);
                }
            }
            *form = rebuilt;
        }
    }

    fn fail_form(&mut self, message: String) {
        if let Some(form) = self.form.active.as_mut() {
            form.error = Some(message);
            form.submitting = false;
        }
    }

    pub fn submit_form(&mut self) {
        let Some(form) = self.form.active.as_mut() else {
            return;
        };
        if form.submitting {
            return;
        }
        form.error = None;
        let form = form.clone();

        let client = self.client.clone();
        let result: Result<(), String> = match form.kind {
            FormKind::Login => session::login_request(&form.value(0), &form.value(1))
                .map(|request| {
                    self.worker
                        .spawn(Action::Login, async move { client.login(&request).await }, ApiEvent::SignedIn)
                })
                .map_err(|e| e.to_string()),
            FormKind::Signup => {
                session::register_request(&form.value(0), &form.value(1), &form.value(2), &form.value(3))
                    .map(|request| {
                        self.worker.spawn(
                            Action::Register,
                            async move { client.register(&request).await },
                            ApiEvent::SignedIn,
                        )
                    })
                    .map_err(|e| e.to_string())
            }
            // Nothing reaches the backend unless the draft validates
            FormKind::Activity => form
                .activity_draft()
                .validate()
                .map(|activity| {
                    self.worker.spawn(
                        Action::CreateActivity,
                        async move { client.create_activity(&activity).await },
                        ApiEvent::ActivityCreated,
                    )
                })
                .map_err(|e| e.to_string()),
            FormKind::Profile => self.profile_update(&form).map(|update| {
                self.worker.spawn(
                    Action::UpdateProfile,
                    async move { client.update_profile(&update).await },
                    ApiEvent::ProfileUpdated,
                )
            }),
            FormKind::Password => session::password_change(&form.value(0), &form.value(1), &form.value(2))
                .map(|change| {
                    self.worker.spawn(
                        Action::ChangePassword,
                        async move { client.change_password(&change).await },
                        ApiEvent::PasswordChanged,
                    )
                })
                .map_err(|e| e.to_string()),
            FormKind::DeleteAccount => {
                let password = form.value(0);
                if password.is_empty() {
                    Err("Password is required".to_string())
                } else {
                    self.worker.spawn(
                        Action::DeleteAccount,
                        async move { client.delete_account(&password).await },
                        |()| ApiEvent::AccountDeleted,
                    );
                    Ok(())
                }
            }
            FormKind::Locate => {
                let address = form.value(0).trim().to_string();
                if address.is_empty() {
                    Err("Address is required".to_string())
                } else {
                    self.worker
                        .spawn(Action::Locate, async move { client.geocode(&address).await }, ApiEvent::Located);
                    Ok(())
                }
            }
        };

        match result {
            Ok(()) => {
                if let Some(form) = self.form.active.as_mut() {
                    form.submitting = true;
                }
            }
            Err(message) => self.fail_form(message),
        }
    }

    /// Only changed fields are sent
    fn profile_update(&self, form: &Form) -> Result<ProfileUpdate, String> {
        let user = self.session.user();
        let name = form.value(0).trim().to_string();
        let email = form.value(1).trim().to_string();
        let goal_text = form.value(2);
        let goal = goal_text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|g| g.is_finite() && *g > 0.0)
            .ok_or_else(|| format!("Weekly goal must be a positive number, got '{}'", goal_text.trim()))?;
        if name.is_empty() {
            return Err("Name is required".to_string());
        }
        if !email.contains('@') {
            return Err(format!("'{}' is not a valid email address", email));
        }

        let update = ProfileUpdate {
            name: Some(name).filter(|n| user.is_none_or(|u| &u.name != n)),
            email: Some(email).filter(|e| user.is_none_or(|u| &u.email != e)),
            weekly_goal: Some(goal).filter(|g| (g - self.weekly_goal_kg()).abs() > f64::EPSILON),
        };
        if update.is_empty() {
            return Err("Nothing changed".to_string());
        }
        Ok(update)
    }

    // Delete

    pub fn request_delete_selected(&mut self) {
        if let Some(activity) = self.selected_activity().cloned() {
            self.modals.delete_confirmation = Some(activity);
            self.modals.delete_modal_selection = 0;
        }
    }

    pub fn cancel_delete(&mut self) {
        self.modals.delete_confirmation = None;
    }

    /// The entry leaves the local log only once the backend confirms
    pub fn confirm_delete(&mut self) {
        let Some(activity) = self.modals.delete_confirmation.take() else {
            return;
        };
        let client = self.client.clone();
        let id = activity.id.clone();
        self.worker.spawn(
            Action::DeleteActivity,
            async move { client.delete_activity(&id).await.map(|()| id) },
            ApiEvent::ActivityDeleted,
        );
    }

    // Discover

    pub fn selected_place(&self) -> Option<&'static places::EcoPlace> {
        let index = self.ui.place_list_state.selected()?;
        self.discover.places.visible().get(index).copied()
    }

    pub fn toggle_like_selected(&mut self) {
        let Some(place) = self.selected_place() else {
            return;
        };
        match self.discover.places.toggle_like(&self.store, place.id) {
            Ok(true) => self.set_status_message(format!("Saved {}", place.name)),
            Ok(false) => self.set_status_message(format!("Removed {} from saved places", place.name)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist liked places");
                self.set_status_message(format!("Failed to save liked places: {}", e));
            }
        }
    }

    // Assistant

    pub fn send_chat_message(&mut self) {
        let message = self.chat.input.value().trim().to_string();
        if message.is_empty() || self.chat.awaiting_reply {
            return;
        }
        self.chat.input.reset();
        self.chat.messages.push(ChatMessage::user(message.clone()));
        self.chat.awaiting_reply = true;
        self.chat.scroll_from_bottom = 0;

        let request = ChatRequest {
            message,
            conversation_id: self.chat.conversation_id.clone(),
        };
        let client = self.client.clone();
        self.worker.spawn(Action::Chat, async move { client.chat(&request).await }, ApiEvent::ChatReplied);
    }

    pub fn load_assistant_extras(&mut self) {
        if !self.session.is_authenticated() {
            return;
        }
        let client = self.client.clone();
        self.worker.spawn(
            Action::LoadConversations,
            async move { client.conversations().await },
            ApiEvent::ConversationsLoaded,
        );
        let client = self.client.clone();
        self.worker.spawn(
            Action::LoadRecommendations,
            async move { client.recommendations().await },
            ApiEvent::RecommendationsLoaded,
        );
    }

    /// Start a fresh conversation
    pub fn reset_chat(&mut self) {
        let conversations = std::mem::take(&mut self.chat.conversations);
        let recommendations = std::mem::take(&mut self.chat.recommendations);
        self.chat = ChatState {
            conversations,
            recommendations,
            ..ChatState::default()
        };
    }

    pub fn copy_last_reply(&mut self) {
        let Some(reply) = self.chat.messages.iter().rev().find(|m| m.from_bot) else {
            return;
        };
        let text = reply.content.clone();
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_text(text) {
                Ok(()) => self.set_status_message("Copied reply to clipboard".to_string()),
                Err(e) => self.set_status_message(format!("Failed to copy to clipboard: {}", e)),
            },
            Err(_) => self.set_status_message("Failed to access clipboard".to_string()),
        }
    }

    // Profile

    pub fn cycle_theme(&mut self) {
        let themes = self.config.get_available_themes();
        if themes.is_empty() {
            return;
        }
        let index = themes.iter().position(|t| *t == self.config.current_theme).map_or(0, |i| (i + 1) % themes.len());
        let name = themes[index].clone();
        if let Err(e) = self.config.set_theme(&name) {
            self.set_status_message(format!("Failed to set theme: {}", e));
            return;
        }
        if let Some(profile) = self.profile
            && let Err(e) = self.config.save_with_profile(profile)
        {
            tracing::warn!(error = %e, "Theme not saved");
            self.set_status_message(format!("Theme set to {} (not saved: {})", name, e));
            return;
        }
        self.set_status_message(format!("Theme set to {}", name));
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.session.clear(&self.store) {
            tracing::error!(error = %e, "Failed to clear stored session");
        }
        self.client.set_token(None);
        self.activities = ActivityLog::new();
        self.report = EmissionsReport::default();
        self.week_total_kg = 0.0;
        self.summary_from_history = false;
        self.reset_chat();
        self.chat.conversations.clear();
        self.chat.recommendations.clear();
        self.modals = ModalState::default();
        self.ui.current_tab = Tab::Dashboard;
        self.show_auth(Form::login());
    }

    fn expire_session(&mut self) {
        tracing::warn!("Token rejected by the backend; signing out");
        self.logout();
        self.set_status_message("Session expired. Please log in again.".to_string());
    }

    // Results

    pub fn process_api_events(&mut self) {
        while let Some(event) = self.worker.try_next() {
            self.handle_api_event(event);
        }
    }

    fn close_form_of(&mut self, kind: FormKind) {
        if self.form.active.as_ref().is_some_and(|f| f.kind == kind) {
            self.close_form();
        }
    }

    pub fn handle_api_event(&mut self, event: ApiEvent) {
        match event {
            ApiEvent::SignedIn(auth) => {
                let token = auth.token.clone();
                let name = auth.user.display_name().to_string();
                if let Err(e) = self.session.begin(&self.store, auth) {
                    tracing::error!(error = %e, "Failed to persist session");
                    self.set_status_message(format!("Signed in, but the session could not be saved: {}", e));
                } else {
                    self.set_status_message(format!("Welcome, {}!", name));
                }
                self.client.set_token(Some(token));
                self.form.active = None;
                self.ui.mode = Mode::View;
                self.ui.current_tab = Tab::Dashboard;
                self.refresh();
            }
            ApiEvent::ProfileLoaded(user) => self.store_user(user),
            ApiEvent::ProfileUpdated(user) => {
                self.store_user(user);
                self.close_form_of(FormKind::Profile);
                self.set_status_message("Profile updated".to_string());
            }
            ApiEvent::PasswordChanged(message) => {
                self.close_form_of(FormKind::Password);
                self.set_status_message(message);
            }
            ApiEvent::AccountDeleted => {
                self.form.active = None;
                self.logout();
                self.set_status_message("Account deleted".to_string());
            }
            ApiEvent::SummaryLoaded(summary) => {
                self.summary_from_history = false;
                self.activities.replace_summary(summary);
            }
            ApiEvent::HistoryLoaded(history) => {
                tracing::debug!(count = history.len(), "History loaded");
                self.activities.replace_history(history);
                if self.summary_from_history {
                    let derived = Summary::from_activities(self.activities.history());
                    self.activities.replace_summary(derived);
                }
                self.rebuild_report();
                self.clamp_selections();
            }
            ApiEvent::EnergyTypesLoaded(types) => {
                if !types.is_empty() {
                    self.energy_types = types;
                }
            }
            ApiEvent::ActivityCreated(activity) => {
                let message = format!(
                    "Logged {} ({})",
                    activity.kind,
                    crate::utils::format_kg(activity.emission())
                );
                self.activities.record_created(activity);
                self.rebuild_report();
                self.clamp_selections();
                self.close_form_of(FormKind::Activity);
                self.set_status_message(message);
            }
            ApiEvent::ActivityDeleted(id) => {
                if self.activities.remove(&id).is_some() {
                    self.set_status_message("Activity deleted".to_string());
                }
                self.rebuild_report();
                self.clamp_selections();
            }
            ApiEvent::ChatReplied(reply) => {
                self.chat.awaiting_reply = false;
                if reply.conversation_id.is_some() {
                    self.chat.conversation_id = reply.conversation_id;
                }
                self.chat.messages.push(ChatMessage::bot(reply.reply));
                self.chat.scroll_from_bottom = 0;
            }
            ApiEvent::ConversationsLoaded(conversations) => self.chat.conversations = conversations,
            ApiEvent::RecommendationsLoaded(recommendations) => self.chat.recommendations = recommendations,
            ApiEvent::Located(location) => {
                self.close_form_of(FormKind::Locate);
                match &location {
                    Some(found) => self.set_status_message(format!(
                        "Found {}",
                        found.address.clone().unwrap_or_else(|| format!("{:.4}, {:.4}", found.lat, found.lng))
                    )),
                    None => self.set_status_message("No location found".to_string()),
                }
                self.discover.location = location;
            }
            ApiEvent::Failed { action, error } => {
                tracing::warn!(?action, error = %error, "Request failed");
                if error.is_unauthorized() && !action.checks_credentials() && self.session.is_authenticated() {
                    self.expire_session();
                    return;
                }
                if self.form.active.as_ref().is_some_and(|f| f.kind.action() == action) {
                    self.fail_form(error.to_string());
                }
                if action == Action::LoadSummary {
                    // History may arrive later; it re-derives the counters then
                    self.summary_from_history = true;
                    let derived = Summary::from_activities(self.activities.history());
                    self.activities.replace_summary(derived);
                }
                if action == Action::Chat {
                    self.chat.awaiting_reply = false;
                    self.chat
                        .messages
                        .push(ChatMessage::bot("Sorry, I couldn't reach the assistant. Please try again.".to_string()));
                }
                self.set_status_message(format!("{} failed: {}", action.describe(), error));
            }
        }
    }

    fn store_user(&mut self, user: User) {
        if let Err(e) = self.session.update_user(&self.store, user) {
            tracing::error!(error = %e, "Failed to persist user");
        }
    }

    /// The text field that receives typed characters in the current mode
    pub fn current_input_mut(&mut self) -> Option<&mut TextInput> {
        match self.ui.mode {
            Mode::Auth | Mode::Form => {
                let field = self.form.active.as_mut()?.current_field_mut()?;
                if field.is_choice() { None } else { Some(&mut field.input) }
            }
            Mode::Search => Some(&mut self.search.input),
            Mode::Chat => Some(&mut self.chat.input),
            Mode::View | Mode::Help => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthSession, ChatReply, Summary};
    use crate::api::ApiError;

    fn test_app(signed_in: bool) -> (App, tokio::runtime::Runtime) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let store = Store::in_memory().unwrap();
        let mut session = Session::default();
        if signed_in {
            session
                .begin(
                    &store,
                    AuthSession {
                        token: "tok".to_string(),
                        user: User {
                            name: "Ada".to_string(),
                            email: "ada@example.com".to_string(),
                            ..User::default()
                        },
                    },
                )
                .unwrap();
        }
        let mut config = Config::default();
        // Nothing listens here; refresh requests fail quietly in the background
        config.api.base_url = "http://127.0.0.1:9/api".to_string();
        let client = ApiClient::new(&config.api).unwrap().with_token(session.token().map(str::to_string));
        let app = App::new(config, None, store, session, client, runtime.handle().clone()).unwrap();
        (app, runtime)
    }

    fn activity(id: &str, category: Category, co2: f64) -> Activity {
        Activity {
            id: id.to_string(),
            category,
            kind: "Car".to_string(),
            distance_km: Some(10.0),
            usage: None,
            unit: None,
            servings: None,
            co2_kg: co2,
            timestamp: "2025-03-02T10:00:00Z".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_signed_out_starts_on_login() {
        let (app, _rt) = test_app(false);
        assert_eq!(app.ui.mode, Mode::Auth);
        assert_eq!(app.form.active.as_ref().map(|f| f.kind), Some(FormKind::Login));
    }

    #[test]
    fn test_invalid_transport_is_rejected_before_any_request() {
        let (mut app, _rt) = test_app(true);
        let pending = app.worker.pending();
        app.open_activity_form();
        {
            let form = app.form.active.as_mut().unwrap();
            form.current = 1;
            form.fields[1].cycle(true); // Car
            form.fields[2].input = TextInput::from_string("-3");
        }
        app.submit_form();
        let form = app.form.active.as_ref().unwrap();
        assert!(form.error.is_some());
        assert!(!form.submitting);
        assert_eq!(app.worker.pending(), pending);
    }

    #[test]
    fn test_energy_without_type_is_rejected() {
        let (mut app, _rt) = test_app(true);
        let pending = app.worker.pending();
        app.open_activity_form();
        app.cycle_form_choice(true); // Transport -> Energy
        let form = app.form.active.as_mut().unwrap();
        assert_eq!(form.activity_category(), Category::Energy);
        form.fields[2].input = TextInput::from_string("12");
        app.submit_form();
        assert!(app.form.active.as_ref().unwrap().error.is_some());
        assert_eq!(app.worker.pending(), pending);
    }

    #[test]
    fn test_category_switch_keeps_date_and_notes() {
        let (mut app, _rt) = test_app(true);
        app.open_activity_form();
        {
            let form = app.form.active.as_mut().unwrap();
            let last = form.fields.len() - 1;
            form.fields[last].input = TextInput::from_string("commute");
        }
        app.cycle_form_choice(true);
        let form = app.form.active.as_ref().unwrap();
        assert!(form.fields.iter().any(|f| f.label == LABEL_UNIT));
        assert_eq!(form.activity_draft().notes, "commute");
        assert_eq!(form.activity_draft().unit, "kWh");
    }

    #[test]
    fn test_created_and_deleted_activities_update_summary() {
        let (mut app, _rt) = test_app(true);
        app.handle_api_event(ApiEvent::SummaryLoaded(Summary::default()));
        app.handle_api_event(ApiEvent::ActivityCreated(activity("a1", Category::Transport, 2.5)));
        app.handle_api_event(ApiEvent::ActivityCreated(activity("a2", Category::Energy, 4.0)));
        assert_eq!(app.activities.summary().activities_logged, 2);
        assert_eq!(app.report.totals.sum(), 6.5);

        app.handle_api_event(ApiEvent::ActivityDeleted("a1".to_string()));
        assert_eq!(app.activities.summary().activities_logged, 1);
        assert_eq!(app.activities.history().len(), 1);

        // Unknown id leaves counters alone
        app.handle_api_event(ApiEvent::ActivityDeleted("a1".to_string()));
        assert_eq!(app.activities.summary().activities_logged, 1);
    }

    #[test]
    fn test_unauthorized_response_signs_out() {
        let (mut app, _rt) = test_app(true);
        app.handle_api_event(ApiEvent::Failed {
            action: Action::LoadHistory,
            error: ApiError::HttpError { status: 401, message: "Token expired".to_string() },
        });
        assert_eq!(app.ui.mode, Mode::Auth);
        assert!(!app.session.is_authenticated());
        assert!(app.store.get(crate::store::TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn test_failed_summary_is_derived_from_later_history() {
        let (mut app, _rt) = test_app(true);
        app.handle_api_event(ApiEvent::Failed {
            action: Action::LoadSummary,
            error: ApiError::HttpError { status: 500, message: "boom".to_string() },
        });
        assert_eq!(app.activities.summary().activities_logged, 0);

        app.handle_api_event(ApiEvent::HistoryLoaded(vec![
            activity("a", Category::Transport, 3.0),
            activity("b", Category::Energy, 1.0),
        ]));
        let summary = app.activities.summary();
        assert_eq!(summary.activities_logged, 2);
        assert!((summary.total_emissions_kg - 4.0).abs() < 1e-9);
        assert!((summary.average_kg - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_summary_after_history_uses_loaded_records() {
        let (mut app, _rt) = test_app(true);
        app.handle_api_event(ApiEvent::HistoryLoaded(vec![activity("a", Category::Transport, 3.0)]));
        app.handle_api_event(ApiEvent::Failed {
            action: Action::LoadSummary,
            error: ApiError::HttpError { status: 503, message: "down".to_string() },
        });
        assert_eq!(app.activities.summary().activities_logged, 1);
    }

    #[test]
    fn test_failed_login_stays_on_form() {
        let (mut app, _rt) = test_app(false);
        app.handle_api_event(ApiEvent::Failed {
            action: Action::Login,
            error: ApiError::HttpError { status: 401, message: "Invalid credentials".to_string() },
        });
        assert_eq!(app.ui.mode, Mode::Auth);
        let form = app.form.active.as_ref().unwrap();
        assert!(form.error.as_deref().unwrap().contains("Invalid credentials"));
    }

    #[test]
    fn test_chat_keeps_conversation_id() {
        let (mut app, _rt) = test_app(true);
        assert_eq!(app.chat.messages.len(), 1);
        app.chat.input = TextInput::from_string("How do I save energy?");
        app.send_chat_message();
        assert!(app.chat.awaiting_reply);
        assert!(app.chat.input.is_empty());

        app.handle_api_event(ApiEvent::ChatReplied(ChatReply {
            reply: "Turn things **off**.".to_string(),
            conversation_id: Some("c-1".to_string()),
        }));
        assert!(!app.chat.awaiting_reply);
        assert_eq!(app.chat.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(app.chat.messages.len(), 3);

        // A reply without an id keeps the current conversation
        app.handle_api_event(ApiEvent::ChatReplied(ChatReply {
            reply: "More tips".to_string(),
            conversation_id: None,
        }));
        assert_eq!(app.chat.conversation_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn test_activity_filter_and_search() {
        let (mut app, _rt) = test_app(true);
        app.handle_api_event(ApiEvent::HistoryLoaded(vec![
            activity("a1", Category::Transport, 1.0),
            activity("a2", Category::Energy, 2.0),
        ]));
        assert_eq!(app.visible_activities().len(), 2);
        app.cycle_activity_filter();
        assert_eq!(app.visible_activities().len(), 1);
        app.cycle_activity_filter();
        app.cycle_activity_filter();
        assert_eq!(app.search.activity_filter, None);

        app.ui.current_tab = Tab::Activities;
        app.enter_search_mode();
        app.search.input = TextInput::from_string("zzz");
        app.apply_search();
        assert!(app.visible_activities().is_empty());
        assert!(app.selected_activity().is_none());
        app.exit_search_mode(false);
        assert_eq!(app.visible_activities().len(), 2);
    }

    #[test]
    fn test_tab_cycle_wraps() {
        assert_eq!(Tab::Profile.next(), Tab::Dashboard);
        assert_eq!(Tab::Dashboard.prev(), Tab::Profile);
    }
}
