//! Journey document model: the per-user record synced to the remote store.

use serde::{Deserialize, Serialize};

/// The five stages a journey tracks to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Visa,
    Flight,
    House,
    Profile,
    Job,
}

impl Milestone {
    /// Every milestone, in hub display order.
    pub const ALL: [Milestone; 5] = [
        Milestone::Profile,
        Milestone::Visa,
        Milestone::Flight,
        Milestone::House,
        Milestone::Job,
    ];
}

impl std::fmt::Display for Milestone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Visa => "visa",
            Self::Flight => "flight",
            Self::House => "house",
            Self::Profile => "profile",
            Self::Job => "job",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Milestone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visa" => Ok(Self::Visa),
            "flight" => Ok(Self::Flight),
            "house" => Ok(Self::House),
            "profile" => Ok(Self::Profile),
            "job" => Ok(Self::Job),
            other => Err(format!("unknown milestone '{other}'")),
        }
    }
}

/// Completion flags, one per milestone.
///
/// A plain struct rather than a map so the key set can never grow or shrink.
/// Missing keys in a remote document decode as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestones {
    pub visa: bool,
    pub flight: bool,
    pub house: bool,
    pub profile: bool,
    pub job: bool,
}

impl Milestones {
    pub fn get(&self, milestone: Milestone) -> bool {
        match milestone {
            Milestone::Visa => self.visa,
            Milestone::Flight => self.flight,
            Milestone::House => self.house,
            Milestone::Profile => self.profile,
            Milestone::Job => self.job,
        }
    }

    pub fn set(&mut self, milestone: Milestone, done: bool) {
        let slot = match milestone {
            Milestone::Visa => &mut self.visa,
            Milestone::Flight => &mut self.flight,
            Milestone::House => &mut self.house,
            Milestone::Profile => &mut self.profile,
            Milestone::Job => &mut self.job,
        };
        *slot = done;
    }

    /// Builder-style `set`.
    pub fn with(mut self, milestone: Milestone, done: bool) -> Self {
        self.set(milestone, done);
        self
    }

    /// Number of completed milestones.
    pub fn count(&self) -> usize {
        Milestone::ALL.iter().filter(|m| self.get(**m)).count()
    }
}

/// Identifier of a chosen option (job offer, flight, house).
///
/// Generated listings and older documents carry either numbers or strings,
/// so both are accepted and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for OptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for OptionId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for OptionId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for OptionId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl OptionId {
    /// Parse user input: all-digit strings become numbers.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(raw.to_string()),
        }
    }
}

/// Which kind of accommodation/transport a booking targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    Flight,
    House,
}

impl BookingKind {
    /// The milestone completed by a booking of this kind.
    pub fn milestone(&self) -> Milestone {
        match self {
            Self::Flight => Milestone::Flight,
            Self::House => Milestone::House,
        }
    }

    /// Plural key some generated listings wrap their items in.
    pub fn collection_key(&self) -> &'static str {
        match self {
            Self::Flight => "flights",
            Self::House => "houses",
        }
    }
}

impl std::fmt::Display for BookingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.milestone())
    }
}

impl std::str::FromStr for BookingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flight" => Ok(Self::Flight),
            "house" => Ok(Self::House),
            other => Err(format!("unknown booking kind '{other}'")),
        }
    }
}

/// Job-seeker profile collected on the profile screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    /// Selected job category ids, in selection order.
    pub skills: Vec<String>,
    pub career_details: String,
    /// Held local certificates, in selection order.
    pub certificates: Vec<String>,
    /// Generated professional summary; empty until generated.
    pub ai_bio: String,
}

impl UserProfile {
    /// Whether there is enough input to ask for a summary.
    pub fn ready_for_summary(&self) -> bool {
        !self.skills.is_empty() && !self.career_details.trim().is_empty()
    }
}

/// Canonical journey state, one per user.
///
/// Serializes to exactly the remote document layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JourneyState {
    pub selected_country_id: Option<String>,
    pub selected_region: String,
    /// `YYYY-MM-DD`, empty until chosen.
    pub departure_date: String,
    pub completed: Milestones,
    pub user_profile: UserProfile,
    pub hired_job_id: Option<OptionId>,
    pub selected_flight_id: Option<OptionId>,
    pub selected_house_id: Option<OptionId>,
}

impl JourneyState {
    /// Session-start reset: clear every milestone and chosen option while
    /// keeping the trip target and profile.
    pub fn reset_progress(self) -> Self {
        Self {
            completed: Milestones::default(),
            hired_job_id: None,
            selected_flight_id: None,
            selected_house_id: None,
            ..self
        }
    }

    pub fn selected_option(&self, kind: BookingKind) -> Option<&OptionId> {
        match kind {
            BookingKind::Flight => self.selected_flight_id.as_ref(),
            BookingKind::House => self.selected_house_id.as_ref(),
        }
    }

    pub(crate) fn set_selected_option(&mut self, kind: BookingKind, id: Option<OptionId>) {
        match kind {
            BookingKind::Flight => self.selected_flight_id = id,
            BookingKind::House => self.selected_house_id = id,
        }
    }

    /// Whether the trip target has been fully chosen.
    pub fn trip_confirmed(&self) -> bool {
        self.selected_country_id.is_some() && !self.departure_date.is_empty()
    }

    /// Cross-field rules a local update must not break.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.completed.job && self.hired_job_id.is_none() {
            violations.push("job completed without a hired job".to_string());
        }
        for kind in [BookingKind::Flight, BookingKind::House] {
            if self.selected_option(kind).is_some() && !self.completed.get(kind.milestone()) {
                violations.push(format!("{kind} selected but milestone not completed"));
            }
        }
        violations
    }
}

/// Top-level partial update: every `Some` key replaces the canonical key
/// wholesale, `None` leaves it untouched.
///
/// Nullable keys are `Option<Option<_>>` so "set to null" and "leave alone"
/// stay distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JourneyPatch {
    pub selected_country_id: Option<Option<String>>,
    pub selected_region: Option<String>,
    pub departure_date: Option<String>,
    pub completed: Option<Milestones>,
    pub user_profile: Option<UserProfile>,
    pub hired_job_id: Option<Option<OptionId>>,
    pub selected_flight_id: Option<Option<OptionId>>,
    pub selected_house_id: Option<Option<OptionId>>,
}

impl JourneyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, country_id: Option<String>) -> Self {
        self.selected_country_id = Some(country_id);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.selected_region = Some(region.into());
        self
    }

    pub fn with_departure_date(mut self, date: impl Into<String>) -> Self {
        self.departure_date = Some(date.into());
        self
    }

    pub fn with_completed(mut self, completed: Milestones) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.user_profile = Some(profile);
        self
    }

    pub fn with_hired_job(mut self, id: Option<OptionId>) -> Self {
        self.hired_job_id = Some(id);
        self
    }

    pub fn with_selected(mut self, kind: BookingKind, id: Option<OptionId>) -> Self {
        match kind {
            BookingKind::Flight => self.selected_flight_id = Some(id),
            BookingKind::House => self.selected_house_id = Some(id),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Replace every present key on `state`.
    pub fn apply_to(self, state: &mut JourneyState) {
        if let Some(v) = self.selected_country_id {
            state.selected_country_id = v;
        }
        if let Some(v) = self.selected_region {
            state.selected_region = v;
        }
        if let Some(v) = self.departure_date {
            state.departure_date = v;
        }
        if let Some(v) = self.completed {
            state.completed = v;
        }
        if let Some(v) = self.user_profile {
            state.user_profile = v;
        }
        if let Some(v) = self.hired_job_id {
            state.hired_job_id = v;
        }
        if let Some(v) = self.selected_flight_id {
            state.selected_flight_id = v;
        }
        if let Some(v) = self.selected_house_id {
            state.selected_house_id = v;
        }
    }
}

/// Field-level profile edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileUpdate {
    /// Add the skill if absent, remove it if present.
    ToggleSkill(String),
    /// Add the certificate if absent, remove it if present.
    ToggleCertificate(String),
    CareerDetails(String),
}

impl ProfileUpdate {
    pub(crate) fn apply_to(self, profile: &mut UserProfile) {
        match self {
            Self::ToggleSkill(id) => toggle(&mut profile.skills, id),
            Self::ToggleCertificate(id) => toggle(&mut profile.certificates, id),
            Self::CareerDetails(text) => profile.career_details = text,
        }
    }
}

fn toggle(items: &mut Vec<String>, id: String) {
    if let Some(pos) = items.iter().position(|existing| *existing == id) {
        items.remove(pos);
    } else {
        items.push(id);
    }
}
