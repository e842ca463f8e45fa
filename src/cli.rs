//! Line-oriented command interface for the `holigo` binary.

use std::fmt::Write;

use crate::content::Candidate;
use crate::journey::catalog;
use crate::journey::{Access, BookingKind, JourneyState, Milestone, OptionId};
use crate::process::ProcessStatus;
use crate::session::View;

pub const HELP: &str = "\
commands:
  signin | signout
  country <au|ca|de>      region <name>       date <YYYY-MM-DD>   confirm
  skill <id>              cert <name>         career <text>       summary
  discover <flight|house> book <flight|house> <id>
  visa                    offers              accept <id>         dismiss
  go <view>               status              help                quit";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignIn,
    SignOut,
    Country(String),
    Region(String),
    Date(String),
    Confirm,
    Skill(String),
    Cert(String),
    Career(String),
    Summary,
    Discover(BookingKind),
    Visa,
    Book(BookingKind, OptionId),
    Offers,
    Accept(i64),
    Dismiss,
    Go(View),
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let arg = |what: &str| {
            if rest.is_empty() {
                Err(format!("{verb}: missing {what}"))
            } else {
                Ok(rest.to_string())
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "signin" | "login" => Ok(Self::SignIn),
            "signout" | "logout" => Ok(Self::SignOut),
            "country" => arg("country id").map(Self::Country),
            "region" => arg("region").map(Self::Region),
            "date" => arg("date").map(Self::Date),
            "confirm" => Ok(Self::Confirm),
            "skill" => arg("skill id").map(Self::Skill),
            "cert" => arg("certificate").map(Self::Cert),
            "career" => arg("career details").map(Self::Career),
            "summary" => Ok(Self::Summary),
            "discover" => Ok(Self::Discover(arg("kind")?.parse()?)),
            "visa" => Ok(Self::Visa),
            "book" => {
                let args = arg("kind and id")?;
                let (kind, id) = args
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "book: usage 'book <flight|house> <id>'".to_string())?;
                Ok(Self::Book(kind.parse()?, OptionId::parse(id)))
            }
            "offers" => Ok(Self::Offers),
            "accept" => {
                let id = arg("offer id")?;
                id.parse()
                    .map(Self::Accept)
                    .map_err(|_| format!("accept: '{id}' is not an offer number"))
            }
            "dismiss" => Ok(Self::Dismiss),
            "go" => Ok(Self::Go(arg("view")?.parse()?)),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "/quit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}' (try 'help')")),
        }
    }
}

/// Hub checklist plus trip summary.
pub fn render_status(
    view: View,
    state: &JourneyState,
    access: &Access,
    visa: ProcessStatus,
    booking: ProcessStatus,
) -> String {
    let mut out = String::new();
    let country = state
        .selected_country_id
        .as_deref()
        .and_then(catalog::country)
        .map(|c| format!("{} {}", c.emoji, c.name))
        .unwrap_or_else(|| "-".to_string());
    let date = if state.departure_date.is_empty() {
        "-"
    } else {
        state.departure_date.as_str()
    };

    let _ = writeln!(out, "view: {view}");
    let _ = writeln!(out, "trip: {country} / {} / departs {date}", or_dash(&state.selected_region));
    let _ = writeln!(
        out,
        "progress: {}/{} milestones",
        state.completed.count(),
        Milestone::ALL.len()
    );
    for milestone in Milestone::ALL {
        let mark = if state.completed.get(milestone) {
            "[x]"
        } else if access.get(milestone) {
            "[ ]"
        } else {
            "[locked]"
        };
        let _ = writeln!(out, "  {mark} {milestone}");
    }
    let _ = writeln!(out, "visa: {} {}%", visa.phase, visa.progress);
    let _ = writeln!(out, "booking: {}", booking.phase);
    if let Some(id) = &state.hired_job_id {
        let _ = writeln!(out, "hired: offer {id}");
    }
    if !state.user_profile.ai_bio.is_empty() {
        let _ = writeln!(out, "summary: {}", state.user_profile.ai_bio);
    }
    out
}

pub fn render_candidates(kind: BookingKind, candidates: &[Candidate]) -> String {
    if candidates.is_empty() {
        return format!("no {} found", kind.collection_key());
    }
    let mut out = String::new();
    for c in candidates {
        let price = c.detail("price").unwrap_or_default();
        let _ = writeln!(out, "  [{}] {} {}", c.id, c.label(), price);
    }
    out
}

pub fn render_offers() -> String {
    let mut out = String::new();
    for offer in catalog::JOB_OFFERS {
        let _ = writeln!(
            out,
            "  [{}] {} at {} ({})",
            offer.id, offer.role, offer.company, offer.pay
        );
    }
    out
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::{Milestones, accessible};

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(Command::parse("country au").unwrap(), Command::Country("au".into()));
        assert_eq!(
            Command::parse("career  3 years in a cafe ").unwrap(),
            Command::Career("3 years in a cafe".into())
        );
        assert_eq!(
            Command::parse("book house h-1").unwrap(),
            Command::Book(BookingKind::House, OptionId::Text("h-1".into()))
        );
        assert_eq!(
            Command::parse("book flight 2").unwrap(),
            Command::Book(BookingKind::Flight, OptionId::Number(2))
        );
        assert_eq!(Command::parse("go hub").unwrap(), Command::Go(View::Dashboard));
        assert_eq!(Command::parse("ACCEPT 1").unwrap(), Command::Accept(1));
        assert_eq!(Command::parse("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse("country").is_err());
        assert!(Command::parse("book flight").is_err());
        assert!(Command::parse("accept first").is_err());
        assert!(Command::parse("discover boat").is_err());
        assert!(Command::parse("fly").is_err());
    }

    #[test]
    fn status_marks_locked_jobs() {
        let state = JourneyState {
            selected_country_id: Some("au".into()),
            selected_region: "Perth".into(),
            completed: Milestones::default().with(Milestone::Visa, true),
            ..Default::default()
        };
        let text = render_status(
            View::Dashboard,
            &state,
            &accessible(&state.completed),
            ProcessStatus::default(),
            ProcessStatus::default(),
        );
        assert!(text.contains("Australia / Perth / departs -"));
        assert!(text.contains("[x] visa"));
        assert!(text.contains("[locked] job"));
        assert!(text.contains("progress: 1/5"));
    }

    #[test]
    fn offers_list_both_jobs() {
        let text = render_offers();
        assert!(text.contains("Head Barista"));
        assert!(text.contains("Kitchen Hand"));
    }
}
