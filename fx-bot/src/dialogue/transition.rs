//! Pure dialogue state transitions.
//!
//! `transition` decides everything about an event except the rate lookup:
//! the next session, what to say, and whether a conversion must be priced.
//! It performs no I/O, which keeps it easy to test exhaustively.

use super::event::{Command, DialogueEvent, Selection, SelectionRole};
use super::prompts::{self, Directive};
use crate::currency::{CurrencyCatalog, CurrencyCode};
use crate::error::{DialogueError, DialogueResult};
use crate::session::{Session, Stage};

/// A conversion waiting for its exchange rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionRequest {
    /// Validated positive amount.
    pub amount: f64,
    /// Currency converted from.
    pub base: CurrencyCode,
    /// Currency converted to.
    pub target: CurrencyCode,
}

/// Outcome of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Session to store.
    pub session: Session,
    /// Messages to emit now.
    pub directives: Vec<Directive>,
    /// Rate lookup to perform after the session is stored.
    pub conversion: Option<ConversionRequest>,
    /// Whether the event abandons any conversion already being priced.
    pub resets: bool,
}

impl Transition {
    fn stay(session: Session, directive: Directive) -> Self {
        Self::to(session, directive)
    }

    fn to(session: Session, directive: Directive) -> Self {
        Self {
            session,
            directives: vec![directive],
            conversion: None,
            resets: false,
        }
    }

    fn reset(session: Session, directive: Directive) -> Self {
        Self {
            resets: true,
            ..Self::to(session, directive)
        }
    }
}

/// Parse an amount: trimmed, finite and strictly positive.
#[must_use]
pub fn parse_amount(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount > 0.0)
}

/// Apply `event` to `session`.
///
/// User mistakes never fail: they produce a re-prompt and leave the session
/// untouched.
///
/// # Errors
///
/// Fails only when `session` itself is inconsistent, e.g. it is waiting for
/// an amount without both currencies.
pub fn transition(
    session: Session,
    event: &DialogueEvent,
    catalog: &CurrencyCatalog,
) -> DialogueResult<Transition> {
    match event {
        DialogueEvent::Text(text) => match Command::parse(text) {
            Some(command) => Ok(on_command(session, command, catalog)),
            None => on_text(session, text, catalog),
        },
        DialogueEvent::Selection(token) => on_selection(session, token, catalog),
    }
}

fn on_command(session: Session, command: Command, catalog: &CurrencyCatalog) -> Transition {
    match command {
        Command::Start => Transition::reset(Session::idle(), prompts::welcome()),
        Command::List => Transition::reset(Session::awaiting_base(), prompts::choose_base(catalog)),
        Command::Manual => Transition::reset(Session::awaiting_base(), prompts::enter_base()),
        Command::Cancel => Transition::reset(Session::idle(), prompts::cancelled()),
        Command::Help => Transition::stay(session, prompts::help(catalog)),
    }
}

fn on_text(session: Session, text: &str, catalog: &CurrencyCatalog) -> DialogueResult<Transition> {
    match session.stage() {
        Stage::Idle => Ok(Transition::stay(session, prompts::idle_hint())),
        Stage::AwaitingBase => {
            let Some(base) = catalog.resolve(text) else {
                return Ok(Transition::stay(session, prompts::invalid_code(catalog)));
            };
            let mut next = session;
            next.choose_base(base);
            Ok(Transition::to(next, prompts::base_chosen_by_text(catalog, base)))
        }
        Stage::AwaitingTarget => {
            let Some(target) = catalog.resolve(text) else {
                return Ok(Transition::stay(session, prompts::invalid_code(catalog)));
            };
            choose_target(session, target, catalog, false)
        }
        Stage::AwaitingAmount => {
            let Some(amount) = parse_amount(text) else {
                return Ok(Transition::stay(session, prompts::invalid_amount()));
            };
            let (base, target) = session.conversion_pair()?;
            Ok(Transition {
                session: Session::idle(),
                directives: Vec::new(),
                conversion: Some(ConversionRequest {
                    amount,
                    base,
                    target,
                }),
                resets: false,
            })
        }
    }
}

fn on_selection(
    session: Session,
    token: &str,
    catalog: &CurrencyCatalog,
) -> DialogueResult<Transition> {
    let stale = || Transition::stay(session, prompts::stale_keyboard(catalog, session.stage()));

    let Some(selection) = Selection::parse(token) else {
        return Ok(stale());
    };
    let expected = match session.stage() {
        Stage::AwaitingBase => SelectionRole::Base,
        Stage::AwaitingTarget => SelectionRole::Target,
        Stage::Idle | Stage::AwaitingAmount => return Ok(stale()),
    };
    if selection.role != expected {
        return Ok(stale());
    }
    if !catalog.contains(selection.code) {
        return Ok(Transition::stay(
            session,
            prompts::unknown_selection(catalog, selection.role),
        ));
    }

    match selection.role {
        SelectionRole::Base => {
            let mut next = session;
            next.choose_base(selection.code);
            Ok(Transition::to(
                next,
                prompts::base_chosen_by_button(catalog, selection.code),
            ))
        }
        SelectionRole::Target => choose_target(session, selection.code, catalog, true),
    }
}

fn choose_target(
    session: Session,
    target: CurrencyCode,
    catalog: &CurrencyCatalog,
    by_button: bool,
) -> DialogueResult<Transition> {
    let mut next = session;
    match next.choose_target(target) {
        Ok(()) => {
            let directive = if by_button {
                prompts::target_chosen_by_button(catalog, target)
            } else {
                prompts::target_chosen_by_text(catalog, target)
            };
            Ok(Transition::to(next, directive))
        }
        Err(DialogueError::SameCurrency(_)) => {
            let directive = if by_button {
                prompts::same_currency_by_button(catalog)
            } else {
                prompts::same_currency_by_text()
            };
            Ok(Transition::stay(session, directive))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::event::LIST_BUTTON;
    use proptest::prelude::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    fn catalog() -> CurrencyCatalog {
        CurrencyCatalog::builtin()
    }

    fn apply(session: Session, event: DialogueEvent) -> Transition {
        transition(session, &event, &catalog()).unwrap()
    }

    fn awaiting_target(base: &str) -> Session {
        let mut session = Session::awaiting_base();
        session.choose_base(code(base));
        session
    }

    fn awaiting_amount(base: &str, target: &str) -> Session {
        let mut session = awaiting_target(base);
        session.choose_target(code(target)).unwrap();
        session
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50"), Some(50.0));
        assert_eq!(parse_amount(" 12.5 "), Some(12.5));
        assert_eq!(parse_amount("1e3"), Some(1000.0));
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_start_clears_from_any_stage() {
        let step = apply(awaiting_amount("USD", "EUR"), DialogueEvent::text("/start"));
        assert!(step.session.is_idle());
        assert!(step.resets);
        assert_eq!(step.directives, vec![prompts::welcome()]);
    }

    #[test]
    fn test_menu_commands_begin_conversion() {
        let step = apply(awaiting_target("USD"), DialogueEvent::text(LIST_BUTTON));
        assert_eq!(step.session, Session::awaiting_base());
        assert!(step.resets);
        assert!(step.directives[0].keyboard().is_some());

        let step = apply(Session::idle(), DialogueEvent::text("/manual"));
        assert_eq!(step.session, Session::awaiting_base());
        assert!(step.directives[0].keyboard().is_none());
    }

    #[test]
    fn test_help_keeps_session() {
        let session = awaiting_target("EUR");
        let step = apply(session, DialogueEvent::text("/help"));
        assert_eq!(step.session, session);
        assert!(!step.resets);
    }

    #[test]
    fn test_idle_text_hints() {
        let step = apply(Session::idle(), DialogueEvent::text("hello"));
        assert!(step.session.is_idle());
        assert_eq!(step.directives, vec![prompts::idle_hint()]);
    }

    #[test]
    fn test_base_by_text_is_case_insensitive() {
        let lower = apply(Session::awaiting_base(), DialogueEvent::text(" usd "));
        let upper = apply(Session::awaiting_base(), DialogueEvent::text("USD"));
        assert_eq!(lower, upper);
        assert_eq!(lower.session.stage(), Stage::AwaitingTarget);
        assert_eq!(lower.session.base(), Some(code("USD")));
    }

    #[test]
    fn test_invalid_code_keeps_stage() {
        let session = Session::awaiting_base();
        let step = apply(session, DialogueEvent::text("XYZ"));
        assert_eq!(step.session, session);
        assert!(step.directives[0].text().contains("Invalid currency code"));
    }

    #[test]
    fn test_base_by_button_edits() {
        let step = apply(Session::awaiting_base(), DialogueEvent::selection("base:EUR"));
        assert_eq!(step.session, awaiting_target("EUR"));
        assert!(step.directives[0].is_edit());
    }

    #[test]
    fn test_same_currency_rejected() {
        let session = awaiting_target("USD");

        let step = apply(session, DialogueEvent::text("usd"));
        assert_eq!(step.session, session);
        assert_eq!(step.session.target(), None);

        let step = apply(session, DialogueEvent::selection("target:USD"));
        assert_eq!(step.session, session);
        assert!(step.directives[0].is_edit());
    }

    #[test]
    fn test_target_moves_to_amount() {
        let step = apply(awaiting_target("EUR"), DialogueEvent::selection("target:USD"));
        assert_eq!(step.session, awaiting_amount("EUR", "USD"));
    }

    #[test]
    fn test_amount_requests_conversion() {
        let step = apply(awaiting_amount("EUR", "USD"), DialogueEvent::text("50"));
        assert!(step.session.is_idle());
        assert!(step.directives.is_empty());
        assert_eq!(
            step.conversion,
            Some(ConversionRequest {
                amount: 50.0,
                base: code("EUR"),
                target: code("USD"),
            })
        );
    }

    #[test]
    fn test_bad_amount_keeps_session() {
        let session = awaiting_amount("EUR", "USD");
        for input in ["-5", "abc", "0"] {
            let step = apply(session, DialogueEvent::text(input));
            assert_eq!(step.session, session);
            assert_eq!(step.directives, vec![prompts::invalid_amount()]);
            assert!(step.conversion.is_none());
        }
    }

    #[test]
    fn test_stale_selections_ignored() {
        let session = awaiting_target("EUR");
        for token in ["base:USD", "garbage", "target:"] {
            let step = apply(session, DialogueEvent::selection(token));
            assert_eq!(step.session, session);
            assert!(!step.directives[0].is_edit());
        }

        let step = apply(Session::idle(), DialogueEvent::selection("base:USD"));
        assert!(step.session.is_idle());
    }

    #[test]
    fn test_unknown_selection_code() {
        let session = Session::awaiting_base();
        let step = apply(session, DialogueEvent::selection("base:XYZ"));
        assert_eq!(step.session, session);
    }

    #[test]
    fn test_inconsistent_session_fails() {
        let broken: Session =
            serde_json::from_str(r#"{"stage":"awaiting_amount","base":"USD"}"#).unwrap();
        let result = transition(broken, &DialogueEvent::text("10"), &catalog());
        assert!(matches!(
            result,
            Err(DialogueError::MissingField { field: "target", .. })
        ));

        let broken: Session = serde_json::from_str(r#"{"stage":"awaiting_target"}"#).unwrap();
        let result = transition(broken, &DialogueEvent::text("EUR"), &catalog());
        assert!(matches!(
            result,
            Err(DialogueError::MissingField { field: "base", .. })
        ));
    }

    fn event_strategy() -> impl Strategy<Value = DialogueEvent> {
        let codes = prop::sample::select(vec!["USD", "EUR", "GBP", "usd", "XYZ", "JPY"]);
        prop_oneof![
            prop::sample::select(vec![
                "/start",
                "/list",
                "/manual",
                "/cancel",
                "/help",
                "10",
                "-5",
                "abc",
                "0.5",
            ])
            .prop_map(DialogueEvent::text),
            codes.clone().prop_map(DialogueEvent::text),
            (prop::bool::ANY, codes).prop_map(|(base, c)| {
                let role = if base { "base" } else { "target" };
                DialogueEvent::selection(format!("{role}:{c}"))
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_sessions_stay_consistent(events in prop::collection::vec(event_strategy(), 0..40)) {
            let catalog = catalog();
            let mut session = Session::idle();
            for event in &events {
                let step = transition(session, event, &catalog).unwrap();
                prop_assert!(step.session.is_consistent());
                if let (Some(base), Some(target)) = (step.session.base(), step.session.target()) {
                    prop_assert_ne!(base, target);
                }
                if step.conversion.is_some() {
                    prop_assert!(step.session.is_idle());
                }
                session = step.session;
            }
        }

        #[test]
        fn prop_rejected_input_never_mutates(events in prop::collection::vec(event_strategy(), 0..40)) {
            let catalog = catalog();
            let mut session = Session::idle();
            for event in &events {
                let step = transition(session, event, &catalog).unwrap();
                let advanced = step.session.stage() != session.stage();
                if !advanced && !step.resets && step.conversion.is_none() {
                    prop_assert_eq!(step.session, session);
                }
                session = step.session;
            }
        }
    }
}
