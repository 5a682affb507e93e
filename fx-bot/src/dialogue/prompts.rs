//! Everything the bot says, and the keyboards it shows.

use super::event::{LIST_BUTTON, MANUAL_BUTTON, Selection, SelectionRole};
use crate::currency::{CurrencyCatalog, CurrencyCode};
use crate::events::{Button, Keyboard};
use crate::rates::format_amount;
use crate::session::Stage;

/// Buttons per row on currency keyboards.
pub const BUTTONS_PER_ROW: usize = 3;

const WELCOME: &str = "👋 Welcome to the currency converter bot!";
const CHOOSE_BASE: &str = "Please choose the base currency:";
const ENTER_BASE: &str = "Please enter the base currency:";
const CHOOSE_TARGET: &str = "Now choose the target currency:";
const ENTER_TARGET: &str = "Now enter the target currency:";
const ENTER_AMOUNT: &str = "Please enter the amount to convert:";
const INVALID_AMOUNT: &str = "❌ Please enter a valid positive number.";
const RATE_UNAVAILABLE: &str = "⚠️ Failed to fetch exchange rate. Please try again later.";
const RESULT_OVERFLOW: &str = "⚠️ The converted amount is too large to show. Please try again.";
const UNEXPECTED: &str = "🚨 An unexpected error occurred. Please try again.";
const CANCELLED: &str = "Conversion cancelled.";
const IDLE_HINT: &str = "Choose an option below to start a conversion.";
const STALE_KEYBOARD: &str = "This keyboard is no longer active.";

/// An instruction for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Send a new message.
    Reply {
        /// Message text.
        text: String,
        /// Buttons to show.
        keyboard: Option<Keyboard>,
    },
    /// Replace the message that carried the pressed button.
    Edit {
        /// New text.
        text: String,
        /// New buttons; `None` removes them.
        keyboard: Option<Keyboard>,
    },
}

impl Directive {
    /// Plain reply.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply {
            text: text.into(),
            keyboard: None,
        }
    }

    /// Reply with buttons.
    pub fn reply_with(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Reply {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// Edit with optional buttons.
    pub fn edit(text: impl Into<String>, keyboard: Option<Keyboard>) -> Self {
        Self::Edit {
            text: text.into(),
            keyboard,
        }
    }

    /// Message text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Reply { text, .. } | Self::Edit { text, .. } => text,
        }
    }

    /// Attached buttons.
    #[must_use]
    pub const fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Self::Reply { keyboard, .. } | Self::Edit { keyboard, .. } => keyboard.as_ref(),
        }
    }

    /// Whether this edits an existing message.
    #[must_use]
    pub const fn is_edit(&self) -> bool {
        matches!(self, Self::Edit { .. })
    }
}

/// The reply keyboard offering both ways to start.
#[must_use]
pub fn main_menu() -> Keyboard {
    Keyboard::Menu(vec![
        vec![LIST_BUTTON.to_string()],
        vec![MANUAL_BUTTON.to_string()],
    ])
}

/// Inline keyboard with every catalog currency for `role`.
#[must_use]
pub fn currency_keyboard(catalog: &CurrencyCatalog, role: SelectionRole) -> Keyboard {
    let buttons: Vec<Button> = catalog
        .iter()
        .map(|info| Button {
            label: info.button_label(),
            token: Selection::new(role, info.code).token(),
        })
        .collect();
    Keyboard::Inline(
        buttons
            .chunks(BUTTONS_PER_ROW)
            .map(<[Button]>::to_vec)
            .collect(),
    )
}

pub(crate) fn welcome() -> Directive {
    Directive::reply_with(WELCOME, main_menu())
}

pub(crate) fn help(catalog: &CurrencyCatalog) -> Directive {
    let text = format!(
        "I convert between currencies using live exchange rates.\n\
         \n\
         /list - pick currencies from a keyboard\n\
         /manual - type currency codes (e.g. {})\n\
         /cancel - abandon the current conversion\n\
         /start - back to the main menu",
        catalog.examples(2)
    );
    Directive::reply_with(text, main_menu())
}

pub(crate) fn cancelled() -> Directive {
    Directive::reply_with(CANCELLED, main_menu())
}

pub(crate) fn idle_hint() -> Directive {
    Directive::reply_with(IDLE_HINT, main_menu())
}

pub(crate) fn choose_base(catalog: &CurrencyCatalog) -> Directive {
    Directive::reply_with(CHOOSE_BASE, currency_keyboard(catalog, SelectionRole::Base))
}

pub(crate) fn enter_base() -> Directive {
    Directive::reply(ENTER_BASE)
}

fn base_selected(catalog: &CurrencyCatalog, base: CurrencyCode, next: &str) -> String {
    format!(
        "✅ Base currency selected: {}\n{next}",
        catalog.display_name(base)
    )
}

pub(crate) fn base_chosen_by_button(catalog: &CurrencyCatalog, base: CurrencyCode) -> Directive {
    Directive::edit(
        base_selected(catalog, base, CHOOSE_TARGET),
        Some(currency_keyboard(catalog, SelectionRole::Target)),
    )
}

pub(crate) fn base_chosen_by_text(catalog: &CurrencyCatalog, base: CurrencyCode) -> Directive {
    Directive::reply(base_selected(catalog, base, ENTER_TARGET))
}

fn target_selected(catalog: &CurrencyCatalog, target: CurrencyCode) -> String {
    format!(
        "🎯 Target currency selected: {}\n{ENTER_AMOUNT}",
        catalog.display_name(target)
    )
}

pub(crate) fn target_chosen_by_button(
    catalog: &CurrencyCatalog,
    target: CurrencyCode,
) -> Directive {
    Directive::edit(target_selected(catalog, target), None)
}

pub(crate) fn target_chosen_by_text(catalog: &CurrencyCatalog, target: CurrencyCode) -> Directive {
    Directive::reply(target_selected(catalog, target))
}

pub(crate) fn same_currency_by_button(catalog: &CurrencyCatalog) -> Directive {
    Directive::edit(
        "⚠️ Base and target currencies must be different. Please choose again.",
        Some(currency_keyboard(catalog, SelectionRole::Target)),
    )
}

pub(crate) fn same_currency_by_text() -> Directive {
    Directive::reply("⚠️ Base and target currencies must be different. Try again.")
}

pub(crate) fn invalid_code(catalog: &CurrencyCatalog) -> Directive {
    Directive::reply(format!(
        "❌ Invalid currency code. Try again (e.g., {}).",
        catalog.examples(2)
    ))
}

pub(crate) fn invalid_amount() -> Directive {
    Directive::reply(INVALID_AMOUNT)
}

pub(crate) fn unexpected_error() -> Directive {
    Directive::reply(UNEXPECTED)
}

pub(crate) fn rate_unavailable() -> Directive {
    Directive::reply(RATE_UNAVAILABLE)
}

pub(crate) fn result_overflow() -> Directive {
    Directive::reply(RESULT_OVERFLOW)
}

/// `50.0 EUR = 54.0 USD`.
#[must_use]
pub fn conversion_line(amount: f64, base: CurrencyCode, result: f64, target: CurrencyCode) -> String {
    format!(
        "{} {base} = {} {target}",
        format_amount(amount),
        format_amount(result)
    )
}

pub(crate) fn conversion_result(
    amount: f64,
    base: CurrencyCode,
    result: f64,
    target: CurrencyCode,
) -> Directive {
    Directive::reply(format!("💱 {}", conversion_line(amount, base, result, target)))
}

/// Re-prompt for `stage` after a button from an old keyboard was pressed.
pub(crate) fn stale_keyboard(catalog: &CurrencyCatalog, stage: Stage) -> Directive {
    let (prompt, keyboard) = match stage {
        Stage::Idle => (IDLE_HINT, main_menu()),
        Stage::AwaitingBase => (CHOOSE_BASE, currency_keyboard(catalog, SelectionRole::Base)),
        Stage::AwaitingTarget => (
            CHOOSE_TARGET,
            currency_keyboard(catalog, SelectionRole::Target),
        ),
        Stage::AwaitingAmount => return Directive::reply(format!("{STALE_KEYBOARD}\n{ENTER_AMOUNT}")),
    };
    Directive::reply_with(format!("{STALE_KEYBOARD}\n{prompt}"), keyboard)
}

/// Re-prompt after a selection naming a currency outside the catalog.
pub(crate) fn unknown_selection(catalog: &CurrencyCatalog, role: SelectionRole) -> Directive {
    let prompt = match role {
        SelectionRole::Base => CHOOSE_BASE,
        SelectionRole::Target => CHOOSE_TARGET,
    };
    Directive::edit(
        format!("❌ Invalid currency code.\n{prompt}"),
        Some(currency_keyboard(catalog, role)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    #[test]
    fn test_currency_keyboard_layout() {
        let catalog = CurrencyCatalog::builtin();
        let Keyboard::Inline(rows) = currency_keyboard(&catalog, SelectionRole::Base) else {
            panic!("expected inline keyboard");
        };
        assert_eq!(rows.len(), catalog.len().div_ceil(BUTTONS_PER_ROW));
        assert!(rows.iter().all(|row| row.len() <= BUTTONS_PER_ROW));
        assert_eq!(rows[0][0].token, "base:USD");
        assert_eq!(rows[0][0].label, "🇺🇸 USD");
    }

    #[test]
    fn test_target_keyboard_tokens() {
        let catalog = CurrencyCatalog::builtin();
        let keyboard = currency_keyboard(&catalog, SelectionRole::Target);
        assert_eq!(keyboard.len(), catalog.len());
        assert!(keyboard.tokens().all(|t| t.starts_with("target:")));
    }

    #[test]
    fn test_conversion_line() {
        assert_eq!(
            conversion_line(50.0, code("EUR"), 54.0, code("USD")),
            "50.0 EUR = 54.0 USD"
        );
        assert_eq!(
            conversion_result(100.0, code("USD"), 90.0, code("EUR")).text(),
            "💱 100.0 USD = 90.0 EUR"
        );
    }

    #[test]
    fn test_selected_messages_use_display_names() {
        let catalog = CurrencyCatalog::builtin();
        let directive = base_chosen_by_button(&catalog, code("USD"));
        assert!(directive.is_edit());
        assert!(directive.text().contains("US Dollar (USD)"));
        assert!(directive.keyboard().is_some());

        let directive = target_chosen_by_text(&catalog, code("EUR"));
        assert!(!directive.is_edit());
        assert!(directive.text().ends_with(ENTER_AMOUNT));
    }

    #[test]
    fn test_stale_keyboard_reprompts_stage() {
        let catalog = CurrencyCatalog::builtin();
        let idle = stale_keyboard(&catalog, Stage::Idle);
        assert_eq!(idle.keyboard(), Some(&main_menu()));

        let target = stale_keyboard(&catalog, Stage::AwaitingTarget);
        assert!(target.text().starts_with(STALE_KEYBOARD));
        assert!(
            target
                .keyboard()
                .unwrap()
                .tokens()
                .all(|t| t.starts_with("target:"))
        );

        assert!(stale_keyboard(&catalog, Stage::AwaitingAmount).keyboard().is_none());
    }
}
