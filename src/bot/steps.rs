//! The step handlers of the conversation state machine. Each handler consumes
//! one user message, sends its effects through the `Messenger`, and either
//! stores the next state, stores the same state back (retry loop), or stores
//! nothing (terminal).

use crate::api::{INCOME_SHEET, RESERVED_TRAILING_SHEETS};
use crate::bot::allocator;
use crate::bot::session::{Conversation, Intent};
use crate::bot::{Bot, Command};
use crate::model::{Entry, Month};
use crate::{Result, StepError};
use tracing::warn;

const CATEGORY_PROMPT: &str = "Please choose the category number from the message above:";

impl Bot {
    pub(super) async fn handle_command(
        &self,
        chat_id: i64,
        message_id: i64,
        command: Command,
    ) -> Result<()> {
        match command {
            Command::Help => self.messenger.send_message(chat_id, HELP_TEXT).await,
            Command::CurrentBalance => {
                self.query_balance(chat_id, &Month::current().ledger_name())
                    .await
            }
            Command::CategoryExpenses => {
                self.start_category_flow(
                    chat_id,
                    message_id,
                    Intent::QueryExpenses,
                    Month::current().ledger_name(),
                )
                .await
            }
            Command::PastMonthExpenses => self.start_month_flow(chat_id, message_id).await,
            Command::AddExpense => {
                self.start_category_flow(
                    chat_id,
                    message_id,
                    Intent::AddExpense,
                    Month::current().ledger_name(),
                )
                .await
            }
            Command::AddIncome => {
                self.messenger
                    .reply_to(
                        chat_id,
                        message_id,
                        "Please enter your income following the format \"Salary: 1000\":",
                    )
                    .await?;
                self.sessions.set(
                    chat_id,
                    Conversation::EnterIncome {
                        ledger: Month::current().ledger_name(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Runs the step the chat's pending conversation state calls for. The
    /// state has already been removed from the store; loops put it back.
    pub(super) async fn run_step(
        &self,
        chat_id: i64,
        message_id: i64,
        state: Conversation,
        text: &str,
    ) -> Result<()> {
        match state {
            Conversation::ChooseMonth { months } => {
                self.step_choose_month(chat_id, message_id, months, text).await
            }
            Conversation::ChooseCategory {
                intent,
                ledger,
                categories,
            } => {
                self.step_choose_category(chat_id, message_id, intent, ledger, categories, text)
                    .await
            }
            Conversation::EnterEntry { ledger, category } => {
                self.step_enter_entry(chat_id, message_id, ledger, category, text)
                    .await
            }
            Conversation::EnterIncome { ledger } => {
                self.step_enter_income(chat_id, message_id, ledger, text).await
            }
        }
    }

    /// Lists the historical ledgers and asks which month to look at.
    async fn start_month_flow(&self, chat_id: i64, message_id: i64) -> Result<()> {
        if !self.config.past_months() {
            return self
                .messenger
                .send_message(chat_id, "Past month flows are disabled on this bot.")
                .await;
        }
        let months = self.store.list_ledgers().await?;
        if months.is_empty() {
            return self
                .messenger
                .send_message(chat_id, "No ledger spreadsheets were found.")
                .await;
        }
        self.messenger
            .reply_to(
                chat_id,
                message_id,
                "Which month's expenses do you want to check?",
            )
            .await?;
        self.messenger
            .send_message(chat_id, &enumerate(&months))
            .await?;
        self.sessions.set(chat_id, Conversation::ChooseMonth { months });
        Ok(())
    }

    /// Opens the ledger, snapshots its category list (all worksheets except
    /// the reserved trailing ones) and asks for a 1-based category choice.
    /// The snapshot travels inside the stored state; later steps never
    /// re-fetch it.
    async fn start_category_flow(
        &self,
        chat_id: i64,
        message_id: i64,
        intent: Intent,
        ledger: String,
    ) -> Result<()> {
        let Some(titles) = self.store.worksheet_titles(&ledger).await? else {
            let err = StepError::NotFound(ledger);
            warn!("{err}");
            return self
                .messenger
                .send_message(chat_id, &format!("Nothing was found: {err}."))
                .await;
        };
        let keep = titles.len().saturating_sub(RESERVED_TRAILING_SHEETS);
        let categories: Vec<String> = titles.into_iter().take(keep).collect();
        if categories.is_empty() {
            return self
                .messenger
                .send_message(chat_id, &format!("Ledger '{ledger}' has no category sheets."))
                .await;
        }
        self.messenger
            .send_message(chat_id, &enumerate(&categories))
            .await?;
        self.messenger
            .reply_to(chat_id, message_id, CATEGORY_PROMPT)
            .await?;
        self.sessions.set(
            chat_id,
            Conversation::ChooseCategory {
                intent,
                ledger,
                categories,
            },
        );
        Ok(())
    }

    async fn step_choose_month(
        &self,
        chat_id: i64,
        message_id: i64,
        months: Vec<String>,
        text: &str,
    ) -> Result<()> {
        match parse_choice(text, months.len()) {
            Ok(index) => {
                let month = months[index].clone();
                self.start_category_flow(chat_id, message_id, Intent::QueryExpenses, month)
                    .await
            }
            Err(err) => {
                self.messenger
                    .reply_to(chat_id, message_id, &format!("Wrong selection: {err}. Please retry."))
                    .await?;
                self.sessions.set(chat_id, Conversation::ChooseMonth { months });
                Ok(())
            }
        }
    }

    async fn step_choose_category(
        &self,
        chat_id: i64,
        message_id: i64,
        intent: Intent,
        ledger: String,
        categories: Vec<String>,
        text: &str,
    ) -> Result<()> {
        let index = match parse_choice(text, categories.len()) {
            Ok(index) => index,
            Err(err) => {
                self.messenger
                    .send_message(chat_id, &format!("Category not found: {err}. Please retry."))
                    .await?;
                self.messenger
                    .reply_to(chat_id, message_id, CATEGORY_PROMPT)
                    .await?;
                self.sessions.set(
                    chat_id,
                    Conversation::ChooseCategory {
                        intent,
                        ledger,
                        categories,
                    },
                );
                return Ok(());
            }
        };
        let category = categories[index].clone();
        match intent {
            Intent::QueryExpenses => {
                let cols = self.store.col_count(&ledger, &category).await?;
                let totals = self.store.col_values(&ledger, &category, cols).await?;
                let message = match totals.first().filter(|total| !total.trim().is_empty()) {
                    Some(total) => format!("{category} expenses for {ledger} are {total}."),
                    None => format!(
                        "No expenses have been recorded for {category} in {ledger} yet."
                    ),
                };
                self.messenger.send_message(chat_id, &message).await
            }
            Intent::AddExpense => {
                self.messenger
                    .send_message(
                        chat_id,
                        &format!("You have chosen: {}) {category}", index + 1),
                    )
                    .await?;
                self.messenger
                    .reply_to(
                        chat_id,
                        message_id,
                        "Please enter tag and price as example \"Bread: 50\":",
                    )
                    .await?;
                self.sessions
                    .set(chat_id, Conversation::EnterEntry { ledger, category });
                Ok(())
            }
        }
    }

    async fn step_enter_entry(
        &self,
        chat_id: i64,
        message_id: i64,
        ledger: String,
        category: String,
        text: &str,
    ) -> Result<()> {
        self.commit_step(chat_id, message_id, ledger, category, text, false)
            .await
    }

    async fn step_enter_income(
        &self,
        chat_id: i64,
        message_id: i64,
        ledger: String,
        text: &str,
    ) -> Result<()> {
        self.commit_step(chat_id, message_id, ledger, INCOME_SHEET.to_string(), text, true)
            .await
    }

    /// The shared tail of the add-expense and add-income flows: split the
    /// text, commit through the allocator, report the written row. Format and
    /// validation problems loop the same state; nothing has been written when
    /// they occur.
    async fn commit_step(
        &self,
        chat_id: i64,
        message_id: i64,
        ledger: String,
        sheet: String,
        text: &str,
        income: bool,
    ) -> Result<()> {
        let loop_back = |bot: &Bot| {
            bot.sessions.set(
                chat_id,
                if income {
                    Conversation::EnterIncome {
                        ledger: ledger.clone(),
                    }
                } else {
                    Conversation::EnterEntry {
                        ledger: ledger.clone(),
                        category: sheet.clone(),
                    }
                },
            );
        };

        let entry = match Entry::split(text) {
            Ok(entry) => entry,
            Err(err) => {
                self.messenger
                    .send_message(
                        chat_id,
                        &format!("You have entered *** {text} *** - wrong input format: {err}."),
                    )
                    .await?;
                self.messenger
                    .reply_to(
                        chat_id,
                        message_id,
                        &format!(
                            "Please enter the entry for {ledger} and the {sheet} category \
                             in the format label:price"
                        ),
                    )
                    .await?;
                loop_back(self);
                return Ok(());
            }
        };

        match allocator::commit_entry(&*self.store, &ledger, &sheet, &entry.label, &entry.raw_amount)
            .await
        {
            Ok(summary) => {
                self.messenger
                    .send_message(
                        chat_id,
                        &format!(
                            "{summary} has been added to the {sheet} worksheet of the {ledger} file."
                        ),
                    )
                    .await
            }
            Err(err) => match err.downcast_ref::<StepError>() {
                Some(StepError::Validation(_)) => {
                    self.messenger
                        .reply_to(chat_id, message_id, &format!("Wrong input: {err}. Please retry."))
                        .await?;
                    loop_back(self);
                    Ok(())
                }
                _ => Err(err),
            },
        }
    }

    /// Reads the three fixed summary cells off the Balance sheet. Single-shot,
    /// no conversation state.
    async fn query_balance(&self, chat_id: i64, ledger: &str) -> Result<()> {
        use crate::api::BALANCE_SHEET;
        if self.store.worksheet_titles(ledger).await?.is_none() {
            let err = StepError::NotFound(ledger.to_string());
            warn!("{err}");
            return self
                .messenger
                .send_message(chat_id, &format!("Nothing was found: {err}."))
                .await;
        }
        let income = self.store.read_cell(ledger, BALANCE_SHEET, "B15").await?;
        let expenses = self.store.read_cell(ledger, BALANCE_SHEET, "D15").await?;
        let balance = self.store.read_cell(ledger, BALANCE_SHEET, "F1").await?;
        self.messenger
            .send_message(chat_id, &format!("Current month income is: {income}"))
            .await?;
        self.messenger
            .send_message(chat_id, &format!("Current month expenses are: {expenses}"))
            .await?;
        self.messenger
            .send_message(chat_id, &format!("Current month balance is: {balance}"))
            .await
    }
}

/// Parses a 1-based choice out of raw user text and converts it to a 0-based
/// index into the snapshot list. This is the only place the off-by-one is
/// resolved. Three things must hold: numeric parse, positivity, existence in
/// the snapshot.
fn parse_choice(text: &str, len: usize) -> std::result::Result<usize, StepError> {
    let trimmed = text.trim();
    let number: i64 = trimmed
        .parse()
        .map_err(|_| StepError::Validation(format!("'{trimmed}' is not a number")))?;
    if number < 1 || number as usize > len {
        return Err(StepError::Validation(format!(
            "there is no option number {number}"
        )));
    }
    Ok(number as usize - 1)
}

fn enumerate(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

const HELP_TEXT: &str = "All available commands:\n\
    /start or /help shows this menu\n\n\
    /CurrentMonthBalance or /CMB or /cb\n shows the current month balance\n\n\
    /CheckCurrentMonthCategoryExpenses or /CME or /ce\n shows current month expenses for a category\n\n\
    /CheckRandomMonthCategoryExpenses or /RME or /re\n shows past month expenses for a category\n\n\
    /AddExpenseToCurrentMonth or /AECM or /ae\n adds an expense to the current month\n\n\
    /AddCurrentMonthIncome or /ACMI or /ai\n adds income to the current month\n\n\
    Send x or exit during any prompt to cancel.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_valid_index_maps_to_the_previous_slot() {
        for n in 1..=5usize {
            assert_eq!(parse_choice(&n.to_string(), 5).unwrap(), n - 1);
        }
    }

    #[test]
    fn non_numeric_choice_is_rejected() {
        assert!(matches!(
            parse_choice("Groceries", 5),
            Err(StepError::Validation(_))
        ));
    }

    #[test]
    fn out_of_range_choice_is_rejected() {
        assert!(parse_choice("0", 5).is_err());
        assert!(parse_choice("6", 5).is_err());
        assert!(parse_choice("-2", 5).is_err());
    }

    #[test]
    fn enumeration_is_one_based() {
        let items = vec!["Groceries".to_string(), "Transport".to_string()];
        assert_eq!(enumerate(&items), "1. Groceries\n2. Transport");
    }
}
