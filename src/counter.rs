use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use tracing::instrument;

use crate::database::{Database, DatabaseError};
use crate::model::Prompt;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CounterError {
    #[snafu(display("prompt `{prompt_id}` does not exist"))]
    UnknownPrompt {
        prompt_id: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to access the view counter of `{prompt_id}`"))]
    CounterStore {
        prompt_id: String,
        source: DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Adds one view to the prompt and returns the stored total.
///
/// Every call is counted, repeated views from the same client included.
#[instrument(skip(db))]
pub async fn increment_view(db: &Database, prompt_id: &str) -> Result<u64, CounterError> {
    let total = Prompt::add_view(prompt_id, db)
        .await
        .context(CounterStoreSnafu { prompt_id })?
        .context(UnknownPromptSnafu { prompt_id })?;

    tracing::debug!(total, "recorded a view");
    Ok(total)
}

/// Returns the stored view total of the prompt.
#[instrument(skip(db))]
pub async fn get_view(db: &Database, prompt_id: &str) -> Result<u64, CounterError> {
    Prompt::views(prompt_id, db)
        .await
        .context(CounterStoreSnafu { prompt_id })?
        .context(UnknownPromptSnafu { prompt_id })
}
