use snafu::{Location, ResultExt as _, Snafu};
use tracing::instrument;

use crate::auth::Principal;
use crate::database::{Database, DatabaseError};
use crate::model::{Like, Owner, OwnerStats, Prompt};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StatsError {
    #[snafu(display("owner `{email}` does not exist"))]
    UnknownOwner {
        email: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to aggregate the statistics of `{email}`"))]
    StatsStore {
        email: String,
        source: DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Counts the prompts the principal authored and the likes they have given.
///
/// The counts come from independent reads, so a concurrent writer may be reflected in one and not the other.
#[instrument(skip(db, principal), fields(owner = %principal.email))]
pub async fn compute_owner_stats(db: &Database, principal: &Principal) -> Result<OwnerStats, StatsError> {
    let email = principal.email.as_str();

    let Some(owner) = Owner::get(email, db).await.context(StatsStoreSnafu { email })? else {
        tracing::warn!(owner = %email, "session refers to an owner that is missing from the store");
        return UnknownOwnerSnafu { email }.fail();
    };

    let prompts_count = Prompt::count_by_author(email, db)
        .await
        .context(StatsStoreSnafu { email })?
        .unwrap_or(0);

    let likes_count = Like::count_by_owner(email, db)
        .await
        .context(StatsStoreSnafu { email })?
        .unwrap_or(0);

    Ok(OwnerStats::new(prompts_count, likes_count, owner.created_at))
}
