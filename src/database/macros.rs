/// Defines a method on a model type that runs a SurrealQL query.
///
/// # Syntax
/// ```ignore
/// [Base Type] > method_name(...arguments) > [Output Type] where "sql query"
/// ```
/// Every argument is bound under its own name, so `$id` in the query refers to the `id` argument.
/// The `Output Type` must be something [surrealdb::opt::QueryResult] can produce, usually `Option<T>` or `Vec<T>`.
///
/// # Example
///
/// ```ignore
/// define_relation! {
///     Prompt > views(id: &str) > Option<u64>
///         where "SELECT VALUE view_count FROM type::thing('prompts', $id)"
/// }
///
/// let views = Prompt::views("abc", &db).await?;
/// ```
#[macro_export]
macro_rules! define_relation {
    ($model:ty > $relation:ident ($($binding:ident : $binding_type:ty),*) > $export:ty where $query:literal) => {
        impl $model {
            pub async fn $relation(
                $($binding : $binding_type ,)* db: &$crate::database::Database,
            ) -> $crate::database::Result<$export> {
                db.sql($query)
                    $(.bind((stringify!($binding), $binding)))*
                    .fetch_first()
                    .await
            }
        }
    };
}
