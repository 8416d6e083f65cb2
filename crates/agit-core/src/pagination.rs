use crate::error::RequestError;
use crate::types::list::{DEFAULT_LIMIT, ListQuery, ListResponse, MAX_LIMIT, SortOrder};

/// Pages `items`, which must already be in ascending creation order.
pub fn paginate<T, F>(
    items: Vec<T>,
    query: &ListQuery,
    id_of: F,
) -> Result<ListResponse<T>, RequestError>
where
    F: Fn(&T) -> &str,
{
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(RequestError::InvalidField {
            field: "limit",
            message: format!("must be between 1 and {MAX_LIMIT}, got {limit}"),
        });
    }

    let mut items = items;
    if query.order.unwrap_or_default() == SortOrder::Desc {
        items.reverse();
    }

    let mut start = 0;
    let mut end = items.len();
    if let Some(after) = query.after.as_deref() {
        let index = position(&items, after, &id_of).ok_or_else(|| unknown_cursor("after", after))?;
        start = index + 1;
    }
    if let Some(before) = query.before.as_deref() {
        let index =
            position(&items, before, &id_of).ok_or_else(|| unknown_cursor("before", before))?;
        end = index;
    }
    if start > end {
        start = end;
    }

    let window = end - start;
    let take = window.min(limit as usize);
    let has_more = window > take;
    let data: Vec<T> = items.into_iter().skip(start).take(take).collect();
    let first_id = data.first().map(|item| id_of(item).to_string());
    let last_id = data.last().map(|item| id_of(item).to_string());

    Ok(ListResponse {
        object: "list".to_string(),
        data,
        first_id,
        last_id,
        has_more,
    })
}

fn position<T, F>(items: &[T], id: &str, id_of: &F) -> Option<usize>
where
    F: Fn(&T) -> &str,
{
    items.iter().position(|item| id_of(item) == id)
}

fn unknown_cursor(field: &'static str, value: &str) -> RequestError {
    RequestError::InvalidField {
        field,
        message: format!("unknown cursor {value}"),
    }
}
