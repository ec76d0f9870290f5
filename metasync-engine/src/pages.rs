use metasync_store::{DataStore, StoreResult};
use metasync_types::Instance;
use tracing::debug;

/// Lists records of `instance_type` page by page.
///
/// With `cap`, stops requesting pages once `cap` records are in hand; the
/// last page may overshoot and is truncated.
pub(crate) async fn collect_instances(
    store: &dyn DataStore,
    instance_type: &str,
    cap: Option<usize>,
) -> StoreResult<Vec<Instance>> {
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store.fetch_instances(instance_type, cursor.as_deref()).await?;
        items.extend(page.items);
        if let Some(cap) = cap {
            if items.len() >= cap {
                items.truncate(cap);
                if page.next_cursor.is_some() {
                    debug!(
                        "{}: stopped listing {} after {} records",
                        store.name(),
                        instance_type,
                        cap
                    );
                }
                break;
            }
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(items)
}
