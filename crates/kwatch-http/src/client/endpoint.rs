//! Watch endpoint construction.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped inside a query value.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Join a base URL and a path with exactly one slash between them.
pub fn combine_path(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn append_query(path: &str, query: &str) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}", path, sep, query)
}

/// Path of a collection watch starting after `resource_version`.
///
/// Without a marker the server picks the starting point.
pub fn watch_collection_path(path: &str, resource_version: Option<&str>) -> String {
    match resource_version {
        Some(rv) => append_query(
            path,
            &format!("watch=1&resourceVersion={}", utf8_percent_encode(rv, QUERY_VALUE)),
        ),
        None => append_query(path, "watch=1"),
    }
}

/// Path of a watch restricted to the item called `name`.
pub fn watch_item_path(collection_path: &str, name: &str) -> String {
    append_query(
        collection_path,
        &format!(
            "watch=1&fieldSelector=metadata.name%3D{}",
            utf8_percent_encode(name, QUERY_VALUE)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_path() {
        assert_eq!(
            combine_path("ws://host:8001/", "/api/v1/pods"),
            "ws://host:8001/api/v1/pods"
        );
        assert_eq!(combine_path("http://h", "api"), "http://h/api");
        assert_eq!(combine_path("http://h", ""), "http://h");
    }

    #[test]
    fn test_collection_watch_path() {
        assert_eq!(
            watch_collection_path("/api/v1/pods", Some("1234")),
            "/api/v1/pods?watch=1&resourceVersion=1234"
        );
        assert_eq!(
            watch_collection_path("/api/v1/pods?labelSelector=app", None),
            "/api/v1/pods?labelSelector=app&watch=1"
        );
    }

    #[test]
    fn test_item_watch_path() {
        assert_eq!(
            watch_item_path("/api/v1/namespaces/default/pods", "web-0"),
            "/api/v1/namespaces/default/pods?watch=1&fieldSelector=metadata.name%3Dweb-0"
        );
    }
}
