use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Custom wrapper for a GitHub GraphQL connection (the `pageInfo` + `nodes` pair of any paginated field).
pub struct Connection<T> {
    pub page_info: PageInfo,
    /// Nodes may come back as `null` (ie: search hits the token cannot see).
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Any `{ totalCount }` selection.
pub struct TotalCount {
    pub total_count: u64,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Custom wrapper for a GitHub's REST search response.
pub struct SearchPage<T> {
    pub total_count: u64,
    pub incomplete_results: Option<bool>,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn connection_keeps_null_nodes_and_page_info() {
        let connection: Connection<TotalCount> = serde_json::from_value(json!({
            "pageInfo": { "endCursor": "Y3Vyc29yOjUw", "hasNextPage": true },
            "nodes": [{ "totalCount": 3 }, null]
        }))
        .unwrap();

        assert_eq!(connection.page_info.end_cursor.as_deref(), Some("Y3Vyc29yOjUw"));
        assert!(connection.page_info.has_next_page);
        assert_eq!(connection.nodes, vec![Some(TotalCount { total_count: 3 }), None]);
    }

    #[test]
    fn search_page_defaults_missing_items() {
        let page: SearchPage<TotalCount> =
            serde_json::from_value(json!({ "total_count": 42, "incomplete_results": false })).unwrap();

        assert_eq!(page.total_count, 42);
        assert!(page.items.is_empty());
    }
}
