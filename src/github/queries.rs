//! GraphQL documents sent to `https://api.github.com/graphql`.

/// Paginated repository search; the search string (qualifiers + sort) is a variable.
pub const SEARCH_REPOSITORIES_QUERY: &str = r#"
query SearchRepositories($searchQuery: String!, $cursor: String, $perPage: Int!) {
  search(query: $searchQuery, type: REPOSITORY, first: $perPage, after: $cursor) {
    pageInfo {
      endCursor
      hasNextPage
    }
    nodes {
      ... on Repository {
        nameWithOwner
        stargazerCount
        createdAt
        pushedAt
        primaryLanguage {
          name
        }
        mergedPRs: pullRequests(states: MERGED) {
          totalCount
        }
        closedPRs: pullRequests(states: CLOSED) {
          totalCount
        }
      }
    }
  }
}
"#;

/// Repository search without pull-request counters, for listings that never qualify by them.
pub const SEARCH_REPOSITORY_SUMMARIES_QUERY: &str = r#"
query SearchRepositorySummaries($searchQuery: String!, $cursor: String, $perPage: Int!) {
  search(query: $searchQuery, type: REPOSITORY, first: $perPage, after: $cursor) {
    pageInfo {
      endCursor
      hasNextPage
    }
    nodes {
      ... on Repository {
        nameWithOwner
        stargazerCount
        createdAt
        pushedAt
        primaryLanguage {
          name
        }
      }
    }
  }
}
"#;

/// Heavier per-repository counters, fetched for one repository at a time.
pub const REPOSITORY_DETAILS_QUERY: &str = r#"
query RepositoryDetails($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    pullRequests(states: MERGED) {
      totalCount
    }
    releases {
      totalCount
    }
    closedIssues: issues(states: CLOSED) {
      totalCount
    }
    totalIssues: issues {
      totalCount
    }
  }
}
"#;

/// Finished (merged or closed) pull requests of one repository, newest first.
pub const REPOSITORY_PULL_REQUESTS_QUERY: &str = r#"
query RepositoryPullRequests($owner: String!, $name: String!, $cursor: String, $perPage: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequests(states: [MERGED, CLOSED], first: $perPage, after: $cursor, orderBy: {field: CREATED_AT, direction: DESC}) {
      pageInfo {
        endCursor
        hasNextPage
      }
      nodes {
        number
        title
        state
        createdAt
        mergedAt
        closedAt
        changedFiles
        additions
        deletions
        participants {
          totalCount
        }
        comments {
          totalCount
        }
        reviewThreads {
          totalCount
        }
        reviews(first: 1) {
          totalCount
        }
      }
    }
  }
}
"#;
