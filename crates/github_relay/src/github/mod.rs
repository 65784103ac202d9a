pub mod client;

pub use client::{CommitSummary, GithubClient, Profile, RepoSummary, GITHUB_API_BASE};
