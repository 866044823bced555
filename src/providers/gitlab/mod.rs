mod client;
mod links;
mod provider;
mod types;

pub use provider::GitLabProvider;
