//! Test fixtures and data for orchestrator tests
//!
//! This module provides consistent test data and fixtures used across all test suites.

use shared::{Credential, CredentialId, GeneratedImage, WorkItem};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const GOOD_SECRET: &'static str = "good-cookie";
    pub const BAD_SECRET: &'static str = "banned-cookie";

    /// `count` credentials with ids 0..count and secrets `cookie-<id>`
    pub fn credentials(count: u32) -> Vec<Credential> {
        (0..count)
            .map(|n| Credential::new(CredentialId::new(n), format!("cookie-{n}")))
            .collect()
    }

    /// Credential 0 is rejected by the scripted generator, credential 1 is not
    pub fn one_bad_one_good() -> Vec<Credential> {
        vec![
            Credential::new(CredentialId::new(0), Self::BAD_SECRET),
            Credential::new(CredentialId::new(1), Self::GOOD_SECRET),
        ]
    }

    pub fn prompts(names: &[&str]) -> Vec<WorkItem> {
        names.iter().map(|n| WorkItem::from(*n)).collect()
    }

    /// `count` distinct prompts
    pub fn numbered_prompts(count: usize) -> Vec<WorkItem> {
        (0..count).map(|n| WorkItem::new(format!("red apple number {n}"))).collect()
    }

    /// A generation result of `count` tiny images
    pub fn images(count: usize) -> Vec<GeneratedImage> {
        (0..count)
            .map(|n| GeneratedImage {
                url: format!("https://images.test/{n}.jpg"),
                bytes: vec![n as u8; 4],
            })
            .collect()
    }
}
